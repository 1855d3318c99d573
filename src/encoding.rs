// tally: Counts format conversion for population genetic data.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Nucleotide and IUPAC ambiguity code handling.
//!
//! Counts files store tallies of the four bases in the fixed order
//! A, C, G, T. [encode] maps an input symbol to the base indexes it
//! contributes to; ambiguity codes contribute to each of their 2-3
//! candidate indexes with full weight so that counts stay integral.

/// Base characters in count tuple order.
pub const BASES: [char; 4] = ['a', 'c', 'g', 't'];

/// How a sequence symbol contributes to a count tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseCode {
    /// A single base index in 0=A, 1=C, 2=G, 3=T.
    Definite(usize),
    /// An IUPAC ambiguity code; every candidate index is incremented.
    Ambiguous(&'static [usize]),
    /// No information (n, gap, dot). Contributes nothing.
    NoInfo,
}

/// Map a nucleotide or IUPAC ambiguity symbol to its [BaseCode].
///
/// Case-insensitive; `u` is treated as `t`. Returns None for symbols
/// outside the IUPAC alphabet, which callers report as an invalid
/// base.
///
/// ## Usage
///
/// ```rust
/// use tally::encoding::{encode, BaseCode};
///
/// assert_eq!(encode('G'), Some(BaseCode::Definite(2)));
/// assert_eq!(encode('r'), Some(BaseCode::Ambiguous(&[0, 2])));
/// assert_eq!(encode('-'), Some(BaseCode::NoInfo));
/// assert_eq!(encode('x'), None);
/// ```
pub fn encode(symbol: char) -> Option<BaseCode> {
    match symbol.to_ascii_lowercase() {
        'a' => Some(BaseCode::Definite(0)),
        'c' => Some(BaseCode::Definite(1)),
        'g' => Some(BaseCode::Definite(2)),
        't' | 'u' => Some(BaseCode::Definite(3)),
        // Two candidates.
        'r' => Some(BaseCode::Ambiguous(&[0, 2])), // A or G
        'y' => Some(BaseCode::Ambiguous(&[1, 3])), // C or T
        's' => Some(BaseCode::Ambiguous(&[1, 2])), // C or G
        'w' => Some(BaseCode::Ambiguous(&[0, 3])), // A or T
        'k' => Some(BaseCode::Ambiguous(&[2, 3])), // G or T
        'm' => Some(BaseCode::Ambiguous(&[0, 1])), // A or C
        // Three candidates.
        'b' => Some(BaseCode::Ambiguous(&[1, 2, 3])), // C, G or T
        'd' => Some(BaseCode::Ambiguous(&[0, 2, 3])), // A, G or T
        'h' => Some(BaseCode::Ambiguous(&[0, 1, 3])), // A, C or T
        'v' => Some(BaseCode::Ambiguous(&[0, 1, 2])), // A, C or G
        'n' | '.' | '-' => Some(BaseCode::NoInfo),
        _ => None,
    }
}

/// Complement a sequence byte, honoring the IUPAC alphabet.
///
/// Unrecognized bytes pass through unchanged; they are caught later
/// when the position is encoded.
pub fn complement(base: u8) -> u8 {
    match base {
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' | b'u' => b'a',
        b'r' => b'y',
        b'y' => b'r',
        b'k' => b'm',
        b'm' => b'k',
        b'b' => b'v',
        b'v' => b'b',
        b'd' => b'h',
        b'h' => b'd',
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        other => other, // s, w, n, gaps are their own complement
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn encode_definite_bases() {
        use super::BaseCode;
        use super::encode;

        for (symbol, index) in [('a', 0), ('C', 1), ('g', 2), ('T', 3), ('u', 3)] {
            assert_eq!(encode(symbol), Some(BaseCode::Definite(index)));
        }
    }

    #[test]
    fn encode_two_way_ambiguity() {
        use super::BaseCode;
        use super::encode;

        assert_eq!(encode('r'), Some(BaseCode::Ambiguous(&[0, 2])));
        assert_eq!(encode('Y'), Some(BaseCode::Ambiguous(&[1, 3])));
        assert_eq!(encode('s'), Some(BaseCode::Ambiguous(&[1, 2])));
        assert_eq!(encode('w'), Some(BaseCode::Ambiguous(&[0, 3])));
        assert_eq!(encode('k'), Some(BaseCode::Ambiguous(&[2, 3])));
        assert_eq!(encode('m'), Some(BaseCode::Ambiguous(&[0, 1])));
    }

    #[test]
    fn encode_three_way_ambiguity() {
        use super::BaseCode;
        use super::encode;

        assert_eq!(encode('b'), Some(BaseCode::Ambiguous(&[1, 2, 3])));
        assert_eq!(encode('d'), Some(BaseCode::Ambiguous(&[0, 2, 3])));
        assert_eq!(encode('h'), Some(BaseCode::Ambiguous(&[0, 1, 3])));
        assert_eq!(encode('v'), Some(BaseCode::Ambiguous(&[0, 1, 2])));
    }

    #[test]
    fn encode_no_information() {
        use super::BaseCode;
        use super::encode;

        assert_eq!(encode('n'), Some(BaseCode::NoInfo));
        assert_eq!(encode('N'), Some(BaseCode::NoInfo));
        assert_eq!(encode('.'), Some(BaseCode::NoInfo));
        assert_eq!(encode('-'), Some(BaseCode::NoInfo));
    }

    #[test]
    fn encode_unrecognized_symbol() {
        use super::encode;

        assert_eq!(encode('x'), None);
        assert_eq!(encode('1'), None);
    }

    #[test]
    fn complement_round_trips() {
        use super::complement;

        let forward = b"acgtrykmbvdh";
        let complemented: Vec<u8> = forward.iter().map(|b| complement(*b)).collect();
        let back: Vec<u8> = complemented.iter().map(|b| complement(*b)).collect();

        assert_eq!(complemented, b"tgcayrmkvbhd".to_vec());
        assert_eq!(back, forward.to_vec());
    }
}
