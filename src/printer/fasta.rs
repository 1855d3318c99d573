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

//! FASTA output from count rows.
//!
//! Each population becomes one sequence with one base per site. A base
//! is either sampled from the count tuple with probability proportional
//! to the counts, or taken as the consensus (the most frequent base,
//! first in a-c-g-t order on ties).

use std::io::BufRead;
use std::io::Write;

use rand::Rng;

use crate::encoding::BASES;
use crate::errors::CfError;
use crate::parser::CfReader;

const LINE_WIDTH: usize = 80;

/// Sample a base index with probability proportional to the counts.
///
/// None when all four counts are zero.
pub fn weighted_choice(counts: &[u32; 4], rng: &mut impl Rng) -> Option<usize> {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let mut pick = rng.random_range(0..total);
    for (i, count) in counts.iter().enumerate() {
        if pick < *count {
            return Some(i);
        }
        pick -= count;
    }
    unreachable!("pick is below the count total")
}

/// The most frequent base index, ties going to the first in a-c-g-t
/// order. None when all four counts are zero.
pub fn consensus_choice(counts: &[u32; 4]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, count) in counts.iter().enumerate() {
        if *count > 0 && best.map(|b| counts[b] < *count).unwrap_or(true) {
            best = Some(i);
        }
    }
    best
}

/// Convert count rows into one FASTA sequence per population.
///
/// Every population contributes one base per site. A site where a
/// population has no counts at all is an error since no base can be
/// chosen for it.
pub fn write_fasta<R: BufRead, W: Write>(
    reader: &mut CfReader<R>,
    conn: &mut W,
    consensus: bool,
    rng: &mut impl Rng,
) -> Result<(), CfError> {
    let names = reader.populations().to_vec();
    let mut seqs: Vec<Vec<u8>> = vec![Vec::new(); names.len()];

    for row in reader.by_ref() {
        let row = row?;
        for (pop, counts) in row.counts.iter().enumerate() {
            let choice = if consensus {
                consensus_choice(counts)
            } else {
                weighted_choice(counts, rng)
            };
            let base = choice.ok_or_else(|| CfError::EmptyCounts {
                population: names[pop].clone(),
                site: format!("{}:{}", row.chrom, row.pos),
            })?;
            seqs[pop].push(BASES[base] as u8);
        }
    }

    for (name, seq) in names.iter().zip(seqs.iter()) {
        writeln!(conn, ">{}", name)?;
        for chunk in seq.chunks(LINE_WIDTH) {
            conn.write_all(chunk)?;
            writeln!(conn)?;
        }
    }
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    const CF: &str = "\
COUNTSFILE NPOP 2 NSITES 3\n\
CHROM POS sheep wolf\n\
1 1 2,0,0,0 0,0,2,0\n\
1 2 0,2,0,0 0,0,0,2\n\
1 3 0,0,2,0 2,0,0,0\n";

    #[test]
    fn weighted_choice_respects_zero_counts() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use super::weighted_choice;

        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(weighted_choice(&[0, 0, 0, 0], &mut rng), None);
        // Only one base has counts, so the pick is forced.
        for _ in 0..20 {
            assert_eq!(weighted_choice(&[0, 0, 5, 0], &mut rng), Some(2));
        }
    }

    #[test]
    fn consensus_choice_takes_the_first_maximum() {
        use super::consensus_choice;

        assert_eq!(consensus_choice(&[1, 3, 0, 2]), Some(1));
        assert_eq!(consensus_choice(&[2, 2, 0, 0]), Some(0));
        assert_eq!(consensus_choice(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn fixed_sites_produce_the_expected_sequences() {
        use std::io::Cursor;
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use crate::parser::CfReader;
        use super::write_fasta;

        let mut reader = CfReader::new(Cursor::new(CF.as_bytes())).unwrap();
        let mut out: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(3);

        // Every site is fixed so sampling is deterministic.
        write_fasta(&mut reader, &mut out, false, &mut rng).unwrap();

        let got = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(got, ">sheep\nacg\n>wolf\ngta\n");
    }

    #[test]
    fn empty_counts_are_an_error() {
        use std::io::Cursor;
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use crate::errors::CfError;
        use crate::parser::CfReader;
        use super::write_fasta;

        let text = "\
COUNTSFILE NPOP 1 NSITES 1\n\
CHROM POS sheep\n\
1 1 0,0,0,0\n";
        let mut reader = CfReader::new(Cursor::new(text.as_bytes())).unwrap();
        let mut out: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(3);

        let got = write_fasta(&mut reader, &mut out, false, &mut rng);
        assert!(matches!(got, Err(CfError::EmptyCounts { .. })));
    }
}
