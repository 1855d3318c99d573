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

//! FASTA and multiple-alignment FASTA input.
//!
//! Single FASTA files are read whole with [read_fasta]. Multiple
//! sequence alignment streams that concatenate several alignment
//! blocks are read block by block with [MfaReader]; a block ends when
//! the name of its first sequence recurs. A sequence description of
//! the form `CHROM:START-END [+|-]` anchors the block to reference
//! coordinates (1-based inclusive) and records its strand.

use std::io::Read;
use std::path::Path;

use needletail::parser::FastxReader;

use crate::Region;
use crate::encoding::complement;
use crate::errors::CfError;

/// A named sequence, optionally anchored to a genomic region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seq {
    pub name: String,
    pub desc: Option<String>,
    pub data: Vec<u8>,
    region: Option<Region>,
    reverse: bool,
}

impl Seq {
    pub fn new(name: &str, desc: Option<&str>, data: Vec<u8>) -> Self {
        let (region, reverse) = desc.map(parse_anchor).unwrap_or((None, false));
        Seq {
            name: name.to_string(),
            desc: desc.map(|d| d.to_string()),
            data,
            region,
            reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Base symbol at a 0-based local index.
    pub fn base_at(&self, index: usize) -> Option<char> {
        self.data.get(index).map(|byte| *byte as char)
    }

    /// Genomic region this sequence is anchored to, parsed from the
    /// description. None for plain sequences.
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// True while the stored data is the reverse strand.
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Reverse-complement the stored data in place.
    pub fn rev_comp(&mut self) {
        self.data.reverse();
        for byte in self.data.iter_mut() {
            *byte = complement(*byte);
        }
        self.reverse = !self.reverse;
    }

    /// True if the position is a 4-fold degenerate (synonymous) site:
    /// a third codon position whose codon family encodes the same
    /// amino acid for every base. The reading frame is anchored at the
    /// sequence start.
    pub fn is_synonymous(&self, index: usize) -> bool {
        if index % 3 != 2 || index >= self.data.len() {
            return false;
        }
        let first = self.data[index - 2].to_ascii_lowercase();
        let second = self.data[index - 1].to_ascii_lowercase();
        matches!(
            (first, second),
            (b'c', b't') // Leu
                | (b'g', b't') // Val
                | (b't', b'c') // Ser
                | (b'c', b'c') // Pro
                | (b'a', b'c') // Thr
                | (b'g', b'c') // Ala
                | (b'c', b'g') // Arg
                | (b'g', b'g') // Gly
        )
    }
}

fn parse_anchor(desc: &str) -> (Option<Region>, bool) {
    let mut region: Option<Region> = None;
    let mut reverse = false;
    for token in desc.split_whitespace() {
        match token {
            "-" => reverse = true,
            "+" => {}
            _ => {
                if region.is_none() {
                    if let Some((chrom, range)) = token.split_once(':') {
                        if let Some((start, end)) = range.split_once('-') {
                            if let (Ok(start), Ok(end)) =
                                (start.parse::<u64>(), end.parse::<u64>())
                            {
                                region = Some(Region::new(chrom, start, end));
                            }
                        }
                    }
                }
            }
        }
    }
    (region, reverse)
}

fn seq_from_record(record: &needletail::parser::SequenceRecord) -> Seq {
    let id = String::from_utf8_lossy(record.id()).to_string();
    let mut tokens = id.splitn(2, char::is_whitespace);
    let name = tokens.next().unwrap_or_default();
    let desc = tokens.next().map(|d| d.trim());
    Seq::new(name, desc, record.seq().to_vec())
}

/// Read every sequence of a (possibly gzipped) FASTA file into memory.
pub fn read_fasta(path: &Path) -> Result<Vec<Seq>, CfError> {
    let mut reader = needletail::parse_fastx_file(path)?;
    let mut seqs: Vec<Seq> = Vec::new();
    while let Some(record) = reader.next() {
        seqs.push(seq_from_record(&record?));
    }
    Ok(seqs)
}

/// Streaming reader over the alignment blocks of a multiple-alignment
/// FASTA file.
pub struct MfaReader {
    reader: Box<dyn FastxReader>,
    pending: Option<Seq>,
}

impl MfaReader {
    pub fn from_path(path: &Path) -> Result<Self, CfError> {
        Ok(MfaReader {
            reader: needletail::parse_fastx_file(path)?,
            pending: None,
        })
    }

    pub fn from_reader<R: Read + Send + 'static>(conn: R) -> Result<Self, CfError> {
        Ok(MfaReader {
            reader: needletail::parse_fastx_reader(conn)?,
            pending: None,
        })
    }

    fn read_seq(&mut self) -> Result<Option<Seq>, CfError> {
        match self.reader.next() {
            None => Ok(None),
            Some(record) => Ok(Some(seq_from_record(&record?))),
        }
    }

    /// The next alignment block, or None at end of stream.
    ///
    /// The first sequence of a block is the reference the block is
    /// aligned against; its recurrence starts the next block.
    pub fn next_block(&mut self) -> Result<Option<Vec<Seq>>, CfError> {
        let first = match self.pending.take() {
            Some(seq) => seq,
            None => match self.read_seq()? {
                Some(seq) => seq,
                None => return Ok(None),
            },
        };
        let mut block = vec![first];
        while let Some(seq) = self.read_seq()? {
            if seq.name == block[0].name {
                self.pending = Some(seq);
                break;
            }
            block.push(seq);
        }
        Ok(Some(block))
    }
}

/// Turn a reverse-strand block into forward orientation.
///
/// Reverse-complements either the first (reference) sequence only or
/// the whole block, depending on `first_only`.
pub fn orient_block(block: &mut [Seq], first_only: bool) {
    if block.is_empty() || !block[0].is_reverse() {
        return;
    }
    let n = if first_only { 1 } else { block.len() };
    for seq in block.iter_mut().take(n) {
        seq.rev_comp();
    }
}
