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

//! Position-ordered merge of variant records from several sources.
//!
//! A classic k-way merge over pre-sorted per-source streams: one
//! buffered head record per source, an explicit exhausted state, no
//! further buffering. The merge is lazy and single pass because the
//! sources hold live file cursors.

use crate::errors::CfError;
use crate::parser::vcf::VariantRecord;

/// A position-sorted stream of variant records from one source.
pub type VariantIter<'a> = Box<dyn Iterator<Item = Result<VariantRecord, CfError>> + 'a>;

/// Merges N sorted variant streams into one position-ordered sequence
/// of `(source_index, record)` pairs.
///
/// ## Usage
///
/// ```rust
/// use tally::merge::{VariantIter, VariantMerger};
/// use tally::parser::vcf::VariantRecord;
///
/// fn record(pos: u64) -> VariantRecord {
///     VariantRecord {
///         chrom: "1".to_string(),
///         pos,
///         ref_allele: "a".to_string(),
///         alt_alleles: vec!["g".to_string()],
///         genotypes: vec![vec![Some(0), Some(1)]],
///     }
/// }
///
/// let source_1: VariantIter = Box::new([record(5), record(9)].into_iter().map(Ok));
/// let source_2: VariantIter = Box::new([record(5), record(7)].into_iter().map(Ok));
///
/// let merger = VariantMerger::new(vec![source_1, source_2]).unwrap();
/// let order: Vec<(usize, u64)> = merger
///     .map(|item| { let (source, record) = item.unwrap(); (source, record.pos) })
///     .collect();
///
/// assert_eq!(order, vec![(0, 5), (1, 5), (1, 7), (0, 9)]);
/// ```
pub struct VariantMerger<'a> {
    sources: Vec<VariantIter<'a>>,
    heads: Vec<Option<VariantRecord>>,
}

impl<'a> VariantMerger<'a> {
    pub fn new(mut sources: Vec<VariantIter<'a>>) -> Result<Self, CfError> {
        let mut heads = Vec::with_capacity(sources.len());
        for source in sources.iter_mut() {
            heads.push(source.next().transpose()?);
        }
        Ok(VariantMerger { sources, heads })
    }

    pub fn n_sources(&self) -> usize {
        self.sources.len()
    }

    fn refill(&mut self, source: usize) -> Result<(), CfError> {
        self.heads[source] = self.sources[source].next().transpose()?;
        Ok(())
    }

    /// Index of the source whose head has the lowest position. Ties go
    /// to the lowest source index.
    fn min_source(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            if let Some(record) = head {
                match best {
                    Some(b) if self.heads[b].as_ref().unwrap().pos <= record.pos => {}
                    _ => best = Some(i),
                }
            }
        }
        best
    }

    /// Emit the lowest-position head and refill it from its source.
    pub fn pop_min(&mut self) -> Result<Option<(usize, VariantRecord)>, CfError> {
        match self.min_source() {
            None => Ok(None),
            Some(source) => {
                let record = self.heads[source].take().unwrap();
                self.refill(source)?;
                Ok(Some((source, record)))
            }
        }
    }

    /// Drain every record at exactly `pos` into one batch.
    ///
    /// Records that have fallen behind the scan position are discarded
    /// with a debug message so that the merge always makes progress.
    /// Returns an empty batch when no source covers `pos`.
    pub fn batch_at(&mut self, pos: u64) -> Result<Vec<(usize, VariantRecord)>, CfError> {
        let mut batch: Vec<(usize, VariantRecord)> = Vec::new();
        loop {
            let Some(source) = self.min_source() else {
                break;
            };
            let head_pos = self.heads[source].as_ref().unwrap().pos;
            if head_pos > pos {
                break;
            }
            let record = self.heads[source].take().unwrap();
            self.refill(source)?;
            if head_pos < pos {
                log::debug!(
                    "discarding variant at {}:{} behind the scan position {}",
                    record.chrom,
                    record.pos,
                    pos
                );
                continue;
            }
            batch.push((source, record));
        }
        Ok(batch)
    }
}

impl Iterator for VariantMerger<'_> {
    type Item = Result<(usize, VariantRecord), CfError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop_min().transpose()
    }
}
