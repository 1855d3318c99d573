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

//! Error types shared across the crate.
//!
//! Configuration problems are detected before any data is processed,
//! data integrity problems carry the chromosome and position they were
//! detected at. Per-site skips (non-synonymous site, uninformative
//! reference base) are not errors; see
//! [SiteOutcome](crate::accumulate::SiteOutcome).

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CfError {
    /// The input does not follow the counts format.
    #[error("not a counts format file: {0}")]
    NotACountsFormatFile(String),

    /// Merge list length does not match the number of variant sources.
    #[error("merge list has {got} entries but there are {expected} variant sources")]
    InvalidMergeList { got: usize, expected: usize },

    /// Explicit population name list disagrees with the resolved count.
    #[error("name list has {got} entries but {expected} populations were resolved")]
    InvalidNameList { got: usize, expected: usize },

    #[error("invalid ploidy {0}, must be at least 1")]
    InvalidPloidy(u32),

    /// A symbol that is not a nucleotide, IUPAC ambiguity code, or gap.
    #[error("invalid base '{base}' at {chrom}:{pos}")]
    InvalidBase { base: char, chrom: String, pos: u64 },

    /// The reference allele stated by a variant record disagrees with
    /// the reference sequence. Signals corrupt or misaligned inputs.
    #[error("reference mismatch at {chrom}:{pos}: reference sequence has '{reference}' but the variant record claims '{variant}'")]
    ReferenceMismatch {
        chrom: String,
        pos: u64,
        reference: char,
        variant: char,
    },

    /// An assignment outside `[0, n_pops)` that is not the `-1`
    /// exclusion sentinel.
    #[error("population index {index} at {chrom}:{pos} is outside the {n_pops} resolved populations")]
    PopulationIndexOutOfRange {
        index: i32,
        n_pops: usize,
        chrom: String,
        pos: u64,
    },

    #[error("malformed VCF record at {chrom}:{pos}: {reason}")]
    MalformedVcfRecord {
        chrom: String,
        pos: u64,
        reason: String,
    },

    #[error("malformed VCF header: {0}")]
    MalformedVcfHeader(String),

    #[error("sequences '{0}' and '{1}' do not have equal length")]
    UnequalSequenceLengths(String, String),

    #[error("reference file contains no sequence named '{0}'")]
    MissingSequence(String),

    #[error("input contains no sequences")]
    EmptyInput,

    /// All four counts of a population are zero where a base must be
    /// sampled.
    #[error("population '{population}' has no counts at {site}, cannot sample a base")]
    EmptyCounts { population: String, site: String },

    #[error("invalid region '{0}', expected CHROM:START-END with 1-based inclusive bounds")]
    InvalidRegion(String),

    /// Applying the position offset would leave the 1-based range.
    #[error("offset {offset} shifts position {pos} outside the 1-based positions")]
    InvalidOffset { offset: i64, pos: u64 },

    #[error("fasta error: {0}")]
    Fasta(#[from] needletail::errors::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
