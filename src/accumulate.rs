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

//! Per-site combination of reference bases and variant calls into
//! population count tuples.
//!
//! One [SiteAccumulator] owns the count state for its writer; the
//! tuples are reset explicitly between sites. A site either yields a
//! row, or is skipped (non-synonymous under the synonymous-only
//! filter, or an uninformative reference base), or aborts the run
//! (reference mismatch, broken population index).

use crate::BaseCounts;
use crate::assign::{EXCLUDED, PopulationMap};
use crate::encoding::{self, BaseCode};
use crate::errors::CfError;
use crate::parser::fasta::Seq;
use crate::parser::vcf::VariantRecord;

/// What happened at one site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiteOutcome {
    /// Counts were filled; the caller writes a row.
    Counted,
    /// Synonymous-only filter rejected the site. Skip, not an error.
    NotSynonymousSite,
    /// The reference base carries no information or is not a valid
    /// symbol. Skip, not an error.
    InvalidReferenceBase,
}

pub struct SiteAccumulator<'a> {
    populations: &'a PopulationMap,
    counts: Vec<BaseCounts>,
    ploidy: u32,
    only_synonymous: bool,
}

impl<'a> SiteAccumulator<'a> {
    pub fn new(
        populations: &'a PopulationMap,
        ploidy: u32,
        only_synonymous: bool,
    ) -> Result<Self, CfError> {
        if ploidy == 0 {
            return Err(CfError::InvalidPloidy(0));
        }
        Ok(SiteAccumulator {
            populations,
            counts: vec![[0; 4]; populations.n_populations()],
            ploidy,
            only_synonymous,
        })
    }

    /// Current count tuples, one per population slot.
    pub fn counts(&self) -> &[BaseCounts] {
        &self.counts
    }

    pub fn reset(&mut self) {
        for tuple in self.counts.iter_mut() {
            *tuple = [0; 4];
        }
    }

    /// Add `weight` observations of `code` to population `pop`.
    ///
    /// The [EXCLUDED] sentinel drops the contribution silently; any
    /// other out-of-range index is a logic error.
    fn add(
        &mut self,
        pop: i32,
        code: BaseCode,
        weight: u32,
        chrom: &str,
        pos: u64,
    ) -> Result<(), CfError> {
        if pop == EXCLUDED {
            return Ok(());
        }
        if pop < 0 || pop as usize >= self.counts.len() {
            return Err(CfError::PopulationIndexOutOfRange {
                index: pop,
                n_pops: self.counts.len(),
                chrom: chrom.to_string(),
                pos,
            });
        }
        let tuple = &mut self.counts[pop as usize];
        match code {
            BaseCode::Definite(index) => tuple[index] += weight,
            BaseCode::Ambiguous(candidates) => {
                if candidates.len() == 3 {
                    log::info!(
                        "base with 3 candidates at {}:{}, site will be unreliable",
                        chrom,
                        pos
                    );
                }
                for index in candidates {
                    tuple[*index] += weight;
                }
            }
            BaseCode::NoInfo => {}
        }
        Ok(())
    }

    /// Add one aligned-FASTA base observation to population `pop`.
    ///
    /// With `double_fixed` set, definite bases count twice so that
    /// fixed sites keep their relative weight when heterozygotes are
    /// IUPAC-coded. Ambiguity codes always count once per candidate.
    pub fn add_base(
        &mut self,
        pop: i32,
        symbol: char,
        double_fixed: bool,
        chrom: &str,
        pos: u64,
    ) -> Result<(), CfError> {
        let code = encoding::encode(symbol).ok_or_else(|| CfError::InvalidBase {
            base: symbol,
            chrom: chrom.to_string(),
            pos,
        })?;
        let weight = match code {
            BaseCode::Definite(_) if double_fixed => 2,
            _ => 1,
        };
        self.add(pop, code, weight, chrom, pos)
    }

    /// Fill the tuples for the site at 1-based position `pos`.
    ///
    /// `reference` is anchored at genomic position `seq_start`;
    /// `batch` holds every variant record overlapping `pos`, tagged
    /// with its source index. Individuals of sources absent from the
    /// batch contribute the reference base at full ploidy weight.
    pub fn accumulate(
        &mut self,
        reference: &Seq,
        seq_start: u64,
        chrom: &str,
        pos: u64,
        batch: &[(usize, VariantRecord)],
    ) -> Result<SiteOutcome, CfError> {
        self.reset();

        let Some(local) = pos.checked_sub(seq_start).map(|local| local as usize) else {
            log::debug!(
                "position {}:{} is before the sequence anchor {}",
                chrom,
                pos,
                seq_start
            );
            return Ok(SiteOutcome::InvalidReferenceBase);
        };
        if self.only_synonymous && !reference.is_synonymous(local) {
            return Ok(SiteOutcome::NotSynonymousSite);
        }

        let Some(ref_char) = reference.base_at(local) else {
            log::debug!("position {}:{} is outside the reference sequence", chrom, pos);
            return Ok(SiteOutcome::InvalidReferenceBase);
        };
        let Some(ref_code) = encoding::encode(ref_char) else {
            log::debug!(
                "reference base '{}' at {}:{} is not a valid symbol",
                ref_char,
                chrom,
                pos
            );
            return Ok(SiteOutcome::InvalidReferenceBase);
        };

        // Sources without a record at this position are filled from
        // the reference alone.
        for source in 0..self.populations.n_sources() {
            if batch.iter().any(|(s, _)| *s == source) {
                continue;
            }
            let row = self.populations.assignment(source).to_vec();
            for pop in row {
                self.add(pop, ref_code, self.ploidy, chrom, pos)?;
            }
        }

        for (source, record) in batch {
            let indel = record.is_indel();
            if indel {
                log::warn!(
                    "indel at {}:{}, approximating with the first base of the allele",
                    record.chrom,
                    record.pos
                );
            }
            let variant_char =
                record
                    .ref_allele
                    .chars()
                    .next()
                    .ok_or_else(|| CfError::MalformedVcfRecord {
                        chrom: record.chrom.clone(),
                        pos: record.pos,
                        reason: "empty reference allele".to_string(),
                    })?;
            let variant_code =
                encoding::encode(variant_char).ok_or_else(|| CfError::MalformedVcfRecord {
                    chrom: record.chrom.clone(),
                    pos: record.pos,
                    reason: format!("reference allele '{}' is not a valid base", variant_char),
                })?;
            if variant_code != ref_code {
                return Err(CfError::ReferenceMismatch {
                    chrom: record.chrom.clone(),
                    pos: record.pos,
                    reference: ref_char,
                    variant: variant_char,
                });
            }

            let row = self.populations.assignment(*source).to_vec();
            if row.len() != record.genotypes.len() {
                return Err(CfError::MalformedVcfRecord {
                    chrom: record.chrom.clone(),
                    pos: record.pos,
                    reason: format!(
                        "record has {} samples but the header lists {}",
                        record.genotypes.len(),
                        row.len()
                    ),
                });
            }
            for (individual, copies) in record.genotypes.iter().enumerate() {
                let pop = row[individual];
                for copy in copies {
                    let Some(allele) = copy else {
                        continue;
                    };
                    if indel || *allele == 0 {
                        // Indels are approximated by the reference
                        // base; weight 1 per genome copy.
                        self.add(pop, ref_code, 1, chrom, pos)?;
                    } else {
                        let alt = &record.alt_alleles[*allele - 1];
                        let alt_char =
                            alt.chars().next().ok_or_else(|| CfError::MalformedVcfRecord {
                                chrom: record.chrom.clone(),
                                pos: record.pos,
                                reason: "empty alternate allele".to_string(),
                            })?;
                        let alt_code = encoding::encode(alt_char).ok_or_else(|| {
                            CfError::MalformedVcfRecord {
                                chrom: record.chrom.clone(),
                                pos: record.pos,
                                reason: format!(
                                    "alternate allele '{}' is not a valid base",
                                    alt_char
                                ),
                            }
                        })?;
                        self.add(pop, alt_code, 1, chrom, pos)?;
                    }
                }
            }
        }

        Ok(SiteOutcome::Counted)
    }
}
