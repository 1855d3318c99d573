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

//! Reader for position-sorted VCF text streams.
//!
//! This is a deliberately small reader: it extracts the ordered
//! individual names from the `#CHROM` header line and the genotype
//! calls (the `GT` subfield) from the data lines, which is everything
//! the counts conversion needs. Region access is a forward scan with a
//! one-record lookahead instead of an index, so regions must be
//! requested in increasing genomic order, chromosome by chromosome in
//! the order the chromosomes appear in the stream.

use std::collections::HashSet;
use std::io::BufRead;

use crate::Region;
use crate::errors::CfError;

/// One parsed variant line.
///
/// `genotypes[individual][copy]` is the allele index of one genome
/// copy: `Some(0)` denotes the reference allele, `Some(k)` the k-th
/// alternate allele, and `None` a missing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantRecord {
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    pub genotypes: Vec<Vec<Option<usize>>>,
}

impl VariantRecord {
    /// True when the record describes more than a single-base change.
    pub fn is_indel(&self) -> bool {
        self.ref_allele.len() > 1 || self.alt_alleles.iter().any(|alt| alt.len() > 1)
    }
}

/// Parse a single VCF data line.
///
/// Each individual contributes exactly `ploidy` genome copies: calls
/// beyond the ploidy are dropped, missing trailing copies are padded
/// as missing.
pub fn read_vcf_record(line: &str, ploidy: usize) -> Result<VariantRecord, CfError> {
    let fields: Vec<&str> = line.trim_end().split('\t').collect();
    if fields.len() < 10 {
        return Err(CfError::MalformedVcfRecord {
            chrom: fields.first().unwrap_or(&"?").to_string(),
            pos: 0,
            reason: format!(
                "expected at least 10 tab-separated fields, found {}",
                fields.len()
            ),
        });
    }

    let chrom = fields[0].to_string();
    let pos = fields[1]
        .parse::<u64>()
        .map_err(|_| CfError::MalformedVcfRecord {
            chrom: chrom.clone(),
            pos: 0,
            reason: format!("position '{}' is not an integer", fields[1]),
        })?;
    let ref_allele = fields[3].to_string();
    let alt_alleles: Vec<String> = if fields[4] == "." {
        Vec::new()
    } else {
        fields[4].split(',').map(|alt| alt.to_string()).collect()
    };

    let mut genotypes: Vec<Vec<Option<usize>>> = Vec::with_capacity(fields.len() - 9);
    for sample in &fields[9..] {
        let gt = sample.split(':').next().unwrap_or("");
        let mut copies: Vec<Option<usize>> = Vec::with_capacity(ploidy);
        for call in gt.split(['/', '|']) {
            if copies.len() == ploidy {
                break;
            }
            if call == "." || call.is_empty() {
                copies.push(None);
            } else {
                let allele = call
                    .parse::<usize>()
                    .map_err(|_| CfError::MalformedVcfRecord {
                        chrom: chrom.clone(),
                        pos,
                        reason: format!("genotype call '{}' is not an allele index", call),
                    })?;
                if allele > alt_alleles.len() {
                    return Err(CfError::MalformedVcfRecord {
                        chrom: chrom.clone(),
                        pos,
                        reason: format!(
                            "allele index {} exceeds the {} alternate alleles",
                            allele,
                            alt_alleles.len()
                        ),
                    });
                }
                copies.push(Some(allele));
            }
        }
        copies.resize(ploidy, None);
        genotypes.push(copies);
    }

    Ok(VariantRecord {
        chrom,
        pos,
        ref_allele,
        alt_alleles,
        genotypes,
    })
}

/// Streaming reader over one VCF file or stream.
///
/// Owns the underlying cursor exclusively; records are read strictly
/// forward.
pub struct VcfReader<R: BufRead> {
    reader: R,
    individuals: Vec<String>,
    ploidy: usize,
    pending: Option<VariantRecord>,
    current_chrom: Option<String>,
    done_chroms: HashSet<String>,
}

impl<R: BufRead> VcfReader<R> {
    /// Consume the meta and header lines and position the reader at
    /// the first data line.
    pub fn new(mut reader: R, ploidy: usize) -> Result<Self, CfError> {
        if ploidy == 0 {
            return Err(CfError::InvalidPloidy(0));
        }
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(CfError::MalformedVcfHeader(
                    "no #CHROM header line found".to_string(),
                ));
            }
            if line.starts_with("##") {
                continue;
            }
            if line.starts_with("#CHROM") {
                break;
            }
            return Err(CfError::MalformedVcfHeader(format!(
                "unexpected line before #CHROM: '{}'",
                line.trim_end()
            )));
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 10 {
            return Err(CfError::MalformedVcfHeader(
                "#CHROM line lists no individuals".to_string(),
            ));
        }
        let individuals = fields[9..].iter().map(|name| name.to_string()).collect();

        Ok(VcfReader {
            reader,
            individuals,
            ploidy,
            pending: None,
            current_chrom: None,
            done_chroms: HashSet::new(),
        })
    }

    /// Ordered individual names from the `#CHROM` line.
    pub fn individuals(&self) -> &[String] {
        &self.individuals
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    fn read_record(&mut self) -> Result<Option<VariantRecord>, CfError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            return read_vcf_record(&line, self.ploidy).map(Some);
        }
    }

    /// Iterate the records inside `region`.
    ///
    /// Forward-only: records before the region start are discarded,
    /// the first record past the region end is kept for the next
    /// fetch. A record from a chromosome that no fetch has asked for
    /// yet ends the fetch and stays buffered, so regions must be
    /// requested in increasing genomic order with the chromosomes in
    /// stream order. Fetching a chromosome again after moving to
    /// another returns nothing.
    pub fn fetch(&mut self, region: &Region) -> Fetch<'_, R> {
        if let Some(current) = &self.current_chrom {
            if *current != region.chrom {
                self.done_chroms.insert(current.clone());
            }
        }
        self.current_chrom = Some(region.chrom.clone());
        Fetch {
            source: self,
            region: region.clone(),
        }
    }
}

/// Iterator returned by [VcfReader::fetch].
pub struct Fetch<'a, R: BufRead> {
    source: &'a mut VcfReader<R>,
    region: Region,
}

impl<R: BufRead> Iterator for Fetch<'_, R> {
    type Item = Result<VariantRecord, CfError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.source.pending.take() {
                Some(record) => record,
                None => match self.source.read_record() {
                    Ok(Some(record)) => record,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                },
            };
            if record.chrom != self.region.chrom {
                if self.source.done_chroms.contains(&record.chrom) {
                    log::debug!(
                        "skipping record at {}:{} on a completed chromosome",
                        record.chrom,
                        record.pos
                    );
                    continue;
                }
                // A chromosome no fetch has asked for yet; keep the
                // record so the fetch for it still finds it.
                self.source.pending = Some(record);
                return None;
            }
            if record.pos < self.region.start {
                log::debug!(
                    "skipping record at {}:{} before region start {}",
                    record.chrom,
                    record.pos,
                    self.region.start
                );
                continue;
            }
            if record.pos > self.region.end {
                self.source.pending = Some(record);
                return None;
            }
            return Some(Ok(record));
        }
    }
}
