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

//! Readers for the supported input formats.
//!
//! [CfReader] parses counts format text; the submodules read the
//! collaborating formats (VCF variant streams, FASTA references and
//! alignments).

// Format specific implementations
pub mod fasta;
pub mod vcf;

use std::io::BufRead;
use std::path::Path;

use crate::SiteCounts;
use crate::errors::CfError;

/// Parse one counts format data line.
///
/// ## Usage
///
/// ```rust
/// use tally::parser::read_cf_line;
///
/// let row = read_cf_line("chr1 8373 0,0,1,0 2,0,3,0").unwrap();
///
/// assert_eq!(row.chrom, "chr1");
/// assert_eq!(row.pos, 8373);
/// assert_eq!(row.counts, vec![[0, 0, 1, 0], [2, 0, 3, 0]]);
/// ```
pub fn read_cf_line(line: &str) -> Result<SiteCounts, CfError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= 2 {
        return Err(CfError::NotACountsFormatFile(
            "line contains no data".to_string(),
        ));
    }
    let chrom = fields[0].to_string();
    let pos = fields[1].parse::<u64>().map_err(|_| {
        CfError::NotACountsFormatFile(format!("position '{}' is not an integer", fields[1]))
    })?;
    let mut counts: Vec<[u32; 4]> = Vec::with_capacity(fields.len() - 2);
    for tuple in &fields[2..] {
        let parts: Vec<&str> = tuple.split(',').collect();
        if parts.len() != 4 {
            return Err(CfError::NotACountsFormatFile(format!(
                "count tuple '{}' does not have 4 entries",
                tuple
            )));
        }
        let mut parsed = [0_u32; 4];
        for (i, part) in parts.iter().enumerate() {
            parsed[i] = part.parse::<u32>().map_err(|_| {
                CfError::NotACountsFormatFile(format!("count '{}' is not an integer", part))
            })?;
        }
        counts.push(parsed);
    }
    Ok(SiteCounts { chrom, pos, counts })
}

/// Streaming reader over a counts format file.
///
/// Validates the two mandatory header lines up front and then yields
/// one [SiteCounts] row per data line. Comment lines starting with `#`
/// before the first header line are skipped.
///
/// ## Usage
///
/// ```rust
/// use std::io::Cursor;
/// use tally::parser::CfReader;
///
/// let text = "\
/// COUNTSFILE NPOP 2 NSITES 2\n\
/// CHROM POS sheep wolf\n\
/// 1 1 2,0,0,0 0,0,2,0\n\
/// 1 2 0,2,0,0 0,1,1,0\n";
///
/// let mut reader = CfReader::new(Cursor::new(text.as_bytes())).unwrap();
/// assert_eq!(reader.populations(), &["sheep".to_string(), "wolf".to_string()]);
///
/// let rows: Vec<_> = reader.map(|row| row.unwrap()).collect();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1].counts, vec![[0, 2, 0, 0], [0, 1, 1, 0]]);
/// ```
pub struct CfReader<R: BufRead> {
    reader: R,
    populations: Vec<String>,
    n_sites: u64,
}

impl CfReader<std::io::BufReader<Box<dyn std::io::Read>>> {
    pub fn from_path(path: &Path) -> Result<Self, CfError> {
        CfReader::new(crate::open_read(path)?)
    }
}

impl<R: BufRead> CfReader<R> {
    pub fn new(mut reader: R) -> Result<Self, CfError> {
        let first = read_noncomment_line(&mut reader)?
            .ok_or_else(|| CfError::NotACountsFormatFile("file contains no data".to_string()))?;
        let fields: Vec<&str> = first.split_whitespace().collect();
        if fields.len() != 5 || fields[0] != "COUNTSFILE" {
            return Err(CfError::NotACountsFormatFile(
                "first line is corrupt".to_string(),
            ));
        }
        let n_pop = fields[2].parse::<usize>().map_err(|_| {
            CfError::NotACountsFormatFile("population count is not an integer".to_string())
        })?;
        let n_sites = fields[4].parse::<u64>().map_err(|_| {
            CfError::NotACountsFormatFile("site count is not an integer".to_string())
        })?;

        let header = read_noncomment_line(&mut reader)?
            .ok_or_else(|| CfError::NotACountsFormatFile("header line is missing".to_string()))?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() < 3
            || !["CHROM", "Chrom"].contains(&fields[0])
            || !["POS", "Pos"].contains(&fields[1])
        {
            return Err(CfError::NotACountsFormatFile(
                "header line is corrupt".to_string(),
            ));
        }
        let populations: Vec<String> = fields[2..].iter().map(|name| name.to_string()).collect();
        if populations.len() != n_pop {
            return Err(CfError::NotACountsFormatFile(format!(
                "header lists {} populations but the first line declares {}",
                populations.len(),
                n_pop
            )));
        }

        Ok(CfReader {
            reader,
            populations,
            n_sites,
        })
    }

    /// Population names from the header line.
    pub fn populations(&self) -> &[String] {
        &self.populations
    }

    pub fn n_populations(&self) -> usize {
        self.populations.len()
    }

    /// Site count declared in the first line.
    pub fn n_sites(&self) -> u64 {
        self.n_sites
    }
}

fn read_noncomment_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, CfError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        return Ok(Some(line));
    }
}

impl<R: BufRead> Iterator for CfReader<R> {
    type Item = Result<SiteCounts, CfError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match read_noncomment_line(&mut self.reader) {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        let row = match read_cf_line(&line) {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        if row.counts.len() != self.populations.len() {
            return Some(Err(CfError::NotACountsFormatFile(format!(
                "line at {}:{} has {} count tuples but the header lists {} populations",
                row.chrom,
                row.pos,
                row.counts.len(),
                self.populations.len()
            ))));
        }
        Some(Ok(row))
    }
}
