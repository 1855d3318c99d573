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

//! tally is a library and a command-line client for:
//!
//!   - Converting variant calls (VCF) aligned against a reference into
//!     the counts format used by polymorphism-aware phylogenetic models.
//!   - Converting aligned FASTA data into the counts format.
//!   - Converting counts format data back into per-population FASTA
//!     sequences.
//!
//! The counts format stores one line per site with one `A,C,G,T`
//! occurrence count tuple per population. Populations are groups of
//! individuals that share a name prefix, for example `sheep-1` and
//! `sheep-2` both count towards `sheep`.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The tally CLI supports the following subcommands:
//!   - `tally convert` count variant calls from VCF files against a reference.
//!   - `tally from-fasta` count the columns of an aligned FASTA file.
//!   - `tally to-fasta` sample per-population sequences from counts format data.
//!
//! Note that `convert` needs access to the reference the variants were
//! called against, because sites without a variant record are filled
//! in from the reference sequence.
//!
//! ### Rust API
//!
//! For use cases requiring access to a single record or site at a
//! time, the following structs are provided:
//!
//!   - [CfReader](parser::CfReader): takes a [BufRead] containing counts format text and iterates over [SiteCounts].
//!   - [CfWriter](printer::CfWriter): writes count rows and finalizes the counts format headers.
//!   - [VcfReader](parser::vcf::VcfReader): takes a [BufRead] containing VCF text and iterates over the records in a region.
//!   - [MfaReader](parser::fasta::MfaReader): reads the alignment blocks of a multiple-alignment FASTA stream.
//!   - [VariantMerger](merge::VariantMerger): merges position-sorted variant streams from several sources.
//!   - [SiteAccumulator](accumulate::SiteAccumulator): combines reference bases and variant calls into count tuples.
//!
//! These structs can be chained together to convert a set of VCF files
//! into counts format one region at a time; [write_cf_from_mfa] does
//! this for a whole alignment stream.
//!
//! See documentation for the appropriate functions or structs for usage
//! examples.

use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use rand::Rng;

use crate::accumulate::SiteAccumulator;
use crate::accumulate::SiteOutcome;
use crate::assign::PopulationMap;
use crate::errors::CfError;
use crate::merge::VariantIter;
use crate::merge::VariantMerger;
use crate::parser::fasta::MfaReader;
use crate::parser::fasta::Seq;
use crate::parser::fasta::orient_block;
use crate::parser::fasta::read_fasta;
use crate::parser::vcf::VcfReader;
use crate::printer::CfWriter;

pub mod accumulate;
pub mod assign;
pub mod encoding;
pub mod errors;
pub mod merge;
pub mod parser;
pub mod printer;

/// Occurrence counts of `a`, `c`, `g`, `t` in one population at one
/// site.
pub type BaseCounts = [u32; 4];

/// One parsed counts format data line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteCounts {
    pub chrom: String,
    pub pos: u64,
    /// One tuple per population, in header order.
    pub counts: Vec<BaseCounts>,
}

/// A genomic region with 1-based inclusive bounds.
///
/// ## Usage
///
/// ```rust
/// use tally::Region;
///
/// let region: Region = "chr1:100-200".parse().unwrap();
/// assert_eq!(region, Region::new("chr1", 100, 200));
/// assert_eq!(region.len(), 101);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(chrom: &str, start: u64, end: u64) -> Self {
        Region {
            chrom: chrom.to_string(),
            start,
            end,
        }
    }

    /// Number of sites in the region.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Overlap with another region, None when the regions are disjoint
    /// or on different chromosomes.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        if self.chrom != other.chrom {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end < start {
            return None;
        }
        Some(Region::new(&self.chrom, start, end))
    }
}

impl std::str::FromStr for Region {
    type Err = CfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CfError::InvalidRegion(s.to_string());
        // rsplit so that chromosome names may contain ':'
        let (chrom, range) = s.rsplit_once(':').ok_or_else(err)?;
        let (start, end) = range.split_once('-').ok_or_else(err)?;
        let start = start.parse::<u64>().map_err(|_| err())?;
        let end = end.parse::<u64>().map_err(|_| err())?;
        if chrom.is_empty() || start == 0 || end < start {
            return Err(err());
        }
        Ok(Region::new(chrom, start, end))
    }
}

/// Open a possibly gzipped file for buffered reading.
pub fn open_read(path: &Path) -> Result<BufReader<Box<dyn Read>>, CfError> {
    let file = std::fs::File::open(path)?;
    let conn: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BufReader::new(conn))
}

/// Open a file for buffered writing; gzip the output if the path ends
/// in `.gz`.
pub fn open_write(path: &Path) -> Result<Box<dyn Write>, CfError> {
    let file = std::fs::File::create(path)?;
    let conn: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(conn)
}

/// Write count rows for every site of `region`.
///
/// `reference` is anchored at genomic position `seq_start`. Sites that
/// the accumulator skips produce no row; a site where every tuple is
/// zero still does.
pub fn write_cf_region(
    writer: &mut CfWriter,
    acc: &mut SiteAccumulator,
    merger: &mut VariantMerger,
    reference: &Seq,
    seq_start: u64,
    region: &Region,
) -> Result<(), CfError> {
    for pos in region.start..=region.end {
        let batch = merger.batch_at(pos)?;
        match acc.accumulate(reference, seq_start, &region.chrom, pos, &batch)? {
            SiteOutcome::Counted => writer.write_row(&region.chrom, pos, acc.counts())?,
            SiteOutcome::NotSynonymousSite | SiteOutcome::InvalidReferenceBase => {}
        }
    }
    Ok(())
}

/// Convert variant calls into count rows, one alignment block at a
/// time.
///
/// The first sequence of each block in `mfa` is the reference; a plain
/// single-sequence FASTA file is one block covering the whole sequence.
/// Reverse-strand blocks are oriented forward before counting.
/// `region` restricts the output to blocks overlapping it.
///
/// The VCF sources are scanned strictly forward, so the blocks must
/// arrive in increasing genomic order.
pub fn write_cf_from_mfa<R: BufRead>(
    mfa: &mut MfaReader,
    sources: &mut [VcfReader<R>],
    populations: &PopulationMap,
    writer: &mut CfWriter,
    ploidy: u32,
    only_synonymous: bool,
    region: Option<&Region>,
) -> Result<(), CfError> {
    let mut acc = SiteAccumulator::new(populations, ploidy, only_synonymous)?;
    while let Some(mut block) = mfa.next_block()? {
        orient_block(&mut block, true);
        let reference = &block[0];
        let covered = reference
            .region()
            .cloned()
            .unwrap_or_else(|| Region::new(&reference.name, 1, reference.len() as u64));
        let wanted = match region {
            None => covered.clone(),
            Some(filter) => match covered.intersect(filter) {
                Some(overlap) => overlap,
                None => {
                    log::debug!(
                        "skipping block {}:{}-{} outside the requested region",
                        covered.chrom,
                        covered.start,
                        covered.end
                    );
                    // Still advance the variant cursors past the block
                    // so later blocks see the right records.
                    for source in sources.iter_mut() {
                        for record in source.fetch(&covered) {
                            record?;
                        }
                    }
                    continue;
                }
            },
        };
        let iters: Vec<VariantIter> = sources
            .iter_mut()
            .map(|source| Box::new(source.fetch(&wanted)) as VariantIter)
            .collect();
        let mut merger = VariantMerger::new(iters)?;
        write_cf_region(writer, &mut acc, &mut merger, reference, covered.start, &wanted)?;
    }
    Ok(())
}

/// Convert an aligned FASTA file into counts format.
///
/// Every input sequence is one individual; individuals sharing a name
/// prefix up to the last `split_char` form a population. Columns are
/// numbered from 1 on the artificial chromosome `chrom`.
///
/// With `double_fixed` set, unambiguous bases count twice so that
/// IUPAC-coded heterozygous sites keep their relative weight.
///
/// Returns the final output path.
pub fn fasta_to_cf(
    input: &Path,
    output: &Path,
    split_char: char,
    chrom: &str,
    double_fixed: bool,
) -> Result<PathBuf, CfError> {
    let seqs = read_fasta(input)?;
    if seqs.is_empty() {
        return Err(CfError::EmptyInput);
    }
    let length = seqs[0].len();
    for seq in &seqs[1..] {
        if seq.len() != length {
            return Err(CfError::UnequalSequenceLengths(
                seqs[0].name.clone(),
                seq.name.clone(),
            ));
        }
    }

    let names: Vec<String> = seqs.iter().map(|seq| seq.name.clone()).collect();
    let populations = PopulationMap::resolve(&[names], None, None, split_char)?;
    let assignment = populations.assignment(0).to_vec();
    let mut acc = SiteAccumulator::new(&populations, 1, false)?;

    let mut writer = CfWriter::create(output, populations.names())?;
    for index in 0..length {
        let pos = (index + 1) as u64;
        acc.reset();
        for (i, seq) in seqs.iter().enumerate() {
            // base_at is in bounds, the lengths were checked above
            if let Some(symbol) = seq.base_at(index) {
                acc.add_base(assignment[i], symbol, double_fixed, chrom, pos)?;
            }
        }
        writer.write_row(chrom, pos, acc.counts())?;
    }
    writer.finish()
}

/// Convert counts format data into one FASTA sequence per population.
///
/// Bases are sampled from the count tuples, or taken as the consensus
/// when `consensus` is set.
pub fn cf_to_fasta(input: &Path, output: &Path, consensus: bool) -> Result<(), CfError> {
    let mut reader = parser::CfReader::from_path(input)?;
    let mut conn = open_write(output)?;
    let mut rng = rand::rng();
    printer::fasta::write_fasta(&mut reader, &mut conn, consensus, &mut rng)?;
    conn.flush()?;
    Ok(())
}

/// Reduce every population to one randomly chosen individual.
///
/// Returns the picked individual names in population order so callers
/// can record them next to the counts; the reduction itself happens in
/// [PopulationMap::keep_one_individual].
pub fn sample_one_individual(
    populations: &mut PopulationMap,
    rng: &mut impl Rng,
) -> Vec<String> {
    let picked = populations.keep_one_individual(rng);
    for (name, individual) in populations.names().iter().zip(picked.iter()) {
        log::info!("population {} is represented by {}", name, individual);
    }
    picked
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn region_parsing() {
        use crate::errors::CfError;
        use super::Region;

        let region: Region = "chr1:100-200".parse().unwrap();
        assert_eq!(region, Region::new("chr1", 100, 200));

        // Chromosome names may contain the separator.
        let odd: Region = "scaffold:1:5-10".parse().unwrap();
        assert_eq!(odd, Region::new("scaffold:1", 5, 10));

        assert!(matches!("chr1".parse::<Region>(), Err(CfError::InvalidRegion(_))));
        assert!(matches!("chr1:0-5".parse::<Region>(), Err(CfError::InvalidRegion(_))));
        assert!(matches!("chr1:7-5".parse::<Region>(), Err(CfError::InvalidRegion(_))));
    }

    #[test]
    fn region_intersection() {
        use super::Region;

        let a = Region::new("1", 5, 15);
        assert_eq!(a.intersect(&Region::new("1", 10, 20)), Some(Region::new("1", 10, 15)));
        assert_eq!(a.intersect(&Region::new("1", 16, 20)), None);
        assert_eq!(a.intersect(&Region::new("2", 5, 15)), None);
    }

    #[test]
    fn write_cf_region_fills_sites_without_variants() {
        use crate::accumulate::SiteAccumulator;
        use crate::assign::PopulationMap;
        use crate::merge::VariantIter;
        use crate::merge::VariantMerger;
        use crate::parser::CfReader;
        use crate::parser::fasta::Seq;
        use crate::parser::vcf::VariantRecord;
        use crate::printer::CfWriter;
        use super::Region;
        use super::write_cf_region;

        let individuals = vec![vec!["sheep-1".to_string(), "sheep-2".to_string()]];
        let populations = PopulationMap::resolve(&individuals, None, None, '-').unwrap();
        let mut acc = SiteAccumulator::new(&populations, 2, false).unwrap();

        let reference = Seq::new("1", None, b"acgt".to_vec());
        let record = VariantRecord {
            chrom: "1".to_string(),
            pos: 3,
            ref_allele: "G".to_string(),
            alt_alleles: vec!["T".to_string()],
            genotypes: vec![vec![Some(0), Some(1)], vec![Some(1), Some(1)]],
        };
        let source: VariantIter = Box::new([record].into_iter().map(Ok));
        let mut merger = VariantMerger::new(vec![source]).unwrap();

        let path = std::env::temp_dir().join("tally_write_cf_region_test.cf");
        let mut writer = CfWriter::create(&path, populations.names()).unwrap();
        let region = Region::new("1", 1, 4);

        write_cf_region(&mut writer, &mut acc, &mut merger, &reference, 1, &region).unwrap();
        writer.finish().unwrap();

        let reader = CfReader::from_path(&path).unwrap();
        let rows: Vec<_> = reader.map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        // Sites 1, 2 and 4 are filled from the reference at ploidy 2.
        assert_eq!(rows[0].counts, vec![[4, 0, 0, 0]]);
        assert_eq!(rows[1].counts, vec![[0, 4, 0, 0]]);
        assert_eq!(rows[3].counts, vec![[0, 0, 0, 4]]);
        // Site 3 has one het and one hom alt individual.
        assert_eq!(rows[2].counts, vec![[0, 0, 1, 3]]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_cf_from_mfa_converts_blocks_in_order() {
        use std::io::Cursor;
        use crate::assign::PopulationMap;
        use crate::parser::CfReader;
        use crate::parser::fasta::MfaReader;
        use crate::parser::vcf::VcfReader;
        use crate::printer::CfWriter;
        use super::write_cf_from_mfa;

        let mfa = "\
>ref 1:11-12 +\nac\n>outgroup\nac\n\
>ref 1:21-22 +\ngt\n>outgroup\ngt\n";
        let vcf = "\
##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsheep-1\tsheep-2\n\
1\t11\t.\tA\tG\t.\t.\t.\tGT\t0/1\t1/1\n\
1\t22\t.\tT\tC\t.\t.\t.\tGT\t0/0\t0/1\n";

        let mut mfa_reader = MfaReader::from_reader(Cursor::new(mfa.as_bytes().to_vec())).unwrap();
        let mut sources = vec![VcfReader::new(Cursor::new(vcf.as_bytes()), 2).unwrap()];
        let individuals = vec![sources[0].individuals().to_vec()];
        let populations = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        let path = std::env::temp_dir().join("tally_write_cf_from_mfa_test.cf");
        let mut writer = CfWriter::create(&path, populations.names()).unwrap();

        write_cf_from_mfa(
            &mut mfa_reader,
            &mut sources,
            &populations,
            &mut writer,
            2,
            false,
            None,
        )
        .unwrap();
        writer.finish().unwrap();

        let reader = CfReader::from_path(&path).unwrap();
        let rows: Vec<_> = reader.map(|row| row.unwrap()).collect();
        let positions: Vec<u64> = rows.iter().map(|row| row.pos).collect();
        assert_eq!(positions, vec![11, 12, 21, 22]);
        // Site 11: one het and one hom alt sheep over reference 'a'.
        assert_eq!(rows[0].counts, vec![[1, 0, 3, 0]]);
        // Site 12 is filled from the reference.
        assert_eq!(rows[1].counts, vec![[0, 4, 0, 0]]);
        // Site 22: one het sheep over reference 't'.
        assert_eq!(rows[3].counts, vec![[0, 1, 0, 3]]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_cf_from_mfa_crosses_chromosomes() {
        use std::io::Cursor;
        use crate::assign::PopulationMap;
        use crate::parser::CfReader;
        use crate::parser::fasta::MfaReader;
        use crate::parser::vcf::VcfReader;
        use crate::printer::CfWriter;
        use super::write_cf_from_mfa;

        let mfa = "\
>ref 1:1-2 +\nac\n>outgroup\nac\n\
>ref 2:1-2 +\ngt\n>outgroup\ngt\n";
        let vcf = "\
##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsheep-1\tsheep-2\n\
1\t1\t.\tA\tG\t.\t.\t.\tGT\t0/1\t1/1\n\
2\t2\t.\tT\tC\t.\t.\t.\tGT\t0/0\t0/1\n";

        let mut mfa_reader = MfaReader::from_reader(Cursor::new(mfa.as_bytes().to_vec())).unwrap();
        let mut sources = vec![VcfReader::new(Cursor::new(vcf.as_bytes()), 2).unwrap()];
        let individuals = vec![sources[0].individuals().to_vec()];
        let populations = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        let path = std::env::temp_dir().join("tally_write_cf_from_mfa_chroms_test.cf");
        let mut writer = CfWriter::create(&path, populations.names()).unwrap();

        write_cf_from_mfa(
            &mut mfa_reader,
            &mut sources,
            &populations,
            &mut writer,
            2,
            false,
            None,
        )
        .unwrap();
        writer.finish().unwrap();

        let reader = CfReader::from_path(&path).unwrap();
        let rows: Vec<_> = reader.map(|row| row.unwrap()).collect();
        let sites: Vec<(String, u64)> = rows
            .iter()
            .map(|row| (row.chrom.clone(), row.pos))
            .collect();
        assert_eq!(
            sites,
            vec![
                ("1".to_string(), 1),
                ("1".to_string(), 2),
                ("2".to_string(), 1),
                ("2".to_string(), 2)
            ]
        );
        // Chromosome 1 site 1: one het and one hom alt sheep over 'a'.
        assert_eq!(rows[0].counts, vec![[1, 0, 3, 0]]);
        // The chromosome 2 variant must not be lost to the chromosome
        // 1 scan: one het sheep over reference 't'.
        assert_eq!(rows[3].counts, vec![[0, 1, 0, 3]]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn one_individual_reduction_reports_the_picked_names() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use crate::assign::EXCLUDED;
        use crate::assign::PopulationMap;
        use super::sample_one_individual;

        let individuals = vec![vec![
            "sheep-1".to_string(),
            "sheep-2".to_string(),
            "wolf-1".to_string(),
            "wolf-2".to_string(),
        ]];
        let mut populations = PopulationMap::resolve(&individuals, None, None, '-').unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = sample_one_individual(&mut populations, &mut rng);

        // One name per population, each belonging to its population.
        assert_eq!(picked.len(), 2);
        assert!(picked[0].starts_with("sheep"));
        assert!(picked[1].starts_with("wolf"));
        // Only the picked individuals remain assigned.
        let remaining: Vec<&str> = populations
            .assignment(0)
            .iter()
            .zip(individuals[0].iter())
            .filter(|(slot, _)| **slot != EXCLUDED)
            .map(|(_, name)| name.as_str())
            .collect();
        assert_eq!(remaining, vec![picked[0].as_str(), picked[1].as_str()]);
    }
}
