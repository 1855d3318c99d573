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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Convert VCF variant calls to counts format
    Convert {
        // Input VCF file(s), position-sorted
        #[arg(group = "input", required = true, help = "Input VCF file(s)")]
        input_files: Vec<PathBuf>,

        // Reference or alignment the variants were called against
        #[arg(short = 'r', long = "reference", required = true)]
        reference: PathBuf,

        // Output file path
        #[arg(short = 'o', long = "output", default_value = "counts.cf")]
        out_file: PathBuf,

        // Restrict the output to a region
        #[arg(long = "region", help = "Region as CHROM:START-END, 1-based inclusive")]
        region: Option<String>,

        // Merge all individuals of the i-th input into one population
        #[arg(long = "merge", value_delimiter = ',', help = "Per-input merge flags, e.g. true,false")]
        merge: Vec<bool>,

        // Override the derived population names
        #[arg(long = "names", value_delimiter = ',')]
        names: Vec<String>,

        // Character separating the population name from the individual
        #[arg(long = "split-char", default_value_t = '-')]
        split_char: char,

        // Genome copies per individual
        #[arg(long = "ploidy", default_value_t = 2)]
        ploidy: usize,

        // Keep one randomly picked individual per population
        #[arg(long = "one-individual", default_value_t = false)]
        one_individual: bool,

        // Only count 4-fold degenerate sites
        #[arg(long = "only-synonymous", default_value_t = false)]
        only_synonymous: bool,

        // Shift the written positions
        #[arg(long = "offset", default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Convert an aligned fasta file to counts format
    FromFasta {
        // Input fasta file
        #[arg(group = "input", required = true, help = "Input fasta file")]
        input_file: PathBuf,

        // Output file path
        #[arg(short = 'o', long = "output", default_value = "counts.cf")]
        out_file: PathBuf,

        // Character separating the population name from the individual
        #[arg(long = "split-char", default_value_t = '-')]
        split_char: char,

        // Chromosome name for the output rows
        #[arg(long = "chrom", default_value = "NA")]
        chrom: String,

        // Count unambiguous bases twice
        #[arg(long = "double-fixed-sites", default_value_t = false)]
        double_fixed_sites: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Convert counts format data to per-population fasta sequences
    ToFasta {
        // Input counts format file
        #[arg(group = "input", required = true, help = "Input counts format file")]
        input_file: PathBuf,

        // Output file path, writes to stdout if not given
        #[arg(short = 'o', long = "output", required = false)]
        out_file: Option<PathBuf>,

        // Take the most frequent base instead of sampling
        #[arg(long = "consensus", default_value_t = false)]
        consensus: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
