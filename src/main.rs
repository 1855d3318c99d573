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
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;

use tally::Region;
use tally::assign::PopulationMap;
use tally::parser::fasta::MfaReader;
use tally::parser::vcf::VcfReader;
use tally::printer::CfWriter;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .module("tally")
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn convert(
    input_files: &[PathBuf],
    reference: &Path,
    out_file: &Path,
    region: Option<&str>,
    merge: &[bool],
    names: &[String],
    split_char: char,
    ploidy: usize,
    one_individual: bool,
    only_synonymous: bool,
    offset: i64,
) -> Result<(), E> {
    let region = region.map(str::parse::<Region>).transpose()?;

    let mut sources = Vec::with_capacity(input_files.len());
    for file in input_files {
        sources.push(VcfReader::new(tally::open_read(file)?, ploidy)?);
    }
    let individuals: Vec<Vec<String>> = sources
        .iter()
        .map(|source| source.individuals().to_vec())
        .collect();

    let merge = if merge.is_empty() { None } else { Some(merge) };
    let names = if names.is_empty() { None } else { Some(names) };
    let mut populations = PopulationMap::resolve(&individuals, merge, names, split_char)?;
    let picked = if one_individual {
        Some(tally::sample_one_individual(&mut populations, &mut rand::rng()))
    } else {
        None
    };
    log::info!(
        "counting {} individuals into {} populations",
        individuals.iter().map(|source| source.len()).sum::<usize>(),
        populations.n_populations()
    );

    let mut writer = CfWriter::create(out_file, populations.names())?;
    writer.set_offset(offset);
    writer.write_comment(&std::env::args().collect::<Vec<String>>().join(" "))?;
    if let Some(picked) = &picked {
        writer.write_comment("One individual per population only.")?;
        writer.write_comment(&format!("Picked individuals: {}", picked.join(" ")))?;
    }

    let mut mfa = MfaReader::from_path(reference)?;
    tally::write_cf_from_mfa(
        &mut mfa,
        &mut sources,
        &populations,
        &mut writer,
        ploidy as u32,
        only_synonymous,
        region.as_ref(),
    )?;

    let n_sites = writer.n_sites();
    let path = writer.finish()?;
    log::info!("wrote {} sites to {}", n_sites, path.display());
    Ok(())
}

fn from_fasta(
    input_file: &Path,
    out_file: &Path,
    split_char: char,
    chrom: &str,
    double_fixed_sites: bool,
) -> Result<(), E> {
    let path = tally::fasta_to_cf(input_file, out_file, split_char, chrom, double_fixed_sites)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn to_fasta(input_file: &Path, out_file: Option<&Path>, consensus: bool) -> Result<(), E> {
    match out_file {
        Some(path) => tally::cf_to_fasta(input_file, path, consensus)?,
        None => {
            let mut reader = tally::parser::CfReader::from_path(input_file)?;
            let stdout = std::io::stdout();
            let mut conn_out = stdout.lock();
            tally::printer::fasta::write_fasta(
                &mut reader,
                &mut conn_out,
                consensus,
                &mut rand::rng(),
            )?;
            conn_out.flush()?;
        }
    }
    Ok(())
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    let res: Result<(), E> = match &cli.command {
        // Convert
        Some(cli::Commands::Convert {
            input_files,
            reference,
            out_file,
            region,
            merge,
            names,
            split_char,
            ploidy,
            one_individual,
            only_synonymous,
            offset,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            convert(
                input_files,
                reference,
                out_file,
                region.as_deref(),
                merge,
                names,
                *split_char,
                *ploidy,
                *one_individual,
                *only_synonymous,
                *offset,
            )
        },

        // FromFasta
        Some(cli::Commands::FromFasta {
            input_file,
            out_file,
            split_char,
            chrom,
            double_fixed_sites,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            from_fasta(input_file, out_file, *split_char, chrom, *double_fixed_sites)
        },

        // ToFasta
        Some(cli::Commands::ToFasta {
            input_file,
            out_file,
            consensus,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            to_fasta(input_file, out_file.as_deref(), *consensus)
        },
        None => {
            eprintln!("Usage: tally <COMMAND>, see --help for the available commands.");
            std::process::exit(2);
        },
    };

    if let Err(e) = res {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
