use crate::abundance::{add_species_header, write_abundance};
use crate::ganon::Ganon;
use crate::genome_info::{self, StrainAbundance};
use crate::tax_profile::{RebuildOptions, rebuild};
use anyhow::{Context, Result, bail};
use log::info;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct ProfileConfig<'a> {
    pub reads: &'a [PathBuf],
    pub single: bool,
    pub db_prefix: &'a str,
    pub ref_info: &'a Path,
    pub out_dir: &'a Path,
    pub threads: usize,
    pub kmer: usize,
}

/// Profile reads against a custom database: classify and report through the
/// external binary, then reshape the report into the final per-strain and
/// per-species abundance tables.
pub fn run(ganon: &Ganon, cfg: &ProfileConfig) -> Result<()> {
    if cfg.reads.is_empty() {
        bail!("--reads/-r is required. Paired: -r R1 -r R2; single: --single with one -r per file.");
    }
    if !cfg.single && cfg.reads.len() % 2 != 0 {
        bail!(
            "paired mode expects mates in consecutive -r pairs; got {} read file(s)",
            cfg.reads.len()
        );
    }

    fs::create_dir_all(cfg.out_dir)
        .with_context(|| format!("creating output directory {}", cfg.out_dir.display()))?;

    let classify_prefix = cfg.out_dir.join("profile");
    ganon.classify(
        cfg.db_prefix,
        cfg.reads,
        cfg.single,
        cfg.threads,
        cfg.kmer,
        &classify_prefix,
    )?;

    let report_prefix = cfg.out_dir.join("tax_profile");
    ganon.report(
        cfg.db_prefix,
        &classify_prefix.with_extension("rep"),
        &report_prefix,
    )?;
    let tax_profile = report_prefix.with_extension("tre");

    let strain_file = cfg.out_dir.join("strain_abundance.txt");
    let strains = extract_strain_abundance(&tax_profile, &strain_file)?;
    info!(
        "extracted {} strain abundances to {}",
        strains.len(),
        strain_file.display()
    );

    let genomes = genome_info::read_genome_info(cfg.ref_info)?;
    let rows = genome_info::aggregate(&strains, &genomes);
    let table_file = cfg.out_dir.join("strain_species_abundance.tsv");
    genome_info::write_table(&table_file, &rows)?;

    let species = genome_info::species_abundance(&rows);
    let species_file = cfg.out_dir.join("species_abundance.txt");
    write_abundance(&species_file, &species)?;

    rebuild(
        &tax_profile,
        &species_file,
        Some(&tax_profile),
        &RebuildOptions::default(),
    )?;
    add_species_header(&species_file)?;

    info!("profiling finished; reports in {}", cfg.out_dir.display());
    Ok(())
}

/// Pull the `strain` rows out of the raw report: node id plus the trailing
/// abundance column, written out as a headered two-column table.
fn extract_strain_abundance(tax_profile: &Path, out_path: &Path) -> Result<Vec<StrainAbundance>> {
    if !tax_profile.exists() {
        bail!("tax_profile.tre not found: {}", tax_profile.display());
    }
    let file = File::open(tax_profile)
        .with_context(|| format!("opening {}", tax_profile.display()))?;

    let mut strains = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            continue;
        }
        if !fields[0].trim().eq_ignore_ascii_case("strain") {
            continue;
        }
        let Some(last) = fields.last() else {
            continue;
        };
        let Ok(abundance) = last.trim().parse::<f64>() else {
            continue;
        };
        strains.push(StrainAbundance {
            strain_taxid: fields[1].trim().to_string(),
            abundance,
        });
    }

    let out = File::create(out_path).with_context(|| format!("creating {}", out_path.display()))?;
    let mut w = BufWriter::new(out);
    writeln!(w, "strain_taxid\tabundance")?;
    for strain in &strains {
        writeln!(w, "{}\t{}", strain.strain_taxid, strain.abundance)?;
    }
    Ok(strains)
}
