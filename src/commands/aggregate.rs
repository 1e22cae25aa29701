use crate::genome_info::{aggregate, read_genome_info, read_strain_abundance, write_table};
use anyhow::Result;
use log::info;
use std::path::Path;

pub struct AggregateConfig<'a> {
    pub abundance: &'a Path,
    pub genome: &'a Path,
    pub output: &'a Path,
}

pub fn run(cfg: &AggregateConfig) -> Result<()> {
    let strains = read_strain_abundance(cfg.abundance)?;
    let genomes = read_genome_info(cfg.genome)?;
    let rows = aggregate(&strains, &genomes);
    write_table(cfg.output, &rows)?;
    info!("results saved to {}", cfg.output.display());
    Ok(())
}
