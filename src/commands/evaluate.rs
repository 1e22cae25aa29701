use crate::metrics::{evaluate, read_table};
use anyhow::Result;
use log::info;
use std::path::Path;

pub struct EvaluateConfig<'a> {
    pub real: &'a Path,
    pub predict: &'a Path,
    pub output: &'a Path,
}

pub fn run(cfg: &EvaluateConfig) -> Result<()> {
    let real = read_table(cfg.real)?;
    let predicted = read_table(cfg.predict)?;
    let metrics = evaluate(&real, &predicted);
    metrics.write_report(cfg.output)?;
    info!("evaluation results saved to {}", cfg.output.display());
    Ok(())
}
