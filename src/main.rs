mod abundance;
mod commands;
mod ganon;
mod genome_info;
mod metrics;
mod tax_profile;

use crate::commands::aggregate::AggregateConfig;
use crate::commands::build_custom::BuildCustomConfig;
use crate::commands::evaluate::EvaluateConfig;
use crate::commands::profile::ProfileConfig;
use crate::ganon::Ganon;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Themis: a robust and accurate species-level metagenomic profiler.",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build custom themis databases
    #[command(disable_help_flag = true)]
    BuildCustom {
        /// Arguments passed directly to the classifier's build-custom
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Profile reads against custom databases
    Profile {
        /// Read file(s). For paired-end data, specify mates consecutively:
        /// -r R1.fq -r R2.fq. For single-end data, use --single and give one
        /// -r per file
        #[arg(short = 'r', long = "reads", required = true)]
        reads: Vec<PathBuf>,
        /// Treat input as single-end reads
        #[arg(long)]
        single: bool,
        /// Database input prefix
        #[arg(long)]
        db_prefix: String,
        /// Tab-separated reference metadata file with genome_ID,
        /// strain_taxid, species_taxid and organism_name columns
        #[arg(long)]
        ref_info: PathBuf,
        /// Output directory for profiling results
        #[arg(long)]
        out: PathBuf,
        /// Number of threads
        #[arg(long, default_value_t = 8)]
        threads: usize,
        /// k-mer size used in the profiling step
        #[arg(short = 'k', long, default_value_t = 31)]
        kmer: usize,
    },
    /// Join a strain abundance table to genome metadata and roll up
    /// per-species totals
    Aggregate {
        /// Strain abundance table with strain_taxid and abundance columns
        #[arg(long)]
        abundance: PathBuf,
        /// Genome info table
        #[arg(long)]
        genome: PathBuf,
        /// Output table
        #[arg(long)]
        output: PathBuf,
    },
    /// Evaluate a predicted species abundance table against ground truth
    Evaluate {
        /// Real (ground truth) two-column abundance table
        #[arg(long)]
        real: PathBuf,
        /// Predicted two-column abundance table
        #[arg(long)]
        predict: PathBuf,
        /// Output metrics TSV
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let ganon = Ganon::from_env();

    match &cli.command {
        Commands::BuildCustom { args } => {
            commands::build_custom::run(&ganon, &BuildCustomConfig { args })
        }
        Commands::Profile {
            reads,
            single,
            db_prefix,
            ref_info,
            out,
            threads,
            kmer,
        } => commands::profile::run(
            &ganon,
            &ProfileConfig {
                reads,
                single: *single,
                db_prefix,
                ref_info,
                out_dir: out,
                threads: *threads,
                kmer: *kmer,
            },
        ),
        Commands::Aggregate {
            abundance,
            genome,
            output,
        } => commands::aggregate::run(&AggregateConfig {
            abundance,
            genome,
            output,
        }),
        Commands::Evaluate {
            real,
            predict,
            output,
        } => commands::evaluate::run(&EvaluateConfig {
            real,
            predict,
            output,
        }),
    }
}
