use anyhow::{Context, Result, bail};
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const GANON_BIN_ENV: &str = "THEMIS_GANON_BIN";

/// Handle on the external classifier binary. Resolved once at startup and
/// passed into commands as a value, so dispatch stays testable without
/// touching the environment.
#[derive(Debug, Clone)]
pub struct Ganon {
    binary: String,
}

impl Ganon {
    pub fn new(binary: impl Into<String>) -> Self {
        Ganon {
            binary: binary.into(),
        }
    }

    pub fn from_env() -> Self {
        Ganon::new(env::var(GANON_BIN_ENV).unwrap_or_else(|_| "ganon".to_string()))
    }

    /// Forward arguments verbatim to `<binary> build-custom`.
    pub fn build_custom(&self, args: &[String]) -> Result<()> {
        let mut full = vec!["build-custom".to_string()];
        full.extend(args.iter().cloned());
        self.run(&full)
    }

    pub fn classify(
        &self,
        db_prefix: &str,
        reads: &[PathBuf],
        single: bool,
        threads: usize,
        kmer: usize,
        output_prefix: &Path,
    ) -> Result<()> {
        self.run(&classify_args(
            db_prefix,
            reads,
            single,
            threads,
            kmer,
            output_prefix,
        ))
    }

    pub fn report(&self, db_prefix: &str, rep: &Path, output_prefix: &Path) -> Result<()> {
        self.run(&report_args(db_prefix, rep, output_prefix))
    }

    /// Run one invocation to completion; a non-zero exit becomes an error
    /// carrying the subcommand and status.
    fn run(&self, args: &[String]) -> Result<()> {
        info!("running: {} {}", self.binary, args.join(" "));
        let status = Command::new(&self.binary)
            .args(args)
            .status()
            .with_context(|| format!("failed to run {}", self.binary))?;
        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            bail!(
                "{} {} exited with status {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or(""),
                code
            );
        }
        Ok(())
    }
}

pub fn classify_args(
    db_prefix: &str,
    reads: &[PathBuf],
    single: bool,
    threads: usize,
    kmer: usize,
    output_prefix: &Path,
) -> Vec<String> {
    let mut args = vec![
        "classify".to_string(),
        "--db-prefix".to_string(),
        db_prefix.to_string(),
        "--output-prefix".to_string(),
        output_prefix.display().to_string(),
        "--threads".to_string(),
        threads.to_string(),
        "--kmer-size".to_string(),
        kmer.to_string(),
    ];
    args.push(if single {
        "--single-reads".to_string()
    } else {
        "--paired-reads".to_string()
    });
    for read in reads {
        args.push(read.display().to_string());
    }
    args
}

pub fn report_args(db_prefix: &str, rep: &Path, output_prefix: &Path) -> Vec<String> {
    vec![
        "report".to_string(),
        "--db-prefix".to_string(),
        db_prefix.to_string(),
        "--input".to_string(),
        rep.display().to_string(),
        "--output-prefix".to_string(),
        output_prefix.display().to_string(),
        "--report-type".to_string(),
        "abundance".to_string(),
        "--ranks".to_string(),
        "all".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_args_paired() {
        let reads = vec![PathBuf::from("r1.fq"), PathBuf::from("r2.fq")];
        let args = classify_args("db/themis", &reads, false, 8, 31, Path::new("out/profile"));
        assert_eq!(
            args,
            vec![
                "classify",
                "--db-prefix",
                "db/themis",
                "--output-prefix",
                "out/profile",
                "--threads",
                "8",
                "--kmer-size",
                "31",
                "--paired-reads",
                "r1.fq",
                "r2.fq",
            ]
        );
    }

    #[test]
    fn classify_args_single() {
        let reads = vec![PathBuf::from("r.fq")];
        let args = classify_args("db", &reads, true, 4, 19, Path::new("out/p"));
        assert!(args.contains(&"--single-reads".to_string()));
        assert!(!args.contains(&"--paired-reads".to_string()));
        assert_eq!(args.last().unwrap(), "r.fq");
    }

    #[test]
    fn report_args_request_abundance_over_all_ranks() {
        let args = report_args("db", Path::new("out/profile.rep"), Path::new("out/tax_profile"));
        assert_eq!(args[0], "report");
        assert!(args.windows(2).any(|w| w[0] == "--report-type" && w[1] == "abundance"));
        assert!(args.windows(2).any(|w| w[0] == "--ranks" && w[1] == "all"));
    }
}
