use crate::abundance::read_abundance;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct RebuildOptions {
    pub drop_root: bool,
    pub drop_strain: bool,
    pub zero_eps: f64,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        RebuildOptions {
            drop_root: true,
            drop_strain: true,
            zero_eps: 1e-10,
        }
    }
}

/// Rebuild a classifier tax profile so every kept row carries the abundance
/// implied by the final species-level values.
///
/// Rows are `level<TAB>node_id<TAB>pipe|delimited|id|set<TAB>...`; the id set
/// of a species row is its path through the tree, so a higher node aggregates
/// exactly the species rows whose set contains its id. Species rows take
/// their value from the abundance table directly. Rows whose computed value
/// is below `zero_eps` in magnitude are pruned; the kept rows are written as
/// their first four columns (padded to four) plus the value.
///
/// The default output path is `tax_profile.tre` next to `species_abundance`,
/// which may coincide with the input; the input is fully read before the
/// output file is opened.
pub fn rebuild(
    tax_profile: &Path,
    species_abundance: &Path,
    out_path: Option<&Path>,
    opts: &RebuildOptions,
) -> Result<PathBuf> {
    if !tax_profile.exists() {
        bail!("tax_profile.tre not found: {}", tax_profile.display());
    }
    if !species_abundance.exists() {
        bail!("species_abundance.txt not found: {}", species_abundance.display());
    }

    let out_path = match out_path {
        Some(p) => p.to_path_buf(),
        None => species_abundance
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("tax_profile.tre"),
    };
    if let Some(dir) = out_path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
        }
    }

    let sp_abund = read_abundance(species_abundance)?;
    let text = fs::read_to_string(tax_profile)
        .with_context(|| format!("reading {}", tax_profile.display()))?;
    let lines: Vec<&str> = text.lines().collect();

    // 1st pass: species rows and their id sets
    let mut species: Vec<(String, HashSet<String>)> = Vec::new();
    for line in &lines {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        if !parts[0].trim().eq_ignore_ascii_case("species") {
            continue;
        }
        species.push((parts[1].trim().to_string(), parse_id_set(parts[2])));
    }

    // 2nd pass: compute abundance per row and write
    let file = File::create(&out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;
    let mut out = BufWriter::new(file);
    for line in &lines {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        let level = parts[0].trim().to_ascii_lowercase();
        if opts.drop_root && level == "root" {
            continue;
        }
        if opts.drop_strain && level == "strain" {
            continue;
        }

        let node_id = parts[1].trim();
        let abundance: f64 = if level == "species" {
            sp_abund.get(node_id).copied().unwrap_or(0.0)
        } else {
            species
                .iter()
                .filter(|(_, id_set)| id_set.contains(node_id))
                .map(|(sp_id, _)| sp_abund.get(sp_id).copied().unwrap_or(0.0))
                .sum()
        };
        if abundance.abs() < opts.zero_eps {
            continue;
        }

        let mut first_four: Vec<&str> = parts.iter().take(4).copied().collect();
        while first_four.len() < 4 {
            first_four.push("");
        }
        writeln!(out, "{}\t{}", first_four.join("\t"), abundance)?;
    }

    Ok(out_path)
}

fn parse_id_set(field: &str) -> HashSet<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return HashSet::new();
    }
    trimmed.split('|').map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const PROFILE: &str = "root\t1\t1\troot\n\
        genus\t766\t1|766\tRickettsia\n\
        species\t780\t1|766|780\tRickettsia rickettsii\n\
        species\t785\t1|766|785\tRickettsia typhi\n\
        species\t9606\t1|9605|9606\tHomo sapiens\n\
        strain\t780.1\t1|766|780|780.1\tstrain A\n";

    #[test]
    fn non_species_rows_sum_their_species() {
        let dir = tempfile::tempdir().unwrap();
        let tre = write_file(&dir, "tax_profile.tre", PROFILE);
        let sp = write_file(&dir, "species_abundance.txt", "780\t0.4\n785\t0.1\n9606\t0.5\n");

        let out = rebuild(&tre, &sp, Some(&dir.path().join("out.tre")), &RebuildOptions::default())
            .unwrap();
        let text = fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "genus\t766\t1|766\tRickettsia\t0.5");
        assert_eq!(lines[1], "species\t780\t1|766|780\tRickettsia rickettsii\t0.4");
        assert_eq!(lines[2], "species\t785\t1|766|785\tRickettsia typhi\t0.1");
        assert_eq!(lines[3], "species\t9606\t1|9605|9606\tHomo sapiens\t0.5");
    }

    #[test]
    fn root_and_strain_rows_can_be_kept() {
        let dir = tempfile::tempdir().unwrap();
        let tre = write_file(&dir, "tax_profile.tre", PROFILE);
        let sp = write_file(&dir, "species_abundance.txt", "780\t0.4\n785\t0.1\n9606\t0.5\n");

        let opts = RebuildOptions {
            drop_root: false,
            drop_strain: false,
            ..RebuildOptions::default()
        };
        let out = rebuild(&tre, &sp, Some(&dir.path().join("out.tre")), &opts).unwrap();
        let text = fs::read_to_string(out).unwrap();

        assert!(text.lines().any(|l| l.starts_with("root\t1\t")));
        // the strain row aggregates nothing: no species id set contains 780.1
        assert!(!text.contains("780.1"));
    }

    #[test]
    fn values_below_epsilon_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let tre = write_file(&dir, "tax_profile.tre", "species\t200\t200\n");

        let sp = write_file(&dir, "species_abundance.txt", "200\t0.0\n");
        let out = rebuild(&tre, &sp, Some(&dir.path().join("out.tre")), &RebuildOptions::default())
            .unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "");

        let sp = write_file(&dir, "species_abundance.txt", "200\t1e-5\n");
        let out = rebuild(&tre, &sp, Some(&dir.path().join("out.tre")), &RebuildOptions::default())
            .unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "species\t200\t200\t\t0.00001\n");
    }

    #[test]
    fn short_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let tre = write_file(&dir, "tax_profile.tre", "species\t200\nspecies\t300\t300\n");
        let sp = write_file(&dir, "species_abundance.txt", "200\t1.0\n300\t1.0\n");

        let out = rebuild(&tre, &sp, Some(&dir.path().join("out.tre")), &RebuildOptions::default())
            .unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert_eq!(text, "species\t300\t300\t\t1\n");
    }

    #[test]
    fn default_output_lands_next_to_species_abundance() {
        let dir = tempfile::tempdir().unwrap();
        let tre = write_file(&dir, "raw.tre", "species\t300\t300\tname\textra\n");
        let sp = write_file(&dir, "species_abundance.txt", "300\t0.9\n");

        let out = rebuild(&tre, &sp, None, &RebuildOptions::default()).unwrap();
        assert_eq!(out, dir.path().join("tax_profile.tre"));
        // columns past the fourth are not carried over
        assert_eq!(fs::read_to_string(&out).unwrap(), "species\t300\t300\tname\t0.9\n");
    }

    #[test]
    fn missing_inputs_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let sp = write_file(&dir, "species_abundance.txt", "300\t0.9\n");

        let err = rebuild(&dir.path().join("absent.tre"), &sp, None, &RebuildOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("absent.tre"));

        let tre = write_file(&dir, "raw.tre", "species\t300\t300\n");
        let err = rebuild(&tre, &dir.path().join("gone.txt"), None, &RebuildOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("gone.txt"));
    }
}
