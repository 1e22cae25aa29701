use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub const SPECIES_ID_HEADER: &str = "Species_TaxID";
pub const SPECIES_ABUNDANCE_HEADER: &str = "Relative_Abundance";

/// Read a two-column `identifier<TAB>value` table into a map.
///
/// Tolerant by design: blank lines, rows with fewer than two fields and rows
/// whose value does not parse as a float (a header row, typically) are
/// dropped. Later occurrences of an identifier overwrite earlier ones.
pub fn read_abundance(path: &Path) -> Result<HashMap<String, f64>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut map = HashMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }
        let Ok(value) = fields[1].trim().parse::<f64>() else {
            continue;
        };
        map.insert(fields[0].trim().to_string(), value);
    }

    Ok(map)
}

pub fn write_abundance(path: &Path, rows: &[(String, f64)]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for (id, value) in rows {
        writeln!(out, "{}\t{}", id, value)?;
    }
    Ok(())
}

/// Prepend the `Species_TaxID<TAB>Relative_Abundance` header to a two-column
/// species abundance file in place. A first line whose second field does not
/// parse as a float already is a header, so calling this twice leaves the
/// file unchanged. An empty file becomes header-only.
pub fn add_species_header(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("species_abundance.txt not found: {}", path.display());
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let lines: Vec<&str> = text.lines().collect();

    if lines.is_empty() {
        fs::write(
            path,
            format!("{}\t{}\n", SPECIES_ID_HEADER, SPECIES_ABUNDANCE_HEADER),
        )
        .with_context(|| format!("writing {}", path.display()))?;
        return Ok(());
    }

    let first: Vec<&str> = lines[0].split('\t').collect();
    let has_header = first.len() >= 2 && first[1].trim().parse::<f64>().is_err();
    if has_header {
        return Ok(());
    }

    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(SPECIES_ID_HEADER);
    out.push('\t');
    out.push_str(SPECIES_ABUNDANCE_HEADER);
    out.push('\n');
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
