use anyhow::{Context, Result, bail};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct GenomeRecord {
    pub genome_id: String,
    pub strain_taxid: String,
    pub species_taxid: String,
    pub organism_name: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct StrainAbundance {
    pub strain_taxid: String,
    pub abundance: f64,
}

/// One row of the strain/species abundance table. `genome_id` carries the
/// strain taxid as given in the abundance table (the join key); the remaining
/// fields come from the matched genome record and are absent for strains
/// without one.
#[derive(Debug, Clone)]
pub struct StrainSpeciesRow {
    pub genome_id: String,
    pub strain_abundance: f64,
    pub strain_taxid: Option<String>,
    pub species_taxid: Option<String>,
    pub species_abundance: Option<f64>,
}

/// Parse the genome metadata table. The header must carry `genome_ID`,
/// `strain_taxid`, `species_taxid` and `organism_name`; every field is kept
/// as a string.
pub fn read_genome_info(path: &Path) -> Result<Vec<GenomeRecord>> {
    let file =
        File::open(path).with_context(|| format!("opening genome info {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header_line = match lines.next() {
        Some(line) => line?,
        None => bail!("genome info {} is empty", path.display()),
    };
    let header: Vec<&str> = header_line.split('\t').collect();
    let genome_idx = column_index(&header, "genome_ID", path)?;
    let strain_idx = column_index(&header, "strain_taxid", path)?;
    let species_idx = column_index(&header, "species_taxid", path)?;
    let name_idx = column_index(&header, "organism_name", path)?;
    let id_idx = header.iter().position(|h| h.trim() == "id");

    let needed = genome_idx.max(strain_idx).max(species_idx).max(name_idx);
    let mut records = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= needed {
            continue;
        }
        records.push(GenomeRecord {
            genome_id: fields[genome_idx].trim().to_string(),
            strain_taxid: fields[strain_idx].trim().to_string(),
            species_taxid: fields[species_idx].trim().to_string(),
            organism_name: fields[name_idx].trim().to_string(),
            id: id_idx
                .and_then(|i| fields.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        });
    }
    Ok(records)
}

/// Parse a headered strain abundance table, selecting the `strain_taxid` and
/// `abundance` columns by name. Rows whose abundance does not parse are
/// dropped.
pub fn read_strain_abundance(path: &Path) -> Result<Vec<StrainAbundance>> {
    let file = File::open(path)
        .with_context(|| format!("opening strain abundance {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let header_line = match lines.next() {
        Some(line) => line?,
        None => bail!("strain abundance {} is empty", path.display()),
    };
    let header: Vec<&str> = header_line.split('\t').collect();
    let strain_idx = column_index(&header, "strain_taxid", path)?;
    let abundance_idx = column_index(&header, "abundance", path)?;

    let needed = strain_idx.max(abundance_idx);
    let mut strains = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= needed {
            continue;
        }
        let Ok(abundance) = fields[abundance_idx].trim().parse::<f64>() else {
            continue;
        };
        strains.push(StrainAbundance {
            strain_taxid: fields[strain_idx].trim().to_string(),
            abundance,
        });
    }
    Ok(strains)
}

fn column_index(header: &[&str], name: &str, path: &Path) -> Result<usize> {
    header
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("missing column '{}' in {}", name, path.display()))
}

/// Left-join strain abundances to genome metadata on
/// `strain_taxid = genome_ID`, roll abundance up per species taxid and
/// annotate every strain row with its species total. Rows are ordered by
/// species taxid parsed as a number, non-numeric or missing keys last, ties
/// in input order.
pub fn aggregate(strains: &[StrainAbundance], genomes: &[GenomeRecord]) -> Vec<StrainSpeciesRow> {
    let by_genome_id: HashMap<&str, &GenomeRecord> =
        genomes.iter().map(|g| (g.genome_id.as_str(), g)).collect();

    let mut rows: Vec<StrainSpeciesRow> = strains
        .iter()
        .map(|s| {
            let genome = by_genome_id.get(s.strain_taxid.as_str());
            StrainSpeciesRow {
                genome_id: s.strain_taxid.clone(),
                strain_abundance: s.abundance,
                strain_taxid: genome
                    .map(|g| g.strain_taxid.clone())
                    .filter(|v| !v.is_empty()),
                species_taxid: genome
                    .map(|g| g.species_taxid.clone())
                    .filter(|v| !v.is_empty()),
                species_abundance: None,
            }
        })
        .collect();

    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in &rows {
        if let Some(species) = &row.species_taxid {
            *totals.entry(species.clone()).or_insert(0.0) += row.strain_abundance;
        }
    }
    for row in rows.iter_mut() {
        row.species_abundance = row
            .species_taxid
            .as_ref()
            .and_then(|s| totals.get(s))
            .copied();
    }

    rows.sort_by(|a, b| {
        cmp_numeric_taxid(a.species_taxid.as_deref(), b.species_taxid.as_deref())
    });
    rows
}

fn cmp_numeric_taxid(a: Option<&str>, b: Option<&str>) -> Ordering {
    let ka = a.and_then(|v| v.trim().parse::<f64>().ok());
    let kb = b.and_then(|v| v.trim().parse::<f64>().ok());
    match (ka, kb) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn write_table(path: &Path, rows: &[StrainSpeciesRow]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "genome_ID\tstrain_abundance\tstrain_taxid\tspecies_taxid\tspecies_abundance"
    )?;
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.genome_id,
            row.strain_abundance,
            row.strain_taxid.as_deref().unwrap_or(""),
            row.species_taxid.as_deref().unwrap_or(""),
            row.species_abundance
                .map(|v| v.to_string())
                .unwrap_or_default(),
        )?;
    }
    Ok(())
}

/// Collapse the per-strain table to unique `(species_taxid, total)` pairs, in
/// table order.
pub fn species_abundance(rows: &[StrainSpeciesRow]) -> Vec<(String, f64)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::new();
    for row in rows {
        if let (Some(species), Some(total)) = (&row.species_taxid, row.species_abundance) {
            if seen.insert(species.as_str()) {
                result.push((species.clone(), total));
            }
        }
    }
    result
}
