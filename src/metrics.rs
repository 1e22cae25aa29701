use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const BC_EPS: f64 = 1e-12;

/// Accuracy of a predicted species abundance table against ground truth.
///
/// Presence is asymmetric on purpose: a ground-truth species counts as
/// present only with value > 0, while a predicted species counts as present
/// whenever its id appears in the predicted table, even with value 0.
#[derive(Debug)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: Vec<String>,
    pub false_positives: Vec<String>,
    pub false_negatives: Vec<String>,
    pub aupr: Option<f64>,
    pub afe: Option<f64>,
    pub rfe: Option<f64>,
    pub l1: f64,
    pub l2: f64,
    pub bc: Option<f64>,
}

/// Read a two-column abundance table keeping row order. Rows with fewer than
/// two fields or a non-numeric value are dropped; duplicate identifiers keep
/// their first position with the last value.
pub fn read_table(path: &Path) -> Result<Vec<(String, f64)>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<(String, f64)> = Vec::new();

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
        let id = fields[0].trim();
        match index.get(id) {
            Some(&i) => rows[i].1 = value,
            None => {
                index.insert(id.to_string(), rows.len());
                rows.push((id.to_string(), value));
            }
        }
    }

    Ok(rows)
}

/// Outer-join the two tables on identifier (ground-truth order first, then
/// prediction-only rows), fill missing values with 0 and compute the full
/// metric set.
pub fn evaluate(real: &[(String, f64)], predicted: &[(String, f64)]) -> Metrics {
    let real_map: HashMap<&str, f64> = real.iter().map(|(id, v)| (id.as_str(), *v)).collect();
    let pred_map: HashMap<&str, f64> = predicted.iter().map(|(id, v)| (id.as_str(), *v)).collect();

    let mut ids: Vec<&str> = real.iter().map(|(id, _)| id.as_str()).collect();
    let in_real: HashSet<&str> = ids.iter().copied().collect();
    for (id, _) in predicted {
        if !in_real.contains(id.as_str()) {
            ids.push(id);
        }
    }

    let mut real_vals = Vec::with_capacity(ids.len());
    let mut pred_vals = Vec::with_capacity(ids.len());
    let mut real_bin = Vec::with_capacity(ids.len());
    let mut pred_bin = Vec::with_capacity(ids.len());
    for id in &ids {
        let r = real_map.get(id).copied().unwrap_or(0.0);
        let p = pred_map.get(id).copied().unwrap_or(0.0);
        real_vals.push(r);
        pred_vals.push(p);
        real_bin.push(r > 0.0);
        pred_bin.push(pred_map.contains_key(id));
    }

    let mut true_positives = Vec::new();
    let mut false_positives = Vec::new();
    let mut false_negatives = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        match (real_bin[i], pred_bin[i]) {
            (true, true) => true_positives.push(id.to_string()),
            (false, true) => false_positives.push(id.to_string()),
            (true, false) => false_negatives.push(id.to_string()),
            (false, false) => {}
        }
    }

    let tp = true_positives.len() as f64;
    let fp = false_positives.len() as f64;
    let fn_ = false_negatives.len() as f64;
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let aupr = aupr(&real_bin, &pred_vals);

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut bc_denom = 0.0;
    let mut rel_sum = 0.0;
    let mut rel_n = 0usize;
    for i in 0..ids.len() {
        let diff = pred_vals[i] - real_vals[i];
        abs_sum += diff.abs();
        sq_sum += diff * diff;
        bc_denom += pred_vals[i] + real_vals[i] + BC_EPS;
        if real_vals[i] > 0.0 {
            rel_sum += diff.abs() / real_vals[i];
            rel_n += 1;
        }
    }
    let n = ids.len();
    let afe = if n > 0 { Some(abs_sum / n as f64) } else { None };
    let rfe = if rel_n > 0 {
        Some(rel_sum / rel_n as f64)
    } else {
        None
    };
    let bc = if bc_denom > 0.0 {
        Some(abs_sum / bc_denom)
    } else {
        None
    };

    Metrics {
        precision,
        recall,
        f1,
        true_positives,
        false_positives,
        false_negatives,
        aupr,
        afe,
        rfe,
        l1: abs_sum,
        l2: sq_sum.sqrt(),
        bc,
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom > 0.0 { num / denom } else { 0.0 }
}

/// Area under the precision-recall curve of the continuous scores against the
/// binary labels: one curve point per distinct score in decreasing order,
/// anchored at (recall 0, precision 1), trapezoidal integration. None when
/// the labels contain no positives.
fn aupr(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    if positives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut area = 0.0;
    let mut prev_recall = 0.0;
    let mut prev_precision = 1.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] {
                tp += 1;
            }
            seen += 1;
            i += 1;
        }
        let recall = tp as f64 / positives as f64;
        let precision = tp as f64 / seen as f64;
        area += (recall - prev_recall) * (precision + prev_precision) / 2.0;
        prev_recall = recall;
        prev_precision = precision;
    }
    Some(area)
}

impl Metrics {
    /// Single-row TSV with named metric columns; undefined values render as
    /// `NaN`, id lists via their debug representation.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "Precision\tRecall\tF1_score\tTrue_Positive_Count\tFalse_Positive_Count\t\
             False_Negative_Count\tAUPR\tAFE\tRFE\tL1_distance\tL2_distance\tBC_distance\t\
             True_Positive_Species_ID\tFalse_Positive_Species_ID\tFalse_Negative_Species_ID"
        )?;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:?}\t{:?}\t{:?}",
            self.precision,
            self.recall,
            self.f1,
            self.true_positives.len(),
            self.false_positives.len(),
            self.false_negatives.len(),
            format_opt(self.aupr),
            format_opt(self.afe),
            format_opt(self.rfe),
            self.l1,
            self.l2,
            format_opt(self.bc),
            self.true_positives,
            self.false_positives,
            self.false_negatives,
        )?;
        Ok(())
    }
}

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "NaN".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, f64)]) -> Vec<(String, f64)> {
        rows.iter().map(|(id, v)| (id.to_string(), *v)).collect()
    }

    #[test]
    fn identical_tables_are_perfect() {
        let real = table(&[("2", 0.5), ("3", 0.3), ("7", 0.2)]);
        let m = evaluate(&real, &real);

        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.afe, Some(0.0));
        assert_eq!(m.rfe, Some(0.0));
        assert_eq!(m.l1, 0.0);
        assert_eq!(m.l2, 0.0);
        assert_eq!(m.bc, Some(0.0));
        assert_eq!(m.true_positives, vec!["2", "3", "7"]);
        assert!(m.false_positives.is_empty());
        assert!(m.false_negatives.is_empty());
    }

    #[test]
    fn missing_prediction_is_a_false_negative_never_a_false_positive() {
        let real = table(&[("2", 0.5), ("5", 0.5)]);
        let pred = table(&[("2", 1.0)]);
        let m = evaluate(&real, &pred);

        assert_eq!(m.false_negatives, vec!["5"]);
        assert!(m.false_positives.is_empty());
    }

    #[test]
    fn zero_valued_prediction_still_counts_as_predicted_positive() {
        let real = table(&[("2", 0.5)]);
        let pred = table(&[("2", 0.0), ("9", 0.0)]);
        let m = evaluate(&real, &pred);

        // "2" is a true positive despite its predicted value of 0; "9" is a
        // false positive despite never rising above 0.
        assert_eq!(m.true_positives, vec!["2"]);
        assert_eq!(m.false_positives, vec!["9"]);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.precision, 0.5);
    }

    #[test]
    fn absent_species_has_presence_zero_on_both_sides() {
        let real = table(&[("2", 5.0), ("3", 0.0)]);
        let pred = table(&[("2", 4.0)]);
        let m = evaluate(&real, &pred);

        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.afe, Some(0.5));
        assert_eq!(m.l1, 1.0);
        assert_eq!(m.l2, 1.0);
    }

    #[test]
    fn rfe_ignores_zero_ground_truth_and_aupr_needs_positives() {
        let real = table(&[("2", 0.0), ("3", 0.0)]);
        let pred = table(&[("2", 1.0)]);
        let m = evaluate(&real, &pred);

        assert!(m.rfe.is_none());
        assert!(m.aupr.is_none());
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn aupr_is_one_when_predictions_rank_all_positives_first() {
        let real = table(&[("a", 1.0), ("b", 1.0), ("c", 0.0), ("d", 0.0)]);
        let pred = table(&[("a", 0.9), ("b", 0.8), ("c", 0.1), ("d", 0.05)]);
        let m = evaluate(&real, &pred);
        let aupr = m.aupr.unwrap();
        assert!((aupr - 1.0).abs() < 1e-12, "aupr = {}", aupr);
    }

    #[test]
    fn aupr_handles_tied_scores() {
        let real = table(&[("a", 1.0), ("b", 0.0)]);
        let pred = table(&[("a", 0.5), ("b", 0.5)]);
        let m = evaluate(&real, &pred);
        // single curve point at recall 1, precision 1/2; trapezoid from the
        // (0, 1) anchor gives 3/4
        assert_eq!(m.aupr, Some(0.75));
    }

    #[test]
    fn bray_curtis_matches_hand_computation() {
        let real = table(&[("a", 0.6), ("b", 0.4)]);
        let pred = table(&[("a", 0.4), ("b", 0.4)]);
        let m = evaluate(&real, &pred);
        let expected = 0.2 / (1.0 + 0.8 + 2.0 * BC_EPS);
        assert!((m.bc.unwrap() - expected).abs() < 1e-15);
    }

    #[test]
    fn join_keeps_ground_truth_order_then_prediction_only_rows() {
        let real = table(&[("9", 1.0), ("2", 1.0)]);
        let pred = table(&[("4", 1.0), ("2", 1.0)]);
        let m = evaluate(&real, &pred);

        assert_eq!(m.false_negatives, vec!["9"]);
        assert_eq!(m.true_positives, vec!["2"]);
        assert_eq!(m.false_positives, vec!["4"]);
    }

    #[test]
    fn report_renders_nan_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let real = table(&[("2", 0.0)]);
        let pred = table(&[("2", 1.0)]);
        let m = evaluate(&real, &pred);

        let path = dir.path().join("metrics.tsv");
        m.write_report(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        let row = lines.next().unwrap();

        assert!(header.starts_with("Precision\tRecall\tF1_score"));
        assert_eq!(
            header.split('\t').count(),
            row.split('\t').count(),
            "header and row column counts differ"
        );
        assert!(row.contains("NaN"));
        assert!(row.contains("[\"2\"]"));
    }

    #[test]
    fn read_table_keeps_order_and_overwrites_duplicates() {
        use std::io::Write as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tsv");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"Species_TaxID\tRelative_Abundance\n9\t0.1\n2\t0.2\n9\t0.9\n")
            .unwrap();

        let rows = read_table(&path).unwrap();
        assert_eq!(rows, vec![("9".to_string(), 0.9), ("2".to_string(), 0.2)]);
    }
}
