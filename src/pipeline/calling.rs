use std::collections::{HashMap, HashSet};

use log::debug;

use crate::pipeline::aggregate::CountRecord;

///////////////////////////////
/// Per-cell guide call: the dominant guide for one barcode, with the
/// 99th-percentile count across that barcode's guides and the number of
/// distinct guides seen. Exactly one call per barcode present in both
/// the count table and the cell mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CellCall {
    pub barcode: String,
    pub guide: String,
    pub counts: u64,
    pub q99: f64,
    pub sgrna_detected: u64,
    pub cell_id: i64,
}

///////////////////////////////
/// Linear-interpolation percentile over order statistics (the
/// numpy/pandas quantile definition). q in [0, 1]; values must be
/// non-empty.
pub fn percentile(values: &[u64], q: f64) -> f64 {
    assert!(!values.is_empty(), "percentile of an empty distribution");

    let mut sorted: Vec<u64> = values.to_vec();
    sorted.sort_unstable();

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] as f64 + frac * (sorted[hi] as f64 - sorted[lo] as f64)
}

///////////////////////////////
/// Call one guide per barcode. Per barcode: q99 over its guide counts,
/// top guide by max counts (first encountered wins on ties, stable for a
/// given record order), distinct-guide count, then join against the
/// barcode -> cell id mapping. Barcodes absent from the mapping are
/// dropped whole; that is a known-rate phenomenon, not an error.
///
/// The downstream retain rule (counts > q99 or a single detected guide,
/// minus predicted doublets) is deliberately not applied here so this
/// stage stays pure and testable.
pub fn call_cells(records: &[CountRecord], mapping: &HashMap<String, i64>) -> Vec<CellCall> {
    //Group records per barcode, preserving input order within each group
    let mut group_of_barcode: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&CountRecord>> = Vec::new();
    for record in records {
        match group_of_barcode.get(record.barcode.as_str()) {
            Some(&i) => groups[i].push(record),
            None => {
                group_of_barcode.insert(record.barcode.as_str(), groups.len());
                groups.push(vec![record]);
            }
        }
    }

    let mut calls: Vec<CellCall> = Vec::new();
    let mut n_unmapped: u64 = 0;
    for group in &groups {
        let barcode = group[0].barcode.as_str();
        let Some(&cell_id) = mapping.get(barcode) else {
            n_unmapped += 1;
            continue;
        };

        let counts_dist: Vec<u64> = group.iter().map(|r| r.counts).collect();
        let q99 = percentile(&counts_dist, 0.99);

        let mut top = group[0];
        for record in &group[1..] {
            if record.counts > top.counts {
                top = record;
            }
        }

        let sgrna_detected = group
            .iter()
            .map(|r| r.guide.as_str())
            .collect::<HashSet<&str>>()
            .len() as u64;

        calls.push(CellCall {
            barcode: barcode.to_string(),
            guide: top.guide.clone(),
            counts: top.counts,
            q99,
            sgrna_detected,
            cell_id,
        });
    }

    debug!(
        "{} cells called, {} barcodes dropped (not in cell mapping)",
        calls.len(),
        n_unmapped
    );
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(barcode: &str, guide: &str, counts: u64) -> CountRecord {
        CountRecord {
            barcode: barcode.to_string(),
            guide: guide.to_string(),
            counts,
        }
    }

    fn mapping(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries
            .iter()
            .map(|(bc, id)| (bc.to_string(), *id))
            .collect()
    }

    #[test]
    fn percentile_linear_interpolation() {
        //rank = 0.99 * 2 = 1.98 -> 20 + 0.98 * (100 - 20)
        let q99 = percentile(&[10, 20, 100], 0.99);
        assert!((q99 - 98.4).abs() < 1e-9);

        assert_eq!(percentile(&[7], 0.99), 7.0);
        assert_eq!(percentile(&[10, 20], 0.5), 15.0);
        assert_eq!(percentile(&[10, 20, 100], 0.0), 10.0);
        assert_eq!(percentile(&[10, 20, 100], 1.0), 100.0);
    }

    #[test]
    fn top_guide_and_q99_per_barcode() {
        let records = vec![
            record("bc1", "g1", 10),
            record("bc1", "g2", 100),
            record("bc1", "g3", 20),
        ];
        let calls = call_cells(&records, &mapping(&[("bc1", 7)]));

        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.guide, "g2");
        assert_eq!(call.counts, 100);
        assert_eq!(call.sgrna_detected, 3);
        assert_eq!(call.cell_id, 7);
        assert!((call.q99 - 98.4).abs() < 1e-9);
    }

    #[test]
    fn tie_broken_by_input_order() {
        let records = vec![
            record("bc1", "g_late", 5),
            record("bc1", "g_first_max", 9),
            record("bc1", "g_other_max", 9),
        ];
        let calls = call_cells(&records, &mapping(&[("bc1", 1)]));
        assert_eq!(calls[0].guide, "g_first_max");
    }

    #[test]
    fn unmapped_barcode_dropped_whole() {
        let records = vec![record("bc1", "g1", 3), record("bc2", "g1", 5)];
        let calls = call_cells(&records, &mapping(&[("bc2", 2)]));

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].barcode, "bc2");
        assert_eq!(calls[0].cell_id, 2);
    }

    #[test]
    fn single_guide_cell() {
        let records = vec![record("bc1", "g1", 4)];
        let calls = call_cells(&records, &mapping(&[("bc1", 1)]));
        let call = &calls[0];
        assert_eq!(call.sgrna_detected, 1);
        assert_eq!(call.q99, 4.0);
        assert_eq!(call.counts, 4);
    }
}
