use itertools::Itertools;

use crate::pipeline::scanner::ReadObservation;

///////////////////////////////
/// A deduplicated molecule: one unique (barcode, guide, UMI) triple.
/// No two retained molecules share all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Molecule {
    pub barcode: String,
    pub guide: String,
    pub umi: String,
}

///////////////////////////////
/// Result of collapsing the observation stream into unique molecules
#[derive(Debug)]
pub struct DedupResult {
    pub molecules: Vec<Molecule>,
    pub raw_count: u64,
    pub unique_count: u64,
}

impl DedupResult {
    /// Observations per unique molecule. A low ratio may indicate
    /// under-sequencing; it is reported as a diagnostic, never rejected.
    pub fn duplication_ratio(&self) -> f64 {
        if self.unique_count == 0 {
            return 0.0;
        }
        self.raw_count as f64 / self.unique_count as f64
    }
}

///////////////////////////////
/// Collapse duplicate (barcode, guide, UMI) observations. Molecules come
/// out in first-encounter order.
pub fn dedup_molecules(observations: &[ReadObservation]) -> DedupResult {
    let molecules: Vec<Molecule> = observations
        .iter()
        .unique()
        .map(|obs| Molecule {
            barcode: obs.barcode.clone(),
            guide: obs.guide.clone(),
            umi: obs.umi.clone(),
        })
        .collect();

    DedupResult {
        raw_count: observations.len() as u64,
        unique_count: molecules.len() as u64,
        molecules,
    }
}
