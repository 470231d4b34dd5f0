use std::collections::HashMap;

use crate::pipeline::dedup::Molecule;

///////////////////////////////
/// Summed molecule counts for one (barcode, guide) pair. Every pair with
/// at least one molecule gets exactly one record; there is no
/// minimum-count filter at this stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CountRecord {
    pub barcode: String,
    #[serde(rename = "sgRNA")]
    pub guide: String,
    pub counts: u64,
}

///////////////////////////////
/// Group molecules by (barcode, guide) and count. Records come out in
/// first-encounter order, which keeps downstream tie-breaks stable for a
/// given input.
pub fn aggregate_counts(molecules: &[Molecule]) -> Vec<CountRecord> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut records: Vec<CountRecord> = Vec::new();

    for molecule in molecules {
        let key = (molecule.barcode.clone(), molecule.guide.clone());
        match index.get(&key) {
            Some(&i) => records[i].counts += 1,
            None => {
                index.insert(key, records.len());
                records.push(CountRecord {
                    barcode: molecule.barcode.clone(),
                    guide: molecule.guide.clone(),
                    counts: 1,
                });
            }
        }
    }
    records
}
