use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::{debug, info};

use crate::fileformat::table::{self, AnnotationCsvRow};
use crate::guide::guide_family;

///////////////////////////////
/// For serialization: one row of the final selected-cell table. Adds the
/// guide family (sgRNA id truncated at its first underscore) to the
/// annotation columns.
#[derive(Debug, serde::Serialize)]
struct SelectedCsvRow {
    barcode: String,
    #[serde(rename = "sgRNA")]
    sgrna: String,
    counts: u64,
    q99: f64,
    id: i64,
    sgrna_detected: u64,
    #[serde(rename = "gRNA")]
    grna: String,
}

#[derive(Args)]
pub struct SelectCMD {
    // Per-cell annotation table (*_umi_counts_anno.csv.gz)
    #[arg(value_parser)]
    pub path_anno: PathBuf,

    // Doublet table from the external detector (first column cell
    // barcode, boolean column predicted_doublet)
    #[arg(value_parser)]
    pub path_doublets: PathBuf,

    // Output table (gzip-compressed if it ends in .gz)
    #[arg(value_parser)]
    pub path_out: PathBuf,
}
impl SelectCMD {
    /// Run the commandline option.
    /// Applies the guide-calling rule on top of the per-cell annotation:
    /// keep a cell if its top guide clears the q99 cutoff or it is the
    /// only guide detected, and the external detector did not flag it as
    /// a doublet.
    pub fn try_execute(&mut self) -> Result<()> {
        let rows = table::read_annotation_table(&self.path_anno)?;
        let doublets = table::read_doublet_flags(&self.path_doublets)?;

        let mut n_doublet: u64 = 0;
        let mut n_unflagged: u64 = 0;
        let mut kept: Vec<SelectedCsvRow> = Vec::new();
        for row in rows {
            if !passes_guide_call(&row) {
                continue;
            }
            match doublets.get(&row.barcode) {
                Some(true) => {
                    n_doublet += 1;
                    continue;
                }
                Some(false) => {}
                //Cells the detector never saw are kept as singlets
                None => n_unflagged += 1,
            }
            kept.push(SelectedCsvRow {
                grna: guide_family(&row.sgrna).to_string(),
                barcode: row.barcode,
                sgrna: row.sgrna,
                counts: row.counts,
                q99: row.q99,
                id: row.id,
                sgrna_detected: row.sgrna_detected,
            });
        }

        debug!(
            "{} doublets removed, {} cells had no doublet flag",
            n_doublet, n_unflagged
        );
        table::write_table(&self.path_out, &kept)?;
        info!("Kept {} cells, wrote {}", kept.len(), self.path_out.display());
        Ok(())
    }
}

///////////////////////////////
/// The q99-or-singleton rule: the top guide must stand clear of the
/// barcode's count distribution, unless it was the only guide detected
fn passes_guide_call(row: &AnnotationCsvRow) -> bool {
    (row.counts as f64) > row.q99 || row.sgrna_detected == 1
}
