use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;
use rayon::prelude::*;

use crate::fileformat::table;
use crate::pipeline::call_cells;

pub const DEFAULT_MAPPING: &str = "data/barcode_mapping.tsv.gz";

#[derive(Args)]
pub struct AnnotateCMD {
    // Per-sample count tables (*_umi_counts.csv.gz)
    #[arg(num_args = 1.., required = true, value_parser)]
    pub paths_counts: Vec<PathBuf>,

    // Optional: barcode -> cell id mapping TSV (optionally gzipped)
    #[arg(long = "mapping", value_parser, default_value = DEFAULT_MAPPING)]
    pub path_mapping: PathBuf,
}
impl AnnotateCMD {
    /// Run the commandline option.
    /// Calls the dominant guide per cell for each count table and writes
    /// the annotation table next to it. Samples share nothing, so they
    /// are processed one worker per sample end-to-end.
    pub fn try_execute(&mut self) -> Result<()> {
        let mapping = table::read_cell_mapping(&self.path_mapping)?;
        info!("Cell mapping loaded for {} barcodes", mapping.len());

        let results: Vec<Result<()>> = self
            .paths_counts
            .par_iter()
            .map(|path| annotate_one(path, &mapping))
            .collect();
        for result in results {
            result?;
        }
        Ok(())
    }
}

///////////////////////////////
/// Annotate one sample: count table in, per-cell calls out
fn annotate_one(path: &PathBuf, mapping: &HashMap<String, i64>) -> Result<()> {
    let records = table::read_count_table(path)?;
    let calls = call_cells(&records, mapping);

    let path_out = annotation_path(path);
    table::write_annotation_table(&path_out, &calls)?;
    info!("{}: {} cells annotated", path_out.display(), calls.len());
    Ok(())
}

///////////////////////////////
/// X_umi_counts.csv.gz -> X_umi_counts_anno.csv.gz, next to the input
fn annotation_path(path: &PathBuf) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let new_name = if name.contains("_counts") {
        name.replace("_counts", "_counts_anno")
    } else {
        format!("{}_anno", name)
    };
    path.with_file_name(new_name)
}
