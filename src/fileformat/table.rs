use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use serde::de::DeserializeOwned;

use crate::pipeline::aggregate::CountRecord;
use crate::pipeline::calling::CellCall;

///////////////////////////////
/// For serialization: one row of the per-cell annotation table
/// (barcode,sgRNA,counts,q99,id,sgrna_detected). Column names follow the
/// established output format; id is the cell id from the mapping file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnnotationCsvRow {
    pub barcode: String,
    #[serde(rename = "sgRNA")]
    pub sgrna: String,
    pub counts: u64,
    pub q99: f64,
    pub id: i64,
    pub sgrna_detected: u64,
}

///////////////////////////////
/// Write rows as CSV, gzip-compressed if the path ends in .gz
pub fn write_table<S: serde::Serialize>(path: &PathBuf, rows: &[S]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not create output file {}", path.display()))?;

    let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
    if is_gz {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_rows_to(&mut encoder, rows)?;
        encoder
            .finish()
            .with_context(|| format!("Could not finish gzip output {}", path.display()))?;
    } else {
        let mut file = file;
        write_rows_to(&mut file, rows)?;
    }
    Ok(())
}

fn write_rows_to<W: Write, S: serde::Serialize>(inner: &mut W, rows: &[S]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(inner);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

///////////////////////////////
/// Read a CSV table, decompressing transparently
pub fn read_table<D: DeserializeOwned>(path: &PathBuf) -> anyhow::Result<Vec<D>> {
    let reader = open_maybe_gz(path)?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows: Vec<D> = Vec::new();
    for result in csv_reader.deserialize() {
        rows.push(result.with_context(|| format!("Malformed table {}", path.display()))?);
    }
    Ok(rows)
}

pub fn write_count_table(path: &PathBuf, records: &[CountRecord]) -> anyhow::Result<()> {
    write_table(path, records)
}

pub fn read_count_table(path: &PathBuf) -> anyhow::Result<Vec<CountRecord>> {
    read_table(path)
}

///////////////////////////////
/// Write the per-cell annotation table; q99 is rounded to 3 decimals as
/// in the established output format
pub fn write_annotation_table(path: &PathBuf, calls: &[CellCall]) -> anyhow::Result<()> {
    let rows: Vec<AnnotationCsvRow> = calls
        .iter()
        .map(|call| AnnotationCsvRow {
            barcode: call.barcode.clone(),
            sgrna: call.guide.clone(),
            counts: call.counts,
            q99: round3(call.q99),
            id: call.cell_id,
            sgrna_detected: call.sgrna_detected,
        })
        .collect();
    write_table(path, &rows)
}

pub fn read_annotation_table(path: &PathBuf) -> anyhow::Result<Vec<AnnotationCsvRow>> {
    read_table(path)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

///////////////////////////////
/// Read the barcode -> cell id mapping: a TSV (optionally gzipped) whose
/// first column is the barcode and which carries an integer "id" column
pub fn read_cell_mapping(path: &PathBuf) -> anyhow::Result<HashMap<String, i64>> {
    let reader = open_maybe_gz(path)?;
    read_cell_mapping_from(reader)
        .with_context(|| format!("Malformed cell mapping file {}", path.display()))
}

pub fn read_cell_mapping_from(src: impl Read) -> anyhow::Result<HashMap<String, i64>> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(src);

    let headers = reader.headers()?.clone();
    let id_col = headers
        .iter()
        .position(|h| h == "id")
        .ok_or_else(|| anyhow!("Cell mapping file has no 'id' column"))?;

    let mut mapping: HashMap<String, i64> = HashMap::new();
    for result in reader.records() {
        let record = result?;
        let barcode = record
            .get(0)
            .ok_or_else(|| anyhow!("Empty row in cell mapping file"))?;
        let field = record
            .get(id_col)
            .ok_or_else(|| anyhow!("Missing id for barcode {}", barcode))?;
        //ids are integers but may have been written as floats upstream
        let id: i64 = match field.parse::<i64>() {
            Ok(v) => v,
            Err(_) => field
                .parse::<f64>()
                .with_context(|| format!("Bad cell id '{}' for barcode {}", field, barcode))?
                as i64,
        };
        mapping.insert(barcode.to_string(), id);
    }
    if mapping.is_empty() {
        bail!("Cell mapping file contains no barcodes");
    }
    debug!("Cell mapping covers {} barcodes", mapping.len());
    Ok(mapping)
}

///////////////////////////////
/// Read the doublet table produced by the external detector: a CSV whose
/// first column is the cell barcode, with a boolean "predicted_doublet"
/// column. Everything else about the detector is opaque to this tool.
pub fn read_doublet_flags(path: &PathBuf) -> anyhow::Result<HashMap<String, bool>> {
    let reader = open_maybe_gz(path)?;
    read_doublet_flags_from(reader)
        .with_context(|| format!("Malformed doublet table {}", path.display()))
}

pub fn read_doublet_flags_from(src: impl Read) -> anyhow::Result<HashMap<String, bool>> {
    let mut reader = csv::Reader::from_reader(src);

    let headers = reader.headers()?.clone();
    let flag_col = headers
        .iter()
        .position(|h| h == "predicted_doublet")
        .ok_or_else(|| anyhow!("Doublet table has no 'predicted_doublet' column"))?;

    let mut flags: HashMap<String, bool> = HashMap::new();
    for result in reader.records() {
        let record = result?;
        let barcode = record
            .get(0)
            .ok_or_else(|| anyhow!("Empty row in doublet table"))?;
        let field = record
            .get(flag_col)
            .ok_or_else(|| anyhow!("Missing doublet flag for {}", barcode))?;
        flags.insert(barcode.to_string(), parse_bool(field)?);
    }
    Ok(flags)
}

fn parse_bool(field: &str) -> anyhow::Result<bool> {
    match field {
        "True" | "true" | "TRUE" | "1" => Ok(true),
        "False" | "false" | "FALSE" | "0" => Ok(false),
        other => bail!("Bad boolean value '{}'", other),
    }
}

fn open_maybe_gz(path: &PathBuf) -> anyhow::Result<Box<dyn Read>> {
    let file =
        File::open(path).with_context(|| format!("Could not open file {}", path.display()))?;
    let (reader, compression) = niffler::get_reader(Box::new(file))
        .with_context(|| format!("Could not read file {}", path.display()))?;
    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn cell_mapping_parses_int_and_float_ids() {
        let tsv = "barcode\tid\nAAA_BBB_CCC\t12\nDDD_EEE_FFF\t7.0\n";
        let mapping = read_cell_mapping_from(Cursor::new(tsv)).unwrap();
        assert_eq!(mapping.get("AAA_BBB_CCC"), Some(&12));
        assert_eq!(mapping.get("DDD_EEE_FFF"), Some(&7));
    }

    #[test]
    fn cell_mapping_requires_id_column() {
        let tsv = "barcode\tcell\nAAA\t1\n";
        assert!(read_cell_mapping_from(Cursor::new(tsv)).is_err());
    }

    #[test]
    fn doublet_flags_parse_python_booleans() {
        let csv = "cell,doublet_score,predicted_doublet\nbc1,0.9,True\nbc2,0.01,False\n";
        let flags = read_doublet_flags_from(Cursor::new(csv)).unwrap();
        assert_eq!(flags.get("bc1"), Some(&true));
        assert_eq!(flags.get("bc2"), Some(&false));
    }

    #[test]
    fn count_rows_use_sgrna_header() {
        let mut out: Vec<u8> = Vec::new();
        let records = vec![CountRecord {
            barcode: "bc1".to_string(),
            guide: "g1".to_string(),
            counts: 3,
        }];
        write_rows_to(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("barcode,sgRNA,counts\n"));
        assert!(text.contains("bc1,g1,3"));
    }
}
