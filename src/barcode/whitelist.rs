use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use log::debug;

///////////////////////////////
/// For serialization: one row in the whitelist CSV definition file.
/// The three named columns hold one segment sequence each; columns may
/// have unequal lengths, so trailing cells can be empty.
#[derive(Debug, serde::Deserialize)]
struct WhitelistCsvRow {
    b1: Option<String>,
    b2: Option<String>,
    b3: Option<String>,
}

pub const BARCODE_SEPARATOR: &str = "_";

///////////////////////////////
/// The three ordered segment pools making up the combinatorial cell
/// barcode. Pool order is load order and is part of the contract: during
/// correction the first entry at Hamming distance 1 wins.
#[derive(Debug, Clone)]
pub struct BarcodeWhitelist {
    pools: [Vec<String>; 3],
}

impl BarcodeWhitelist {
    ///////////////////////////////
    /// Load the whitelist from a CSV file with columns b1,b2,b3
    pub fn from_csv_path(path: &PathBuf) -> anyhow::Result<BarcodeWhitelist> {
        let file = File::open(path)
            .with_context(|| format!("Could not open barcode whitelist {}", path.display()))?;
        let (reader, compression) = niffler::get_reader(Box::new(file))
            .with_context(|| format!("Could not read barcode whitelist {}", path.display()))?;
        debug!(
            "Opened barcode whitelist {} with compression {:?}",
            path.display(),
            compression
        );
        Self::from_csv(reader)
    }

    pub fn from_csv(src: impl Read) -> anyhow::Result<BarcodeWhitelist> {
        let mut pools: [Vec<String>; 3] = [Vec::new(), Vec::new(), Vec::new()];

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(src);
        for result in reader.deserialize() {
            let row: WhitelistCsvRow = result.context("Malformed barcode whitelist CSV")?;
            for (pool, cell) in pools.iter_mut().zip([row.b1, row.b2, row.b3]) {
                if let Some(seq) = cell {
                    if !seq.is_empty() {
                        pool.push(seq);
                    }
                }
            }
        }

        for (i, pool) in pools.iter().enumerate() {
            if pool.is_empty() {
                bail!("Barcode whitelist column b{} is empty", i + 1);
            }
        }
        Ok(BarcodeWhitelist { pools })
    }

    pub fn pool(&self, segment: usize) -> &[String] {
        &self.pools[segment]
    }

    ///////////////////////////////
    /// Correct one observed segment against its pool (segment index 0..2)
    pub fn correct_segment(&self, observed: &str, segment: usize) -> Option<&str> {
        correct_barcode(observed, &self.pools[segment])
    }
}

///////////////////////////////
/// Single-substitution barcode correction. An exact hit is returned
/// unchanged, regardless of other entries at distance 1. Otherwise the
/// first whitelist entry at Hamming distance exactly 1, in whitelist
/// order; distance >= 2 never corrects. The whitelist-order tie-break is
/// deliberate (bit-compatible with the assay reference), not
/// alphabetical or frequency based.
pub fn correct_barcode<'a>(observed: &str, whitelist: &'a [String]) -> Option<&'a str> {
    if let Some(hit) = whitelist.iter().find(|s| s.as_str() == observed) {
        return Some(hit.as_str());
    }
    whitelist
        .iter()
        .find(|s| s.len() == observed.len() && hamming_distance(s, observed) == 1)
        .map(|s| s.as_str())
}

/// Count of differing characters between two equal-length strings
fn hamming_distance(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count()
}

///////////////////////////////
/// Fixed positions of the three barcode segments and the UMI on read 1,
/// as (offset, length) pairs. Constructed explicitly and handed to the
/// scanner rather than kept as ambient configuration. The defaults match
/// the assay design: 9bp segments at offsets 0, 21 and 43, with an 8bp
/// UMI directly after the last segment.
#[derive(Debug, Clone, Copy)]
pub struct ReadLayout {
    pub segments: [(usize, usize); 3],
    pub umi: (usize, usize),
}

impl Default for ReadLayout {
    fn default() -> ReadLayout {
        ReadLayout {
            segments: [(0, 9), (21, 9), (43, 9)],
            umi: (52, 8),
        }
    }
}

impl ReadLayout {
    /// Shortest read this layout can be applied to
    pub fn min_read_len(&self) -> usize {
        self.segments
            .iter()
            .chain(std::iter::once(&self.umi))
            .map(|(from, len)| from + len)
            .max()
            .unwrap_or(0)
    }

    pub fn slice<'a>(&self, seq: &'a [u8], (from, len): (usize, usize)) -> &'a [u8] {
        &seq[from..from + len]
    }
}
