use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use log::debug;
use seq_io::fasta::{Reader as FastaReader, Record as FastaRecord};

///////////////////////////////
/// Catalog of known guide sequences, kept in reference file order.
/// Matching is first-hit-wins in load order; a guide whose sequence is a
/// substring of a later entry shadows it. This mirrors the assay
/// reference and is kept as-is rather than resolved.
#[derive(Debug, Clone)]
pub struct GuideCatalog {
    entries: Vec<GuideEntry>,
}

#[derive(Debug, Clone)]
struct GuideEntry {
    sequence: Vec<u8>,
    id: String,
}

impl GuideCatalog {
    ///////////////////////////////
    /// Load the catalog from a FASTA file (optionally gzipped)
    pub fn from_fasta_path(path: &PathBuf) -> anyhow::Result<GuideCatalog> {
        let file = File::open(path)
            .with_context(|| format!("Could not open guide reference {}", path.display()))?;
        let (reader, compression) = niffler::get_reader(Box::new(file))
            .with_context(|| format!("Could not read guide reference {}", path.display()))?;
        debug!(
            "Opened guide reference {} with compression {:?}",
            path.display(),
            compression
        );
        Self::from_fasta(reader)
    }

    pub fn from_fasta(src: impl Read) -> anyhow::Result<GuideCatalog> {
        let mut reader = FastaReader::new(src);
        let mut entries: Vec<GuideEntry> = Vec::new();
        while let Some(record) = reader.next() {
            let record = record.context("Malformed guide reference FASTA")?;
            let id = record.id().context("Non-UTF8 guide id")?.to_string();
            let sequence = record.full_seq().into_owned();
            if sequence.is_empty() {
                bail!("Guide {} has an empty sequence", id);
            }
            entries.push(GuideEntry { sequence, id });
        }
        if entries.is_empty() {
            bail!("Guide reference contains no sequences");
        }
        Ok(GuideCatalog { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    ///////////////////////////////
    /// Scan a read for any known guide sequence. The first catalog entry
    /// that occurs anywhere within the read wins. O(guides * read length)
    /// per read, which is fine for catalogs of tens of guides.
    pub fn match_guide(&self, read_seq: &[u8]) -> Option<&str> {
        for entry in &self.entries {
            if contains_subsequence(read_seq, &entry.sequence) {
                return Some(entry.id.as_str());
            }
        }
        None
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

///////////////////////////////
/// Guide family: the id truncated at its first underscore
/// (e.g. "Nfia_3" -> "Nfia")
pub fn guide_family(id: &str) -> &str {
    match id.split_once('_') {
        Some((family, _)) => family,
        None => id,
    }
}
