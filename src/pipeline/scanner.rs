use std::collections::HashMap;

use anyhow::{bail, Context};
use log::debug;
use seq_io::fastq::{Reader as FastqReader, Record as FastqRecord};

use crate::barcode::{BarcodeWhitelist, ReadLayout, BARCODE_SEPARATOR};
use crate::guide::GuideCatalog;

///////////////////////////////
/// One fully-resolved read pair: guide identity from read 2, corrected
/// combinatorial cell barcode and UMI from read 1. Read pairs where any
/// of these could not be resolved never become observations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadObservation {
    pub guide: String,
    pub barcode: String,
    pub umi: String,
}

///////////////////////////////
/// Extracts (guide, barcode, UMI) observations from a synchronized pair
/// of FASTQ streams. Read 2 carries the guide, read 1 the barcode
/// segments and UMI. The read-2 pass runs first; barcode extraction is
/// only attempted for read indices with a guide hit, so the candidate
/// map is bounded by the guide-matched read count.
pub struct ReadPairScanner<'a> {
    catalog: &'a GuideCatalog,
    whitelist: &'a BarcodeWhitelist,
    layout: ReadLayout,
}

struct GuideCandidates {
    //read index -> guide id
    hits: HashMap<u64, String>,
    n_reads: u64,
}

impl<'a> ReadPairScanner<'a> {
    pub fn new(
        catalog: &'a GuideCatalog,
        whitelist: &'a BarcodeWhitelist,
        layout: ReadLayout,
    ) -> ReadPairScanner<'a> {
        ReadPairScanner {
            catalog,
            whitelist,
            layout,
        }
    }

    ///////////////////////////////
    /// Scan a read pair into observations. Emission order follows read
    /// order but downstream consumers treat it as a multiset.
    pub fn scan<R1: std::io::Read, R2: std::io::Read>(
        &self,
        fastq_r1: FastqReader<R1>,
        fastq_r2: FastqReader<R2>,
    ) -> anyhow::Result<Vec<ReadObservation>> {
        let candidates = self.scan_guide_read(fastq_r2)?;
        self.scan_barcode_read(fastq_r1, &candidates)
    }

    ///////////////////////////////
    /// Pass 1 over read 2: remember which read indices matched a guide
    fn scan_guide_read<R: std::io::Read>(
        &self,
        mut fastq: FastqReader<R>,
    ) -> anyhow::Result<GuideCandidates> {
        let mut hits: HashMap<u64, String> = HashMap::new();
        let mut n_reads: u64 = 0;

        while let Some(record) = fastq.next() {
            let record = record.context("Malformed FASTQ record in read 2")?;
            if let Some(guide) = self.catalog.match_guide(record.seq()) {
                hits.insert(n_reads, guide.to_string());
            }
            n_reads += 1;
        }

        debug!("{} of {} read-2 records matched a guide", hits.len(), n_reads);
        Ok(GuideCandidates { hits, n_reads })
    }

    ///////////////////////////////
    /// Pass 2 over read 1: extract and correct barcode segments + UMI for
    /// guide-matched read indices only. Unresolved segments drop the read
    /// pair silently; a missing barcode is a known-rate phenomenon, not a
    /// failure.
    fn scan_barcode_read<R: std::io::Read>(
        &self,
        mut fastq: FastqReader<R>,
        candidates: &GuideCandidates,
    ) -> anyhow::Result<Vec<ReadObservation>> {
        let min_read_len = self.layout.min_read_len();

        let mut observations: Vec<ReadObservation> = Vec::new();
        let mut n_reads: u64 = 0;
        let mut n_dropped: u64 = 0;

        while let Some(record) = fastq.next() {
            let record = record.context("Malformed FASTQ record in read 1")?;
            let read_index = n_reads;
            n_reads += 1;

            let Some(guide) = candidates.hits.get(&read_index) else {
                continue;
            };

            let seq = record.seq();
            if seq.len() < min_read_len {
                n_dropped += 1;
                continue;
            }
            match self.resolve_barcode(seq) {
                Some((barcode, umi)) => observations.push(ReadObservation {
                    guide: guide.clone(),
                    barcode,
                    umi,
                }),
                None => n_dropped += 1,
            }
        }

        //The two passes must have walked the same read pairs
        if n_reads != candidates.n_reads {
            bail!(
                "Read 1 and read 2 files are out of sync: {} vs {} records",
                n_reads,
                candidates.n_reads
            );
        }

        debug!(
            "{} observations emitted, {} guide-matched reads dropped for unresolved barcode",
            observations.len(),
            n_dropped
        );
        Ok(observations)
    }

    ///////////////////////////////
    /// Correct all three segments and cut out the UMI. All three must
    /// resolve for the barcode to exist.
    fn resolve_barcode(&self, seq: &[u8]) -> Option<(String, String)> {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        for (segment, span) in self.layout.segments.iter().enumerate() {
            let observed = std::str::from_utf8(self.layout.slice(seq, *span)).ok()?;
            let corrected = self.whitelist.correct_segment(observed, segment)?;
            parts.push(corrected);
        }
        let umi = std::str::from_utf8(self.layout.slice(seq, self.layout.umi)).ok()?;
        Some((parts.join(BARCODE_SEPARATOR), umi.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GUIDE_G1: &str = "ACGTACGTACGTACGTACGT";

    fn fastq(seqs: &[&str]) -> FastqReader<Cursor<Vec<u8>>> {
        let mut out = Vec::new();
        for (i, seq) in seqs.iter().enumerate() {
            out.extend_from_slice(
                format!("@read{}\n{}\n+\n{}\n", i, seq, "I".repeat(seq.len())).as_bytes(),
            );
        }
        FastqReader::new(Cursor::new(out))
    }

    fn catalog() -> GuideCatalog {
        GuideCatalog::from_fasta(Cursor::new(format!(">g1\n{}\n", GUIDE_G1))).unwrap()
    }

    fn whitelist() -> BarcodeWhitelist {
        let csv = "b1,b2,b3\nAAAAAAAAA,CCCCCCCCC,GGGGGGGGG\n";
        BarcodeWhitelist::from_csv(Cursor::new(csv)).unwrap()
    }

    /// Read 1 laid out per ReadLayout::default(): segment+12 filler+segment
    /// +13 filler+segment+UMI
    fn barcode_read(b1: &str, b2: &str, b3: &str, umi: &str) -> String {
        format!("{}{}{}{}{}{}", b1, "N".repeat(12), b2, "N".repeat(13), b3, umi)
    }

    #[test]
    fn end_to_end_pair_resolves() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r1 = barcode_read("AAAAAAAAA", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = format!("NNN{}NNN", GUIDE_G1);

        let obs = scanner
            .scan(fastq(&[&r1]), fastq(&[&r2]))
            .unwrap();
        assert_eq!(
            obs,
            vec![ReadObservation {
                guide: "g1".to_string(),
                barcode: "AAAAAAAAA_CCCCCCCCC_GGGGGGGGG".to_string(),
                umi: "TTTTTTTT".to_string(),
            }]
        );
    }

    #[test]
    fn segment_with_one_error_is_corrected() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r1 = barcode_read("AAAAAAAAT", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = format!("NNN{}NNN", GUIDE_G1);

        let obs = scanner.scan(fastq(&[&r1]), fastq(&[&r2])).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].barcode, "AAAAAAAAA_CCCCCCCCC_GGGGGGGGG");
    }

    #[test]
    fn unresolved_segment_drops_the_pair() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        //Two substitutions in the first segment: never corrected
        let r1 = barcode_read("AAAAAAATT", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = format!("NNN{}NNN", GUIDE_G1);

        let obs = scanner.scan(fastq(&[&r1]), fastq(&[&r2])).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn unmatched_guide_skips_barcode_extraction() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r1 = barcode_read("AAAAAAAAA", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = "N".repeat(40);

        let obs = scanner.scan(fastq(&[&r1]), fastq(&[&r2])).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn short_barcode_read_is_dropped() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r2 = format!("NNN{}NNN", GUIDE_G1);
        let obs = scanner.scan(fastq(&["AAAAAAAAA"]), fastq(&[&r2])).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn duplicated_pair_counts_one_molecule() {
        use crate::pipeline::{aggregate_counts, dedup_molecules};

        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r1 = barcode_read("AAAAAAAAA", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = format!("NNN{}NNN", GUIDE_G1);

        //The exact same read pair sequenced twice
        let obs = scanner
            .scan(fastq(&[&r1, &r1]), fastq(&[&r2, &r2]))
            .unwrap();
        assert_eq!(obs.len(), 2);

        let dedup = dedup_molecules(&obs);
        assert_eq!(dedup.raw_count, 2);
        assert_eq!(dedup.unique_count, 1);

        let records = aggregate_counts(&dedup.molecules);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].barcode, "AAAAAAAAA_CCCCCCCCC_GGGGGGGGG");
        assert_eq!(records[0].guide, "g1");
        assert_eq!(records[0].counts, 1);
    }

    #[test]
    fn out_of_sync_streams_fail() {
        let catalog = catalog();
        let whitelist = whitelist();
        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());

        let r1 = barcode_read("AAAAAAAAA", "CCCCCCCCC", "GGGGGGGGG", "TTTTTTTT");
        let r2 = format!("NNN{}NNN", GUIDE_G1);

        let result = scanner.scan(fastq(&[&r1]), fastq(&[&r2, &r2]));
        assert!(result.is_err());
    }
}
