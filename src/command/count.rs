use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::barcode::{BarcodeWhitelist, ReadLayout};
use crate::fileformat;
use crate::fileformat::table;
use crate::guide::GuideCatalog;
use crate::pipeline::{aggregate_counts, dedup_molecules, ReadPairScanner};

pub const DEFAULT_GUIDE_REF: &str = "data/sgRNA_20nt.fa";
pub const DEFAULT_WHITELIST: &str = "data/cb.csv";

#[derive(Args)]
pub struct CountCMD {
    // FASTQ for r1 (cell barcode + UMI read)
    #[arg(value_parser)]
    pub path_r1: PathBuf,

    // FASTQ for r2 (guide read)
    #[arg(value_parser)]
    pub path_r2: PathBuf,

    // Prefix for output files
    #[arg(value_parser)]
    pub out_prefix: String,

    // Optional: guide reference FASTA
    #[arg(long = "guides", value_parser, default_value = DEFAULT_GUIDE_REF)]
    pub path_guides: PathBuf,

    // Optional: barcode whitelist CSV with columns b1,b2,b3
    #[arg(long = "barcodes", value_parser, default_value = DEFAULT_WHITELIST)]
    pub path_barcodes: PathBuf,
}
impl CountCMD {
    /// Run the commandline option.
    /// Takes one sample's raw paired FASTQ, extracts guide + cell barcode
    /// + UMI per read pair, deduplicates molecules and writes the
    /// aggregated per-cell guide counts.
    pub fn try_execute(&mut self) -> Result<()> {
        fileformat::verify_input_fq_file(&self.path_r1)?;
        fileformat::verify_input_fq_file(&self.path_r2)?;

        let catalog = GuideCatalog::from_fasta_path(&self.path_guides)?;
        let whitelist = BarcodeWhitelist::from_csv_path(&self.path_barcodes)?;
        info!("Loaded {} guides", catalog.len());

        let fastq_r1 = fileformat::open_fastq(&self.path_r1)?;
        let fastq_r2 = fileformat::open_fastq(&self.path_r2)?;

        let scanner = ReadPairScanner::new(&catalog, &whitelist, ReadLayout::default());
        let observations = scanner.scan(fastq_r1, fastq_r2)?;

        let dedup = dedup_molecules(&observations);
        //The one diagnostic line of the run
        println!(
            "{} UMI ratio: {:.2}",
            self.path_r2.display(),
            dedup.duplication_ratio()
        );

        let records = aggregate_counts(&dedup.molecules);
        let path_out = PathBuf::from(format!("{}_umi_counts.csv.gz", self.out_prefix));
        table::write_count_table(&path_out, &records)?;
        info!(
            "Wrote {} barcode-guide pairs to {}",
            records.len(),
            path_out.display()
        );
        Ok(())
    }
}
