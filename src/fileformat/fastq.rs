use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context};
use log::debug;
use seq_io::fastq::Reader as FastqReader;

///////////////////////////////
/// Open a FASTQ file for reading, decompressing transparently (gzip or
/// plain). The handle is scoped to the returned reader and released when
/// it is dropped, also on a fatal error.
pub fn open_fastq(path: &PathBuf) -> anyhow::Result<FastqReader<Box<dyn std::io::Read>>> {
    let file = File::open(path)
        .with_context(|| format!("Could not open fastq file {}", path.display()))?;

    let (reader, compression) = niffler::get_reader(Box::new(file))
        .with_context(|| format!("Could not read fastq file {}", path.display()))?;

    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(FastqReader::new(reader))
}

///////////////////////////////
/// Check that an input FASTQ file is present before starting a run
pub fn verify_input_fq_file(path: &PathBuf) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("Input fastq file {} does not exist", path.display());
    }
    Ok(())
}
