pub mod fastq;
pub mod table;

pub use fastq::open_fastq;
pub use fastq::verify_input_fq_file;
