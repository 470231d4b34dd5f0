pub mod aggregate;
pub mod calling;
pub mod dedup;
pub mod scanner;

pub use aggregate::aggregate_counts;
pub use aggregate::CountRecord;

pub use calling::call_cells;
pub use calling::percentile;
pub use calling::CellCall;

pub use dedup::dedup_molecules;
pub use dedup::DedupResult;
pub use dedup::Molecule;

pub use scanner::ReadObservation;
pub use scanner::ReadPairScanner;
