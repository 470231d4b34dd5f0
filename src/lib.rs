pub mod barcode;
pub mod command;
pub mod fileformat;
pub mod guide;
pub mod pipeline;

pub use guide::GuideCatalog;

pub use barcode::BarcodeWhitelist;
pub use barcode::ReadLayout;
