pub mod whitelist;

pub use whitelist::correct_barcode;
pub use whitelist::BarcodeWhitelist;
pub use whitelist::ReadLayout;
pub use whitelist::BARCODE_SEPARATOR;
