pub mod catalog;

pub use catalog::guide_family;
pub use catalog::GuideCatalog;
