pub mod annotate;
pub mod count;
pub mod select;

pub use annotate::AnnotateCMD;
pub use count::CountCMD;
pub use select::SelectCMD;
