pub mod normalize;
pub mod table;

pub use normalize::normalize;
pub use table::OptionTable;
