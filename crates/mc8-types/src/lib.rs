pub mod base36;
pub mod types;

pub use base36::*;
pub use types::*;
