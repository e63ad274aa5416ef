// crates/pdo-exchange/src/pdo/mod.rs

pub mod error;
pub mod layout;
pub mod mapping;

pub use error::PdoError;
pub use layout::{FrameLayout, LayoutEntry, PdoMappingEntry};
pub use mapping::{FrameLimits, MappedRegister, MappingTable};
