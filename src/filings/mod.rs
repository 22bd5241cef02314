// src/filings/mod.rs
pub mod holdings;
pub mod submissions;
pub mod types;
pub mod validate;

pub use types::{FetchDescriptor, Index, IndexComponent};
