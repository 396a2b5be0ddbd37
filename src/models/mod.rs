//! Data models: upstream payloads and flat output records.

mod api;
mod records;

pub use api::*;
pub use records::*;
