//! Responses: the per-interaction ledger of webmention targets.

pub mod models;

pub use models::*;
