// Common types and utilities shared across the application

pub mod entity_keys;
pub mod key;
pub mod targets;
pub mod time;
pub mod urls;

pub use entity_keys::*;
pub use key::{strip_tag_uri, Key};
pub use targets::TargetSet;
