//! Kernel module - server infrastructure and dependencies.

pub mod cache;
pub mod deps;
pub mod jobs;
pub mod test_dependencies;
pub mod traits;

pub use cache::MemoryCache;
pub use deps::{ServerDeps, WebmentionAdapter};
pub use test_dependencies::TestDependencies;
pub use traits::*;
