// HTTP routes
pub mod health;
pub mod tasks;

pub use health::*;
pub use tasks::*;
