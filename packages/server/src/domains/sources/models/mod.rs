pub mod activity;
pub mod source;

pub use activity::*;
pub use source::*;
