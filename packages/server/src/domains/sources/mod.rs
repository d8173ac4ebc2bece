//! Sources: linked silo accounts, the activities they return, and the silo
//! adapters that fetch them.

pub mod models;
pub mod silos;

pub use models::*;
pub use silos::{ActivityStreamsSilo, Silo, SiloError, SiloRegistry};
