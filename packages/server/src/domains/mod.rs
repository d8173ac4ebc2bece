// Business domains
pub mod polling;
pub mod propagation;
pub mod responses;
pub mod sources;
