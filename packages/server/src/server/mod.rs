// HTTP server setup (Axum task endpoints)
pub mod app;
pub mod routes;

pub use app::*;
