// Webmention Bridge - Core
//
// Polls linked silo accounts for new activity, records each response, and
// delivers webmentions for it to every target the activity links to.
//
// Work is driven by two idempotent tasks, poll and propagate, delivered by
// an at-least-once queue (HTTP task endpoints or the Postgres task worker).

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;
pub mod storage;

pub use config::*;
