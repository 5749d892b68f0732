//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Entity models and the canonical relationship pair key

mod database;
mod models;

pub use database::{Database, SendTransition};
pub use models::*;
