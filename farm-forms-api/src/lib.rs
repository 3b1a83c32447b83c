//! Farm data collection API
//!
//! REST endpoints for dynamic forms, response submission and per-block
//! coverage summaries over active (not soft-deleted) responses.

pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod seed;
pub mod store;
pub mod summary;
pub mod types;


pub use config::Config;
pub use routes::{app_router, AppState};
pub use store::{FormStore, PgFormStore};
