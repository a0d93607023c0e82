//! MDLAB HTTP API
//!
//! Axum front end over `mdlab-core`: appointment intake, lifecycle
//! transitions, the service catalog and account registration.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod router;
pub mod state;

pub use config::ApiConfig;
pub use error::ApiError;
pub use router::api_router;
pub use state::AppState;
