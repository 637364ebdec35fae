//! EcoBot API crate - axum HTTP backend for the chat widget.
//!
//! Holds one conversation session per widget, forwards messages to the
//! configured completion provider and reports classified failures as JSON.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
