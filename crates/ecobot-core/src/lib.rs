pub mod config;
pub mod error;
pub mod types;

pub use config::EcobotConfig;
pub use error::{EcobotError, Result};
pub use types::*;
