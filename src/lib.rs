// Re-export modules for the CLI and for integration tests
pub mod config;
pub mod error;
pub mod gg; // Gadu-Gadu protocol engine
pub mod models;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use error::{DecodeError, GGError, Result};
pub use gg::{GGClient, GGClientBuilder, GGEvent, OutgoingMessage, SessionState};
pub use models::*;
