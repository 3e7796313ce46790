// Core modules
pub mod api;
pub mod close;
pub mod config;
pub mod feed;
pub mod markers;
pub mod models;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use models::*;
pub use session::SessionController;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
