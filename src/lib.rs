// KKTIX Launcher - configuration and launch orchestrator for the ticket worker
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the command-line front end.

pub mod config;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod paths;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ConfigLoadError, ConfigSaveError, ConfigStore, SaveReceipt, StoreLocation};
pub use models::{AppState, ConfigModel, ConfigOrigin, Field};
pub use orchestrator::{LaunchOutcome, Orchestrator, StartupOutcome};
pub use paths::AppPaths;
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
