//! Data models for the launcher.
//!
//! - [`ConfigModel`]: The operator's settings, persisted to `UserConfig.json`
//! - [`Field`]: Names each editable field for validation messages and change events
//! - [`AppState`]: The process-wide editing session held by [`StateManager`](crate::state::StateManager)
//! - [`sale_time`]: Taipei-zone defaults and the date/clock editing helpers
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: `ConfigModel` derives `Serialize`/`Deserialize` for JSON persistence
//! - **Owned**: There is no global instance; the session state is injected where needed

pub mod app_state;
pub mod config;
pub mod sale_time;

pub use app_state::{AppState, ConfigOrigin};
pub use config::{ConfigModel, Field};
