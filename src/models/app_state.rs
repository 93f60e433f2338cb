use super::config::ConfigModel;
use camino::Utf8PathBuf;

/// Where the running configuration came from at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Not loaded yet
    Unloaded,

    /// Read from an existing `UserConfig.json`
    File(Utf8PathBuf),

    /// No file existed; defaults were created
    Defaults,
}

/// Single source of truth for the editing session.
///
/// Exactly one instance exists per process. It is owned by
/// [`crate::state::StateManager`], which wraps it in `Arc<RwLock<AppState>>`
/// so a multi-threaded host can share it; never hold it anywhere else.
///
/// # Related Types
///
/// - [`crate::state::StateManager`]: Thread-safe wrapper with event emission
/// - [`crate::state::StateChange`]: Event types for state mutations
/// - [`crate::orchestrator::Orchestrator`]: Drives load, save and launch
#[derive(Clone, Debug)]
pub struct AppState {
    /// The operator's settings, edited in place
    pub config: ConfigModel,
    pub origin: ConfigOrigin,

    /// Path of the most recent successful save
    pub last_saved_path: Option<Utf8PathBuf>,

    /// A save is in flight
    pub is_saving: bool,

    /// Result of the last inline validation pass, recomputed on every mutation only
    pub can_launch: bool,

    /// The worker has been started; nothing may be changed afterwards
    pub handed_off: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            config: ConfigModel::default(),
            origin: ConfigOrigin::Unloaded,
            last_saved_path: None,
            is_saving: false,
            can_launch: false,
            handed_off: false,
        }
    }
}

impl AppState {
    /// Whether the session accepts edits and saves.
    pub fn is_editable(&self) -> bool {
        !self.handed_off
    }
}
