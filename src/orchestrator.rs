// Orchestrator - the only component the front end talks to
//
// Composes ConfigStore, the validator and the worker launcher around the
// StateManager-owned config:
// - Startup: load (or create) the config, fatal on a corrupt file
// - Save: serialized non-blocking writes with install-dir → per-user fallback
// - Validate and launch: full check, save, resolve + verify the worker, spawn, hand off

use crate::config::{ConfigLoadError, ConfigSaveError, ConfigStore, LoadSource, SaveReceipt};
use crate::logging::{self, ERROR_LOG, LAUNCHER_LOG};
use crate::models::{ConfigModel, ConfigOrigin};
use crate::paths::AppPaths;
use crate::services::launcher::{
    self, LaunchError, LaunchRequest, MissingWorkerError, ProcessSpawner, WorkerSpawner,
};
use crate::services::validation::{ValidationError, ValidationReport};
use crate::state::StateManager;
use camino::Utf8PathBuf;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of [`Orchestrator::load_on_startup`]
#[derive(Debug)]
pub enum StartupOutcome {
    /// The config is in place and editing may begin.
    ///
    /// `warning` carries a failed attempt to persist freshly created defaults.
    Ready {
        origin: ConfigOrigin,
        warning: Option<ConfigSaveError>,
    },

    /// The persisted file is unusable. The host must show `message` and stop;
    /// defaults are deliberately not substituted.
    Fatal {
        error: ConfigLoadError,
        message: String,
        log_path: Utf8PathBuf,
    },
}

/// Result of [`Orchestrator::validate_and_launch`]
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The worker is running. The host must now exit.
    Launched {
        pid: Option<u32>,
        config_path: Utf8PathBuf,
    },

    /// One or more fields are invalid; keep editing
    Invalid(ValidationError),

    /// The config could not be written anywhere; the worker was not started
    SaveFailed(ConfigSaveError),

    /// The worker's interpreter or entry script is missing
    WorkerMissing(MissingWorkerError),

    /// Process creation failed
    Failed(LaunchError),
}

impl LaunchOutcome {
    pub fn is_launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched { .. })
    }

    /// Text for the host to show the operator
    pub fn user_message(&self) -> String {
        match self {
            LaunchOutcome::Launched { pid, config_path } => match pid {
                Some(pid) => format!("Worker started (pid {}) with {}", pid, config_path),
                None => format!("Worker started with {}", config_path),
            },
            LaunchOutcome::Invalid(e) => e.to_string(),
            LaunchOutcome::SaveFailed(e) => format!("Could not save settings: {}", e),
            LaunchOutcome::WorkerMissing(e) => format!("Launch failed.\n{}", e),
            LaunchOutcome::Failed(e) => format!("Could not start the worker: {}", e),
        }
    }
}

/// Coordinates load, save, validation and launch for the front end.
///
/// Owns no config of its own: the singleton lives in the injected
/// [`StateManager`], so tests can build as many isolated orchestrators as they like.
///
/// # Example
/// ```ignore
/// let paths = AppPaths::detect()?;
/// let state = Arc::new(StateManager::new());
/// let orchestrator = Orchestrator::new(paths, state);
///
/// if let StartupOutcome::Fatal { message, .. } = orchestrator.load_on_startup() {
///     eprintln!("{message}");
///     return Ok(());
/// }
/// let outcome = orchestrator.validate_and_launch().await;
/// ```
pub struct Orchestrator<S: WorkerSpawner = ProcessSpawner> {
    paths: AppPaths,
    store: ConfigStore,
    state: Arc<StateManager>,
    spawner: S,

    /// Serializes saves and launches of the shared config
    save_gate: Mutex<()>,
}

impl Orchestrator<ProcessSpawner> {
    /// Create an orchestrator that spawns real worker processes
    pub fn new(paths: AppPaths, state: Arc<StateManager>) -> Self {
        Self::with_spawner(paths, state, ProcessSpawner)
    }
}

impl<S: WorkerSpawner> Orchestrator<S> {
    pub fn with_spawner(paths: AppPaths, state: Arc<StateManager>, spawner: S) -> Self {
        Self {
            store: ConfigStore::new(&paths),
            paths,
            state,
            spawner,
            save_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Load the config into the session state.
    ///
    /// Must run before any editing is allowed. A corrupt or unreadable file is
    /// logged to `Logs/error.txt` and returned as [`StartupOutcome::Fatal`].
    pub fn load_on_startup(&self) -> StartupOutcome {
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::error!("Config load failed: {}", error);
                let log_path = self.diagnose(ERROR_LOG, &format!("LoadConfig error: {}", error));
                let message = format!(
                    "Failed to load the configuration file.\nPlease send the following log file to the developer:\n{}",
                    log_path
                );
                return StartupOutcome::Fatal {
                    error,
                    message,
                    log_path,
                };
            }
        };

        let (origin, saved_to, warning) = match loaded.source {
            LoadSource::File { path, .. } => (ConfigOrigin::File(path), None, None),
            LoadSource::Defaults { saved: Ok(receipt) } => {
                (ConfigOrigin::Defaults, Some(receipt.path), None)
            }
            LoadSource::Defaults { saved: Err(e) } => {
                self.diagnose(ERROR_LOG, &format!("Initial save error: {}", e));
                (ConfigOrigin::Defaults, None, Some(e))
            }
        };

        self.state.load_config(loaded.config, origin.clone());
        if let Some(path) = saved_to {
            self.state.update(|state| state.last_saved_path = Some(path));
        }

        tracing::info!("Startup complete: origin={:?}", origin);
        StartupOutcome::Ready { origin, warning }
    }

    /// Persist the current config.
    ///
    /// Never blocked by validation. Concurrent calls are serialized so two
    /// writes of the singleton never interleave.
    pub async fn save(&self) -> Result<SaveReceipt, ConfigSaveError> {
        let _gate = self.save_gate.lock().await;

        let Some(config) = self.state.begin_save() else {
            return Err(ConfigSaveError::HandedOff);
        };
        self.write_snapshot(&config).await
    }

    /// Write a snapshot taken by `begin_save*`. Caller holds `save_gate`.
    async fn write_snapshot(&self, config: &ConfigModel) -> Result<SaveReceipt, ConfigSaveError> {
        let result = self.store.save_async(config).await;
        match &result {
            Ok(receipt) => {
                self.state.finish_save(Some(receipt.path.clone()));
            }
            Err(e) => {
                tracing::error!("Save failed: {}", e);
                self.state.finish_save(None);
            }
        }
        result
    }

    /// Per-field check driving inline annotations and the launch button
    pub fn inline_check(&self) -> ValidationReport {
        self.state.inline_report(Utc::now())
    }

    /// All violated rules at once, as shown before launching
    pub fn full_check(&self) -> Result<(), ValidationError> {
        self.state.inline_report(Utc::now()).into_result()
    }

    /// Validate, save, then hand off to the worker.
    ///
    /// On [`LaunchOutcome::Launched`] the session is locked and the host must
    /// terminate; there is no way back.
    pub async fn validate_and_launch(&self) -> LaunchOutcome {
        // Held until the hand-off so no other save can replace the file the
        // worker is about to read
        let _gate = self.save_gate.lock().await;

        // The snapshot validated here is exactly the one written and launched
        let config = match self.state.begin_validated_save(Utc::now()) {
            None => return LaunchOutcome::Failed(LaunchError::AlreadyHandedOff),
            Some(Err(e)) => {
                tracing::info!("Launch blocked by {} validation error(s)", e.0.errors().len());
                return LaunchOutcome::Invalid(e);
            }
            Some(Ok(config)) => config,
        };

        let receipt = match self.write_snapshot(&config).await {
            Ok(receipt) => receipt,
            Err(e) => return LaunchOutcome::SaveFailed(e),
        };

        let worker = launcher::resolve(self.paths.install_dir(), self.paths.current_dir());
        self.diagnose(LAUNCHER_LOG, &format!("baseDir={}", self.paths.install_dir()));
        self.diagnose(LAUNCHER_LOG, &format!("workerDir={}", worker.working_dir));
        self.diagnose(
            LAUNCHER_LOG,
            &format!(
                "interpreterExists={} entryExists={}",
                worker.interpreter.is_file(),
                worker.entry_script.is_file()
            ),
        );

        if let Err(e) = launcher::verify(&worker) {
            return LaunchOutcome::WorkerMissing(e);
        }

        let request = LaunchRequest {
            paths: worker,
            config_path: Some(receipt.path.clone()),
        };

        match self.spawner.spawn(&request) {
            Ok(pid) => {
                self.state.mark_handed_off();
                tracing::info!("Handed off to worker (pid {:?})", pid);
                LaunchOutcome::Launched {
                    pid,
                    config_path: receipt.path,
                }
            }
            Err(e) => {
                tracing::error!("Worker launch failed: {}", e);
                self.diagnose(LAUNCHER_LOG, &format!("launch-exception: {}", e));
                LaunchOutcome::Failed(e)
            }
        }
    }

    /// Best-effort diagnostics line; returns the intended log path either way
    fn diagnose(&self, file_name: &str, message: &str) -> Utf8PathBuf {
        let log_dir = self.paths.log_dir();
        logging::append_diagnostic(&log_dir, file_name, message)
            .unwrap_or_else(|| log_dir.join(file_name))
    }
}
