use crate::models::ConfigModel;
use crate::paths::AppPaths;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use std::io;
use thiserror::Error;

/// The two places `UserConfig.json` may live, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLocation {
    /// Beside the running executable
    InstallDir,

    /// Under the per-user application-data directory
    PerUser,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::InstallDir => f.write_str("install directory"),
            StoreLocation::PerUser => f.write_str("per-user directory"),
        }
    }
}

/// The persisted file exists but could not be turned back into a [`ConfigModel`].
///
/// Fatal: the caller must surface it rather than reset to defaults.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigLoadError {
    pub fn path(&self) -> &Utf8Path {
        match self {
            ConfigLoadError::Read { path, .. } | ConfigLoadError::Parse { path, .. } => path,
        }
    }
}

/// One failed write to a candidate location
#[derive(Debug)]
pub struct SaveAttempt {
    pub location: StoreLocation,
    pub path: Utf8PathBuf,
    pub error: io::Error,
}

impl fmt::Display for SaveAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.location, self.path, self.error)
    }
}

/// Every candidate location refused the write. Recoverable; the save can be retried.
#[derive(Error, Debug)]
pub enum ConfigSaveError {
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to save config to any location: {}", describe_attempts(.attempts))]
    AllLocationsFailed { attempts: Vec<SaveAttempt> },

    #[error("Configuration is locked after the worker was launched")]
    HandedOff,
}

fn describe_attempts(attempts: &[SaveAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Where a save landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub location: StoreLocation,
    pub path: Utf8PathBuf,
}

/// How [`ConfigStore::load`] produced its config
#[derive(Debug)]
pub enum LoadSource {
    /// An existing file was read
    File {
        location: StoreLocation,
        path: Utf8PathBuf,
    },

    /// Nothing existed; defaults were built and a save was attempted
    Defaults {
        saved: Result<SaveReceipt, ConfigSaveError>,
    },
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ConfigModel,
    pub source: LoadSource,
}

#[derive(Debug, Clone)]
struct Candidate {
    location: StoreLocation,
    path: Utf8PathBuf,

    /// Create the parent directory before writing
    create_parent: bool,
}

/// Loads and saves `UserConfig.json` across an ordered list of candidate locations.
///
/// The install-relative file always wins over the per-user one, on load and on
/// save. The per-user location exists only for installs whose own directory is
/// read-only, so only its parent directory is ever created.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    candidates: Vec<Candidate>,
}

impl ConfigStore {
    /// Create a store over the install-relative and per-user candidates of `paths`.
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            candidates: vec![
                Candidate {
                    location: StoreLocation::InstallDir,
                    path: paths.install_config_path(),
                    create_parent: false,
                },
                Candidate {
                    location: StoreLocation::PerUser,
                    path: paths.per_user_config_path(),
                    create_parent: true,
                },
            ],
        }
    }

    /// Candidate paths in preference order
    pub fn candidate_paths(&self) -> impl Iterator<Item = (StoreLocation, &Utf8Path)> {
        self.candidates
            .iter()
            .map(|c| (c.location, c.path.as_path()))
    }

    /// Load the configuration.
    ///
    /// Reads the first candidate that exists. When none exists, builds
    /// [`ConfigModel::default`] and saves it straight away; the outcome of that
    /// save is reported in [`LoadSource::Defaults`]. A file that exists but is
    /// unreadable or malformed is an error, never a silent reset.
    pub fn load(&self) -> Result<LoadedConfig, ConfigLoadError> {
        let Some(candidate) = self.candidates.iter().find(|c| c.path.is_file()) else {
            tracing::warn!(
                "No config file found at {}, creating defaults",
                self.describe_candidates()
            );
            let config = ConfigModel::default();
            let saved = self.save(&config);
            if let Err(e) = &saved {
                tracing::error!("Failed to persist default config: {}", e);
            }
            return Ok(LoadedConfig {
                config,
                source: LoadSource::Defaults { saved },
            });
        };

        let contents =
            fs::read_to_string(&candidate.path).map_err(|source| ConfigLoadError::Read {
                path: candidate.path.clone(),
                source,
            })?;

        let config = parse_config(&contents).map_err(|source| ConfigLoadError::Parse {
            path: candidate.path.clone(),
            source,
        })?;

        tracing::info!(
            "Loaded config from {} ({})",
            candidate.path,
            candidate.location
        );
        Ok(LoadedConfig {
            config,
            source: LoadSource::File {
                location: candidate.location,
                path: candidate.path.clone(),
            },
        })
    }

    /// Save the configuration to the first candidate that accepts the write.
    pub fn save(&self, config: &ConfigModel) -> Result<SaveReceipt, ConfigSaveError> {
        let json = to_json(config)?;
        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            match write_candidate(candidate, &json) {
                Ok(()) => return Ok(self.saved(candidate, &attempts)),
                Err(error) => attempts.push(self.failed(candidate, error)),
            }
        }

        Err(ConfigSaveError::AllLocationsFailed { attempts })
    }

    /// Non-blocking variant of [`ConfigStore::save`] for use from the runtime.
    ///
    /// Callers must not run two saves of the same config concurrently; the
    /// orchestrator serializes them.
    pub async fn save_async(&self, config: &ConfigModel) -> Result<SaveReceipt, ConfigSaveError> {
        let json = to_json(config)?;
        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            match write_candidate_async(candidate, &json).await {
                Ok(()) => return Ok(self.saved(candidate, &attempts)),
                Err(error) => attempts.push(self.failed(candidate, error)),
            }
        }

        Err(ConfigSaveError::AllLocationsFailed { attempts })
    }

    fn saved(&self, candidate: &Candidate, attempts: &[SaveAttempt]) -> SaveReceipt {
        if attempts.is_empty() {
            tracing::info!("Saved config to {}", candidate.path);
        } else {
            tracing::info!(
                "Saved config to fallback {} after {} failed attempt(s)",
                candidate.path,
                attempts.len()
            );
        }
        SaveReceipt {
            location: candidate.location,
            path: candidate.path.clone(),
        }
    }

    fn failed(&self, candidate: &Candidate, error: io::Error) -> SaveAttempt {
        tracing::warn!(
            "Failed to write config to {} ({}): {}",
            candidate.path,
            candidate.location,
            error
        );
        SaveAttempt {
            location: candidate.location,
            path: candidate.path.clone(),
            error,
        }
    }

    fn describe_candidates(&self) -> String {
        self.candidates
            .iter()
            .map(|c| c.path.as_str())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

fn write_candidate(candidate: &Candidate, json: &str) -> io::Result<()> {
    if candidate.create_parent {
        if let Some(parent) = candidate.path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&candidate.path, json.as_bytes())
}

async fn write_candidate_async(candidate: &Candidate, json: &str) -> io::Result<()> {
    if candidate.create_parent {
        if let Some(parent) = candidate.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&candidate.path, json.as_bytes()).await
}

/// Pretty-printed JSON, UTF-8 without a byte-order mark.
pub fn to_json(config: &ConfigModel) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(config)
}

/// Parse a persisted config. A leading BOM is tolerated; `null` yields defaults.
pub fn parse_config(contents: &str) -> Result<ConfigModel, serde_json::Error> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let config: Option<ConfigModel> = serde_json::from_str(contents)?;
    Ok(config.unwrap_or_default())
}
