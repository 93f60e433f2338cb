//! Filesystem locations the launcher works with.

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

/// Overrides the detected install directory
pub const INSTALL_DIR_ENV: &str = "KKTIX_INSTALL_DIR";

/// Namespace under the per-user application-data directory
pub const APP_DATA_DIR_NAME: &str = "kktix";

/// Name shared by both config file candidates
pub const CONFIG_FILE_NAME: &str = "UserConfig.json";

/// Diagnostics directory under the install location
pub const LOG_DIR_NAME: &str = "Logs";

/// Resolved directories for one run of the launcher.
///
/// Built once at startup with [`AppPaths::detect`], or explicitly with
/// [`AppPaths::new`] in tests so nothing touches the real install location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    install_dir: Utf8PathBuf,
    per_user_dir: Utf8PathBuf,
    current_dir: Utf8PathBuf,
}

impl AppPaths {
    pub fn new(
        install_dir: impl Into<Utf8PathBuf>,
        per_user_dir: impl Into<Utf8PathBuf>,
        current_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            install_dir: install_dir.into(),
            per_user_dir: per_user_dir.into(),
            current_dir: current_dir.into(),
        }
    }

    /// Detect the locations for the running executable.
    ///
    /// - Install dir: `$KKTIX_INSTALL_DIR` if set, else the directory holding the executable
    /// - Per-user dir: `<local app data>/kktix` (`%LOCALAPPDATA%\kktix` on Windows)
    /// - Current dir: the process working directory
    pub fn detect() -> Result<Self> {
        let install_dir = match std::env::var(INSTALL_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Utf8PathBuf::from(dir.trim()),
            _ => {
                let exe = std::env::current_exe()
                    .context("Failed to locate the running executable")?;
                let exe = Utf8PathBuf::try_from(exe)
                    .map_err(|e| anyhow!("Executable path is not valid UTF-8: {}", e))?;
                exe.parent()
                    .map(Utf8Path::to_path_buf)
                    .ok_or_else(|| anyhow!("Executable path has no parent: {}", exe))?
            }
        };

        let data_local = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine the local application data directory"))?;
        let per_user_dir = Utf8PathBuf::try_from(data_local)
            .map_err(|e| anyhow!("Application data path is not valid UTF-8: {}", e))?
            .join(APP_DATA_DIR_NAME);

        let current_dir = std::env::current_dir().context("Failed to read current directory")?;
        let current_dir = Utf8PathBuf::try_from(current_dir)
            .map_err(|e| anyhow!("Current directory is not valid UTF-8: {}", e))?;

        tracing::debug!(
            "Detected paths: install={}, per_user={}, cwd={}",
            install_dir,
            per_user_dir,
            current_dir
        );

        Ok(Self::new(install_dir, per_user_dir, current_dir))
    }

    pub fn install_dir(&self) -> &Utf8Path {
        &self.install_dir
    }

    pub fn per_user_dir(&self) -> &Utf8Path {
        &self.per_user_dir
    }

    pub fn current_dir(&self) -> &Utf8Path {
        &self.current_dir
    }

    /// `UserConfig.json` beside the executable
    pub fn install_config_path(&self) -> Utf8PathBuf {
        self.install_dir.join(CONFIG_FILE_NAME)
    }

    /// `UserConfig.json` under the per-user directory
    pub fn per_user_config_path(&self) -> Utf8PathBuf {
        self.per_user_dir.join(CONFIG_FILE_NAME)
    }

    pub fn log_dir(&self) -> Utf8PathBuf {
        self.install_dir.join(LOG_DIR_NAME)
    }
}
