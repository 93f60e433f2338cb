use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Directory holding the automation worker
pub const WORKER_DIR_NAME: &str = "undetected-chromedriver";

/// Worker entry script inside [`WORKER_DIR_NAME`]
pub const ENTRY_SCRIPT: &str = "main.py";

/// Environment variable telling the worker which config file to read
pub const CONFIG_PATH_ENV: &str = "USER_CONFIG";

/// Virtual-environment interpreter, relative to the worker directory
#[cfg(windows)]
const INTERPRETER: [&str; 3] = ["venv", "Scripts", "python.exe"];
#[cfg(not(windows))]
const INTERPRETER: [&str; 3] = ["venv", "bin", "python"];

#[cfg(windows)]
const SYSTEM_PYTHON: &str = "python";
#[cfg(not(windows))]
const SYSTEM_PYTHON: &str = "python3";

/// Give the worker its own console instead of sharing the host's
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// Candidate locations of the worker, computed by [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPaths {
    pub interpreter: Utf8PathBuf,
    pub entry_script: Utf8PathBuf,
    pub working_dir: Utf8PathBuf,
}

impl WorkerPaths {
    /// Expected interpreter and entry script inside `worker_dir`
    pub fn for_dir(worker_dir: &Utf8Path) -> Self {
        let interpreter = INTERPRETER
            .iter()
            .fold(worker_dir.to_path_buf(), |path, part| path.join(part));

        Self {
            interpreter,
            entry_script: worker_dir.join(ENTRY_SCRIPT),
            working_dir: worker_dir.to_path_buf(),
        }
    }
}

/// The worker's interpreter or entry script is missing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Cannot find {} in {}.\nCreate the virtual environment and install the requirements:\n  {}\n  {}",
    describe_missing(.interpreter_missing, .entry_script_missing),
    .worker_dir,
    remediation_commands()[0],
    remediation_commands()[1]
)]
pub struct MissingWorkerError {
    pub worker_dir: Utf8PathBuf,
    pub interpreter_missing: bool,
    pub entry_script_missing: bool,
}

fn describe_missing(interpreter_missing: &bool, entry_script_missing: &bool) -> String {
    let interpreter = INTERPRETER.join("/");
    match (*interpreter_missing, *entry_script_missing) {
        (true, true) => format!("{} or {}", interpreter, ENTRY_SCRIPT),
        (true, false) => interpreter,
        _ => ENTRY_SCRIPT.to_string(),
    }
}

/// Process creation failed, or a launch was attempted after the hand-off
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("The worker has already been launched")]
    AlreadyHandedOff,
}

/// The two commands that set up the worker's environment, relative to its parent directory.
pub fn remediation_commands() -> [String; 2] {
    let venv = format!("{}/venv", WORKER_DIR_NAME);
    let interpreter = format!("{}/{}", WORKER_DIR_NAME, INTERPRETER.join("/"));
    [
        format!("{} -m venv {}", SYSTEM_PYTHON, venv),
        format!(
            "{} -m pip install -r {}/requirements.txt",
            interpreter, WORKER_DIR_NAME
        ),
    ]
}

/// Walk from `start` up to the filesystem root, returning the first `start/../<name>`
/// directory found. `start` itself is checked first.
pub fn find_directory_upwards(start: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    // ancestors() ends at the root, so the walk is bounded by the path depth
    for dir in start.ancestors() {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
    }
    None
}

/// Locate the worker relative to the install directory.
///
/// Never fails: when no ancestor of `install_dir` holds the worker directory the
/// result points under `current_dir`, and [`verify`] reports what is missing.
pub fn resolve(install_dir: &Utf8Path, current_dir: &Utf8Path) -> WorkerPaths {
    let worker_dir = find_directory_upwards(install_dir, WORKER_DIR_NAME)
        .unwrap_or_else(|| current_dir.join(WORKER_DIR_NAME));

    tracing::debug!("Resolved worker directory: {}", worker_dir);
    WorkerPaths::for_dir(&worker_dir)
}

/// Check that both the interpreter and the entry script exist.
pub fn verify(paths: &WorkerPaths) -> Result<(), MissingWorkerError> {
    let interpreter_missing = !paths.interpreter.is_file();
    let entry_script_missing = !paths.entry_script.is_file();

    if interpreter_missing || entry_script_missing {
        tracing::warn!(
            "Worker incomplete in {}: interpreter_missing={}, entry_script_missing={}",
            paths.working_dir,
            interpreter_missing,
            entry_script_missing
        );
        return Err(MissingWorkerError {
            worker_dir: paths.working_dir.clone(),
            interpreter_missing,
            entry_script_missing,
        });
    }

    Ok(())
}

/// Everything needed to start the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub paths: WorkerPaths,

    /// Config file the worker should read, passed as [`CONFIG_PATH_ENV`]
    pub config_path: Option<Utf8PathBuf>,
}

/// Starts the worker process.
///
/// Implementations must not wait for the child; the hand-off is one-way.
#[cfg_attr(test, mockall::automock)]
pub trait WorkerSpawner: Send + Sync {
    /// Start the worker, returning its process id when the platform reports one.
    fn spawn(&self, request: &LaunchRequest) -> Result<Option<u32>, LaunchError>;
}

/// Spawns the worker as a detached OS process
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl WorkerSpawner for ProcessSpawner {
    fn spawn(&self, request: &LaunchRequest) -> Result<Option<u32>, LaunchError> {
        let paths = &request.paths;

        let mut cmd = Command::new(&paths.interpreter);
        cmd.arg(&paths.entry_script)
            .current_dir(&paths.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(false);

        if let Some(config_path) = &request.config_path {
            cmd.env(CONFIG_PATH_ENV, config_path);
        }

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NEW_CONSOLE);

        // Own process group so signals aimed at the host don't reach the worker
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::info!(
            "Launching worker: \"{}\" \"{}\" (cwd: {})",
            paths.interpreter,
            paths.entry_script,
            paths.working_dir
        );

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            interpreter: paths.interpreter.clone(),
            source,
        })?;

        let pid = child.id();
        tracing::info!("Worker started with pid {:?}", pid);

        // Dropping the handle does not stop the child; nobody waits for it
        drop(child);
        Ok(pid)
    }
}

/// Start the worker with [`ProcessSpawner`].
pub fn launch(request: &LaunchRequest) -> Result<Option<u32>, LaunchError> {
    ProcessSpawner.spawn(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    fn install_worker(dir: &Utf8Path) -> WorkerPaths {
        let paths = WorkerPaths::for_dir(dir);
        fs::create_dir_all(paths.interpreter.parent().unwrap()).unwrap();
        fs::write(&paths.interpreter, b"").unwrap();
        fs::write(&paths.entry_script, b"print('hi')").unwrap();
        paths
    }

    #[test]
    fn test_worker_paths_layout() {
        let paths = WorkerPaths::for_dir(Utf8Path::new("/w/undetected-chromedriver"));
        assert_eq!(
            paths.entry_script,
            Utf8PathBuf::from("/w/undetected-chromedriver/main.py")
        );
        assert!(paths.interpreter.starts_with("/w/undetected-chromedriver/venv"));
        assert_eq!(
            paths.working_dir,
            Utf8PathBuf::from("/w/undetected-chromedriver")
        );
    }

    #[test]
    fn test_find_directory_in_start_dir() {
        let (_temp_dir, root) = temp_root();
        fs::create_dir_all(root.join(WORKER_DIR_NAME)).unwrap();

        assert_eq!(
            find_directory_upwards(&root, WORKER_DIR_NAME),
            Some(root.join(WORKER_DIR_NAME))
        );
    }

    #[test]
    fn test_find_directory_in_ancestor() {
        let (_temp_dir, root) = temp_root();
        fs::create_dir_all(root.join(WORKER_DIR_NAME)).unwrap();
        let deep = root.join("app").join("bin").join("x64");
        fs::create_dir_all(&deep).unwrap();

        assert_eq!(
            find_directory_upwards(&deep, WORKER_DIR_NAME),
            Some(root.join(WORKER_DIR_NAME))
        );
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let (_temp_dir, root) = temp_root();
        let inner = root.join("app");
        fs::create_dir_all(root.join(WORKER_DIR_NAME)).unwrap();
        fs::create_dir_all(inner.join(WORKER_DIR_NAME)).unwrap();
        let start = inner.join("bin");
        fs::create_dir_all(&start).unwrap();

        assert_eq!(
            find_directory_upwards(&start, WORKER_DIR_NAME),
            Some(inner.join(WORKER_DIR_NAME))
        );
    }

    #[test]
    fn test_file_with_worker_name_is_ignored() {
        let (_temp_dir, root) = temp_root();
        let start = root.join("app");
        fs::create_dir_all(&start).unwrap();
        fs::write(start.join(WORKER_DIR_NAME), b"not a dir").unwrap();

        let found = find_directory_upwards(&start, WORKER_DIR_NAME);
        assert_ne!(found, Some(start.join(WORKER_DIR_NAME)));
    }

    #[test]
    fn test_verify_complete_worker() {
        let (_temp_dir, root) = temp_root();
        let paths = install_worker(&root.join(WORKER_DIR_NAME));
        assert!(verify(&paths).is_ok());
    }

    #[test]
    fn test_verify_reports_missing_parts() {
        let (_temp_dir, root) = temp_root();
        let dir = root.join(WORKER_DIR_NAME);
        let paths = WorkerPaths::for_dir(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(&paths.entry_script, b"").unwrap();

        let err = verify(&paths).unwrap_err();
        assert!(err.interpreter_missing);
        assert!(!err.entry_script_missing);
        assert_eq!(err.worker_dir, dir);
    }

    #[test]
    fn test_missing_worker_message_has_remediation() {
        let err = MissingWorkerError {
            worker_dir: Utf8PathBuf::from("/nowhere/undetected-chromedriver"),
            interpreter_missing: true,
            entry_script_missing: true,
        };
        let message = err.to_string();
        let [create_venv, install_requirements] = remediation_commands();
        assert!(message.contains(&create_venv));
        assert!(message.contains(&install_requirements));
        assert!(message.contains("main.py"));
        assert!(create_venv.contains("-m venv undetected-chromedriver/venv"));
        assert!(install_requirements.contains("requirements.txt"));
    }

    #[test]
    fn test_mock_spawner_receives_request() {
        let mut spawner = MockWorkerSpawner::new();
        spawner
            .expect_spawn()
            .withf(|request| request.config_path.as_deref() == Some(Utf8Path::new("/cfg.json")))
            .times(1)
            .returning(|_| Ok(Some(42)));

        let request = LaunchRequest {
            paths: WorkerPaths::for_dir(Utf8Path::new("/w")),
            config_path: Some(Utf8PathBuf::from("/cfg.json")),
        };
        assert_eq!(spawner.spawn(&request).unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_spawn_missing_interpreter_is_launch_error() {
        let (_temp_dir, root) = temp_root();
        let dir = root.join(WORKER_DIR_NAME);
        fs::create_dir_all(&dir).unwrap();

        let request = LaunchRequest {
            paths: WorkerPaths::for_dir(&dir),
            config_path: None,
        };
        let err = launch(&request).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
