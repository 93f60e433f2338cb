//! End-to-end tests for the orchestrator against a temporary install tree
//!
//! A recording spawner stands in for the real process so nothing is executed.

use camino::Utf8PathBuf;
use chrono::{Duration, Utc};
use kktix_launcher::config::{ConfigSaveError, to_json};
use kktix_launcher::logging::{ERROR_LOG, LAUNCHER_LOG};
use kktix_launcher::services::launcher::{
    LaunchError, LaunchRequest, WORKER_DIR_NAME, WorkerPaths, WorkerSpawner,
};
use kktix_launcher::{
    AppPaths, ConfigModel, ConfigOrigin, LaunchOutcome, Orchestrator, StartupOutcome,
    StateManager, StoreLocation,
};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct RecordingSpawner {
    requests: Arc<Mutex<Vec<LaunchRequest>>>,
}

impl WorkerSpawner for RecordingSpawner {
    fn spawn(&self, request: &LaunchRequest) -> Result<Option<u32>, LaunchError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Some(1234))
    }
}

struct Harness {
    _temp_dir: TempDir,
    paths: AppPaths,
    spawner: RecordingSpawner,
    orchestrator: Orchestrator<RecordingSpawner>,
}

/// Install tree: `<root>/app/bin` with the worker at `<root>/undetected-chromedriver`
fn harness(create_install: bool, with_worker: bool) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let install = root.join("app").join("bin");
    if create_install {
        fs::create_dir_all(&install).unwrap();
    }
    if with_worker {
        let worker = WorkerPaths::for_dir(&root.join(WORKER_DIR_NAME));
        fs::create_dir_all(worker.interpreter.parent().unwrap()).unwrap();
        fs::write(&worker.interpreter, b"").unwrap();
        fs::write(&worker.entry_script, b"").unwrap();
    }

    let paths = AppPaths::new(install, root.join("appdata").join("kktix"), root.join("cwd"));
    let spawner = RecordingSpawner::default();
    let orchestrator = Orchestrator::with_spawner(
        paths.clone(),
        Arc::new(StateManager::new()),
        spawner.clone(),
    );

    Harness {
        _temp_dir: temp_dir,
        paths,
        spawner,
        orchestrator,
    }
}

fn fill_valid(orchestrator: &Orchestrator<RecordingSpawner>) {
    orchestrator.state().edit_config(|c| {
        c.username = "alice".to_string();
        c.password = "secret".to_string();
        c.ticket_name1 = "VIP".to_string();
        c.ticket_price = "3800".to_string();
        c.ticket_quantity = "2".to_string();
        c.ticket_url = "https://kktix.com/events/abc/registrations/new".to_string();
        c.sale_time = (Utc::now() + Duration::days(1)).fixed_offset();
    });
}

#[test]
fn test_first_startup_creates_defaults() {
    let h = harness(true, false);

    match h.orchestrator.load_on_startup() {
        StartupOutcome::Ready { origin, warning } => {
            assert_eq!(origin, ConfigOrigin::Defaults);
            assert!(warning.is_none());
        }
        other => panic!("unexpected startup outcome {:?}", other),
    }

    assert!(h.paths.install_config_path().is_file());
    assert_eq!(
        h.orchestrator.state().read(|s| s.last_saved_path.clone()),
        Some(h.paths.install_config_path())
    );
    // Defaults are never launchable: required fields are blank
    assert!(!h.orchestrator.inline_check().can_launch());
}

#[test]
fn test_startup_reads_existing_file() {
    let h = harness(true, false);
    let existing = ConfigModel {
        username: "bob".to_string(),
        ..ConfigModel::default()
    };
    fs::write(h.paths.install_config_path(), to_json(&existing).unwrap()).unwrap();

    let outcome = h.orchestrator.load_on_startup();
    assert!(matches!(
        outcome,
        StartupOutcome::Ready {
            origin: ConfigOrigin::File(_),
            ..
        }
    ));
    assert_eq!(h.orchestrator.state().config().username, "bob");
}

#[test]
fn test_corrupt_file_is_fatal_with_log() {
    let h = harness(true, false);
    fs::write(h.paths.install_config_path(), "not json").unwrap();

    match h.orchestrator.load_on_startup() {
        StartupOutcome::Fatal { log_path, .. } => {
            assert_eq!(log_path, h.paths.log_dir().join(ERROR_LOG));
            assert!(log_path.is_file());
        }
        other => panic!("unexpected startup outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_save_falls_back_when_install_missing() {
    let h = harness(false, false);
    h.orchestrator.load_on_startup();
    h.orchestrator.state().edit_config(|c| c.username = "carol".to_string());

    let receipt = h.orchestrator.save().await.unwrap();
    assert_eq!(receipt.location, StoreLocation::PerUser);
    assert!(!h.orchestrator.state().read(|s| s.is_saving));
}

#[tokio::test]
async fn test_save_is_allowed_while_invalid() {
    let h = harness(true, false);
    h.orchestrator.load_on_startup();
    h.orchestrator.state().edit_config(|c| c.ticket_quantity = "zero".to_string());

    assert!(h.orchestrator.save().await.is_ok());
    assert!(h.orchestrator.full_check().is_err());
}

#[tokio::test]
async fn test_concurrent_saves_leave_a_complete_file() {
    let h = harness(true, false);
    h.orchestrator.load_on_startup();
    fill_valid(&h.orchestrator);

    let (a, b, c) = tokio::join!(
        h.orchestrator.save(),
        h.orchestrator.save(),
        h.orchestrator.save()
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let on_disk = fs::read_to_string(h.paths.install_config_path()).unwrap();
    assert_eq!(on_disk, to_json(&h.orchestrator.state().config()).unwrap());
}

#[tokio::test]
async fn test_launch_hands_off_once() {
    let h = harness(true, true);
    h.orchestrator.load_on_startup();
    fill_valid(&h.orchestrator);

    let outcome = h.orchestrator.validate_and_launch().await;
    match &outcome {
        LaunchOutcome::Launched { pid, config_path } => {
            assert_eq!(*pid, Some(1234));
            assert_eq!(*config_path, h.paths.install_config_path());
        }
        other => panic!("unexpected launch outcome {:?}", other),
    }

    {
        let requests = h.spawner.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].paths.working_dir.ends_with(WORKER_DIR_NAME));
        assert_eq!(
            requests[0].config_path.as_ref(),
            Some(&h.paths.install_config_path())
        );
    }

    let log = fs::read_to_string(h.paths.log_dir().join(LAUNCHER_LOG)).unwrap();
    assert!(log.contains("baseDir="));
    assert!(log.contains("interpreterExists=true entryExists=true"));

    // Nothing more is accepted after the hand-off
    assert!(matches!(
        h.orchestrator.validate_and_launch().await,
        LaunchOutcome::Failed(LaunchError::AlreadyHandedOff)
    ));
    assert!(matches!(
        h.orchestrator.save().await,
        Err(ConfigSaveError::HandedOff)
    ));
    assert_eq!(h.spawner.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_config_blocks_launch_without_saving() {
    let h = harness(true, true);
    h.orchestrator.load_on_startup();
    let before = fs::read(h.paths.install_config_path()).unwrap();

    fill_valid(&h.orchestrator);
    h.orchestrator.state().edit_config(|c| c.ticket_price = "1,000".to_string());

    match h.orchestrator.validate_and_launch().await {
        LaunchOutcome::Invalid(e) => assert_eq!(e.0.errors().len(), 1),
        other => panic!("unexpected launch outcome {:?}", other),
    }
    assert_eq!(fs::read(h.paths.install_config_path()).unwrap(), before);
    assert!(h.spawner.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_worker_reports_remediation() {
    let h = harness(true, false);
    h.orchestrator.load_on_startup();
    fill_valid(&h.orchestrator);

    let outcome = h.orchestrator.validate_and_launch().await;
    assert!(matches!(outcome, LaunchOutcome::WorkerMissing(_)));
    assert!(outcome.user_message().contains("-m venv"));
    assert!(h.spawner.requests.lock().unwrap().is_empty());
    assert!(!h.orchestrator.state().read(|s| s.handed_off));
}

#[tokio::test]
async fn test_edit_racing_a_launch_is_validated_before_hand_off() {
    let h = harness(true, true);
    h.orchestrator.load_on_startup();
    fill_valid(&h.orchestrator);

    // The plain save holds the gate while it writes; the launch queues behind
    // it and the edit lands in between
    let (saved, outcome, _) = tokio::join!(
        h.orchestrator.save(),
        h.orchestrator.validate_and_launch(),
        async {
            h.orchestrator
                .state()
                .edit_config(|c| c.ticket_quantity = "0".to_string())
        }
    );

    assert!(saved.is_ok());
    match outcome {
        LaunchOutcome::Invalid(e) => {
            assert!(e.0.has_error(kktix_launcher::Field::TicketQuantity))
        }
        other => panic!("unexpected launch outcome {:?}", other),
    }
    assert!(h.spawner.requests.lock().unwrap().is_empty());
    assert!(!h.orchestrator.state().read(|s| s.handed_off));
}

#[tokio::test]
async fn test_launch_blocked_when_no_location_is_writable() {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    // Files where both parent directories should be
    fs::write(root.join("app"), b"blocked").unwrap();
    fs::write(root.join("appdata"), b"blocked").unwrap();
    let worker = WorkerPaths::for_dir(&root.join(WORKER_DIR_NAME));
    fs::create_dir_all(worker.interpreter.parent().unwrap()).unwrap();
    fs::write(&worker.interpreter, b"").unwrap();
    fs::write(&worker.entry_script, b"").unwrap();

    let paths = AppPaths::new(
        root.join("app").join("bin"),
        root.join("appdata").join("kktix"),
        root.join("cwd"),
    );
    let spawner = RecordingSpawner::default();
    let orchestrator =
        Orchestrator::with_spawner(paths, Arc::new(StateManager::new()), spawner.clone());

    assert!(matches!(
        orchestrator.load_on_startup(),
        StartupOutcome::Ready {
            warning: Some(_),
            ..
        }
    ));
    fill_valid(&orchestrator);

    let outcome = orchestrator.validate_and_launch().await;
    match &outcome {
        LaunchOutcome::SaveFailed(ConfigSaveError::AllLocationsFailed { attempts }) => {
            assert_eq!(attempts.len(), 2);
        }
        other => panic!("unexpected launch outcome {:?}", other),
    }
    assert!(outcome.user_message().starts_with("Could not save settings"));
    assert!(spawner.requests.lock().unwrap().is_empty());
    assert!(!orchestrator.state().read(|s| s.handed_off));
    assert!(!orchestrator.state().read(|s| s.is_saving));
}
