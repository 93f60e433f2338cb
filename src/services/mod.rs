//! Services module - Pure business logic for validating settings and handing off to the worker.
//!
//! Nothing here knows about the host window; the [`crate::orchestrator::Orchestrator`]
//! composes these pieces for whichever front end is running.
//!
//! # Components
//!
//! - [`validation`]: Field rules for [`ConfigModel`](crate::models::ConfigModel). One
//!   predicate set produces both the full pre-launch report and the inline annotations.
//! - [`launcher`]: Finds the `undetected-chromedriver` worker next to (or above) the
//!   install directory, checks its virtual environment, and spawns it detached.
//!
//! # Worker Integration
//!
//! The hand-off is one-way:
//! 1. Walk up from the install directory looking for `undetected-chromedriver/`
//! 2. Check `venv/Scripts/python.exe` (or `venv/bin/python`) and `main.py` exist
//! 3. Spawn `<interpreter> "<main.py>"` with the worker directory as cwd and
//!    `USER_CONFIG` pointing at the saved config
//! 4. The host exits; nothing waits for the child

pub mod launcher;
pub mod validation;

pub use launcher::{
    LaunchError, LaunchRequest, MissingWorkerError, ProcessSpawner, WorkerPaths, WorkerSpawner,
};
pub use validation::{FieldError, Rule, ValidationError, ValidationReport, validate};
