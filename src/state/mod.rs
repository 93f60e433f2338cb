// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for whichever front end is attached.

use crate::models::sale_time::{self, SaleTimeError};
use crate::models::{AppState, ConfigModel, ConfigOrigin, Field};
use crate::services::validation::{self, ValidationError, ValidationReport};
use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events let the front end refresh without polling.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A config was installed at startup
    ConfigLoaded { origin: ConfigOrigin },

    /// One or more settings were edited
    FieldsEdited { fields: Vec<Field> },

    /// The inline validation verdict flipped
    LaunchReadinessChanged { can_launch: bool },

    /// A save began
    SaveStarted,

    /// A save ended, successfully or not
    SaveFinished,

    /// A save succeeded at `path`
    Saved { path: Utf8PathBuf },

    /// The worker was started; the session is now read-only
    HandedOff,
}

/// Thread-safe owner of the process-wide [`AppState`]
///
/// This is the only holder of the configuration singleton. It:
/// - Provides thread-safe access via `Arc<RwLock<T>>`
/// - Re-runs the inline validation after every mutation. `can_launch` is only as fresh as
///   the last mutation; time-dependent rules (the sale time passing) need
///   [`crate::orchestrator::Orchestrator::inline_check`]
/// - Detects state changes and emits [`StateChange`] events over a tokio broadcast channel
///
/// # Related Types
///
/// - [`crate::models::AppState`]: The underlying state structure
/// - [`crate::orchestrator::Orchestrator`]: Drives load, save and launch against this state
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, AppState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, AppState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.read_lock().clone()
    }

    /// Get a clone of the current config
    pub fn config(&self) -> ConfigModel {
        self.read(|state| state.config.clone())
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let can_launch = state_manager.read(|state| state.can_launch);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.read_lock();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Re-runs the inline validation against the current instant (not again until the next update)
    /// 4. Detects what changed and emits the matching events
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.write_lock();
        let old_state = state.clone();

        update_fn(&mut state);
        state.can_launch = validation::validate(&state.config, Utc::now()).can_launch();

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.origin != new.origin {
            changes.push(StateChange::ConfigLoaded {
                origin: new.origin.clone(),
            });
        }

        let fields = new.config.changed_fields(&old.config);
        if !fields.is_empty() {
            changes.push(StateChange::FieldsEdited { fields });
        }

        if old.can_launch != new.can_launch {
            changes.push(StateChange::LaunchReadinessChanged {
                can_launch: new.can_launch,
            });
        }

        if old.is_saving != new.is_saving {
            changes.push(if new.is_saving {
                StateChange::SaveStarted
            } else {
                StateChange::SaveFinished
            });
        }

        if old.last_saved_path != new.last_saved_path {
            if let Some(path) = &new.last_saved_path {
                changes.push(StateChange::Saved { path: path.clone() });
            }
        }

        if !old.handed_off && new.handed_off {
            changes.push(StateChange::HandedOff);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Install the config produced at startup
    pub fn load_config(&self, config: ConfigModel, origin: ConfigOrigin) -> Vec<StateChange> {
        self.update(|state| {
            state.config = config;
            state.origin = origin;
        })
    }

    /// Edit the config in place. Ignored once the worker has been launched.
    pub fn edit_config<F>(&self, edit_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ConfigModel),
    {
        // Checked under the same write lock as the edit so a concurrent
        // hand-off cannot slip in between
        self.update(|state| {
            if state.is_editable() {
                edit_fn(&mut state.config);
            } else {
                tracing::warn!("Ignoring config edit after hand-off");
            }
        })
    }

    pub fn set_sale_time(&self, sale_time: DateTime<FixedOffset>) -> Vec<StateChange> {
        self.edit_config(|config| config.sale_time = sale_time)
    }

    /// Change the sale date, keeping time-of-day and offset
    pub fn set_sale_date(&self, date: NaiveDate) -> Result<Vec<StateChange>, SaleTimeError> {
        let updated = sale_time::with_date(self.read(|s| s.config.sale_time), date)?;
        Ok(self.set_sale_time(updated))
    }

    /// Change the sale time-of-day from a 12-hour clock reading, keeping date and offset
    pub fn set_sale_clock_12h(
        &self,
        hour12: u32,
        minute: u32,
        second: u32,
        is_am: bool,
    ) -> Result<Vec<StateChange>, SaleTimeError> {
        let updated = sale_time::with_clock_12h(
            self.read(|s| s.config.sale_time),
            hour12,
            minute,
            second,
            is_am,
        )?;
        Ok(self.set_sale_time(updated))
    }

    /// Validate the current config at `now` without changing anything
    pub fn inline_report(&self, now: DateTime<Utc>) -> ValidationReport {
        self.read(|state| validation::validate(&state.config, now))
    }

    /// Mark a save as in flight and return the config to write.
    ///
    /// Returns `None` after the hand-off.
    pub fn begin_save(&self) -> Option<ConfigModel> {
        let mut snapshot = None;
        self.update(|state| {
            if state.is_editable() {
                state.is_saving = true;
                snapshot = Some(state.config.clone());
            }
        });
        snapshot
    }

    /// Like [`StateManager::begin_save`], but only if the config passes validation at `now`.
    ///
    /// Validation and the snapshot happen under one write lock, so the returned
    /// config is exactly the one that was checked. Returns `None` after the hand-off.
    pub fn begin_validated_save(
        &self,
        now: DateTime<Utc>,
    ) -> Option<Result<ConfigModel, ValidationError>> {
        let mut outcome = None;
        self.update(|state| {
            if !state.is_editable() {
                return;
            }
            outcome = Some(
                validation::validate(&state.config, now)
                    .into_result()
                    .map(|()| {
                        state.is_saving = true;
                        state.config.clone()
                    }),
            );
        });
        outcome
    }

    /// Clear the in-flight flag, recording the path on success
    pub fn finish_save(&self, saved_to: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.is_saving = false;
            if let Some(path) = saved_to {
                state.last_saved_path = Some(path);
            }
        })
    }

    pub fn mark_handed_off(&self) -> Vec<StateChange> {
        self.update(|state| state.handed_off = true)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
