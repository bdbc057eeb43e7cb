//! The load state machine.
//!
//! Tracks whether the provider's data set can be served, and guarantees at
//! most one refresh is in flight. Every refresh attempt, whether started by
//! the engine or announced by the provider, carries an attempt id; only the
//! in-flight attempt can be settled, so late completions are harmless.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::provider::{ProviderEvent, RefreshKind};

/// Lifecycle phase of the loaded data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    /// Nothing loaded; the next request or timer tick starts a load.
    Unloaded,
    /// First static load in progress.
    Loading,
    Ready,
    /// A refresh is in flight over an already-loaded data set.
    Refreshing(RefreshKind),
}

impl LoadPhase {
    /// Whether requests may be served in this phase.
    ///
    /// A real-time refresh swaps the overlay atomically, so the previous
    /// overlay stays servable. A static reload does not.
    pub fn is_serving(&self) -> bool {
        matches!(
            self,
            LoadPhase::Ready | LoadPhase::Refreshing(RefreshKind::Realtime)
        )
    }
}

/// Point-in-time view of the machine, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadStatus {
    pub phase: LoadPhase,
    pub generation: u64,
    pub last_static_refresh: Option<DateTime<Utc>>,
    pub last_realtime_refresh: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempt {
    id: u64,
    kind: RefreshKind,
}

#[derive(Debug)]
struct Inner {
    phase: LoadPhase,
    in_flight: Option<Attempt>,
    next_attempt: u64,
    generation: u64,
    last_static_refresh: Option<DateTime<Utc>>,
    last_realtime_refresh: Option<DateTime<Utc>>,
    last_failure: Option<String>,
}

/// Owner of the process-wide load state.
#[derive(Debug)]
pub struct LoadStateMachine {
    inner: Mutex<Inner>,
    started_at: DateTime<Utc>,
}

impl Default for LoadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: LoadPhase::Unloaded,
                in_flight: None,
                next_attempt: 1,
                generation: 0,
                last_static_refresh: None,
                last_realtime_refresh: None,
                last_failure: None,
            }),
            started_at: Utc::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The state is updated in single assignments, so a poisoned lock
        // still holds a consistent value.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn phase(&self) -> LoadPhase {
        self.lock().phase
    }

    /// Incremented on every successful refresh.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> LoadStatus {
        let inner = self.lock();
        LoadStatus {
            phase: inner.phase,
            generation: inner.generation,
            last_static_refresh: inner.last_static_refresh,
            last_realtime_refresh: inner.last_realtime_refresh,
            last_failure: inner.last_failure.clone(),
        }
    }

    /// Open a refresh attempt of `kind`.
    ///
    /// Returns `None` when an attempt is already in flight, or when `kind`
    /// cannot start from the current phase (a real-time refresh needs a
    /// loaded data set).
    pub fn begin(self: &Arc<Self>, kind: RefreshKind) -> Option<RefreshGuard> {
        let id = self.open(kind)?;
        Some(RefreshGuard {
            machine: Arc::clone(self),
            id,
            kind,
            settled: false,
        })
    }

    /// Open an attempt announced by the provider. It is settled by
    /// [`LoadStateMachine::finish`]. No-op if an attempt is in flight.
    pub fn begin_external(&self, kind: RefreshKind) -> bool {
        self.open(kind).is_some()
    }

    fn open(&self, kind: RefreshKind) -> Option<u64> {
        let mut inner = self.lock();
        if let Some(current) = inner.in_flight {
            debug!(%kind, in_flight = %current.kind, "refresh already in flight");
            return None;
        }

        let next_phase = match (inner.phase, kind) {
            (LoadPhase::Unloaded, RefreshKind::Static) => LoadPhase::Loading,
            (LoadPhase::Ready, kind) => LoadPhase::Refreshing(kind),
            (phase, kind) => {
                debug!(?phase, %kind, "refresh cannot start from this phase");
                return None;
            }
        };

        let id = inner.next_attempt;
        inner.next_attempt += 1;
        inner.in_flight = Some(Attempt { id, kind });
        inner.phase = next_phase;
        info!(%kind, attempt = id, phase = ?next_phase, "refresh started");
        Some(id)
    }

    /// Settle the in-flight attempt of `kind`, if any.
    pub fn finish(&self, kind: RefreshKind, outcome: Result<(), String>) -> bool {
        let id = match self.lock().in_flight {
            Some(attempt) if attempt.kind == kind => attempt.id,
            _ => {
                debug!(%kind, "completion with no matching refresh in flight");
                return false;
            }
        };
        self.settle(id, outcome)
    }

    /// Translate a provider lifecycle event into a transition.
    pub fn on_event(&self, event: &ProviderEvent) {
        match event {
            ProviderEvent::Started(kind) => {
                self.begin_external(*kind);
            }
            ProviderEvent::Finished(kind) => {
                self.finish(*kind, Ok(()));
            }
            ProviderEvent::Failed(kind, message) => {
                self.finish(*kind, Err(message.clone()));
            }
        }
    }

    /// The one completion transition. Returns `false` if attempt `id` is no
    /// longer in flight.
    fn settle(&self, id: u64, outcome: Result<(), String>) -> bool {
        let mut inner = self.lock();
        let attempt = match inner.in_flight {
            Some(attempt) if attempt.id == id => attempt,
            _ => return false,
        };
        inner.in_flight = None;

        match outcome {
            Ok(()) => {
                let now = Utc::now();
                match attempt.kind {
                    RefreshKind::Static => inner.last_static_refresh = Some(now),
                    RefreshKind::Realtime => inner.last_realtime_refresh = Some(now),
                }
                inner.generation += 1;
                inner.phase = LoadPhase::Ready;
                inner.last_failure = None;
                info!(
                    kind = %attempt.kind,
                    attempt = id,
                    generation = inner.generation,
                    "refresh finished"
                );
            }
            Err(message) => {
                inner.phase = match inner.phase {
                    LoadPhase::Loading => LoadPhase::Unloaded,
                    _ => LoadPhase::Ready,
                };
                warn!(
                    kind = %attempt.kind,
                    attempt = id,
                    error = %message,
                    phase = ?inner.phase,
                    "refresh failed"
                );
                inner.last_failure = Some(message);
            }
        }
        true
    }
}

/// An open refresh attempt.
///
/// Dropping the guard without calling [`RefreshGuard::complete`] settles
/// the attempt as failed, so an abandoned refresh task cannot leave the
/// machine loading forever.
#[derive(Debug)]
pub struct RefreshGuard {
    machine: Arc<LoadStateMachine>,
    id: u64,
    kind: RefreshKind,
    settled: bool,
}

impl RefreshGuard {
    pub fn kind(&self) -> RefreshKind {
        self.kind
    }

    /// Settle this attempt. Ignored if it was already settled by a
    /// provider event.
    pub fn complete(mut self, outcome: Result<(), String>) -> bool {
        self.settled = true;
        self.machine.settle(self.id, outcome)
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.machine
                .settle(self.id, Err("refresh abandoned".to_string()));
        }
    }
}
