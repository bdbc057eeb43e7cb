//! Spawning of refreshes and the periodic refresh timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::provider::{DataProvider, ProviderEvent, RefreshKind};

use super::machine::{LoadPhase, LoadStateMachine, RefreshGuard};

/// Result of a manual reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Started(RefreshKind),
    AlreadyInProgress,
}

/// Runs provider refreshes on behalf of the load state machine.
pub struct RefreshDriver {
    machine: Arc<LoadStateMachine>,
    provider: Arc<dyn DataProvider>,
    realtime_interval: Duration,
    static_interval: Duration,
    timer_started: AtomicBool,
}

impl RefreshDriver {
    /// Create a driver and subscribe the machine to the provider's events.
    pub fn new(
        machine: Arc<LoadStateMachine>,
        provider: Arc<dyn DataProvider>,
        realtime_interval: Duration,
        static_interval: Duration,
    ) -> Self {
        let driver = Self {
            machine,
            provider,
            realtime_interval,
            static_interval,
            timer_started: AtomicBool::new(false),
        };
        driver.listen();
        driver
    }

    fn listen(&self) {
        let machine = Arc::clone(&self.machine);
        self.provider
            .subscribe(Arc::new(move |event: &ProviderEvent| machine.on_event(event)));
    }

    pub fn machine(&self) -> &Arc<LoadStateMachine> {
        &self.machine
    }

    /// Start a refresh of `kind` in the background.
    ///
    /// Returns `false` if nothing was started: a refresh is already in
    /// flight, `kind` cannot start from the current phase, or there is no
    /// runtime to spawn on.
    pub fn request(&self, kind: RefreshKind) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!(%kind, "no async runtime, refresh not started");
            return false;
        };
        let Some(guard) = self.machine.begin(kind) else {
            return false;
        };
        let provider = Arc::clone(&self.provider);
        handle.spawn(run_attempt(guard, provider));
        true
    }

    /// Run a refresh of `kind` to completion.
    ///
    /// Returns `true` only if the refresh ran and succeeded.
    pub async fn refresh(&self, kind: RefreshKind) -> bool {
        match self.machine.begin(kind) {
            Some(guard) => run_attempt(guard, Arc::clone(&self.provider)).await,
            None => false,
        }
    }

    /// Start the periodic refresh timer. Only the first call starts it.
    ///
    /// Each tick refreshes the real-time overlay when ready, reloads the
    /// static schedule once `static_interval` has passed since the last
    /// static load, and retries the load when unloaded.
    pub fn start_timer(&self) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime, refresh timer not started");
            return false;
        };
        if self
            .timer_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh timer already running");
            return false;
        }

        let machine = Arc::clone(&self.machine);
        let provider = Arc::clone(&self.provider);
        let realtime_interval = self.realtime_interval.max(Duration::from_secs(1));
        let static_interval =
            TimeDelta::from_std(self.static_interval).unwrap_or(TimeDelta::MAX);

        handle.spawn(async move {
            let mut interval = tokio::time::interval(realtime_interval);
            interval.tick().await; // First tick is immediate, skip it
            loop {
                interval.tick().await;
                let status = machine.status();
                let kind = match status.phase {
                    LoadPhase::Unloaded => RefreshKind::Static,
                    LoadPhase::Ready => {
                        let static_due = status
                            .last_static_refresh
                            .is_none_or(|at| Utc::now() - at >= static_interval);
                        if static_due {
                            RefreshKind::Static
                        } else {
                            RefreshKind::Realtime
                        }
                    }
                    LoadPhase::Loading | LoadPhase::Refreshing(_) => continue,
                };
                if let Some(guard) = machine.begin(kind) {
                    run_attempt(guard, Arc::clone(&provider)).await;
                }
            }
        });
        info!(interval = ?self.realtime_interval, "refresh timer started");
        true
    }

    /// Manual reload: a real-time refresh when ready, a static load when
    /// nothing is loaded.
    pub fn reload(&self) -> ReloadOutcome {
        let kind = match self.machine.phase() {
            LoadPhase::Ready => RefreshKind::Realtime,
            LoadPhase::Unloaded => RefreshKind::Static,
            LoadPhase::Loading | LoadPhase::Refreshing(_) => {
                return ReloadOutcome::AlreadyInProgress;
            }
        };
        if self.request(kind) {
            ReloadOutcome::Started(kind)
        } else {
            ReloadOutcome::AlreadyInProgress
        }
    }

    /// Whether clients should keep polling for the data to load.
    pub fn loading_status(&self) -> bool {
        !self.machine.phase().is_serving()
    }

    /// Fail fast unless requests can be served.
    ///
    /// A request arriving with nothing loaded also kicks off a load.
    pub fn ensure_ready(&self) -> Result<(), CoreError> {
        match self.machine.phase() {
            phase if phase.is_serving() => Ok(()),
            LoadPhase::Unloaded => {
                if self.request(RefreshKind::Static) {
                    info!("request arrived with no data loaded, loading");
                }
                Err(CoreError::NotReady)
            }
            _ => Err(CoreError::NotReady),
        }
    }
}

async fn run_attempt(guard: RefreshGuard, provider: Arc<dyn DataProvider>) -> bool {
    let result = match guard.kind() {
        RefreshKind::Static => provider.load_static().await,
        RefreshKind::Realtime => provider.refresh_realtime().await,
    };
    let ok = result.is_ok();
    guard.complete(result.map_err(|e| e.to_string()));
    ok
}
