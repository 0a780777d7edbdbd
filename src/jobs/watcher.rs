//! Long-poll job watcher
//!
//! Repeatedly fetches a resource that a backend job is still producing.
//!
//! ```text
//! Idle --not ready--> Polling --ok--> Resolved
//!                        |
//!                        +--terminal failure--> Failed
//! Resolved/Failed --retry--> Polling
//! ```
//!
//! A watcher owns at most one poll task. The task is tied to a
//! [`CancellationToken`] so the owning view can stop it on teardown, and it is
//! cancelled when the watcher is dropped.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorClass, Result};
use crate::events::EventBus;

/// One watched resource
#[async_trait]
pub trait JobProbe<T>: Send + Sync + 'static {
    /// Short name used in logs ("transcript 12")
    fn name(&self) -> String;

    /// Try to fetch the finished resource. A not-found error means "not
    /// ready yet" unless its detail carries the failure keyword.
    async fn fetch(&self) -> Result<T>;

    /// Re-run the backend job after a failure
    async fn restart(&self) -> Result<()>;
}

/// Observable watcher state
#[derive(Debug, Clone, PartialEq)]
pub enum WatchState<T> {
    Idle,
    Polling,
    Resolved(T),
    /// Terminal backend failure with the server's detail message
    Failed(String),
}

impl<T> WatchState<T> {
    pub fn is_polling(&self) -> bool {
        matches!(self, WatchState::Polling)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            WatchState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            WatchState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Whether the poll loop should keep going after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Continue,
    Stop,
}

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared<T> {
    probe: Arc<dyn JobProbe<T>>,
    state_tx: watch::Sender<WatchState<T>>,
    failure_keyword: String,
    events: EventBus,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// Apply one fetch result to the state machine
    fn settle(&self, result: Result<T>) -> Next {
        match result {
            Ok(value) => {
                log::info!("{} is ready", self.probe.name());
                self.state_tx.send_replace(WatchState::Resolved(value));
                Next::Stop
            }
            Err(e) => match e.classify(&self.failure_keyword) {
                ErrorClass::NotReady => {
                    crate::hot_debug!("{} not ready: {}", self.probe.name(), e.detail());
                    self.state_tx.send_replace(WatchState::Polling);
                    Next::Continue
                }
                ErrorClass::Terminal => {
                    let message = e.detail();
                    log::warn!("{} failed: {}", self.probe.name(), message);
                    self.events.error(message.clone());
                    self.state_tx.send_replace(WatchState::Failed(message));
                    Next::Stop
                }
                ErrorClass::Unexpected => {
                    log::error!("Unexpected error while fetching {}: {}", self.probe.name(), e);
                    self.events.error(format!("Failed to load {}", self.probe.name()));
                    self.state_tx.send_if_modified(|state| {
                        if state.is_polling() {
                            *state = WatchState::Idle;
                            true
                        } else {
                            false
                        }
                    });
                    Next::Stop
                }
            },
        }
    }
}

pub struct JobWatcher<T> {
    shared: Arc<Shared<T>>,
    interval: Duration,
    /// Parent scope; cancelling it stops the poll task
    scope: CancellationToken,
    task: Mutex<Option<PollTask>>,
}

impl<T: Clone + Send + Sync + 'static> JobWatcher<T> {
    pub fn new(
        probe: Arc<dyn JobProbe<T>>,
        interval: Duration,
        failure_keyword: impl Into<String>,
        events: EventBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(WatchState::Idle);
        Self {
            shared: Arc::new(Shared {
                probe,
                state_tx,
                failure_keyword: failure_keyword.into(),
                events,
            }),
            interval,
            scope: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Tie the poll task to an owning scope
    pub fn with_scope(mut self, scope: &CancellationToken) -> Self {
        self.scope = scope.child_token();
        self
    }

    pub fn state(&self) -> WatchState<T> {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchState<T>> {
        self.shared.state_tx.subscribe()
    }

    /// True while a poll task is alive
    pub fn is_polling(&self) -> bool {
        match self.task.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|t| !t.handle.is_finished()),
            Err(_) => false,
        }
    }

    /// Fetch once now and start polling if the resource is not ready.
    /// A no-op while a poll task is already running.
    pub async fn check(&self) -> WatchState<T> {
        if self.is_polling() {
            return self.state();
        }
        let result = self.shared.probe.fetch().await;
        if self.shared.settle(result) == Next::Continue {
            self.start_polling();
        }
        self.state()
    }

    /// Re-run the backend job, drop any stale result or failure and poll again
    pub async fn retry(&self) -> Result<()> {
        self.stop();
        if let Err(e) = self.shared.probe.restart().await {
            log::error!("Failed to restart {}: {}", self.shared.probe.name(), e);
            self.shared
                .events
                .error(format!("Retry failed: {}", e.detail()));
            return Err(e);
        }
        log::info!("Restarted {}", self.shared.probe.name());
        self.shared.state_tx.send_replace(WatchState::Polling);
        self.start_polling();
        Ok(())
    }

    /// Cancel the poll task, keeping the last state
    pub fn stop(&self) {
        let Ok(mut guard) = self.task.lock() else {
            return;
        };
        if let Some(task) = guard.take() {
            task.token.cancel();
            task.handle.abort();
        }
    }

    /// Spawn the interval loop unless one is already alive
    fn start_polling(&self) {
        let Ok(mut guard) = self.task.lock() else {
            return;
        };
        if guard.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let token = self.scope.child_token();
        let shared = self.shared.clone();
        let interval = self.interval;
        let loop_token = token.clone();

        log::debug!("Polling {} every {:?}", shared.probe.name(), interval);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let result = tokio::select! {
                    _ = loop_token.cancelled() => break,
                    result = shared.probe.fetch() => result,
                };
                if shared.settle(result) == Next::Stop {
                    break;
                }
            }
        });

        *guard = Some(PollTask { token, handle });
    }
}

impl<T> Drop for JobWatcher<T> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(task) = guard.take() {
                task.token.cancel();
                task.handle.abort();
            }
        }
    }
}
