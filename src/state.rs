// View-scoped task state
//
// TaskScope tracks the background work a view spawned (poll loops, stream
// readers) so it can all be cancelled on teardown. BusyFlag guards
// operations that must not overlap (one chat turn, one generation run).

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// Handle of one spawn, tagged so a replaced task cannot unregister its successor
struct ScopedTask {
    generation: u64,
    handle: JoinHandle<()>,
}

type TaskTable = DashMap<String, ScopedTask>;

/// Named background tasks owned by one view
pub struct TaskScope {
    token: CancellationToken,
    tasks: Arc<TaskTable>,
    next_generation: AtomicU64,
}

impl TaskScope {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Token cancelled when the scope closes
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn `future` under `name`. It is dropped at its next await point
    /// once the scope closes. A task already running under the same name is
    /// aborted and replaced.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return;
        }
        let name = name.into();
        let token = self.token.child_token();
        let tasks = self.tasks.clone();
        let key = name.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("Task '{}' cancelled", key);
                }
                _ = future => {}
            }
            release(&tasks, &key, generation);
        });

        if let Some(previous) = self.tasks.insert(name, ScopedTask { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Whether a task with this name is still running
    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .get(name)
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.handle.is_finished()).count()
    }

    /// Cancel every task. Idempotent.
    pub fn close(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        let names: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, task)) = self.tasks.remove(&name) {
                task.handle.abort();
            }
        }
    }
}

/// Drop the entry for `name` only if it still belongs to `generation`
fn release(tasks: &TaskTable, name: &str, generation: u64) {
    tasks.remove_if(name, |_, task| task.generation == generation);
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Observable in-progress flag
#[derive(Debug, Clone)]
pub struct BusyFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl BusyFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_busy(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Set the flag, or fail with [`ClientError::Busy`] if it is already set.
    /// The flag clears when the guard drops, on every exit path.
    pub fn acquire(&self) -> Result<BusyGuard> {
        let acquired = self.tx.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if acquired {
            Ok(BusyGuard { tx: self.tx.clone() })
        } else {
            Err(ClientError::Busy)
        }
    }
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct BusyGuard {
    tx: Arc<watch::Sender<bool>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tx.send_replace(false);
    }
}
