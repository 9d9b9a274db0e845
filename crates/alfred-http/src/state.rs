//! Shared server state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alfred_core::{Config, MockRegistry, ScriptCollection, VmPool};
use alfred_observability::MetricsRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mocks: MockRegistry,
    pub scripts: Arc<ScriptCollection>,
    pub pool: Arc<VmPool>,
    pub client: reqwest::Client,
    pub metrics: Option<Arc<MetricsRegistry>>,
    pub actions: Arc<ActionTracker>,
    /// Additive delay applied to every served mock, in milliseconds.
    /// Reads are relaxed and writes are last-writer-wins: this is a
    /// testing knob, not a synchronisation point.
    global_delay_ms: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        mocks: MockRegistry,
        scripts: Arc<ScriptCollection>,
        pool: Arc<VmPool>,
    ) -> Self {
        Self {
            config,
            mocks,
            scripts,
            pool,
            client: reqwest::Client::new(),
            metrics: None,
            actions: Arc::new(ActionTracker::default()),
            global_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn bodies_dir(&self) -> Option<PathBuf> {
        let dir = &self.config.alfred.core.body_files_dir;
        if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        }
    }

    pub fn global_delay(&self) -> Duration {
        Duration::from_millis(self.global_delay_ms.load(Ordering::Relaxed))
    }

    pub fn set_global_delay(&self, delay_ms: u64) {
        self.global_delay_ms.store(delay_ms, Ordering::Relaxed);
    }
}

/// Count of outbound action tasks still running, so shutdown can wait for
/// them (timeboxed) after the listener has drained.
#[derive(Debug, Default)]
pub struct ActionTracker {
    count: AtomicUsize,
    notify: tokio::sync::Notify,
}

impl ActionTracker {
    pub fn guard(self: &Arc<Self>) -> ActionGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ActionGuard(Arc::clone(self))
    }

    pub fn in_flight(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until no action task is running, up to the deadline. Returns
    /// false when the deadline was reached first.
    pub async fn wait_idle(&self, deadline: Duration) -> bool {
        tokio::time::timeout(deadline, async {
            loop {
                let notified = self.notify.notified();
                if self.count.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

pub struct ActionGuard(Arc<ActionTracker>);

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.0.count.fetch_sub(1, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }
}
