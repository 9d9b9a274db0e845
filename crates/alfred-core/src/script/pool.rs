//! Pool of JavaScript VMs.
//!
//! The idle queue is a bounded channel of capacity `max_size`; `current`
//! counts every live VM, checked out or idle, and is guarded by the pool
//! mutex. A periodic task shrinks the idle queue back towards `min_size`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::vm::ScriptVm;
use crate::{Error, Result};

pub const DEFAULT_MIN_SIZE: usize = 1;
pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct VmPoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub cleanup_period: Duration,
}

impl Default for VmPoolConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
        }
    }
}

pub struct VmPool {
    idle_tx: mpsc::Sender<ScriptVm>,
    idle_rx: tokio::sync::Mutex<mpsc::Receiver<ScriptVm>>,
    current: parking_lot::Mutex<usize>,
    min_size: usize,
    max_size: usize,
    shutdown_tx: watch::Sender<bool>,
}

impl VmPool {
    /// Create the pool, pre-populate it with `min_size` VMs and start the
    /// cleanup task.
    pub fn new(config: VmPoolConfig) -> Result<Arc<Self>> {
        let capacity = config.max_size.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        for _ in 0..config.min_size {
            let vm = ScriptVm::new()?;
            idle_tx
                .try_send(vm)
                .map_err(|_| Error::script("pool", "failed to seed the vm pool"))?;
        }

        let pool = Arc::new(Self {
            idle_tx,
            idle_rx: tokio::sync::Mutex::new(idle_rx),
            current: parking_lot::Mutex::new(config.min_size),
            min_size: config.min_size,
            max_size: capacity,
            shutdown_tx,
        });

        tokio::spawn(run_cleanup(
            Arc::clone(&pool),
            config.cleanup_period,
            shutdown_rx,
        ));

        Ok(pool)
    }

    /// Get a VM: an idle one if available, a fresh one while below
    /// `max_size`, otherwise wait for a release.
    pub async fn acquire(&self) -> Result<ScriptVm> {
        {
            let mut idle = self.idle_rx.lock().await;
            if let Ok(vm) = idle.try_recv() {
                return Ok(vm);
            }
        }

        {
            let mut current = self.current.lock();
            if *current < self.max_size {
                *current += 1;
                drop(current);
                return match ScriptVm::new() {
                    Ok(vm) => Ok(vm),
                    Err(e) => {
                        *self.current.lock() -= 1;
                        Err(e)
                    }
                };
            }
        }

        let mut idle = self.idle_rx.lock().await;
        idle.recv()
            .await
            .ok_or_else(|| Error::script("pool", "vm pool is shut down"))
    }

    /// Return a VM to the idle queue, or discard it when the queue is
    /// already at capacity.
    pub fn release(&self, vm: ScriptVm) {
        if self.idle_tx.try_send(vm).is_err() {
            *self.current.lock() -= 1;
        }
    }

    /// Live VM count, checked out or idle.
    pub fn current(&self) -> usize {
        *self.current.lock()
    }

    /// Drop up to `current - min_size` idle VMs. VMs checked out by
    /// callers are not affected.
    pub async fn shrink_idle(&self) {
        let excess = self.current.lock().saturating_sub(self.min_size);
        if excess == 0 {
            return;
        }
        let mut idle = self.idle_rx.lock().await;
        for _ in 0..excess {
            match idle.try_recv() {
                Ok(vm) => {
                    drop(vm);
                    *self.current.lock() -= 1;
                }
                Err(_) => break,
            }
        }
    }

    /// Stop the cleanup task, drain the idle queue and zero the counter.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut idle = self.idle_rx.lock().await;
        while idle.try_recv().is_ok() {}
        *self.current.lock() = 0;
    }
}

async fn run_cleanup(
    pool: Arc<VmPool>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(period) => pool.shrink_idle().await,
            _ = shutdown_rx.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(min: usize, max: usize) -> VmPoolConfig {
        VmPoolConfig {
            min_size: min,
            max_size: max,
            cleanup_period: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn starts_at_min_size() {
        let pool = VmPool::new(test_config(2, 10)).unwrap();
        assert_eq!(pool.current(), 2);
    }

    #[tokio::test]
    async fn grows_on_demand_up_to_max() {
        let pool = VmPool::new(test_config(1, 3)).unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        assert_eq!(pool.current(), 3);

        // A fourth acquire has to wait for a release.
        let acquire = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(acquire.is_err());

        pool.release(a);
        let d = tokio::time::timeout(Duration::from_millis(500), pool.acquire())
            .await
            .expect("acquire should resume after a release")
            .unwrap();
        assert_eq!(pool.current(), 3);

        pool.release(b);
        pool.release(c);
        pool.release(d);
    }

    #[tokio::test]
    async fn release_discards_when_idle_queue_is_full() {
        let pool = VmPool::new(test_config(1, 1)).unwrap();
        let extra = ScriptVm::new().unwrap();
        // Queue capacity is max_size and already holds the seeded VM.
        pool.release(extra);
        assert_eq!(pool.current(), 0);
    }

    #[tokio::test]
    async fn shrink_drains_down_to_min_size() {
        let pool = VmPool::new(test_config(1, 10)).unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        pool.release(a);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.current(), 3);

        pool.shrink_idle().await;
        assert_eq!(pool.current(), 1);
    }

    #[tokio::test]
    async fn shutdown_zeroes_the_pool() {
        let pool = VmPool::new(test_config(2, 10)).unwrap();
        pool.shutdown().await;
        assert_eq!(pool.current(), 0);
    }
}
