//! Bounded pool for detached background work.
//!
//! Spawned tasks are independent of the request that submitted them: they
//! keep running after the HTTP response is written or the client goes away.
//! Submissions are never dropped; once every worker slot is taken new tasks
//! wait for a permit and count towards the queue depth.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};

#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    permits: Arc<Semaphore>,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    queue_warn: usize,
    accepting: AtomicBool,
    idle: Notify,
}

impl TaskPool {
    pub fn new(name: &'static str, workers: usize, queue_warn: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                permits: Arc::new(Semaphore::new(workers.max(1))),
                queued: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                queue_warn,
                accepting: AtomicBool::new(true),
                idle: Notify::new(),
            }),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queued.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::Relaxed)
    }

    /// Healthy while accepting work and below the warning depth.
    pub fn is_ready(&self) -> bool {
        self.is_accepting() && self.queue_depth() < self.inner.queue_warn.max(1)
    }

    /// Marks the pool as draining; already submitted and new tasks still run.
    pub fn close(&self) {
        self.inner.accepting.store(false, Ordering::Relaxed);
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let depth = inner.queued.fetch_add(1, Ordering::AcqRel) + 1;
        crate::metrics::set_background_queue_depth(depth);
        if inner.queue_warn > 0 && depth == inner.queue_warn {
            tracing::warn!(
                pool = inner.name,
                queue_depth = depth,
                "task_pool.queue_depth_high"
            );
        }

        tokio::spawn(async move {
            let permit = Arc::clone(&inner.permits).acquire_owned().await;
            inner.in_flight.fetch_add(1, Ordering::AcqRel);
            let depth = inner.queued.fetch_sub(1, Ordering::AcqRel) - 1;
            crate::metrics::set_background_queue_depth(depth);

            match permit {
                Ok(_permit) => task.await,
                Err(_) => tracing::warn!(pool = inner.name, "task_pool.semaphore_closed"),
            }

            inner.in_flight.fetch_sub(1, Ordering::AcqRel);
            inner.idle.notify_waiters();
        });
    }

    /// Waits until nothing is queued or running. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.queue_depth() == 0 && self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}
