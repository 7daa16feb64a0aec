//! Asynchronous task engine.
//!
//! One long-lived worker thread hosts a current-thread tokio runtime so
//! I/O-bound tasks overlap without extra OS threads. Tasks arrive on a
//! bounded in-queue; results leave on an unbounded out-queue the UI drains
//! once per loop iteration. The UI never reads worker state directly.
//!
//! Shutdown: `Shutdown` (or dropping the sender) makes the worker abort
//! outstanding tasks, drain them, and exit; the owner joins the thread
//! with a bounded timeout and detaches it if the join window expires.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use core_events::{TaskRequest, TaskResult};
use crossbeam_channel::{Receiver, TryRecvError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Capacity of the in-queue; submissions beyond it are rejected rather
/// than blocking the UI thread.
pub const TASK_QUEUE_CAP: usize = 64;

/// Bound on joining the worker at exit.
pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Executes one task inside the worker's runtime. Implementations apply
/// their own per-operation timeouts and never panic into the UI thread;
/// failures come back as `TaskResult::TaskError`.
pub trait TaskExecutor: Send + Sync + 'static {
    fn execute(
        self: Arc<Self>,
        request: TaskRequest,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>;
}

pub struct AsyncEngine {
    tx: tokio::sync::mpsc::Sender<TaskRequest>,
    results: Receiver<TaskResult>,
    worker: Option<thread::JoinHandle<()>>,
}

impl AsyncEngine {
    /// Start the worker thread. Called once at editor start.
    pub fn start(executor: Arc<dyn TaskExecutor>) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<TaskRequest>(TASK_QUEUE_CAP);
        let (out_tx, out_rx) = crossbeam_channel::unbounded::<TaskResult>();

        let worker = thread::Builder::new()
            .name("quill-tasks".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        warn!(target: "tasks", %err, "runtime_build_failed");
                        return;
                    }
                };
                runtime.block_on(async move {
                    let mut inflight: JoinSet<()> = JoinSet::new();
                    loop {
                        tokio::select! {
                            received = rx.recv() => match received {
                                None | Some(TaskRequest::Shutdown) => break,
                                Some(request) => {
                                    let executor = Arc::clone(&executor);
                                    let out = out_tx.clone();
                                    debug!(target: "tasks", "task_accepted");
                                    inflight.spawn(async move {
                                        let result = executor.execute(request).await;
                                        let _ = out.send(result);
                                    });
                                }
                            },
                            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
                        }
                    }
                    // Cancel whatever is still running and drain it.
                    inflight.shutdown().await;
                    info!(target: "tasks", "worker_exit");
                });
            })
            .expect("spawn task worker thread");

        Self {
            tx,
            results: out_rx,
            worker: Some(worker),
        }
    }

    /// Submit a task without blocking; returns false when the queue is
    /// full or the worker is gone.
    pub fn submit(&self, request: TaskRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "tasks", %err, "task_submit_failed");
                false
            }
        }
    }

    /// Drain everything currently queued, FIFO.
    pub fn drain_results(&self) -> Vec<TaskResult> {
        let mut out = Vec::new();
        loop {
            match self.results.try_recv() {
                Ok(result) => out.push(result),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Stop the worker: send `Shutdown`, join with a bounded timeout, and
    /// detach if the worker does not come down in time (the closed channel
    /// stops its loop externally).
    pub fn shutdown(&mut self) {
        let _ = self.tx.try_send(TaskRequest::Shutdown);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + SHUTDOWN_JOIN_TIMEOUT;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if worker.is_finished() {
            let _ = worker.join();
            info!(target: "tasks", "worker_joined");
        } else {
            warn!(target: "tasks", "worker_join_timeout_detached");
        }
    }
}

impl Drop for AsyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
