//! Dispatcher - background scan loop that delivers due tasks over HTTP.
//!
//! One loop per dispatcher: every scan extracts all due tasks from the store
//! and spawns an independent execution per task, so a slow endpoint never
//! holds up its siblings. Each execution either records success, puts the
//! task back with a later due time, or records failure once retries run out.
//!
//! `start()` builds a fresh HTTP sink from the factory and hands it to the
//! loop. `stop()` ends the loop, waits for it and drops the loop's sink.
//! Executions already spawned are not awaited: a task in flight at shutdown
//! keeps its clone of the sink until it finishes, or is lost with the process
//! (at-least-once only holds while the dispatcher runs).

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::builder::DispatcherBuilder;
use super::decider::{AttemptReport, Decider, Decision};
use super::executor::{ExecutorFactory, TaskExecutor};
use super::status::DispatcherStatus;
use crate::config::DispatcherConfig;
use crate::domain::{
    ExecutionHistoryEntry, ExecutionStatus, SubmitAck, TaskSubmission, TaskSummary, truncate_body,
};
use crate::error::{CourierError, Result};
use crate::ports::{Clock, IdGenerator, SinkFactory};
use crate::queue::{ExecutionHistoryLog, TaskQueueStore, TaskRecord};

/// Response bodies kept in history are cut to this many characters.
pub const HISTORY_BODY_LIMIT: usize = 500;

struct LoopHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    executor: Arc<TaskExecutor>,
}

pub(crate) struct DispatcherInner {
    config: DispatcherConfig,
    store: Arc<dyn TaskQueueStore>,
    history: Arc<ExecutionHistoryLog>,
    executors: ExecutorFactory,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
    worker: Mutex<Option<LoopHandle>>,
}

impl Dispatcher {
    pub fn builder(sinks: SinkFactory) -> DispatcherBuilder {
        DispatcherBuilder::new(sinks)
    }

    pub(crate) fn assemble(
        config: DispatcherConfig,
        store: Arc<dyn TaskQueueStore>,
        history: Arc<ExecutionHistoryLog>,
        executors: ExecutorFactory,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                config,
                store,
                history,
                executors,
                decider,
                clock,
                ids,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Create the HTTP sink and spawn the scan loop. Returns `Ok(false)` (and
    /// does nothing) if it is already running.
    pub async fn start(&self) -> Result<bool> {
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.as_ref()
            && !handle.join.is_finished()
        {
            debug!("dispatcher already running");
            return Ok(false);
        }

        let executor = self.inner.executors.build()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let loop_executor = Arc::clone(&executor);
        let join = tokio::spawn(async move {
            scan_loop(inner, loop_executor, shutdown_rx).await;
        });
        *worker = Some(LoopHandle {
            shutdown_tx,
            join,
            executor,
        });
        info!(
            poll_interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "dispatcher started"
        );
        Ok(true)
    }

    /// Signal the loop to stop, wait for it to exit and release its HTTP
    /// sink. Returns `false` if it was not running. In-flight executions are
    /// not awaited.
    pub async fn stop(&self) -> bool {
        let Some(handle) = self.worker.lock().await.take() else {
            return false;
        };
        // ignore send error: the loop may already have exited
        let _ = handle.shutdown_tx.send(true);
        if let Err(e) = handle.join.await {
            error!(error = %e, "dispatcher loop panicked");
        }
        drop(handle.executor);
        info!("dispatcher stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.join.is_finished())
    }

    /// Accept a task for later delivery.
    pub async fn submit(&self, submission: TaskSubmission) -> Result<SubmitAck> {
        if submission.url.trim().is_empty() {
            return Err(CourierError::configuration("task url cannot be empty"));
        }
        let now = self.inner.clock.now();
        let name = match submission.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.inner.ids.task_name(),
        };
        let record = TaskRecord::from_submission(submission, name, now)?;
        let ack = SubmitAck {
            name: record.name.clone(),
            schedule_time: record.schedule_time,
        };
        debug!(task = %ack.name, schedule_time = %ack.schedule_time, "task submitted");
        self.inner.store.enqueue(record).await?;
        Ok(ack)
    }

    /// Pending tasks, earliest due first.
    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        self.inner.store.snapshot().await
    }

    pub async fn status(&self) -> Result<DispatcherStatus> {
        Ok(DispatcherStatus {
            running: self.is_running().await,
            queue_size: self.inner.store.size().await?,
            completed_count: self.inner.history.total_recorded().await,
            recent_history: self
                .inner
                .history
                .recent(self.inner.config.status_history_limit)
                .await,
        })
    }

    pub fn history(&self) -> Arc<ExecutionHistoryLog> {
        Arc::clone(&self.inner.history)
    }

    /// Run a single scan outside the loop and wait for every execution it
    /// starts. Returns the number of tasks executed.
    /// Uses the running loop's sink, or a temporary one when stopped.
    pub async fn run_once(&self) -> Result<usize> {
        let running = self
            .worker
            .lock()
            .await
            .as_ref()
            .filter(|h| !h.join.is_finished())
            .map(|h| Arc::clone(&h.executor));
        let executor = match running {
            Some(executor) => executor,
            None => self.inner.executors.build()?,
        };

        let due = self.inner.store.extract_due(self.inner.clock.now()).await?;
        let count = due.len();
        let mut set = tokio::task::JoinSet::new();
        for task in due {
            let inner = Arc::clone(&self.inner);
            let executor = Arc::clone(&executor);
            set.spawn(async move { inner.execute(&executor, task).await });
        }
        while set.join_next().await.is_some() {}
        Ok(count)
    }
}

async fn scan_loop(
    inner: Arc<DispatcherInner>,
    executor: Arc<TaskExecutor>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let pause = match inner.scan(&executor).await {
            Ok(_) => inner.config.poll_interval,
            Err(e) => {
                error!(error = %e, "scan failed; backing off");
                inner.config.error_interval
            }
        };

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped: the dispatcher is gone
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
    debug!("scan loop exited");
}

impl DispatcherInner {
    /// Extract due tasks and spawn one fire-and-forget execution each.
    async fn scan(self: &Arc<Self>, executor: &Arc<TaskExecutor>) -> Result<usize> {
        let due = self.store.extract_due(self.clock.now()).await?;
        let count = due.len();
        if count > 0 {
            debug!(count, "dispatching due tasks");
        }
        for task in due {
            let inner = Arc::clone(self);
            let executor = Arc::clone(executor);
            tokio::spawn(async move {
                inner.execute(&executor, task).await;
            });
        }
        Ok(count)
    }

    async fn execute(&self, executor: &TaskExecutor, mut task: TaskRecord) {
        task.start_attempt(self.clock.now());
        let report = executor.execute(&task).await;
        let decision = self.decider.decide(&task, &report, self.clock.now());

        match decision {
            Decision::Complete => {
                info!(
                    task = %task.name,
                    attempt = task.attempt_count,
                    status = report.status_code,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "task delivered"
                );
                self.record(&task, &report, ExecutionStatus::Success).await;
            }
            Decision::Retry { at, reason, .. } => {
                warn!(
                    task = %task.name,
                    attempt = task.attempt_count,
                    status = report.status_code,
                    error = report.error.as_deref().unwrap_or(""),
                    retry_at = %at,
                    "{reason}"
                );
                task.schedule_retry(at);
                let name = task.name.clone();
                if let Err(e) = self.store.enqueue(task).await {
                    error!(task = %name, error = %e, "failed to reschedule task; task dropped");
                }
            }
            Decision::GiveUp { reason } => {
                warn!(
                    task = %task.name,
                    attempt = task.attempt_count,
                    status = report.status_code,
                    "{reason}"
                );
                self.record(&task, &report, ExecutionStatus::Failed).await;
            }
        }
    }

    async fn record(&self, task: &TaskRecord, report: &AttemptReport, status: ExecutionStatus) {
        self.history
            .record(ExecutionHistoryEntry {
                task_name: task.name.clone(),
                url: task.target.url.clone(),
                status,
                status_code: report.status_code,
                elapsed_ms: report.elapsed.as_millis() as u64,
                attempt_count: task.attempt_count,
                recorded_at: self.clock.now(),
                response_body: truncate_body(&report.body, HISTORY_BODY_LIMIT),
                error: report.error.clone(),
            })
            .await;
    }
}
