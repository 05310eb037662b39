//! Lifecycle management for asynchronous user-initiated jobs (spec.md §4.10): bounded
//! parallelism via a semaphore, a push channel of status/progress events per task, and
//! TTL+LRU eviction of terminal entries.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::Instant;
use tracing::warn;
use vertex_core::{Clock, ErrorKind, TaskId, UnixSeconds, VertexError};

/// Default concurrent-task capacity (spec.md §4.10).
pub const DEFAULT_CONCURRENCY: usize = 3;
/// Default time a completed/failed/cancelled task stays readable before the sweep evicts it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// Default bound on how many terminal entries the manager retains at once.
pub const DEFAULT_LRU_CAPACITY: usize = 100;
/// Default interval between TTL sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Backtest,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: f64,
    pub created_at: UnixSeconds,
    pub completed_at: Option<UnixSeconds>,
    pub error: Option<String>,
    #[serde(rename = "results", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// A push event fanned out to a task's subscribers (spec.md §4.10, §8 scenario 6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Status {
        status: TaskStatus,
        progress: f64,
        error: Option<String>,
        #[serde(rename = "results", skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    Progress {
        progress: f64,
    },
}

struct Entry {
    record: TaskRecord,
    cancel: Arc<AtomicBool>,
    events: broadcast::Sender<TaskEvent>,
    completed_at_instant: Option<Instant>,
}

/// Holds every in-flight and recently-terminal task (spec.md §4.10). Cheap to clone via `Arc`;
/// `submit` spawns its own driver task, so the manager is normally shared as `Arc<TaskManager>`.
pub struct TaskManager {
    clock: Arc<dyn Clock>,
    tasks: DashMap<TaskId, Entry>,
    order: Mutex<VecDeque<TaskId>>,
    semaphore: Arc<Semaphore>,
    ttl: Duration,
    lru_capacity: usize,
}

impl TaskManager {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_CONCURRENCY, DEFAULT_TTL, DEFAULT_LRU_CAPACITY)
    }

    #[must_use]
    pub fn with_limits(clock: Arc<dyn Clock>, concurrency: usize, ttl: Duration, lru_capacity: usize) -> Self {
        Self {
            clock,
            tasks: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            ttl,
            lru_capacity,
        }
    }

    /// Records `task_id` as pending and spawns a driver that waits for a semaphore permit (so
    /// excess submissions queue FIFO, spec.md §4.10), transitions to running, runs `work`, then
    /// transitions to its terminal state from the outcome. `work` is handed its own cancel flag
    /// to consult cooperatively; cancellation never aborts it forcibly.
    pub fn submit<F, Fut>(self: &Arc<Self>, task_id: TaskId, kind: TaskKind, work: F)
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, VertexError>> + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let record = TaskRecord {
            task_id,
            kind,
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at: self.clock.now(),
            completed_at: None,
            error: None,
            result: None,
        };
        self.tasks.insert(task_id, Entry { record, cancel: cancel.clone(), events, completed_at_instant: None });
        self.order.lock().expect("task manager order mutex poisoned").push_back(task_id);

        let manager = self.clone();
        tokio::spawn(async move {
            let permit = manager.semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
            manager.set_status(task_id, TaskStatus::Running, None, None);
            let outcome = work(cancel.clone()).await;
            drop(permit);

            if cancel.load(Ordering::SeqCst) {
                manager.set_status(task_id, TaskStatus::Cancelled, None, None);
            } else {
                match outcome {
                    Ok(result) => manager.set_status(task_id, TaskStatus::Completed, None, Some(result)),
                    Err(err) => manager.set_status(task_id, TaskStatus::Failed, Some(err.message), None),
                }
            }
        });
    }

    fn set_status(&self, task_id: TaskId, status: TaskStatus, error: Option<String>, result: Option<Value>) {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else { return };
        entry.record.status = status;
        entry.record.error = error.clone();
        if status.is_terminal() {
            entry.record.progress = 100.0;
            entry.record.completed_at = Some(self.clock.now());
            entry.completed_at_instant = Some(Instant::now());
        }
        entry.record.result = result.clone();
        let _ = entry.events.send(TaskEvent::Status { status, progress: entry.record.progress, error, result });
    }

    /// Stores and fans out a progress update (spec.md §4.10). A no-op for an unknown or already
    /// terminal task.
    pub fn update_progress(&self, task_id: TaskId, progress: f64) {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else { return };
        if entry.record.status.is_terminal() {
            return;
        }
        entry.record.progress = progress;
        let _ = entry.events.send(TaskEvent::Progress { progress });
    }

    /// Sends the current state immediately, then forwards every subsequent event to `sink` with
    /// drop-newest back-pressure (`try_send`), closing `sink` once the task reaches a terminal
    /// state (spec.md §4.10).
    ///
    /// # Errors
    ///
    /// Returns a validation error if `task_id` is unknown.
    pub fn subscribe(&self, task_id: TaskId, sink: mpsc::Sender<TaskEvent>) -> Result<(), VertexError> {
        let entry = self.tasks.get(&task_id).ok_or_else(|| VertexError::new(ErrorKind::Validation, "unknown task id"))?;
        let initial = TaskEvent::Status {
            status: entry.record.status,
            progress: entry.record.progress,
            error: entry.record.error.clone(),
            result: entry.record.result.clone(),
        };
        let already_terminal = entry.record.status.is_terminal();
        let mut events = entry.events.subscribe();
        drop(entry);

        if sink.try_send(initial).is_err() {
            warn!(?task_id, "dropped initial task state for a slow subscriber");
        }
        if already_terminal {
            return Ok(());
        }

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let terminal = matches!(&event, TaskEvent::Status { status, .. } if status.is_terminal());
                        if sink.try_send(event).is_err() {
                            warn!(?task_id, "dropped a task event for a slow subscriber");
                        }
                        if terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
        Ok(())
    }

    /// Sets the cooperative cancel flag `work` is expected to consult; does not abort blocked
    /// I/O forcibly (spec.md §4.10).
    pub fn cancel(&self, task_id: TaskId) {
        if let Some(entry) = self.tasks.get(&task_id) {
            entry.cancel.store(true, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn record(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.tasks.get(&task_id).map(|entry| entry.record.clone())
    }

    /// Evicts terminal tasks past TTL, then, if still over the LRU cap, evicts the oldest
    /// terminal entries (by submission order) until back under it (spec.md §4.10).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let expired: Vec<TaskId> = self
            .tasks
            .iter()
            .filter_map(|entry| match entry.completed_at_instant {
                Some(completed) if now.duration_since(completed) >= self.ttl => Some(*entry.key()),
                _ => None,
            })
            .collect();
        for task_id in &expired {
            self.tasks.remove(task_id);
        }

        let mut order = self.order.lock().expect("task manager order mutex poisoned");
        order.retain(|id| self.tasks.contains_key(id));

        let terminal_count = self.tasks.iter().filter(|entry| entry.record.status.is_terminal()).count();
        if terminal_count > self.lru_capacity {
            let mut to_evict = terminal_count - self.lru_capacity;
            let mut i = 0;
            while to_evict > 0 && i < order.len() {
                let task_id = order[i];
                let is_terminal_entry = self.tasks.get(&task_id).map(|e| e.record.status.is_terminal()).unwrap_or(false);
                if is_terminal_entry {
                    self.tasks.remove(&task_id);
                    order.remove(i);
                    to_evict -= 1;
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Spawns the periodic background sweep (spec.md §4.10: "default every 10 minutes").
    pub fn spawn_cleanup_sweep(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.cleanup();
            }
        })
    }
}

/// Coalesces raw per-item progress events into at most one `update_progress` call per
/// `min_interval` and at most `max_updates` calls overall (spec.md §4.10).
pub struct ProgressTracker<F: FnMut(f64)> {
    total_items: Option<u64>,
    processed: u64,
    min_interval: Duration,
    max_updates: u32,
    updates_sent: u32,
    last_emit: Option<Instant>,
    on_update: F,
}

impl<F: FnMut(f64)> ProgressTracker<F> {
    pub fn new(total_items: Option<u64>, min_interval: Duration, max_updates: u32, on_update: F) -> Self {
        Self { total_items, processed: 0, min_interval, max_updates, updates_sent: 0, last_emit: None, on_update }
    }

    fn percent(&self) -> f64 {
        match self.total_items {
            Some(total) if total > 0 => (self.processed as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// Records one processed item, emitting a coalesced update if `min_interval` has elapsed
    /// since the last one and the `max_updates` budget isn't spent.
    pub fn record_item(&mut self) {
        self.processed += 1;
        if self.updates_sent >= self.max_updates {
            return;
        }
        let now = Instant::now();
        let due = self.last_emit.is_none_or(|last| now.duration_since(last) >= self.min_interval);
        if due {
            (self.on_update)(self.percent());
            self.last_emit = Some(now);
            self.updates_sent += 1;
        }
    }

    /// Always emits a final update, bypassing the interval gate — called once the run ends.
    pub fn finish(&mut self) {
        (self.on_update)(100.0);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use vertex_core::LiveClock;

    use super::*;

    fn manager_with(concurrency: usize, ttl: Duration, lru_capacity: usize) -> Arc<TaskManager> {
        Arc::new(TaskManager::with_limits(Arc::new(LiveClock), concurrency, ttl, lru_capacity))
    }

    #[tokio::test]
    async fn pushes_pending_then_running_then_completed_with_results() {
        let manager = manager_with(3, DEFAULT_TTL, DEFAULT_LRU_CAPACITY);
        let task_id = TaskId::new();
        let (tx, mut rx) = mpsc::channel(8);

        manager.submit(task_id, TaskKind::Backtest, |_cancel| async move { Ok(serde_json::json!({"trades": 1})) });
        manager.subscribe(task_id, tx).unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, TaskEvent::Status { status: TaskStatus::Pending, progress, .. } if progress == 0.0));

        let mut saw_running = false;
        let mut saw_completed = false;
        while let Some(event) = rx.recv().await {
            match event {
                TaskEvent::Status { status: TaskStatus::Running, .. } => saw_running = true,
                TaskEvent::Status { status: TaskStatus::Completed, progress, result, .. } => {
                    assert_eq!(progress, 100.0);
                    assert_eq!(result, Some(serde_json::json!({"trades": 1})));
                    saw_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_running && saw_completed);
        let _ = manager;
    }

    #[tokio::test]
    async fn concurrency_cap_limits_simultaneously_running_tasks() {
        let manager = manager_with(2, DEFAULT_TTL, DEFAULT_LRU_CAPACITY);
        let running = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let running = running.clone();
            let max_seen = max_seen.clone();
            manager.submit(TaskId::new(), TaskKind::Backtest, move |_cancel| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::Null)
            });
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancel_flag_is_observed_cooperatively() {
        let manager = manager_with(3, DEFAULT_TTL, DEFAULT_LRU_CAPACITY);
        let task_id = TaskId::new();
        manager.submit(task_id, TaskKind::Backtest, |cancel| async move {
            for _ in 0..50 {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(Value::Null);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok(Value::Null)
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.cancel(task_id);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.record(task_id).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_sweep_evicts_terminal_tasks_past_ttl() {
        let manager = manager_with(3, Duration::from_secs(60), DEFAULT_LRU_CAPACITY);
        let task_id = TaskId::new();
        manager.submit(task_id, TaskKind::Backtest, |_cancel| async move { Ok(Value::Null) });
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(manager.record(task_id).is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        manager.cleanup();
        assert!(manager.record(task_id).is_none());
    }

    #[test]
    fn progress_tracker_coalesces_by_interval_and_caps_update_count() {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = emitted.clone();
        // min_interval of zero means every call is "due"; max_updates caps the count instead.
        let mut tracker = ProgressTracker::new(Some(10), Duration::ZERO, 3, move |p| sink.lock().unwrap().push(p));
        for _ in 0..10 {
            tracker.record_item();
        }
        assert_eq!(emitted.lock().unwrap().len(), 3);
    }
}
