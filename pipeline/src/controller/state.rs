use chrono::{DateTime, Utc};
use std::sync::Arc;
use strum::IntoEnumIterator;

use shared::{AnalysisResult, ProcessingParams, RemoteStatus, TaskHandle, TaskId, TaskState};

/// An image handed to the pipeline. Bytes are the original upload and never change.
#[derive(Clone)]
pub struct SourceImage {
    pub name: String,
    /// Where the UI can display the original from (object URL, file path).
    pub url: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            url: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ImageTask {
    pub id: TaskId,
    /// Batch the task was started in; 0 until a batch adopts it.
    pub batch: u64,
    pub source: SourceImage,
    pub queued_at: DateTime<Utc>,
    /// Adjustments used for the upload, frozen when submission starts.
    pub params: Option<ProcessingParams>,
    pub state: TaskState,
    pub task_handle: Option<TaskHandle>,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub poll_attempts: u32,
    pub last_remote_status: Option<RemoteStatus>,
    /// Most recent transient poll failure, cleared by the next successful check.
    pub last_poll_error: Option<String>,
}

/// What the UI sees of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub id: TaskId,
    pub batch: u64,
    pub name: String,
    pub url: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub state: TaskState,
    pub params: Option<ProcessingParams>,
    pub task_handle: Option<TaskHandle>,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub poll_attempts: u32,
    pub remote_status: Option<RemoteStatus>,
    pub last_poll_error: Option<String>,
}

impl From<&ImageTask> for TaskView {
    fn from(task: &ImageTask) -> Self {
        Self {
            id: task.id,
            batch: task.batch,
            name: task.source.name.clone(),
            url: task.source.url.clone(),
            queued_at: task.queued_at,
            state: task.state,
            params: task.params,
            task_handle: task.task_handle.clone(),
            result: task.result.clone(),
            error: task.error.clone(),
            poll_attempts: task.poll_attempts,
            remote_status: task.last_remote_status,
            last_poll_error: task.last_poll_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub batch: u64,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn is_partial(&self) -> bool {
        self.failed > 0 && self.completed > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSnapshot {
    pub batch: u64,
    pub running: bool,
    pub polling: bool,
    pub params: ProcessingParams,
    /// Tasks in queue order.
    pub tasks: Vec<TaskView>,
}

impl BatchSnapshot {
    pub fn task(&self, id: TaskId) -> Option<&TaskView> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Finalized results of the completed tasks, in queue order.
    pub fn completed_results(&self) -> Vec<(TaskId, &AnalysisResult)> {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Completed)
            .filter_map(|task| task.result.as_ref().map(|result| (task.id, result)))
            .collect()
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }

    /// Number of tasks per state, every state listed.
    pub fn state_counts(&self) -> Vec<(TaskState, usize)> {
        TaskState::iter().map(|state| (state, self.count(state))).collect()
    }
}

/// The task table. State changes only go through the methods below, each of
/// which enforces the forward-only lifecycle.
#[derive(Debug, Default)]
pub struct BatchState {
    tasks: Vec<ImageTask>,
    next_id: u64,
    batch: u64,
    running: bool,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_batch(&self) -> u64 {
        self.batch
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn get(&self, id: TaskId) -> Option<&ImageTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn view(&self, id: TaskId) -> Option<TaskView> {
        self.get(id).map(TaskView::from)
    }

    pub fn views(&self) -> Vec<TaskView> {
        self.tasks.iter().map(TaskView::from).collect()
    }

    /// Add a task. It waits for the next [`begin_batch`](Self::begin_batch),
    /// even while another batch is running.
    pub fn enqueue(&mut self, source: SourceImage, queued_at: DateTime<Utc>) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.push(ImageTask {
            id,
            batch: 0,
            source,
            queued_at,
            params: None,
            state: TaskState::Queued,
            task_handle: None,
            result: None,
            error: None,
            poll_attempts: 0,
            last_remote_status: None,
            last_poll_error: None,
        });
        id
    }

    /// Open a new batch adopting every queued task. Returns the batch number and
    /// the number of adopted tasks, or `None` when nothing is queued.
    pub fn begin_batch(&mut self) -> Option<(u64, usize)> {
        let queued = self.count(TaskState::Queued);
        if queued == 0 {
            self.running = false;
            return None;
        }
        self.batch += 1;
        let batch = self.batch;
        for task in self.tasks.iter_mut().filter(|t| t.state == TaskState::Queued) {
            task.batch = batch;
        }
        self.running = true;
        Some((batch, queued))
    }

    /// Close the running batch once none of its tasks is queued or in flight.
    pub fn finish_if_done(&mut self) -> Option<BatchSummary> {
        if !self.running {
            return None;
        }
        let batch = self.batch;
        let unfinished = self
            .tasks
            .iter()
            .any(|task| task.batch == batch && !task.state.is_terminal());
        if unfinished {
            return None;
        }
        self.running = false;
        Some(self.summary(batch))
    }

    pub fn summary(&self, batch: u64) -> BatchSummary {
        let members = || self.tasks.iter().filter(move |task| task.batch == batch);
        BatchSummary {
            batch,
            total: members().count(),
            completed: members()
                .filter(|task| task.state == TaskState::Completed)
                .count(),
            failed: members().filter(|task| task.state == TaskState::Failed).count(),
        }
    }

    /// First queued task of the running batch.
    pub fn next_queued(&self) -> Option<TaskId> {
        if !self.running {
            return None;
        }
        self.tasks
            .iter()
            .filter(|task| task.batch == self.batch && task.state == TaskState::Queued)
            .min_by_key(|task| (task.queued_at, task.id))
            .map(|task| task.id)
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }

    pub fn in_flight(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|task| task.state.is_in_flight())
            .map(|task| task.id)
            .collect()
    }

    /// Handles of every task waiting on the backend.
    pub fn polling(&self) -> Vec<(TaskId, TaskHandle)> {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Polling)
            .filter_map(|task| task.task_handle.clone().map(|handle| (task.id, handle)))
            .collect()
    }

    pub fn has_polling(&self) -> bool {
        self.tasks.iter().any(|task| task.state == TaskState::Polling)
    }

    pub fn mark_submitting(&mut self, id: TaskId, params: ProcessingParams) -> bool {
        self.advance(id, TaskState::Submitting, |task| task.params = Some(params))
    }

    pub fn mark_polling(&mut self, id: TaskId, handle: TaskHandle) -> bool {
        self.advance(id, TaskState::Polling, |task| task.task_handle = Some(handle))
    }

    pub fn complete(&mut self, id: TaskId, result: AnalysisResult) -> bool {
        self.advance(id, TaskState::Completed, |task| {
            task.result = Some(result);
            task.last_poll_error = None;
        })
    }

    pub fn fail(&mut self, id: TaskId, error: String) -> bool {
        self.advance(id, TaskState::Failed, |task| task.error = Some(error))
    }

    /// Count one status check. Returns the new attempt count.
    pub fn record_poll(
        &mut self,
        id: TaskId,
        remote_status: Option<RemoteStatus>,
        poll_error: Option<String>,
    ) -> Option<u32> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id && task.state == TaskState::Polling)?;
        task.poll_attempts += 1;
        if remote_status.is_some() {
            task.last_remote_status = remote_status;
        }
        task.last_poll_error = poll_error;
        Some(task.poll_attempts)
    }

    /// Drop every task and end the running batch.
    pub fn clear(&mut self) -> usize {
        self.running = false;
        let dropped = self.tasks.len();
        self.tasks.clear();
        dropped
    }

    fn advance<F>(&mut self, id: TaskId, next: TaskState, update: F) -> bool
    where
        F: FnOnce(&mut ImageTask),
    {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            log::warn!("Ignoring transition of unknown task {id} to {next}");
            return false;
        };
        if !task.state.can_advance_to(next) {
            log::error!("Rejected transition of {id}: {} -> {next}", task.state);
            return false;
        }
        log::debug!("{id}: {} -> {next}", task.state);
        task.state = next;
        update(task);
        true
    }
}
