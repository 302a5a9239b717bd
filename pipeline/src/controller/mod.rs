//! Batch pipeline controller.
//!
//! The controller is an actor: the UI talks to it through a [`ControllerHandle`]
//! and listens to [`PipelineEvent`]s, while [`Controller::run`] owns every task
//! and serializes all state changes. Submissions go out one at a time; accepted
//! tasks are resolved by a single shared [`PollLoop`].

mod poll;
mod state;

pub use poll::{PollEvent, PollLoop};
pub use state::{BatchSnapshot, BatchState, BatchSummary, ImageTask, SourceImage, TaskView};

use chrono::Utc;
use futures::channel::{mpsc, oneshot};
use futures::future::{join_all, Fuse, FusedFuture, FutureExt, LocalBoxFuture};
use futures::StreamExt;
use std::rc::Rc;

use shared::{AnalysisResult, HistoryRecord, ProcessingParams, RemoteStatus, TaskId};

use crate::auth::{usable_token, TokenProvider};
use crate::client::{AnalysisClient, RemoteTask, Submission};
use crate::config::PipelineConfig;
use crate::crop;
use crate::error::{ClientError, ClientResult, ControllerClosed, TaskError};
use crate::history::HistoryStore;
use crate::preprocess;
use crate::timer::Timer;

const MISSING_TOKEN: &str = "no access token available, log in first";

pub enum Command {
    Enqueue(Vec<SourceImage>),
    SetParams(ProcessingParams),
    StartBatch,
    Clear,
    Snapshot(oneshot::Sender<BatchSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    TaskUpdated(TaskView),
    HistoryAppended(HistoryRecord),
    PollingStarted,
    PollingStopped,
    BatchFinished(BatchSummary),
    /// Every task was discarded.
    Cleared,
}

type SubmitFuture = LocalBoxFuture<'static, (TaskId, ClientResult<Submission>)>;

/// Cheap, cloneable sender of [`Command`]s.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ControllerHandle {
    pub fn enqueue(&self, sources: Vec<SourceImage>) -> Result<(), ControllerClosed> {
        self.send(Command::Enqueue(sources))
    }

    /// Adjustments for tasks that have not started submitting yet.
    pub fn set_params(&self, params: ProcessingParams) -> Result<(), ControllerClosed> {
        self.send(Command::SetParams(params))
    }

    pub fn start_batch(&self) -> Result<(), ControllerClosed> {
        self.send(Command::StartBatch)
    }

    pub fn clear(&self) -> Result<(), ControllerClosed> {
        self.send(Command::Clear)
    }

    pub async fn snapshot(&self) -> Result<BatchSnapshot, ControllerClosed> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| ControllerClosed)
    }

    pub fn shutdown(&self) -> Result<(), ControllerClosed> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), ControllerClosed> {
        self.commands
            .unbounded_send(command)
            .map_err(|_| ControllerClosed)
    }
}

pub struct Controller<C, H, A> {
    config: PipelineConfig,
    client: Rc<C>,
    history: H,
    auth: A,
    params: ProcessingParams,
    state: BatchState,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    submission: Fuse<SubmitFuture>,
    poll: PollLoop,
}

impl<C, H, A> Controller<C, H, A>
where
    C: AnalysisClient + 'static,
    H: HistoryStore,
    A: TokenProvider,
{
    pub fn new<T>(
        config: PipelineConfig,
        client: C,
        history: H,
        auth: A,
        timer: T,
    ) -> (Self, ControllerHandle, mpsc::UnboundedReceiver<PipelineEvent>)
    where
        T: Timer + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded();
        let (event_tx, event_rx) = mpsc::unbounded();
        let poll = PollLoop::new(config.polling.interval(), Rc::new(timer));
        let controller = Self {
            config,
            client: Rc::new(client),
            history,
            auth,
            params: ProcessingParams::default(),
            state: BatchState::new(),
            commands: command_rx,
            events: event_tx,
            submission: Fuse::terminated(),
            poll,
        };
        let handle = ControllerHandle {
            commands: command_tx,
        };
        (controller, handle, event_rx)
    }

    /// Process commands, submissions and poll ticks until shut down or every
    /// handle is dropped.
    pub async fn run(mut self) {
        log::info!("Batch controller started");
        loop {
            futures::select! {
                command = self.commands.next() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                (id, outcome) = &mut self.submission => self.on_submitted(id, outcome),
                event = &mut self.poll => self.on_poll_event(event),
            }
        }
        self.cancel_in_flight("controller shut down");
        log::info!("Batch controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enqueue(sources) => self.enqueue(sources),
            Command::SetParams(params) => self.set_params(params),
            Command::StartBatch => self.start_batch(),
            Command::Clear => self.clear(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn enqueue(&mut self, sources: Vec<SourceImage>) {
        for source in sources {
            let id = self.state.enqueue(source, Utc::now());
            log::debug!("Queued {id}");
            self.publish(id);
        }
        self.advance_queue();
    }

    fn set_params(&mut self, params: ProcessingParams) {
        match preprocess::check_params(&params) {
            Ok(()) => self.params = params,
            Err(err) => log::warn!("Ignoring processing parameters: {err}"),
        }
    }

    fn start_batch(&mut self) {
        let superseded = self
            .state
            .is_running()
            .then(|| self.state.current_batch());
        if superseded.is_some() {
            self.cancel_in_flight("superseded by a new batch");
        }

        match self.state.begin_batch() {
            Some((batch, count)) => log::info!("Starting batch {batch} with {count} image(s)"),
            None => log::info!("Nothing queued, no batch started"),
        }
        if let Some(batch) = superseded {
            self.emit(PipelineEvent::BatchFinished(self.state.summary(batch)));
        }
        self.advance_queue();
    }

    fn clear(&mut self) {
        self.submission = Fuse::terminated();
        if self.poll.stop() {
            self.emit(PipelineEvent::PollingStopped);
        }
        let dropped = self.state.clear();
        log::info!("Cleared {dropped} task(s)");
        self.emit(PipelineEvent::Cleared);
    }

    fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch: self.state.current_batch(),
            running: self.state.is_running(),
            polling: self.poll.is_running(),
            params: self.params,
            tasks: self.state.views(),
        }
    }

    /// Drop the pending submission and poll round, failing every task they covered.
    fn cancel_in_flight(&mut self, reason: &'static str) {
        self.submission = Fuse::terminated();
        if self.poll.stop() {
            self.emit(PipelineEvent::PollingStopped);
        }
        for id in self.state.in_flight() {
            self.fail(id, TaskError::Cancelled(reason));
        }
    }

    /// Start submitting the next queued task once the submission slot is free.
    fn advance_queue(&mut self) {
        while self.submission.is_terminated() {
            let Some(id) = self.state.next_queued() else {
                break;
            };
            match self.begin_submission(id) {
                Ok(Some(submit)) => self.submission = submit.fuse(),
                Ok(None) => break,
                Err(err) => self.fail(id, err),
            }
        }
        self.finish_batch_if_done();
    }

    fn begin_submission(&mut self, id: TaskId) -> Result<Option<SubmitFuture>, TaskError> {
        let params = self.params;
        if !self.state.mark_submitting(id, params) {
            return Ok(None);
        }
        self.publish(id);

        let token = usable_token(&self.auth)
            .ok_or_else(|| ClientError::Auth(MISSING_TOKEN.to_string()))?;
        let bytes = match self.state.get(id) {
            Some(task) => task.source.bytes.clone(),
            None => return Ok(None),
        };
        let image = preprocess::process(&bytes, &params, &self.config.processing)?;

        log::debug!("Submitting {id} ({} bytes {})", image.bytes.len(), image.mime);
        let client = Rc::clone(&self.client);
        Ok(Some(Box::pin(async move {
            let outcome = client.submit(image, &token).await;
            (id, outcome)
        })))
    }

    fn on_submitted(&mut self, id: TaskId, outcome: ClientResult<Submission>) {
        match outcome {
            Ok(Submission::Completed(result)) => self.finalize(id, result),
            Ok(Submission::Accepted(handle)) => {
                log::debug!("{id} accepted as backend task {handle}");
                if self.state.mark_polling(id, handle) {
                    self.publish(id);
                    if self.poll.start() {
                        log::debug!("Polling started");
                        self.emit(PipelineEvent::PollingStarted);
                    }
                }
            }
            Err(err) => self.fail(id, err.into()),
        }
        self.advance_queue();
    }

    fn on_poll_event(&mut self, event: PollEvent) {
        match event {
            PollEvent::Tick => self.begin_poll_round(),
            PollEvent::Round(outcomes) => {
                for (id, outcome) in outcomes {
                    self.apply_poll_outcome(id, outcome);
                }
                if self.state.has_polling() {
                    self.poll.rearm();
                } else {
                    self.stop_polling();
                }
                self.finish_batch_if_done();
            }
        }
    }

    fn begin_poll_round(&mut self) {
        let targets = self.state.polling();
        if targets.is_empty() {
            self.stop_polling();
            return;
        }
        let Some(token) = usable_token(&self.auth) else {
            for (id, _) in targets {
                self.fail(id, ClientError::Auth(MISSING_TOKEN.to_string()).into());
            }
            self.stop_polling();
            self.finish_batch_if_done();
            return;
        };

        log::debug!("Checking status of {} task(s)", targets.len());
        let client = Rc::clone(&self.client);
        self.poll.begin_round(Box::pin(async move {
            let client = &client;
            let token = &token;
            let checks = targets.into_iter().map(|(id, handle)| async move {
                (id, client.fetch_status(&handle, token).await)
            });
            PollEvent::Round(join_all(checks).await)
        }));
    }

    fn apply_poll_outcome(&mut self, id: TaskId, outcome: ClientResult<RemoteTask>) {
        let (remote_status, poll_error) = match outcome {
            Ok(RemoteTask {
                status: RemoteStatus::Completed,
                result: Some(result),
                ..
            }) => return self.finalize(id, result),
            Ok(RemoteTask {
                status: RemoteStatus::Completed,
                result: None,
                ..
            }) => {
                let err = ClientError::InvalidResponse("completed task without result".into());
                return self.fail(id, err.into());
            }
            Ok(RemoteTask {
                status: RemoteStatus::Failed,
                error,
                ..
            }) => {
                let detail = error.unwrap_or_else(|| "no details".to_string());
                return self.fail(id, TaskError::Remote(detail));
            }
            Ok(remote) => (Some(remote.status), None),
            Err(err) if err.is_transient() => {
                log::warn!("Status check for {id} failed, will retry: {err}");
                (None, Some(err.to_string()))
            }
            Err(err) => return self.fail(id, err.into()),
        };

        let Some(attempts) = self.state.record_poll(id, remote_status, poll_error) else {
            return;
        };
        match self.config.polling.max_attempts {
            Some(max) if attempts >= max => self.fail(id, TaskError::Timeout { attempts }),
            _ => self.publish(id),
        }
    }

    /// Crop, record and complete. Any failure fails only this task.
    fn finalize(&mut self, id: TaskId, mut result: AnalysisResult) {
        let Some(task) = self.state.get(id).filter(|task| task.state.is_in_flight()) else {
            return;
        };
        let source = task.source.clone();
        let queued_at = task.queued_at;

        if let Err(err) = crop::crop_all(&source.bytes, &mut result.flowers) {
            return self.fail(id, err.into());
        }
        let image_url = source.url.clone().unwrap_or_else(|| source.name.clone());
        let record = HistoryRecord::new(image_url, source.name.clone(), queued_at, &result);
        if let Err(err) = self.history.append(record.clone()) {
            return self.fail(id, err.into());
        }

        let detections = result.flowers.len();
        if self.state.complete(id, result) {
            log::info!("{id} ({}) completed with {detections} detection(s)", source.name);
            self.publish(id);
            self.emit(PipelineEvent::HistoryAppended(record));
        }
    }

    fn fail(&mut self, id: TaskId, err: TaskError) {
        let detail = err.to_string();
        if self.state.fail(id, detail) {
            match err {
                TaskError::Cancelled(_) => log::info!("{id} {err}"),
                _ => log::error!("{id} failed: {err}"),
            }
            self.publish(id);
        }
    }

    fn stop_polling(&mut self) {
        if self.poll.stop() {
            log::debug!("Polling stopped");
            self.emit(PipelineEvent::PollingStopped);
        }
    }

    fn finish_batch_if_done(&mut self) {
        if let Some(summary) = self.state.finish_if_done() {
            log::info!(
                "Batch {} finished: {} of {} completed, {} failed",
                summary.batch,
                summary.completed,
                summary.total,
                summary.failed
            );
            self.emit(PipelineEvent::BatchFinished(summary));
        }
    }

    fn publish(&self, id: TaskId) {
        if let Some(view) = self.state.view(id) {
            self.emit(PipelineEvent::TaskUpdated(view));
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // Nobody listening is not an error.
        let _ = self.events.unbounded_send(event);
    }
}
