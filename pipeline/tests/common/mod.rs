#![allow(dead_code)]

use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use image::{ImageFormat, Rgba, RgbaImage};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use pipeline::error::ClientResult;
use pipeline::{
    AnalysisClient, BatchSnapshot, ClientError, Controller, ControllerHandle, HistoryStore,
    PipelineEvent, RemoteTask, SourceImage, Submission, TokenProvider,
};
use shared::{
    AnalysisResult, BoundingBox, EncodedImage, FinalClass, FlowerDetection, RemoteStatus,
    TaskHandle, TaskId, TaskState, VoteRecord,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 4) as u8, (y * 5) as u8, 90, 255])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn source(name: &str) -> SourceImage {
    SourceImage::new(name, png_bytes(WIDTH, HEIGHT)).with_url(format!("blob:{name}"))
}

pub fn detection(class: &str, bbox: BoundingBox) -> FlowerDetection {
    FlowerDetection {
        bbox,
        votes: vec![VoteRecord {
            model_name: "ensemble-a".into(),
            class_id: 1,
            class_name: Some(class.into()),
            confidence: 0.9,
        }],
        final_class: FinalClass {
            class_name: class.into(),
            class_id: 1,
            confidence: 0.9,
            vote_count: 1,
        },
        crop_image: None,
    }
}

/// Two detections inside a `WIDTH`x`HEIGHT` image.
pub fn two_flowers() -> AnalysisResult {
    AnalysisResult {
        image_size: [WIDTH, HEIGHT],
        flowers: vec![
            detection("rose", BoundingBox::new(2.0, 2.0, 20.0, 20.0).with_confidence(0.9)),
            detection("tulip", BoundingBox::new(30.0, 10.0, 60.0, 40.0).with_confidence(0.6)),
        ],
        processing_time: Some(0.4),
        timestamp: Some("2024-05-01T10:00:00".into()),
    }
}

pub fn remote(status: RemoteStatus) -> ClientResult<RemoteTask> {
    Ok(RemoteTask {
        status,
        result: None,
        error: None,
    })
}

pub fn remote_done(result: AnalysisResult) -> ClientResult<RemoteTask> {
    Ok(RemoteTask {
        status: RemoteStatus::Completed,
        result: Some(result),
        error: None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SubmitStarted,
    SubmitFinished,
    Fetch(TaskHandle),
}

#[derive(Default)]
struct FakeState {
    submit_replies: VecDeque<ClientResult<Submission>>,
    status_replies: HashMap<TaskHandle, VecDeque<ClientResult<RemoteTask>>>,
    calls: Vec<Call>,
    active_submits: usize,
    max_active_submits: usize,
    uploads: Vec<EncodedImage>,
    tokens: Vec<String>,
}

/// Scripted detection service. Clones share the script and the call log.
///
/// Status checks for a handle with no scripted replies left report `processing`.
#[derive(Clone)]
pub struct FakeClient {
    state: Rc<RefCell<FakeState>>,
    latency: Duration,
}

impl FakeClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            state: Rc::default(),
            latency,
        }
    }

    pub fn reply_submit(&self, reply: ClientResult<Submission>) -> &Self {
        self.state.borrow_mut().submit_replies.push_back(reply);
        self
    }

    pub fn reply_status(&self, handle: &str, reply: ClientResult<RemoteTask>) -> &Self {
        self.state
            .borrow_mut()
            .status_replies
            .entry(TaskHandle::from(handle))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::SubmitStarted)
            .count()
    }

    pub fn fetch_count(&self, handle: &str) -> usize {
        let handle = TaskHandle::from(handle);
        self.calls()
            .iter()
            .filter(|call| **call == Call::Fetch(handle.clone()))
            .count()
    }

    pub fn max_active_submits(&self) -> usize {
        self.state.borrow().max_active_submits
    }

    pub fn uploads(&self) -> Vec<EncodedImage> {
        self.state.borrow().uploads.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.borrow().tokens.clone()
    }
}

impl AnalysisClient for FakeClient {
    async fn submit(&self, image: EncodedImage, token: &str) -> ClientResult<Submission> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::SubmitStarted);
            state.active_submits += 1;
            let active = state.active_submits;
            if active > state.max_active_submits {
                state.max_active_submits = active;
            }
            state.uploads.push(image);
            state.tokens.push(token.to_string());
        }
        tokio::time::sleep(self.latency).await;

        let mut state = self.state.borrow_mut();
        state.active_submits -= 1;
        state.calls.push(Call::SubmitFinished);
        state.submit_replies.pop_front().unwrap_or_else(|| {
            Err(ClientError::Validation {
                status: 400,
                detail: "unscripted submission".into(),
            })
        })
    }

    async fn fetch_status(&self, handle: &TaskHandle, _token: &str) -> ClientResult<RemoteTask> {
        self.state.borrow_mut().calls.push(Call::Fetch(handle.clone()));
        tokio::time::sleep(self.latency).await;

        let mut state = self.state.borrow_mut();
        state
            .status_replies
            .get_mut(handle)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| remote(RemoteStatus::Processing))
    }
}

/// Enqueue `sources`, start a batch and run the controller until it reports
/// the batch finished. Returns every event seen and a final snapshot.
pub async fn run_batch<C, H, A>(
    controller: Controller<C, H, A>,
    handle: ControllerHandle,
    mut events: UnboundedReceiver<PipelineEvent>,
    sources: Vec<SourceImage>,
) -> (Vec<PipelineEvent>, BatchSnapshot)
where
    C: AnalysisClient + 'static,
    H: HistoryStore,
    A: TokenProvider,
{
    let driver = async move {
        handle.enqueue(sources).unwrap();
        handle.start_batch().unwrap();
        let seen = collect_until(&mut events, |event| {
            matches!(event, PipelineEvent::BatchFinished(_))
        })
        .await;
        let snapshot = handle.snapshot().await.unwrap();
        handle.shutdown().unwrap();
        (seen, snapshot)
    };
    let ((), outcome) = futures::join!(controller.run(), driver);
    outcome
}

/// Receive events up to and including the first one matching `stop`.
pub async fn collect_until<F>(
    events: &mut UnboundedReceiver<PipelineEvent>,
    stop: F,
) -> Vec<PipelineEvent>
where
    F: Fn(&PipelineEvent) -> bool,
{
    let mut seen = Vec::new();
    while let Some(event) = events.next().await {
        let done = stop(&event);
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

/// States a task was published in, in order.
pub fn state_trace(events: &[PipelineEvent], id: TaskId) -> Vec<TaskState> {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::TaskUpdated(view) if view.id == id => Some(view.state),
            _ => None,
        })
        .collect()
}

pub fn history_events(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, PipelineEvent::HistoryAppended(_)))
        .count()
}
