//! Client-side flower detection pipeline: image adjustment, sequential
//! submission to the detection service, shared status polling, crop
//! extraction and a history of finished analyses.

pub mod annotate;
pub mod auth;
pub mod client;
pub mod config;
pub mod controller;
pub mod crop;
pub mod error;
pub mod history;
pub mod preprocess;
pub mod timer;

pub use auth::{StaticToken, TokenProvider};
pub use client::{AnalysisClient, RemoteTask, Submission};
pub use config::PipelineConfig;
pub use controller::{
    BatchSnapshot, BatchSummary, Controller, ControllerHandle, PipelineEvent, SourceImage, TaskView,
};
pub use error::{ClientError, ControllerClosed, HistoryError, ImageError, TaskError};
pub use history::{HistoryStats, HistoryStore, MemoryHistory};
pub use timer::Timer;

#[cfg(feature = "native")]
pub use client::HttpAnalysisClient;
#[cfg(feature = "native")]
pub use history::JsonFileHistory;
#[cfg(feature = "native")]
pub use timer::TokioTimer;
