//! Access to the remote detection service.

pub mod normalize;

#[cfg(feature = "native")]
mod http;

#[cfg(feature = "native")]
pub use http::HttpAnalysisClient;

use shared::{AnalysisResult, EncodedImage, RemoteStatus, TaskHandle};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The service analysed the image inline.
    Completed(AnalysisResult),
    /// The service queued the image; poll the handle for the outcome.
    Accepted(TaskHandle),
}

/// Snapshot of an asynchronous backend task.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTask {
    pub status: RemoteStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

/// Detection service operations. Implementations never retry and never touch
/// pipeline state; every failure is returned to the caller as a [`ClientError`].
///
/// [`ClientError`]: crate::error::ClientError
#[allow(async_fn_in_trait)]
pub trait AnalysisClient {
    async fn submit(&self, image: EncodedImage, token: &str) -> ClientResult<Submission>;

    async fn fetch_status(&self, handle: &TaskHandle, token: &str) -> ClientResult<RemoteTask>;
}

/// File name announced for the multipart `image` field.
pub fn upload_file_name(mime: &str) -> &'static str {
    match mime {
        "image/png" => "image.png",
        _ => "image.jpg",
    }
}

/// Status URL for `handle` under the `flower/tasks/` endpoint. The id always
/// becomes exactly one percent-encoded path segment.
pub fn task_status_url(tasks_url: &Url, handle: &TaskHandle) -> ClientResult<Url> {
    let mut url = tasks_url.clone();
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidResponse(format!("{tasks_url} cannot carry a task id")))?
        .pop_if_empty()
        .push(&handle.0);
    Ok(url)
}
