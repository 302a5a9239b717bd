use thiserror::Error;

/// Client-side image processing errors (pre-processing, cropping, overlays).
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error(
        "region ({x1}, {y1})-({x2}, {y2}) has no overlap with the {width}x{height} image"
    )]
    EmptyRegion {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: u32,
        height: u32,
    },

    #[error("{name} must be within 0..={max}, got {value}")]
    InvalidParameter {
        name: &'static str,
        value: u16,
        max: u16,
    },
}

/// Errors raised by an analysis client. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("request rejected ({status}): {detail}")]
    Validation { status: u16, detail: String },

    #[error("detection service error ({status}): {detail}")]
    Service { status: u16, detail: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Map a non-success HTTP status and its body onto the error taxonomy.
    ///
    /// FastAPI style `{"detail": ...}` bodies contribute their message; anything
    /// else is passed through verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            401 => ClientError::Auth(detail),
            400..=499 => ClientError::Validation { status, detail },
            500..=599 => ClientError::Service { status, detail },
            _ => ClientError::InvalidResponse(format!("status {status}: {detail}")),
        }
    }

    /// Transient failures worth another poll on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Service { .. })
    }
}

fn extract_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        });
    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => "no details".to_string(),
        None => body.trim().to_string(),
    }
}

/// History store errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("history serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("history storage unavailable: {0}")]
    Storage(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid API base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("poll interval must be > 0 ms")]
    ZeroPollInterval,

    #[error("max poll attempts must be > 0 when set")]
    ZeroMaxAttempts,

    #[error("JPEG quality must be within 1..=100, got {0}")]
    InvalidJpegQuality(u8),

    #[cfg(feature = "native")]
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Why a single task ended in `Failed`. Its `Display` is the user-visible detail.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("could not record result: {0}")]
    History(#[from] HistoryError),

    #[error("detection failed: {0}")]
    Remote(String),

    #[error("no result after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("cancelled: {0}")]
    Cancelled(&'static str),
}

/// The controller's event loop has exited; commands can no longer be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("batch controller is no longer running")]
pub struct ControllerClosed;

pub type ImageResult<T> = Result<T, ImageError>;
pub type ClientResult<T> = Result<T, ClientError>;
pub type HistoryResult<T> = Result<T, HistoryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ClientError::from_status(401, r#"{"detail": "Not authenticated"}"#),
            ClientError::Auth(detail) if detail == "Not authenticated"
        ));
        assert!(matches!(
            ClientError::from_status(422, "bad image"),
            ClientError::Validation { status: 422, detail } if detail == "bad image"
        ));
        assert!(matches!(
            ClientError::from_status(503, ""),
            ClientError::Service { status: 503, detail } if detail == "no details"
        ));
        assert!(matches!(
            ClientError::from_status(302, "moved"),
            ClientError::InvalidResponse(_)
        ));
    }

    #[test]
    fn structured_detail_is_kept_as_json() {
        let err = ClientError::from_status(400, r#"{"detail": [{"msg": "field required"}]}"#);
        assert!(err.to_string().contains("field required"));
    }

    #[test]
    fn task_error_detail_is_readable() {
        let err = TaskError::from(ClientError::Auth("token expired".into()));
        assert_eq!(err.to_string(), "authentication rejected: token expired");
        assert_eq!(
            TaskError::Timeout { attempts: 5 }.to_string(),
            "no result after 5 status checks"
        );
    }
}
