//! Raw request/response shapes of the detection backend.
//!
//! These mirror what the service actually sends, including the alternative
//! field names and bbox encodings seen across backend versions. Consumers
//! normalize them into the types in `model` before use.

use serde::{Deserialize, Serialize};

use crate::model::RemoteStatus;

/// Body of `POST /flower/detect`: either a finished analysis or an accepted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    Completed(WireAnalysis),
    Accepted {
        #[serde(alias = "taskId")]
        task_id: WireTaskId,
    },
}

/// Body of `GET /flower/tasks/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTaskStatus {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WireAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTaskId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for WireTaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireTaskId::Number(id) => write!(f, "{id}"),
            WireTaskId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAnalysis {
    #[serde(alias = "imageSize")]
    pub image_size: [u32; 2],
    #[serde(default)]
    pub flowers: Vec<WireFlower>,
    #[serde(
        default,
        alias = "processingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<WireScalar>,
}

/// String-or-number field, rendered to text on normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireScalar {
    Text(String),
    Number(f64),
}

impl std::fmt::Display for WireScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireScalar::Text(text) => f.write_str(text),
            WireScalar::Number(number) => write!(f, "{number}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFlower {
    #[serde(alias = "box", alias = "bounding_box")]
    pub bbox: WireBox,
    #[serde(default)]
    pub votes: Vec<WireVote>,
    #[serde(alias = "finalClass")]
    pub final_class: WireFinalClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireBox {
    /// `[x1, y1, x2, y2]` with an optional trailing confidence.
    Array(Vec<f64>),
    Corners {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireVote {
    #[serde(alias = "modelName")]
    pub model_name: String,
    #[serde(alias = "classId")]
    pub class_id: u32,
    #[serde(
        default,
        alias = "className",
        skip_serializing_if = "Option::is_none"
    )]
    pub class_name: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFinalClass {
    #[serde(alias = "className")]
    pub class_name: String,
    #[serde(alias = "classId")]
    pub class_id: u32,
    pub confidence: f64,
    #[serde(default, alias = "voteCount")]
    pub vote_count: u32,
}
