use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Local identifier of a queued image, assigned by the pipeline in enqueue order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display(fmt = "task-{}", _0)]
pub struct TaskId(pub u64);

/// Backend-issued identifier used to poll an asynchronous detection task.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::From,
)]
#[display(fmt = "{}", _0)]
pub struct TaskHandle(pub String);

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle of one image in the batch queue. Transitions only move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskState {
    Queued,
    Submitting,
    Pending,
    Polling,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Whether the task still occupies the pipeline (submission slot or poll loop).
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TaskState::Submitting | TaskState::Pending | TaskState::Polling
        )
    }

    pub fn can_advance_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match self {
            Queued => next == Submitting,
            Submitting => matches!(next, Pending | Polling | Completed | Failed),
            Pending => matches!(next, Polling | Completed | Failed),
            Polling => matches!(next, Completed | Failed),
            Completed | Failed => false,
        }
    }
}

/// Status reported by the backend for an asynchronous task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

/// Client-side adjustments applied before submission.
///
/// `brightness` and `contrast` range over `0..=200` with 100 meaning unchanged,
/// `grayscale` over `0..=100` with 0 meaning no desaturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingParams {
    pub brightness: u16,
    pub contrast: u16,
    pub grayscale: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamViolation {
    pub name: &'static str,
    pub value: u16,
    pub max: u16,
}

impl ProcessingParams {
    pub const MAX_BRIGHTNESS: u16 = 200;
    pub const MAX_CONTRAST: u16 = 200;
    pub const MAX_GRAYSCALE: u16 = 100;

    pub fn new(brightness: u16, contrast: u16, grayscale: u16) -> Self {
        Self {
            brightness,
            contrast,
            grayscale,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// First parameter lying outside its allowed range, if any.
    pub fn out_of_range(&self) -> Option<ParamViolation> {
        [
            ("brightness", self.brightness, Self::MAX_BRIGHTNESS),
            ("contrast", self.contrast, Self::MAX_CONTRAST),
            ("grayscale", self.grayscale, Self::MAX_GRAYSCALE),
        ]
        .into_iter()
        .find(|(_, value, max)| value > max)
        .map(|(name, value, max)| ParamViolation { name, value, max })
    }
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self::new(100, 100, 0)
    }
}

/// Axis-aligned detection rectangle in the original image's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub model_name: String,
    pub class_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub confidence: f64,
}

/// Ensemble decision for one detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalClass {
    pub class_name: String,
    pub class_id: u32,
    pub confidence: f64,
    pub vote_count: u32,
}

/// Encoded image buffer produced locally (pre-processed upload, crop, overlay).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowerDetection {
    pub bbox: BoundingBox,
    pub votes: Vec<VoteRecord>,
    pub final_class: FinalClass,
    /// Display-only crop of `bbox` taken from the original image. Never sent or persisted.
    #[serde(skip)]
    pub crop_image: Option<EncodedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_size: [u32; 2],
    pub flowers: Vec<FlowerDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl AnalysisResult {
    pub fn width(&self) -> u32 {
        self.image_size[0]
    }

    pub fn height(&self) -> u32 {
        self.image_size[1]
    }

    pub fn crop_count(&self) -> usize {
        self.flowers
            .iter()
            .filter(|flower| flower.crop_image.is_some())
            .count()
    }

    /// Copy of the result with every derived crop dropped, as handed to storage.
    pub fn without_crops(&self) -> Self {
        let mut result = self.clone();
        for flower in &mut result.flowers {
            flower.crop_image = None;
        }
        result
    }
}

/// Persisted outcome of one completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub image_url: String,
    pub source_name: String,
    pub queued_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

impl HistoryRecord {
    pub fn new(
        image_url: String,
        source_name: String,
        queued_at: DateTime<Utc>,
        result: &AnalysisResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: Utc::now(),
            image_url,
            source_name,
            queued_at,
            result: result.without_crops(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn detection() -> FlowerDetection {
        FlowerDetection {
            bbox: BoundingBox::new(1.0, 2.0, 11.0, 22.0).with_confidence(0.8),
            votes: vec![VoteRecord {
                model_name: "yolo".into(),
                class_id: 3,
                class_name: Some("rose".into()),
                confidence: 0.8,
            }],
            final_class: FinalClass {
                class_name: "rose".into(),
                class_id: 3,
                confidence: 0.8,
                vote_count: 1,
            },
            crop_image: Some(EncodedImage {
                mime: "image/png".into(),
                width: 10,
                height: 20,
                bytes: vec![1, 2, 3],
            }),
        }
    }

    #[test]
    fn task_state_only_moves_forward() {
        assert!(TaskState::Queued.can_advance_to(TaskState::Submitting));
        assert!(TaskState::Submitting.can_advance_to(TaskState::Polling));
        assert!(TaskState::Submitting.can_advance_to(TaskState::Completed));
        assert!(TaskState::Polling.can_advance_to(TaskState::Failed));
        assert!(!TaskState::Polling.can_advance_to(TaskState::Submitting));
        assert!(!TaskState::Completed.can_advance_to(TaskState::Failed));
        assert!(!TaskState::Queued.can_advance_to(TaskState::Completed));
    }

    #[test]
    fn status_names_match_wire_format() {
        assert_eq!(TaskState::Submitting.to_string(), "submitting");
        assert_eq!(RemoteStatus::from_str("processing").unwrap(), RemoteStatus::Processing);
        assert_eq!(TaskId(7).to_string(), "task-7");
        assert_eq!(TaskHandle::from("42").to_string(), "42");
    }

    #[test]
    fn params_report_first_out_of_range_value() {
        assert!(ProcessingParams::default().is_identity());
        assert_eq!(ProcessingParams::new(200, 0, 100).out_of_range(), None);
        let violation = ProcessingParams::new(100, 201, 101).out_of_range().unwrap();
        assert_eq!(violation.name, "contrast");
        assert_eq!(violation.value, 201);
    }

    #[test]
    fn crops_are_never_serialized() {
        let result = AnalysisResult {
            image_size: [100, 100],
            flowers: vec![detection()],
            processing_time: Some(0.5),
            timestamp: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("crop_image"));
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result.without_crops());
    }

    #[test]
    fn history_record_drops_crops() {
        let result = AnalysisResult {
            image_size: [100, 100],
            flowers: vec![detection()],
            processing_time: None,
            timestamp: None,
        };
        assert_eq!(result.crop_count(), 1);
        let record = HistoryRecord::new("blob:1".into(), "a.jpg".into(), Utc::now(), &result);
        assert_eq!(record.result.crop_count(), 0);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"imageUrl\""));
    }

    #[test]
    fn data_url_is_base64() {
        let image = EncodedImage {
            mime: "image/png".into(),
            width: 1,
            height: 1,
            bytes: b"hi".to_vec(),
        };
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGk=");
    }
}
