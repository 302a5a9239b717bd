mod model;
mod wire;

pub use model::{
    AnalysisResult, BoundingBox, EncodedImage, FinalClass, FlowerDetection, HistoryRecord,
    ParamViolation, ProcessingParams, RemoteStatus, TaskHandle, TaskId, TaskState, VoteRecord,
};
pub use wire::{
    SubmitResponse, WireAnalysis, WireBox, WireFinalClass, WireFlower, WireScalar, WireTaskId,
    WireTaskStatus, WireVote,
};
