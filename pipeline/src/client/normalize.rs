//! Conversion of raw backend payloads into checked model types.
//!
//! Every response goes through here, so the rest of the pipeline can rely on
//! boxes lying inside the image and confidences being probabilities.

use shared::{
    AnalysisResult, BoundingBox, FinalClass, FlowerDetection, RemoteStatus, SubmitResponse,
    TaskHandle, VoteRecord, WireAnalysis, WireBox, WireFinalClass, WireFlower, WireTaskStatus,
    WireVote,
};

use super::{RemoteTask, Submission};
use crate::error::{ClientError, ClientResult};

/// Parse the body of a successful `POST /flower/detect`.
pub fn parse_submission(body: &str) -> ClientResult<Submission> {
    let response: SubmitResponse = serde_json::from_str(body)
        .map_err(|err| ClientError::InvalidResponse(format!("detect response: {err}")))?;
    submission(response)
}

/// Parse the body of a successful `GET /flower/tasks/{id}`.
pub fn parse_task_status(body: &str) -> ClientResult<RemoteTask> {
    let status: WireTaskStatus = serde_json::from_str(body)
        .map_err(|err| ClientError::InvalidResponse(format!("task status response: {err}")))?;
    remote_task(status)
}

pub fn submission(response: SubmitResponse) -> ClientResult<Submission> {
    match response {
        SubmitResponse::Completed(analysis) => Ok(Submission::Completed(analysis_result(analysis)?)),
        SubmitResponse::Accepted { task_id } => {
            let handle = task_id.to_string();
            if handle.trim().is_empty() {
                return Err(invalid("empty task_id"));
            }
            Ok(Submission::Accepted(TaskHandle(handle)))
        }
    }
}

pub fn remote_task(status: WireTaskStatus) -> ClientResult<RemoteTask> {
    let result = status.result.map(analysis_result).transpose()?;
    if status.status == RemoteStatus::Completed && result.is_none() {
        return Err(invalid("task reported completed without a result"));
    }
    Ok(RemoteTask {
        status: status.status,
        result,
        error: status.error,
    })
}

pub fn analysis_result(wire: WireAnalysis) -> ClientResult<AnalysisResult> {
    let [width, height] = wire.image_size;
    if width == 0 || height == 0 {
        return Err(invalid(format!("image_size {width}x{height}")));
    }
    let flowers = wire
        .flowers
        .into_iter()
        .enumerate()
        .map(|(index, flower)| {
            detection(flower, width, height)
                .map_err(|reason| invalid(format!("flower {index}: {reason}")))
        })
        .collect::<ClientResult<Vec<_>>>()?;

    Ok(AnalysisResult {
        image_size: [width, height],
        flowers,
        processing_time: wire.processing_time,
        timestamp: wire.timestamp.map(|timestamp| timestamp.to_string()),
    })
}

fn detection(flower: WireFlower, width: u32, height: u32) -> Result<FlowerDetection, String> {
    let bbox = bounding_box(flower.bbox, width, height)?;
    let votes = flower
        .votes
        .into_iter()
        .map(vote)
        .collect::<Result<Vec<_>, _>>()?;
    let final_class = final_class(flower.final_class)?;
    if final_class.vote_count as usize > votes.len() {
        return Err(format!(
            "vote_count {} exceeds {} reported votes",
            final_class.vote_count,
            votes.len()
        ));
    }
    Ok(FlowerDetection {
        bbox,
        votes,
        final_class,
        crop_image: None,
    })
}

/// Accept either box encoding and clamp it into the image.
fn bounding_box(wire: WireBox, width: u32, height: u32) -> Result<BoundingBox, String> {
    let (x1, y1, x2, y2, confidence) = match wire {
        WireBox::Corners {
            x1,
            y1,
            x2,
            y2,
            confidence,
        } => (x1, y1, x2, y2, confidence),
        WireBox::Array(values) => match values[..] {
            [x1, y1, x2, y2] => (x1, y1, x2, y2, None),
            [x1, y1, x2, y2, confidence] => (x1, y1, x2, y2, Some(confidence)),
            _ => return Err(format!("bbox array has {} values", values.len())),
        },
    };
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return Err("bbox has non-finite coordinates".to_string());
    }
    if let Some(confidence) = confidence {
        check_probability("bbox confidence", confidence)?;
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let bbox = BoundingBox {
        x1: x1.clamp(0.0, w),
        y1: y1.clamp(0.0, h),
        x2: x2.clamp(0.0, w),
        y2: y2.clamp(0.0, h),
        confidence,
    };
    if !bbox.is_valid() {
        return Err(format!(
            "degenerate bbox ({x1}, {y1})-({x2}, {y2}) in {width}x{height} image"
        ));
    }
    Ok(bbox)
}

fn vote(wire: WireVote) -> Result<VoteRecord, String> {
    check_probability("vote confidence", wire.confidence)?;
    Ok(VoteRecord {
        model_name: wire.model_name,
        class_id: wire.class_id,
        class_name: wire.class_name,
        confidence: wire.confidence,
    })
}

fn final_class(wire: WireFinalClass) -> Result<FinalClass, String> {
    check_probability("final_class confidence", wire.confidence)?;
    Ok(FinalClass {
        class_name: wire.class_name,
        class_id: wire.class_id,
        confidence: wire.confidence,
        vote_count: wire.vote_count,
    })
}

fn check_probability(what: &str, value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{what} {value} outside [0, 1]"))
    }
}

fn invalid(reason: impl Into<String>) -> ClientError {
    ClientError::InvalidResponse(reason.into())
}
