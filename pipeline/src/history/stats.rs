use serde::Serialize;

use shared::HistoryRecord;

use crate::error::HistoryResult;

const BUCKET_LABELS: [&str; 5] = ["0-20%", "20-40%", "40-60%", "60-80%", "80-100%"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    pub range: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub name: String,
    pub value: usize,
}

/// Aggregate view over a set of history records.
///
/// Only detections with a positive bbox confidence contribute to the confidence
/// figures; every detection counts towards the class distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Mean bbox confidence in percent, `None` when no detection carries one.
    pub average_confidence: Option<f64>,
    pub confidence_distribution: Vec<ConfidenceBucket>,
    /// Classes in order of first appearance.
    pub class_distribution: Vec<ClassCount>,
    pub total_detections: usize,
}

impl HistoryStats {
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let mut buckets = [0usize; 5];
        let mut confidence_sum = 0.0;
        let mut scored = 0usize;
        let mut classes: Vec<ClassCount> = Vec::new();
        let mut total = 0;

        for flower in records.iter().flat_map(|record| &record.result.flowers) {
            total += 1;
            if let Some(confidence) = flower.bbox.confidence.filter(|c| *c > 0.0) {
                confidence_sum += confidence;
                scored += 1;
                let index = ((confidence * 100.0 / 20.0).floor() as usize).min(4);
                buckets[index] += 1;
            }

            let name = &flower.final_class.class_name;
            match classes.iter_mut().find(|class| &class.name == name) {
                Some(class) => class.value += 1,
                None => classes.push(ClassCount {
                    name: name.clone(),
                    value: 1,
                }),
            }
        }

        Self {
            average_confidence: (scored > 0).then(|| confidence_sum / scored as f64 * 100.0),
            confidence_distribution: BUCKET_LABELS
                .into_iter()
                .zip(buckets)
                .map(|(range, count)| ConfidenceBucket { range, count })
                .collect(),
            class_distribution: classes,
            total_detections: total,
        }
    }
}

#[derive(Serialize)]
struct ExportWithStats<'a> {
    records: &'a [HistoryRecord],
    statistics: HistoryStats,
}

/// Pretty-printed JSON export of `records`, optionally wrapped with their statistics.
pub fn export_json(records: &[HistoryRecord], include_stats: bool) -> HistoryResult<String> {
    let json = if include_stats {
        serde_json::to_string_pretty(&ExportWithStats {
            records,
            statistics: HistoryStats::from_records(records),
        })?
    } else {
        serde_json::to_string_pretty(records)?
    };
    Ok(json)
}
