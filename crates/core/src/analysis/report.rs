use crate::analysis::metrics::{SegmentMetrics, WordMetrics};
use serde::{Deserialize, Serialize};

/// The analysis document handed to storage and feedback collaborators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub text: String,
    pub segments: Vec<SegmentReport>,
    /// Length of the full buffer in seconds.
    pub duration: f64,
}

impl AnalysisResult {
    pub fn measured_segments(&self) -> impl Iterator<Item = (&SegmentReport, &SegmentMetrics)> {
        self.segments
            .iter()
            .filter_map(|s| s.metrics.as_ref().map(|m| (s, m)))
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentReport {
    pub id: u32,
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// `None` when the segment's audio range is empty; serialized as `{}`.
    #[serde(with = "metrics_slot")]
    pub metrics: Option<SegmentMetrics>,
    pub words: Vec<WordReport>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WordReport {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub metrics: WordMetrics,
}

mod metrics_slot {
    use super::SegmentMetrics;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Measured(SegmentMetrics),
        Empty {},
    }

    pub fn serialize<S: Serializer>(
        value: &Option<SegmentMetrics>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(metrics) => metrics.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SegmentMetrics>, D::Error> {
        Ok(match Slot::deserialize(deserializer)? {
            Slot::Measured(metrics) => Some(metrics),
            Slot::Empty {} => None,
        })
    }
}
