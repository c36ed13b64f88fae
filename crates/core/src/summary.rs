use crate::analysis::{round_to, word_count, AnalysisResult, SegmentMetrics};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Whole-recording averages over the segments that carry metrics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeechSummary {
    pub mean_db: f64,
    pub mean_pitch_hz: f64,
    pub mean_rate_wpm: f64,
    pub mean_pause_ratio: f64,
    pub mean_prosody_score: f64,
    pub duration_sec: f64,
    pub segments: usize,
    pub measured_segments: usize,
    pub words: usize,
}

impl SpeechSummary {
    /// `None` when no segment could be measured.
    pub fn from_result(result: &AnalysisResult) -> Option<Self> {
        let measured: Vec<_> = result.measured_segments().map(|(_, m)| *m).collect();
        if measured.is_empty() {
            return None;
        }
        let n = measured.len() as f64;
        let mean = |f: fn(&SegmentMetrics) -> f64| measured.iter().map(f).sum::<f64>() / n;

        Some(Self {
            mean_db: mean(|m| m.db),
            mean_pitch_hz: mean(|m| m.pitch_mean_hz),
            mean_rate_wpm: mean(|m| m.rate_wpm),
            mean_pause_ratio: mean(|m| m.pause_ratio),
            mean_prosody_score: mean(|m| m.prosody_score),
            duration_sec: result.duration,
            segments: result.segments.len(),
            measured_segments: measured.len(),
            words: result.segments.iter().map(|s| word_count(&s.text)).sum(),
        })
    }

    /// The bullet list embedded in the coaching prompt.
    pub fn prompt_lines(&self) -> String {
        let mut out = String::from("[Speech data]\n");
        let _ = writeln!(out, "- Average pitch (Hz): {}", round_to(self.mean_pitch_hz, 1));
        let _ = writeln!(out, "- Speaking rate (words/min): {}", round_to(self.mean_rate_wpm, 1));
        let _ = writeln!(
            out,
            "- Average volume (dB, relative to peak): {}",
            round_to(self.mean_db, 1)
        );
        let _ = writeln!(out, "- Pause ratio: {}", round_to(self.mean_pause_ratio, 2));
        let _ = write!(out, "- Duration (s): {}", round_to(self.duration_sec, 1));
        out
    }
}
