use crate::analysis::features::{finite_or_zero, SignalFeatures};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentMetrics {
    #[serde(rename = "dB")]
    pub db: f64,
    pub pitch_mean_hz: f64,
    pub rate_wpm: f64,
    pub pause_ratio: f64,
    pub prosody_score: f64,
}

impl SegmentMetrics {
    /// Folds extracted features together with the segment's text, timing and
    /// raw samples. `rate_wpm` and `pause_ratio` are left unrounded.
    pub fn aggregate(
        features: &SignalFeatures,
        samples: &[f32],
        text: &str,
        start: f64,
        end: f64,
        silence_threshold: f32,
    ) -> Self {
        let pitch_mean_hz = round_to(features.pitch_mean_hz, 2);
        let pause_ratio = pause_ratio(samples, silence_threshold);
        Self {
            db: round_to(features.db, 2),
            pitch_mean_hz,
            rate_wpm: rate_wpm(text, start, end),
            pause_ratio,
            prosody_score: prosody_score(pitch_mean_hz, pause_ratio),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WordMetrics {
    #[serde(rename = "dB")]
    pub db: f64,
    pub pitch_mean_hz: f64,
    pub pitch_std_hz: f64,
    pub duration_sec: f64,
}

impl WordMetrics {
    pub fn from_features(features: &SignalFeatures, start: f64, end: f64) -> Self {
        Self {
            db: round_to(features.db, 2),
            pitch_mean_hz: round_to(features.pitch_mean_hz, 2),
            pitch_std_hz: round_to(features.pitch_std_hz, 2),
            duration_sec: round_to(end - start, 3),
        }
    }
}

/// Number of whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Words per minute over the segment's nominal duration; 0 for non-positive durations.
pub fn rate_wpm(text: &str, start: f64, end: f64) -> f64 {
    let minutes = (end - start) / 60.0;
    if !(minutes > 0.0) {
        return 0.0;
    }
    finite_or_zero(word_count(text) as f64 / minutes)
}

/// Fraction of samples whose magnitude is below `threshold`, in `[0, 1]`.
pub fn pause_ratio(samples: &[f32], threshold: f32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let silent = samples.iter().filter(|s| s.abs() < threshold).count();
    silent as f64 / samples.len() as f64
}

/// Pitch discounted by the silent fraction, rounded to 2 decimals.
pub fn prosody_score(pitch_mean_hz: f64, pause_ratio: f64) -> f64 {
    round_to(pitch_mean_hz * (1.0 - pause_ratio), 2)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
