use crate::analysis::loudness::mean_relative_db;
use crate::analysis::pitch::PitchTracker;
use crate::config::AnalysisConfig;
use serde::{Deserialize, Serialize};

/// Raw signal features of one sub-clip. All values are finite.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SignalFeatures {
    pub db: f64,
    pub pitch_mean_hz: f64,
    pub pitch_std_hz: f64,
}

#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    pitch: PitchTracker,
    frame_length: usize,
    hop_length: usize,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            pitch: PitchTracker::new(config.pitch, config.frame_length, config.hop_length),
            frame_length: config.frame_length,
            hop_length: config.hop_length,
        }
    }

    /// Loudness and pitch statistics of `samples`, or `None` for an empty clip.
    ///
    /// Unvoiced or silent input yields a pitch of `0.0`; NaN and infinities
    /// are normalised to `0.0` before returning.
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Option<SignalFeatures> {
        if samples.is_empty() || sample_rate == 0 {
            return None;
        }
        let db = mean_relative_db(samples, self.frame_length, self.hop_length);
        let pitch = self.pitch.stats(samples, sample_rate);
        Some(SignalFeatures {
            db: finite_or_zero(db),
            pitch_mean_hz: finite_or_zero(pitch.mean_hz),
            pitch_std_hz: finite_or_zero(pitch.std_hz),
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, n: usize, sr: u32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                (0.3 * (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(sr)).sin()) as f32
            })
            .collect()
    }

    #[test]
    fn empty_clip_has_no_features() {
        assert!(FeatureExtractor::default().extract(&[], 16_000).is_none());
    }

    #[test]
    fn silent_clip_is_all_zero() {
        let f = FeatureExtractor::default()
            .extract(&[0.0; 32_000], 16_000)
            .unwrap();
        assert_eq!(f, SignalFeatures::default());
    }

    #[test]
    fn tone_has_pitch_and_nonpositive_level() {
        let f = FeatureExtractor::default()
            .extract(&tone(250.0, 16_000, 16_000), 16_000)
            .unwrap();
        assert!(f.db <= 0.0 && f.db.is_finite());
        assert!((f.pitch_mean_hz - 250.0).abs() < 5.0, "got {}", f.pitch_mean_hz);
    }

    #[test]
    fn extraction_is_bit_identical_across_calls() {
        let extractor = FeatureExtractor::default();
        let samples = tone(140.0, 8_000, 16_000);
        let a = extractor.extract(&samples, 16_000).unwrap();
        let b = extractor.extract(&samples, 16_000).unwrap();
        assert_eq!(a.db.to_bits(), b.db.to_bits());
        assert_eq!(a.pitch_mean_hz.to_bits(), b.pitch_mean_hz.to_bits());
        assert_eq!(a.pitch_std_hz.to_bits(), b.pitch_std_hz.to_bits());
    }

    #[test]
    fn finite_or_zero_strips_non_finite() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
        assert_eq!(finite_or_zero(-3.5), -3.5);
    }
}
