use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
}

/// Mono PCM samples at a fixed rate, immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawAudioBuffer")]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct RawAudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl TryFrom<RawAudioBuffer> for AudioBuffer {
    type Error = AudioError;

    fn try_from(raw: RawAudioBuffer) -> Result<Self, Self::Error> {
        Self::new(raw.samples, raw.sample_rate)
    }
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::ZeroSampleRate);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Exact length in seconds; no rounding is applied.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// `floor(t * sample_rate)` clamped into `[0, len]`. Negative and NaN times map to 0.
    pub fn index_at(&self, time_secs: f64) -> usize {
        let raw = (time_secs * f64::from(self.sample_rate)).floor();
        if raw.is_nan() || raw <= 0.0 {
            return 0;
        }
        // `as` saturates for values beyond usize::MAX.
        (raw as usize).min(self.samples.len())
    }

    /// Samples between two times. A reversed range yields an empty slice.
    pub fn slice(&self, start_secs: f64, end_secs: f64) -> &[f32] {
        let start = self.index_at(start_secs);
        let end = self.index_at(end_secs);
        if start >= end {
            return &[];
        }
        &self.samples[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(len: usize) -> AudioBuffer {
        AudioBuffer::new((0..len).map(|i| i as f32).collect(), 16_000).unwrap()
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        assert_eq!(
            AudioBuffer::new(vec![0.0; 4], 0).unwrap_err(),
            AudioError::ZeroSampleRate
        );
    }

    #[test]
    fn deserializing_checks_sample_rate() {
        let err = serde_json::from_str::<AudioBuffer>(r#"{"samples":[],"sample_rate":0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("sample rate must be > 0 Hz"));

        let buf: AudioBuffer =
            serde_json::from_str(r#"{"samples":[0.5,0.25],"sample_rate":8000}"#).unwrap();
        assert_eq!(buf.samples(), &[0.5, 0.25]);
        assert_eq!(buf.duration_secs(), 2.0 / 8_000.0);
        assert_eq!(serde_json::to_value(&buf).unwrap()["sample_rate"], 8_000);
    }

    #[test]
    fn index_at_floors_time() {
        let buf = buffer(32_000);
        assert_eq!(buf.index_at(0.5), 8_000);
        assert_eq!(buf.index_at(0.000_099), 1);
        assert_eq!(buf.index_at(1.999_99), 31_999);
    }

    #[test]
    fn index_at_clamps_out_of_range() {
        let buf = buffer(16_000);
        assert_eq!(buf.index_at(-3.0), 0);
        assert_eq!(buf.index_at(f64::NAN), 0);
        assert_eq!(buf.index_at(10.0), 16_000);
        assert_eq!(buf.index_at(f64::INFINITY), 16_000);
    }

    #[test]
    fn slice_matches_sample_positions() {
        let buf = buffer(16_000);
        let s = buf.slice(0.25, 0.5);
        assert_eq!(s.len(), 4_000);
        assert_eq!(s[0], 4_000.0);
    }

    #[test]
    fn reversed_or_degenerate_range_is_empty() {
        let buf = buffer(16_000);
        assert!(buf.slice(0.5, 0.25).is_empty());
        assert!(buf.slice(0.0, 0.0).is_empty());
        assert!(buf.slice(2.0, 3.0).is_empty());
    }

    #[test]
    fn duration_is_exact() {
        let buf = buffer(24_000);
        assert_eq!(buf.duration_secs(), 1.5);
        let odd = buffer(16_001);
        assert_eq!(odd.duration_secs(), 16_001.0 / 16_000.0);
    }
}
