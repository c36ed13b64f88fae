//! Monophonic fundamental-frequency tracking.
//!
//! Each frame is scored with the cumulative-mean-normalised difference
//! function (YIN). Instead of a single absolute threshold, the trough search
//! runs against a ladder of thresholds weighted by a Beta(2, 18) prior; the
//! weight of the thresholds that find a trough is the frame's voicing
//! probability. Frames below [`VOICED_PROBABILITY`] report no pitch.

use crate::analysis::frames::CenteredFrames;
use crate::config::PitchRange;

const THRESHOLD_STEPS: usize = 100;
const BETA_A: f64 = 2.0;
const BETA_B: f64 = 18.0;
pub const VOICED_PROBABILITY: f64 = 0.25;
/// Frames with RMS below this never carry pitch.
const MIN_FRAME_RMS: f64 = 1e-5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PitchStats {
    pub mean_hz: f64,
    pub std_hz: f64,
    pub voiced_frames: usize,
}

impl PitchStats {
    /// Mean and population standard deviation over voiced frames.
    /// A track with no voiced frame yields zeros.
    pub fn from_track(track: &[Option<f64>]) -> Self {
        let voiced: Vec<f64> = track.iter().flatten().copied().filter(|f| f.is_finite()).collect();
        if voiced.is_empty() {
            return Self::default();
        }
        let n = voiced.len() as f64;
        let mean = voiced.iter().sum::<f64>() / n;
        let var = voiced.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n;
        Self {
            mean_hz: mean,
            std_hz: var.sqrt(),
            voiced_frames: voiced.len(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PitchTracker {
    range: PitchRange,
    frame_length: usize,
    hop_length: usize,
    thresholds: Vec<(f64, f64)>,
}

impl PitchTracker {
    pub fn new(range: PitchRange, frame_length: usize, hop_length: usize) -> Self {
        Self {
            range,
            frame_length: frame_length.max(4),
            hop_length: hop_length.max(1),
            thresholds: beta_thresholds(),
        }
    }

    /// Per-frame pitch in Hz; `None` marks an unvoiced frame.
    pub fn track(&self, samples: &[f32], sample_rate: u32) -> Vec<Option<f64>> {
        let sr = f64::from(sample_rate);
        let win_length = self.frame_length / 2;
        let min_lag = ((sr / self.range.fmax_hz).floor() as usize).max(1);
        let max_lag = ((sr / self.range.fmin_hz).ceil() as usize)
            .min(self.frame_length.saturating_sub(win_length + 1));

        let frames = CenteredFrames::new(samples, self.frame_length, self.hop_length);
        if max_lag < min_lag.saturating_add(2) {
            return vec![None; frames.count()];
        }

        let mut diff = vec![0.0f64; max_lag + 1];
        let mut cmnd = vec![1.0f64; max_lag + 1];
        frames
            .iter()
            .map(|frame| {
                let analysed = &frame[..win_length + max_lag];
                if rms(analysed) < MIN_FRAME_RMS {
                    return None;
                }
                difference(frame, win_length, &mut diff);
                normalise(&diff, &mut cmnd);
                self.estimate(&cmnd, min_lag, max_lag, sr)
            })
            .collect()
    }

    pub fn stats(&self, samples: &[f32], sample_rate: u32) -> PitchStats {
        PitchStats::from_track(&self.track(samples, sample_rate))
    }

    fn estimate(&self, cmnd: &[f64], min_lag: usize, max_lag: usize, sr: f64) -> Option<f64> {
        // Accumulated threshold weight per candidate lag.
        let mut votes: Vec<(usize, f64)> = Vec::new();
        let mut voiced_prob = 0.0;
        for &(threshold, weight) in &self.thresholds {
            if let Some(lag) = first_trough(cmnd, min_lag, max_lag, threshold) {
                voiced_prob += weight;
                match votes.iter_mut().find(|(l, _)| *l == lag) {
                    Some((_, w)) => *w += weight,
                    None => votes.push((lag, weight)),
                }
            }
        }
        if voiced_prob < VOICED_PROBABILITY {
            return None;
        }

        let (lag, _) = votes
            .into_iter()
            .fold(None::<(usize, f64)>, |best, cand| match best {
                Some(b) if b.1 >= cand.1 => Some(b),
                _ => Some(cand),
            })?;

        let period = lag as f64 + parabolic_shift(cmnd, lag);
        if period <= 0.0 {
            return None;
        }
        let hz = sr / period;
        (hz.is_finite() && hz >= self.range.fmin_hz && hz <= self.range.fmax_hz).then_some(hz)
    }
}

/// Threshold ladder over (0, 1] with Beta(2, 18) weights summing to one.
fn beta_thresholds() -> Vec<(f64, f64)> {
    let points: Vec<f64> = (1..=THRESHOLD_STEPS)
        .map(|i| i as f64 / THRESHOLD_STEPS as f64)
        .collect();
    let densities: Vec<f64> = points
        .iter()
        .map(|&t| t.powf(BETA_A - 1.0) * (1.0 - t).powf(BETA_B - 1.0))
        .collect();
    let total: f64 = densities.iter().sum();
    points
        .into_iter()
        .zip(densities)
        .map(|(t, d)| (t, d / total))
        .collect()
}

fn rms(x: &[f32]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let sum: f64 = x.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    (sum / x.len() as f64).sqrt()
}

/// `d(tau) = sum_j (x[j] - x[j + tau])^2` over the integration window.
fn difference(frame: &[f32], win_length: usize, out: &mut [f64]) {
    for (tau, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for j in 0..win_length {
            let delta = f64::from(frame[j]) - f64::from(frame[j + tau]);
            acc += delta * delta;
        }
        *slot = acc;
    }
}

fn normalise(diff: &[f64], out: &mut [f64]) {
    out[0] = 1.0;
    let mut running = 0.0f64;
    for tau in 1..diff.len() {
        running += diff[tau];
        out[tau] = if running > 0.0 {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }
}

/// First lag whose normalised difference dips below `threshold`, walked
/// forward to the bottom of that dip.
fn first_trough(cmnd: &[f64], min_lag: usize, max_lag: usize, threshold: f64) -> Option<usize> {
    let mut tau = min_lag;
    while tau <= max_lag {
        if cmnd[tau] < threshold {
            while tau < max_lag && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

fn parabolic_shift(cmnd: &[f64], lag: usize) -> f64 {
    if lag == 0 || lag + 1 >= cmnd.len() {
        return 0.0;
    }
    let (a, b, c) = (cmnd[lag - 1], cmnd[lag], cmnd[lag + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f64, secs: f64, sr: u32, amp: f32) -> Vec<f32> {
        let n = (secs * f64::from(sr)) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / f64::from(sr);
                amp * (2.0 * std::f64::consts::PI * freq * t).sin() as f32
            })
            .collect()
    }

    fn tracker() -> PitchTracker {
        PitchTracker::new(PitchRange::default(), 2048, 512)
    }

    #[test]
    fn degenerate_range_yields_unvoiced_frames() {
        let samples = sine(220.0, 0.5, 16_000, 0.5);
        for (fmin_hz, fmax_hz) in [(0.0, 0.0), (f64::NAN, f64::NAN), (400.0, 100.0)] {
            let tracker = PitchTracker::new(PitchRange { fmin_hz, fmax_hz }, 2048, 512);
            let track = tracker.track(&samples, 16_000);
            assert_eq!(track.len(), 16);
            assert!(track.iter().all(Option::is_none), "{fmin_hz}..{fmax_hz}");
        }
    }

    #[test]
    fn beta_weights_sum_to_one() {
        let total: f64 = beta_thresholds().iter().map(|(_, w)| w).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn sine_pitch_is_recovered() {
        for freq in [110.0, 220.0, 440.0] {
            let stats = tracker().stats(&sine(freq, 1.0, 16_000, 0.5), 16_000);
            assert!(stats.voiced_frames > 0, "{freq} Hz had no voiced frames");
            assert_abs_diff_eq!(stats.mean_hz, freq, epsilon = freq * 0.02);
        }
    }

    #[test]
    fn steady_tone_has_small_spread() {
        let stats = tracker().stats(&sine(200.0, 1.0, 16_000, 0.5), 16_000);
        assert!(stats.std_hz < 5.0, "std={}", stats.std_hz);
    }

    #[test]
    fn silence_is_unvoiced() {
        let track = tracker().track(&[0.0; 32_000], 16_000);
        assert_eq!(track.len(), 63);
        assert!(track.iter().all(Option::is_none));
        assert_eq!(PitchStats::from_track(&track), PitchStats::default());
    }

    #[test]
    fn very_short_input_does_not_panic() {
        let track = tracker().track(&[0.3, -0.3, 0.2], 16_000);
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn empty_track_stats_are_zero() {
        let stats = PitchStats::from_track(&[]);
        assert_eq!(stats.mean_hz, 0.0);
        assert_eq!(stats.std_hz, 0.0);
    }

    #[test]
    fn stats_use_population_std() {
        let stats = PitchStats::from_track(&[Some(100.0), None, Some(200.0)]);
        assert_eq!(stats.mean_hz, 150.0);
        assert_eq!(stats.std_hz, 50.0);
        assert_eq!(stats.voiced_frames, 2);
    }

    #[test]
    fn tracking_is_deterministic() {
        let samples = sine(180.0, 0.5, 16_000, 0.4);
        let a = tracker().track(&samples, 16_000);
        let b = tracker().track(&samples, 16_000);
        assert_eq!(a, b);
    }
}
