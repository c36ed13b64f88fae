use crate::analysis::frames::CenteredFrames;

/// Amplitude floor applied before taking logarithms.
const AMPLITUDE_FLOOR: f64 = 1e-5;
/// Frames quieter than the loudest frame by more than this are clipped.
const TOP_DB: f64 = 80.0;

pub fn frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    CenteredFrames::new(samples, frame_length, hop_length)
        .iter()
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
            (sum / frame.len() as f64).sqrt()
        })
        .collect()
}

/// Mean frame level in dB relative to the loudest RMS frame of the same buffer.
///
/// Always finite: silence maps to 0.0 and quiet frames are floored at
/// `-TOP_DB` below the peak.
pub fn mean_relative_db(samples: &[f32], frame_length: usize, hop_length: usize) -> f64 {
    let rms = frame_rms(samples, frame_length, hop_length);
    if rms.is_empty() {
        return 0.0;
    }

    let reference = rms.iter().copied().fold(0.0f64, f64::max);
    let ref_db = amplitude_to_db(reference);
    let levels: Vec<f64> = rms.iter().map(|&r| amplitude_to_db(r) - ref_db).collect();

    let top = levels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let floor = top - TOP_DB;
    let mean = levels.iter().map(|&db| db.max(floor)).sum::<f64>() / levels.len() as f64;

    if mean.is_finite() {
        mean
    } else {
        0.0
    }
}

fn amplitude_to_db(amplitude: f64) -> f64 {
    let a = if amplitude.is_finite() {
        amplitude.max(AMPLITUDE_FLOOR)
    } else {
        AMPLITUDE_FLOOR
    };
    20.0 * a.log10()
}
