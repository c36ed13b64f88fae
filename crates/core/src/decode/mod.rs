#[cfg(feature = "ffmpeg-sidecar")]
mod ffmpeg;
mod native;

use crate::audio::{AudioBuffer, AudioError};
use crate::config::DEFAULT_SAMPLE_RATE;
use futures::future::BoxFuture;
use futures::FutureExt;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "ffmpeg-sidecar")]
pub use ffmpeg::FfmpegAudioDecoder;
pub use native::SymphoniaAudioDecoder;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),

    #[error("cannot read audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported audio: {0}")]
    Unsupported(String),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Loads a whole audio file as mono f32 samples at a fixed rate.
pub trait AudioDecoder: Send + Sync {
    fn decode_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioBuffer>>;
}

/// Runtime-selected decoder.
#[derive(Clone)]
pub struct Decoder {
    inner: Arc<dyn AudioDecoder>,
}

impl Decoder {
    pub fn new(inner: Arc<dyn AudioDecoder>) -> Self {
        Self { inner }
    }
}

impl AudioDecoder for Decoder {
    fn decode_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioBuffer>> {
        async move { self.inner.decode_file(path).await }.boxed()
    }
}

pub(crate) fn target_rate_or_default(sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        DEFAULT_SAMPLE_RATE
    } else {
        sample_rate
    }
}

pub fn parse_f32le_mono(raw: &[u8]) -> Result<Vec<f32>> {
    if !raw.len().is_multiple_of(4usize) {
        return Err(DecodeError::InvalidPcm(format!(
            "f32le byte length must be multiple of 4, got {}",
            raw.len()
        )));
    }
    let mut out = Vec::with_capacity(raw.len() / 4);
    for chunk in raw.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

/// Averages interleaved frames down to one channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited sinc resampler. Content above the output Nyquist rate is filtered
/// out before decimation. The result is aligned with the input and holds
/// `len * to_hz / from_hz` samples (rounded).
pub fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Result<Vec<f32>> {
    if from_hz == to_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_hz == 0 || to_hz == 0 {
        return Err(DecodeError::Resample(format!("cannot resample {from_hz} Hz to {to_hz} Hz")));
    }

    let ratio = f64::from(to_hz) / f64::from(from_hz);
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let frames = resampler
            .process(&[chunk], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let frames = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }
    // Flush the filter tail so the delayed output covers the whole input.
    while out.len() < expected + delay {
        let frames = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}
