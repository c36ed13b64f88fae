use crate::audio::AudioBuffer;
use crate::decode::{parse_f32le_mono, target_rate_or_default, AudioDecoder, DecodeError, Result};
use ffmpeg_sidecar::{download, paths::ffmpeg_path};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;

/// Transcodes any container ffmpeg understands into mono `f32le` PCM.
#[derive(Clone, Debug)]
pub struct FfmpegAudioDecoder {
    sample_rate: u32,
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FfmpegAudioDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: target_rate_or_default(sample_rate),
        }
    }

    fn ensure_ffmpeg_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| DecodeError::FfmpegUnavailable(e.to_string()))
    }

    async fn decode_with_ffmpeg(&self, path: &Path) -> Result<Vec<f32>> {
        let rate = self.sample_rate.to_string();
        let output = tokio::process::Command::new(ffmpeg_path())
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(path)
            .args([
                "-vn", "-sn", "-dn", "-ac", "1", "-ar", rate.as_str(), "-f", "f32le", "-acodec",
                "pcm_f32le", "pipe:1",
            ])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr_s = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(DecodeError::FfmpegFailed(format!(
                "exit_code={:?} stderr={stderr_s}",
                output.status.code()
            )));
        }

        parse_f32le_mono(&output.stdout)
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioBuffer>> {
        async move {
            if !path.is_file() {
                return Err(DecodeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            }
            self.ensure_ffmpeg_available()?;
            let samples = self.decode_with_ffmpeg(path).await?;
            tracing::debug!(
                path = %path.display(),
                samples = samples.len(),
                sample_rate = self.sample_rate,
                "decoded with ffmpeg"
            );
            Ok(AudioBuffer::new(samples, self.sample_rate)?)
        }
        .boxed()
    }
}
