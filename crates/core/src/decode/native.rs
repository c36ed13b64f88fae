use crate::audio::AudioBuffer;
use crate::decode::{
    downmix_to_mono, resample, target_rate_or_default, AudioDecoder, DecodeError, Result,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// In-process decoder for wav, flac, ogg/vorbis and mp3. Does not need ffmpeg.
#[derive(Clone, Debug)]
pub struct SymphoniaAudioDecoder {
    sample_rate: u32,
}

impl Default for SymphoniaAudioDecoder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SymphoniaAudioDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: target_rate_or_default(sample_rate),
        }
    }

    fn decode_blocking(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::Unsupported("no audio track".to_owned()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let source_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::Unsupported("unknown sample rate".to_owned()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let mut mono = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    mono.extend(downmix_to_mono(buf.samples(), spec.channels.count()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(error = %e, "skipping undecodable packet");
                }
                Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
            }
        }

        let samples = resample(&mono, source_rate, target_rate)?;
        Ok(AudioBuffer::new(samples, target_rate)?)
    }
}

impl AudioDecoder for SymphoniaAudioDecoder {
    fn decode_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioBuffer>> {
        async move {
            let owned = path.to_path_buf();
            let rate = self.sample_rate;
            let buffer = tokio::task::spawn_blocking(move || Self::decode_blocking(&owned, rate))
                .await
                .map_err(|e| DecodeError::Unsupported(format!("decode worker failed: {e}")))??;
            tracing::debug!(
                path = %path.display(),
                samples = buffer.len(),
                sample_rate = buffer.sample_rate(),
                "decoded with symphonia"
            );
            Ok(buffer)
        }
        .boxed()
    }
}
