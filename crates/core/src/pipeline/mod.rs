use crate::analysis::{AnalysisResult, SegmentAligner};
use crate::asr::{AsrBackend, AsrError, TranscribeOptions};
use crate::config::{AnalysisConfig, AsrConfig};
use crate::decode::{AudioDecoder, DecodeError};
use crate::sink::{AnalysisSink, SinkError};
use std::path::Path;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("transcription failed: {0}")]
    Asr(#[from] AsrError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("analysis worker failed: {0}")]
    Worker(String),
}

#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub analysis: AnalysisConfig,
    pub asr: AsrConfig,
}

/// Offline analysis of one recording: decode, transcribe, then measure.
///
/// Decode and transcription failures abort the run. Everything after that is
/// best effort and always yields an [`AnalysisResult`].
pub struct AnalysisPipeline<D, A> {
    decoder: D,
    asr: A,
    aligner: SegmentAligner,
    options: TranscribeOptions,
    config: PipelineConfig,
}

impl<D, A> AnalysisPipeline<D, A>
where
    D: AudioDecoder,
    A: AsrBackend,
{
    pub fn new(decoder: D, asr: A, config: PipelineConfig) -> Self {
        Self {
            aligner: SegmentAligner::new(&config.analysis),
            options: TranscribeOptions::from_config(&config.asr),
            decoder,
            asr,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn analyze(&self, path: &Path) -> Result<AnalysisResult, PipelineError> {
        let started = Instant::now();

        let buffer = self.decoder.decode_file(path).await?;
        let decoded_at = Instant::now();
        tracing::info!(
            path = %path.display(),
            duration_sec = buffer.duration_secs(),
            elapsed_ms = (decoded_at - started).as_millis() as u64,
            "audio decoded"
        );

        let transcript = self
            .asr
            .transcribe(&buffer, &self.options)
            .await?
            .with_text_fallback();
        let transcribed_at = Instant::now();
        tracing::info!(
            segments = transcript.segments.len(),
            language = self.options.language.as_str(),
            elapsed_ms = (transcribed_at - decoded_at).as_millis() as u64,
            "transcription ready"
        );

        let aligner = self.aligner.clone();
        let result = tokio::task::spawn_blocking(move || aligner.analyze(&buffer, &transcript))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?;
        tracing::info!(
            segments = result.segments.len(),
            measured = result.measured_segments().count(),
            words = result.word_count(),
            elapsed_ms = transcribed_at.elapsed().as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "analysis finished"
        );
        Ok(result)
    }

    /// Runs [`analyze`](Self::analyze) and hands the result to `sink`.
    pub async fn analyze_into(
        &self,
        path: &Path,
        sink: &mut dyn AnalysisSink,
    ) -> Result<AnalysisResult, PipelineError> {
        let result = self.analyze(path).await?;
        sink.write(&result).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{Transcript, TranscriptSegment};
    use crate::audio::AudioBuffer;
    use crate::sink::WriterSink;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct ToneDecoder {
        seconds: usize,
    }

    impl AudioDecoder for ToneDecoder {
        fn decode_file<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, crate::decode::Result<AudioBuffer>> {
            async move {
                let sr = 16_000usize;
                let samples = (0..sr * self.seconds)
                    .map(|i| {
                        (2.0 * std::f32::consts::PI * 200.0 * i as f32 / sr as f32).sin() * 0.5
                    })
                    .collect();
                Ok(AudioBuffer::new(samples, sr as u32)?)
            }
            .boxed()
        }
    }

    struct FailingDecoder;

    impl AudioDecoder for FailingDecoder {
        fn decode_file<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, crate::decode::Result<AudioBuffer>> {
            async move { Err(DecodeError::Unsupported("corrupt".into())) }.boxed()
        }
    }

    struct FixedAsr(Transcript);

    impl AsrBackend for FixedAsr {
        fn transcribe<'a>(
            &'a self,
            _audio: &'a AudioBuffer,
            _options: &'a TranscribeOptions,
        ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
            async move { Ok(self.0.clone()) }.boxed()
        }
    }

    struct FailingAsr;

    impl AsrBackend for FailingAsr {
        fn transcribe<'a>(
            &'a self,
            _audio: &'a AudioBuffer,
            _options: &'a TranscribeOptions,
        ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
            async move { Err(AsrError::Inference("model crashed".into())) }.boxed()
        }
    }

    fn transcript() -> Transcript {
        Transcript {
            text: String::new(),
            segments: vec![
                TranscriptSegment {
                    id: 0,
                    text: " one two ".into(),
                    start: 0.0,
                    end: 1.0,
                    words: None,
                },
                TranscriptSegment {
                    id: 1,
                    text: "three".into(),
                    start: 1.5,
                    end: 1.5,
                    words: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn analyzes_and_fills_missing_text() {
        let pipeline = AnalysisPipeline::new(
            ToneDecoder { seconds: 2 },
            FixedAsr(transcript()),
            PipelineConfig::default(),
        );
        let result = pipeline.analyze(Path::new("talk.wav")).await.unwrap();

        assert_eq!(result.text, "one two three");
        assert_eq!(result.duration, 2.0);
        assert_eq!(result.segments.len(), 2);
        let m = result.segments[0].metrics.unwrap();
        assert_eq!(m.rate_wpm, 120.0);
        assert!(result.segments[1].metrics.is_none());
    }

    #[tokio::test]
    async fn decode_failure_is_fatal() {
        let pipeline = AnalysisPipeline::new(
            FailingDecoder,
            FixedAsr(transcript()),
            PipelineConfig::default(),
        );
        let err = pipeline.analyze(Path::new("x.wav")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[tokio::test]
    async fn asr_failure_is_fatal() {
        let pipeline = AnalysisPipeline::new(
            ToneDecoder { seconds: 1 },
            FailingAsr,
            PipelineConfig::default(),
        );
        let err = pipeline.analyze(Path::new("x.wav")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Asr(AsrError::Inference(_))));
    }

    #[tokio::test]
    async fn analyze_into_writes_sink() {
        let pipeline = AnalysisPipeline::new(
            ToneDecoder { seconds: 2 },
            FixedAsr(transcript()),
            PipelineConfig::default(),
        );
        let mut sink = WriterSink::new(Vec::new());
        pipeline
            .analyze_into(Path::new("talk.wav"), &mut sink)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(json["segments"][1]["metrics"], serde_json::json!({}));
        assert!(json["segments"][0]["metrics"]["dB"].is_number());
    }
}
