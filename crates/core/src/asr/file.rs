use crate::asr::{AsrBackend, AsrError, TranscribeOptions, Transcript};
use crate::audio::AudioBuffer;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;

/// Reads a transcript produced ahead of time by an external engine
/// (whisper-style JSON with `text` and `segments`).
#[derive(Clone, Debug)]
pub struct TranscriptFileBackend {
    path: PathBuf,
}

impl TranscriptFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(json: &str) -> Result<Transcript, AsrError> {
        let transcript: Transcript = serde_json::from_str(json)?;
        Ok(transcript.with_text_fallback())
    }
}

impl AsrBackend for TranscriptFileBackend {
    fn transcribe<'a>(
        &'a self,
        _audio: &'a AudioBuffer,
        options: &'a TranscribeOptions,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
        async move {
            let raw = tokio::fs::read_to_string(&self.path).await?;
            let mut transcript = Self::parse(&raw)?;
            if !options.word_timestamps {
                for segment in &mut transcript.segments {
                    segment.words = None;
                }
            }
            tracing::debug!(
                path = %self.path.display(),
                segments = transcript.segments.len(),
                "transcript loaded"
            );
            Ok(transcript)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "text": "hi there",
        "segments": [
            {"id": 0, "text": "hi there", "start": 0.0, "end": 2.0,
             "words": [{"word": "hi", "start": 0.0, "end": 1.0}]}
        ]
    }"#;

    fn silent() -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 16], 16_000).unwrap()
    }

    #[tokio::test]
    async fn reads_transcript_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let backend = TranscriptFileBackend::new(file.path());
        let t = backend
            .transcribe(&silent(), &TranscribeOptions::default())
            .await
            .unwrap();
        assert_eq!(t.text, "hi there");
        assert_eq!(t.segments[0].words().len(), 1);
    }

    #[tokio::test]
    async fn word_timestamps_can_be_disabled() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let options = TranscribeOptions {
            word_timestamps: false,
            ..TranscribeOptions::default()
        };
        let t = TranscriptFileBackend::new(file.path())
            .transcribe(&silent(), &options)
            .await
            .unwrap();
        assert!(t.segments[0].words.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let backend = TranscriptFileBackend::new("/nonexistent/transcript.json");
        let err = backend
            .transcribe(&silent(), &TranscribeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AsrError::Io(_)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = TranscriptFileBackend::parse("{\"segments\": 3}").unwrap_err();
        assert!(matches!(err, AsrError::InvalidTranscript(_)));
    }
}
