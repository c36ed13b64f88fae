mod file;
#[cfg(feature = "whisper-rs")]
mod whisper;

use crate::audio::AudioBuffer;
use crate::config::{AsrConfig, Language};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use file::TranscriptFileBackend;
#[cfg(feature = "whisper-rs")]
pub use whisper::WhisperAsrBackend;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptWord {
    #[serde(alias = "word")]
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub id: u32,
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Absent when the engine ran without word timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<TranscriptWord>>,
}

impl TranscriptSegment {
    pub fn words(&self) -> &[TranscriptWord] {
        self.words.as_deref().unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Joins segment texts when the engine did not report a full text.
    pub fn with_text_fallback(mut self) -> Self {
        if self.text.trim().is_empty() {
            self.text = self
                .segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscribeOptions {
    pub language: Language,
    pub word_timestamps: bool,
}

impl TranscribeOptions {
    pub fn from_config(config: &AsrConfig) -> Self {
        Self {
            language: config.language.clone(),
            word_timestamps: config.word_timestamps,
        }
    }
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self::from_config(&AsrConfig::default())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("transcript io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid transcript json: {0}")]
    InvalidTranscript(#[from] serde_json::Error),

    #[error("asr model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("transcription failed: {0}")]
    Inference(String),
}

pub trait AsrBackend: Send + Sync {
    fn transcribe<'a>(
        &'a self,
        audio: &'a AudioBuffer,
        options: &'a TranscribeOptions,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>>;
}

impl<T: AsrBackend + ?Sized> AsrBackend for Arc<T> {
    fn transcribe<'a>(
        &'a self,
        audio: &'a AudioBuffer,
        options: &'a TranscribeOptions,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
        (**self).transcribe(audio, options)
    }
}
