use crate::asr::{
    AsrBackend, AsrError, TranscribeOptions, Transcript, TranscriptSegment, TranscriptWord,
};
use crate::audio::AudioBuffer;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const WHISPER_SAMPLE_RATE: u32 = 16_000;
/// Whisper timestamps are in centiseconds.
const TICKS_PER_SECOND: f64 = 100.0;

/// Whisper model handle. The model is loaded once in [`WhisperAsrBackend::new`]
/// and shared by every transcription until the handle is dropped.
#[derive(Clone)]
pub struct WhisperAsrBackend {
    model_path: PathBuf,
    context: Arc<WhisperContext>,
}

impl WhisperAsrBackend {
    pub fn new(model_path: &Path) -> Result<Self, AsrError> {
        if !model_path.exists() {
            return Err(AsrError::ModelUnavailable(format!(
                "whisper model not found at: {}",
                model_path.display()
            )));
        }
        let path = model_path
            .to_str()
            .ok_or_else(|| AsrError::ModelUnavailable("model path is not valid utf-8".to_owned()))?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| AsrError::ModelUnavailable(format!("failed to load whisper model: {e}")))?;

        tracing::info!(model = %model_path.display(), "whisper model loaded");
        Ok(Self {
            model_path: model_path.to_path_buf(),
            context: Arc::new(context),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn run(
        context: &WhisperContext,
        samples: &[f32],
        options: &TranscribeOptions,
    ) -> Result<Transcript, AsrError> {
        let mut state = context
            .create_state()
            .map_err(|e| AsrError::Inference(format!("failed to create whisper state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(options.language.as_str()));
        params.set_translate(false);
        params.set_token_timestamps(options.word_timestamps);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(num_cpus().min(8) as i32);

        state
            .full(params, samples)
            .map_err(|e| AsrError::Inference(format!("whisper inference failed: {e}")))?;

        let mut segments = Vec::new();
        for seg_idx in 0..state.full_n_segments() {
            let Some(segment) = state.get_segment(seg_idx) else {
                continue;
            };
            let text = segment
                .to_str_lossy()
                .map_err(|e| AsrError::Inference(format!("segment text unavailable: {e}")))?
                .into_owned();

            let words = if options.word_timestamps {
                let mut builder = WordBuilder::default();
                for tok_idx in 0..segment.n_tokens() {
                    let Some(token) = segment.get_token(tok_idx) else {
                        continue;
                    };
                    let Ok(piece) = token.to_str() else {
                        continue;
                    };
                    // Special tokens look like [_BEG_] or <|endoftext|>.
                    let trimmed = piece.trim();
                    if trimmed.starts_with("[_") || trimmed.starts_with("<|") {
                        continue;
                    }
                    let data = token.token_data();
                    builder.push(
                        piece,
                        data.t0 as f64 / TICKS_PER_SECOND,
                        data.t1 as f64 / TICKS_PER_SECOND,
                    );
                }
                Some(builder.finish())
            } else {
                None
            };

            segments.push(TranscriptSegment {
                id: segments.len() as u32,
                text,
                start: segment.start_timestamp() as f64 / TICKS_PER_SECOND,
                end: segment.end_timestamp() as f64 / TICKS_PER_SECOND,
                words,
            });
        }

        Ok(Transcript {
            text: String::new(),
            segments,
        }
        .with_text_fallback())
    }
}

impl AsrBackend for WhisperAsrBackend {
    fn transcribe<'a>(
        &'a self,
        audio: &'a AudioBuffer,
        options: &'a TranscribeOptions,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
        async move {
            if audio.sample_rate() != WHISPER_SAMPLE_RATE {
                return Err(AsrError::UnsupportedFormat(format!(
                    "whisper expects {WHISPER_SAMPLE_RATE} Hz mono, got {} Hz",
                    audio.sample_rate()
                )));
            }

            let context = Arc::clone(&self.context);
            let samples = audio.samples().to_vec();
            let options = options.clone();
            tokio::task::spawn_blocking(move || Self::run(&context, &samples, &options))
                .await
                .map_err(|e| AsrError::Inference(format!("whisper worker failed: {e}")))?
        }
        .boxed()
    }
}

/// Joins sub-word tokens into words. A token with leading whitespace starts a new word.
#[derive(Default)]
struct WordBuilder {
    words: Vec<TranscriptWord>,
}

impl WordBuilder {
    fn push(&mut self, piece: &str, start: f64, end: f64) {
        let starts_word = piece.starts_with(char::is_whitespace);
        match self.words.last_mut() {
            Some(current) if !starts_word => {
                current.text.push_str(piece);
                current.end = current.end.max(end);
            }
            _ => {
                if piece.trim().is_empty() {
                    return;
                }
                self.words.push(TranscriptWord {
                    text: piece.to_owned(),
                    start,
                    end,
                });
            }
        }
    }

    fn finish(self) -> Vec<TranscriptWord> {
        self.words
            .into_iter()
            .filter(|w| !w.text.trim().is_empty() && w.end >= w.start)
            .collect()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
