use crate::analysis::features::FeatureExtractor;
use crate::analysis::metrics::{SegmentMetrics, WordMetrics};
use crate::analysis::report::{AnalysisResult, SegmentReport, WordReport};
use crate::asr::{Transcript, TranscriptSegment, TranscriptWord};
use crate::audio::AudioBuffer;
use crate::config::AnalysisConfig;
use rayon::prelude::*;

/// Maps transcript timing onto the audio buffer and measures every segment and word.
///
/// Degenerate ranges never fail the analysis: a segment whose slice is empty
/// keeps an empty metrics mapping, and a word whose slice is empty is dropped.
#[derive(Clone, Debug)]
pub struct SegmentAligner {
    extractor: FeatureExtractor,
    silence_threshold: f32,
    parallel: bool,
}

impl SegmentAligner {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config),
            silence_threshold: config.silence_threshold,
            parallel: config.parallel,
        }
    }

    pub fn analyze(&self, buffer: &AudioBuffer, transcript: &Transcript) -> AnalysisResult {
        AnalysisResult {
            text: transcript.text.clone(),
            segments: self.align_and_extract(buffer, &transcript.segments),
            duration: buffer.duration_secs(),
        }
    }

    /// One report per segment, in transcript order.
    pub fn align_and_extract(
        &self,
        buffer: &AudioBuffer,
        segments: &[TranscriptSegment],
    ) -> Vec<SegmentReport> {
        if self.parallel {
            segments
                .par_iter()
                .map(|seg| self.analyze_segment(buffer, seg))
                .collect()
        } else {
            segments
                .iter()
                .map(|seg| self.analyze_segment(buffer, seg))
                .collect()
        }
    }

    fn analyze_segment(&self, buffer: &AudioBuffer, seg: &TranscriptSegment) -> SegmentReport {
        let text = seg.text.trim();
        let samples = buffer.slice(seg.start, seg.end);

        let metrics = self
            .extractor
            .extract(samples, buffer.sample_rate())
            .map(|features| {
                SegmentMetrics::aggregate(
                    &features,
                    samples,
                    text,
                    seg.start,
                    seg.end,
                    self.silence_threshold,
                )
            });
        if metrics.is_none() {
            tracing::debug!(
                segment_id = seg.id,
                start = seg.start,
                end = seg.end,
                "empty audio range, segment metrics left empty"
            );
        }

        let words = seg
            .words()
            .iter()
            .filter_map(|w| self.analyze_word(buffer, seg.id, w))
            .collect();

        SegmentReport {
            id: seg.id,
            text: text.to_owned(),
            start: seg.start,
            end: seg.end,
            metrics,
            words,
        }
    }

    fn analyze_word(
        &self,
        buffer: &AudioBuffer,
        segment_id: u32,
        word: &TranscriptWord,
    ) -> Option<WordReport> {
        let samples = buffer.slice(word.start, word.end);
        let Some(features) = self.extractor.extract(samples, buffer.sample_rate()) else {
            tracing::debug!(
                segment_id,
                word = %word.text.trim(),
                start = word.start,
                end = word.end,
                "empty audio range, word dropped"
            );
            return None;
        };

        Some(WordReport {
            text: word.text.trim().to_owned(),
            start: word.start,
            end: word.end,
            metrics: WordMetrics::from_features(&features, word.start, word.end),
        })
    }
}

impl Default for SegmentAligner {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

/// One-shot analysis with the default configuration.
pub fn analyze_transcript(buffer: &AudioBuffer, transcript: &Transcript) -> AnalysisResult {
    SegmentAligner::default().analyze(buffer, transcript)
}
