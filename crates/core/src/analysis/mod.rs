mod aligner;
mod features;
mod frames;
mod loudness;
mod metrics;
mod pitch;
mod report;

pub use aligner::{analyze_transcript, SegmentAligner};
pub use features::{FeatureExtractor, SignalFeatures};
pub use loudness::{frame_rms, mean_relative_db};
pub use metrics::{
    pause_ratio, prosody_score, rate_wpm, round_to, word_count, SegmentMetrics, WordMetrics,
};
pub use pitch::{PitchStats, PitchTracker};
pub use report::{AnalysisResult, SegmentReport, WordReport};
