use crate::analysis::round_to;
use crate::feedback::{Feedback, FeedbackError, FeedbackGenerator, OutlineSection, ScriptOutline};
use crate::summary::SpeechSummary;
use futures::future::BoxFuture;
use futures::FutureExt;

const LOW_PITCH_HZ: f64 = 100.0;
const HIGH_PITCH_HZ: f64 = 250.0;
const SLOW_RATE_WPM: f64 = 120.0;
const FAST_RATE_WPM: f64 = 160.0;
const QUIET_DB: f64 = -30.0;
const LONG_PAUSE_RATIO: f64 = 0.3;
const TITLE_WORDS: usize = 6;

/// Offline feedback from fixed threshold bands. Used when no coaching
/// service is configured.
#[derive(Clone, Debug, Default)]
pub struct RuleBasedFeedback;

impl RuleBasedFeedback {
    pub fn new() -> Self {
        Self
    }

    pub fn feedback_for(&self, s: &SpeechSummary) -> Feedback {
        let pitch_hz = round_to(s.mean_pitch_hz, 1);
        let pitch = if s.mean_pitch_hz <= 0.0 {
            "No voiced speech was detected, so pitch could not be measured.".to_owned()
        } else if s.mean_pitch_hz < LOW_PITCH_HZ {
            format!(
                "Your average pitch of {pitch_hz} Hz is low. Lift your voice on key words to keep it lively."
            )
        } else if s.mean_pitch_hz > HIGH_PITCH_HZ {
            format!(
                "Your average pitch of {pitch_hz} Hz is high. Settle into a lower register to sound calmer."
            )
        } else {
            format!("Your average pitch of {pitch_hz} Hz sits in a comfortable range.")
        };

        let wpm = round_to(s.mean_rate_wpm, 1);
        let rate = if s.mean_rate_wpm < SLOW_RATE_WPM {
            format!("At {wpm} words per minute you are speaking slowly. Try tightening long gaps.")
        } else if s.mean_rate_wpm > FAST_RATE_WPM {
            format!(
                "At {wpm} words per minute you are speaking quickly. Slow down at important points."
            )
        } else {
            format!("At {wpm} words per minute your pace is easy to follow.")
        };

        let db = round_to(s.mean_db, 1);
        let volume = if s.mean_db < QUIET_DB {
            format!(
                "Average loudness of {db} dB below your peaks means many quiet stretches. Project more evenly."
            )
        } else {
            format!("Average loudness of {db} dB below your peaks shows a steady volume.")
        };

        let pauses = if s.mean_pause_ratio > LONG_PAUSE_RATIO {
            "Silences take up a large share of the recording."
        } else {
            "Pauses are well balanced."
        };
        let overall = format!(
            "Prosody score {} across {} measured segment(s). {pauses}",
            round_to(s.mean_prosody_score, 2),
            s.measured_segments
        );

        Feedback {
            overall,
            pitch,
            rate,
            volume,
        }
    }

    /// A single body section holding the whole script.
    pub fn outline_for(&self, script: &str) -> ScriptOutline {
        let content = script.trim();
        let title = content
            .split_whitespace()
            .take(TITLE_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        let sections = if content.is_empty() {
            Vec::new()
        } else {
            vec![OutlineSection {
                id: 1,
                part: "body".to_owned(),
                content: content.to_owned(),
            }]
        };
        ScriptOutline { title, sections }
    }
}

impl FeedbackGenerator for RuleBasedFeedback {
    fn coach<'a>(
        &'a self,
        summary: &'a SpeechSummary,
    ) -> BoxFuture<'a, Result<Feedback, FeedbackError>> {
        async move { Ok(self.feedback_for(summary)) }.boxed()
    }

    fn outline<'a>(
        &'a self,
        script: &'a str,
    ) -> BoxFuture<'a, Result<ScriptOutline, FeedbackError>> {
        async move { Ok(self.outline_for(script)) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(pitch: f64, rate: f64, db: f64, pause: f64) -> SpeechSummary {
        SpeechSummary {
            mean_db: db,
            mean_pitch_hz: pitch,
            mean_rate_wpm: rate,
            mean_pause_ratio: pause,
            mean_prosody_score: pitch * (1.0 - pause),
            duration_sec: 10.0,
            segments: 2,
            measured_segments: 2,
            words: 20,
        }
    }

    #[test]
    fn bands_select_matching_advice() {
        let fb = RuleBasedFeedback::new().feedback_for(&summary(80.0, 200.0, -40.0, 0.5));
        assert!(fb.pitch.contains("is low"));
        assert!(fb.rate.contains("quickly"));
        assert!(fb.volume.contains("quiet stretches"));
        assert!(fb.overall.contains("large share"));

        let fb = RuleBasedFeedback::new().feedback_for(&summary(180.0, 140.0, -10.0, 0.1));
        assert!(fb.pitch.contains("comfortable"));
        assert!(fb.rate.contains("easy to follow"));
        assert!(fb.volume.contains("steady"));
        assert!(fb.overall.contains("balanced"));
    }

    #[test]
    fn unvoiced_speech_is_called_out() {
        let fb = RuleBasedFeedback::new().feedback_for(&summary(0.0, 60.0, 0.0, 1.0));
        assert!(fb.pitch.contains("No voiced speech"));
        assert!(fb.rate.contains("slowly"));
    }

    #[test]
    fn outline_keeps_whole_script() {
        let outline = RuleBasedFeedback::new()
            .outline_for("  Good morning everyone. Today we talk about rust and audio.  ");
        assert_eq!(outline.title, "Good morning everyone. Today we talk");
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].part, "body");
        assert_eq!(
            outline.sections[0].content,
            "Good morning everyone. Today we talk about rust and audio."
        );
        assert!(RuleBasedFeedback::new().outline_for("   ").sections.is_empty());
    }

    #[tokio::test]
    async fn generator_trait_never_fails() {
        let gen = RuleBasedFeedback::new();
        assert!(gen.coach(&summary(150.0, 130.0, -5.0, 0.0)).await.is_ok());
        assert!(gen.outline("hello").await.is_ok());
    }
}
