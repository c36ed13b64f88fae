mod clova;
mod rules;

use crate::summary::SpeechSummary;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use clova::{parse_event_stream, ClovaFeedbackClient};
pub use rules::RuleBasedFeedback;

/// Sections kept from a model-produced outline.
pub const MAX_OUTLINE_SECTIONS: usize = 6;

pub const COACH_SYSTEM_PROMPT: &str = "\
You are a speaking coach. You receive measurements of a recorded speech and give short, \
concrete advice.\n\
Answer with a JSON array only, no markdown and no extra text, in exactly this shape:\n\
[{\"type\": \"overall\", \"answer\": \"one or two sentences about the whole delivery\"}, \
{\"type\": \"detail\", \"answer\": {\"pitch\": \"...\", \"rate\": \"...\", \"volume\": \"...\"}}]\n\
Guidance: pitch around 100-250 Hz is typical, speaking rate around 120-160 words per minute \
is comfortable, a pause ratio above 0.3 means long silences. Mention numbers when helpful.";

pub const OUTLINE_SYSTEM_PROMPT: &str = "\
You split a presentation script into an outline for rehearsal.\n\
Answer with a JSON object only, no markdown and no extra text, in exactly this shape:\n\
{\"title\": \"...\", \"sections\": [{\"id\": 1, \"part\": \"introduction\", \"content\": \"...\"}]}\n\
Use at most 6 sections. `part` is one of introduction, body, conclusion. \
`content` quotes the script text of that section.";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub overall: String,
    pub pitch: String,
    pub rate: String,
    pub volume: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutlineSection {
    pub id: u32,
    pub part: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptOutline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(thiserror::Error, Debug)]
pub enum FeedbackError {
    #[error("feedback api key is not configured")]
    MissingApiKey,

    #[error("invalid feedback endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("feedback service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("feedback service returned no assistant message")]
    EmptyAnswer,

    #[error("unparseable feedback answer: {0}")]
    InvalidAnswer(String),

    #[error("no measured speech to give feedback on")]
    NothingMeasured,
}

pub trait FeedbackGenerator: Send + Sync {
    fn coach<'a>(&'a self, summary: &'a SpeechSummary)
        -> BoxFuture<'a, Result<Feedback, FeedbackError>>;

    fn outline<'a>(&'a self, script: &'a str)
        -> BoxFuture<'a, Result<ScriptOutline, FeedbackError>>;
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "answer", rename_all = "lowercase")]
enum AnswerItem {
    Overall(String),
    Detail(DetailAnswer),
}

#[derive(Deserialize)]
struct DetailAnswer {
    #[serde(default)]
    pitch: String,
    #[serde(default)]
    rate: String,
    #[serde(default)]
    volume: String,
}

/// Models sometimes wrap JSON in a markdown fence despite being told not to.
fn strip_code_fence(answer: &str) -> &str {
    let trimmed = answer.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses the `[{"type":"overall",..},{"type":"detail",..}]` coaching answer.
pub fn parse_feedback_answer(answer: &str) -> Result<Feedback, FeedbackError> {
    let items: Vec<AnswerItem> = serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| FeedbackError::InvalidAnswer(e.to_string()))?;

    let mut overall = None;
    let mut detail = None;
    for item in items {
        match item {
            AnswerItem::Overall(text) => overall = Some(text),
            AnswerItem::Detail(d) => detail = Some(d),
        }
    }
    match (overall, detail) {
        (Some(overall), Some(d)) => Ok(Feedback {
            overall,
            pitch: d.pitch,
            rate: d.rate,
            volume: d.volume,
        }),
        (None, _) => Err(FeedbackError::InvalidAnswer("missing overall item".into())),
        (_, None) => Err(FeedbackError::InvalidAnswer("missing detail item".into())),
    }
}

/// Parses an outline answer and keeps the first [`MAX_OUTLINE_SECTIONS`] sections.
pub fn parse_outline_answer(answer: &str) -> Result<ScriptOutline, FeedbackError> {
    let mut outline: ScriptOutline = serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| FeedbackError::InvalidAnswer(e.to_string()))?;
    outline.sections.truncate(MAX_OUTLINE_SECTIONS);
    Ok(outline)
}
