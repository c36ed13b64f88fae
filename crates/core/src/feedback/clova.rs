use crate::config::FeedbackConfig;
use crate::feedback::{
    parse_feedback_answer, parse_outline_answer, Feedback, FeedbackError, FeedbackGenerator,
    ScriptOutline, COACH_SYSTEM_PROMPT, OUTLINE_SYSTEM_PROMPT,
};
use crate::summary::SpeechSummary;
use crate::util::{is_http_retryable, retry_with_backoff, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REQUEST_ID_HEADER: &str = "X-NCP-CLOVASTUDIO-REQUEST-ID";
const COACH_MAX_TOKENS: u32 = 256;
const OUTLINE_MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat-completion client for the CLOVA Studio API.
#[derive(Clone)]
pub struct ClovaFeedbackClient {
    client: Client,
    endpoint: Url,
    authorization: String,
    request_id: String,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    top_p: f64,
    top_k: u32,
    max_tokens: u32,
    temperature: f64,
    repeat_penalty: f64,
    stop_before: [&'static str; 0],
    include_ai_filters: bool,
}

impl<'a> ChatRequest<'a> {
    fn new(system: &'a str, user: &'a str, max_tokens: u32) -> Self {
        Self {
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            top_p: 0.8,
            top_k: 0,
            max_tokens,
            temperature: 0.5,
            repeat_penalty: 1.1,
            stop_before: [],
            include_ai_filters: true,
        }
    }
}

#[derive(Deserialize)]
struct StreamEvent {
    message: StreamMessage,
}

#[derive(Deserialize)]
struct StreamMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Extracts the final assistant message from a server-sent event body.
///
/// `data:[DONE]` ends the stream. Every `data:` payload carrying an
/// assistant message replaces the answer so far, and payloads that are
/// not JSON events are ignored.
pub fn parse_event_stream(body: &str) -> Option<String> {
    let mut answer = None;
    for line in body.lines() {
        let Some(payload) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            break;
        }
        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) if event.message.role == "assistant" => answer = Some(event.message.content),
            Ok(_) => {}
            Err(e) => tracing::trace!(error = %e, "skipping undecodable event payload"),
        }
    }
    answer
}

impl ClovaFeedbackClient {
    pub fn new(config: &FeedbackConfig) -> Result<Self, FeedbackError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or(FeedbackError::MissingApiKey)?;
        let key = api_key.expose();
        let authorization = if key.starts_with("Bearer ") {
            key.to_owned()
        } else {
            format!("Bearer {key}")
        };
        let request_id = config
            .request_id
            .clone()
            .unwrap_or_else(|| format!("{:032x}", rand::random::<u128>()));
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.host, &config.model)?,
            authorization,
            request_id,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> Result<String, FeedbackError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.authorization.as_str())
            .header(REQUEST_ID_HEADER, self.request_id.as_str())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FeedbackError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, FeedbackError> {
        let request = ChatRequest::new(system, user, max_tokens);
        let started = std::time::Instant::now();
        let body =
            retry_with_backoff(&self.retry, || self.send_once(&request), is_retryable).await?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "chat completion finished"
        );
        parse_event_stream(&body).ok_or(FeedbackError::EmptyAnswer)
    }
}

fn is_retryable(err: &FeedbackError) -> bool {
    match err {
        FeedbackError::Status { status, .. } => is_http_retryable(*status),
        FeedbackError::Network(_) => true,
        _ => false,
    }
}

fn chat_endpoint(host: &Url, model: &str) -> Result<Url, FeedbackError> {
    let mut url = host.clone();
    url.path_segments_mut()
        .map_err(|_| FeedbackError::InvalidEndpoint(host.to_string()))?
        .pop_if_empty()
        .extend(["v3", "chat-completions", model]);
    Ok(url)
}

impl FeedbackGenerator for ClovaFeedbackClient {
    fn coach<'a>(
        &'a self,
        summary: &'a SpeechSummary,
    ) -> BoxFuture<'a, Result<Feedback, FeedbackError>> {
        async move {
            let answer = self
                .complete(COACH_SYSTEM_PROMPT, &summary.prompt_lines(), COACH_MAX_TOKENS)
                .await?;
            parse_feedback_answer(&answer)
        }
        .boxed()
    }

    fn outline<'a>(
        &'a self,
        script: &'a str,
    ) -> BoxFuture<'a, Result<ScriptOutline, FeedbackError>> {
        async move {
            let answer = self
                .complete(OUTLINE_SYSTEM_PROMPT, script, OUTLINE_MAX_TOKENS)
                .await?;
            parse_outline_answer(&answer)
        }
        .boxed()
    }
}
