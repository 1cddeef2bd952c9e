//! The boundary to the text generation service.
//!
//! [`StoryGenerator`] has two named operations: continuing a story with a
//! short segment, and writing a complete story. [`OpenAiGenerator`] talks to
//! an OpenAI-compatible chat completions endpoint; [`RetryingGenerator`]
//! wraps any generator with exponential backoff so the stage machine never
//! has to know about retries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, GenerationErrorKind, Result};
use crate::event::{self, Event, EventSender};
use crate::prompt::{self, Persona};

/// Produces story prose from prompts.
///
/// Implementations keep no memory between calls: every piece of context the
/// text depends on is passed in.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Continue a story. `prior` is the story so far, given as read-only
    /// context that must not be repeated.
    async fn generate_segment(&self, prior: Option<&str>, instruction: &str) -> Result<String>;

    /// Write a complete, standalone story.
    async fn generate_full_story(&self, instruction: &str) -> Result<String>;
}

/// One logical request to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Which storyteller voice to use.
    pub persona: Persona,
    /// Story so far, for segment requests.
    pub prior_context: Option<String>,
    /// What to write.
    pub instruction: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl GenerationRequest {
    /// A request for a story continuation.
    pub fn segment(prior: Option<&str>, instruction: &str, temperature: f32) -> Self {
        Self {
            persona: Persona::Segment,
            prior_context: prior.map(str::to_string),
            instruction: instruction.to_string(),
            temperature,
        }
    }

    /// A request for a complete story.
    pub fn complete(instruction: &str, temperature: f32) -> Self {
        Self {
            persona: Persona::Complete,
            prior_context: None,
            instruction: instruction.to_string(),
            temperature,
        }
    }

    /// The user message: the instruction, wrapped with prior context if any.
    pub fn user_prompt(&self) -> String {
        prompt::with_prior_context(self.prior_context.as_deref(), &self.instruction)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Generator backed by an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiGenerator {
    /// Create a generator from the session configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingApiKey` without a key, or `Error::ConfigError`
    /// if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config_error(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// The chat completions URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and return the trimmed text of the first choice.
    pub async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let user_prompt = request.user_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.persona.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: request.temperature,
        };

        let result = self.send(&body).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => tracing::info!(
                model = %self.model,
                persona = ?request.persona,
                duration_ms,
                chars = text.chars().count(),
                "story text generated"
            ),
            Err(e) => tracing::error!(
                model = %self.model,
                persona = ?request.persona,
                duration_ms,
                error = %e,
                "story generation failed"
            ),
        }
        result
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::generation(GenerationErrorKind::Timeout, format!("request timed out: {}", e))
                } else {
                    Error::generation(GenerationErrorKind::Network, format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::generation(
                GenerationErrorKind::Network,
                format!("failed to read response: {}", e),
            )
        })?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        parse_response(&text)
    }
}

#[async_trait]
impl StoryGenerator for OpenAiGenerator {
    async fn generate_segment(&self, prior: Option<&str>, instruction: &str) -> Result<String> {
        self.complete(&GenerationRequest::segment(prior, instruction, self.temperature))
            .await
    }

    async fn generate_full_story(&self, instruction: &str) -> Result<String> {
        self.complete(&GenerationRequest::complete(instruction, self.temperature))
            .await
    }
}

/// Map a non-success HTTP status to a generation error.
fn status_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    let kind = match status.as_u16() {
        401 | 403 => GenerationErrorKind::Auth,
        408 => GenerationErrorKind::Timeout,
        429 => GenerationErrorKind::RateLimit,
        500..=599 => GenerationErrorKind::ServerError,
        _ => GenerationErrorKind::InvalidRequest,
    };
    Error::generation(kind, format!("HTTP {}: {}", status, message))
}

/// Extract the story text from a chat completions response body.
fn parse_response(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        Error::generation(
            GenerationErrorKind::MalformedResponse,
            format!("failed to parse response: {}", e),
        )
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| {
            Error::generation(
                GenerationErrorKind::MalformedResponse,
                "response contained no story text",
            )
        })
}

/// Calculate exponential backoff in seconds for a 1-indexed retry attempt.
fn calculate_backoff(attempt: u32, initial_backoff_secs: u64, multiplier: f64) -> u64 {
    let backoff = initial_backoff_secs as f64 * multiplier.powi(attempt.saturating_sub(1) as i32);
    backoff as u64
}

/// Decorator that retries retryable generation failures with backoff.
#[derive(Debug)]
pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
    initial_backoff_secs: u64,
    backoff_multiplier: f64,
    events: Option<EventSender>,
}

impl<G: StoryGenerator> RetryingGenerator<G> {
    /// Wrap `inner` using the retry policy from `config`.
    pub fn new(inner: G, config: &Config) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            initial_backoff_secs: config.initial_backoff_secs,
            backoff_multiplier: config.backoff_multiplier,
            events: None,
        }
    }

    /// Report scheduled retries on the given event channel.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The wrapped generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn with_retries<F, Fut>(&self, operation: F) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<String>> + Send,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_secs =
                        calculate_backoff(attempt, self.initial_backoff_secs, self.backoff_multiplier);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_secs,
                        "retrying story generation"
                    );
                    if let Some(events) = &self.events {
                        event::publish(
                            events,
                            Event::RetryScheduled {
                                backoff_secs,
                                attempt,
                                max_retries: self.max_retries,
                            },
                        );
                    }
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<G: StoryGenerator> StoryGenerator for RetryingGenerator<G> {
    async fn generate_segment(&self, prior: Option<&str>, instruction: &str) -> Result<String> {
        self.with_retries(|| self.inner.generate_segment(prior, instruction))
            .await
    }

    async fn generate_full_story(&self, instruction: &str) -> Result<String> {
        self.with_retries(|| self.inner.generate_full_story(instruction))
            .await
    }
}
