//! Storytime CLI - An interactive bedtime story teller.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use storytime_core::{
    channel, Config, Event, EventReceiver, MarkerTable, OpenAiGenerator, Outcome,
    RetryingGenerator, StoryContext, Storyteller, TerminalParticipant,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Storytime - Build a bedtime story together, one answer at a time.
///
/// Storytime asks for a main character, a setting, a special ability, a plot
/// turn and an ending, and has a language model write the story as you go.
/// If you did not enjoy it, it writes a whole new version.
#[derive(Parser, Debug)]
#[command(name = "storytime")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API key for the generation service.
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(
        long = "base-url",
        default_value = "https://api.openai.com/v1",
        env = "STORYTIME_BASE_URL"
    )]
    pub base_url: String,

    /// Chat model used to write the story.
    #[arg(
        short = 'm',
        long = "model",
        default_value = "gpt-3.5-turbo",
        env = "STORYTIME_MODEL"
    )]
    pub model: String,

    /// Delay in milliseconds between printed characters.
    ///
    /// Use 0 to print whole lines at once.
    #[arg(short = 'd', long = "delay-ms", default_value = "30")]
    pub delay_ms: u64,

    /// Maximum answers per question before giving up.
    ///
    /// Without this, every question is asked until it gets a usable answer.
    #[arg(long = "max-attempts")]
    pub max_attempts: Option<u32>,

    /// Retries for a failed generation request.
    ///
    /// Only transient failures (network, timeouts, rate limits, server
    /// errors) are retried, with exponential backoff.
    #[arg(long = "max-retries", default_value = "0")]
    pub max_retries: u32,

    /// Timeout in seconds for each generation request.
    #[arg(long = "request-timeout", default_value = "120")]
    pub request_timeout: u64,

    /// Path to a JSON file overriding the answer phrase lists.
    ///
    /// Keys are `confusion`, `negative` and `approval`; missing keys keep
    /// their built-in lists.
    #[arg(long = "markers")]
    pub markers: Option<PathBuf>,

    /// Enable verbose logging on stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Convert CLI arguments to a Config.
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::new()
            .base_url(&self.base_url)
            .model(&self.model)
            .print_delay_ms(self.delay_ms)
            .max_retries(self.max_retries)
            .request_timeout_secs(self.request_timeout);

        if let Some(ref key) = self.api_key {
            config = config.api_key(key);
        }

        if let Some(max) = self.max_attempts {
            config = config.max_stage_attempts(max);
        }

        if let Some(ref path) = self.markers {
            config = config.markers(MarkerTable::load(path)?);
        }

        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Log session events until every sender is gone.
async fn log_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::Started => tracing::debug!("session started"),
            Event::StageStarted { stage } => tracing::debug!(%stage, "asking"),
            Event::AnswerRejected {
                stage,
                reason,
                attempt,
            } => tracing::debug!(%stage, %reason, attempt, "answer rejected"),
            Event::StageAccepted { stage, value } => tracing::debug!(%stage, %value, "answer accepted"),
            Event::SegmentGenerated { stage, chars } => {
                tracing::debug!(%stage, chars, "segment generated")
            }
            Event::FeedbackReceived { negative } => tracing::debug!(negative, "feedback"),
            Event::StoryRevised { chars } => tracing::debug!(chars, "story revised"),
            Event::RetryScheduled {
                backoff_secs,
                attempt,
                max_retries,
            } => tracing::warn!(
                attempt,
                max_retries,
                "generation failed, retrying in {}s",
                backoff_secs
            ),
            Event::Completed { revised } => tracing::debug!(revised, "session completed"),
            Event::Stopped { message } => tracing::warn!(%message, "session stopped"),
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let config = cli.to_config()?;
    config.validate()?;

    let (tx, rx) = channel();
    let logger = tokio::spawn(log_events(rx));

    let generator = RetryingGenerator::new(OpenAiGenerator::new(&config)?, &config)
        .with_events(tx.clone());
    let mut participant = TerminalParticipant::stdio(config.print_delay);
    let teller = Storyteller::with_events(config, Arc::new(generator), tx);

    let mut ctx = StoryContext::new();
    let result = teller.run(&mut ctx, &mut participant).await;

    // Dropping the storyteller closes the channel so the logger can finish.
    drop(teller);
    let _ = logger.await;

    result.context("the story could not be finished")
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(outcome) => {
            tracing::debug!(revised = outcome.is_revised(), "exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if matches!(
                e.downcast_ref::<storytime_core::Error>(),
                Some(storytime_core::Error::MissingApiKey)
            ) {
                eprintln!("Set OPENAI_API_KEY (or put it in .env), or pass --api-key.");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["storytime"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_to_config_applies_flags() {
        let cli = parse(&[
            "--api-key",
            "sk-test",
            "--base-url",
            "http://localhost:8080/v1",
            "--model",
            "tiny",
            "--delay-ms",
            "0",
            "--max-attempts",
            "4",
            "--max-retries",
            "2",
            "--request-timeout",
            "10",
        ]);
        let config = cli.to_config().unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "tiny");
        assert!(config.print_delay.is_zero());
        assert_eq!(config.max_stage_attempts, Some(4));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_attempts_unbounded_without_flag() {
        let cli = parse(&["--api-key", "sk-test"]);
        let config = cli.to_config().unwrap();
        assert_eq!(config.max_stage_attempts, None);
        assert_eq!(config.print_delay, std::time::Duration::from_millis(30));
    }

    #[test]
    fn test_missing_markers_file_is_an_error() {
        let cli = parse(&["--markers", "/nonexistent/storytime-markers.json"]);
        let err = cli.to_config().unwrap_err();
        assert!(err.to_string().contains("storytime-markers.json"));
    }

    #[test]
    fn test_markers_file_overrides_lists() {
        let path = std::env::temp_dir().join(format!(
            "storytime_cli_markers_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"approval": ["sure"]}"#).unwrap();

        let cli = parse(&["--markers", path.to_str().unwrap()]);
        let config = cli.to_config().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.markers.approval, vec!["sure".to_string()]);
        assert!(!config.markers.negative.is_empty());
    }
}
