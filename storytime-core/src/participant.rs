//! The person on the other side of the conversation.
//!
//! The engine only ever says lines and asks questions; [`Participant`]
//! hides whether that is a terminal, a test script or something else.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};

/// Hint printed right before reading an answer.
const ANSWER_HINT: &str = "(Tell me what you think): ";

/// Line-oriented conversation partner.
#[async_trait]
pub trait Participant: Send {
    /// Say one line to the participant.
    async fn say(&mut self, text: &str) -> Result<()>;

    /// Ask a question and wait for a one-line answer.
    ///
    /// The answer is returned untrimmed. Fails with `Error::InputClosed`
    /// once no more input can arrive.
    async fn ask(&mut self, question: &str) -> Result<String>;
}

/// A participant at a terminal, spoken to one character at a time.
pub struct TerminalParticipant<R, W> {
    reader: R,
    writer: W,
    delay: Duration,
}

impl TerminalParticipant<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// A participant on the process's stdin and stdout.
    pub fn stdio(delay: Duration) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), delay)
    }
}

impl<R, W> TerminalParticipant<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a participant over any line reader and writer.
    pub fn new(reader: R, writer: W, delay: Duration) -> Self {
        Self {
            reader,
            writer,
            delay,
        }
    }

    /// Consume the participant, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Write text a character at a time, pausing between characters.
    async fn write_paced(&mut self, text: &str) -> Result<()> {
        if self.delay.is_zero() {
            self.writer.write_all(text.as_bytes()).await?;
            self.writer.flush().await?;
            return Ok(());
        }

        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.writer
                .write_all(ch.encode_utf8(&mut buf).as_bytes())
                .await?;
            self.writer.flush().await?;
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl<R, W> Participant for TerminalParticipant<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn say(&mut self, text: &str) -> Result<()> {
        self.write_paced(text).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn ask(&mut self, question: &str) -> Result<String> {
        self.say(&format!("\n{} ", question)).await?;
        self.writer.write_all(ANSWER_HINT.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::InputClosed);
        }

        let answer = line.trim_end_matches(&['\n', '\r'][..]).to_string();
        tracing::trace!(answer = %answer, "participant answered");
        Ok(answer)
    }
}
