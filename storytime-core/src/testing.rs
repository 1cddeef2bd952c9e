//! Test doubles for the two collaborators.
//!
//! [`ScriptedParticipant`] answers from a fixed list and records everything
//! said to it. [`RecordingGenerator`] returns canned text, can be told to
//! fail, and records every call.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, GenerationErrorKind, Result};
use crate::generator::StoryGenerator;
use crate::participant::Participant;
use crate::prompt::Persona;

/// One exchange recorded by a [`ScriptedParticipant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// A line said to the participant.
    Said(String),
    /// A question asked of the participant.
    Asked(String),
    /// The answer given.
    Answered(String),
}

/// Participant that replies with pre-written answers.
///
/// Once the answers run out, `ask` fails with `Error::InputClosed`.
#[derive(Debug, Default)]
pub struct ScriptedParticipant {
    answers: VecDeque<String>,
    transcript: Vec<Exchange>,
}

impl ScriptedParticipant {
    /// Create a participant that will give `answers` in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Everything said, asked and answered, in order.
    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// Lines said to the participant.
    pub fn said(&self) -> Vec<&str> {
        self.transcript
            .iter()
            .filter_map(|e| match e {
                Exchange::Said(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Questions asked of the participant.
    pub fn asked(&self) -> Vec<&str> {
        self.transcript
            .iter()
            .filter_map(|e| match e {
                Exchange::Asked(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Answers not yet given.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[async_trait]
impl Participant for ScriptedParticipant {
    async fn say(&mut self, text: &str) -> Result<()> {
        self.transcript.push(Exchange::Said(text.to_string()));
        Ok(())
    }

    async fn ask(&mut self, question: &str) -> Result<String> {
        self.transcript.push(Exchange::Asked(question.to_string()));
        let answer = self.answers.pop_front().ok_or(Error::InputClosed)?;
        self.transcript.push(Exchange::Answered(answer.clone()));
        Ok(answer)
    }
}

/// A call received by a [`RecordingGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    /// Which operation was called.
    pub persona: Persona,
    /// Story so far, for segment calls.
    pub prior: Option<String>,
    /// The instruction prompt.
    pub instruction: String,
}

#[derive(Debug)]
enum Reply {
    Text(String),
    Fail(GenerationErrorKind),
}

/// Generator that returns canned text and records its calls.
///
/// Queued replies are used first; after that segment calls return
/// `"Segment N."` and full story calls `"A whole new story N."`, where `N`
/// counts all calls so far.
#[derive(Debug, Default)]
pub struct RecordingGenerator {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<GenerationCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingGenerator {
    /// Create a generator with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue text for the next call.
    pub fn push_text(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Reply::Text(text.into()));
    }

    /// Queue a failure for the next call.
    pub fn fail_next(&self, kind: GenerationErrorKind) {
        lock(&self.replies).push_back(Reply::Fail(kind));
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<GenerationCall> {
        lock(&self.calls).clone()
    }

    /// Calls made through `generate_segment`.
    pub fn segment_calls(&self) -> Vec<GenerationCall> {
        self.calls_with(Persona::Segment)
    }

    /// Calls made through `generate_full_story`.
    pub fn full_story_calls(&self) -> Vec<GenerationCall> {
        self.calls_with(Persona::Complete)
    }

    fn calls_with(&self, persona: Persona) -> Vec<GenerationCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.persona == persona)
            .cloned()
            .collect()
    }

    fn record(&self, persona: Persona, prior: Option<&str>, instruction: &str) -> Result<String> {
        let number = {
            let mut calls = lock(&self.calls);
            calls.push(GenerationCall {
                persona,
                prior: prior.map(str::to_string),
                instruction: instruction.to_string(),
            });
            calls.len()
        };

        match lock(&self.replies).pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(kind)) => Err(Error::generation(kind, "scripted failure")),
            None => Ok(match persona {
                Persona::Segment => format!("Segment {}.", number),
                Persona::Complete => format!("A whole new story {}.", number),
            }),
        }
    }
}

#[async_trait]
impl StoryGenerator for RecordingGenerator {
    async fn generate_segment(&self, prior: Option<&str>, instruction: &str) -> Result<String> {
        self.record(Persona::Segment, prior, instruction)
    }

    async fn generate_full_story(&self, instruction: &str) -> Result<String> {
        self.record(Persona::Complete, None, instruction)
    }
}
