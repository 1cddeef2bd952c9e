//! Storytime core library
//!
//! This crate runs an interactive bedtime-story conversation: it asks a child
//! for a character, a setting, a special ability, a plot turn and an ending,
//! and has a language model write the story one segment at a time. It covers
//! the conversation engine, answer classification, prompt construction, the
//! generation client, configuration and the event system.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod generator;
pub mod participant;
pub mod prompt;
pub mod stage;
pub mod story;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classifier::{Category, Classifier, MarkerTable, MatchMode, PhraseClassifier};
pub use config::Config;
pub use engine::{Outcome, Storyteller};
pub use error::{Error, GenerationErrorKind, Result};
pub use event::{channel, Event, EventReceiver, EventSender, Rejection};
pub use generator::{OpenAiGenerator, RetryingGenerator, StoryGenerator};
pub use participant::{Participant, TerminalParticipant};
pub use prompt::Persona;
pub use stage::{assess, Assessment, Stage};
pub use story::{StoryContext, StoryElements};
