//! Session events.
//!
//! The engine reports what happens during a session through a bounded
//! channel so a consumer (the CLI logs them) can follow along without the
//! engine knowing who is listening. Events describe progress only; what the
//! participant sees goes through the participant itself.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::stage::Stage;

/// Default channel buffer size.
const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Why an answer was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The answer looked like a request for clarification.
    Confused,
    /// The answer was empty after trimming.
    Empty,
}

/// Events emitted by the storyteller during a session.
#[derive(Debug, Clone)]
pub enum Event {
    /// The session has started.
    Started,

    /// A stage is asking its question.
    StageStarted {
        /// The stage being asked.
        stage: Stage,
    },

    /// An answer was turned away and the stage will ask again.
    AnswerRejected {
        /// The stage that rejected the answer.
        stage: Stage,
        /// Why it was rejected.
        reason: Rejection,
        /// How many answers this stage has read so far.
        attempt: u32,
    },

    /// A stage accepted an answer.
    StageAccepted {
        /// The stage that finished.
        stage: Stage,
        /// The trimmed answer.
        value: String,
    },

    /// A story segment was generated and appended.
    SegmentGenerated {
        /// The stage whose answer triggered the segment.
        stage: Stage,
        /// Length of the new segment in characters.
        chars: usize,
    },

    /// The participant answered the feedback question.
    FeedbackReceived {
        /// Whether the answer was negative.
        negative: bool,
    },

    /// The whole story was regenerated and replaced.
    StoryRevised {
        /// Length of the new story in characters.
        chars: usize,
    },

    /// A failed generation call will be retried after a pause.
    RetryScheduled {
        /// Seconds to wait before retrying.
        backoff_secs: u64,
        /// Retry attempt number (1-indexed).
        attempt: u32,
        /// Retries allowed in total.
        max_retries: u32,
    },

    /// The session finished normally.
    Completed {
        /// Whether the story was revised.
        revised: bool,
    },

    /// The session was aborted by an error.
    Stopped {
        /// The error message.
        message: String,
    },
}

/// Sender for events.
pub type EventSender = mpsc::Sender<Event>;

/// Receiver for events.
pub type EventReceiver = mpsc::Receiver<Event>;

/// Create a new event channel with the default buffer size.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new event channel with a custom buffer size.
pub fn channel_with_size(size: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(size)
}

/// Send an event without waiting for buffer space.
///
/// Sessions have no upper bound on how many answers they read, so a
/// receiver that is never drained must not stall them. When the buffer is
/// full the event is dropped; when the receiver is gone it is ignored.
pub fn publish(tx: &EventSender, event: Event) {
    match tx.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(event)) => {
            tracing::debug!(?event, "event channel full, dropping event");
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Confused => write!(f, "confused"),
            Rejection::Empty => write!(f, "empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_creation() {
        let (tx, _rx) = channel();
        tx.try_send(Event::Started).unwrap();
    }

    #[test]
    fn test_channel_with_size_is_bounded() {
        let (tx, _rx) = channel_with_size(1);
        tx.try_send(Event::Started).unwrap();
        assert!(tx.try_send(Event::Started).is_err());
    }

    #[test]
    fn test_publish_drops_when_full() {
        let (tx, mut rx) = channel_with_size(2);
        for attempt in 1..=5 {
            publish(
                &tx,
                Event::AnswerRejected {
                    stage: Stage::Setting,
                    reason: Rejection::Empty,
                    attempt,
                },
            );
        }

        let mut kept = Vec::new();
        while let Ok(Event::AnswerRejected { attempt, .. }) = rx.try_recv() {
            kept.push(attempt);
        }
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn test_publish_ignores_closed_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        publish(&tx, Event::Started);
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(Rejection::Confused.to_string(), "confused");
        assert_eq!(Rejection::Empty.to_string(), "empty");
    }
}
