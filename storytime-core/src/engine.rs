//! The storytelling conversation.
//!
//! [`Storyteller`] walks a participant through a fixed sequence: character,
//! setting, ability, plot turn and ending. Each answer feeds the next
//! question and the next generated segment. After the story is told it asks
//! for feedback and, if the participant disliked it, regenerates the whole
//! story once.
//!
//! Every question loops until it gets a usable answer. There is no attempt
//! limit unless [`Config::max_stage_attempts`] sets one; a child can take as
//! many tries as they need. A generation failure is not recovered here: it
//! ends the session without the closing line. Retries belong in the
//! generator (see [`RetryingGenerator`](crate::generator::RetryingGenerator)).

use std::sync::Arc;

use crate::classifier::{Category, Classifier, PhraseClassifier};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{self, channel, Event, EventReceiver, EventSender, Rejection};
use crate::generator::StoryGenerator;
use crate::participant::Participant;
use crate::prompt;
use crate::stage::{assess, Assessment, Stage};
use crate::story::StoryContext;

const WELCOME: &str = "\n🌟 Welcome to Story Time! 🌟";
const THE_END: &str = "\n✨ The End ✨";
const CLOSING: &str = "\n🌙 Sweet dreams~ 🌙";

const FEEDBACK_QUESTION: &str = "Did you enjoy our story?";
const FEEDBACK_REPHRASED: &str = "Did you have fun hearing about this adventure?";
const ENJOYED: &str = "I'm so glad you did!";

const DISLIKE_QUESTION: &str = "Where did you not like the story? Tell me what part wasn't fun!";
const REVISION_INTRO: &str =
    "Thank you for telling me! Let me tell you a whole new version of the story...";
const PREFERENCE_QUESTION: &str = "Do you like this version better?";
const PREFERRED_REVISION: &str = "I'm so glad I could make the story more fun for you!";
const NOT_PREFERRED_REVISION: &str =
    "Thank you for helping me improve! I promise I will do better next time :)";

/// Name used for the feedback question in attempt errors.
const FEEDBACK_STEP: &str = "feedback";

/// How a completed session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The participant enjoyed the first telling (or did not say otherwise).
    Enjoyed,
    /// The participant disliked the story and heard a revised version.
    Revised {
        /// What they said they disliked.
        dislike: String,
        /// Whether they liked the revision better.
        preferred_revision: bool,
    },
}

impl Outcome {
    /// Whether the story was regenerated.
    pub fn is_revised(&self) -> bool {
        matches!(self, Outcome::Revised { .. })
    }
}

/// Drives one storytelling session.
pub struct Storyteller {
    config: Config,
    generator: Arc<dyn StoryGenerator>,
    confusion: Arc<dyn Classifier>,
    feedback: Arc<dyn Classifier>,
    approval: Arc<dyn Classifier>,
    events: EventSender,
}

impl Storyteller {
    /// Create a storyteller with its own event channel.
    ///
    /// The classifiers are built from `config.markers`.
    pub fn new(config: Config, generator: Arc<dyn StoryGenerator>) -> (Self, EventReceiver) {
        let (tx, rx) = channel();
        (Self::with_events(config, generator, tx), rx)
    }

    /// Create a storyteller that reports on an existing event channel.
    pub fn with_events(
        config: Config,
        generator: Arc<dyn StoryGenerator>,
        events: EventSender,
    ) -> Self {
        let confusion = Arc::new(PhraseClassifier::confusion(&config.markers));
        let feedback = Arc::new(PhraseClassifier::negative_feedback(&config.markers));
        let approval = Arc::new(PhraseClassifier::approval(&config.markers));
        Self {
            config,
            generator,
            confusion,
            feedback,
            approval,
            events,
        }
    }

    /// Replace the classifier that spots requests for clarification.
    pub fn with_confusion_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.confusion = classifier;
        self
    }

    /// Replace the classifier that spots negative feedback.
    pub fn with_feedback_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.feedback = classifier;
        self
    }

    /// Replace the classifier that spots approval of a revision.
    pub fn with_approval_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.approval = classifier;
        self
    }

    fn emit(&self, e: Event) {
        event::publish(&self.events, e);
    }

    /// Run a full session, building the story in `ctx`.
    ///
    /// # Errors
    ///
    /// Any generation or participant failure ends the session early. The
    /// closing line is not said, and `ctx` keeps whatever was completed
    /// before the failure.
    pub async fn run(
        &self,
        ctx: &mut StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<Outcome> {
        self.emit(Event::Started);

        match self.tell(ctx, participant).await {
            Ok(outcome) => {
                tracing::info!(revised = outcome.is_revised(), "story session completed");
                self.emit(Event::Completed {
                    revised: outcome.is_revised(),
                });
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "story session aborted");
                self.emit(Event::Stopped {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn tell(
        &self,
        ctx: &mut StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<Outcome> {
        participant.say(WELCOME).await?;

        let character = self.elicit(Stage::Character, ctx, participant).await?;
        ctx.set_main_character(character.as_str());

        let setting = self.elicit(Stage::Setting, ctx, participant).await?;
        ctx.set_setting(setting.as_str());
        self.extend_story(
            Stage::Setting,
            &prompt::opening(&character, &setting),
            ctx,
            participant,
        )
        .await?;

        let ability = self.elicit(Stage::Ability, ctx, participant).await?;
        ctx.set_special_ability(ability.as_str());
        self.extend_story(
            Stage::Ability,
            &prompt::ability(&character, &ability),
            ctx,
            participant,
        )
        .await?;

        let idea = self.elicit(Stage::PlotTurn, ctx, participant).await?;
        self.extend_story(
            Stage::PlotTurn,
            &prompt::plot_turn(&idea, &character, &ability),
            ctx,
            participant,
        )
        .await?;

        let ending = self.elicit(Stage::Ending, ctx, participant).await?;
        self.extend_story(
            Stage::Ending,
            &prompt::ending(&ending, &character, &ability),
            ctx,
            participant,
        )
        .await?;

        participant.say(THE_END).await?;
        let outcome = self.collect_feedback(ctx, participant).await?;
        participant.say(CLOSING).await?;
        Ok(outcome)
    }

    /// Fail once a bounded question has used up its attempts.
    fn check_attempts(&self, step: &str, attempts: u32) -> Result<()> {
        match self.config.max_stage_attempts {
            Some(max) if attempts >= max => Err(Error::AttemptsExhausted {
                step: step.to_string(),
                attempts,
            }),
            _ => Ok(()),
        }
    }

    /// Ask one stage's question until a usable answer arrives.
    ///
    /// Returns the trimmed answer. `ctx` is only read, to word the question
    /// and the examples.
    pub async fn elicit(
        &self,
        stage: Stage,
        ctx: &StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<String> {
        self.emit(Event::StageStarted { stage });
        let question = stage.question(ctx);
        let mut attempts = 0u32;

        loop {
            let answer = participant.ask(&question).await?;
            attempts += 1;

            let reason = match assess(&answer, self.confusion.as_ref()) {
                Assessment::Accepted(value) => {
                    participant.say(stage.acknowledgement()).await?;
                    tracing::info!(stage = %stage, value = %value, attempts, "stage answer accepted");
                    self.emit(Event::StageAccepted {
                        stage,
                        value: value.clone(),
                    });
                    return Ok(value);
                }
                Assessment::Confused => {
                    for line in stage.clarification(ctx) {
                        participant.say(&line).await?;
                    }
                    Rejection::Confused
                }
                Assessment::Empty => {
                    participant.say(stage.empty_reprompt()).await?;
                    Rejection::Empty
                }
            };

            tracing::debug!(stage = %stage, reason = %reason, attempts, "stage answer rejected");
            self.emit(Event::AnswerRejected {
                stage,
                reason,
                attempt: attempts,
            });
            self.check_attempts(&stage.to_string(), attempts)?;
        }
    }

    /// Generate the next segment, append it to the story and tell it.
    ///
    /// The story so far goes along as read-only context. Nothing is appended
    /// if generation fails.
    pub async fn extend_story(
        &self,
        stage: Stage,
        instruction: &str,
        ctx: &mut StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<()> {
        let prior = ctx.story_text();
        let prior = (!ctx.is_empty()).then_some(prior.as_str());
        let segment = self.generator.generate_segment(prior, instruction).await?;

        let chars = segment.chars().count();
        participant.say(&format!("\n{}", segment)).await?;
        ctx.append_segment(segment);
        self.emit(Event::SegmentGenerated { stage, chars });
        Ok(())
    }

    /// Ask whether the participant enjoyed the story and revise it if not.
    ///
    /// Only a recognised negative answer leads to a revision; anything else
    /// counts as enjoyment. At most one revision happens.
    pub async fn collect_feedback(
        &self,
        ctx: &mut StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<Outcome> {
        let mut question = FEEDBACK_QUESTION;
        let mut attempts = 0u32;

        loop {
            let answer = participant.ask(question).await?;
            attempts += 1;

            if self.confusion.classify(&answer) == Category::Confused {
                tracing::debug!(attempts, "feedback answer looked confused");
                question = FEEDBACK_REPHRASED;
                self.check_attempts(FEEDBACK_STEP, attempts)?;
                continue;
            }

            let negative = self.feedback.classify(&answer) == Category::Negative;
            tracing::info!(negative, "feedback received");
            self.emit(Event::FeedbackReceived { negative });

            if !negative {
                participant.say(ENJOYED).await?;
                return Ok(Outcome::Enjoyed);
            }
            return self.revise(ctx, participant).await;
        }
    }

    /// Replace the story with a regenerated version that addresses what the
    /// participant disliked.
    async fn revise(
        &self,
        ctx: &mut StoryContext,
        participant: &mut dyn Participant,
    ) -> Result<Outcome> {
        let elements = ctx.elements().ok_or(Error::MissingElements)?;

        let dislike = participant.ask(DISLIKE_QUESTION).await?.trim().to_string();
        participant.say(REVISION_INTRO).await?;

        let instruction = prompt::revision(&dislike, &elements, &ctx.story_text());
        let revised = self.generator.generate_full_story(&instruction).await?;
        let chars = revised.chars().count();
        ctx.replace_story(revised);
        self.emit(Event::StoryRevised { chars });

        participant
            .say(&format!(
                "\n✨ Here's a whole new adventure about {}! ✨\n",
                elements.main_character
            ))
            .await?;
        participant.say(&ctx.story_text()).await?;

        let answer = participant.ask(PREFERENCE_QUESTION).await?;
        let preferred_revision = self.approval.classify(&answer) == Category::Approval;
        participant
            .say(if preferred_revision {
                PREFERRED_REVISION
            } else {
                NOT_PREFERRED_REVISION
            })
            .await?;

        Ok(Outcome::Revised {
            dislike,
            preferred_revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationErrorKind;
    use crate::testing::{RecordingGenerator, ScriptedParticipant};

    fn storyteller(config: Config) -> (Storyteller, Arc<RecordingGenerator>, EventReceiver) {
        let generator = Arc::new(RecordingGenerator::new());
        let (teller, rx) = Storyteller::new(config, generator.clone());
        (teller, generator, rx)
    }

    fn full_context() -> StoryContext {
        let mut ctx = StoryContext::new();
        ctx.set_main_character("princess");
        ctx.set_setting("a castle");
        ctx.set_special_ability("fly");
        ctx.append_segment("Once upon a time.");
        ctx.append_segment("She could fly.");
        ctx
    }

    #[tokio::test]
    async fn test_elicit_accepts_trimmed_answer() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["  princess  "]);

        let value = teller
            .elicit(Stage::Character, &StoryContext::new(), &mut participant)
            .await
            .unwrap();

        assert_eq!(value, "princess");
        assert_eq!(participant.said(), vec!["Ohh~ Very cool choice!"]);
    }

    #[tokio::test]
    async fn test_elicit_explains_when_confused() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["huh?", "a dragon"]);

        let value = teller
            .elicit(Stage::Character, &StoryContext::new(), &mut participant)
            .await
            .unwrap();

        assert_eq!(value, "a dragon");
        assert_eq!(participant.asked().len(), 2);
        let said = participant.said();
        assert_eq!(said.first(), Some(&"Oh! I'm asking who you want our story to be about!"));
        assert_eq!(said.last(), Some(&"Ohh~ Very cool choice!"));
    }

    #[tokio::test]
    async fn test_elicit_reprompts_on_empty() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["", "   ", "under the sea"]);

        let value = teller
            .elicit(Stage::Setting, &StoryContext::new(), &mut participant)
            .await
            .unwrap();

        assert_eq!(value, "under the sea");
        let reprompts = participant
            .said()
            .iter()
            .filter(|line| **line == Stage::Setting.empty_reprompt())
            .count();
        assert_eq!(reprompts, 2);
    }

    #[tokio::test]
    async fn test_elicit_is_unbounded_by_default() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut answers: Vec<&str> = vec![""; 40];
        answers.push("fly");
        let mut participant = ScriptedParticipant::new(answers);

        let value = teller
            .elicit(Stage::Ability, &StoryContext::new(), &mut participant)
            .await
            .unwrap();
        assert_eq!(value, "fly");
    }

    #[tokio::test]
    async fn test_elicit_honours_attempt_limit() {
        let (teller, _generator, _rx) = storyteller(Config::new().max_stage_attempts(2));
        let mut participant = ScriptedParticipant::new(["what?", "", "fly"]);

        let err = teller
            .elicit(Stage::Ability, &StoryContext::new(), &mut participant)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AttemptsExhausted { ref step, attempts: 2 } if step == "ability"
        ));
        assert_eq!(participant.remaining(), 1);
    }

    #[tokio::test]
    async fn test_undrained_events_do_not_stall_elicit() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut answers: Vec<&str> = vec![""; 300];
        answers.push("fly");
        let mut participant = ScriptedParticipant::new(answers);
        let ctx = StoryContext::new();

        let value = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            teller.elicit(Stage::Ability, &ctx, &mut participant),
        )
        .await
        .expect("elicit stalled on a full event channel")
        .unwrap();

        assert_eq!(value, "fly");
        assert_eq!(participant.remaining(), 0);
    }

    #[tokio::test]
    async fn test_elicit_fails_when_input_closes() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["idk"]);

        let err = teller
            .elicit(Stage::Character, &StoryContext::new(), &mut participant)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InputClosed));
    }

    #[tokio::test]
    async fn test_extend_story_appends_and_passes_prior_text() {
        let (teller, generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(Vec::<String>::new());
        let mut ctx = StoryContext::new();

        teller
            .extend_story(Stage::Setting, "Begin.", &mut ctx, &mut participant)
            .await
            .unwrap();
        let before = ctx.story_text();

        teller
            .extend_story(Stage::Ability, "Continue.", &mut ctx, &mut participant)
            .await
            .unwrap();
        let after = ctx.story_text();

        let calls = generator.segment_calls();
        assert_eq!(calls[0].prior, None);
        assert_eq!(calls[1].prior.as_deref(), Some(before.as_str()));
        assert!(after.len() > before.len());
        assert!(after.starts_with(&format!("{}\n", before)));
        assert_eq!(participant.said(), vec!["\nSegment 1.", "\nSegment 2."]);
    }

    #[tokio::test]
    async fn test_extend_story_failure_leaves_context_untouched() {
        let (teller, generator, _rx) = storyteller(Config::new());
        generator.fail_next(GenerationErrorKind::ServerError);
        let mut participant = ScriptedParticipant::new(Vec::<String>::new());
        let mut ctx = full_context();
        let before = ctx.clone();

        let err = teller
            .extend_story(Stage::PlotTurn, "Middle.", &mut ctx, &mut participant)
            .await
            .unwrap_err();

        assert_eq!(err.generation_kind(), Some(GenerationErrorKind::ServerError));
        assert_eq!(ctx, before);
        assert!(participant.said().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_positive_keeps_story() {
        let (teller, generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["yes it was great"]);
        let mut ctx = full_context();
        let before = ctx.story_text();

        let outcome = teller
            .collect_feedback(&mut ctx, &mut participant)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Enjoyed);
        assert_eq!(ctx.story_text(), before);
        assert!(generator.calls().is_empty());
        assert_eq!(participant.said(), vec![ENJOYED]);
    }

    #[tokio::test]
    async fn test_feedback_unrecognised_answer_counts_as_enjoyed() {
        let (teller, generator, _rx) = storyteller(Config::new());
        for answer in ["", "purple", "no thanks i loved it"] {
            let mut participant = ScriptedParticipant::new([answer]);
            let outcome = teller
                .collect_feedback(&mut full_context(), &mut participant)
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Enjoyed, "{:?}", answer);
        }
        assert!(generator.full_story_calls().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_confusion_rephrases_question() {
        let (teller, _generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["what do you mean", "yes"]);

        teller
            .collect_feedback(&mut full_context(), &mut participant)
            .await
            .unwrap();

        assert_eq!(participant.asked(), vec![FEEDBACK_QUESTION, FEEDBACK_REPHRASED]);
    }

    #[tokio::test]
    async fn test_negative_feedback_replaces_story_once() {
        let (teller, generator, _rx) = storyteller(Config::new());
        generator.push_text("A brand new tale.");
        let mut participant = ScriptedParticipant::new(["NO", "  too short  ", "nope"]);
        let mut ctx = full_context();
        let elements_before = ctx.elements();
        let story_before = ctx.story_text();

        let outcome = teller
            .collect_feedback(&mut ctx, &mut participant)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Revised {
                dislike: "too short".to_string(),
                preferred_revision: false,
            }
        );
        assert_eq!(ctx.story_text(), "A brand new tale.");
        assert_eq!(ctx.elements(), elements_before);

        let calls = generator.full_story_calls();
        assert_eq!(calls.len(), 1);
        assert!(generator.segment_calls().is_empty());
        assert!(calls[0].instruction.contains("too short"));
        assert!(calls[0].instruction.contains(&story_before));
        assert_eq!(participant.said().last(), Some(&NOT_PREFERRED_REVISION));
    }

    #[tokio::test]
    async fn test_revision_requires_elements() {
        let (teller, generator, _rx) = storyteller(Config::new());
        let mut participant = ScriptedParticipant::new(["no", "all of it"]);
        let mut ctx = StoryContext::new();
        ctx.append_segment("Orphan story.");

        let err = teller
            .collect_feedback(&mut ctx, &mut participant)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingElements));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_attempt_limit() {
        let (teller, _generator, _rx) = storyteller(Config::new().max_stage_attempts(1));
        let mut participant = ScriptedParticipant::new(["huh", "yes"]);

        let err = teller
            .collect_feedback(&mut full_context(), &mut participant)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttemptsExhausted { ref step, .. } if step == "feedback"));
    }

    #[tokio::test]
    async fn test_injected_classifier_is_used() {
        struct NeverConfused;
        impl Classifier for NeverConfused {
            fn classify(&self, _text: &str) -> Category {
                Category::Answer
            }
        }

        let (teller, _generator, _rx) = storyteller(Config::new());
        let teller = teller.with_confusion_classifier(Arc::new(NeverConfused));
        let mut participant = ScriptedParticipant::new(["somewhere sunny"]);

        let value = teller
            .elicit(Stage::Setting, &StoryContext::new(), &mut participant)
            .await
            .unwrap();
        assert_eq!(value, "somewhere sunny");
    }

    #[test]
    fn test_outcome_is_revised() {
        assert!(!Outcome::Enjoyed.is_revised());
        assert!(Outcome::Revised {
            dislike: String::new(),
            preferred_revision: true,
        }
        .is_revised());
    }
}
