//! Prompt text sent to the generation service.
//!
//! The service keeps no memory between calls, so every prompt carries all
//! the context it needs. Segment prompts are wrapped with the story so far
//! by [`with_prior_context`]; the revision prompt embeds the old story
//! itself.

use crate::story::StoryElements;

/// Which storyteller voice a request is made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Short continuation of a story in progress.
    Segment,
    /// A complete standalone story.
    Complete,
}

impl Persona {
    /// The system prompt for this persona.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Segment => SEGMENT_PERSONA,
            Persona::Complete => COMPLETE_PERSONA,
        }
    }
}

const SEGMENT_PERSONA: &str = "You are a warm, engaging storyteller for children ages 5-10. \
Use simple, clear language that a young child can understand. \
Each story segment should be less than 7 sentences long and end at a natural pausing point.";

const COMPLETE_PERSONA: &str = "You are a warm, engaging storyteller for children ages 5-10.
Create complete, engaging stories using simple language that young children can understand.
Make stories magical and fun, with clear beginnings, middles, and endings.
Use short paragraphs and natural pauses.
Make sure all sentences are complete and the story flows well.";

/// Wrap a continuation instruction with the story told so far.
///
/// Without prior text the instruction is sent as is.
pub fn with_prior_context(prior: Option<&str>, instruction: &str) -> String {
    match prior.filter(|text| !text.trim().is_empty()) {
        Some(story) => format!(
            "Previous story (for context only, do not repeat this part):
{story}

Now add this new part to the story (generate only the new part):
{instruction}

Important: Only write the new part of the story. Do not include or repeat any previous parts."
        ),
        None => instruction.to_string(),
    }
}

/// Opening segment introducing the character and their world.
pub fn opening(character: &str, setting: &str) -> String {
    format!(
        "Write the beginning of a children's story with:
- Main character: {character}
- Setting: {setting}

Start with 'Once upon a time' and introduce our character and their magical world.
Use simple words that a 5-year-old would understand.
Make it fun and magical! Don't introduce any special power of the character here yet.
The story opener should be about 3 sentences long, and it should stop right after the character and settings are introduced, with no transition into the actual story."
    )
}

/// Segment showing the special ability for the first time.
pub fn ability(character: &str, ability: &str) -> String {
    format!(
        "Continue the story by showing that {character} has this special ability: {ability}
Show this ability in action with a fun example.
Keep using simple words and make it exciting!
Write about 3-4 sentences."
    )
}

/// The middle of the story, built on the participant's plot idea.
pub fn plot_turn(idea: &str, character: &str, ability: &str) -> String {
    format!(
        "Continue the story using this idea: {idea}.
Show how {character} uses their special ability of {ability} in this situation. This is the peak of the story so make sure to have some twists and turns.
Keep it exciting and use simple words! Show the special power in action, and make the story full of imagination, but don't include the ending yet.
Split this segment into 2 paragraphs, each paragraph containing about 3-4 sentences. End at a natural pause."
    )
}

/// The closing segment, built on the participant's ending idea.
pub fn ending(idea: &str, character: &str, ability: &str) -> String {
    format!(
        "End our story with this idea: {idea}
Make sure to:
- Give {character} a happy ending.
- Show how they used their ability of {ability} to help and grow.
- Make it feel complete and satisfying.
Write about 3-5 sentences."
    )
}

/// Full rewrite addressing what the participant disliked.
pub fn revision(dislike: &str, elements: &StoryElements, previous_story: &str) -> String {
    format!(
        "Create a completely new, exciting version of this story that addresses this feedback: {dislike}

Story elements to keep:
- Main character: {character}
- Setting: {setting}
- Special ability: {ability}

Original story for reference:
{previous_story}

Requirements for the new version:
1. Create a complete story from beginning to end.
2. Use very simple words that a 5-year-old can understand.
3. Make the story more engaging by addressing their feedback.
4. Include fun moments showing the special ability in action.
5. Add excitement and magic throughout, by including some twists and turns.
6. Give a happy, satisfying ending.
7. Make the story flow naturally with clear paragraphs.

Important: Tell a completely new adventure while keeping the same character and magic.
Make this version different and more exciting than the original!",
        character = elements.main_character,
        setting = elements.setting,
        ability = elements.special_ability,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_context_wrapping() {
        let prompt = with_prior_context(Some("Once upon a time."), "Add a dragon.");
        assert!(prompt.contains("do not repeat this part"));
        assert!(prompt.contains("Once upon a time."));
        assert!(prompt.contains("Add a dragon."));
        assert!(prompt.find("Once upon a time.") < prompt.find("Add a dragon."));
    }

    #[test]
    fn test_no_prior_context_passes_instruction_through() {
        assert_eq!(with_prior_context(None, "Start."), "Start.");
        assert_eq!(with_prior_context(Some("  "), "Start."), "Start.");
    }

    #[test]
    fn test_stage_templates_mention_choices() {
        let open = opening("princess", "a castle");
        assert!(open.contains("Main character: princess"));
        assert!(open.contains("Setting: a castle"));
        assert!(open.contains("Once upon a time"));

        assert!(ability("princess", "fly").contains("special ability: fly"));

        let middle = plot_turn("meet a dragon", "princess", "fly");
        assert!(middle.contains("meet a dragon"));
        assert!(middle.contains("don't include the ending"));

        let end = ending("make everyone happy", "princess", "fly");
        assert!(end.contains("make everyone happy"));
        assert!(end.contains("happy ending"));
    }

    #[test]
    fn test_revision_prompt_contents() {
        let elements = StoryElements {
            main_character: "princess".to_string(),
            setting: "a castle".to_string(),
            special_ability: "fly".to_string(),
        };
        let prompt = revision("the ending was too short", &elements, "Old story.");
        assert!(prompt.contains("addresses this feedback: the ending was too short"));
        assert!(prompt.contains("- Main character: princess"));
        assert!(prompt.contains("- Setting: a castle"));
        assert!(prompt.contains("- Special ability: fly"));
        assert!(prompt.contains("Original story for reference:\nOld story."));
        assert!(prompt.contains("twists and turns"));
        assert!(prompt.contains("happy, satisfying ending"));
    }

    #[test]
    fn test_personas_differ() {
        assert!(Persona::Segment.system_prompt().contains("less than 7 sentences"));
        assert!(Persona::Complete
            .system_prompt()
            .contains("clear beginnings, middles, and endings"));
    }
}
