//! The elicitation stages and what each one says.
//!
//! Every stage follows the same shape: ask a question, read an answer,
//! explain with examples if the answer looks confused, re-prompt if it is
//! empty, otherwise acknowledge and accept it. This module holds the
//! per-stage wording; the loop itself lives in the engine.

use std::fmt;

use crate::classifier::{Category, Classifier};
use crate::story::StoryContext;

/// Fallback name used before the main character has been chosen.
const UNNAMED_CHARACTER: &str = "our friend";

/// Fallback power used before the special ability has been chosen.
const UNNAMED_ABILITY: &str = "their special power";

/// One question/answer step of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Who the story is about.
    Character,
    /// Where the story takes place.
    Setting,
    /// The main character's special power.
    Ability,
    /// What happens in the middle of the story.
    PlotTurn,
    /// How the story ends.
    Ending,
}

impl Stage {
    /// All stages in the order they are asked.
    pub const ALL: [Stage; 5] = [
        Stage::Character,
        Stage::Setting,
        Stage::Ability,
        Stage::PlotTurn,
        Stage::Ending,
    ];

    /// The question put to the participant.
    pub fn question(&self, ctx: &StoryContext) -> String {
        let character = ctx.main_character().unwrap_or(UNNAMED_CHARACTER);
        match self {
            Stage::Character => "Who should our story be about? (Maybe a princess, a brave knight, a friendly dragon, or someone else?)".to_string(),
            Stage::Setting => format!(
                "Where should our {} live? (In a castle, underwater, in space, or somewhere else magical?)",
                character
            ),
            Stage::Ability => format!(
                "What special magical power should our {} have? (Like being invisible, flying, or making things float?)",
                character
            ),
            Stage::PlotTurn => "\nWhat should happen next in our story? Do you want to:\n\
                - Meet someone who needs help\n\
                - Find something magical or mysterious\n\
                - Use the special power to solve a problem\n\
                - Or something else?\n"
                .to_string(),
            Stage::Ending => format!(
                "\nHow should the adventure end? {} could:\n\
                - Use the power to help everyone and make them happy\n\
                - Make lots of new friends and have a magical celebration\n\
                - Learn something special and share it with others\n\
                - Or do you have another fun idea?\n",
                character
            ),
        }
    }

    /// Lines said when the participant seems confused, ending in a re-ask.
    pub fn clarification(&self, ctx: &StoryContext) -> Vec<String> {
        let character = ctx.main_character().unwrap_or(UNNAMED_CHARACTER);
        let ability = ctx.special_ability().unwrap_or(UNNAMED_ABILITY);
        match self {
            Stage::Character => vec![
                "Oh! I'm asking who you want our story to be about!".into(),
                "It could be someone like:".into(),
                "- A brave princess who loves to go on adventures".into(),
                "- A friendly dragon who bakes yummy cookies".into(),
                "- A silly unicorn who changes colors when happy".into(),
                "- A clever mouse who builds amazing inventions".into(),
                "Who would you like to hear a story about?".into(),
            ],
            Stage::Setting => vec![
                "Let me explain! I'm asking where our story should take place!".into(),
                "It could be somewhere magical like:".into(),
                "- In a castle made of sparkly crystals".into(),
                "- In a forest where the trees glow at night".into(),
                "- Under the sea in a coral palace".into(),
                "- Up in the clouds in a floating house".into(),
                "Where do you think would be a fun place for our story?".into(),
            ],
            Stage::Ability => vec![
                "Oh! I'm asking what special magic or power they should have!".into(),
                "They could do amazing things like:".into(),
                "- Turn invisible whenever they want".into(),
                "- Talk to all the animals in the world".into(),
                "- Make rainbows appear with a wave of their hand".into(),
                "- Fly high in the sky like a bird".into(),
                "What special power would be fun for our friend to have?".into(),
            ],
            Stage::PlotTurn => vec![
                format!("Let me help you choose! Should {}:", character),
                "- Help a baby dragon find their way back home".into(),
                "- Discover a magical rainbow bridge".into(),
                "- Use the special power to help forest animals".into(),
                "Which sounds most fun to you?".into(),
            ],
            Stage::Ending => vec![
                format!("Let me help you pick a fun ending! Should {}:", character),
                format!("- Use their power to {} to make everyone smile", ability),
                "- Have a big party with all their new friends".into(),
                "- Share their magical gift with others who need help".into(),
                "Which ending would you like best?".into(),
            ],
        }
    }

    /// Said once a usable answer arrives.
    pub fn acknowledgement(&self) -> &'static str {
        match self {
            Stage::Character => "Ohh~ Very cool choice!",
            Stage::Setting => "Sure! This sounds like an interesting place to live~",
            Stage::Ability => "That's amazing! Having this power will make our story so magical!",
            Stage::PlotTurn => "Ooh, let's continue the adventure!",
            Stage::Ending => "Sure~ That sounds wonderful!",
        }
    }

    /// Said when the answer was empty.
    pub fn empty_reprompt(&self) -> &'static str {
        match self {
            Stage::Character => "I didn't quite get you. Who should be in our story?",
            Stage::Setting => {
                "I didn't quite hear you. Could you tell me again where they should live?"
            }
            Stage::Ability => "I missed that. What magical power should they have?",
            Stage::PlotTurn => "I didn't quite catch that. Let me ask again!",
            Stage::Ending => "I didn't quite get that. Let's choose an ending together!",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Character => "character",
            Stage::Setting => "setting",
            Stage::Ability => "ability",
            Stage::PlotTurn => "plot turn",
            Stage::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// What a single answer means for the stage loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    /// The participant asked for help; explain and ask again.
    Confused,
    /// Nothing usable was typed; ask again.
    Empty,
    /// A usable answer, already trimmed.
    Accepted(String),
}

/// Decide what to do with a raw answer.
///
/// Confusion is checked before emptiness, matching the order in which the
/// stage loop reacts.
pub fn assess(input: &str, confusion: &dyn Classifier) -> Assessment {
    if confusion.classify(input) == Category::Confused {
        return Assessment::Confused;
    }
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Assessment::Empty
    } else {
        Assessment::Accepted(trimmed.to_string())
    }
}
