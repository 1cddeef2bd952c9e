//! The story being built during a session.
//!
//! `StoryContext` holds the prose generated so far and the three story
//! elements the participant chose. It is passed explicitly to every stage.

/// Separator placed between story segments.
const SEGMENT_SEPARATOR: &str = "\n";

/// The three elements a story is built around, once all are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryElements {
    /// Who the story is about.
    pub main_character: String,
    /// Where the story takes place.
    pub setting: String,
    /// The main character's special power.
    pub special_ability: String,
}

/// Accumulated story text and chosen story elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryContext {
    segments: Vec<String>,
    main_character: Option<String>,
    setting: Option<String>,
    special_ability: Option<String>,
}

impl StoryContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full story text, segments joined by newlines.
    pub fn story_text(&self) -> String {
        self.segments.join(SEGMENT_SEPARATOR)
    }

    /// Whether no story text has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments currently making up the story.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Append a newly generated segment to the story.
    pub fn append_segment(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Replace the whole story with a new version.
    ///
    /// The story elements are left untouched.
    pub fn replace_story(&mut self, story: impl Into<String>) {
        self.segments = vec![story.into()];
    }

    /// The main character, if chosen.
    pub fn main_character(&self) -> Option<&str> {
        self.main_character.as_deref()
    }

    /// The setting, if chosen.
    pub fn setting(&self) -> Option<&str> {
        self.setting.as_deref()
    }

    /// The special ability, if chosen.
    pub fn special_ability(&self) -> Option<&str> {
        self.special_ability.as_deref()
    }

    /// Record the main character.
    pub fn set_main_character(&mut self, value: impl Into<String>) {
        self.main_character = Some(value.into());
    }

    /// Record the setting.
    pub fn set_setting(&mut self, value: impl Into<String>) {
        self.setting = Some(value.into());
    }

    /// Record the special ability.
    pub fn set_special_ability(&mut self, value: impl Into<String>) {
        self.special_ability = Some(value.into());
    }

    /// All three story elements, or `None` while any is still missing.
    pub fn elements(&self) -> Option<StoryElements> {
        Some(StoryElements {
            main_character: self.main_character.clone()?,
            setting: self.setting.clone()?,
            special_ability: self.special_ability.clone()?,
        })
    }
}
