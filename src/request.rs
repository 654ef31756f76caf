//! Story preferences and the instruction sent to the text backend.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowercased alphanumerics only, so `kids (5-12)`, `Kids (5 - 12)` and `kids 5 12` compare equal.
fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Error returned when a preference label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseChoiceError {
    kind: &'static str,
    value: String,
    expected: String,
}

macro_rules! choice_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal, $short:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Label embedded verbatim in the story instruction.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = ParseChoiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $(
                    if wanted == normalize($label) || wanted == $short {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseChoiceError {
                    kind: $kind,
                    value: s.to_string(),
                    expected: [$($label),+].join(", "),
                })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "fantasy")]
    Fantasy,
    #[serde(rename = "science fiction")]
    ScienceFiction,
    #[serde(rename = "fairy tale")]
    FairyTale,
    #[serde(rename = "slice of life")]
    SliceOfLife,
}

choice_enum!(Theme, "theme", {
    Fantasy => "fantasy", "fantasy",
    ScienceFiction => "science fiction", "scifi",
    FairyTale => "fairy tale", "fairytale",
    SliceOfLife => "slice of life", "sliceoflife",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    #[serde(rename = "sarcastic")]
    Sarcastic,
    #[serde(rename = "hilarious")]
    Hilarious,
    #[serde(rename = "silly")]
    Silly,
    #[serde(rename = "dark comedy")]
    DarkComedy,
}

choice_enum!(Tone, "tone", {
    Sarcastic => "sarcastic", "sarcastic",
    Hilarious => "hilarious", "hilarious",
    Silly => "silly", "silly",
    DarkComedy => "dark comedy", "dark",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    #[default]
    #[serde(rename = "kids (5 - 12)")]
    Kids,
    #[serde(rename = "teens (13 - 18)")]
    Teens,
    #[serde(rename = "adults (18 - 35)")]
    Adults,
}

choice_enum!(Audience, "audience", {
    Kids => "kids (5 - 12)", "kids",
    Teens => "teens (13 - 18)", "teens",
    Adults => "adults (18 - 35)", "adults",
});

/// Narration length; each choice maps to an approximate word count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryLength {
    #[default]
    ThirtySeconds,
    OneMinute,
    NinetySeconds,
    TwoMinutes,
}

impl StoryLength {
    pub const ALL: &'static [StoryLength] = &[
        StoryLength::ThirtySeconds,
        StoryLength::OneMinute,
        StoryLength::NinetySeconds,
        StoryLength::TwoMinutes,
    ];

    pub fn seconds(&self) -> u32 {
        match self {
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::NinetySeconds => 90,
            Self::TwoMinutes => 120,
        }
    }

    pub fn word_count(&self) -> u32 {
        match self {
            Self::ThirtySeconds => 50,
            Self::OneMinute => 100,
            Self::NinetySeconds => 150,
            Self::TwoMinutes => 200,
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s (~{} words)", self.seconds(), self.word_count())
    }
}

/// Accepts either the duration in seconds (`30`, `60s`) or the word count itself (`50`, `100`).
impl FromStr for StoryLength {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);
        if let Ok(n) = digits.parse::<u32>() {
            for length in Self::ALL {
                if length.seconds() == n || length.word_count() == n {
                    return Ok(*length);
                }
            }
        }
        Err(ParseChoiceError {
            kind: "duration",
            value: s.to_string(),
            expected: "30, 60, 90, 120 (seconds) or 50, 100, 150, 200 (words)".to_string(),
        })
    }
}

/// One user-initiated generation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    topic: String,
    #[serde(default)]
    theme: Theme,
    #[serde(default)]
    tone: Tone,
    #[serde(default)]
    audience: Audience,
    #[serde(default)]
    length: StoryLength,
}

impl GenerationRequest {
    /// Creates a request with default theme, tone, audience and length.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            theme: Theme::default(),
            tone: Tone::default(),
            audience: Audience::default(),
            length: StoryLength::default(),
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_length(mut self, length: StoryLength) -> Self {
        self.length = length;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn audience(&self) -> Audience {
        self.audience
    }

    pub fn length(&self) -> StoryLength {
        self.length
    }

    pub fn target_word_count(&self) -> u32 {
        self.length.word_count()
    }

    /// Rejects a topic that is empty after trimming.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.topic.trim().is_empty() {
            return Err(GenerationError::Validation);
        }
        Ok(())
    }

    /// The natural-language instruction for the text backend.
    ///
    /// The word count is only a hint to the model; nothing checks the output against it.
    pub fn instruction(&self) -> String {
        format!(
            "You are a professional storyteller. Write a creative, engaging, and concise comedy story of about {words} words. \
             The story should be told in a natural, flowing style, without any formatting elements, such as hashtags, \
             character names, stage directions, or script cues. The text should read like a story written for an audience, \
             not a script or screenplay. Keep the tone light and {tone}, suitable for specific audience as {audience}, \
             the theme of the story will be {theme} and make sure the narrative is entertaining from start to finish. \
             The topic of the story will be: {topic}",
            words = self.target_word_count(),
            tone = self.tone.label(),
            audience = self.audience.label(),
            theme = self.theme.label(),
            topic = self.topic,
        )
    }
}
