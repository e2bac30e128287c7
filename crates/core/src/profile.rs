//! Profile of the person whose calls are being screened
//!
//! A profile is a plain immutable value: the persona is expressed entirely
//! through the instruction text built from it, never through per-persona
//! types.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Default reply budget, in words
pub const DEFAULT_MAX_REPLY_WORDS: usize = 50;

/// Persona the assistant answers on behalf of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Name of the person being screened (e.g. "Alex")
    pub name: String,

    /// Role or context (e.g. "Head of Marketing at Initech")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Short bio used to answer caller questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    /// Email the assistant may share when asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_email: Option<String>,

    /// Free-form handling instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,

    /// Maximum words per assistant reply
    #[serde(default = "default_max_reply_words")]
    pub max_reply_words: usize,

    /// Synthesis voice override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

fn default_max_reply_words() -> usize {
    DEFAULT_MAX_REPLY_WORDS
}

impl Default for Profile {
    fn default() -> Self {
        Self::new("the owner")
    }
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            about: None,
            share_email: None,
            special_instructions: None,
            max_reply_words: DEFAULT_MAX_REPLY_WORDS,
            voice_id: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn with_share_email(mut self, email: impl Into<String>) -> Self {
        self.share_email = Some(email.into());
        self
    }

    pub fn with_special_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }

    pub fn with_max_reply_words(mut self, words: usize) -> Self {
        self.max_reply_words = words;
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    /// "Name, role" when a role is known, otherwise just the name
    pub fn description(&self) -> String {
        match &self.role {
            Some(role) if !role.trim().is_empty() => format!("{}, {}", self.name, role),
            _ => self.name.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidProfile("name must not be empty".to_string()));
        }
        if self.max_reply_words == 0 {
            return Err(Error::InvalidProfile(
                "max_reply_words must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description() {
        let profile = Profile::new("Alex");
        assert_eq!(profile.description(), "Alex");

        let profile = profile.with_role("Head of Marketing");
        assert_eq!(profile.description(), "Alex, Head of Marketing");
    }

    #[test]
    fn test_validation() {
        assert!(Profile::new("Alex").validate().is_ok());
        assert!(Profile::new("  ").validate().is_err());
        assert!(Profile::new("Alex").with_max_reply_words(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let profile: Profile = serde_json::from_str(r#"{"name":"Alex"}"#).unwrap();
        assert_eq!(profile.max_reply_words, DEFAULT_MAX_REPLY_WORDS);
        assert!(profile.share_email.is_none());
    }
}
