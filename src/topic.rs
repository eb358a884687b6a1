use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

/// Filesystem-safe directory name derived from a free-text topic.
///
/// Normalization lowercases the input, drops every character outside
/// `[a-z0-9_-]`, and folds runs of whitespace or underscores into a single
/// `_` with none left at either end. Case and spacing variants of one topic
/// ("Machine Learning", "machine  learning") share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicKey(String);

impl TopicKey {
    pub fn normalize(topic: &str) -> Result<Self, ResearchError> {
        let mut key = String::with_capacity(topic.len());
        let mut pending_separator = false;
        for ch in topic.chars().flat_map(char::to_lowercase) {
            if ch.is_whitespace() || ch == '_' {
                pending_separator = true;
                continue;
            }
            if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-') {
                continue;
            }
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.push(ch);
        }

        if key.is_empty() {
            return Err(ResearchError::InvalidTopic(topic.to_string()));
        }
        Ok(Self(key))
    }

    /// Wraps a value already known to be in normalized form.
    pub(crate) fn from_normalized(key: &str) -> Self {
        debug_assert!(Self::normalize(key).is_ok_and(|normalized| normalized.0 == key));
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form: underscores become spaces.
    pub fn display_name(&self) -> String {
        self.0.replace('_', " ")
    }

    /// Display name with each word capitalized, used for markdown headings.
    pub fn title(&self) -> String {
        self.0
            .split(['_', '-'])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TopicKey {
    type Err = ResearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::normalize(value)
    }
}

impl TryFrom<String> for TopicKey {
    type Error = ResearchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<TopicKey> for String {
    fn from(value: TopicKey) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn lowercases_and_joins_words() {
        let key: TopicKey = "Machine Learning".parse().unwrap();
        assert_eq!(key.as_str(), "machine_learning");
    }

    #[test]
    fn strips_disallowed_characters_before_joining() {
        let key = TopicKey::normalize("  Drug: side-effects ! (2024)  ").unwrap();
        assert_eq!(key.as_str(), "drug_side-effects_2024");

        let key = TopicKey::normalize("a ! b").unwrap();
        assert_eq!(key.as_str(), "a_b");
    }

    #[test]
    fn rejects_empty_result() {
        assert_matches!(
            TopicKey::normalize("  ?!  "),
            Err(ResearchError::InvalidTopic(_))
        );
        assert_matches!(TopicKey::normalize("___"), Err(ResearchError::InvalidTopic(_)));
    }

    #[test]
    fn title_capitalizes_words() {
        let key = TopicKey::normalize("quantum error-correction").unwrap();
        assert_eq!(key.title(), "Quantum Error Correction");
    }
}
