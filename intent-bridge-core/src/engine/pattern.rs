//! Phrase patterns with `{entity}` placeholders.
//!
//! `"Go to line {lineNumber}"` matches `"go to line 12."` and extracts
//! `lineNumber = "12"`. Literal words compare case-insensitively with edge
//! punctuation stripped. Each placeholder captures one or more words, keeping
//! the spoken casing.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Word(String),
    Entity(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentPattern {
    source: String,
    segments: Vec<Segment>,
}

impl IntentPattern {
    pub fn parse(source: &str) -> Self {
        let segments = source
            .split_whitespace()
            .filter_map(|token| {
                if let Some(name) = token
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .filter(|name| !name.is_empty())
                {
                    Some(Segment::Entity(name.to_string()))
                } else {
                    let word = normalize_word(token);
                    (!word.is_empty()).then_some(Segment::Word(word))
                }
            })
            .collect();

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a whole utterance. Returns the captured entities on success.
    pub fn matches(&self, utterance: &str) -> Option<HashMap<String, String>> {
        let words: Vec<(String, &str)> = utterance
            .split_whitespace()
            .map(|w| (normalize_word(w), trim_edges(w)))
            .filter(|(norm, _)| !norm.is_empty())
            .collect();

        if self.segments.is_empty() || words.is_empty() {
            return None;
        }

        let mut captured = Vec::new();
        if match_from(&self.segments, &words, &mut captured) {
            Some(captured.into_iter().collect())
        } else {
            None
        }
    }
}

fn match_from(
    segments: &[Segment],
    words: &[(String, &str)],
    captured: &mut Vec<(String, String)>,
) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return words.is_empty();
    };

    match first {
        Segment::Word(expected) => match words.split_first() {
            Some(((norm, _), remaining)) if norm == expected => {
                match_from(rest, remaining, captured)
            }
            _ => false,
        },
        Segment::Entity(name) => {
            // Shortest capture first so trailing literals anchor the entity.
            for take in 1..=words.len() {
                let value = words[..take]
                    .iter()
                    .map(|(_, original)| *original)
                    .collect::<Vec<_>>()
                    .join(" ");
                captured.push((name.clone(), value));
                if match_from(rest, &words[take..], captured) {
                    return true;
                }
                captured.pop();
            }
            false
        }
    }
}

fn trim_edges(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
}

pub(crate) fn normalize_word(word: &str) -> String {
    trim_edges(word).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_case_and_punctuation_insensitively() {
        let pattern = IntentPattern::parse("Close editor");
        let entities = pattern.matches("close Editor.").expect("should match");
        assert!(entities.is_empty());
        assert!(pattern.matches("close the editor").is_none());
    }

    #[test]
    fn trailing_entity_captures_rest_of_utterance() {
        let pattern = IntentPattern::parse("Insert text {textInsertion}");
        let entities = pattern
            .matches("insert text Hello World")
            .expect("should match");
        assert_eq!(entities["textInsertion"], "Hello World");
    }

    #[test]
    fn leading_entity_is_anchored_by_literals() {
        let pattern = IntentPattern::parse("{terminalPhrase} in terminal");
        let entities = pattern
            .matches("npm run build in terminal")
            .expect("should match");
        assert_eq!(entities["terminalPhrase"], "npm run build");
    }

    #[test]
    fn multiple_entities_are_extracted() {
        let pattern = IntentPattern::parse("I want a {size} {color} one");
        let entities = pattern
            .matches("I want a large red one")
            .expect("should match");
        assert_eq!(entities.len(), 2);
        assert_eq!(entities["size"], "large");
        assert_eq!(entities["color"], "red");
    }

    #[test]
    fn entity_requires_at_least_one_word() {
        let pattern = IntentPattern::parse("Go to line {lineNumber}");
        assert!(pattern.matches("go to line").is_none());
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let pattern = IntentPattern::parse("   ");
        assert!(pattern.matches("anything").is_none());
        assert_eq!(pattern.source(), "   ");
    }
}
