//! Maps final recognition results to editor commands.
//!
//! A result with intent matches is reported as an intent with its entities.
//! Otherwise the utterance is normalized and looked up in the command table.
//!
//! The recognizer spells small numbers out ("seven"), so count and line
//! entities are also reported parsed.

use std::collections::BTreeMap;

use intent_bridge_core::RecognizedPayload;
use tracing::{debug, info};

/// Lower-case and drop trailing periods, the way recognized text is compared
/// against command keys.
pub fn normalize_utterance(text: &str) -> String {
    text.trim().trim_end_matches('.').trim_end().to_lowercase()
}

/// Entities whose values are line numbers or counts.
const NUMERIC_ENTITIES: [&str; 3] = ["numNewLines", "lineNumber", "breakpointLine"];

/// A spoken number word (`zero` to `nine`) or the first run of digits.
pub fn parse_number_from_phrase(text: &str) -> Option<u32> {
    if let Some(n) = word_to_number(text) {
        return Some(n);
    }
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn word_to_number(word: &str) -> Option<u32> {
    let n = match word.trim().to_lowercase().as_str() {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        _ => return None,
    };
    Some(n)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Command { utterance: String, command: String },
    Intent {
        intent_id: String,
        entities: BTreeMap<String, String>,
        /// Numeric entities that parsed.
        numbers: BTreeMap<String, u32>,
    },
    Unmatched(String),
}

#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: BTreeMap<String, String>,
}

impl CommandTable {
    /// Keys are expected to be normalized already (see `AppSettings::normalize`).
    pub fn new(commands: BTreeMap<String, String>) -> Self {
        Self { commands }
    }

    pub fn resolve(&self, payload: &RecognizedPayload) -> Dispatch {
        if let Some(first) = payload.intent_matches.first() {
            let entities: BTreeMap<String, String> = payload
                .intent_matches
                .iter()
                .filter_map(|m| m.entity_value().map(|v| (m.entity.clone(), v.to_string())))
                .collect();
            let numbers = entities
                .iter()
                .filter(|(name, _)| NUMERIC_ENTITIES.contains(&name.as_str()))
                .filter_map(|(name, value)| {
                    parse_number_from_phrase(value).map(|n| (name.clone(), n))
                })
                .collect();
            return Dispatch::Intent {
                intent_id: first.id.clone(),
                entities,
                numbers,
            };
        }

        let utterance = normalize_utterance(&payload.text);
        match self.commands.get(&utterance) {
            Some(command) => Dispatch::Command {
                command: command.clone(),
                utterance,
            },
            None => Dispatch::Unmatched(utterance),
        }
    }

    /// Resolve and log the outcome.
    pub fn dispatch(&self, payload: &RecognizedPayload) -> Dispatch {
        let outcome = self.resolve(payload);
        match &outcome {
            Dispatch::Command { utterance, command } => {
                info!(utterance = %utterance, command = %command, "command");
            }
            Dispatch::Intent {
                intent_id,
                entities,
                numbers,
            } => {
                info!(intent_id = %intent_id, entities = ?entities, numbers = ?numbers, "intent");
            }
            Dispatch::Unmatched(utterance) => {
                debug!(utterance = %utterance, "no command for utterance");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent_bridge_core::IntentMatch;

    fn table() -> CommandTable {
        CommandTable::new(BTreeMap::from([
            ("format document".to_string(), "editor.action.formatDocument".to_string()),
            ("undo".to_string(), "undo".to_string()),
        ]))
    }

    fn recognized(text: &str, matches: Vec<IntentMatch>) -> RecognizedPayload {
        RecognizedPayload {
            text: text.into(),
            intent_matches: matches,
        }
    }

    #[test]
    fn utterances_are_lowercased_without_trailing_period() {
        assert_eq!(normalize_utterance("Format document."), "format document");
        assert_eq!(normalize_utterance(" Undo "), "undo");
        assert_eq!(normalize_utterance("Go to v1.2 now"), "go to v1.2 now");
    }

    #[test]
    fn plain_text_resolves_through_the_table() {
        assert_eq!(
            table().resolve(&recognized("Format document.", vec![])),
            Dispatch::Command {
                utterance: "format document".into(),
                command: "editor.action.formatDocument".into(),
            }
        );
        assert_eq!(
            table().resolve(&recognized("Sing a song.", vec![])),
            Dispatch::Unmatched("sing a song".into())
        );
    }

    #[test]
    fn intent_matches_take_precedence_over_commands() {
        let payload = recognized(
            "undo",
            vec![IntentMatch {
                entity: "lineNumber".into(),
                value: "4".into(),
                id: "Voice.Positioning".into(),
                text: "undo".into(),
            }],
        );
        assert_eq!(
            table().resolve(&payload),
            Dispatch::Intent {
                intent_id: "Voice.Positioning".into(),
                entities: BTreeMap::from([("lineNumber".to_string(), "4".to_string())]),
                numbers: BTreeMap::from([("lineNumber".to_string(), 4)]),
            }
        );
    }

    #[test]
    fn spoken_and_digit_numbers_parse() {
        assert_eq!(parse_number_from_phrase("seven"), Some(7));
        assert_eq!(parse_number_from_phrase(" Zero "), Some(0));
        assert_eq!(parse_number_from_phrase("line 12"), Some(12));
        assert_eq!(parse_number_from_phrase("go to line 40 then 3"), Some(40));
        assert_eq!(parse_number_from_phrase("eleven"), None);
        assert_eq!(parse_number_from_phrase(""), None);
    }

    #[test]
    fn numeric_entities_are_parsed_and_others_left_alone() {
        let matches = [("numNewLines", "three"), ("fileName", "seven")]
            .into_iter()
            .map(|(entity, value)| IntentMatch {
                entity: entity.into(),
                value: value.into(),
                id: "Voice.InsertNewLine".into(),
                text: "add three new lines".into(),
            })
            .collect();

        match table().resolve(&recognized("add three new lines", matches)) {
            Dispatch::Intent { numbers, entities, .. } => {
                assert_eq!(numbers, BTreeMap::from([("numNewLines".to_string(), 3)]));
                assert_eq!(entities["numNewLines"], "three");
            }
            other => panic!("expected an intent, got {other:?}"),
        }
    }
}
