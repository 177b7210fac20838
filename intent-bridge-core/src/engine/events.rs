//! Raw event arguments fired by a recognition engine.
//!
//! These are borrowed by the handlers for the duration of the engine's call;
//! anything the host needs later is copied out before the call returns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEventArgs {
    pub session_id: String,
}

/// Why the engine gave up on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancellationReason {
    /// Authentication, network or service failure.
    Error,
    /// The audio source ran dry.
    EndOfStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanceledEventArgs {
    pub session_id: String,
    pub reason: CancellationReason,
    pub error_code: Option<String>,
    pub error_details: String,
}

/// One partial or final hypothesis.
///
/// `intent_id` is empty when no registered pattern matched. `entities` has no
/// meaningful iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntentRecognitionResult {
    pub text: String,
    pub intent_id: String,
    pub entities: HashMap<String, String>,
}

impl IntentRecognitionResult {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn has_intent(&self) -> bool {
        !self.intent_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_results_carry_no_intent() {
        let result = IntentRecognitionResult::text_only("hello there");
        assert_eq!(result.text, "hello there");
        assert!(!result.has_intent());
        assert!(result.entities.is_empty());

        let matched = IntentRecognitionResult {
            intent_id: "Voice.Undo".into(),
            ..result
        };
        assert!(matched.has_intent());
    }
}
