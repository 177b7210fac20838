//! Callback payloads delivered to the host.
//!
//! | Callback | Payload |
//! |----------|---------|
//! | `onStarted` / `onStopped` | `SessionPayload` |
//! | `onCancelled` | `CanceledPayload` |
//! | `onRecognizing` | `RecognizingPayload` |
//! | `onRecognized` | `RecognizedPayload` |
//!
//! Field names serialize in camelCase so the JSON matches what host code reads.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::engine::events::CancellationReason;

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Payload for the started and stopped callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
}

/// Payload for the cancelled callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanceledPayload {
    /// Human-readable failure description from the engine.
    pub error_details: String,
    pub reason: CancellationReason,
    /// Engine error code, e.g. `AuthenticationFailure`. Absent on end-of-stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Recognition results
// ---------------------------------------------------------------------------

/// Partial hypothesis while the speaker is still talking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizingPayload {
    pub text: String,
}

/// Final result for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedPayload {
    pub text: String,
    /// One element per extracted entity, ordered by entity name.
    pub intent_matches: Vec<IntentMatch>,
}

/// One entity of a matched intent.
///
/// Serializes flat as `{ "<entity>": value, "id": intent, "text": utterance }`.
/// An entity literally named `id` or `text` is shadowed by the fixed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub entity: String,
    pub value: String,
    pub id: String,
    pub text: String,
}

impl IntentMatch {
    /// The entity's value, unless its name collides with a fixed field.
    pub fn entity_value(&self) -> Option<&str> {
        if is_reserved(&self.entity) {
            None
        } else {
            Some(&self.value)
        }
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "id" | "text")
}

impl Serialize for IntentMatch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let shadowed = is_reserved(&self.entity);
        let mut map = serializer.serialize_map(Some(if shadowed { 2 } else { 3 }))?;
        if !shadowed {
            map.serialize_entry(&self.entity, &self.value)?;
        }
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("text", &self.text)?;
        map.end()
    }
}
