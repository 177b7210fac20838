//! Engine event handlers and the raw-result → payload transform.
//!
//! `BridgeHandlers` is what the engine holds. It references only the callback
//! slots, the session flag and the host queue, never the `SessionBridge`.
//! Each handler copies what it needs out of the borrowed event args and
//! enqueues; nothing here blocks or touches host state directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Slots;
use crate::engine::{
    CanceledEventArgs, IntentRecognitionResult, RecognitionEvents, SessionEventArgs,
};
use crate::ipc::events::{
    CanceledPayload, IntentMatch, RecognizedPayload, RecognizingPayload, SessionPayload,
};
use crate::relay::HostHandle;

pub(crate) struct BridgeHandlers {
    pub(crate) slots: Arc<Slots>,
    pub(crate) session_active: Arc<AtomicBool>,
    pub(crate) detached: Arc<AtomicBool>,
    pub(crate) host: HostHandle,
}

impl BridgeHandlers {
    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Queue the flag write ahead of the callback for the same event, so a
    /// callback always observes the state its own event produced.
    fn publish_session_state(&self, origin: &'static str, active: bool) {
        let flag = Arc::clone(&self.session_active);
        self.host
            .post(origin, move |_| flag.store(active, Ordering::Release));
    }
}

impl RecognitionEvents for BridgeHandlers {
    fn session_started(&self, event: &SessionEventArgs) {
        if self.is_detached() {
            return;
        }
        info!(session_id = %event.session_id, "session started");
        self.publish_session_state("started", true);

        if let Some(relay) = self.slots.started.current() {
            let session_id = event.session_id.clone();
            relay.call(move |_| Ok(SessionPayload { session_id }));
        }
    }

    fn session_stopped(&self, event: &SessionEventArgs) {
        if self.is_detached() {
            return;
        }
        info!(session_id = %event.session_id, "session stopped");
        self.publish_session_state("stopped", false);

        if let Some(relay) = self.slots.stopped.current() {
            let session_id = event.session_id.clone();
            relay.call(move |_| Ok(SessionPayload { session_id }));
        }
    }

    fn canceled(&self, event: &CanceledEventArgs) {
        if self.is_detached() {
            return;
        }
        warn!(
            session_id = %event.session_id,
            reason = ?event.reason,
            error_code = event.error_code.as_deref().unwrap_or(""),
            details = %event.error_details,
            "session cancelled"
        );
        self.publish_session_state("canceled", false);

        if let Some(relay) = self.slots.canceled.current() {
            let payload = CanceledPayload {
                error_details: event.error_details.clone(),
                reason: event.reason,
                error_code: event.error_code.clone(),
            };
            relay.call(move |_| Ok(payload));
        }
    }

    fn recognizing(&self, result: &IntentRecognitionResult) {
        if self.is_detached() {
            return;
        }
        debug!(text = %result.text, "partial recognition");

        if let Some(relay) = self.slots.recognizing.current() {
            let text = result.text.clone();
            relay.call(move |_| Ok(RecognizingPayload { text }));
        }
    }

    fn recognized(&self, result: &IntentRecognitionResult) {
        if self.is_detached() {
            return;
        }
        debug!(
            text = %result.text,
            intent_id = %result.intent_id,
            matched = result.has_intent(),
            entities = result.entities.len(),
            "final recognition"
        );

        if let Some(relay) = self.slots.recognized.current() {
            let snapshot = RecognitionSnapshot::capture(result);
            relay.call(move |_| Ok(snapshot.into_payload()));
        }
    }
}

/// Owned copy of a final result, taken on the engine thread.
///
/// Entities are re-keyed into a `BTreeMap`, which fixes `intentMatches` to
/// entity-name order regardless of how the engine iterated them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSnapshot {
    pub text: String,
    pub intent_id: String,
    pub entities: BTreeMap<String, String>,
}

impl RecognitionSnapshot {
    pub fn capture(result: &IntentRecognitionResult) -> Self {
        Self::new(&result.text, &result.intent_id, &result.entities)
    }

    pub fn new(text: &str, intent_id: &str, entities: &HashMap<String, String>) -> Self {
        Self {
            text: text.to_string(),
            intent_id: intent_id.to_string(),
            entities: entities
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// One `IntentMatch` per entity, each carrying the intent id and full text.
    pub fn into_payload(self) -> RecognizedPayload {
        let Self {
            text,
            intent_id,
            entities,
        } = self;

        let intent_matches = entities
            .into_iter()
            .map(|(entity, value)| IntentMatch {
                entity,
                value,
                id: intent_id.clone(),
                text: text.clone(),
            })
            .collect();

        RecognizedPayload {
            text,
            intent_matches,
        }
    }
}
