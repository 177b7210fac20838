//! Recognition engine abstraction.
//!
//! The engine is an external capability: it captures audio, talks to the
//! cloud service and fires events on threads it owns. These traits are the
//! only surface the bridge depends on, so a cloud SDK binding and the
//! in-process `SimulatedEngine` are interchangeable.
//!
//! ## Event sources
//!
//! ```text
//! start_continuous_async()
//!     └─► session_started ─► (recognizing* ─► recognized)* ─► session_stopped
//!                                                        └──► canceled
//! ```
//!
//! Events may arrive on any engine thread, zero or more times after start,
//! until stop or cancellation.

pub mod events;
pub mod pattern;
pub mod simulated;

use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::EngineError;

pub use events::{
    CanceledEventArgs, CancellationReason, IntentRecognitionResult, SessionEventArgs,
};
pub use simulated::{EngineRequest, SimulatedEngine, SimulatedEngineFactory};

/// Receiver for the five engine event sources.
///
/// Called on engine-owned background threads. Implementations must return
/// quickly and must not block on the host.
pub trait RecognitionEvents: Send + Sync + 'static {
    fn session_started(&self, event: &SessionEventArgs);
    fn session_stopped(&self, event: &SessionEventArgs);
    fn canceled(&self, event: &CanceledEventArgs);
    fn recognizing(&self, result: &IntentRecognitionResult);
    fn recognized(&self, result: &IntentRecognitionResult);
}

/// Mutable vocabulary that biases recognition toward domain terms.
pub trait PhraseListGrammar: Send + Sync {
    /// Append a hint. Takes effect immediately, including mid-session.
    fn add_phrase(&self, phrase: &str);

    fn clear(&self);
}

/// Contract for continuous intent recognition backends.
///
/// `start_continuous_async` and `stop_continuous_async` only issue requests;
/// the outcome is observed through the connected `RecognitionEvents`.
pub trait RecognitionEngine: Send + Sync {
    fn start_continuous_async(&self);

    fn stop_continuous_async(&self);

    /// Register a phrase pattern (with `{entity}` placeholders) for an intent.
    /// Registrations persist across sessions.
    fn add_intent(&self, phrase: &str, intent_id: &str);

    /// The grammar bound to this engine instance.
    fn phrase_grammar(&self) -> Arc<dyn PhraseListGrammar>;

    /// Attach the event receiver. Replaces any previous receiver.
    fn connect(&self, events: Arc<dyn RecognitionEvents>);

    /// Detach the event receiver. Events fired afterwards go nowhere.
    fn disconnect(&self);
}

/// Creates engines from subscription credentials.
///
/// Must not wait on the network: bad credentials only show up later as a
/// canceled event.
pub trait EngineFactory {
    fn create(&self, config: &BridgeConfig) -> Result<Arc<dyn RecognitionEngine>, EngineError>;
}
