//! `SessionBridge` owns one recognition engine and routes its events to
//! host callbacks.
//!
//! ## Lifecycle
//!
//! ```text
//! SessionBridge::new()                  → engine created, handlers connected
//!     └─► start_continuous_recognition() → request only; flag unchanged
//!         └─► (engine) session_started   → flag = true once delivered on host
//!             └─► stop_continuous_recognition()
//!                 └─► (engine) session_stopped / canceled → flag = false once delivered
//! drop(SessionBridge)                   → handlers detached, stop issued, engine disconnected
//! ```
//!
//! Start and stop never block and never report failure directly; a cancelled
//! session is only visible through `on_cancelled`. The bridge does not retry.
//!
//! ## Threading
//!
//! Engine handlers run on engine threads and only snapshot and enqueue. The
//! session flag is written from the host drain path, so
//! `has_session_started()` reflects the last lifecycle event the host has
//! *delivered*, which may lag what the engine has fired.
//!
//! Teardown covers events fired after it begins. A handler that was already
//! past its detach check may still enqueue one delivery, which runs if the
//! host drains after the bridge is dropped.

pub mod handlers;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{debug, info, warn};

use crate::{
    config::BridgeConfig,
    engine::{EngineFactory, PhraseListGrammar, RecognitionEngine},
    error::Result,
    ipc::events::{CanceledPayload, RecognizedPayload, RecognizingPayload, SessionPayload},
    relay::{CallbackSlot, HostHandle},
};

use handlers::BridgeHandlers;

/// The five callback slots, one per event kind.
pub(crate) struct Slots {
    pub(crate) started: CallbackSlot<SessionPayload>,
    pub(crate) stopped: CallbackSlot<SessionPayload>,
    pub(crate) canceled: CallbackSlot<CanceledPayload>,
    pub(crate) recognizing: CallbackSlot<RecognizingPayload>,
    pub(crate) recognized: CallbackSlot<RecognizedPayload>,
}

impl Slots {
    fn new(host: &HostHandle) -> Self {
        Self {
            started: CallbackSlot::new("started", host.clone()),
            stopped: CallbackSlot::new("stopped", host.clone()),
            canceled: CallbackSlot::new("canceled", host.clone()),
            recognizing: CallbackSlot::new("recognizing", host.clone()),
            recognized: CallbackSlot::new("recognized", host.clone()),
        }
    }
}

pub struct SessionBridge {
    engine: Arc<dyn RecognitionEngine>,
    grammar: Arc<dyn PhraseListGrammar>,
    slots: Arc<Slots>,
    /// Written only by host-side deliveries; see module docs.
    session_active: Arc<AtomicBool>,
    /// Set when teardown begins; handlers ignore events fired after that.
    detached: Arc<AtomicBool>,
}

impl SessionBridge {
    /// Create the engine from `config` and connect the event handlers.
    ///
    /// Does not wait on the network. Invalid credentials surface later as a
    /// cancelled session.
    ///
    /// # Errors
    /// `BridgeError::Engine` if the factory cannot create an engine.
    pub fn new(config: &BridgeConfig, factory: &dyn EngineFactory, host: HostHandle) -> Result<Self> {
        let engine = factory.create(config)?;
        let grammar = engine.phrase_grammar();

        let slots = Arc::new(Slots::new(&host));
        let session_active = Arc::new(AtomicBool::new(false));
        let detached = Arc::new(AtomicBool::new(false));

        engine.connect(Arc::new(BridgeHandlers {
            slots: Arc::clone(&slots),
            session_active: Arc::clone(&session_active),
            detached: Arc::clone(&detached),
            host,
        }));

        info!(region = config.region(), "session bridge ready");
        Ok(Self {
            engine,
            grammar,
            slots,
            session_active,
            detached,
        })
    }

    /// Register a phrase pattern for `intent_id`. Applies to the running
    /// session too, and survives stop/start.
    pub fn add_intent(&self, phrase: &str, intent_id: &str) {
        debug!(phrase, intent_id, "adding intent");
        self.engine.add_intent(phrase, intent_id);
    }

    /// Append a recognition hint. Effective immediately.
    pub fn add_phrase(&self, phrase: &str) {
        debug!(phrase, "adding phrase hint");
        self.grammar.add_phrase(phrase);
    }

    /// Request a continuous session. Repeated calls are passed through.
    pub fn start_continuous_recognition(&self) {
        info!("continuous recognition start requested");
        self.engine.start_continuous_async();
    }

    /// Request the session to end. Harmless when nothing is running.
    pub fn stop_continuous_recognition(&self) {
        info!("continuous recognition stop requested");
        self.engine.stop_continuous_async();
    }

    pub fn on_started<F>(&self, callback: F)
    where
        F: Fn(SessionPayload) + Send + Sync + 'static,
    {
        self.slots.started.set(callback);
    }

    pub fn on_stopped<F>(&self, callback: F)
    where
        F: Fn(SessionPayload) + Send + Sync + 'static,
    {
        self.slots.stopped.set(callback);
    }

    pub fn on_recognizing<F>(&self, callback: F)
    where
        F: Fn(RecognizingPayload) + Send + Sync + 'static,
    {
        self.slots.recognizing.set(callback);
    }

    pub fn on_recognized<F>(&self, callback: F)
    where
        F: Fn(RecognizedPayload) + Send + Sync + 'static,
    {
        self.slots.recognized.set(callback);
    }

    pub fn on_cancelled<F>(&self, callback: F)
    where
        F: Fn(CanceledPayload) + Send + Sync + 'static,
    {
        self.slots.canceled.set(callback);
    }

    /// Whether the last lifecycle event delivered to the host was a start.
    pub fn has_session_started(&self) -> bool {
        self.session_active.load(Ordering::Acquire)
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.detached.store(true, Ordering::Release);
        debug!(
            session_active = self.has_session_started(),
            "tearing down session bridge"
        );

        let engine = Arc::clone(&self.engine);
        let stopped = catch_unwind(AssertUnwindSafe(|| {
            engine.stop_continuous_async();
            engine.disconnect();
        }));
        if stopped.is_err() {
            warn!("engine stop failed during teardown; ignoring");
        }
    }
}
