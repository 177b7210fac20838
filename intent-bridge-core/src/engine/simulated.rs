//! `SimulatedEngine`: in-process stand-in for the cloud recognizer.
//!
//! Behaves like the real engine from the bridge's point of view: requests
//! return immediately, and every event is fired later from the engine's own
//! worker thread. Instead of audio it takes utterances through [`speak`],
//! which are matched against the registered intent patterns.
//!
//! Per utterance it fires one `recognizing` event per word prefix, then one
//! `recognized` event. A factory built with
//! [`SimulatedEngineFactory::rejecting_credentials`] accepts construction but
//! cancels every start with an authentication error, as the service would.
//!
//! [`speak`]: SimulatedEngine::speak

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::events::{
    CanceledEventArgs, CancellationReason, IntentRecognitionResult, SessionEventArgs,
};
use super::pattern::{normalize_word, IntentPattern};
use super::{EngineFactory, PhraseListGrammar, RecognitionEngine, RecognitionEvents};
use crate::config::BridgeConfig;
use crate::error::EngineError;

/// Requests an engine received, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRequest {
    Start,
    Stop,
    AddIntent { phrase: String, intent_id: String },
    AddPhrase(String),
    Connect,
    Disconnect,
}

const AUTH_FAILURE_CODE: &str = "AuthenticationFailure";
const AUTH_FAILURE_DETAILS: &str =
    "WebSocket upgrade failed: Authentication error (401). Please check subscription information and region name.";

enum Command {
    Start,
    Stop,
    Speak(String),
    Fail { code: String, details: String },
    EndOfStream,
    Shutdown,
}

struct Shared {
    intents: RwLock<Vec<(IntentPattern, String)>>,
    grammar: Arc<SimulatedPhraseList>,
    receiver: RwLock<Option<Arc<dyn RecognitionEvents>>>,
    requests: Mutex<Vec<EngineRequest>>,
    credentials_valid: bool,
}

impl Shared {
    fn record(&self, request: EngineRequest) {
        self.requests.lock().push(request);
    }

    fn receiver(&self) -> Option<Arc<dyn RecognitionEvents>> {
        self.receiver.read().clone()
    }

    fn recognize(&self, utterance: &str) -> IntentRecognitionResult {
        let text = self.grammar.bias(utterance);
        let intents = self.intents.read();
        for (pattern, intent_id) in intents.iter() {
            if let Some(entities) = pattern.matches(&text) {
                return IntentRecognitionResult {
                    text,
                    intent_id: intent_id.clone(),
                    entities,
                };
            }
        }
        IntentRecognitionResult::text_only(text)
    }
}

pub struct SimulatedEngine {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedEngine {
    pub fn new(credentials_valid: bool) -> Self {
        let shared = Arc::new(Shared {
            intents: RwLock::new(Vec::new()),
            grammar: Arc::new(SimulatedPhraseList::default()),
            receiver: RwLock::new(None),
            requests: Mutex::new(Vec::new()),
            credentials_valid,
        });
        let (commands, inbox) = unbounded();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("sim-recognizer".into())
            .spawn(move || run_worker(worker_shared, inbox))
            .ok();
        if worker.is_none() {
            warn!("failed to spawn simulated recognizer thread; events will not fire");
        }

        Self {
            shared,
            commands,
            worker: Mutex::new(worker),
        }
    }

    /// Feed an utterance as if it had been heard. Ignored outside a session.
    pub fn speak(&self, utterance: impl Into<String>) {
        self.send(Command::Speak(utterance.into()));
    }

    /// Cancel the active session with an error, as a dropped connection would.
    pub fn fail(&self, code: impl Into<String>, details: impl Into<String>) {
        self.send(Command::Fail {
            code: code.into(),
            details: details.into(),
        });
    }

    /// Cancel the active session because the audio source ran out.
    pub fn end_of_stream(&self) {
        self.send(Command::EndOfStream);
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.shared.requests.lock().clone()
    }

    pub fn phrases(&self) -> Vec<String> {
        self.shared.grammar.phrases()
    }

    pub fn intent_count(&self) -> usize {
        self.shared.intents.read().len()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("simulated recognizer worker has exited; command dropped");
        }
    }
}

impl RecognitionEngine for SimulatedEngine {
    fn start_continuous_async(&self) {
        self.shared.record(EngineRequest::Start);
        self.send(Command::Start);
    }

    fn stop_continuous_async(&self) {
        self.shared.record(EngineRequest::Stop);
        self.send(Command::Stop);
    }

    fn add_intent(&self, phrase: &str, intent_id: &str) {
        self.shared.record(EngineRequest::AddIntent {
            phrase: phrase.to_string(),
            intent_id: intent_id.to_string(),
        });
        let mut intents = self.shared.intents.write();
        let exists = intents
            .iter()
            .any(|(p, id)| p.source() == phrase && id == intent_id);
        if !exists {
            intents.push((IntentPattern::parse(phrase), intent_id.to_string()));
        }
    }

    fn phrase_grammar(&self) -> Arc<dyn PhraseListGrammar> {
        Arc::new(RecordingGrammar {
            shared: Arc::clone(&self.shared),
        })
    }

    fn connect(&self, events: Arc<dyn RecognitionEvents>) {
        self.shared.record(EngineRequest::Connect);
        *self.shared.receiver.write() = Some(events);
    }

    fn disconnect(&self) {
        self.shared.record(EngineRequest::Disconnect);
        *self.shared.receiver.write() = None;
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run_worker(shared: Arc<Shared>, inbox: Receiver<Command>) {
    let mut session: Option<String> = None;

    for command in inbox.iter() {
        let receiver = shared.receiver();
        match command {
            Command::Start => {
                if session.is_some() {
                    debug!("start requested while a session is active; ignoring");
                    continue;
                }
                let session_id = new_session_id();
                if !shared.credentials_valid {
                    if let Some(r) = receiver {
                        r.canceled(&CanceledEventArgs {
                            session_id,
                            reason: CancellationReason::Error,
                            error_code: Some(AUTH_FAILURE_CODE.into()),
                            error_details: AUTH_FAILURE_DETAILS.into(),
                        });
                    }
                    continue;
                }
                if let Some(r) = receiver {
                    r.session_started(&SessionEventArgs {
                        session_id: session_id.clone(),
                    });
                }
                session = Some(session_id);
            }
            Command::Stop => {
                if let Some(session_id) = session.take() {
                    if let Some(r) = receiver {
                        r.session_stopped(&SessionEventArgs { session_id });
                    }
                }
            }
            Command::Speak(utterance) => {
                if session.is_none() {
                    debug!("utterance outside of a session dropped");
                    continue;
                }
                let Some(r) = receiver else { continue };
                let words: Vec<&str> = utterance.split_whitespace().collect();
                for end in 1..=words.len() {
                    r.recognizing(&IntentRecognitionResult::text_only(words[..end].join(" ")));
                }
                r.recognized(&shared.recognize(&words.join(" ")));
            }
            Command::Fail { code, details } => {
                if let Some(session_id) = session.take() {
                    if let Some(r) = receiver {
                        r.canceled(&CanceledEventArgs {
                            session_id,
                            reason: CancellationReason::Error,
                            error_code: Some(code),
                            error_details: details,
                        });
                    }
                }
            }
            Command::EndOfStream => {
                if let Some(session_id) = session.take() {
                    if let Some(r) = receiver {
                        r.canceled(&CanceledEventArgs {
                            session_id,
                            reason: CancellationReason::EndOfStream,
                            error_code: None,
                            error_details: "audio stream ended".into(),
                        });
                    }
                }
            }
            Command::Shutdown => break,
        }
    }
}

fn new_session_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

// ---------------------------------------------------------------------------
// Phrase list
// ---------------------------------------------------------------------------

/// Insertion-ordered phrase hints.
///
/// Biasing is modelled as re-splitting run-together words: with the hint
/// `"on line"`, a heard `"online"` is reported as `"on line"`.
#[derive(Debug, Default)]
pub struct SimulatedPhraseList {
    phrases: RwLock<Vec<String>>,
}

impl SimulatedPhraseList {
    pub fn phrases(&self) -> Vec<String> {
        self.phrases.read().clone()
    }

    fn bias(&self, utterance: &str) -> String {
        let phrases = self.phrases.read();
        if phrases.is_empty() {
            return utterance.to_string();
        }
        utterance
            .split_whitespace()
            .map(|word| {
                let heard = normalize_word(word);
                phrases
                    .iter()
                    .find(|hint| {
                        hint.contains(' ') && hint.replace(' ', "").to_lowercase() == heard
                    })
                    .cloned()
                    .unwrap_or_else(|| word.to_string())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PhraseListGrammar for SimulatedPhraseList {
    fn add_phrase(&self, phrase: &str) {
        self.phrases.write().push(phrase.to_string());
    }

    fn clear(&self) {
        self.phrases.write().clear();
    }
}

/// Grammar handle that also records requests on the owning engine.
struct RecordingGrammar {
    shared: Arc<Shared>,
}

impl PhraseListGrammar for RecordingGrammar {
    fn add_phrase(&self, phrase: &str) {
        self.shared
            .record(EngineRequest::AddPhrase(phrase.to_string()));
        self.shared.grammar.add_phrase(phrase);
    }

    fn clear(&self) {
        self.shared.grammar.clear();
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds `SimulatedEngine`s and keeps a handle to each one for inspection.
#[derive(Default)]
pub struct SimulatedEngineFactory {
    reject_credentials: bool,
    created: Mutex<Vec<Arc<SimulatedEngine>>>,
}

impl SimulatedEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines from this factory cancel every session with an auth error.
    pub fn rejecting_credentials() -> Self {
        Self {
            reject_credentials: true,
            ..Self::default()
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn last_engine(&self) -> Option<Arc<SimulatedEngine>> {
        self.created.lock().last().cloned()
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, config: &BridgeConfig) -> Result<Arc<dyn RecognitionEngine>, EngineError> {
        debug!(region = config.region(), "creating simulated recognizer");
        let engine = Arc::new(SimulatedEngine::new(!self.reject_credentials));
        self.created.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<String>>,
    }

    impl RecognitionEvents for Collector {
        fn session_started(&self, _event: &SessionEventArgs) {
            self.events.lock().push("started".into());
        }
        fn session_stopped(&self, _event: &SessionEventArgs) {
            self.events.lock().push("stopped".into());
        }
        fn canceled(&self, event: &CanceledEventArgs) {
            self.events
                .lock()
                .push(format!("canceled:{}", event.error_code.clone().unwrap_or_default()));
        }
        fn recognizing(&self, result: &IntentRecognitionResult) {
            self.events.lock().push(format!("recognizing:{}", result.text));
        }
        fn recognized(&self, result: &IntentRecognitionResult) {
            self.events
                .lock()
                .push(format!("recognized:{}:{}", result.intent_id, result.text));
        }
    }

    fn wait_for(collector: &Collector, count: usize) -> Vec<String> {
        for _ in 0..400 {
            let events = collector.events.lock().clone();
            if events.len() >= count {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out waiting for {count} engine events");
    }

    #[test]
    fn fires_lifecycle_and_results_in_order() {
        let engine = SimulatedEngine::new(true);
        let collector = Arc::new(Collector::default());
        engine.connect(collector.clone());
        engine.add_intent("Go to line {lineNumber}", "Voice.Positioning");

        engine.start_continuous_async();
        engine.speak("go to line 4");
        engine.stop_continuous_async();

        let events = wait_for(&collector, 7);
        assert_eq!(
            events,
            vec![
                "started",
                "recognizing:go",
                "recognizing:go to",
                "recognizing:go to line",
                "recognizing:go to line 4",
                "recognized:Voice.Positioning:go to line 4",
                "stopped",
            ]
        );
    }

    #[test]
    fn rejected_credentials_cancel_on_start() {
        let engine = SimulatedEngine::new(false);
        let collector = Arc::new(Collector::default());
        engine.connect(collector.clone());

        engine.start_continuous_async();
        let events = wait_for(&collector, 1);
        assert_eq!(events, vec![format!("canceled:{AUTH_FAILURE_CODE}")]);
    }

    #[test]
    fn phrase_hints_resplit_run_together_words() {
        let engine = SimulatedEngine::new(true);
        engine.phrase_grammar().add_phrase("on line");
        engine.add_intent("Toggle breakpoint on line {line}", "Voice.Debugging");

        let result = engine.shared.recognize("toggle breakpoint online 7");
        assert_eq!(result.text, "toggle breakpoint on line 7");
        assert_eq!(result.intent_id, "Voice.Debugging");
        assert_eq!(result.entities["line"], "7");
        assert_eq!(engine.phrases(), vec!["on line".to_string()]);
    }

    #[test]
    fn duplicate_intents_are_registered_once() {
        let engine = SimulatedEngine::new(true);
        engine.add_intent("undo", "Voice.Undo");
        engine.add_intent("undo", "Voice.Undo");
        assert_eq!(engine.intent_count(), 1);
        assert_eq!(engine.requests().len(), 2);
    }

    #[test]
    fn stop_without_session_fires_nothing() {
        let engine = SimulatedEngine::new(true);
        let collector = Arc::new(Collector::default());
        engine.connect(collector.clone());

        engine.stop_continuous_async();
        engine.speak("hello");
        thread::sleep(Duration::from_millis(50));
        assert!(collector.events.lock().is_empty());
    }
}
