//! Host-facing object: untyped arguments in, validated calls on
//! `SessionBridge` out.
//!
//! All shape checking lives here so the bridge itself only ever sees typed
//! values. Method names follow the host's camelCase convention; the short
//! `startRecognition` / `stopRecognition` aliases are accepted too.
//!
//! | Method | Arguments | Errors |
//! |--------|-----------|--------|
//! | `addIntent` | `(phrase: string, intentId: string)` | `ArgumentError` |
//! | `addPhrase` | `(phrase: string)` | `ArgumentError` |
//! | `startContinuousRecognition` | none | none |
//! | `stopContinuousRecognition` | none | none |
//! | `onStarted` … `onCancelled` | `(callback)` | `ArgumentError` if not callable |
//! | `hasSessionStarted` | none | none |

pub mod value;

use serde::Serialize;
use tracing::warn;

use crate::{
    bridge::SessionBridge,
    config::BridgeConfig,
    engine::EngineFactory,
    error::{ArgumentError, PayloadError, Result},
    relay::HostHandle,
};

pub use value::{HostFunction, HostValue};

pub struct BridgeObject {
    bridge: SessionBridge,
}

impl BridgeObject {
    /// `new VoiceRecognizer({ key, region })`.
    ///
    /// # Errors
    /// `BridgeError::Config` before any engine is created if the config
    /// object is missing or incomplete.
    pub fn construct(
        args: &[HostValue],
        factory: &dyn EngineFactory,
        host: HostHandle,
    ) -> Result<Self> {
        let config = BridgeConfig::from_host_value(args.first())?;
        let bridge = SessionBridge::new(&config, factory, host)?;
        Ok(Self { bridge })
    }

    pub fn bridge(&self) -> &SessionBridge {
        &self.bridge
    }

    /// Dispatch a host method call.
    pub fn invoke(&self, method: &str, args: &[HostValue]) -> Result<HostValue> {
        match method {
            "addIntent" => {
                let [phrase, intent_id] = strings::<2>("addIntent", args)?;
                self.bridge.add_intent(phrase, intent_id);
            }
            "addPhrase" => {
                let [phrase] = strings::<1>("addPhrase", args)?;
                self.bridge.add_phrase(phrase);
            }
            "startContinuousRecognition" | "startRecognition" => {
                self.bridge.start_continuous_recognition();
            }
            "stopContinuousRecognition" | "stopRecognition" => {
                self.bridge.stop_continuous_recognition();
            }
            "onStarted" => {
                let f = callable("onStarted", args)?;
                self.bridge.on_started(forward("started", f));
            }
            "onStopped" => {
                let f = callable("onStopped", args)?;
                self.bridge.on_stopped(forward("stopped", f));
            }
            "onRecognizing" => {
                let f = callable("onRecognizing", args)?;
                self.bridge.on_recognizing(forward("recognizing", f));
            }
            "onRecognized" => {
                let f = callable("onRecognized", args)?;
                self.bridge.on_recognized(forward("recognized", f));
            }
            "onCancelled" => {
                let f = callable("onCancelled", args)?;
                self.bridge.on_cancelled(forward("canceled", f));
            }
            "hasSessionStarted" => {
                return Ok(HostValue::Bool(self.bridge.has_session_started()));
            }
            other => {
                return Err(ArgumentError::UnknownMethod {
                    name: other.to_string(),
                }
                .into())
            }
        }
        Ok(HostValue::Undefined)
    }
}

/// Exactly `N` string arguments.
fn strings<'a, const N: usize>(
    method: &'static str,
    args: &'a [HostValue],
) -> std::result::Result<[&'a str; N], ArgumentError> {
    if args.len() != N {
        return Err(ArgumentError::Arity {
            method,
            expected: N,
            got: args.len(),
        });
    }

    let mut out = [""; N];
    for (index, (slot, arg)) in out.iter_mut().zip(args).enumerate() {
        *slot = arg.as_str().ok_or(ArgumentError::WrongType {
            method,
            index,
            expected: "string",
            got: arg.type_name(),
        })?;
    }
    Ok(out)
}

fn callable(
    method: &'static str,
    args: &[HostValue],
) -> std::result::Result<HostFunction, ArgumentError> {
    args.first()
        .and_then(HostValue::as_function)
        .cloned()
        .ok_or(ArgumentError::NotCallable { method })
}

/// Adapt a host function to a typed callback by converting the payload to JSON.
fn forward<P>(relay: &'static str, f: HostFunction) -> impl Fn(P) + Send + Sync + 'static
where
    P: Serialize + 'static,
{
    move |payload: P| match serde_json::to_value(&payload) {
        Ok(json) => f.call(json),
        Err(e) => {
            let e = PayloadError::Conversion(e.to_string());
            warn!(relay, error = %e, "event dropped");
        }
    }
}
