//! # intent-bridge-core
//!
//! Bridges a continuous intent-recognition engine to a host that consumes
//! results through callbacks on a single thread.
//!
//! ## Architecture
//!
//! ```text
//! Host ──► BridgeObject (validation) ──► SessionBridge ──► RecognitionEngine
//!                                                             │ (engine thread)
//!                                                    BridgeHandlers: snapshot
//!                                                             │
//!                                             CallbackRelay::call ─► HostHandle
//!                                                             │
//! Host ◄── registered callback ◄── HostContext::run_pending() ◄┘
//! ```
//!
//! Engine handlers only copy event data and enqueue. All callbacks, and all
//! writes to the session-active flag, happen when the host drains its
//! `HostContext`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod boundary;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod relay;

// Convenience re-exports for downstream crates
pub use boundary::{BridgeObject, HostFunction, HostValue};
pub use bridge::{handlers::RecognitionSnapshot, SessionBridge};
pub use config::BridgeConfig;
pub use engine::{
    EngineFactory, RecognitionEngine, RecognitionEvents, SimulatedEngine, SimulatedEngineFactory,
};
pub use error::{ArgumentError, BridgeError, ConfigError, EngineError, PayloadError};
pub use ipc::events::{
    CanceledPayload, IntentMatch, RecognizedPayload, RecognizingPayload, SessionPayload,
};
pub use relay::{HostContext, HostHandle, HostScope};
