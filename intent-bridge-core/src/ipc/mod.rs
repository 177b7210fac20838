//! Payload types handed to host callbacks.
//!
//! All types derive `serde::Serialize` so the boundary layer can turn them into
//! JSON before a host function sees them.

pub mod events;
