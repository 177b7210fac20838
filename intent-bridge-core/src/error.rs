use thiserror::Error;

/// Construction-time credential problems. Fatal to the construction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("a config object containing a key and region is required")]
    MissingObject,

    #[error("key argument missing from config")]
    MissingKey,

    #[error("region argument missing from config")]
    MissingRegion,

    #[error("config value `{field}` must not be empty")]
    EmptyValue { field: &'static str },

    #[error("config value `{field}` must be a string")]
    WrongType { field: &'static str },
}

/// Call-time argument shape problems. The call is rejected and no state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("{method} expects {expected} argument(s), got {got}")]
    Arity {
        method: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{method}: argument {index} must be of type {expected}, got {got}")]
    WrongType {
        method: &'static str,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{method} expects a callable argument")]
    NotCallable { method: &'static str },

    #[error("unknown method `{name}`")]
    UnknownMethod { name: String },
}

/// Failure while building a callback payload on the host side.
///
/// Never surfaced to the host: the relay logs it and drops the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload builder failed: {0}")]
    Build(String),

    #[error("payload builder panicked: {0}")]
    Panicked(String),

    #[error("payload conversion failed: {0}")]
    Conversion(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("recognition engine could not be created: {0}")]
    Creation(String),
}

/// All errors produced by intent-bridge-core.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
