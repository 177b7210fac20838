//! Subscription credentials for the recognition engine.
//!
//! A `BridgeConfig` can only be obtained through validation, so holding one
//! means both values are present and non-empty. Whitespace-only values count
//! as empty; accepted values are stored unmodified.

use serde::Deserialize;

use crate::boundary::value::HostValue;
use crate::error::ConfigError;

/// Environment variable holding the subscription key.
pub const KEY_ENV: &str = "SUBSCRIPTION_KEY";
/// Environment variable holding the service region.
pub const REGION_ENV: &str = "REGION";

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct BridgeConfig {
    key: String,
    region: String,
}

#[derive(Deserialize)]
struct RawConfig {
    key: Option<String>,
    region: Option<String>,
}

impl TryFrom<RawConfig> for BridgeConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let key = raw.key.ok_or(ConfigError::MissingKey)?;
        let region = raw.region.ok_or(ConfigError::MissingRegion)?;
        Self::new(key, region)
    }
}

impl BridgeConfig {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Result<Self, ConfigError> {
        let key = non_empty("key", key.into())?;
        let region = non_empty("region", region.into())?;
        Ok(Self { key, region })
    }

    /// Validate an untyped config object handed over by the host.
    ///
    /// Checks run in order: object present, `key` present, `region` present,
    /// both strings, both non-empty.
    pub fn from_host_value(value: Option<&HostValue>) -> Result<Self, ConfigError> {
        let fields = match value {
            Some(HostValue::Object(fields)) => fields,
            _ => return Err(ConfigError::MissingObject),
        };

        let key = present(fields.get("key")).ok_or(ConfigError::MissingKey)?;
        let region = present(fields.get("region")).ok_or(ConfigError::MissingRegion)?;

        let key = key.as_str().ok_or(ConfigError::WrongType { field: "key" })?;
        let region = region
            .as_str()
            .ok_or(ConfigError::WrongType { field: "region" })?;

        Self::new(key, region)
    }

    /// Read credentials from `SUBSCRIPTION_KEY` / `REGION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var(KEY_ENV).map_err(|_| ConfigError::MissingKey)?;
        let region = std::env::var(REGION_ENV).map_err(|_| ConfigError::MissingRegion)?;
        Self::new(key, region)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Rejects blank values; accepted values are kept exactly as given.
fn non_empty(field: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue { field });
    }
    Ok(value)
}

/// `undefined` counts as absent, the same way a host object lookup would.
fn present(value: Option<&HostValue>) -> Option<&HostValue> {
    value.filter(|v| !matches!(v, HostValue::Undefined))
}
