//! Per-reader configuration properties.
//!
//! Logical readers are described by flat string properties. Vendors and
//! deployments disagree on spelling (`IP` vs `ip`), so every lookup takes a
//! list of accepted keys and the first present one wins. Values are trimmed
//! and an empty value counts as missing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

use tagwire_core::{Error, Result};

/// String-keyed reader properties.
///
/// # Examples
///
/// ```
/// use tagwire_adapters::AdapterConfig;
///
/// let config = AdapterConfig::new()
///     .with("ip", " 10.0.0.5 ")
///     .with("Port", "5084")
///     .with("ReadTID", "");
///
/// assert_eq!(config.get(&["IP", "ip"]), Some("10.0.0.5"));
/// assert_eq!(config.port(&["Port", "port"], 0).unwrap(), 5084);
/// assert_eq!(config.get(&["ReadTID"]), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterConfig {
    properties: HashMap<String, String>,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// First non-empty value among `keys`, trimmed.
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.properties.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Like [`get`](Self::get), but a missing value is an error named after
    /// the first key.
    pub fn require(&self, keys: &[&str]) -> Result<&str> {
        self.get(keys)
            .ok_or_else(|| Error::MissingConfig(label(keys).into()))
    }

    /// TCP port, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the value is present but is not a
    /// valid port number.
    pub fn port(&self, keys: &[&str], default: u16) -> Result<u16> {
        match self.get(keys) {
            Some(value) => parse_port(value),
            None => Ok(default),
        }
    }

    /// TCP port that must be present.
    pub fn require_port(&self, keys: &[&str]) -> Result<u16> {
        parse_port(self.require(keys)?)
    }

    /// Boolean flag, case-insensitive `true`/`false`.
    ///
    /// An unparsable value is logged and replaced by `default`.
    pub fn bool_or(&self, keys: &[&str], default: bool) -> bool {
        let Some(value) = self.get(keys) else {
            return default;
        };

        if value.eq_ignore_ascii_case("true") {
            true
        } else if value.eq_ignore_ascii_case("false") {
            false
        } else {
            error!("Invalid {} value ({}), using default: {}", label(keys), value, default);
            default
        }
    }

    /// Unsigned number, or `default` when absent or unparsable.
    pub fn u64_or(&self, keys: &[&str], default: u64) -> u64 {
        match self.get(keys).map(str::parse::<u64>) {
            Some(Ok(value)) => value,
            Some(Err(_)) => {
                error!("Invalid {} value, using default: {}", label(keys), default);
                default
            }
            None => default,
        }
    }

    /// Comma separated list; blank items are dropped.
    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        self.get(keys)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AdapterConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn label<'a>(keys: &[&'a str]) -> &'a str {
    keys.first().copied().unwrap_or_default()
}

fn parse_port(value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!("Invalid port: {value}"))),
        Ok(port) => Ok(port),
    }
}
