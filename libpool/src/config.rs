//! Matching configuration.
//!
//! Controls how strictly pool attributes are decoded. The configuration is
//! never consulted implicitly: callers hand a [`MatchConfig`] (usually
//! [`MATCH_CONFIG`]) to [`StoragePoolDescriptor::from_json_with`](crate::pool::StoragePoolDescriptor::from_json_with).
//!
//! Environment variables:
//! - `LIBPOOL_DECODE_MODE`: `strict` rejects a pool description when one
//!   attribute looks like a numeric range but is not a valid one; `lenient`
//!   keeps it as a generic offer. Defaults to `lenient`.

use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Interface kind selected by [`AuthSession::resolve_endpoint`](crate::catalog::AuthSession::resolve_endpoint).
pub const PUBLIC_INTERFACE: &str = "public";

/// Per-attribute failure policy for [`decode_offer_map`](crate::offer::decode_offer_map).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// A malformed attribute fails the whole decode.
    Strict,
    /// A malformed attribute becomes a generic offer.
    #[default]
    Lenient,
}

impl FromStr for DecodeMode {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(PoolError::InvalidArgument(format!(
                "unknown decode mode {other:?}, expected strict or lenient"
            ))),
        }
    }
}

/// Tunables for decoding pool descriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchConfig {
    /// Attribute decode policy.
    #[serde(default)]
    pub decode_mode: DecodeMode,
}

impl MatchConfig {
    /// Build a configuration from the process environment.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let decode_mode = lookup("LIBPOOL_DECODE_MODE")
            .and_then(|v| v.parse::<DecodeMode>().ok())
            .unwrap_or_default();
        Self { decode_mode }
    }
}

/// Globally initialized configuration, read from environment variables at
/// first access.
pub static MATCH_CONFIG: LazyLock<MatchConfig> = LazyLock::new(MatchConfig::from_env);
