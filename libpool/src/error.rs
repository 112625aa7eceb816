//! Pool matching and catalog resolution error types.
//!
//! All errors in the `libpool` crate are represented by the [`PoolError`]
//! enum, which derives [`thiserror::Error`] and also implements
//! [`Serialize`]/[`Deserialize`] so an outer HTTP layer can forward them
//! verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = PoolError> = std::result::Result<T, E>;

/// Unified error type for offer decoding, pool matching and endpoint
/// resolution.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The outer attribute structure is not a JSON object.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// A single attribute has a shape no offer variant accepts.
    ///
    /// Only raised in [`DecodeMode::Strict`](crate::config::DecodeMode);
    /// lenient decoding downgrades the attribute to a generic offer instead.
    #[error("malformed attribute {name}: {reason}")]
    MalformedAttribute {
        /// Attribute key in the source map.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// No catalog entry carries the requested service type.
    #[error("service {0} not found in catalog")]
    ServiceNotFound(String),

    /// The service exists but none of its endpoints match the filter.
    #[error("no {interface} endpoint for service {service_type} in region {region}")]
    EndpointNotFound {
        /// Requested service type.
        service_type: String,
        /// Requested region.
        region: String,
        /// Interface kind that was filtered on (usually `public`).
        interface: String,
    },

    /// An auth session was built without an expiry instant.
    #[error("auth session is missing an expiry")]
    MissingExpiry,

    /// A pool cannot hold the requested number of bytes.
    #[error("insufficient capacity: requested {requested} bytes, {available} available")]
    InsufficientCapacity {
        /// Bytes asked for.
        requested: u64,
        /// Bytes the pool currently has.
        available: u64,
    },

    /// A pool lacks a required capability, or offers it in a form that does
    /// not satisfy the request.
    #[error("capability {capability} not satisfied, wanted {want}")]
    Unsatisfied {
        /// Attribute name from the request's constraints.
        capability: String,
        /// Display form of the wanted offer.
        want: String,
    },

    /// The request named a pool that is not among the candidates.
    #[error("pool {0} not found")]
    PoolNotFound(String),

    /// No candidate pool fits the request.
    #[error("no eligible pool for volume {0}")]
    NoEligiblePool(String),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PoolError {
    /// Create a [`PoolError::DecodeFailure`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn decode<E: std::fmt::Display>(e: E) -> Self {
        Self::DecodeFailure(e.to_string())
    }

    /// Create a [`PoolError::MalformedAttribute`].
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// `true` for both catalog misses.
    ///
    /// Callers that do not care whether the service or only the endpoint was
    /// missing can branch on this instead of matching two variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound(_) | Self::EndpointNotFound { .. }
        )
    }
}
