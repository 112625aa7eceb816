//! # libpool — storage pool matching and catalog endpoint resolution
//!
//! `libpool` holds the decision logic a volume scheduler needs before it can
//! place a volume: decoding what each storage pool offers, checking a
//! request's required capabilities against those offers, and finding the
//! management endpoint of a backend in an authenticated session's service
//! catalog. It performs no I/O; callers fetch pool listings and tokens and
//! persist the chosen pool themselves.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`offer`] | [`CapabilityOffer`] variants, attribute-map decoding, `satisfies`. |
//! | [`pool`] | [`StoragePoolDescriptor`], request checks, [`select_pool`]. |
//! | [`catalog`] | [`AuthSession`], service catalog records, endpoint lookup. |
//! | [`types`] | [`VolumeRequest`] and volume records. |
//! | [`config`] | [`MatchConfig`] and environment-driven defaults. |
//! | [`error`] | [`PoolError`] enum covering all failure modes. |

pub mod catalog;
pub mod config;
pub mod error;
pub mod offer;
pub mod pool;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use catalog::{AuthSession, Endpoint, ServiceCatalogEntry, resolve_endpoint};
pub use config::{DecodeMode, MATCH_CONFIG, MatchConfig};
pub use error::{PoolError, Result};
pub use offer::{CapabilityOffer, OfferMap, decode_offer_map, satisfies};
pub use pool::{StoragePoolDescriptor, select_pool};
pub use types::*;
