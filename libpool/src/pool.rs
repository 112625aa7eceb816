//! Storage pool descriptors and request matching.
//!
//! A [`StoragePoolDescriptor`] is decoded once from a backend's pool listing
//! and then only read. The attribute map lives behind an [`Arc`], so
//! [`StoragePoolDescriptor::construct_clone`] is cheap and both copies observe
//! the same offers, while each copy tracks its own `capacity_bytes`.
//!
//! # Accepted description shape
//!
//! ```text
//! {
//!   "capacity_bytes": 1073741824,     // or "free_capacity_gb": 1.0
//!   "attributes": { ... }             // or "capabilities": { ... }
//! }
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::config::{DecodeMode, MatchConfig};
use crate::error::{PoolError, Result};
use crate::offer::{OfferMap, decode_offer_map, json_kind};
use crate::types::VolumeRequest;

const GIB: f64 = (1u64 << 30) as f64;

#[derive(Debug, Deserialize)]
struct RawPoolDescription {
    #[serde(default)]
    capacity_bytes: Option<u64>,
    #[serde(default)]
    free_capacity_gb: Option<f64>,
    #[serde(default, alias = "capabilities")]
    attributes: Option<Value>,
}

/// Decoded description of one storage pool.
///
/// `Clone` shares the attribute map (see [`Self::construct_clone`]); use
/// [`Self::deep_clone`] unless the sharing is intended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePoolDescriptor {
    attributes: Arc<OfferMap>,
    capacity_bytes: u64,
}

impl StoragePoolDescriptor {
    pub fn new(attributes: OfferMap, capacity_bytes: u64) -> Self {
        Self {
            attributes: Arc::new(attributes),
            capacity_bytes,
        }
    }

    /// Decode a pool description from a JSON string.
    pub fn from_json(json: &str, mode: DecodeMode) -> Result<Self> {
        let raw: Value = serde_json::from_str(json).map_err(PoolError::decode)?;
        Self::from_value(&raw, mode)
    }

    /// Decode with the decode mode of an explicit `config`, e.g.
    /// [`MATCH_CONFIG`](crate::config::MATCH_CONFIG).
    pub fn from_json_with(json: &str, config: &MatchConfig) -> Result<Self> {
        Self::from_json(json, config.decode_mode)
    }

    /// Decode a pool description from an already parsed JSON value.
    ///
    /// `capacity_bytes` wins over `free_capacity_gb` when both are present.
    /// A description without either is a [`PoolError::DecodeFailure`].
    #[instrument(level = "debug", skip(raw))]
    pub fn from_value(raw: &Value, mode: DecodeMode) -> Result<Self> {
        if !raw.is_object() {
            return Err(PoolError::DecodeFailure(format!(
                "pool description must be a JSON object, found {}",
                json_kind(raw)
            )));
        }
        let desc: RawPoolDescription =
            serde_json::from_value(raw.clone()).map_err(PoolError::decode)?;

        let capacity_bytes = match (desc.capacity_bytes, desc.free_capacity_gb) {
            (Some(bytes), _) => bytes,
            (None, Some(gb)) if gb.is_finite() && gb >= 0.0 => (gb * GIB) as u64,
            (None, Some(gb)) => {
                return Err(PoolError::DecodeFailure(format!(
                    "free_capacity_gb must be a non-negative number, found {gb}"
                )));
            }
            (None, None) => {
                return Err(PoolError::DecodeFailure(
                    "pool description has no capacity".into(),
                ));
            }
        };

        let attributes = match desc.attributes {
            Some(attrs) => decode_offer_map(&attrs, mode)?,
            None => OfferMap::new(),
        };

        debug!(
            capacity_bytes,
            attributes = attributes.len(),
            "decoded pool description"
        );
        Ok(Self::new(attributes, capacity_bytes))
    }

    /// Decoded offers, keyed by capability name.
    pub fn attributes(&self) -> &OfferMap {
        &self.attributes
    }

    /// Authoritative available capacity.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Copy for local capacity tracking.
    ///
    /// The returned descriptor has the same capacity and *shares* the
    /// attribute map with `self`. Reserving capacity on the copy leaves the
    /// source untouched.
    pub fn construct_clone(&self) -> Self {
        self.clone()
    }

    /// Fully independent copy, including the attribute map.
    pub fn deep_clone(&self) -> Self {
        Self::new(OfferMap::clone(&self.attributes), self.capacity_bytes)
    }

    /// `true` when both descriptors alias the same attribute map.
    pub fn shares_attributes_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.attributes, &other.attributes)
    }

    /// Take `bytes` out of this descriptor's capacity.
    pub fn reserve(&mut self, bytes: u64) -> Result<()> {
        self.capacity_bytes = self.capacity_bytes.checked_sub(bytes).ok_or(
            PoolError::InsufficientCapacity {
                requested: bytes,
                available: self.capacity_bytes,
            },
        )?;
        Ok(())
    }

    /// Give `bytes` back, e.g. after a backend rejected a volume.
    pub fn release(&mut self, bytes: u64) {
        self.capacity_bytes = self.capacity_bytes.saturating_add(bytes);
    }

    /// Name of the first constraint (in name order) this pool does not meet.
    ///
    /// A constraint whose attribute the pool does not advertise at all is
    /// unmet.
    pub fn first_unmet<'c>(&self, constraints: &'c OfferMap) -> Option<&'c str> {
        let mut names: Vec<&'c String> = constraints.keys().collect();
        names.sort();
        names
            .into_iter()
            .find(|name| {
                let want = &constraints[name.as_str()];
                !self
                    .attributes
                    .get(name.as_str())
                    .is_some_and(|have| have.satisfies(want))
            })
            .map(String::as_str)
    }

    /// `true` when every constraint is met.
    pub fn satisfies_all(&self, constraints: &OfferMap) -> bool {
        self.first_unmet(constraints).is_none()
    }

    /// Check capacity and every constraint of `req`.
    pub fn check(&self, req: &VolumeRequest) -> Result<()> {
        if req.size_bytes > self.capacity_bytes {
            return Err(PoolError::InsufficientCapacity {
                requested: req.size_bytes,
                available: self.capacity_bytes,
            });
        }
        if let Some(name) = self.first_unmet(&req.constraints) {
            return Err(PoolError::Unsatisfied {
                capability: name.to_owned(),
                want: req.constraints[name].to_string(),
            });
        }
        Ok(())
    }

    /// Boolean form of [`Self::check`].
    pub fn fits(&self, req: &VolumeRequest) -> bool {
        self.check(req).is_ok()
    }
}

/// Choose a pool for `req` among named candidates.
///
/// When the request names a pool only that pool is considered, and its
/// mismatch is returned as-is. Otherwise the first fitting pool in input
/// order wins.
#[instrument(level = "debug", skip(pools, req), fields(volume = %req.name))]
pub fn select_pool<'a, I>(pools: I, req: &VolumeRequest) -> Result<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a StoragePoolDescriptor)>,
{
    let mut pools = pools.into_iter();

    if let Some(wanted) = req.requested_pool() {
        let (name, pool) = pools
            .find(|(name, _)| *name == wanted)
            .ok_or_else(|| PoolError::PoolNotFound(wanted.to_owned()))?;
        pool.check(req)?;
        debug!(pool = name, "requested pool fits");
        return Ok(name);
    }

    for (name, pool) in pools {
        match pool.check(req) {
            Ok(()) => {
                debug!(pool = name, "selected pool");
                return Ok(name);
            }
            Err(reason) => trace!(pool = name, %reason, "pool rejected"),
        }
    }
    Err(PoolError::NoEligiblePool(req.name.clone()))
}
