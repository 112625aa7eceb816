//! Volume requests and volume records.
//!
//! [`VolumeRequest`] is what a scheduler asks for; [`CreatingVolume`] and
//! [`Volume`] are plain records handed to the metadata store once a pool has
//! been chosen. Nothing here persists anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::offer::OfferMap;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to place a new volume on some pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeRequest {
    /// Human-readable name for the volume.
    pub name: String,
    /// Pool the caller would like, if any. Empty means "any pool".
    #[serde(default)]
    pub requested_pool_name: String,
    /// Desired size in bytes.
    pub size_bytes: u64,
    /// Capabilities the chosen pool must satisfy, keyed by attribute name.
    #[serde(default)]
    pub constraints: OfferMap,
}

impl VolumeRequest {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            ..Default::default()
        }
    }

    /// Pin the request to a named pool.
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.requested_pool_name = pool.into();
        self
    }

    /// Add one required capability.
    pub fn with_constraint(
        mut self,
        name: impl Into<String>,
        want: crate::offer::CapabilityOffer,
    ) -> Self {
        self.constraints.insert(name.into(), want);
        self
    }

    /// The requested pool name, or `None` when the caller left it empty.
    pub fn requested_pool(&self) -> Option<&str> {
        Some(self.requested_pool_name.as_str()).filter(|name| !name.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Volume records
// ---------------------------------------------------------------------------

/// Lifecycle status of a volume record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VolumeStatus {
    /// A pool was chosen; the backend has not confirmed creation yet.
    Creating,
    /// The backend reports the volume as usable.
    Available,
    /// The backend rejected the volume.
    Error,
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Error => "error",
        })
    }
}

/// A volume whose pool has been decided but whose backend call is pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatingVolume {
    pub name: String,
    pub pool_name: String,
    pub size_bytes: u64,
}

impl CreatingVolume {
    /// Record that `req` was matched to `pool_name`.
    pub fn from_request(req: &VolumeRequest, pool_name: impl Into<String>) -> Self {
        Self {
            name: req.name.clone(),
            pool_name: pool_name.into(),
            size_bytes: req.size_bytes,
        }
    }

    /// Promote to a full record once the backend assigned an identifier.
    pub fn into_volume(self, volume_id: impl Into<String>) -> Volume {
        Volume {
            volume_id: volume_id.into(),
            name: self.name,
            pool_name: self.pool_name,
            size_bytes: self.size_bytes,
            status: VolumeStatus::Creating,
        }
    }
}

/// Volume metadata as tracked by the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Backend-assigned identifier.
    pub volume_id: String,
    pub name: String,
    /// Pool the volume was placed on.
    pub pool_name: String,
    pub size_bytes: u64,
    pub status: VolumeStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::CapabilityOffer;

    #[test]
    fn request_default() {
        let req = VolumeRequest::default();
        assert!(req.name.is_empty());
        assert_eq!(req.size_bytes, 0);
        assert_eq!(req.requested_pool(), None);
    }

    #[test]
    fn request_builder() {
        let req = VolumeRequest::new("data", 1 << 30)
            .with_pool("fast")
            .with_constraint("thin", CapabilityOffer::boolean(true));
        assert_eq!(req.requested_pool(), Some("fast"));
        assert_eq!(req.constraints["thin"], CapabilityOffer::boolean(true));
    }

    #[test]
    fn request_deserializes_constraints() {
        let req: VolumeRequest = serde_json::from_str(
            r#"{"name":"db","size_bytes":10,"constraints":{"iops":[100,200],"tier":["gold"]}}"#,
        )
        .expect("deserialize");
        assert_eq!(
            req.constraints["iops"],
            CapabilityOffer::range(100, 200).expect("range")
        );
        assert_eq!(req.constraints["tier"], CapabilityOffer::choices(["gold"]));
    }

    #[test]
    fn creating_volume_promotes() {
        let req = VolumeRequest::new("logs", 4096);
        let vol = CreatingVolume::from_request(&req, "pool-a").into_volume("vol-1");
        assert_eq!(vol.pool_name, "pool-a");
        assert_eq!(vol.size_bytes, 4096);
        assert_eq!(vol.status.to_string(), "creating");
    }
}
