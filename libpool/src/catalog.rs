//! Authenticated sessions and service catalog endpoint resolution.
//!
//! An [`AuthSession`] is produced by an external authentication exchange and
//! carries the service catalog returned with the token. Resolution is a pure
//! scan over that catalog: the first entry with the requested service type is
//! used, and within it the first endpoint with the requested interface and
//! region. Catalog order is never re-sorted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use crate::config::PUBLIC_INTERFACE;
use crate::error::{PoolError, Result};

/// Identity services send `null` for absent strings and lists; treat it like a
/// missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// One reachable address of a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    /// `public`, `internal` or `admin`.
    #[serde(rename = "interface")]
    pub interface_kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub region: String,
    /// Newer identity services report the region here as well. Only
    /// consulted when `region` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    pub url: String,
}

impl Endpoint {
    pub fn new(
        interface_kind: impl Into<String>,
        region: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            interface_kind: interface_kind.into(),
            region: region.into(),
            region_id: None,
            url: url.into(),
        }
    }

    fn matches(&self, interface: &str, region: &str) -> bool {
        self.interface_kind == interface
            && (self.region == region
                || (self.region.is_empty() && self.region_id.as_deref() == Some(region)))
    }
}

/// All endpoints of one service type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceCatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    /// Display name; not used for matching.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Vec<Endpoint>,
}

impl ServiceCatalogEntry {
    pub fn new(service_type: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            service_type: service_type.into(),
            name: String::new(),
            endpoints,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Read-only view of one authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    token_id: String,
    expires_at: DateTime<Utc>,
    project_name: String,
    methods: BTreeSet<String>,
    catalog: Vec<ServiceCatalogEntry>,
}

/// Builder for [`AuthSession`]; see [`AuthSession::builder`].
#[derive(Debug, Default)]
pub struct AuthSessionBuilder {
    token_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    project_name: String,
    methods: BTreeSet<String>,
    catalog: Vec<ServiceCatalogEntry>,
}

impl AuthSessionBuilder {
    pub fn token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn project_name(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    pub fn catalog(mut self, catalog: Vec<ServiceCatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Finish the session.
    ///
    /// Fails with [`PoolError::MissingExpiry`] when no expiry was supplied and
    /// with [`PoolError::InvalidArgument`] when the token is absent or empty.
    pub fn build(self) -> Result<AuthSession> {
        let token_id = self
            .token_id
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PoolError::InvalidArgument("token id must not be empty".into()))?;
        let expires_at = self.expires_at.ok_or(PoolError::MissingExpiry)?;
        Ok(AuthSession {
            token_id,
            expires_at,
            project_name: self.project_name,
            methods: self.methods,
            catalog: self.catalog,
        })
    }
}

/// Body of an identity service token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    methods: BTreeSet<String>,
    #[serde(default)]
    project: Option<ProjectRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    catalog: Vec<ServiceCatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    name: String,
}

impl AuthSession {
    pub fn builder() -> AuthSessionBuilder {
        AuthSessionBuilder::default()
    }

    /// Build a session from a token response body.
    ///
    /// The token itself travels in a response header, so it is passed
    /// separately. A body without `expires_at` is rejected.
    pub fn from_token_response(token_id: impl Into<String>, body: &str) -> Result<Self> {
        let resp: TokenResponse = serde_json::from_str(body).map_err(PoolError::decode)?;
        let token = resp.token;
        let mut builder = Self::builder()
            .token_id(token_id)
            .project_name(token.project.map(|p| p.name).unwrap_or_default())
            .catalog(token.catalog);
        builder.methods = token.methods;
        if let Some(expires_at) = token.expires_at {
            builder = builder.expires_at(expires_at);
        }
        builder.build()
    }

    /// Opaque bearer value.
    pub fn token(&self) -> &str {
        &self.token_id
    }

    pub fn project(&self) -> &str {
        &self.project_name
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the session is past its expiry at `now`. Reads no clock.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    pub fn catalog(&self) -> &[ServiceCatalogEntry] {
        &self.catalog
    }

    /// URL of the first `public` endpoint of `service_type` in `region`.
    pub fn resolve_endpoint(&self, service_type: &str, region: &str) -> Result<&str> {
        self.resolve_interface_endpoint(service_type, region, PUBLIC_INTERFACE)
    }

    /// Like [`Self::resolve_endpoint`] with an explicit interface kind.
    ///
    /// Returns [`PoolError::ServiceNotFound`] when no catalog entry has the
    /// service type and [`PoolError::EndpointNotFound`] when the first such
    /// entry has no matching endpoint. Later entries of the same type are not
    /// consulted.
    #[instrument(level = "debug", skip(self), fields(project = %self.project_name))]
    pub fn resolve_interface_endpoint(
        &self,
        service_type: &str,
        region: &str,
        interface: &str,
    ) -> Result<&str> {
        let entry = self
            .catalog
            .iter()
            .find(|entry| entry.service_type == service_type)
            .ok_or_else(|| PoolError::ServiceNotFound(service_type.to_owned()))?;

        let endpoint = entry
            .endpoints
            .iter()
            .find(|ep| ep.matches(interface, region))
            .ok_or_else(|| PoolError::EndpointNotFound {
                service_type: service_type.to_owned(),
                region: region.to_owned(),
                interface: interface.to_owned(),
            })?;

        debug!(url = %endpoint.url, "resolved endpoint");
        Ok(&endpoint.url)
    }
}

/// Free-function form of [`AuthSession::resolve_endpoint`].
pub fn resolve_endpoint<'s>(
    session: &'s AuthSession,
    service_type: &str,
    region: &str,
) -> Result<&'s str> {
    session.resolve_endpoint(service_type, region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn session(catalog: Vec<ServiceCatalogEntry>) -> AuthSession {
        AuthSession::builder()
            .token_id("tok-123")
            .expires_at(expiry())
            .project_name("storage")
            .method("password")
            .catalog(catalog)
            .build()
            .expect("build session")
    }

    fn object_store() -> ServiceCatalogEntry {
        ServiceCatalogEntry::new(
            "object-store",
            vec![
                Endpoint::new("public", "us-east", "https://a"),
                Endpoint::new("public", "us-west", "https://b"),
            ],
        )
    }

    #[test]
    fn resolves_region_specific_endpoint() {
        let s = session(vec![object_store()]);
        assert_eq!(
            s.resolve_interface_endpoint("object-store", "us-west", "public"),
            Ok("https://b")
        );
        assert_eq!(
            s.resolve_interface_endpoint("object-store", "us-east", "public"),
            Ok("https://a")
        );
    }

    #[test]
    fn resolve_endpoint_uses_public_interface() {
        let s = session(vec![object_store()]);
        assert_eq!(
            resolve_endpoint(&s, "object-store", "us-west"),
            Ok("https://b")
        );

        let entry = ServiceCatalogEntry::new(
            "object-store",
            vec![
                Endpoint::new("internal", "us-west", "http://internal"),
                Endpoint::new("public", "us-west", "https://b"),
            ],
        );
        let s = session(vec![entry]);
        assert_eq!(s.resolve_endpoint("object-store", "us-west"), Ok("https://b"));
        assert_eq!(
            s.resolve_endpoint("compute", "us-west"),
            Err(PoolError::ServiceNotFound("compute".into()))
        );
    }

    #[test]
    fn first_match_wins_and_skips_non_public() {
        let entry = ServiceCatalogEntry::new(
            "volumev3",
            vec![
                Endpoint::new("internal", "r1", "http://internal"),
                Endpoint::new("public", "r1", "https://first"),
                Endpoint::new("public", "r1", "https://second"),
            ],
        );
        let s = session(vec![entry]);
        assert_eq!(
            s.resolve_interface_endpoint("volumev3", "r1", "public"),
            Ok("https://first")
        );
        assert_eq!(
            s.resolve_interface_endpoint("volumev3", "r1", "internal"),
            Ok("http://internal")
        );
    }

    #[test]
    fn reordering_other_entries_keeps_result() {
        let compute = ServiceCatalogEntry::new(
            "compute",
            vec![Endpoint::new("public", "us-west", "https://nova")],
        );
        let a = session(vec![compute.clone(), object_store()]);
        let b = session(vec![object_store(), compute]);
        assert_eq!(
            a.resolve_interface_endpoint("object-store", "us-west", "public"),
            b.resolve_interface_endpoint("object-store", "us-west", "public"),
        );
    }

    #[test]
    fn only_first_entry_of_a_type_is_used() {
        let shadowed = ServiceCatalogEntry::new(
            "object-store",
            vec![Endpoint::new("public", "eu", "https://eu")],
        );
        let s = session(vec![object_store(), shadowed]);
        assert!(matches!(
            s.resolve_interface_endpoint("object-store", "eu", "public"),
            Err(PoolError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn distinguishes_missing_service_from_missing_endpoint() {
        let s = session(vec![object_store()]);
        assert_eq!(
            s.resolve_interface_endpoint("compute", "us-west", "public"),
            Err(PoolError::ServiceNotFound("compute".into()))
        );
        let err = s
            .resolve_interface_endpoint("object-store", "ap-south", "public")
            .unwrap_err();
        assert!(matches!(err, PoolError::EndpointNotFound { ref region, .. } if region == "ap-south"));
        assert!(err.is_not_found());
    }

    #[test]
    fn removing_only_match_yields_not_found() {
        let entry = ServiceCatalogEntry::new(
            "object-store",
            vec![Endpoint::new("public", "us-east", "https://a")],
        );
        let s = session(vec![entry]);
        assert!(
            s.resolve_interface_endpoint("object-store", "us-west", "public")
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn region_id_matches() {
        let mut ep = Endpoint::new("public", "", "https://rid");
        ep.region_id = Some("RegionOne".into());
        let s = session(vec![ServiceCatalogEntry::new("image", vec![ep])]);
        assert_eq!(
            s.resolve_interface_endpoint("image", "RegionOne", "public"),
            Ok("https://rid")
        );
    }

    #[test]
    fn region_takes_precedence_over_region_id() {
        let mut ep = Endpoint::new("public", "us-east", "https://east");
        ep.region_id = Some("us-west".into());
        let s = session(vec![ServiceCatalogEntry::new("image", vec![ep])]);
        assert_eq!(s.resolve_endpoint("image", "us-east"), Ok("https://east"));
        assert!(matches!(
            s.resolve_endpoint("image", "us-west"),
            Err(PoolError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn null_fields_in_unrelated_entries_are_tolerated() {
        let body = r#"{
            "token": {
                "expires_at": "2030-01-01T00:00:00Z",
                "methods": null,
                "catalog": [
                    {"type": "identity", "name": null, "endpoints": [
                        {"interface": "public", "region": null, "url": "https://keystone"}
                    ]},
                    {"type": "placement", "endpoints": null},
                    {"type": "object-store", "name": "swift", "endpoints": [
                        {"interface": "public", "region": "us-west", "url": "https://b"}
                    ]}
                ]
            }
        }"#;
        let s = AuthSession::from_token_response("tok", body).expect("parse token");
        assert!(s.methods().is_empty());
        assert_eq!(s.catalog()[0].endpoints[0].region, "");
        assert!(s.catalog()[1].endpoints.is_empty());
        assert_eq!(s.resolve_endpoint("object-store", "us-west"), Ok("https://b"));
    }

    #[test]
    fn accessors() {
        let s = session(vec![]);
        assert_eq!(s.token(), "tok-123");
        assert_eq!(s.project(), "storage");
        assert!(s.methods().contains("password"));
        assert_eq!(s.expires_at(), expiry());
        assert!(!s.is_expired_at(expiry() - chrono::Duration::seconds(1)));
        assert!(s.is_expired_at(expiry()));
    }

    #[test]
    fn build_requires_expiry_and_token() {
        let err = AuthSession::builder().token_id("t").build().unwrap_err();
        assert_eq!(err, PoolError::MissingExpiry);

        let err = AuthSession::builder()
            .token_id("")
            .expires_at(expiry())
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidArgument(_)));
    }

    #[test]
    fn from_token_response_body() {
        let body = r#"{
            "token": {
                "expires_at": "2030-01-01T00:00:00Z",
                "methods": ["password", "token"],
                "project": {"id": "p1", "name": "storage"},
                "catalog": [{
                    "type": "object-store",
                    "name": "swift",
                    "endpoints": [
                        {"interface": "admin", "region": "us-west", "url": "https://admin"},
                        {"interface": "public", "region": "us-west", "region_id": "us-west", "url": "https://b"}
                    ]
                }]
            }
        }"#;
        let s = AuthSession::from_token_response("tok-9", body).expect("parse token");
        assert_eq!(s.project(), "storage");
        assert_eq!(s.methods().len(), 2);
        assert_eq!(s.catalog()[0].name, "swift");
        assert_eq!(
            s.resolve_interface_endpoint("object-store", "us-west", "public"),
            Ok("https://b")
        );
    }

    #[test]
    fn from_token_response_without_expiry_fails() {
        let body = r#"{"token": {"methods": ["password"], "catalog": []}}"#;
        assert_eq!(
            AuthSession::from_token_response("tok", body),
            Err(PoolError::MissingExpiry)
        );
    }
}
