//! Cluster API client.
//!
//! `ClusterClient` performs authenticated GET requests against one cluster
//! and unwraps the `data` envelope of every response. The network itself is
//! behind the [`Transport`] trait: production code uses [`HttpTransport`],
//! tests inject a scripted fake.
//!
//! The transport is shared by all checks of the process. A client only
//! borrows it per request and never assumes exclusive use.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::check_config::CheckConfig;
use crate::credentials::{AuthHeader, CredentialSet};
use crate::error::ProbeError;
use crate::target::{ApiBase, GuestKind, RequestTarget};
use crate::topology::{ClusterResource, Vmid};

/// Path of the cluster-wide resource listing, below `/cluster`.
pub const RESOURCES_PATH: &str = "/resources";

/// Default per-request timeout for [`HttpTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs one HTTPS GET and returns the decoded JSON body.
///
/// Implementations must map non-2xx responses to [`ProbeError::Http`] and
/// connection failures to [`ProbeError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(
        &self,
        url: &str,
        auth: &AuthHeader,
        verify_tls: bool,
    ) -> Result<Value, ProbeError>;
}

/// `reqwest` based transport with pooled connections.
///
/// Holds one client that verifies certificates and one that does not, both
/// built once and cheap to clone.
#[derive(Clone)]
pub struct HttpTransport {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let verifying = reqwest::Client::builder().timeout(timeout).build()?;
        let insecure = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            verifying,
            insecure,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        auth: &AuthHeader,
        verify_tls: bool,
    ) -> Result<Value, ProbeError> {
        let client = if verify_tls {
            &self.verifying
        } else {
            &self.insecure
        };

        let resp = client
            .get(url)
            .header(AUTHORIZATION, auth.as_str())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.json::<Value>().await?)
    }
}

/// Authenticated client for one cluster, scoped to a single check invocation.
pub struct ClusterClient {
    transport: Arc<dyn Transport>,
    base: ApiBase,
    auth: AuthHeader,
    verify_tls: bool,
    node: Option<String>,
    vmid: Option<Vmid>,
}

impl ClusterClient {
    /// Builds a client from a check's configuration.
    ///
    /// Credentials are resolved here, so an incomplete set fails before any
    /// request is made.
    pub fn from_check(
        transport: Arc<dyn Transport>,
        asset_name: &str,
        config: &CheckConfig,
        credentials: &CredentialSet,
    ) -> Result<Self, ProbeError> {
        let auth = credentials.resolve()?;
        Ok(Self {
            transport,
            base: ApiBase::new(config.address_or(asset_name), config.port()),
            auth,
            verify_tls: config.verify_tls(),
            node: config.node.clone(),
            vmid: config.vmid,
        })
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    /// Requests `path` below `target`, using the configured node and vmid.
    pub async fn request(&self, target: RequestTarget, path: &str) -> Result<Value, ProbeError> {
        let url = self
            .base
            .endpoint(target, self.node.as_deref(), self.vmid, path)?;
        self.get_data(&url).await
    }

    /// Requests `path` below a guest on an explicitly given node.
    pub async fn guest_request(
        &self,
        kind: GuestKind,
        node: &str,
        vmid: Vmid,
        path: &str,
    ) -> Result<Value, ProbeError> {
        let url = self.base.guest(node, kind, vmid, path);
        self.get_data(&url).await
    }

    /// Fetches the cluster-wide resource listing.
    pub async fn list_resources(&self) -> Result<Vec<ClusterResource>, ProbeError> {
        let data = self.request(RequestTarget::Cluster, RESOURCES_PATH).await?;
        serde_json::from_value(data).map_err(|e| ProbeError::Decode(e.to_string()))
    }

    async fn get_data(&self, url: &str) -> Result<Value, ProbeError> {
        debug!("GET {}", url);
        let mut body = self
            .transport
            .get_json(url, &self.auth, self.verify_tls)
            .await?;
        body.get_mut("data")
            .map(Value::take)
            .ok_or_else(|| ProbeError::Decode(format!("missing `data` field in response from {url}")))
    }
}
