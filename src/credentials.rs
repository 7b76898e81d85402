//! API token credentials and the authorization header derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProbeError;

pub const DEFAULT_REALM: &str = "pam";

fn default_realm() -> Option<String> {
    Some(DEFAULT_REALM.to_string())
}

/// Credential set supplied per asset.
///
/// All fields are optional at load time so an incomplete set can be reported
/// as a check failure instead of a config parse error.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialSet {
    pub username: Option<String>,
    #[serde(default = "default_realm")]
    pub realm: Option<String>,
    pub token_id: Option<String>,
    pub secret: Option<String>,
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("username", &self.username)
            .field("realm", &self.realm)
            .field("token_id", &self.token_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CredentialSet {
    pub fn new(
        username: impl Into<String>,
        realm: impl Into<String>,
        token_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            realm: Some(realm.into()),
            token_id: Some(token_id.into()),
            secret: Some(secret.into()),
        }
    }

    /// Builds the `PVEAPIToken` authorization header value.
    ///
    /// Fails with [`ProbeError::Credential`] when any field is absent.
    pub fn resolve(&self) -> Result<AuthHeader, ProbeError> {
        match (&self.username, &self.realm, &self.token_id, &self.secret) {
            (Some(username), Some(realm), Some(token_id), Some(secret)) => Ok(AuthHeader(
                format!("PVEAPIToken={username}@{realm}!{token_id}={secret}"),
            )),
            _ => Err(ProbeError::Credential),
        }
    }
}

/// Value for the `Authorization` request header.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader(String);

impl AuthHeader {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHeader(<redacted>)")
    }
}
