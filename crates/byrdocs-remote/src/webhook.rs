//! GitHub App webhook deliveries.
//!
//! A delivery is trusted only after [`verify_signature`] accepts its
//! `X-Hub-Signature-256` header. Only installation lifecycle events are
//! decoded; everything else is reported as [`WebhookEvent::Ignored`].

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{RemoteError, RemoteResult};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check `header` (`sha256=<hex>`) against the HMAC-SHA256 of `body`.
///
/// The comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> RemoteResult<()> {
    let signature = header
        .and_then(|h| h.trim().strip_prefix(SIGNATURE_PREFIX))
        .ok_or(RemoteError::InvalidSignature)?;
    let expected = hex::decode(signature).map_err(|_| RemoteError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| RemoteError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| RemoteError::InvalidSignature)
}

/// Compute the header value GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> RemoteResult<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| RemoteError::InvalidSignature)?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallationInfo {
    pub id: u64,
    pub account: AccountInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
}

/// Payload of the `installation` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallationPayload {
    pub action: String,
    pub installation: InstallationInfo,
    #[serde(default)]
    pub repositories: Vec<RepositoryInfo>,
}

/// Payload of the `installation_repositories` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallationRepositoriesPayload {
    pub action: String,
    pub installation: InstallationInfo,
    #[serde(default)]
    pub repositories_added: Vec<RepositoryInfo>,
    #[serde(default)]
    pub repositories_removed: Vec<RepositoryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Installation(InstallationPayload),
    InstallationRepositories(InstallationRepositoriesPayload),
    /// Any other event name.
    Ignored(String),
}

/// Decode a delivery given its `X-GitHub-Event` name.
pub fn parse_event(event: &str, body: &[u8]) -> RemoteResult<WebhookEvent> {
    let invalid = |e: serde_json::Error| RemoteError::InvalidPayload {
        event: event.to_string(),
        message: e.to_string(),
    };
    match event {
        "installation" => Ok(WebhookEvent::Installation(
            serde_json::from_slice(body).map_err(invalid)?,
        )),
        "installation_repositories" => Ok(WebhookEvent::InstallationRepositories(
            serde_json::from_slice(body).map_err(invalid)?,
        )),
        other => Ok(WebhookEvent::Ignored(other.to_string())),
    }
}
