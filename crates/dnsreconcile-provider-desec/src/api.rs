//! deSEC REST API v1 wire types and response handling

use dnsreconcile_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Provider name used in error messages
pub(crate) const PROVIDER: &str = "desec";

/// One entry of `GET /domains/`
#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    pub name: String,
    /// Smallest TTL the domain accepts
    #[serde(default)]
    pub minimum_ttl: Option<u32>,
}

/// One rrset as read from and written to `/domains/{zone}/rrsets/`
///
/// `subname` is empty at the apex. An empty `records` array deletes the rrset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrSet {
    pub subname: String,
    #[serde(rename = "type")]
    pub rtype: String,
    pub ttl: u32,
    pub records: Vec<String>,
}

/// Map a non-success status to the matching error
pub(crate) async fn error_for_status(response: reqwest::Response, context: &str) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "deSEC rejected the API token ({}): {}",
            status, context
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        429 => Error::rate_limited(format!(
            "deSEC rate limit exceeded ({}): {}",
            status, context
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("server error (transient) {}: {} - {}", context, status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", context, status, body)),
    }
}

/// Target of the `rel="next"` entry of a `Link` header
///
/// `<https://desec.io/api/v1/domains/x/rrsets/?cursor=abc>; rel="next", <...>; rel="prev"`
pub(crate) fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .map(str::to_string)
    })
}
