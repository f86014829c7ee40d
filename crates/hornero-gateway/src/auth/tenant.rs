//! Raw tenant hints carried by a request
//!
//! Nothing here decides which tenant a request belongs to. These helpers only
//! read the host, the `X-Tenant-ID` header and the `tenant` query parameter;
//! resolution and validation happen in [`crate::tenancy::resolve`].

use std::collections::BTreeSet;

use axum::extract::Query;
use axum::http::{header::HOST, HeaderMap, Uri};
use serde::Deserialize;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Hosts that are always treated as local development.
const DEFAULT_LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

#[derive(Debug, Deserialize)]
struct TenantQuery {
    tenant: Option<String>,
}

/// Value of the `X-Tenant-ID` header, if present and non-blank.
pub fn tenant_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Value of the `tenant` query parameter, if present and non-blank.
pub fn tenant_from_query(uri: &Uri) -> Option<String> {
    Query::<TenantQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.tenant)
        .map(|tenant| tenant.trim().to_string())
        .filter(|tenant| !tenant.is_empty())
}

/// Lower-cased host name without the port.
pub fn host_from_headers(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?.trim();
    let name = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct LocalHosts {
    hosts: BTreeSet<String>,
}

impl Default for LocalHosts {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LocalHosts {
    pub fn new(extra: impl IntoIterator<Item = String>) -> Self {
        let hosts = DEFAULT_LOCAL_HOSTS
            .iter()
            .map(|host| host.to_string())
            .chain(extra.into_iter().map(|host| host.to_ascii_lowercase()))
            .collect();
        Self { hosts }
    }

    pub fn is_local(&self, host: &str) -> bool {
        self.hosts.contains(host)
            || host.ends_with(".localhost")
            || self
                .hosts
                .iter()
                .any(|local| host.strip_suffix(local.as_str()).is_some_and(|rest| rest.ends_with('.')))
    }

    /// Leading label of `host` when it names a tenant: the host is not local
    /// and has more than two labels (`sol.hornero.app` yields `sol`).
    pub fn subdomain_of(&self, host: &str) -> Option<String> {
        if self.is_local(host) || host.parse::<std::net::IpAddr>().is_ok() {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= 2 || labels.iter().any(|label| label.is_empty()) {
            return None;
        }
        match labels[0] {
            "www" => None,
            label => Some(label.to_string()),
        }
    }
}
