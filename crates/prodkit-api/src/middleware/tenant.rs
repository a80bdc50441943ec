//! Tenant resolution middleware.

use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::middleware::Next;
use axum::response::Response;

use prodkit_context::{ExecutionContext, ScopedContext, TenantContext};

use crate::state::AppState;

/// Resolves the request's tenant and scopes it, together with an
/// [`ExecutionContext`] capturing it, around the rest of the stack.
///
/// The resolved [`TenantContext`] is also stored in the request extensions.
pub async fn tenant_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let tenant = resolve_tenant(
        &state.header_prefix(),
        request.headers(),
        request.uri().path(),
    );
    let execution = ExecutionContext::with_tenant(false, tenant.clone());
    request.extensions_mut().insert(tenant.clone());

    tenant.scope(execution.scope(next.run(request))).await
}

/// Tenant for a request.
///
/// The tenant id comes from the `{prefix}tenant-id` header, else the first
/// label of a host with more than two labels, else a `/tenant/{id}/...`
/// path prefix. The sub id only comes from the `{prefix}sub-id` header.
pub fn resolve_tenant(prefix: &str, headers: &HeaderMap, path: &str) -> TenantContext {
    let tenant_id = header_value(headers, &format!("{prefix}tenant-id"))
        .or_else(|| from_subdomain(headers))
        .or_else(|| from_path(path));
    let sub_id = header_value(headers, &format!("{prefix}sub-id"));

    TenantContext::new(tenant_id, sub_id)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn from_subdomain(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?;
    let host = host.rsplit_once(':').map_or(host, |(name, _port)| name);
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 && !labels[0].is_empty() {
        Some(labels[0].to_string())
    } else {
        None
    }
}

fn from_path(path: &str) -> Option<String> {
    path.strip_prefix("/tenant/")?
        .split('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const PREFIX: &str = "x-prodkit-";

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_header_wins() {
        let tenant = resolve_tenant(
            PREFIX,
            &headers(&[
                ("x-prodkit-tenant-id", "from-header"),
                ("x-prodkit-sub-id", "sub-1"),
                ("host", "acme.example.com"),
            ]),
            "/tenant/from-path/items",
        );
        assert_eq!(tenant.tenant_id(), Some("from-header"));
        assert_eq!(tenant.sub_id.as_deref(), Some("sub-1"));
    }

    #[test]
    fn test_subdomain_then_path() {
        let tenant = resolve_tenant(PREFIX, &headers(&[("host", "acme.example.com:8000")]), "/");
        assert_eq!(tenant.tenant_id(), Some("acme"));

        let tenant = resolve_tenant(
            PREFIX,
            &headers(&[("host", "example.com")]),
            "/tenant/t42/orders",
        );
        assert_eq!(tenant.tenant_id(), Some("t42"));
    }

    #[test]
    fn test_ip_hosts_and_plain_paths_resolve_nothing() {
        let tenant = resolve_tenant(PREFIX, &headers(&[("host", "127.0.0.1:8000")]), "/v1/orders");
        assert_eq!(tenant.tenant_id(), None);
        assert_eq!(tenant.sub_id, None);

        let tenant = resolve_tenant(PREFIX, &HeaderMap::new(), "/tenant/");
        assert_eq!(tenant.tenant_id(), None);
    }

    #[test]
    fn test_empty_header_is_ignored() {
        let tenant = resolve_tenant(
            PREFIX,
            &headers(&[("x-prodkit-tenant-id", ""), ("host", "beta.example.com")]),
            "/",
        );
        assert_eq!(tenant.tenant_id(), Some("beta"));
    }
}
