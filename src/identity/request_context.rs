use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Request-derived facts needed after authentication. Owned values only, so a
/// clone can outlive the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub source_address: String,
    pub client_agent: String,
}

impl RequestContext {
    pub fn from_parts(peer: Option<SocketAddr>, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Self {
        let source_address = resolve_client_ip(peer.map(|p| p.ip()), headers, trusted_proxies);
        let client_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
        Self { request_id: gen_request_id(), source_address, client_agent }
    }
}

fn gen_request_id() -> String {
    let mut bytes = [0u8; 8];
    let _ = getrandom::getrandom(&mut bytes);
    let mut s = String::with_capacity(16);
    use std::fmt::Write as _;
    for b in &bytes { let _ = write!(&mut s, "{:02x}", b); }
    s
}

/// Resolve the originating client address.
///
/// Forwarding headers are honoured only when the direct peer is a trusted proxy.
/// `X-Forwarded-For` is walked right to left and the first hop that is not itself
/// a trusted proxy wins; `X-Real-IP` is the fallback. Unparseable hops stop the walk.
pub fn resolve_client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else { return "unknown".to_string(); };
    if !trusted_proxies.contains(&peer) { return peer.to_string(); }

    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let hops: Vec<&str> = xff.split(',').map(|h| h.trim()).collect();
        for (i, hop) in hops.iter().enumerate().rev() {
            let Ok(ip) = hop.parse::<IpAddr>() else { break; };
            if i == 0 || !trusted_proxies.contains(&ip) { return ip.to_string(); }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = real.trim().parse::<IpAddr>() { return ip.to_string(); }
    }
    peer.to_string()
}
