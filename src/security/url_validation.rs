//! SSRF protection: validates outbound URLs against private/internal IP ranges
//! before any request is made on a caller's behalf.

use crate::error::UrlGuardError;
use std::net::{IpAddr, Ipv4Addr};
use url::Url;

fn is_private_v4(v4: &Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_unspecified()
        || v4.is_broadcast()
        || a == 0 // "this network" 0.0.0.0/8
        || (a == 100 && (b & 0xc0) == 64) // carrier-grade NAT 100.64.0.0/10
}

/// Check whether an IP address is private, loopback, link-local, or metadata.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            let segs = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || (segs[0] & 0xfe00) == 0xfc00 // unique-local fc00::/7
                || (segs[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_v4(&v4))
        }
    }
}

/// Check whether a hostname string is a private/internal host.
pub fn is_private_host(host: &str) -> bool {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if bare == "localhost" || bare.ends_with(".localhost") {
        return true;
    }
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return is_private_ip(&ip);
    }
    false
}

/// Parse `url_str` and reject anything that is not http(s) or whose host is,
/// or resolves to, a private address. Resolution failure is a rejection.
pub async fn validate_public_url(url_str: &str) -> Result<Url, UrlGuardError> {
    let parsed = check_url_shape(url_str)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| UrlGuardError::InvalidUrl("URL has no host".into()))?;

    // Literal IPs were already checked; only names need resolving.
    if host.parse::<IpAddr>().is_ok() || host.starts_with('[') {
        return Ok(parsed);
    }

    let port = parsed.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| UrlGuardError::Resolution(format!("{host}: {e}")))?
        .collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(UrlGuardError::Resolution(format!("{host}: no addresses")));
    }
    if let Some(addr) = addrs.iter().find(|addr| is_private_ip(&addr.ip())) {
        return Err(UrlGuardError::PrivateAddress(format!(
            "{host} resolves to {}",
            addr.ip()
        )));
    }
    Ok(parsed)
}

/// The synchronous part of the guard: scheme, host presence and literal
/// private hosts. Never touches the network.
pub fn check_url_shape(url_str: &str) -> Result<Url, UrlGuardError> {
    let parsed = Url::parse(url_str.trim()).map_err(|e| UrlGuardError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlGuardError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| UrlGuardError::InvalidUrl("URL has no host".into()))?;
    if is_private_host(host) {
        return Err(UrlGuardError::PrivateAddress(host.to_string()));
    }
    Ok(parsed)
}
