//! Best-effort client IP resolution.
//!
//! # Resolution Order
//! ```text
//! Origin header (host:port)      → host, verbatim
//!     ↓ on failure
//! Peer address (host:port)       → host, must be an IP literal
//!     ↓ on failure
//! X-Forwarded-For (3 spellings)  → first non-empty value, verbatim
//!     ↓ on failure
//! ResolveError::NotDeterminable
//! ```
//!
//! # Design Decisions
//! - Each step is an independent attempt; the first success wins, nothing is merged
//! - Steps are evaluated from a fixed table so the tie-break order is auditable
//! - Resolution is a pure function of the request; nothing is cached

use std::fmt;
use std::net::IpAddr;

use axum::http::{header, uri::Authority, HeaderMap, Uri};
use thiserror::Error;

/// Spellings of the forwarding header, tried in this order.
pub const FORWARDED_FOR_VARIANTS: [&str; 3] =
    ["X-Forwarded-For", "x-forwarded-for", "X-FORWARDED-FOR"];

/// The order in which resolution steps are attempted.
pub const RESOLUTION_ORDER: [ResolutionStep; 3] = [
    ResolutionStep::Origin,
    ResolutionStep::PeerAddress,
    ResolutionStep::ForwardedFor,
];

/// Errors produced while resolving a client address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No resolution step produced a candidate.
    #[error("could not determine client IP")]
    NotDeterminable,
}

/// Request metadata consulted by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    headers: &'a HeaderMap,
    peer_addr: Option<&'a str>,
}

impl<'a> InboundRequest<'a> {
    /// Build a view over request headers and the raw peer address (`host:port`).
    pub fn new(headers: &'a HeaderMap, peer_addr: Option<&'a str>) -> Self {
        Self { headers, peer_addr }
    }

    /// The `Origin` header, if present and valid UTF-8.
    pub fn origin(&self) -> Option<&'a str> {
        self.headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
    }

    /// The transport-level peer address.
    pub fn peer_addr(&self) -> Option<&'a str> {
        self.peer_addr
    }

    /// First value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A resolved client address.
///
/// Produced by the peer-address step this is always a canonical IP literal;
/// the header-based steps pass the client-supplied value through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single strategy in the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStep {
    /// Host part of an `Origin` URL that carries an explicit port.
    Origin,
    /// Host part of the connected peer's socket address.
    PeerAddress,
    /// Value of the `X-Forwarded-For` header set by a proxy.
    ForwardedFor,
}

impl ResolutionStep {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionStep::Origin => "origin",
            ResolutionStep::PeerAddress => "peer",
            ResolutionStep::ForwardedFor => "forwarded_for",
        }
    }

    /// Run this step alone against the request.
    pub fn attempt(self, request: &InboundRequest<'_>) -> Option<ResolvedAddress> {
        match self {
            ResolutionStep::Origin => from_origin(request),
            ResolutionStep::PeerAddress => from_peer_addr(request),
            ResolutionStep::ForwardedFor => from_forwarded_for(request),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: ResolvedAddress,
    pub step: ResolutionStep,
}

/// Resolve the caller's best-guess IP address.
pub fn resolve(request: &InboundRequest<'_>) -> Result<Resolution, ResolveError> {
    RESOLUTION_ORDER
        .iter()
        .find_map(|&step| {
            step.attempt(request)
                .map(|address| Resolution { address, step })
        })
        .ok_or(ResolveError::NotDeterminable)
}

fn from_origin(request: &InboundRequest<'_>) -> Option<ResolvedAddress> {
    let origin = request.origin().filter(|o| !o.is_empty())?;
    let authority = origin_authority(origin)?;
    let authority = authority.as_str();
    // userinfo is not part of the host
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let (host, port) = split_host_port(host_port)?;
    // out-of-range digits and an empty port are still a port
    if host.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(ResolvedAddress(host.to_string()))
}

/// Authority of an absolute (`scheme://host:port/...`) or
/// scheme-relative (`//host:port/...`) origin.
fn origin_authority(origin: &str) -> Option<Authority> {
    if let Some(rest) = origin.strip_prefix("//") {
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        return rest[..end].parse().ok();
    }

    let uri: Uri = origin.parse().ok()?;
    uri.scheme()?;
    uri.into_parts().authority
}

fn from_peer_addr(request: &InboundRequest<'_>) -> Option<ResolvedAddress> {
    let (host, _port) = split_host_port(request.peer_addr()?)?;
    let ip: IpAddr = host.parse().ok()?;
    Some(ResolvedAddress(ip.to_canonical().to_string()))
}

fn from_forwarded_for(request: &InboundRequest<'_>) -> Option<ResolvedAddress> {
    FORWARDED_FOR_VARIANTS
        .iter()
        .filter_map(|name| request.header(name))
        .find(|value| !value.is_empty())
        .map(|value| ResolvedAddress(value.to_string()))
}

/// Split `host:port` or `[host]:port` into its parts.
///
/// Returns `None` when the port separator is missing or an unbracketed
/// host contains a colon.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn split_host_port_forms() {
        assert_eq!(split_host_port("203.0.113.7:54321"), Some(("203.0.113.7", "54321")));
        assert_eq!(split_host_port("[::1]:8080"), Some(("::1", "8080")));
        assert_eq!(split_host_port("example.com:80"), Some(("example.com", "80")));
        assert_eq!(split_host_port("host:"), Some(("host", "")));
        assert_eq!(split_host_port("garbage"), None);
        assert_eq!(split_host_port("::1"), None);
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("[::1]:80:90"), None);
    }

    #[test]
    fn peer_address_used_without_origin() {
        let map = HeaderMap::new();
        let req = InboundRequest::new(&map, Some("203.0.113.7:54321"));

        let resolution = resolve(&req).unwrap();
        assert_eq!(resolution.address.as_str(), "203.0.113.7");
        assert_eq!(resolution.step, ResolutionStep::PeerAddress);
    }

    #[test]
    fn origin_takes_priority_over_peer() {
        let map = headers(&[("origin", "http://198.51.100.4:8443")]);
        let req = InboundRequest::new(&map, Some("203.0.113.7:54321"));

        let resolution = resolve(&req).unwrap();
        assert_eq!(resolution.address.as_str(), "198.51.100.4");
        assert_eq!(resolution.step, ResolutionStep::Origin);
    }

    #[test]
    fn origin_host_is_not_validated() {
        let map = headers(&[("origin", "https://test.example:3000")]);
        let req = InboundRequest::new(&map, None);
        assert_eq!(
            ResolutionStep::Origin.attempt(&req).unwrap().as_str(),
            "test.example"
        );
    }

    #[test]
    fn origin_ipv6_and_userinfo() {
        let map = headers(&[("origin", "http://[2001:db8::1]:8443")]);
        let req = InboundRequest::new(&map, None);
        assert_eq!(ResolutionStep::Origin.attempt(&req).unwrap().as_str(), "2001:db8::1");

        let map = headers(&[("origin", "http://user:pw@198.51.100.4:81")]);
        let req = InboundRequest::new(&map, None);
        assert_eq!(ResolutionStep::Origin.attempt(&req).unwrap().as_str(), "198.51.100.4");
    }

    #[test]
    fn origin_port_only_needs_digits() {
        for (origin, host) in [
            ("http://1.2.3.4:99999", "1.2.3.4"),
            ("http://host:", "host"),
            ("//1.2.3.4:80", "1.2.3.4"),
            ("//198.51.100.4:8443/path?q=1", "198.51.100.4"),
        ] {
            let mut map = HeaderMap::new();
            map.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
            let req = InboundRequest::new(&map, Some("192.0.2.1:9"));

            let resolution = resolve(&req).unwrap();
            assert_eq!(resolution.step, ResolutionStep::Origin, "origin {origin:?}");
            assert_eq!(resolution.address.as_str(), host);
        }
    }

    #[test]
    fn origin_without_port_falls_through() {
        let map = headers(&[("origin", "http://198.51.100.4")]);
        let req = InboundRequest::new(&map, Some("203.0.113.7:1"));

        assert!(ResolutionStep::Origin.attempt(&req).is_none());
        assert_eq!(resolve(&req).unwrap().address.as_str(), "203.0.113.7");
    }

    #[test]
    fn empty_or_unparsable_origin_is_skipped() {
        for origin in ["", "not a url", "http://:8080", "null", "http://1.2.3.4:abc", "//1.2.3.4:x1"] {
            let mut map = HeaderMap::new();
            map.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
            let req = InboundRequest::new(&map, Some("192.0.2.1:9"));

            let resolution = resolve(&req).unwrap();
            assert_eq!(resolution.step, ResolutionStep::PeerAddress, "origin {origin:?}");
        }
    }

    #[test]
    fn peer_address_is_canonicalised() {
        let map = HeaderMap::new();

        let req = InboundRequest::new(&map, Some("[::ffff:192.0.2.33]:443"));
        assert_eq!(ResolutionStep::PeerAddress.attempt(&req).unwrap().as_str(), "192.0.2.33");

        let req = InboundRequest::new(&map, Some("[2001:0db8:0000::0001]:443"));
        assert_eq!(ResolutionStep::PeerAddress.attempt(&req).unwrap().as_str(), "2001:db8::1");
    }

    #[test]
    fn peer_host_must_be_ip_literal() {
        let map = HeaderMap::new();
        let req = InboundRequest::new(&map, Some("localhost:8080"));
        assert!(ResolutionStep::PeerAddress.attempt(&req).is_none());

        let req = InboundRequest::new(&map, Some("fe80::1%eth0"));
        assert!(ResolutionStep::PeerAddress.attempt(&req).is_none());
    }

    #[test]
    fn forwarded_for_used_when_peer_is_garbage() {
        let map = headers(&[("x-forwarded-for", "192.0.2.9")]);
        let req = InboundRequest::new(&map, Some("garbage"));

        let resolution = resolve(&req).unwrap();
        assert_eq!(resolution.address.as_str(), "192.0.2.9");
        assert_eq!(resolution.step, ResolutionStep::ForwardedFor);
    }

    #[test]
    fn forwarded_for_returned_verbatim() {
        let map = headers(&[("x-forwarded-for", "192.0.2.9, 10.0.0.1")]);
        let req = InboundRequest::new(&map, None);
        assert_eq!(
            ResolutionStep::ForwardedFor.attempt(&req).unwrap().as_str(),
            "192.0.2.9, 10.0.0.1"
        );
    }

    #[test]
    fn empty_forwarded_for_is_ignored() {
        let map = headers(&[("x-forwarded-for", "")]);
        let req = InboundRequest::new(&map, None);
        assert!(ResolutionStep::ForwardedFor.attempt(&req).is_none());
    }

    #[test]
    fn nothing_to_go_on() {
        let map = headers(&[("accept", "*/*")]);

        let req = InboundRequest::new(&map, None);
        assert_eq!(resolve(&req), Err(ResolveError::NotDeterminable));

        let req = InboundRequest::new(&map, Some("garbage"));
        assert_eq!(resolve(&req), Err(ResolveError::NotDeterminable));
        assert_eq!(
            ResolveError::NotDeterminable.to_string(),
            "could not determine client IP"
        );
    }

    #[test]
    fn order_is_fixed() {
        assert_eq!(
            RESOLUTION_ORDER,
            [
                ResolutionStep::Origin,
                ResolutionStep::PeerAddress,
                ResolutionStep::ForwardedFor
            ]
        );
        assert_eq!(FORWARDED_FOR_VARIANTS[0], "X-Forwarded-For");
    }
}
