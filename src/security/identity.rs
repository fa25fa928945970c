//! Client identity resolution for rate limiting.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The key a client's requests are counted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Sentinel used when no address can be resolved.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// Resolve the identity of `request`.
    ///
    /// With `trust_forwarded_for`, the first parseable entry of
    /// `X-Forwarded-For` wins; otherwise the peer address from
    /// `ConnectInfo` is used.
    pub fn resolve<B>(request: &Request<B>, trust_forwarded_for: bool) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::from_parts(request.headers(), peer, trust_forwarded_for)
    }

    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> Self {
        if trust_forwarded_for {
            if let Some(ip) = first_forwarded(headers) {
                return Self::from_ip(ip);
            }
        }
        match peer {
            Some(addr) => Self::from_ip(addr.ip()),
            None => Self::unknown(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn first_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    first.parse().ok()
}
