use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace};

/// Returns the token part of an `Authorization: Bearer <token>` header value. The scheme is case-insensitive.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Pulls `token=<jwt>` out of a query string. Browsers cannot set headers on WebSocket connections.
pub fn token_from_query(query: &str) -> Option<String> {
    let re = regex::Regex::new(r"(?:^|&)token=(?P<token>[^&]+)").ok()?;
    re.captures(query).and_then(|caps| caps.name("token")).map(|m| m.as_str().to_string())
}

/// Get the remote IP address from the request. If `use_x_forwarded_for` is set in the configuration, the
/// `X-Forwarded-For` header is preferred. Otherwise, the peer address from the connection info is used.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}
