//! Canonical `host:port` form of the resolver address.

use std::net::{IpAddr, Ipv6Addr};

use crate::error::{Result, StressError};

pub const DEFAULT_DNS_PORT: u16 = 53;

/// Turn a user supplied resolver address into a string `UdpSocket::connect` accepts.
///
/// - a bare IPv4 or IPv6 literal gets the default port appended
/// - IPv6 hosts are always bracketed next to their port
/// - `host:port` and `[v6]:port` come back unchanged (modulo the canonical IP text)
///
/// Anything that cannot be split into a host and a numeric port, such as an IPv6
/// literal with a port glued on without brackets, is rejected.
pub fn normalize_resolver(input: &str) -> Result<String> {
    let input = input.trim();
    let invalid = || StressError::InvalidAddress(input.to_string());

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(join_host_port(&ip.to_string(), DEFAULT_DNS_PORT));
    }

    if let Some(rest) = input.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let ip: Ipv6Addr = host.parse().map_err(|_| invalid())?;
        let port = match tail {
            "" => DEFAULT_DNS_PORT,
            _ => parse_port(tail.strip_prefix(':').ok_or_else(invalid)?).ok_or_else(invalid)?,
        };
        return Ok(join_host_port(&ip.to_string(), port));
    }

    let (host, port) = input.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.contains(':') || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let port = parse_port(port).ok_or_else(invalid)?;
    let host = match host.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => host.to_string(),
    };
    Ok(join_host_port(&host, port))
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
