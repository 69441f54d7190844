// SPDX-License-Identifier: Apache-2.0

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError};

pub(crate) const IPV4_ADDR_LEN: u8 = 32;
pub(crate) const IPV6_ADDR_LEN: u8 = 128;

/// IP address family, auto detected from address literals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "ipv4"),
            Self::Ipv6 => write!(f, "ipv6"),
        }
    }
}

impl AddressFamily {
    pub(crate) fn max_prefix(&self) -> u8 {
        match self {
            Self::Ipv4 => IPV4_ADDR_LEN,
            Self::Ipv6 => IPV6_ADDR_LEN,
        }
    }
}

pub(crate) fn is_ipv6_addr(addr: &str) -> bool {
    addr.contains(':')
}

/// Parse a bare IP address, rejecting any `/prefix` suffix. Used for
/// gateways, nameservers, tunnel endpoints and other single address fields.
pub(crate) fn parse_ip_addr(addr: &str) -> Result<IpAddr, NplanError> {
    if addr.contains('/') {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!("Address {addr} should not contain a /prefix suffix"),
        ));
    }
    IpAddr::from_str(addr).map_err(|e| {
        NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid IP address {addr}: {e}"),
        )
    })
}

/// Parse an `address/prefix` pair as used by static `addresses:` entries.
/// The prefix is mandatory and bound to 1..=32 for IPv4, 1..=128 for IPv6;
/// prefix length 0 is rejected.
pub(crate) fn parse_addr_prefix(
    value: &str,
) -> Result<(IpAddr, u8), NplanError> {
    let Some((addr_str, prefix_str)) = value.split_once('/') else {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!("Address {value} is missing the /prefix length"),
        ));
    };
    let addr = IpAddr::from_str(addr_str).map_err(|e| {
        NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid IP address {addr_str}: {e}"),
        )
    })?;
    let prefix = u8::from_str(prefix_str).map_err(|e| {
        NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid prefix length {prefix_str}: {e}"),
        )
    })?;
    let max_prefix = family_of(&addr).max_prefix();
    if prefix == 0 || prefix > max_prefix {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!(
                "Invalid prefix length {prefix} in {value}, \
                 should be within 1..{max_prefix}"
            ),
        ));
    }
    Ok((addr, prefix))
}

/// Parse a route destination: `default`, an address, or `address/prefix`
/// where prefix 0 is allowed (`0.0.0.0/0`, `::/0`).
pub(crate) fn parse_route_dest(
    value: &str,
) -> Result<AddressFamily, NplanError> {
    let addr_str = match value.split_once('/') {
        Some((addr_str, prefix_str)) => {
            let prefix = u8::from_str(prefix_str).map_err(|e| {
                NplanError::new(
                    ErrorKind::SchemaError,
                    format!("Invalid prefix length {prefix_str}: {e}"),
                )
            })?;
            let addr = IpAddr::from_str(addr_str).map_err(|e| {
                NplanError::new(
                    ErrorKind::SchemaError,
                    format!("Invalid IP address {addr_str}: {e}"),
                )
            })?;
            if prefix > family_of(&addr).max_prefix() {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!("Invalid prefix length {prefix} in {value}"),
                ));
            }
            addr_str
        }
        None => value,
    };
    let addr = IpAddr::from_str(addr_str).map_err(|e| {
        NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid IP address {addr_str}: {e}"),
        )
    })?;
    Ok(family_of(&addr))
}

pub(crate) fn family_of(addr: &IpAddr) -> AddressFamily {
    match addr {
        IpAddr::V4(_) => AddressFamily::Ipv4,
        IpAddr::V6(_) => AddressFamily::Ipv6,
    }
}

const MAC_OCTETS: usize = 6;
const MAC_INFINIBAND_OCTETS: usize = 20;

/// Validate a MAC address: 6 octet ethernet form or 20 octet infiniband
/// form, colon separated hex pairs.
pub(crate) fn validate_mac_address(mac: &str) -> Result<(), NplanError> {
    let octets: Vec<&str> = mac.split(':').collect();
    if octets.len() != MAC_OCTETS && octets.len() != MAC_INFINIBAND_OCTETS {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid MAC address {mac}, not 6 or 20 octets"),
        ));
    }
    for octet in &octets {
        if octet.len() != 2
            || !octet.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!("Invalid MAC address {mac}"),
            ));
        }
    }
    Ok(())
}

/// Netdef IDs double as interface names and file name components, hence
/// no whitespace and no glob metacharacters.
pub(crate) fn validate_netdef_id(id: &str) -> Result<(), NplanError> {
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_punctuation())
    {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!("Invalid netdef ID '{id}'"),
        ));
    }
    if id.contains(['*', '?', '[', ']']) {
        return Err(NplanError::new(
            ErrorKind::SchemaError,
            format!("Netdef ID '{id}' must not use glob characters"),
        ));
    }
    Ok(())
}

/// A WireGuard key is base64: 32 bytes encoded to 44 characters with a
/// trailing `=`. An absolute path to a key file is also accepted by the
/// network daemon backend.
pub(crate) fn is_wireguard_key(value: &str) -> bool {
    value.len() == 44
        && value.ends_with('=')
        && value[..43].chars().all(|c| {
            c.is_ascii_alphanumeric() || c == '+' || c == '/'
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_prefix_zero_rejected() {
        assert!(parse_addr_prefix("192.0.2.1/0").is_err());
        assert!(parse_addr_prefix("2001:db8::1/0").is_err());
    }

    #[test]
    fn test_addr_prefix_full_length_allowed() {
        assert_eq!(
            parse_addr_prefix("192.0.2.1/32").unwrap().1,
            IPV4_ADDR_LEN
        );
        assert_eq!(
            parse_addr_prefix("2001:db8::1/128").unwrap().1,
            IPV6_ADDR_LEN
        );
    }

    #[test]
    fn test_addr_prefix_out_of_range() {
        assert!(parse_addr_prefix("192.0.2.1/33").is_err());
        assert!(parse_addr_prefix("2001:db8::1/129").is_err());
    }

    #[test]
    fn test_addr_prefix_mandatory() {
        assert!(parse_addr_prefix("192.0.2.1").is_err());
    }

    #[test]
    fn test_gateway_rejects_prefix() {
        assert!(parse_ip_addr("192.0.2.1/24").is_err());
        assert!(parse_ip_addr("192.0.2.1").is_ok());
    }

    #[test]
    fn test_route_dest_prefix_zero_allowed() {
        assert_eq!(
            parse_route_dest("0.0.0.0/0").unwrap(),
            AddressFamily::Ipv4
        );
        assert_eq!(parse_route_dest("::/0").unwrap(), AddressFamily::Ipv6);
    }

    #[test]
    fn test_mac_address() {
        assert!(validate_mac_address("00:11:22:33:44:55").is_ok());
        assert!(validate_mac_address("00:11:22:33:44").is_err());
        assert!(validate_mac_address("00:11:22:33:44:5g").is_err());
        // Infiniband form
        assert!(
            validate_mac_address(
                "80:00:00:00:fe:80:00:00:00:00:00:00:00:11:22:33:44:55:66:77"
            )
            .is_ok()
        );
    }

    #[test]
    fn test_netdef_id() {
        assert!(validate_netdef_id("eth0").is_ok());
        assert!(validate_netdef_id("br-lan.10").is_ok());
        assert!(validate_netdef_id("eth*").is_err());
        assert!(validate_netdef_id("").is_err());
        assert!(validate_netdef_id("eth 0").is_err());
    }

    #[test]
    fn test_wireguard_key() {
        assert!(is_wireguard_key(
            "M9nt4YujIOmNrRmpIRTmYSfMdrpvE7u6WkG8FY8WjG4="
        ));
        assert!(!is_wireguard_key("not-a-key"));
    }
}
