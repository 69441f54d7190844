// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::{
    Backend, ErrorKind, NetDef, NetplanState, NplanError, NplanNetdef,
    RouteScope, RouteType,
    ip::{AddressFamily, is_ipv6_addr, is_wireguard_key},
};

/// Cross netdef and backend specific validation, run when a state is
/// assembled from a parser's results.
pub(crate) fn validate_state(
    state: &mut NetplanState,
) -> Result<(), NplanError> {
    validate_default_route_consistency(state);
    validate_veth_peers(state)?;
    validate_bond_primaries(state)?;
    validate_regulatory_domains(state);
    for netdef in state.iter() {
        match netdef.backend() {
            Backend::NetworkManager => validate_nm_compat(netdef)?,
            Backend::Networkd => validate_networkd_compat(netdef)?,
            Backend::Ovs => (),
        }
    }
    Ok(())
}

/// At most one default route per (family, table, metric) tuple across
/// all netdefs. Conflicts are recoverable: warn and keep both routes.
fn validate_default_route_consistency(state: &NetplanState) {
    let mut seen: HashMap<(AddressFamily, u32, u32), String> =
        HashMap::new();
    for netdef in state.iter() {
        for route in netdef.common().routes.iter().flatten() {
            if !route.is_default() {
                continue;
            }
            let Some(family) = route.family() else { continue };
            let key =
                (family, route.effective_table(), route.effective_metric());
            match seen.get(&key) {
                Some(other) => log::warn!(
                    "Conflicting default route on '{}': '{other}' \
                     already declares a {family} default route in table \
                     {} with metric {}",
                    netdef.id(),
                    key.1,
                    key.2
                ),
                None => {
                    seen.insert(key, netdef.id().to_string());
                }
            }
        }
        for gateway in [
            netdef.common().gateway4.as_deref().map(|g| (AddressFamily::Ipv4, g)),
            netdef.common().gateway6.as_deref().map(|g| (AddressFamily::Ipv6, g)),
        ]
        .into_iter()
        .flatten()
        {
            let key = (
                gateway.0,
                crate::route::DEFAULT_ROUTE_TABLE,
                crate::route::DEFAULT_ROUTE_METRIC,
            );
            match seen.get(&key) {
                Some(other) => log::warn!(
                    "Conflicting default route on '{}': '{other}' \
                     already declares a {} default route",
                    netdef.id(),
                    gateway.0
                ),
                None => {
                    seen.insert(key, netdef.id().to_string());
                }
            }
        }
    }
}

/// A veth peer relationship is symmetric: `a.peer == b` requires
/// `b.peer == a`. Placeholders synthesized for the NetworkManager
/// backend are exempt, they have no peer of their own.
fn validate_veth_peers(state: &NetplanState) -> Result<(), NplanError> {
    for netdef in state.iter() {
        let NetDef::Veth(veth) = netdef else { continue };
        let Some(peer) = veth.peer.as_deref() else {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!("Veth '{}' needs a peer", netdef.id()),
            ));
        };
        match state.get(peer) {
            Some(NetDef::Veth(peer_netdef)) => {
                if peer_netdef.peer.as_deref() != Some(netdef.id()) {
                    return Err(NplanError::new(
                        ErrorKind::ConsistencyError,
                        format!(
                            "Veth '{}' peers '{peer}' but '{peer}' \
                             peers '{}'",
                            netdef.id(),
                            peer_netdef.peer.as_deref().unwrap_or("")
                        ),
                    ));
                }
            }
            Some(other) if other.common().meta.placeholder => (),
            Some(other) => {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "Veth '{}' peers '{peer}' which is a {}",
                        netdef.id(),
                        other.kind()
                    ),
                ));
            }
            None => (),
        }
    }
    Ok(())
}

fn validate_bond_primaries(
    state: &NetplanState,
) -> Result<(), NplanError> {
    let mut primaries: HashMap<&str, Vec<&str>> = HashMap::new();
    for netdef in state.iter() {
        let meta = &netdef.common().meta;
        if meta.bond_primary
            && let Some(bond) = meta.bond.as_deref()
        {
            primaries.entry(bond).or_default().push(netdef.id());
        }
    }
    for (bond, members) in primaries {
        if members.len() > 1 {
            return Err(NplanError::new(
                ErrorKind::ConsistencyError,
                format!(
                    "Bond '{bond}' has more than one primary member: \
                     {}",
                    members.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

/// The first regulatory domain wins; conflicting later settings are
/// dropped with a warning.
fn validate_regulatory_domains(state: &mut NetplanState) {
    let mut chosen: Option<String> = None;
    for netdef in state.iter_mut() {
        let NetDef::Wifi(wifi) = netdef else { continue };
        let Some(domain) = wifi.regulatory_domain.clone() else {
            continue;
        };
        match chosen.as_deref() {
            None => chosen = Some(domain),
            Some(existing) if existing == domain => (),
            Some(existing) => {
                log::warn!(
                    "{}: regulatory-domain '{domain}' conflicts with \
                     already configured '{existing}', keeping the \
                     first",
                    wifi.common.meta.id
                );
                wifi.regulatory_domain = Some(existing.to_string());
            }
        }
    }
}

/// Checks for features the NetworkManager backend cannot express.
fn validate_nm_compat(netdef: &NetDef) -> Result<(), NplanError> {
    let id = netdef.id();
    if netdef
        .common()
        .match_config
        .as_ref()
        .is_some_and(|m| m.driver.is_some())
    {
        return Err(NplanError::new(
            ErrorKind::BackendError,
            format!(
                "{id}: NetworkManager definitions do not support \
                 matching by driver"
            ),
        ));
    }
    for route in netdef.common().routes.iter().flatten() {
        if route.route_type() != RouteType::Unicast
            || route.effective_scope() != RouteScope::Global
        {
            return Err(NplanError::new(
                ErrorKind::BackendError,
                format!(
                    "{id}: NetworkManager only supports unicast routes \
                     in global scope"
                ),
            ));
        }
        if route.from.is_some() {
            return Err(NplanError::new(
                ErrorKind::BackendError,
                format!(
                    "{id}: NetworkManager does not support route \
                     source selection ('from')"
                ),
            ));
        }
        if route.on_link == Some(true) {
            let ipv6 =
                route.to.as_deref().is_some_and(is_ipv6_addr)
                    || route.via.as_deref().is_some_and(is_ipv6_addr);
            if ipv6 {
                log::warn!(
                    "{id}: on-link IPv6 routes may not behave as \
                     expected with NetworkManager"
                );
            } else {
                return Err(NplanError::new(
                    ErrorKind::BackendError,
                    format!(
                        "{id}: NetworkManager does not support \
                         on-link IPv4 routes"
                    ),
                ));
            }
        }
    }
    for entry in netdef.common().addresses.iter().flatten() {
        if !entry.options.is_empty() {
            return Err(NplanError::new(
                ErrorKind::BackendError,
                format!(
                    "{id}: NetworkManager does not support per address \
                     options"
                ),
            ));
        }
    }
    Ok(())
}

/// Checks for features the network daemon backend cannot express.
fn validate_networkd_compat(netdef: &NetDef) -> Result<(), NplanError> {
    let id = netdef.id();
    let NetDef::Tunnel(tunnel) = netdef else {
        return Ok(());
    };
    if !tunnel.is_wireguard() {
        return Ok(());
    }
    let keys: Vec<&str> = tunnel
        .keys
        .iter()
        .filter_map(|k| k.private.as_deref())
        .chain(
            tunnel
                .peers
                .iter()
                .flatten()
                .filter_map(|p| p.keys.as_ref())
                .filter_map(|k| k.shared.as_deref()),
        )
        .collect();
    for key in keys {
        if !is_wireguard_key(key) && !key.starts_with('/') {
            return Err(NplanError::new(
                ErrorKind::BackendError,
                format!(
                    "{id}: WireGuard key must be base64 or an absolute \
                     path to a key file"
                ),
            ));
        }
    }
    Ok(())
}
