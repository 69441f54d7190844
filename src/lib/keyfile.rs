// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use configparser::ini::Ini;
use indexmap::IndexMap;

use crate::{
    AccessPointMode, AuthKeyManagement, AuthSettings, BondParameters,
    BridgeParameters, DeviceKind, DhcpOverrides, ErrorKind, MatchConfig,
    NetDef, NetworkManagerSettings, NplanError, NplanNetdef, Renderer,
    TunnelKeys, TunnelMode, WifiAccessPoint, WifiBand,
    netdef::common::CommonNetdef,
};

/// Map `connection.type`, with both short and long aliases. Types the
/// model does not represent structurally, including `wireguard`, fall
/// through to a passthrough-only profile.
fn kind_of(connection_type: &str) -> DeviceKind {
    match connection_type {
        "ethernet" | "802-3-ethernet" => DeviceKind::Ethernet,
        "wifi" | "802-11-wireless" => DeviceKind::Wifi,
        "gsm" | "cdma" => DeviceKind::Modem,
        "bridge" => DeviceKind::Bridge,
        "bond" => DeviceKind::Bond,
        "vlan" => DeviceKind::Vlan,
        "dummy" => DeviceKind::Dummy,
        "ip-tunnel" => DeviceKind::Tunnel,
        _ => DeviceKind::NmDevice,
    }
}

fn tunnel_mode_of(mode: &str) -> Option<TunnelMode> {
    Some(match mode {
        "1" => TunnelMode::Ipip,
        "2" => TunnelMode::Gre,
        "3" => TunnelMode::Sit,
        "4" => TunnelMode::Isatap,
        "5" => TunnelMode::Vti,
        "6" => TunnelMode::Ip6ip6,
        "7" => TunnelMode::Ipip6,
        "8" => TunnelMode::Ip6gre,
        "9" => TunnelMode::Vti6,
        "10" => TunnelMode::Gretap,
        "11" => TunnelMode::Ip6gretap,
        _ => return None,
    })
}

/// Remove a key from the keyfile and return its value. Everything not
/// taken this way ends up in the passthrough map.
fn take(ini: &mut Ini, section: &str, key: &str) -> Option<String> {
    ini.remove_key(section, key).flatten()
}

fn take_bool(ini: &mut Ini, section: &str, key: &str) -> Option<bool> {
    take(ini, section, key).map(|v| v == "true" || v == "1")
}

fn take_u32(ini: &mut Ini, section: &str, key: &str) -> Option<u32> {
    take(ini, section, key).and_then(|v| v.parse().ok())
}

/// Translate a NetworkManager keyfile into a netdef, capturing
/// everything the model does not understand in the passthrough map.
pub(crate) fn import_keyfile(
    filepath: &Path,
) -> Result<NetDef, NplanError> {
    let mut ini = Ini::new_cs();
    ini.load(filepath).map_err(|e| {
        NplanError::new(
            ErrorKind::FileError,
            format!("Cannot load keyfile {}: {e}", filepath.display()),
        )
    })?;
    // Groups empty in the input survive the round trip through a
    // sentinel passthrough entry; groups emptied by extraction do not.
    let originally_empty: Vec<String> = ini
        .get_map()
        .map(|map| {
            map.iter()
                .filter(|(_, keys)| keys.is_empty())
                .map(|(section, _)| section.clone())
                .collect()
        })
        .unwrap_or_default();

    let Some(uuid) = take(&mut ini, "connection", "uuid") else {
        return Err(NplanError::new(
            ErrorKind::ParseError,
            "Keyfile missing connection.uuid".to_string(),
        )
        .with_file(filepath));
    };
    let Some(connection_type) = take(&mut ini, "connection", "type")
    else {
        return Err(NplanError::new(
            ErrorKind::ParseError,
            "Keyfile missing connection.type".to_string(),
        )
        .with_file(filepath));
    };
    let mut kind = kind_of(&connection_type);

    // Tunnel modes the model cannot express stay raw.
    let tunnel_mode = if kind == DeviceKind::Tunnel {
        match ini
            .get("ip-tunnel", "mode")
            .as_deref()
            .and_then(tunnel_mode_of)
        {
            Some(mode) => {
                take(&mut ini, "ip-tunnel", "mode");
                Some(mode)
            }
            None => {
                kind = DeviceKind::NmDevice;
                None
            }
        }
    } else {
        None
    };

    // Round-tripped files re-use the ID encoded in the file name.
    let id = filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("netplan-"))
        .map(|rest| rest.to_string())
        .unwrap_or_else(|| format!("NM-{uuid}"));

    let mut netdef = NetDef::from_yaml_value(
        kind,
        serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
    )
    .map_err(|e| {
        NplanError::new(ErrorKind::Bug, e.to_string())
    })?;

    let mut nm = NetworkManagerSettings {
        uuid: Some(uuid),
        name: take(&mut ini, "connection", "id"),
        ..Default::default()
    };
    if let Some(device) = take(&mut ini, "connection", "interface-name")
    {
        nm.device = Some(device);
    }
    if let Some(stable_id) = take(&mut ini, "connection", "stable-id") {
        nm.stable_id = Some(stable_id);
    }

    extract_ip(&mut ini, netdef.common_mut(), false);
    extract_ip(&mut ini, netdef.common_mut(), true);

    match &mut netdef {
        NetDef::Ethernet(ethernet) => {
            extract_hardware(&mut ini, "ethernet", &mut ethernet.common);
        }
        NetDef::Wifi(wifi) => {
            let Some(ssid) = take(&mut ini, "wifi", "ssid") else {
                return Err(NplanError::new(
                    ErrorKind::ParseError,
                    "Wifi keyfile missing wifi.ssid".to_string(),
                )
                .with_file(filepath));
            };
            let mut ap = WifiAccessPoint {
                mode: take(&mut ini, "wifi", "mode").map(|mode| {
                    match mode.as_str() {
                        "infrastructure" => {
                            AccessPointMode::Infrastructure
                        }
                        "adhoc" => AccessPointMode::Adhoc,
                        "ap" => AccessPointMode::Ap,
                        _ => AccessPointMode::Other,
                    }
                }),
                hidden: take_bool(&mut ini, "wifi", "hidden"),
                band: take(&mut ini, "wifi", "band").and_then(|band| {
                    match band.as_str() {
                        "a" => Some(WifiBand::Band5GHz),
                        "bg" => Some(WifiBand::Band2_4GHz),
                        _ => None,
                    }
                }),
                channel: take_u32(&mut ini, "wifi", "channel"),
                bssid: take(&mut ini, "wifi", "bssid"),
                ..Default::default()
            };
            extract_hardware(&mut ini, "wifi", &mut wifi.common);
            if let Some(key_mgmt) =
                take(&mut ini, "wifi-security", "key-mgmt")
            {
                let key_management = match key_mgmt.as_str() {
                    "wpa-psk" => AuthKeyManagement::Psk,
                    "sae" => AuthKeyManagement::Sae,
                    "wpa-eap" => AuthKeyManagement::Eap,
                    "wpa-eap-suite-b-192" => {
                        AuthKeyManagement::EapSuiteB192
                    }
                    _ => AuthKeyManagement::None,
                };
                ap.auth = Some(AuthSettings {
                    key_management: Some(key_management),
                    password: take(&mut ini, "wifi-security", "psk"),
                    ..Default::default()
                });
                take(&mut ini, "wifi-security", "pmf");
            }
            // Remaining raw settings belong to the access point for
            // wifi profiles.
            ap.networkmanager = Some(NetworkManagerSettings {
                passthrough: collect_passthrough(
                    &mut ini,
                    &originally_empty,
                ),
                ..nm.clone()
            });
            wifi.access_points =
                Some(IndexMap::from([(ssid, ap)]));
        }
        NetDef::Modem(modem) => {
            let section = if connection_type == "gsm" {
                "gsm"
            } else {
                "cdma"
            };
            modem.apn = take(&mut ini, section, "apn");
            modem.auto_config =
                take_bool(&mut ini, section, "auto-config");
            modem.device_id = take(&mut ini, section, "device-id");
            modem.network_id = take(&mut ini, section, "network-id");
            modem.number = take(&mut ini, section, "number");
            modem.password = take(&mut ini, section, "password");
            modem.pin = take(&mut ini, section, "pin");
            modem.sim_id = take(&mut ini, section, "sim-id");
            modem.sim_operator_id =
                take(&mut ini, section, "sim-operator-id");
            modem.username = take(&mut ini, section, "username");
        }
        NetDef::Bond(bond) => {
            let mut params = BondParameters {
                mode: take(&mut ini, "bond", "mode").and_then(|mode| {
                    serde_yaml::from_str(&mode).ok()
                }),
                mii_monitor_interval: take_u32(
                    &mut ini, "bond", "miimon",
                ),
                up_delay: take_u32(&mut ini, "bond", "updelay"),
                down_delay: take_u32(&mut ini, "bond", "downdelay"),
                arp_interval: take_u32(
                    &mut ini,
                    "bond",
                    "arp_interval",
                ),
                min_links: take_u32(&mut ini, "bond", "min_links"),
                primary: take(&mut ini, "bond", "primary"),
                ..Default::default()
            };
            if let Some(targets) =
                take(&mut ini, "bond", "arp_ip_target")
            {
                params.arp_ip_targets = Some(
                    targets
                        .split(',')
                        .map(|t| t.to_string())
                        .collect(),
                );
            }
            if params != BondParameters::default() {
                bond.parameters = Some(params);
            }
        }
        NetDef::Bridge(bridge) => {
            let params = BridgeParameters {
                stp: take_bool(&mut ini, "bridge", "stp"),
                priority: take(&mut ini, "bridge", "priority")
                    .and_then(|v| v.parse().ok()),
                forward_delay: take_u32(
                    &mut ini,
                    "bridge",
                    "forward-delay",
                ),
                hello_time: take_u32(&mut ini, "bridge", "hello-time"),
                max_age: take_u32(&mut ini, "bridge", "max-age"),
                ageing_time: take_u32(
                    &mut ini,
                    "bridge",
                    "ageing-time",
                ),
                ..Default::default()
            };
            if params != BridgeParameters::default() {
                bridge.parameters = Some(params);
            }
        }
        NetDef::Vlan(vlan) => {
            vlan.id = take(&mut ini, "vlan", "id")
                .and_then(|v| v.parse().ok());
            vlan.link = take(&mut ini, "vlan", "parent");
        }
        NetDef::Tunnel(tunnel) => {
            tunnel.mode = tunnel_mode;
            tunnel.local = take(&mut ini, "ip-tunnel", "local");
            tunnel.remote = take(&mut ini, "ip-tunnel", "remote");
            tunnel.ttl = take(&mut ini, "ip-tunnel", "ttl")
                .and_then(|v| v.parse().ok());
            let input = take(&mut ini, "ip-tunnel", "input-key");
            let output = take(&mut ini, "ip-tunnel", "output-key");
            if input.is_some() || output.is_some() {
                tunnel.keys = Some(TunnelKeys {
                    input,
                    output,
                    ..Default::default()
                });
            }
        }
        _ => (),
    }

    if !matches!(netdef, NetDef::Wifi(_)) {
        nm.passthrough =
            collect_passthrough(&mut ini, &originally_empty);
    }

    {
        let common = netdef.common_mut();
        common.renderer = Some(Renderer::NetworkManager);
        common.networkmanager = Some(nm);
        common.meta.id = id;
    }
    netdef.validate_fields().map_err(|e| e.with_file(filepath))?;
    Ok(netdef)
}

/// Hardware related keys shared by wired and wireless profiles.
fn extract_hardware(
    ini: &mut Ini,
    section: &str,
    common: &mut CommonNetdef,
) {
    if let Some(mac) = take(ini, section, "mac-address") {
        common.match_config = Some(MatchConfig {
            macaddress: Some(mac),
            ..Default::default()
        });
    }
    if let Some(mac) = take(ini, section, "cloned-mac-address") {
        common.macaddress = Some(mac);
    }
    if let Some(mtu) = take_u32(ini, section, "mtu") {
        common.mtu = Some(mtu);
    }
    if let Some(wol) = ini.get(section, "wake-on-lan") {
        // Only the magic packet modes map cleanly; anything else stays
        // in the passthrough map.
        match wol.as_str() {
            "0" => {
                common.wakeonlan = Some(false);
                take(ini, section, "wake-on-lan");
            }
            "64" => {
                common.wakeonlan = Some(true);
                take(ini, section, "wake-on-lan");
            }
            _ => (),
        }
    }
}

fn extract_ip(ini: &mut Ini, common: &mut CommonNetdef, ipv6: bool) {
    let section = if ipv6 { "ipv6" } else { "ipv4" };
    match take(ini, section, "method").as_deref() {
        Some("auto") | Some("dhcp") => {
            if ipv6 {
                common.dhcp6 = Some(true);
            } else {
                common.dhcp4 = Some(true);
            }
        }
        _ => (),
    }

    let mut index = 1usize;
    while let Some(entry) =
        take(ini, section, &format!("address{index}"))
    {
        let (address, gateway) = match entry.split_once(',') {
            Some((address, gateway)) => {
                (address.to_string(), Some(gateway.to_string()))
            }
            None => (entry, None),
        };
        common
            .addresses
            .get_or_insert_with(Vec::new)
            .push(crate::AddressEntry::new(address));
        if let Some(gateway) = gateway {
            if ipv6 {
                common.gateway6 = Some(gateway);
            } else {
                common.gateway4 = Some(gateway);
            }
        }
        index += 1;
    }
    if let Some(gateway) = take(ini, section, "gateway") {
        if ipv6 {
            common.gateway6 = Some(gateway);
        } else {
            common.gateway4 = Some(gateway);
        }
    }

    if let Some(dns) = take(ini, section, "dns") {
        let nameservers =
            common.nameservers.get_or_insert_with(Default::default);
        nameservers
            .addresses
            .get_or_insert_with(Vec::new)
            .extend(
                dns.split(';')
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string()),
            );
    }
    if let Some(search) = take(ini, section, "dns-search") {
        let nameservers =
            common.nameservers.get_or_insert_with(Default::default);
        nameservers
            .search
            .get_or_insert_with(Vec::new)
            .extend(
                search
                    .split(';')
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string()),
            );
    }

    let mut index = 1usize;
    while let Some(entry) = take(ini, section, &format!("route{index}"))
    {
        let mut route = crate::Route::default();
        let mut parts = entry.split(',');
        route.to = parts.next().map(|v| v.to_string());
        route.via = parts.next().map(|v| v.to_string());
        route.metric =
            parts.next().and_then(|v| v.parse().ok());
        if let Some(options) =
            take(ini, section, &format!("route{index}_options"))
        {
            for option in options.split(',') {
                let Some((key, value)) = option.split_once('=') else {
                    continue;
                };
                match key {
                    "table" => route.table = value.parse().ok(),
                    "onlink" => {
                        route.on_link =
                            Some(value == "true" || value == "1")
                    }
                    "mtu" => route.mtu = value.parse().ok(),
                    "initcwnd" => {
                        route.congestion_window = value.parse().ok()
                    }
                    "initrwnd" => {
                        route.advertised_receive_window =
                            value.parse().ok()
                    }
                    "src" => route.from = Some(value.to_string()),
                    _ => (),
                }
            }
        }
        common.routes.get_or_insert_with(Vec::new).push(route);
        index += 1;
    }

    let mut overrides = DhcpOverrides::default();
    if take(ini, section, "ignore-auto-dns").as_deref() == Some("true")
    {
        overrides.use_dns = Some(false);
    }
    if take(ini, section, "ignore-auto-routes").as_deref()
        == Some("true")
    {
        overrides.use_routes = Some(false);
    }
    if let Some(metric) = take_u32(ini, section, "route-metric") {
        overrides.route_metric = Some(metric);
    }
    if !overrides.is_empty() {
        if ipv6 {
            common.dhcp6_overrides = Some(overrides);
        } else {
            common.dhcp4_overrides = Some(overrides);
        }
    }
}

/// Everything still left in the keyfile is copied verbatim into the
/// passthrough map, keyed `group.key`. Groups emptied by extraction
/// are dropped; groups that were empty in the input are preserved
/// through a sentinel entry.
fn collect_passthrough(
    ini: &mut Ini,
    originally_empty: &[String],
) -> Option<IndexMap<String, String>> {
    let mut passthrough: IndexMap<String, String> = IndexMap::new();
    let map = ini.get_map()?;
    for (section, keys) in &map {
        if keys.is_empty() {
            if originally_empty.contains(section) {
                passthrough
                    .insert(format!("{section}._"), String::new());
            }
            continue;
        }
        for (key, value) in keys {
            passthrough.insert(
                format!("{section}.{key}"),
                value.clone().unwrap_or_default(),
            );
        }
    }
    if passthrough.is_empty() {
        None
    } else {
        Some(passthrough)
    }
}
