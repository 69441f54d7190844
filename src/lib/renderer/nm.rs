// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write as _;
use std::path::Path;

use configparser::ini::Ini;
use uuid::Uuid;

use crate::{
    AccessPointMode, AuthKeyManagement, AuthPmfMode, AuthSettings,
    Backend, NetDef, NetplanState, NetworkManagerSettings, NplanError,
    NplanNetdef, Renderer, TunnelMode, UseDomains, WakeOnWlanFlag,
    WifiAccessPoint, WifiBand,
    ip::is_ipv6_addr,
    netdef::common::CommonNetdef,
    renderer::{cleanup_dir, escape_filename, write_file},
};

const CONNECTION_DIR: &str = "run/NetworkManager/system-connections";
const CONF_DIR: &str = "run/NetworkManager/conf.d";
const UNMANAGED_CONF: &str = "netplan.conf";
const GLOBALLY_MANAGED_CONF: &str = "10-globally-managed-devices.conf";
const RULES_DIR: &str = "run/udev/rules.d";
const RULES_FILE: &str = "90-netplan-nm.rules";
const FILE_PREFIX: &str = "netplan-";

/// Magic packet only, the only wake on LAN mode both backends share.
const NM_WOL_MAGIC: u32 = 0x40;

/// Unlink all NetworkManager outputs of a previous generator run.
pub(crate) fn cleanup(root_dir: &Path) -> Result<(), NplanError> {
    cleanup_dir(
        &root_dir.join(CONNECTION_DIR),
        FILE_PREFIX,
        ".nmconnection",
    )?;
    cleanup_dir(&root_dir.join(CONF_DIR), UNMANAGED_CONF, "")?;
    cleanup_dir(&root_dir.join(CONF_DIR), GLOBALLY_MANAGED_CONF, "")?;
    cleanup_dir(&root_dir.join(RULES_DIR), RULES_FILE, "")?;
    Ok(())
}

/// Emit one keyfile per NetworkManager backed netdef (one per access
/// point for wifi), the unmanaged-devices configuration for everything
/// the other backends own, and udev rules for driver matches the
/// keyfile format cannot express.
pub(crate) fn write(
    state: &NetplanState,
    root_dir: &Path,
) -> Result<(), NplanError> {
    cleanup(root_dir)?;
    let connection_dir = root_dir.join(CONNECTION_DIR);
    let mut unmanaged: Vec<String> = Vec::new();
    let mut udev_rules = String::new();

    for netdef in state.iter() {
        match netdef.backend() {
            Backend::NetworkManager => (),
            // Not rendered here; the device may still need to be left
            // alone by NetworkManager.
            Backend::Networkd | Backend::Ovs => {
                collect_unmanaged(netdef, &mut unmanaged, &mut udev_rules);
                continue;
            }
        }
        if netdef.common().meta.sriov_vlan_filter {
            continue;
        }
        if let NetDef::Wifi(wifi) = netdef {
            for (ssid, ap) in wifi.access_points.iter().flatten() {
                let content = keyfile(state, netdef, Some((ssid, ap)))?;
                let filename = format!(
                    "{FILE_PREFIX}{}-{}.nmconnection",
                    escape_filename(netdef.id()),
                    escape_filename(ssid)
                );
                write_file(
                    &connection_dir.join(filename),
                    &content,
                    0o600,
                )?;
            }
        } else {
            let content = keyfile(state, netdef, None)?;
            let filename = format!(
                "{FILE_PREFIX}{}.nmconnection",
                escape_filename(netdef.id())
            );
            write_file(&connection_dir.join(filename), &content, 0o600)?;
        }
    }

    if !unmanaged.is_empty() {
        let content = format!(
            "[keyfile]\nunmanaged-devices+={}\n",
            unmanaged.join(";")
        );
        write_file(
            &root_dir.join(CONF_DIR).join(UNMANAGED_CONF),
            &content,
            0o644,
        )?;
    }
    if !udev_rules.is_empty() {
        write_file(
            &root_dir.join(RULES_DIR).join(RULES_FILE),
            &udev_rules,
            0o644,
        )?;
    }
    if state.global_renderer() == Some(Renderer::NetworkManager) {
        // Neutralize the distribution wide deny list.
        write_file(
            &root_dir.join(CONF_DIR).join(GLOBALLY_MANAGED_CONF),
            "",
            0o644,
        )?;
    }
    Ok(())
}

fn collect_unmanaged(
    netdef: &NetDef,
    unmanaged: &mut Vec<String>,
    udev_rules: &mut String,
) {
    let common = netdef.common();
    match common.match_config.as_ref() {
        None => {
            let name =
                common.set_name.as_deref().unwrap_or(netdef.id());
            unmanaged.push(format!("interface-name:{name}"));
        }
        Some(match_config) => {
            if let Some(name) = common.set_name.as_deref() {
                unmanaged.push(format!("interface-name:{name}"));
            } else if let Some(name) = match_config.name.as_deref() {
                unmanaged.push(format!("interface-name:{name}"));
            }
            if let Some(mac) = match_config.macaddress.as_deref() {
                unmanaged.push(format!("mac:{mac}"));
            }
            // Drivers cannot be matched in the keyfile format.
            for driver in match_config.driver.iter().flatten() {
                writeln!(
                    udev_rules,
                    "ACTION==\"add|change\", SUBSYSTEM==\"net\", \
                     ENV{{ID_NET_DRIVER}}==\"{driver}\", \
                     ENV{{NM_UNMANAGED}}=\"1\""
                )
                .unwrap();
            }
        }
    }
}

/// Stable connection UUID: explicitly configured, or derived from the
/// netdef ID so repeated generator runs do not churn.
pub(crate) fn connection_uuid(
    id: &str,
    nm: Option<&NetworkManagerSettings>,
) -> String {
    if let Some(uuid) = nm.and_then(|nm| nm.uuid.as_deref()) {
        return uuid.to_string();
    }
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("nplan://{id}").as_bytes())
        .to_string()
}

fn nm_connection_type(netdef: &NetDef) -> Option<&'static str> {
    Some(match netdef {
        NetDef::Ethernet(_) => "ethernet",
        NetDef::Wifi(_) => "wifi",
        NetDef::Modem(modem) => {
            if modem.is_gsm() {
                "gsm"
            } else {
                "cdma"
            }
        }
        NetDef::Bridge(_) => "bridge",
        NetDef::Bond(_) => "bond",
        NetDef::Vlan(_) => "vlan",
        NetDef::Vrf(_) => "vrf",
        NetDef::Dummy(_) => "dummy",
        NetDef::Veth(_) => "veth",
        NetDef::Tunnel(tunnel) => {
            if tunnel.is_wireguard() {
                "wireguard"
            } else {
                "ip-tunnel"
            }
        }
        // The passthrough map carries connection.type.
        NetDef::NmDevice(_) | NetDef::OvsPort(_) => return None,
    })
}

fn ip_tunnel_mode(mode: TunnelMode) -> u32 {
    match mode {
        TunnelMode::Ipip => 1,
        TunnelMode::Gre => 2,
        TunnelMode::Sit => 3,
        TunnelMode::Isatap => 4,
        TunnelMode::Vti => 5,
        TunnelMode::Ip6ip6 => 6,
        TunnelMode::Ipip6 => 7,
        TunnelMode::Ip6gre => 8,
        TunnelMode::Vti6 => 9,
        TunnelMode::Gretap => 10,
        TunnelMode::Ip6gretap => 11,
        TunnelMode::Vxlan | TunnelMode::Wireguard => 0,
    }
}

fn set(ini: &mut Ini, section: &str, key: &str, value: String) {
    ini.set(section, key, Some(value));
}

/// Build one keyfile. For wifi netdefs `ap` selects the access point
/// the file is for.
fn keyfile(
    state: &NetplanState,
    netdef: &NetDef,
    ap: Option<(&String, &WifiAccessPoint)>,
) -> Result<String, NplanError> {
    let common = netdef.common();
    let nm = common.networkmanager.as_ref();
    let mut ini = Ini::new_cs();

    // [connection]
    let connection_id = match (nm.and_then(|nm| nm.name.as_deref()), ap) {
        (Some(name), _) => name.to_string(),
        (None, Some((ssid, _))) => {
            format!("netplan-{}-{ssid}", netdef.id())
        }
        (None, None) => format!("netplan-{}", netdef.id()),
    };
    set(&mut ini, "connection", "id", connection_id);
    set(
        &mut ini,
        "connection",
        "uuid",
        connection_uuid(netdef.id(), nm),
    );
    if let Some(connection_type) = nm_connection_type(netdef) {
        set(
            &mut ini,
            "connection",
            "type",
            connection_type.to_string(),
        );
    }
    if let Some(stable_id) = nm.and_then(|nm| nm.stable_id.as_deref()) {
        set(&mut ini, "connection", "stable-id", stable_id.to_string());
    }
    let match_config = common.match_config.as_ref();
    if let Some(device) = nm.and_then(|nm| nm.device.as_deref()) {
        set(
            &mut ini,
            "connection",
            "interface-name",
            device.to_string(),
        );
    } else if let Some(set_name) = common.set_name.as_deref() {
        set(
            &mut ini,
            "connection",
            "interface-name",
            set_name.to_string(),
        );
    } else if match_config.is_none_or(|m| m.is_empty()) {
        set(
            &mut ini,
            "connection",
            "interface-name",
            netdef.id().to_string(),
        );
    } else if let Some(m) = match_config
        && let Some(name) = m.name.as_deref()
    {
        if m.name_is_glob() {
            set(&mut ini, "match", "interface-name", name.to_string());
        } else {
            set(
                &mut ini,
                "connection",
                "interface-name",
                name.to_string(),
            );
        }
    }
    if let Some(bond) = common.meta.bond.as_deref() {
        set(&mut ini, "connection", "slave-type", "bond".to_string());
        set(&mut ini, "connection", "master", bond.to_string());
    }
    if let Some(bridge) = common.meta.bridge.as_deref() {
        set(&mut ini, "connection", "slave-type", "bridge".to_string());
        set(&mut ini, "connection", "master", bridge.to_string());
    }
    if let Some(vrf) = common.meta.vrf.as_deref() {
        set(&mut ini, "connection", "slave-type", "vrf".to_string());
        set(&mut ini, "connection", "master", vrf.to_string());
    }
    if common.activation_mode.is_some() {
        set(
            &mut ini,
            "connection",
            "autoconnect",
            "false".to_string(),
        );
    }

    write_type_section(netdef, common, ap, &mut ini);

    // [vlan] needs the state: the parent is referenced by its UUID
    // when it matches on anything but a concrete name.
    if let NetDef::Vlan(vlan) = netdef {
        set(
            &mut ini,
            "vlan",
            "id",
            vlan.id.unwrap_or_default().to_string(),
        );
        if let Some(link) = vlan.link.as_deref() {
            let parent = match state.get(link) {
                Some(parent)
                    if parent.common().match_config.as_ref().is_some_and(
                        |m| {
                            m.name.is_none()
                                && (m.macaddress.is_some()
                                    || m.driver.is_some())
                        },
                    ) =>
                {
                    connection_uuid(
                        link,
                        parent.common().networkmanager.as_ref(),
                    )
                }
                _ => link.to_string(),
            };
            set(&mut ini, "vlan", "parent", parent);
        }
    }

    // [bridge-port] settings written by the owning bridge.
    if let Some(cost) = common.meta.bridge_path_cost {
        set(&mut ini, "bridge-port", "path-cost", cost.to_string());
    }
    if let Some(priority) = common.meta.bridge_port_priority {
        set(&mut ini, "bridge-port", "priority", priority.to_string());
    }

    write_ip_sections(netdef, common, ap, &mut ini);

    // Passthrough last: raw group.key pairs override any structured
    // write to the same key.
    apply_passthrough(netdef.id(), nm, &mut ini);
    if let Some((ssid, ap)) = ap {
        apply_passthrough(
            &format!("{}:{ssid}", netdef.id()),
            ap.networkmanager.as_ref(),
            &mut ini,
        );
    }

    Ok(ini.writes())
}

fn apply_passthrough(
    id: &str,
    nm: Option<&NetworkManagerSettings>,
    ini: &mut Ini,
) {
    let Some(nm) = nm else { return };
    for (group, key, value) in nm.valid_passthrough() {
        if key == "_" {
            // Sentinel marking an otherwise empty group.
            ini.set(group, "_", None);
            ini.remove_key(group, "_");
            continue;
        }
        if let Some(Some(previous)) =
            ini.set(group, key, Some(value.to_string()))
        {
            log::debug!(
                "{id}: passthrough overrides {group}.{key} \
                 (was '{previous}')"
            );
        }
    }
}

fn write_type_section(
    netdef: &NetDef,
    common: &CommonNetdef,
    ap: Option<(&String, &WifiAccessPoint)>,
    ini: &mut Ini,
) {
    let match_mac = common
        .match_config
        .as_ref()
        .and_then(|m| m.macaddress.as_deref());
    match netdef {
        NetDef::Ethernet(ethernet) => {
            if let Some(mac) = match_mac {
                set(ini, "ethernet", "mac-address", mac.to_string());
            }
            if let Some(mac) = common.macaddress.as_deref() {
                set(
                    ini,
                    "ethernet",
                    "cloned-mac-address",
                    mac.to_string(),
                );
            }
            if let Some(mtu) = common.mtu {
                set(ini, "ethernet", "mtu", mtu.to_string());
            }
            if let Some(wol) = common.wakeonlan {
                set(
                    ini,
                    "ethernet",
                    "wake-on-lan",
                    if wol { NM_WOL_MAGIC } else { 0 }.to_string(),
                );
            }
            if let Some(auth) = ethernet.auth.as_ref() {
                write_802_1x(auth, ini);
            }
        }
        NetDef::Wifi(wifi) => {
            let Some((ssid, ap)) = ap else { return };
            set(ini, "wifi", "ssid", ssid.to_string());
            let mode = match ap.mode() {
                AccessPointMode::Infrastructure => "infrastructure",
                AccessPointMode::Adhoc => "adhoc",
                AccessPointMode::Ap => "ap",
                AccessPointMode::Other => "infrastructure",
            };
            set(ini, "wifi", "mode", mode.to_string());
            if let Some(band) = ap.band {
                set(
                    ini,
                    "wifi",
                    "band",
                    match band {
                        WifiBand::Band5GHz => "a",
                        WifiBand::Band2_4GHz => "bg",
                    }
                    .to_string(),
                );
            }
            if let Some(channel) = ap.channel {
                set(ini, "wifi", "channel", channel.to_string());
            }
            if let Some(bssid) = ap.bssid.as_deref() {
                set(ini, "wifi", "bssid", bssid.to_string());
            }
            if ap.hidden == Some(true) {
                set(ini, "wifi", "hidden", "true".to_string());
            }
            if let Some(mac) = match_mac {
                set(ini, "wifi", "mac-address", mac.to_string());
            }
            if let Some(mac) = common.macaddress.as_deref() {
                set(ini, "wifi", "cloned-mac-address", mac.to_string());
            }
            if let Some(mtu) = common.mtu {
                set(ini, "wifi", "mtu", mtu.to_string());
            }
            if let Some(flags) = wifi.wakeonwlan.as_deref() {
                set(
                    ini,
                    "wifi",
                    "wake-on-wlan",
                    wowlan_flags(flags).to_string(),
                );
            }
            let auth =
                ap.effective_auth().or_else(|| wifi.auth.clone());
            if let Some(auth) = auth {
                write_wifi_security(&auth, ini);
            }
        }
        NetDef::Modem(modem) => {
            let section = if modem.is_gsm() { "gsm" } else { "cdma" };
            if let Some(v) = modem.apn.as_deref() {
                set(ini, section, "apn", v.to_string());
            }
            if modem.auto_config == Some(true) {
                set(ini, section, "auto-config", "true".to_string());
            }
            if let Some(v) = modem.device_id.as_deref() {
                set(ini, section, "device-id", v.to_string());
            }
            if let Some(v) = modem.network_id.as_deref() {
                set(ini, section, "network-id", v.to_string());
            }
            if let Some(v) = modem.number.as_deref() {
                set(ini, section, "number", v.to_string());
            }
            if let Some(v) = modem.password.as_deref() {
                set(ini, section, "password", v.to_string());
            }
            if let Some(v) = modem.pin.as_deref() {
                set(ini, section, "pin", v.to_string());
            }
            if let Some(v) = modem.sim_id.as_deref() {
                set(ini, section, "sim-id", v.to_string());
            }
            if let Some(v) = modem.sim_operator_id.as_deref() {
                set(ini, section, "sim-operator-id", v.to_string());
            }
            if let Some(v) = modem.username.as_deref() {
                set(ini, section, "username", v.to_string());
            }
            if let Some(mtu) = common.mtu {
                set(ini, section, "mtu", mtu.to_string());
            }
        }
        NetDef::Bond(bond) => {
            if let Some(params) = bond.parameters.as_ref() {
                if let Some(mode) = params.mode {
                    set(ini, "bond", "mode", mode.as_str().to_string());
                }
                if let Some(v) = params.lacp_rate {
                    set(
                        ini,
                        "bond",
                        "lacp_rate",
                        match v {
                            crate::BondLacpRate::Slow => "slow",
                            crate::BondLacpRate::Fast => "fast",
                        }
                        .to_string(),
                    );
                }
                if let Some(v) = params.mii_monitor_interval {
                    set(ini, "bond", "miimon", v.to_string());
                }
                if let Some(v) = params.min_links {
                    set(ini, "bond", "min_links", v.to_string());
                }
                if let Some(v) = params.transmit_hash_policy {
                    set(
                        ini,
                        "bond",
                        "xmit_hash_policy",
                        v.as_str().to_string(),
                    );
                }
                if let Some(v) = params.arp_interval {
                    set(ini, "bond", "arp_interval", v.to_string());
                }
                if let Some(targets) = params.arp_ip_targets.as_deref() {
                    set(
                        ini,
                        "bond",
                        "arp_ip_target",
                        targets.join(","),
                    );
                }
                if let Some(v) = params.up_delay {
                    set(ini, "bond", "updelay", v.to_string());
                }
                if let Some(v) = params.down_delay {
                    set(ini, "bond", "downdelay", v.to_string());
                }
                if let Some(primary) = params.primary.as_deref() {
                    set(ini, "bond", "primary", primary.to_string());
                }
            }
        }
        NetDef::Bridge(bridge) => {
            if let Some(params) = bridge.parameters.as_ref() {
                set(
                    ini,
                    "bridge",
                    "stp",
                    bridge.stp().to_string(),
                );
                if let Some(v) = params.priority {
                    set(ini, "bridge", "priority", v.to_string());
                }
                if let Some(v) = params.forward_delay {
                    set(ini, "bridge", "forward-delay", v.to_string());
                }
                if let Some(v) = params.hello_time {
                    set(ini, "bridge", "hello-time", v.to_string());
                }
                if let Some(v) = params.max_age {
                    set(ini, "bridge", "max-age", v.to_string());
                }
                if let Some(v) = params.ageing_time {
                    set(ini, "bridge", "ageing-time", v.to_string());
                }
            }
        }
        NetDef::Vlan(_) => (), // handled by the caller, needs state
        NetDef::Vrf(vrf) => {
            if let Some(table) = vrf.table {
                set(ini, "vrf", "table", table.to_string());
            }
        }
        NetDef::Veth(veth) => {
            if let Some(peer) = veth.peer.as_deref() {
                set(ini, "veth", "peer", peer.to_string());
            }
        }
        NetDef::Tunnel(tunnel) => {
            if tunnel.is_wireguard() {
                if let Some(private) = tunnel
                    .keys
                    .as_ref()
                    .and_then(|k| k.private.as_deref())
                {
                    set(
                        ini,
                        "wireguard",
                        "private-key",
                        private.to_string(),
                    );
                }
                if let Some(flags) = tunnel
                    .keys
                    .as_ref()
                    .and_then(|k| k.private_key_flags.as_deref())
                {
                    set(
                        ini,
                        "wireguard",
                        "private-key-flags",
                        key_flags(flags).to_string(),
                    );
                }
                if let Some(port) = tunnel.port {
                    set(
                        ini,
                        "wireguard",
                        "listen-port",
                        port.to_string(),
                    );
                }
                if let Some(mark) = tunnel.mark {
                    set(ini, "wireguard", "fwmark", mark.to_string());
                }
                for peer in tunnel.peers.iter().flatten() {
                    let Some(public) = peer
                        .keys
                        .as_ref()
                        .and_then(|k| k.public.as_deref())
                    else {
                        continue;
                    };
                    let section = format!("wireguard-peer.{public}");
                    if let Some(endpoint) = peer.endpoint.as_deref() {
                        set(
                            ini,
                            &section,
                            "endpoint",
                            endpoint.to_string(),
                        );
                    }
                    if let Some(shared) = peer
                        .keys
                        .as_ref()
                        .and_then(|k| k.shared.as_deref())
                    {
                        set(
                            ini,
                            &section,
                            "preshared-key",
                            shared.to_string(),
                        );
                        set(
                            ini,
                            &section,
                            "preshared-key-flags",
                            "0".to_string(),
                        );
                    }
                    if let Some(keepalive) = peer.keepalive {
                        set(
                            ini,
                            &section,
                            "persistent-keepalive",
                            keepalive.to_string(),
                        );
                    }
                    if let Some(allowed) = peer.allowed_ips.as_deref() {
                        set(
                            ini,
                            &section,
                            "allowed-ips",
                            allowed.join(";"),
                        );
                    }
                }
            } else if let Some(mode) = tunnel.mode {
                set(
                    ini,
                    "ip-tunnel",
                    "mode",
                    ip_tunnel_mode(mode).to_string(),
                );
                if let Some(local) = tunnel.local.as_deref() {
                    set(ini, "ip-tunnel", "local", local.to_string());
                }
                if let Some(remote) = tunnel.remote.as_deref() {
                    set(ini, "ip-tunnel", "remote", remote.to_string());
                }
                if let Some(ttl) = tunnel.ttl {
                    set(ini, "ip-tunnel", "ttl", ttl.to_string());
                }
                if let Some(keys) = tunnel.keys.as_ref() {
                    if let Some(input) = keys.input.as_deref() {
                        set(
                            ini,
                            "ip-tunnel",
                            "input-key",
                            input.to_string(),
                        );
                    }
                    if let Some(output) = keys.output.as_deref() {
                        set(
                            ini,
                            "ip-tunnel",
                            "output-key",
                            output.to_string(),
                        );
                    }
                }
            }
        }
        NetDef::Dummy(_) | NetDef::NmDevice(_) | NetDef::OvsPort(_) => (),
    }
}

fn wowlan_flags(flags: &[WakeOnWlanFlag]) -> u32 {
    let mut bits = 0u32;
    for flag in flags {
        bits |= match flag {
            WakeOnWlanFlag::Default => 0x1,
            WakeOnWlanFlag::Any => 0x2,
            WakeOnWlanFlag::Disconnect => 0x4,
            WakeOnWlanFlag::MagicPacket => 0x8,
            WakeOnWlanFlag::GtkRekeyFailure => 0x10,
            WakeOnWlanFlag::EapIdentityRequest => 0x20,
            WakeOnWlanFlag::FourWayHandshake => 0x40,
            WakeOnWlanFlag::RfkillRelease => 0x80,
            WakeOnWlanFlag::Tcp => 0x100,
        };
    }
    bits
}

fn key_flags(flags: &[crate::KeyFlag]) -> u32 {
    let mut bits = 0u32;
    for flag in flags {
        bits |= match flag {
            crate::KeyFlag::AgentOwned => 0x1,
            crate::KeyFlag::NotSaved => 0x2,
            crate::KeyFlag::NotRequired => 0x4,
        };
    }
    bits
}

fn write_wifi_security(auth: &AuthSettings, ini: &mut Ini) {
    let key_mgmt = match auth.key_management() {
        AuthKeyManagement::None => return,
        AuthKeyManagement::Psk => "wpa-psk",
        AuthKeyManagement::Sae => "sae",
        AuthKeyManagement::EapSuiteB192 => "wpa-eap-suite-b-192",
        AuthKeyManagement::Eap
        | AuthKeyManagement::EapSha256
        | AuthKeyManagement::Dot1x => "wpa-eap",
    };
    set(ini, "wifi-security", "key-mgmt", key_mgmt.to_string());
    match auth.key_management().pmf_mode() {
        AuthPmfMode::Disabled => (),
        AuthPmfMode::Optional => {
            set(ini, "wifi-security", "pmf", "2".to_string())
        }
        AuthPmfMode::Required => {
            set(ini, "wifi-security", "pmf", "3".to_string())
        }
    }
    if auth.uses_eap() {
        write_802_1x(auth, ini);
    } else if let Some(password) = auth.password.as_deref() {
        set(ini, "wifi-security", "psk", password.to_string());
    }
}

fn write_802_1x(auth: &AuthSettings, ini: &mut Ini) {
    const SECTION: &str = "802-1x";
    if let Some(method) = auth.eap_method {
        set(
            ini,
            SECTION,
            "eap",
            match method {
                crate::AuthEapMethod::Tls => "tls",
                crate::AuthEapMethod::Peap => "peap",
                crate::AuthEapMethod::Ttls => "ttls",
                crate::AuthEapMethod::Leap => "leap",
                crate::AuthEapMethod::Pwd => "pwd",
            }
            .to_string(),
        );
    }
    if let Some(v) = auth.identity.as_deref() {
        set(ini, SECTION, "identity", v.to_string());
    }
    if let Some(v) = auth.anonymous_identity.as_deref() {
        set(ini, SECTION, "anonymous-identity", v.to_string());
    }
    if let Some(v) = auth.password.as_deref() {
        set(ini, SECTION, "password", v.to_string());
    }
    if let Some(v) = auth.ca_certificate.as_deref() {
        set(ini, SECTION, "ca-cert", v.to_string());
    }
    if let Some(v) = auth.client_certificate.as_deref() {
        set(ini, SECTION, "client-cert", v.to_string());
    }
    if let Some(v) = auth.client_key.as_deref() {
        set(ini, SECTION, "private-key", v.to_string());
    }
    if let Some(v) = auth.client_key_password.as_deref() {
        set(ini, SECTION, "private-key-password", v.to_string());
    }
    if let Some(v) = auth.phase2_auth.as_deref() {
        set(ini, SECTION, "phase2-auth", v.to_string());
    }
}

fn write_ip_sections(
    netdef: &NetDef,
    common: &CommonNetdef,
    ap: Option<(&String, &WifiAccessPoint)>,
    ini: &mut Ini,
) {
    let v4_addresses: Vec<&str> = common
        .addresses
        .iter()
        .flatten()
        .filter(|a| !a.is_ipv6())
        .map(|a| a.address.as_str())
        .collect();
    let v6_addresses: Vec<&str> = common
        .addresses
        .iter()
        .flatten()
        .filter(|a| a.is_ipv6())
        .map(|a| a.address.as_str())
        .collect();
    let is_tunnel = matches!(netdef, NetDef::Tunnel(_));
    let shared =
        ap.is_some_and(|(_, ap)| ap.mode() == AccessPointMode::Ap);

    // [ipv4]
    let method4 = if shared {
        "shared"
    } else if common.dhcp4() {
        "auto"
    } else if !v4_addresses.is_empty() {
        "manual"
    } else if is_tunnel {
        "disabled"
    } else {
        "link-local"
    };
    set(ini, "ipv4", "method", method4.to_string());
    for (index, address) in v4_addresses.iter().enumerate() {
        set(
            ini,
            "ipv4",
            &format!("address{}", index + 1),
            address.to_string(),
        );
    }
    if let Some(gateway) = common.gateway4.as_deref() {
        set(ini, "ipv4", "gateway", gateway.to_string());
    }
    write_nameservers(common, false, ini);
    write_routes(common, false, ini);
    write_dhcp_overrides(
        common.dhcp4_overrides.as_ref(),
        common.dhcp4(),
        "ipv4",
        ini,
    );

    // [ipv6]
    let method6 = if common.dhcp6() {
        "auto"
    } else if common.accept_ra == Some(true) {
        "auto"
    } else if !v6_addresses.is_empty() {
        "manual"
    } else if is_tunnel {
        "disabled"
    } else {
        "ignore"
    };
    set(ini, "ipv6", "method", method6.to_string());
    for (index, address) in v6_addresses.iter().enumerate() {
        set(
            ini,
            "ipv6",
            &format!("address{}", index + 1),
            address.to_string(),
        );
    }
    if let Some(gateway) = common.gateway6.as_deref() {
        set(ini, "ipv6", "gateway", gateway.to_string());
    }
    match common.ipv6_address_generation {
        Some(crate::Ipv6AddressGeneration::Eui64) => {
            set(ini, "ipv6", "addr-gen-mode", "0".to_string())
        }
        Some(crate::Ipv6AddressGeneration::StablePrivacy) => {
            set(ini, "ipv6", "addr-gen-mode", "1".to_string())
        }
        None => (),
    }
    if let Some(token) = common.ipv6_address_token.as_deref() {
        set(ini, "ipv6", "token", token.to_string());
    }
    if let Some(privacy) = common.ipv6_privacy {
        set(
            ini,
            "ipv6",
            "ip6-privacy",
            if privacy { "2" } else { "0" }.to_string(),
        );
    }
    write_nameservers(common, true, ini);
    write_routes(common, true, ini);
    write_dhcp_overrides(
        common.dhcp6_overrides.as_ref(),
        common.dhcp6(),
        "ipv6",
        ini,
    );
}

fn write_nameservers(
    common: &CommonNetdef,
    ipv6: bool,
    ini: &mut Ini,
) {
    let section = if ipv6 { "ipv6" } else { "ipv4" };
    let Some(nameservers) = common.nameservers.as_ref() else {
        return;
    };
    let addresses: Vec<&str> = nameservers
        .addresses
        .iter()
        .flatten()
        .filter(|a| is_ipv6_addr(a) == ipv6)
        .map(|a| a.as_str())
        .collect();
    if !addresses.is_empty() {
        set(ini, section, "dns", format!("{};", addresses.join(";")));
    }
    // The search list applies to both families; an empty list clears
    // the key.
    if let Some(search) = nameservers.search.as_deref()
        && !search.is_empty()
    {
        set(
            ini,
            section,
            "dns-search",
            format!("{};", search.join(";")),
        );
    }
}

fn write_routes(common: &CommonNetdef, ipv6: bool, ini: &mut Ini) {
    let section = if ipv6 { "ipv6" } else { "ipv4" };
    let mut index = 0usize;
    for route in common.routes.iter().flatten() {
        let Some(family) = route.family() else { continue };
        if (family == crate::AddressFamily::Ipv6) != ipv6 {
            continue;
        }
        index += 1;
        let to = match route.to.as_deref() {
            Some("default") if ipv6 => "::/0".to_string(),
            Some("default") => "0.0.0.0/0".to_string(),
            Some(to) => to.to_string(),
            None => continue,
        };
        let mut entry = to;
        if let Some(via) = route.via.as_deref() {
            entry.push_str(&format!(",{via}"));
        }
        if let Some(metric) = route.metric {
            entry.push_str(&format!(",{metric}"));
        }
        set(ini, section, &format!("route{index}"), entry);

        let mut options: Vec<String> = Vec::new();
        if let Some(table) = route.table {
            options.push(format!("table={table}"));
        }
        if route.on_link == Some(true) {
            options.push("onlink=true".to_string());
        }
        if let Some(mtu) = route.mtu {
            options.push(format!("mtu={mtu}"));
        }
        if let Some(v) = route.congestion_window {
            options.push(format!("initcwnd={v}"));
        }
        if let Some(v) = route.advertised_receive_window {
            options.push(format!("initrwnd={v}"));
        }
        if let Some(from) = route.from.as_deref() {
            options.push(format!("src={from}"));
        }
        if !options.is_empty() {
            set(
                ini,
                section,
                &format!("route{index}_options"),
                options.join(","),
            );
        }
    }
}

fn write_dhcp_overrides(
    overrides: Option<&crate::DhcpOverrides>,
    dhcp_enabled: bool,
    section: &str,
    ini: &mut Ini,
) {
    let Some(overrides) = overrides else { return };
    if !dhcp_enabled {
        return;
    }
    if overrides.use_dns == Some(false) {
        set(ini, section, "ignore-auto-dns", "true".to_string());
    }
    if overrides.use_routes == Some(false) {
        set(ini, section, "ignore-auto-routes", "true".to_string());
    }
    if let Some(metric) = overrides.route_metric {
        set(ini, section, "route-metric", metric.to_string());
    }
    if let Some(hostname) = overrides.hostname.as_deref() {
        set(ini, section, "dhcp-hostname", hostname.to_string());
    }
    if overrides.send_hostname == Some(false) {
        set(
            ini,
            section,
            "dhcp-send-hostname",
            "false".to_string(),
        );
    }
    if let Some(UseDomains::Route) = overrides.use_domains {
        // Routing only domains map to a negative DNS priority.
        set(ini, section, "dns-priority", "-1".to_string());
    }
}
