// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write as _;
use std::path::Path;

use crate::{
    Backend, DeviceKind, LinkLocalFamily, NetDef, NetplanState,
    NplanError, NplanNetdef, RouteScope, RouteType, TunnelMode,
    UseDomains,
    netdef::common::CommonNetdef,
    renderer::{cleanup_dir, escape_filename, write_file, yes_no},
};

const NETWORK_DIR: &str = "run/systemd/network";
const RULES_DIR: &str = "run/udev/rules.d";
const RULES_FILE: &str = "90-netplan.rules";
const FILE_PREFIX: &str = "10-netplan-";

/// Unlink all network daemon outputs of a previous generator run.
pub(crate) fn cleanup(root_dir: &Path) -> Result<(), NplanError> {
    let network_dir = root_dir.join(NETWORK_DIR);
    for suffix in [".link", ".netdev", ".network"] {
        cleanup_dir(&network_dir, FILE_PREFIX, suffix)?;
    }
    cleanup_dir(&root_dir.join(RULES_DIR), RULES_FILE, "")?;
    Ok(())
}

/// Emit `.link`, `.netdev`, `.network` files and udev rename rules for
/// every netdef the network daemon backend is responsible for. OVS
/// backed netdefs get their `.network` addressing file here as well;
/// the OVS devices themselves are created by an external collaborator.
pub(crate) fn write(
    state: &NetplanState,
    root_dir: &Path,
) -> Result<(), NplanError> {
    cleanup(root_dir)?;
    let network_dir = root_dir.join(NETWORK_DIR);
    let mut udev_rules = String::new();

    for netdef in state.iter() {
        let ovs = match netdef.backend() {
            Backend::Networkd => false,
            Backend::Ovs => true,
            Backend::NetworkManager => continue,
        };
        if netdef.common().meta.sriov_vlan_filter
            || netdef.common().meta.placeholder
            || netdef.kind() == DeviceKind::NmDevice
        {
            continue;
        }
        let escaped_id = escape_filename(netdef.id());

        if !ovs {
            if let Some(content) = link_file(netdef) {
                write_file(
                    &network_dir
                        .join(format!("{FILE_PREFIX}{escaped_id}.link")),
                    &content,
                    0o644,
                )?;
            }
            if let Some(content) = netdev_file(netdef) {
                let mode = if matches!(netdef, NetDef::Tunnel(t) if t.is_wireguard())
                {
                    // Contains private key material.
                    0o600
                } else {
                    0o644
                };
                write_file(
                    &network_dir.join(format!(
                        "{FILE_PREFIX}{escaped_id}.netdev"
                    )),
                    &content,
                    mode,
                )?;
            }
            append_udev_rules(netdef, &mut udev_rules);
        }
        if netdef.kind() != DeviceKind::OvsPort {
            let content = network_file(state, netdef);
            write_file(
                &network_dir
                    .join(format!("{FILE_PREFIX}{escaped_id}.network")),
                &content,
                0o644,
            )?;
        }
    }

    if !udev_rules.is_empty() {
        write_file(
            &root_dir.join(RULES_DIR).join(RULES_FILE),
            &udev_rules,
            0o644,
        )?;
    }
    Ok(())
}

fn is_virtual(kind: DeviceKind) -> bool {
    matches!(
        kind,
        DeviceKind::Bridge
            | DeviceKind::Bond
            | DeviceKind::Vlan
            | DeviceKind::Vrf
            | DeviceKind::Tunnel
            | DeviceKind::Dummy
            | DeviceKind::Veth
    )
}

/// `[Match]` block of a `.network` file. Virtual devices and physical
/// devices without a match block go by the netdef ID; `set-name`
/// matches the renamed interface.
fn match_section(netdef: &NetDef) -> String {
    let common = netdef.common();
    let mut out = String::from("[Match]\n");
    if let Some(name) = common.set_name.as_deref() {
        writeln!(out, "Name={name}").unwrap();
    } else if let Some(match_config) = common.match_config.as_ref() {
        if let Some(name) = match_config.name.as_deref() {
            writeln!(out, "Name={name}").unwrap();
        }
        if let Some(mac) = match_config.macaddress.as_deref() {
            writeln!(out, "MACAddress={mac}").unwrap();
        }
        if let Some(drivers) = match_config.driver.as_deref() {
            writeln!(out, "Driver={}", drivers.join(" ")).unwrap();
        }
    } else {
        writeln!(out, "Name={}", netdef.id()).unwrap();
    }
    out
}

/// `.link` file carrying rename, MAC policy, wake on LAN and hardware
/// offloads of a physical device.
fn link_file(netdef: &NetDef) -> Option<String> {
    if !netdef.is_physical() {
        return None;
    }
    let common = netdef.common();
    let mut link = String::new();
    if let Some(name) = common.set_name.as_deref() {
        writeln!(link, "Name={name}").unwrap();
    }
    if let Some(wol) = common.wakeonlan {
        writeln!(link, "WakeOnLan={}", if wol { "magic" } else { "off" })
            .unwrap();
    }
    if let Some(mac) = common.macaddress.as_deref() {
        match mac {
            "permanent" => writeln!(link, "MACAddressPolicy=persistent"),
            "random" => writeln!(link, "MACAddressPolicy=random"),
            "stable" | "preserve" => {
                writeln!(link, "MACAddressPolicy=none")
            }
            mac => writeln!(link, "MACAddress={mac}"),
        }
        .unwrap();
    }
    for (key, value) in [
        ("ReceiveChecksumOffload", common.receive_checksum_offload),
        ("TransmitChecksumOffload", common.transmit_checksum_offload),
        ("TCPSegmentationOffload", common.tcp_segmentation_offload),
        ("TCP6SegmentationOffload", common.tcp6_segmentation_offload),
        (
            "GenericSegmentationOffload",
            common.generic_segmentation_offload,
        ),
        ("GenericReceiveOffload", common.generic_receive_offload),
        ("LargeReceiveOffload", common.large_receive_offload),
    ] {
        if let Some(value) = value {
            writeln!(link, "{key}={}", yes_no(value)).unwrap();
        }
    }
    if link.is_empty() {
        return None;
    }

    let mut out = String::from("[Match]\n");
    let match_config = common.match_config.as_ref();
    match (
        match_config.and_then(|m| m.name.as_deref()),
        match_config.and_then(|m| m.macaddress.as_deref()),
        match_config.and_then(|m| m.driver.as_deref()),
    ) {
        (None, None, None) => {
            writeln!(out, "OriginalName={}", netdef.id()).unwrap();
        }
        (name, mac, drivers) => {
            if let Some(name) = name {
                writeln!(out, "OriginalName={name}").unwrap();
            }
            if let Some(mac) = mac {
                writeln!(out, "MACAddress={mac}").unwrap();
            }
            if let Some(drivers) = drivers {
                writeln!(out, "Driver={}", drivers.join(" ")).unwrap();
            }
        }
    }
    out.push_str("\n[Link]\n");
    out.push_str(&link);
    Some(out)
}

/// udev rename rules for devices matched by driver or MAC; a rename by
/// original name alone is handled by the `.link` file.
fn append_udev_rules(netdef: &NetDef, rules: &mut String) {
    let common = netdef.common();
    let (Some(set_name), Some(match_config)) =
        (common.set_name.as_deref(), common.match_config.as_ref())
    else {
        return;
    };
    let mac = match_config.macaddress.as_deref();
    let drivers = match_config.driver.as_deref().unwrap_or_default();
    if mac.is_none() && drivers.is_empty() {
        return;
    }
    let driver_list: Vec<Option<&str>> = if drivers.is_empty() {
        vec![None]
    } else {
        drivers.iter().map(|d| Some(d.as_str())).collect()
    };
    for driver in driver_list {
        write!(rules, "SUBSYSTEM==\"net\", ACTION==\"add\"").unwrap();
        write!(rules, ", DRIVERS==\"{}\"", driver.unwrap_or("?*"))
            .unwrap();
        if let Some(mac) = mac {
            write!(rules, ", ATTR{{address}}==\"{mac}\"").unwrap();
        }
        writeln!(rules, ", NAME=\"{set_name}\"").unwrap();
    }
}

/// `.netdev` file creating a virtual device.
fn netdev_file(netdef: &NetDef) -> Option<String> {
    if !is_virtual(netdef.kind()) {
        return None;
    }
    let common = netdef.common();
    let mut out = String::from("[NetDev]\n");
    writeln!(out, "Name={}", netdef.id()).unwrap();
    let kind = match netdef {
        NetDef::Bridge(_) => "bridge",
        NetDef::Bond(_) => "bond",
        NetDef::Vlan(_) => "vlan",
        NetDef::Vrf(_) => "vrf",
        NetDef::Dummy(_) => "dummy",
        NetDef::Veth(_) => "veth",
        NetDef::Tunnel(tunnel) => netdev_tunnel_kind(tunnel),
        _ => return None,
    };
    writeln!(out, "Kind={kind}").unwrap();
    if let Some(mtu) = common.mtu {
        writeln!(out, "MTUBytes={mtu}").unwrap();
    }
    if let Some(mac) = common.macaddress.as_deref()
        && !["permanent", "random", "stable", "preserve"].contains(&mac)
    {
        writeln!(out, "MACAddress={mac}").unwrap();
    }

    match netdef {
        NetDef::Bond(bond) => {
            if let Some(params) = bond.parameters.as_ref() {
                out.push_str("\n[Bond]\n");
                if let Some(mode) = params.mode {
                    writeln!(out, "Mode={}", mode.as_str()).unwrap();
                }
                if let Some(rate) = params.lacp_rate {
                    writeln!(
                        out,
                        "LACPTransmitRate={}",
                        match rate {
                            crate::BondLacpRate::Slow => "slow",
                            crate::BondLacpRate::Fast => "fast",
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.mii_monitor_interval {
                    writeln!(out, "MIIMonitorSec={v}").unwrap();
                }
                if let Some(v) = params.min_links {
                    writeln!(out, "MinLinks={v}").unwrap();
                }
                if let Some(v) = params.transmit_hash_policy {
                    writeln!(out, "TransmitHashPolicy={}", v.as_str())
                        .unwrap();
                }
                if let Some(v) = params.ad_select {
                    writeln!(
                        out,
                        "AdSelect={}",
                        match v {
                            crate::BondAdSelect::Stable => "stable",
                            crate::BondAdSelect::Bandwidth => "bandwidth",
                            crate::BondAdSelect::Count => "count",
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.all_members_active {
                    writeln!(out, "AllSlavesActive={}", yes_no(v))
                        .unwrap();
                }
                if let Some(v) = params.arp_interval {
                    writeln!(out, "ARPIntervalSec={v}").unwrap();
                }
                if let Some(targets) = params.arp_ip_targets.as_deref() {
                    writeln!(out, "ARPIPTargets={}", targets.join(" "))
                        .unwrap();
                }
                if let Some(v) = params.arp_validate.as_ref() {
                    writeln!(
                        out,
                        "ARPValidate={}",
                        match v {
                            crate::BondArpValidate::None => "none",
                            crate::BondArpValidate::Active => "active",
                            crate::BondArpValidate::Backup => "backup",
                            crate::BondArpValidate::All => "all",
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.arp_all_targets.as_ref() {
                    writeln!(
                        out,
                        "ARPAllTargets={}",
                        match v {
                            crate::BondArpAllTargets::Any => "any",
                            crate::BondArpAllTargets::All => "all",
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.up_delay {
                    writeln!(out, "UpDelaySec={v}").unwrap();
                }
                if let Some(v) = params.down_delay {
                    writeln!(out, "DownDelaySec={v}").unwrap();
                }
                if let Some(v) = params.fail_over_mac_policy.as_ref() {
                    writeln!(
                        out,
                        "FailOverMACPolicy={}",
                        match v {
                            crate::BondFailOverMacPolicy::None => "none",
                            crate::BondFailOverMacPolicy::Active => {
                                "active"
                            }
                            crate::BondFailOverMacPolicy::Follow => {
                                "follow"
                            }
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.gratuitous_arp {
                    writeln!(out, "GratuitousARP={v}").unwrap();
                }
                if let Some(v) = params.packets_per_member {
                    writeln!(out, "PacketsPerSlave={v}").unwrap();
                }
                if let Some(v) = params.primary_reselect_policy.as_ref() {
                    writeln!(
                        out,
                        "PrimaryReselectPolicy={}",
                        match v {
                            crate::BondPrimaryReselectPolicy::Always => {
                                "always"
                            }
                            crate::BondPrimaryReselectPolicy::Better => {
                                "better"
                            }
                            crate::BondPrimaryReselectPolicy::Failure => {
                                "failure"
                            }
                        }
                    )
                    .unwrap();
                }
                if let Some(v) = params.resend_igmp {
                    writeln!(out, "ResendIGMP={v}").unwrap();
                }
                if let Some(v) = params.learn_packet_interval {
                    writeln!(out, "LearnPacketIntervalSec={v}").unwrap();
                }
            }
        }
        NetDef::Bridge(bridge) => {
            if let Some(params) = bridge.parameters.as_ref() {
                out.push_str("\n[Bridge]\n");
                if let Some(v) = params.ageing_time {
                    writeln!(out, "AgeingTimeSec={v}").unwrap();
                }
                if let Some(v) = params.priority {
                    writeln!(out, "Priority={v}").unwrap();
                }
                if let Some(v) = params.forward_delay {
                    writeln!(out, "ForwardDelaySec={v}").unwrap();
                }
                if let Some(v) = params.hello_time {
                    writeln!(out, "HelloTimeSec={v}").unwrap();
                }
                if let Some(v) = params.max_age {
                    writeln!(out, "MaxAgeSec={v}").unwrap();
                }
                writeln!(out, "STP={}", yes_no(bridge.stp())).unwrap();
            }
        }
        NetDef::Vlan(vlan) => {
            out.push_str("\n[VLAN]\n");
            writeln!(out, "Id={}", vlan.id.unwrap_or_default()).unwrap();
        }
        NetDef::Vrf(vrf) => {
            out.push_str("\n[VRF]\n");
            writeln!(out, "Table={}", vrf.table.unwrap_or_default())
                .unwrap();
        }
        NetDef::Veth(veth) => {
            if let Some(peer) = veth.peer.as_deref() {
                out.push_str("\n[Peer]\n");
                writeln!(out, "Name={peer}").unwrap();
            }
        }
        NetDef::Tunnel(tunnel) => {
            netdev_tunnel_body(tunnel, &mut out);
        }
        _ => (),
    }
    Some(out)
}

fn netdev_tunnel_kind(tunnel: &crate::TunnelNetdef) -> &'static str {
    match tunnel.mode.unwrap_or(TunnelMode::Ipip) {
        TunnelMode::Ipip => "ipip",
        TunnelMode::Gre => "gre",
        TunnelMode::Sit | TunnelMode::Isatap => "sit",
        TunnelMode::Vti => "vti",
        TunnelMode::Vti6 => "vti6",
        TunnelMode::Ip6ip6 | TunnelMode::Ipip6 => "ip6tnl",
        TunnelMode::Ip6gre => "ip6gre",
        TunnelMode::Ip6gretap => "ip6gretap",
        TunnelMode::Gretap => "gretap",
        TunnelMode::Vxlan => "vxlan",
        TunnelMode::Wireguard => "wireguard",
    }
}

fn netdev_tunnel_body(tunnel: &crate::TunnelNetdef, out: &mut String) {
    match tunnel.mode {
        Some(TunnelMode::Wireguard) => {
            out.push_str("\n[WireGuard]\n");
            if let Some(private) =
                tunnel.keys.as_ref().and_then(|k| k.private.as_deref())
            {
                if private.starts_with('/') {
                    writeln!(out, "PrivateKeyFile={private}").unwrap();
                } else {
                    writeln!(out, "PrivateKey={private}").unwrap();
                }
            }
            if let Some(port) = tunnel.port {
                writeln!(out, "ListenPort={port}").unwrap();
            }
            if let Some(mark) = tunnel.mark {
                writeln!(out, "FwMark={mark}").unwrap();
            }
            for peer in tunnel.peers.iter().flatten() {
                out.push_str("\n[WireGuardPeer]\n");
                if let Some(public) =
                    peer.keys.as_ref().and_then(|k| k.public.as_deref())
                {
                    writeln!(out, "PublicKey={public}").unwrap();
                }
                if let Some(shared) =
                    peer.keys.as_ref().and_then(|k| k.shared.as_deref())
                {
                    if shared.starts_with('/') {
                        writeln!(out, "PresharedKeyFile={shared}")
                            .unwrap();
                    } else {
                        writeln!(out, "PresharedKey={shared}").unwrap();
                    }
                }
                if let Some(endpoint) = peer.endpoint.as_deref() {
                    writeln!(out, "Endpoint={endpoint}").unwrap();
                }
                if let Some(keepalive) = peer.keepalive {
                    writeln!(out, "PersistentKeepalive={keepalive}")
                        .unwrap();
                }
                if let Some(allowed) = peer.allowed_ips.as_deref() {
                    writeln!(out, "AllowedIPs={}", allowed.join(","))
                        .unwrap();
                }
            }
        }
        Some(TunnelMode::Vxlan) => {
            out.push_str("\n[VXLAN]\n");
            writeln!(out, "VNI={}", tunnel.id.unwrap_or_default())
                .unwrap();
            if let Some(remote) = tunnel.remote.as_deref() {
                writeln!(out, "Remote={remote}").unwrap();
            }
            if let Some(local) = tunnel.local.as_deref() {
                writeln!(out, "Local={local}").unwrap();
            }
            if let Some(tos) = tunnel.type_of_service {
                writeln!(out, "TOS={tos}").unwrap();
            }
            if let Some(ttl) = tunnel.ttl {
                writeln!(out, "TTL={ttl}").unwrap();
            }
            if let Some(v) = tunnel.mac_learning {
                writeln!(out, "MacLearning={}", yes_no(v)).unwrap();
            }
            if let Some(v) = tunnel.ageing {
                writeln!(out, "FDBAgeingSec={v}").unwrap();
            }
            if let Some(v) = tunnel.limit {
                writeln!(out, "MaximumFDBEntries={v}").unwrap();
            }
            if let Some(v) = tunnel.arp_proxy {
                writeln!(out, "ReduceARPProxy={}", yes_no(v)).unwrap();
            }
            for flag in tunnel.notifications.iter().flatten() {
                match flag {
                    crate::VxlanNotification::L2Miss => {
                        writeln!(out, "L2MissNotification=yes").unwrap()
                    }
                    crate::VxlanNotification::L3Miss => {
                        writeln!(out, "L3MissNotification=yes").unwrap()
                    }
                }
            }
            if let Some(v) = tunnel.short_circuit {
                writeln!(out, "RouteShortCircuit={}", yes_no(v))
                    .unwrap();
            }
            for flag in tunnel.checksums.iter().flatten() {
                let key = match flag {
                    crate::VxlanChecksum::Udp => "UDPChecksum",
                    crate::VxlanChecksum::ZeroUdp6Tx => {
                        "UDP6ZeroChecksumTx"
                    }
                    crate::VxlanChecksum::ZeroUdp6Rx => {
                        "UDP6ZeroChecksumRx"
                    }
                    crate::VxlanChecksum::RemoteTx => "RemoteChecksumTx",
                    crate::VxlanChecksum::RemoteRx => "RemoteChecksumRx",
                };
                writeln!(out, "{key}=yes").unwrap();
            }
            for flag in tunnel.extensions.iter().flatten() {
                let key = match flag {
                    crate::VxlanExtension::GroupBasedPolicy => {
                        "GroupPolicyExtension"
                    }
                    crate::VxlanExtension::GenericProtocolExtension => {
                        "GenericProtocolExtension"
                    }
                };
                writeln!(out, "{key}=yes").unwrap();
            }
            if let Some(port) = tunnel.port {
                writeln!(out, "DestinationPort={port}").unwrap();
            }
            if let Some((min, max)) = tunnel.normalized_port_range() {
                writeln!(out, "PortRange={min}-{max}").unwrap();
            }
            if let Some(v) = tunnel.flow_label {
                writeln!(out, "FlowLabel={v}").unwrap();
            }
            if let Some(v) = tunnel.do_not_fragment {
                writeln!(out, "IPDoNotFragment={}", yes_no(v)).unwrap();
            }
            if tunnel.link.is_none() {
                writeln!(out, "Independent=yes").unwrap();
            }
        }
        _ => {
            out.push_str("\n[Tunnel]\n");
            writeln!(out, "Independent=yes").unwrap();
            if let Some(local) = tunnel.local.as_deref() {
                writeln!(out, "Local={local}").unwrap();
            }
            if let Some(remote) = tunnel.remote.as_deref() {
                writeln!(out, "Remote={remote}").unwrap();
            }
            if let Some(ttl) = tunnel.ttl {
                writeln!(out, "TTL={ttl}").unwrap();
            }
            match tunnel.mode {
                Some(TunnelMode::Ip6ip6) => {
                    writeln!(out, "Mode=ip6ip6").unwrap()
                }
                Some(TunnelMode::Ipip6) => {
                    writeln!(out, "Mode=ipip6").unwrap()
                }
                Some(TunnelMode::Isatap) => {
                    writeln!(out, "ISATAP=yes").unwrap()
                }
                _ => (),
            }
            if let Some(keys) = tunnel.keys.as_ref() {
                match (keys.input.as_deref(), keys.output.as_deref()) {
                    (Some(input), Some(output)) if input == output => {
                        writeln!(out, "Key={input}").unwrap();
                    }
                    (input, output) => {
                        if let Some(input) = input {
                            writeln!(out, "InputKey={input}").unwrap();
                        }
                        if let Some(output) = output {
                            writeln!(out, "OutputKey={output}").unwrap();
                        }
                    }
                }
            }
        }
    }
}

fn link_local_value(common: &CommonNetdef) -> &'static str {
    match common.link_local.as_deref() {
        None => "ipv6",
        Some(families) => {
            let ipv4 = families.contains(&LinkLocalFamily::Ipv4);
            let ipv6 = families.contains(&LinkLocalFamily::Ipv6);
            match (ipv4, ipv6) {
                (true, true) => "yes",
                (true, false) => "ipv4",
                (false, true) => "ipv6",
                (false, false) => "no",
            }
        }
    }
}

/// `.network` file: addressing, routing, membership and DHCP.
fn network_file(state: &NetplanState, netdef: &NetDef) -> String {
    let common = netdef.common();
    let mut out = match_section(netdef);

    // [Link]
    let mut link = String::new();
    if let Some(mtu) = common.mtu {
        writeln!(link, "MTUBytes={mtu}").unwrap();
    }
    if common.optional == Some(true) {
        writeln!(link, "RequiredForOnline=no").unwrap();
    }
    match common.activation_mode {
        Some(crate::ActivationMode::Manual) => {
            writeln!(link, "ActivationPolicy=manual").unwrap()
        }
        Some(crate::ActivationMode::Off) => {
            writeln!(link, "ActivationPolicy=down").unwrap()
        }
        None => (),
    }
    if !link.is_empty() {
        out.push_str("\n[Link]\n");
        out.push_str(&link);
    }

    // [Network]
    out.push_str("\n[Network]\n");
    match (common.dhcp4(), common.dhcp6()) {
        (true, true) => writeln!(out, "DHCP=yes").unwrap(),
        (true, false) => writeln!(out, "DHCP=ipv4").unwrap(),
        (false, true) => writeln!(out, "DHCP=ipv6").unwrap(),
        (false, false) => (),
    }
    writeln!(out, "LinkLocalAddressing={}", link_local_value(common))
        .unwrap();
    for entry in common.addresses.iter().flatten() {
        if entry.options.is_empty() {
            writeln!(out, "Address={}", entry.address).unwrap();
        }
    }
    for gateway in [common.gateway4.as_deref(), common.gateway6.as_deref()]
        .into_iter()
        .flatten()
    {
        writeln!(out, "Gateway={gateway}").unwrap();
    }
    if let Some(nameservers) = common.nameservers.as_ref() {
        for addr in nameservers.addresses.iter().flatten() {
            writeln!(out, "DNS={addr}").unwrap();
        }
        if let Some(search) = nameservers.search.as_deref()
            && !search.is_empty()
        {
            writeln!(out, "Domains={}", search.join(" ")).unwrap();
        }
    }
    if let Some(accept_ra) = common.accept_ra {
        writeln!(out, "IPv6AcceptRA={}", yes_no(accept_ra)).unwrap();
    }
    if let Some(v) = common.ipv6_privacy {
        writeln!(out, "IPv6PrivacyExtensions={}", yes_no(v)).unwrap();
    }
    if let Some(token) = common.ipv6_address_token.as_deref() {
        writeln!(out, "IPv6Token=static:{token}").unwrap();
    }
    match common.ipv6_address_generation {
        Some(crate::Ipv6AddressGeneration::Eui64) => {
            writeln!(out, "IPv6LinkLocalAddressGenerationMode=eui64")
                .unwrap()
        }
        Some(crate::Ipv6AddressGeneration::StablePrivacy) => writeln!(
            out,
            "IPv6LinkLocalAddressGenerationMode=stable-privacy"
        )
        .unwrap(),
        None => (),
    }
    if let Some(mtu) = common.ipv6_mtu {
        writeln!(out, "IPv6MTUBytes={mtu}").unwrap();
    }
    if common.emit_lldp == Some(true) {
        writeln!(out, "EmitLLDP=yes").unwrap();
    }
    if common.ignore_carrier == Some(true) {
        writeln!(out, "ConfigureWithoutCarrier=yes").unwrap();
        writeln!(out, "IgnoreCarrierLoss=yes").unwrap();
    }
    if common.critical == Some(true) {
        writeln!(out, "KeepConfiguration=static").unwrap();
    }
    let meta = &common.meta;
    if let Some(bond) = meta.bond.as_deref() {
        writeln!(out, "Bond={bond}").unwrap();
    }
    if let Some(bridge) = meta.bridge.as_deref() {
        writeln!(out, "Bridge={bridge}").unwrap();
    }
    if let Some(vrf) = meta.vrf.as_deref() {
        writeln!(out, "VRF={vrf}").unwrap();
    }
    // Stacked devices are activated from their parent's file.
    for child in state.iter() {
        match child {
            NetDef::Vlan(vlan)
                if vlan.link.as_deref() == Some(netdef.id())
                    && !child.common().meta.sriov_vlan_filter =>
            {
                writeln!(out, "VLAN={}", child.id()).unwrap();
            }
            NetDef::Tunnel(tunnel)
                if tunnel.is_vxlan()
                    && tunnel.link.as_deref() == Some(netdef.id()) =>
            {
                writeln!(out, "VXLAN={}", child.id()).unwrap();
            }
            _ => (),
        }
    }

    // [Address] for entries with per address options.
    for entry in common.addresses.iter().flatten() {
        if entry.options.is_empty() {
            continue;
        }
        out.push_str("\n[Address]\n");
        writeln!(out, "Address={}", entry.address).unwrap();
        if let Some(label) = entry.options.label.as_deref() {
            writeln!(out, "Label={label}").unwrap();
        }
        match entry.options.lifetime {
            Some(crate::AddressLifetime::Forever) => {
                writeln!(out, "PreferredLifetime=forever").unwrap()
            }
            Some(crate::AddressLifetime::Zero) => {
                writeln!(out, "PreferredLifetime=0").unwrap()
            }
            None => (),
        }
    }

    // Bridge port parameters written by the owning bridge.
    if meta.bridge_path_cost.is_some()
        || meta.bridge_port_priority.is_some()
    {
        out.push_str("\n[Bridge]\n");
        if let Some(cost) = meta.bridge_path_cost {
            writeln!(out, "Cost={cost}").unwrap();
        }
        if let Some(priority) = meta.bridge_port_priority {
            writeln!(out, "Priority={priority}").unwrap();
        }
    }

    // DHCP behavior overrides.
    if common.dhcp4() {
        let mut dhcp = String::new();
        if let Some(identifier) = common.dhcp_identifier.as_deref() {
            writeln!(dhcp, "ClientIdentifier={identifier}").unwrap();
        }
        dhcp_override_keys(common.dhcp4_overrides.as_ref(), &mut dhcp);
        if !dhcp.is_empty() {
            out.push_str("\n[DHCPv4]\n");
            out.push_str(&dhcp);
        }
    }
    if common.dhcp6() {
        let mut dhcp = String::new();
        dhcp_override_keys(common.dhcp6_overrides.as_ref(), &mut dhcp);
        if !dhcp.is_empty() {
            out.push_str("\n[DHCPv6]\n");
            out.push_str(&dhcp);
        }
    }

    for route in common.routes.iter().flatten() {
        out.push_str("\n[Route]\n");
        if let Some(to) = route.to.as_deref()
            && to != "default"
        {
            writeln!(out, "Destination={to}").unwrap();
        }
        if let Some(via) = route.via.as_deref() {
            writeln!(out, "Gateway={via}").unwrap();
        }
        if let Some(from) = route.from.as_deref() {
            writeln!(out, "PreferredSource={from}").unwrap();
        }
        if route.route_type() != RouteType::Unicast {
            writeln!(out, "Type={}", route.route_type().as_str())
                .unwrap();
        }
        if route.effective_scope() != RouteScope::Global {
            writeln!(out, "Scope={}", route.effective_scope().as_str())
                .unwrap();
        }
        if let Some(metric) = route.metric {
            writeln!(out, "Metric={metric}").unwrap();
        }
        if let Some(table) = route.table {
            writeln!(out, "Table={table}").unwrap();
        }
        if let Some(mtu) = route.mtu {
            writeln!(out, "MTUBytes={mtu}").unwrap();
        }
        if let Some(v) = route.congestion_window {
            writeln!(out, "InitialCongestionWindow={v}").unwrap();
        }
        if let Some(v) = route.advertised_receive_window {
            writeln!(out, "InitialAdvertisedReceiveWindow={v}").unwrap();
        }
        if let Some(v) = route.on_link {
            writeln!(out, "GatewayOnLink={}", yes_no(v)).unwrap();
        }
    }

    for rule in common.routing_policy.iter().flatten() {
        out.push_str("\n[RoutingPolicyRule]\n");
        if let Some(from) = rule.from.as_deref() {
            writeln!(out, "From={from}").unwrap();
        }
        if let Some(to) = rule.to.as_deref() {
            writeln!(out, "To={to}").unwrap();
        }
        if let Some(priority) = rule.priority {
            writeln!(out, "Priority={priority}").unwrap();
        }
        if let Some(table) = rule.table {
            writeln!(out, "Table={table}").unwrap();
        }
        if let Some(mark) = rule.mark {
            writeln!(out, "FirewallMark={mark}").unwrap();
        }
        if let Some(tos) = rule.type_of_service {
            writeln!(out, "TypeOfService={tos}").unwrap();
        }
    }

    out
}

fn dhcp_override_keys(
    overrides: Option<&crate::DhcpOverrides>,
    out: &mut String,
) {
    let Some(overrides) = overrides else { return };
    if let Some(v) = overrides.use_dns {
        writeln!(out, "UseDNS={}", yes_no(v)).unwrap();
    }
    if let Some(v) = overrides.use_ntp {
        writeln!(out, "UseNTP={}", yes_no(v)).unwrap();
    }
    if let Some(v) = overrides.send_hostname {
        writeln!(out, "SendHostname={}", yes_no(v)).unwrap();
    }
    if let Some(hostname) = overrides.hostname.as_deref() {
        writeln!(out, "Hostname={hostname}").unwrap();
    }
    if let Some(v) = overrides.use_hostname {
        writeln!(out, "UseHostname={}", yes_no(v)).unwrap();
    }
    if let Some(v) = overrides.use_mtu {
        writeln!(out, "UseMTU={}", yes_no(v)).unwrap();
    }
    if let Some(v) = overrides.use_routes {
        writeln!(out, "UseRoutes={}", yes_no(v)).unwrap();
    }
    match overrides.use_domains {
        Some(UseDomains::Boolean(v)) => {
            writeln!(out, "UseDomains={}", yes_no(v)).unwrap()
        }
        Some(UseDomains::Route) => {
            writeln!(out, "UseDomains=route").unwrap()
        }
        None => (),
    }
    if let Some(metric) = overrides.route_metric {
        writeln!(out, "RouteMetric={metric}").unwrap();
    }
}
