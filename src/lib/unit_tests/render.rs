// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use super::state_from_yaml;

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap_or_else(|e| {
        panic!("cannot read {rel}: {e}");
    })
}

#[test]
fn test_networkd_simple_dhcp() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: networkd, ethernets: {eth0: \
         {dhcp4: true}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_networkd_write(root.path()).unwrap();
    state.finish_nm_write(root.path()).unwrap();

    let network =
        read(root.path(), "run/systemd/network/10-netplan-eth0.network");
    assert!(network.contains("[Match]\nName=eth0"));
    assert!(network.contains("[Network]\nDHCP=ipv4"));
    // No keyfiles and no udev rules for a pure networkd state.
    let connections = root
        .path()
        .join("run/NetworkManager/system-connections");
    let keyfiles = std::fs::read_dir(&connections)
        .map(|dir| dir.count())
        .unwrap_or(0);
    assert_eq!(keyfiles, 0);
    assert!(
        !root
            .path()
            .join("run/udev/rules.d/90-netplan.rules")
            .exists()
    );
}

#[test]
fn test_networkd_static_addressing() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {addresses: \
         ['192.0.2.5/24'], nameservers: {addresses: [8.8.8.8], \
         search: [example.com]}, routes: [{to: default, via: \
         192.0.2.1}]}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_networkd_write(root.path()).unwrap();
    let network =
        read(root.path(), "run/systemd/network/10-netplan-eth0.network");
    assert!(network.contains("Address=192.0.2.5/24"));
    assert!(network.contains("DNS=8.8.8.8"));
    assert!(network.contains("Domains=example.com"));
    assert!(network.contains("[Route]\nGateway=192.0.2.1"));
}

#[test]
fn test_networkd_bond_files() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {}, eth1: {}}, \
         bonds: {bond0: {interfaces: [eth0, eth1], parameters: {mode: \
         active-backup, mii-monitor-interval: 100}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_networkd_write(root.path()).unwrap();
    let netdev =
        read(root.path(), "run/systemd/network/10-netplan-bond0.netdev");
    assert!(netdev.contains("Kind=bond"));
    assert!(netdev.contains("Mode=active-backup"));
    assert!(netdev.contains("MIIMonitorSec=100"));
    let member =
        read(root.path(), "run/systemd/network/10-netplan-eth0.network");
    assert!(member.contains("Bond=bond0"));
}

#[test]
fn test_networkd_vlan_files() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {}}, vlans: {vlan10: \
         {id: 10, link: eth0}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_networkd_write(root.path()).unwrap();
    let netdev = read(
        root.path(),
        "run/systemd/network/10-netplan-vlan10.netdev",
    );
    assert!(netdev.contains("Kind=vlan"));
    assert!(netdev.contains("Id=10"));
    let parent =
        read(root.path(), "run/systemd/network/10-netplan-eth0.network");
    assert!(parent.contains("VLAN=vlan10"));
}

#[test]
fn test_networkd_link_file_and_udev_rule() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {lan: {match: {macaddress: \
         '00:11:22:33:44:55'}, set-name: lan0, wakeonlan: true}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_networkd_write(root.path()).unwrap();
    let link =
        read(root.path(), "run/systemd/network/10-netplan-lan.link");
    assert!(link.contains("MACAddress=00:11:22:33:44:55"));
    assert!(link.contains("[Link]\nName=lan0\nWakeOnLan=magic"));
    let rules = read(root.path(), "run/udev/rules.d/90-netplan.rules");
    assert!(
        rules.contains("ATTR{address}==\"00:11:22:33:44:55\"")
    );
    assert!(rules.contains("NAME=\"lan0\""));
}

#[test]
fn test_networkd_cleanup_removes_stale_outputs() {
    let root = tempfile::tempdir().unwrap();
    let network_dir = root.path().join("run/systemd/network");
    std::fs::create_dir_all(&network_dir).unwrap();
    std::fs::write(
        network_dir.join("10-netplan-gone.network"),
        "stale",
    )
    .unwrap();
    std::fs::write(network_dir.join("99-other.network"), "keep")
        .unwrap();

    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}}",
    );
    state.finish_networkd_write(root.path()).unwrap();
    assert!(!network_dir.join("10-netplan-gone.network").exists());
    // Foreign files are left alone.
    assert!(network_dir.join("99-other.network").exists());
}

#[test]
fn test_nm_keyfile_basic() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: NetworkManager, ethernets: \
         {eth0: {dhcp4: true}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let keyfile = read(
        root.path(),
        "run/NetworkManager/system-connections/netplan-eth0.nmconnection",
    );
    assert!(keyfile.contains("[connection]"));
    assert!(keyfile.contains("id=netplan-eth0"));
    assert!(keyfile.contains("type=ethernet"));
    assert!(keyfile.contains("interface-name=eth0"));
    assert!(keyfile.contains("method=auto"));
    // Secrets may appear verbatim, so the file must be private.
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let mode = std::fs::metadata(root.path().join(
            "run/NetworkManager/system-connections/netplan-eth0.nmconnection",
        ))
        .unwrap()
        .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
    // The globally managed deny list is neutralized.
    assert!(
        root.path()
            .join("run/NetworkManager/conf.d/10-globally-managed-devices.conf")
            .exists()
    );
}

#[test]
fn test_nm_wifi_one_file_per_access_point() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: NetworkManager, wifis: \
         {wlan0: {access-points: {office: {password: s3kr1t}, guest: \
         {mode: ap}}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let office = read(
        root.path(),
        "run/NetworkManager/system-connections/netplan-wlan0-office.nmconnection",
    );
    assert!(office.contains("ssid=office"));
    assert!(office.contains("key-mgmt=wpa-psk"));
    assert!(office.contains("psk=s3kr1t"));
    let guest = read(
        root.path(),
        "run/NetworkManager/system-connections/netplan-wlan0-guest.nmconnection",
    );
    assert!(guest.contains("mode=ap"));
    assert!(guest.contains("method=shared"));
}

#[test]
fn test_nm_passthrough_overrides_structured() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: NetworkManager, ethernets: \
         {eth0: {dhcp4: true, networkmanager: {passthrough: \
         {'ipv4.method': 'disabled', 'user.data': 'x', 'nodot': \
         'dropped'}}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let keyfile = read(
        root.path(),
        "run/NetworkManager/system-connections/netplan-eth0.nmconnection",
    );
    assert!(keyfile.contains("method=disabled"));
    assert!(!keyfile.contains("method=auto"));
    assert!(keyfile.contains("[user]"));
    assert!(keyfile.contains("data=x"));
    // A passthrough key without a dot never reaches the output.
    assert!(!keyfile.contains("nodot"));
    assert!(!keyfile.contains("dropped"));
}

#[test]
fn test_nm_unmanaged_devices() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}, nics: \
         {match: {name: 'enp*'}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let conf = read(
        root.path(),
        "run/NetworkManager/conf.d/netplan.conf",
    );
    assert!(conf.starts_with("[keyfile]\n"));
    assert!(conf.contains("interface-name:eth0"));
    assert!(conf.contains("interface-name:enp*"));
}

#[test]
fn test_nm_unmanaged_driver_udev_rule() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {nics: {match: {driver: \
         ixgbe}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let rules =
        read(root.path(), "run/udev/rules.d/90-netplan-nm.rules");
    assert!(rules.contains("ENV{ID_NET_DRIVER}==\"ixgbe\""));
    assert!(rules.contains("ENV{NM_UNMANAGED}=\"1\""));
}

#[test]
fn test_nm_empty_dns_search_clears_key() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: NetworkManager, ethernets: \
         {eth0: {dhcp4: true, nameservers: {search: []}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    let keyfile = read(
        root.path(),
        "run/NetworkManager/system-connections/netplan-eth0.nmconnection",
    );
    assert!(!keyfile.contains("dns-search"));
}

#[test]
fn test_nm_stable_uuid() {
    let a = crate::renderer::nm::connection_uuid("eth0", None);
    let b = crate::renderer::nm::connection_uuid("eth0", None);
    let c = crate::renderer::nm::connection_uuid("eth1", None);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_ovs_backend_skipped_by_nm_renderer() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: NetworkManager, bridges: \
         {br0: {openvswitch: {fail-mode: secure}}}}",
    );
    let root = tempfile::tempdir().unwrap();
    state.finish_nm_write(root.path()).unwrap();
    assert!(
        !root
            .path()
            .join(
                "run/NetworkManager/system-connections/netplan-br0.nmconnection"
            )
            .exists()
    );
}
