// SPDX-License-Identifier: Apache-2.0

use crate::{
    Backend, DeviceKind, NetDef, NetplanState, NplanNetdef,
};

fn import(name: &str, content: &str) -> (NetplanState, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    let mut state = NetplanState::new();
    let id = state.load_keyfile(&path).unwrap().id().to_string();
    (state, id)
}

#[test]
fn test_wifi_keyfile_with_passthrough() {
    let (state, id) = import(
        "wlan.nmconnection",
        "[connection]\n\
         id=mywifi\n\
         uuid=03c8f2a7-268d-4765-b626-efcc02dd686c\n\
         type=wifi\n\
         \n\
         [wifi]\n\
         ssid=foo\n\
         hidden=true\n\
         \n\
         [user]\n\
         data=x\n",
    );
    assert_eq!(id, "NM-03c8f2a7-268d-4765-b626-efcc02dd686c");
    let NetDef::Wifi(wifi) = state.get(&id).unwrap() else {
        panic!("expected a wifi netdef");
    };
    let aps = wifi.access_points.as_ref().unwrap();
    let ap = aps.get("foo").unwrap();
    assert_eq!(ap.hidden, Some(true));
    let passthrough = ap
        .networkmanager
        .as_ref()
        .unwrap()
        .passthrough
        .as_ref()
        .unwrap();
    assert_eq!(
        passthrough.get("user.data").map(|v| v.as_str()),
        Some("x")
    );
    assert_eq!(
        state.get(&id).unwrap().backend(),
        Backend::NetworkManager
    );
}

#[test]
fn test_ethernet_keyfile_structured_extraction() {
    let (state, id) = import(
        "eth.nmconnection",
        "[connection]\n\
         id=wired\n\
         uuid=8d63d399-4bbb-44d7-b7b7-451c38d74e28\n\
         type=ethernet\n\
         interface-name=enp2s0\n\
         \n\
         [ethernet]\n\
         mtu=9000\n\
         \n\
         [ipv4]\n\
         method=manual\n\
         address1=192.0.2.5/24,192.0.2.1\n\
         dns=8.8.8.8;\n\
         route1=10.0.0.0/8,192.0.2.254,50\n\
         route1_options=table=100,onlink=true\n",
    );
    let netdef = state.get(&id).unwrap();
    let common = netdef.common();
    assert_eq!(netdef.kind(), DeviceKind::Ethernet);
    assert_eq!(common.mtu, Some(9000));
    assert_eq!(
        common.addresses.as_ref().unwrap()[0].address,
        "192.0.2.5/24"
    );
    assert_eq!(common.gateway4.as_deref(), Some("192.0.2.1"));
    let route = &common.routes.as_ref().unwrap()[0];
    assert_eq!(route.to.as_deref(), Some("10.0.0.0/8"));
    assert_eq!(route.via.as_deref(), Some("192.0.2.254"));
    assert_eq!(route.metric, Some(50));
    assert_eq!(route.table, Some(100));
    assert_eq!(route.on_link, Some(true));
    let nm = common.networkmanager.as_ref().unwrap();
    assert_eq!(nm.name.as_deref(), Some("wired"));
    assert_eq!(nm.device.as_deref(), Some("enp2s0"));
    // Everything recognized was consumed, nothing leaked into the
    // passthrough map.
    assert!(nm.passthrough.is_none());
}

#[test]
fn test_round_tripped_filename_reuses_id() {
    let (state, id) = import(
        "netplan-eth0.nmconnection",
        "[connection]\n\
         id=netplan-eth0\n\
         uuid=626dd384-8b3d-4690-9e1c-80e6106b3847\n\
         type=ethernet\n\
         \n\
         [ipv4]\n\
         method=auto\n",
    );
    assert_eq!(id, "eth0");
    assert!(state.get("eth0").unwrap().common().dhcp4());
}

#[test]
fn test_unknown_type_falls_through_to_passthrough() {
    let (state, id) = import(
        "vpn.nmconnection",
        "[connection]\n\
         id=company-vpn\n\
         uuid=51b4a8a1-d744-41ad-a446-c6ad04f0b2d5\n\
         type=wireguard\n\
         \n\
         [wireguard]\n\
         private-key=secret\n",
    );
    let netdef = state.get(&id).unwrap();
    assert_eq!(netdef.kind(), DeviceKind::NmDevice);
    let passthrough = netdef
        .common()
        .networkmanager
        .as_ref()
        .unwrap()
        .passthrough
        .as_ref()
        .unwrap();
    assert_eq!(
        passthrough
            .get("wireguard.private-key")
            .map(|v| v.as_str()),
        Some("secret")
    );
}

#[test]
fn test_empty_group_survives_as_sentinel() {
    let (state, id) = import(
        "eth.nmconnection",
        "[connection]\n\
         id=wired\n\
         uuid=2f925e71-3ad9-4a0e-a43d-9b951bd0bbf6\n\
         type=ethernet\n\
         \n\
         [proxy]\n",
    );
    let passthrough = state
        .get(&id)
        .unwrap()
        .common()
        .networkmanager
        .as_ref()
        .unwrap()
        .passthrough
        .as_ref()
        .unwrap()
        .clone();
    assert_eq!(
        passthrough.get("proxy._").map(|v| v.as_str()),
        Some("")
    );
}

#[test]
fn test_vlan_keyfile_placeholder_parent() {
    let (state, id) = import(
        "vlan.nmconnection",
        "[connection]\n\
         id=vlan10\n\
         uuid=fc67e25e-a9a9-4979-b9a5-3bd8b0b5e1a5\n\
         type=vlan\n\
         \n\
         [vlan]\n\
         id=10\n\
         parent=enp2s0\n",
    );
    let NetDef::Vlan(vlan) = state.get(&id).unwrap() else {
        panic!("expected a vlan netdef");
    };
    assert_eq!(vlan.id, Some(10));
    assert_eq!(vlan.link.as_deref(), Some("enp2s0"));
    // The dangling parent was tolerated via a placeholder.
    assert!(
        state.get("enp2s0").unwrap().common().meta.placeholder
    );
}
