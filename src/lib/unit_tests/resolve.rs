// SPDX-License-Identifier: Apache-2.0

use crate::{
    Backend, ErrorKind, NetplanState, NplanNetdef, Parser,
};

use super::{load_str, state_from_yaml};

#[test]
fn test_ovs_bond_mode_promotion() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {}, eth1: {}}, \
         bonds: {bond0: {interfaces: [eth0, eth1], parameters: {mode: \
         balance-tcp}}}}",
    );
    assert_eq!(state.get("bond0").unwrap().backend(), Backend::Ovs);
    assert_eq!(
        state.get("eth0").unwrap().common().meta.bond.as_deref(),
        Some("bond0")
    );
    assert_eq!(
        state.get("eth1").unwrap().common().meta.bond.as_deref(),
        Some("bond0")
    );
}

#[test]
fn test_ovs_settings_promotion() {
    let state = state_from_yaml(
        "network: {version: 2, bridges: {br0: {openvswitch: \
         {fail-mode: secure}}}}",
    );
    assert_eq!(state.get("br0").unwrap().backend(), Backend::Ovs);
    // external-ids alone do not promote.
    let state = state_from_yaml(
        "network: {version: 2, bridges: {br0: {openvswitch: \
         {external-ids: {foo: bar}}}}}",
    );
    assert_eq!(
        state.get("br0").unwrap().backend(),
        Backend::Networkd
    );
}

#[test]
fn test_vlan_on_ovs_parent_promotion() {
    let state = state_from_yaml(
        "network: {version: 2, bridges: {br0: {openvswitch: \
         {fail-mode: secure}}}, vlans: {br0.10: {id: 10, link: br0}}}",
    );
    assert_eq!(state.get("br0.10").unwrap().backend(), Backend::Ovs);
}

#[test]
fn test_forward_reference_across_files() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, vlans: {vlan10: {id: 10, link: eth0}}}",
    )
    .unwrap();
    load_str(
        &mut parser,
        "b.yaml",
        "network: {version: 2, ethernets: {eth0: {}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    assert!(state.get("eth0").unwrap().common().meta.has_vlans);
}

#[test]
fn test_unresolved_reference_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, vlans: {vlan10: {id: 10, link: eth0}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    let e = state.import_parser_results(&mut parser).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ReferenceError);
}

#[test]
fn test_nm_vlan_link_placeholder() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, renderer: NetworkManager, vlans: \
         {vlan10: {id: 10, link: eth0}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    let placeholder = state.get("eth0").unwrap();
    assert!(placeholder.common().meta.placeholder);
    assert_eq!(placeholder.backend(), Backend::NetworkManager);
}

#[test]
fn test_interface_in_two_bonds_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {eth0: {}}, bonds: {bond0: \
         {interfaces: [eth0], parameters: {mode: active-backup}}, \
         bond1: {interfaces: [eth0], parameters: {mode: \
         active-backup}}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    let e = state.import_parser_results(&mut parser).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConsistencyError);
}

#[test]
fn test_interface_in_bond_and_bridge_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {eth0: {}}, bonds: {bond0: \
         {interfaces: [eth0], parameters: {mode: active-backup}}}, \
         bridges: {br0: {interfaces: [eth0]}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    let e = state.import_parser_results(&mut parser).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConsistencyError);
}

#[test]
fn test_bond_primary_flag() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {}, eth1: {}}, \
         bonds: {bond0: {interfaces: [eth0, eth1], parameters: {mode: \
         active-backup, primary: eth1}}}}",
    );
    assert!(!state.get("eth0").unwrap().common().meta.bond_primary);
    assert!(state.get("eth1").unwrap().common().meta.bond_primary);
}

#[test]
fn test_bridge_port_parameters_reach_member() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {}}, bridges: {br0: \
         {interfaces: [eth0], parameters: {path-cost: {eth0: 50}, \
         port-priority: {eth0: 28}}}}}",
    );
    let member = state.get("eth0").unwrap().common();
    assert_eq!(member.meta.bridge.as_deref(), Some("br0"));
    assert_eq!(member.meta.bridge_path_cost, Some(50));
    assert_eq!(member.meta.bridge_port_priority, Some(28));
}

#[test]
fn test_veth_pair_symmetric() {
    let state = state_from_yaml(
        "network: {version: 2, virtual-ethernets: {veth0: {peer: \
         veth1}, veth1: {peer: veth0}}}",
    );
    assert_eq!(state.get("veth0").unwrap().peer_name(), Some("veth1"));
}

#[test]
fn test_veth_asymmetric_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, virtual-ethernets: {veth0: {peer: \
         veth1}, veth1: {peer: veth0}, veth2: {peer: veth0}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    let e = state.import_parser_results(&mut parser).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConsistencyError);
}

#[test]
fn test_veth_self_peer_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, virtual-ethernets: {veth0: {peer: \
         veth0}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    let e = state.import_parser_results(&mut parser).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConsistencyError);
}

#[test]
fn test_conflicting_default_routes_are_kept() {
    // Recoverable: a warning is logged, the state is produced and
    // both routes are retained.
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {routes: [{to: \
         default, via: 10.0.0.1}, {to: default, via: 10.0.0.2}]}}}",
    );
    let routes = state
        .get("eth0")
        .unwrap()
        .common()
        .routes
        .as_deref()
        .unwrap();
    assert_eq!(routes.len(), 2);
}

#[test]
fn test_reimport_is_idempotent() {
    let yaml = "network: {version: 2, ethernets: {eth0: {}, eth1: \
                {}}, bonds: {bond0: {interfaces: [eth0, eth1], \
                parameters: {mode: active-backup}}}}";
    let mut state = NetplanState::new();
    for _ in 0..2 {
        let mut parser = Parser::new();
        load_str(&mut parser, "a.yaml", yaml).unwrap();
        state.import_parser_results(&mut parser).unwrap();
    }
    assert_eq!(state.len(), 3);
    assert_eq!(
        state.get("eth0").unwrap().common().meta.bond.as_deref(),
        Some("bond0")
    );
}

#[test]
fn test_sriov_plan() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {enp1: \
         {virtual-function-count: 4}, enp1s16f1: {link: enp1}, \
         enp1s16f2: {link: enp1}}}",
    );
    let plan = state.finish_sriov_write().unwrap();
    assert_eq!(plan.vf_counts.get("enp1"), Some(&4));
}

#[test]
fn test_sriov_vlan_filter_flag() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {enp1: {}}, vlans: {vf0.15: \
         {id: 15, link: enp1, renderer: sriov}}}",
    );
    assert!(
        state
            .get("vf0.15")
            .unwrap()
            .common()
            .meta
            .sriov_vlan_filter
    );
}

#[test]
fn test_modems_default_to_networkmanager() {
    let state = state_from_yaml(
        "network: {version: 2, modems: {wwan0: {apn: internet}}}",
    );
    assert_eq!(
        state.get("wwan0").unwrap().backend(),
        Backend::NetworkManager
    );
}
