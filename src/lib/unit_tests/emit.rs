// SPDX-License-Identifier: Apache-2.0

use crate::{NetplanState, Parser};

use super::{load_str, state_from_yaml};

#[test]
fn test_dump_round_trip() {
    let yaml = "network: {version: 2, renderer: networkd, ethernets: \
                {eth0: {dhcp4: true, mtu: 9000}}, bonds: {bond0: \
                {interfaces: [eth0], parameters: {mode: \
                active-backup}}}, vlans: {vlan10: {id: 10, link: \
                eth0}}}";
    let state = state_from_yaml(yaml);
    let dump = state.dump_yaml().unwrap();

    let mut parser = Parser::new();
    load_str(&mut parser, "dump.yaml", &dump).unwrap();
    let mut state2 = NetplanState::new();
    state2.import_parser_results(&mut parser).unwrap();

    assert_eq!(state.len(), state2.len());
    for netdef in state.iter() {
        let other = state2.get(netdef.id()).unwrap();
        assert_eq!(
            netdef.to_yaml_value().unwrap(),
            other.to_yaml_value().unwrap(),
            "{} did not round trip",
            netdef.id()
        );
    }
    // The second dump is identical to the first.
    assert_eq!(dump, state2.dump_yaml().unwrap());
}

#[test]
fn test_single_netdef_file() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}}",
    );
    let root = tempfile::tempdir().unwrap();
    let path = state.write_yaml_file("eth0", root.path()).unwrap();
    assert!(path.ends_with("etc/netplan/10-netplan-eth0.yaml"));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("network:"));
    assert!(content.contains("version: 2"));
    assert!(content.contains("eth0:"));
    assert!(content.contains("dhcp4: true"));
    // No leftover temp file from the atomic write.
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_nullable_field_not_emitted() {
    let mut parser = Parser::new();
    parser
        .load_nullable_fields(
            "network: {ethernets: {eth0: {dhcp4: null}}}",
        )
        .unwrap();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcp4: true, mtu: \
         1500}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    let dump = state.dump_yaml().unwrap();
    assert!(!dump.contains("dhcp4"));
    assert!(dump.contains("mtu: 1500"));
}

#[test]
fn test_explicit_null_survives_emission() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {eth0: {mtu: 9000}}}",
    )
    .unwrap();
    load_str(
        &mut parser,
        "b.yaml",
        "network: {version: 2, ethernets: {eth0: {mtu: null}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    let dump = state.dump_yaml().unwrap();
    // The deletion is re-emitted as an explicit null so a subsequent
    // read shadows older definitions the same way.
    assert!(dump.contains("mtu: null") || dump.contains("mtu: ~"));
}

#[test]
fn test_update_hierarchy_partitions_by_origin() {
    let root = tempfile::tempdir().unwrap();
    let etc = root.path().join("etc/netplan");
    std::fs::create_dir_all(&etc).unwrap();
    let file_a = etc.join("10-a.yaml");
    let file_b = etc.join("20-b.yaml");
    std::fs::write(
        &file_a,
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}}",
    )
    .unwrap();
    std::fs::write(
        &file_b,
        "network: {version: 2, ethernets: {eth1: {mtu: 1500}}}",
    )
    .unwrap();

    let mut parser = Parser::new();
    parser.load_yaml_hierarchy(root.path()).unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    state
        .update_yaml_hierarchy(
            root.path(),
            &etc.join("70-default.yaml"),
        )
        .unwrap();

    let a = std::fs::read_to_string(&file_a).unwrap();
    assert!(a.contains("eth0"));
    assert!(!a.contains("eth1"));
    let b = std::fs::read_to_string(&file_b).unwrap();
    assert!(b.contains("eth1"));
    assert!(!b.contains("eth0"));
}

#[test]
fn test_update_hierarchy_unlinks_emptied_file() {
    let root = tempfile::tempdir().unwrap();
    let etc = root.path().join("etc/netplan");
    std::fs::create_dir_all(&etc).unwrap();
    let file_a = etc.join("10-a.yaml");
    let file_b = etc.join("20-b.yaml");
    std::fs::write(
        &file_a,
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}}",
    )
    .unwrap();
    // The later file takes over eth0, leaving 10-a.yaml empty.
    std::fs::write(
        &file_b,
        "network: {version: 2, ethernets: {eth0: {mtu: 1500}}}",
    )
    .unwrap();

    let mut parser = Parser::new();
    parser.load_yaml_hierarchy(root.path()).unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    state
        .update_yaml_hierarchy(
            root.path(),
            &etc.join("70-default.yaml"),
        )
        .unwrap();

    assert!(!file_a.exists());
    let b = std::fs::read_to_string(&file_b).unwrap();
    assert!(b.contains("eth0"));
    assert!(b.contains("dhcp4: true"));
}

#[test]
fn test_gateway_survives_round_trip() {
    // Deprecated but preserved: parse warns, the model keeps it and
    // the emitter writes it back.
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {eth0: {addresses: \
         ['192.0.2.5/24'], gateway4: 192.0.2.1}}}",
    );
    let dump = state.dump_yaml().unwrap();
    assert!(dump.contains("gateway4: 192.0.2.1"));
}

#[test]
fn test_address_options_round_trip() {
    let yaml = "network: {version: 2, ethernets: {eth0: {addresses: \
                [{'192.0.2.5/24': {label: maas, lifetime: \
                forever}}]}}}";
    let state = state_from_yaml(yaml);
    let dump = state.dump_yaml().unwrap();
    let state2 = state_from_yaml(&dump);
    assert_eq!(
        state.get("eth0").unwrap().to_yaml_value().unwrap(),
        state2.get("eth0").unwrap().to_yaml_value().unwrap()
    );
}
