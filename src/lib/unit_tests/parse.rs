// SPDX-License-Identifier: Apache-2.0

use crate::{
    ErrorKind, NetDef, NetplanState, NplanNetdef, Parser, ParserFlags,
    Renderer,
};

use super::{load_str, state_from_yaml};

#[test]
fn test_simple_dhcp_ethernet() {
    let state = state_from_yaml(
        "network: {version: 2, renderer: networkd, ethernets: {eth0: \
         {dhcp4: true}}}",
    );
    let netdef = state.get("eth0").unwrap();
    assert!(netdef.common().dhcp4());
    assert!(!netdef.common().dhcp6());
    assert_eq!(state.global_renderer(), Some(Renderer::Networkd));
}

#[test]
fn test_missing_version_is_error() {
    let mut parser = Parser::new();
    let result = load_str(
        &mut parser,
        "test.yaml",
        "network: {ethernets: {eth0: {}}}",
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ParseError);
}

#[test]
fn test_wrong_version_is_error() {
    let mut parser = Parser::new();
    let result = load_str(
        &mut parser,
        "test.yaml",
        "network: {version: 1, ethernets: {eth0: {}}}",
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ParseError);
}

#[test]
fn test_unknown_key_is_error() {
    let mut parser = Parser::new();
    let result = load_str(
        &mut parser,
        "test.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcpv4: true}}}",
    );
    assert!(result.is_err());
}

#[test]
fn test_unknown_key_reports_position() {
    let mut parser = Parser::new();
    let e = load_str(
        &mut parser,
        "test.yaml",
        "network:\n  version: 2\n  typo-section: {}\n",
    )
    .unwrap_err();
    assert!(e.position().is_some(), "{e} should carry a position");
}

#[test]
fn test_ignore_errors_drops_offender() {
    let mut parser = Parser::new();
    parser.set_flags(ParserFlags {
        ignore_errors: true,
    });
    load_str(
        &mut parser,
        "test.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}, \
         vlans: {vlan10: {link: eth0}}}",
    )
    .unwrap();
    // vlan10 misses its mandatory id and is dropped with a warning.
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    assert!(state.get("eth0").is_some());
    assert!(state.get("vlan10").is_none());
    assert_eq!(state.error_count(), 1);
}

#[test]
fn test_later_file_overrides_earlier() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcp4: true, mtu: \
         1500}}}",
    )
    .unwrap();
    load_str(
        &mut parser,
        "b.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcp4: false}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    let netdef = state.get("eth0").unwrap();
    // dhcp4 overridden, mtu merged from the earlier file.
    assert!(!netdef.common().dhcp4());
    assert_eq!(netdef.common().mtu, Some(1500));
    assert_eq!(
        netdef.common().meta.filepath.as_deref(),
        Some(std::path::Path::new("b.yaml"))
    );
}

#[test]
fn test_null_deletes_key() {
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
    let netdef = state.get("eth0").unwrap();
    assert_eq!(netdef.common().mtu, None);
    assert!(netdef.common().meta.dirty.contains("mtu"));
}

#[test]
fn test_nullable_fields_skip_key() {
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
    let netdef = state.get("eth0").unwrap();
    assert!(!netdef.common().dhcp4());
    assert_eq!(netdef.common().mtu, Some(1500));
    // A nullable-fields deletion leaves no explicit null behind.
    assert!(!netdef.common().meta.dirty.contains("dhcp4"));
}

#[test]
fn test_nullable_overrides_honor_origin_hint() {
    let mut parser = Parser::new();
    parser
        .load_nullable_overrides(
            "network: {ethernets: {eth0: {}}}",
            "90-set.yaml",
        )
        .unwrap();
    load_str(
        &mut parser,
        "50-other.yaml",
        "network: {version: 2, ethernets: {eth0: {mtu: 1500}}}",
    )
    .unwrap();
    load_str(
        &mut parser,
        "90-set.yaml",
        "network: {version: 2, ethernets: {eth0: {dhcp4: true}}}",
    )
    .unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    let netdef = state.get("eth0").unwrap();
    // The foreign file's definition was ignored entirely.
    assert_eq!(netdef.common().mtu, None);
    assert!(netdef.common().dhcp4());
}

#[test]
fn test_type_change_across_files_is_error() {
    let mut parser = Parser::new();
    load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {dev0: {}}}",
    )
    .unwrap();
    let result = load_str(
        &mut parser,
        "b.yaml",
        "network: {version: 2, bridges: {dev0: {}}}",
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ParseError);
}

#[test]
fn test_glob_netdef_id_rejected() {
    let mut parser = Parser::new();
    let result = load_str(
        &mut parser,
        "a.yaml",
        "network: {version: 2, ethernets: {'eth*': {}}}",
    );
    assert!(result.is_err());
}

#[test]
fn test_hierarchy_shadowing_and_order() {
    let root = tempfile::tempdir().unwrap();
    for (dir, name, mtu) in [
        ("lib/netplan", "10-base.yaml", 1400u32),
        ("etc/netplan", "10-base.yaml", 1500),
        ("etc/netplan", "20-extra.yaml", 0),
        ("run/netplan", "30-run.yaml", 0),
    ] {
        let dir = root.path().join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let body = if mtu > 0 {
            format!(
                "network: {{version: 2, ethernets: {{eth0: {{mtu: \
                 {mtu}}}}}}}"
            )
        } else {
            format!(
                "network: {{version: 2, ethernets: {{{}: {{}}}}}}",
                name.trim_end_matches(".yaml").replace('-', "")
            )
        };
        std::fs::write(dir.join(name), body).unwrap();
    }
    let mut parser = Parser::new();
    parser.load_yaml_hierarchy(root.path()).unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    // The etc copy of 10-base.yaml shadows the lib copy.
    assert_eq!(state.get("eth0").unwrap().common().mtu, Some(1500));
    assert_eq!(state.len(), 3);
    // Insertion order follows basename sort order.
    let ids: Vec<&str> = state.iter().map(|n| n.id()).collect();
    assert_eq!(ids, vec!["eth0", "20extra", "30run"]);
}

#[test]
fn test_netdefs_unique_and_ordered() {
    let state = state_from_yaml(
        "network: {version: 2, ethernets: {b: {}, a: {}}, bridges: \
         {c: {}}}",
    );
    let ids: Vec<&str> = state.iter().map(|n| n.id()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[test]
fn test_ovs_patch_ports_created() {
    let state = state_from_yaml(
        "network: {version: 2, openvswitch: {ports: [[patch0-1, \
         patch1-0]]}, bridges: {br0: {interfaces: [patch0-1]}, br1: \
         {interfaces: [patch1-0]}}}",
    );
    let port = state.get("patch0-1").unwrap();
    assert!(matches!(port, NetDef::OvsPort(_)));
    assert_eq!(port.peer_name(), Some("patch1-0"));
    assert_eq!(port.backend(), crate::Backend::Ovs);
}
