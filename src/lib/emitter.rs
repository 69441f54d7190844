// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::{
    CUR_SCHEMA_VERSION, DeviceKind, ErrorKind, NetDef, NetplanState,
    NplanError, NplanNetdef, Renderer,
    renderer::nm::connection_uuid,
};

const EMIT_DIR: &str = "etc/netplan";

/// Serialize one netdef body, re-adding explicit nulls for fields a
/// programmatic modification deleted so a subsequent read round-trips.
fn netdef_mapping(netdef: &NetDef) -> Result<Mapping, NplanError> {
    let value = netdef.to_yaml_value().map_err(|e| {
        NplanError::new(
            ErrorKind::Bug,
            format!("Cannot serialize '{}': {e}", netdef.id()),
        )
    })?;
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        other => {
            return Err(NplanError::new(
                ErrorKind::Bug,
                format!(
                    "Serialized '{}' is not a mapping: {other:?}",
                    netdef.id()
                ),
            ));
        }
    };
    for path in &netdef.common().meta.dirty {
        insert_null(&mut mapping, path);
    }
    Ok(mapping)
}

/// Place an explicit null at a dotted path unless the serialization
/// already produced a value there.
fn insert_null(mapping: &mut Mapping, path: &str) {
    let mut current = mapping;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let key = Value::String(segment.to_string());
        if segments.peek().is_none() {
            if !current.contains_key(&key) {
                current.insert(key, Value::Null);
            }
            return;
        }
        if !current.contains_key(&key) {
            current
                .insert(key.clone(), Value::Mapping(Mapping::new()));
        }
        match current.get_mut(&key) {
            Some(Value::Mapping(child)) => current = child,
            _ => return,
        }
    }
}

/// Assemble a `network:` document for the given netdefs, grouped by
/// device kind in canonical section order.
fn build_doc(
    netdefs: &[&NetDef],
    renderer: Option<Renderer>,
    global_ovs: Option<&crate::OvsSettings>,
) -> Result<String, NplanError> {
    let mut network = Mapping::new();
    network.insert(
        Value::String("version".to_string()),
        Value::Number(CUR_SCHEMA_VERSION.into()),
    );
    if let Some(renderer) = renderer {
        network.insert(
            Value::String("renderer".to_string()),
            serde_yaml::to_value(renderer).map_err(|e| {
                NplanError::new(ErrorKind::Bug, e.to_string())
            })?,
        );
    }
    for kind in DeviceKind::sections() {
        let mut section = Mapping::new();
        for netdef in netdefs.iter().filter(|n| n.kind() == *kind) {
            section.insert(
                Value::String(netdef.id().to_string()),
                Value::Mapping(netdef_mapping(netdef)?),
            );
        }
        if !section.is_empty() {
            let name = kind.section().unwrap_or_default();
            network.insert(
                Value::String(name.to_string()),
                Value::Mapping(section),
            );
        }
    }
    if let Some(ovs) = global_ovs {
        network.insert(
            Value::String("openvswitch".to_string()),
            serde_yaml::to_value(ovs).map_err(|e| {
                NplanError::new(ErrorKind::Bug, e.to_string())
            })?,
        );
    }
    let mut doc = Mapping::new();
    doc.insert(
        Value::String("network".to_string()),
        Value::Mapping(network),
    );
    serde_yaml::to_string(&doc)
        .map_err(|e| NplanError::new(ErrorKind::Bug, e.to_string()))
}

/// Write `content` through a temp file and rename; the temp file is
/// unlinked on any failure.
fn write_atomic(path: &Path, content: &str) -> Result<(), NplanError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            NplanError::new(
                ErrorKind::FileError,
                format!("Cannot create {}: {e}", parent.display()),
            )
        })?;
    }
    let tmp = path.with_extension("tmp");
    crate::renderer::write_file(&tmp, content, 0o600)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(NplanError::new(
            ErrorKind::FileError,
            format!("Cannot rename {}: {e}", path.display()),
        ));
    }
    Ok(())
}

/// Default file name of a netdef without recorded origin:
/// `10-netplan-<id>.yaml`, or `90-NM-<uuid>.yaml` for profiles that
/// came from a NetworkManager keyfile.
fn default_filename(netdef: &NetDef) -> String {
    let nm = netdef.common().networkmanager.as_ref();
    if netdef.id().starts_with("NM-")
        || netdef.kind() == DeviceKind::NmDevice
    {
        format!("90-NM-{}.yaml", connection_uuid(netdef.id(), nm))
    } else {
        format!("10-netplan-{}.yaml", netdef.id())
    }
}

/// Serialize a single netdef into its canonical YAML file below
/// `root_dir`, returning the written path.
pub(crate) fn write_netdef_file(
    state: &NetplanState,
    id: &str,
    root_dir: &Path,
) -> Result<PathBuf, NplanError> {
    let Some(netdef) = state.get(id) else {
        return Err(NplanError::new(
            ErrorKind::Bug,
            format!("Unknown netdef '{id}'"),
        ));
    };
    let path = root_dir
        .join(EMIT_DIR)
        .join(default_filename(netdef));
    let content = build_doc(&[netdef], None, None)?;
    write_atomic(&path, &content)?;
    Ok(path)
}

/// Serialize the whole state into one YAML document.
pub(crate) fn dump_state(
    state: &NetplanState,
) -> Result<String, NplanError> {
    let netdefs: Vec<&NetDef> = state.iter().collect();
    build_doc(&netdefs, state.global_renderer(), state.global_ovs())
}

/// Re-emit the state partitioned by each netdef's origin file. Files
/// that end up without netdefs are unlinked. Netdefs without an origin
/// (e.g. created programmatically) go to `default_path`; the global
/// OVS settings travel with that file as well.
pub(crate) fn update_hierarchy(
    state: &NetplanState,
    root_dir: &Path,
    default_path: &Path,
) -> Result<(), NplanError> {
    let default_path = if default_path.is_absolute() {
        default_path.to_path_buf()
    } else {
        root_dir.join(default_path)
    };

    let mut groups: IndexMap<PathBuf, Vec<&NetDef>> = IndexMap::new();
    for netdef in state.iter() {
        // OVS patch ports are re-created from the global section.
        if netdef.kind() == DeviceKind::OvsPort
            || netdef.common().meta.placeholder
        {
            continue;
        }
        let path = netdef
            .common()
            .meta
            .filepath
            .clone()
            .unwrap_or_else(|| default_path.clone());
        groups.entry(path).or_default().push(netdef);
    }
    if state.global_ovs().is_some() {
        groups.entry(default_path.clone()).or_default();
    }

    for (path, netdefs) in &groups {
        let renderer = state.file_renderer(path);
        let global_ovs = if *path == default_path {
            state.global_ovs()
        } else {
            None
        };
        let content = build_doc(netdefs, renderer, global_ovs)?;
        write_atomic(path, &content)?;
    }

    // A previously loaded file all of whose netdefs moved or vanished
    // holds nothing we would re-emit; remove it.
    for source in state.sources() {
        if !groups.contains_key(source) && source.exists() {
            std::fs::remove_file(source).map_err(|e| {
                NplanError::new(
                    ErrorKind::FileError,
                    format!(
                        "Cannot remove {}: {e}",
                        source.display()
                    ),
                )
            })?;
        }
    }
    Ok(())
}
