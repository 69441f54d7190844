// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::{
    CUR_SCHEMA_VERSION, DeviceKind, ErrorKind, IGNORE_ERRORS_ENV, NetDef,
    NetworkDoc, NplanError, NplanNetdef, OvsSettings, Renderer,
    ip::validate_netdef_id,
};

/// Configuration directory roots in ascending override priority.
const HIERARCHY_ROOTS: [&str; 3] =
    ["lib/netplan", "etc/netplan", "run/netplan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserFlags {
    /// Downgrade errors to counted warnings and drop the offending
    /// netdef or document instead of aborting the load.
    pub ignore_errors: bool,
}

impl ParserFlags {
    pub fn from_env() -> Self {
        Self {
            ignore_errors: std::env::var(IGNORE_ERRORS_ENV).as_deref()
                == Ok("1"),
        }
    }
}

/// Accumulated YAML fragments of one netdef across input files.
#[derive(Debug, Clone)]
struct NetdefFragment {
    kind: DeviceKind,
    body: Mapping,
    filepath: PathBuf,
    /// Keys deleted by an explicit null, emitted back as explicit null.
    dirty: BTreeSet<String>,
}

/// Results handed over to [crate::NetplanState::import_parser_results].
#[derive(Debug, Default)]
pub(crate) struct ParserResults {
    pub(crate) netdefs: IndexMap<String, NetDef>,
    pub(crate) global_renderer: Option<Renderer>,
    pub(crate) global_ovs: Option<OvsSettings>,
    pub(crate) sources: Vec<PathBuf>,
    pub(crate) file_renderers: IndexMap<PathBuf, Renderer>,
    pub(crate) error_count: usize,
}

/// Parser context: consumes YAML documents one by one, accumulating a
/// partial model until the results are imported into a state.
#[derive(Debug, Default)]
pub struct Parser {
    flags: ParserFlags,
    error_count: usize,
    sources: Vec<PathBuf>,
    fragments: IndexMap<String, NetdefFragment>,
    global_renderer: Option<Renderer>,
    file_renderers: IndexMap<PathBuf, Renderer>,
    global_ovs: Mapping,
    global_ovs_seen: bool,
    /// Dotted paths whose keys are skipped on ingest (deleted).
    nullable_fields: HashSet<String>,
    /// Netdef ID or global keyword to origin hint file basename.
    nullable_overrides: HashMap<String, String>,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            flags: ParserFlags::from_env(),
            ..Default::default()
        }
    }

    pub fn set_flags(&mut self, flags: ParserFlags) {
        self.flags = flags;
    }

    pub fn flags(&self) -> ParserFlags {
        self.flags
    }

    /// Number of errors downgraded to warnings so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Forget everything ingested so far; the parser is reusable.
    pub fn reset(&mut self) {
        let flags = self.flags;
        *self = Self {
            flags,
            ..Default::default()
        };
    }

    fn report(&mut self, e: NplanError) -> Result<(), NplanError> {
        if self.flags.ignore_errors {
            self.error_count += 1;
            log::warn!("ignoring error: {e}");
            Ok(())
        } else {
            Err(e)
        }
    }

    /// Load a map of dotted key paths whose values are null; those keys
    /// are skipped (deleted) while parsing subsequent documents.
    pub fn load_nullable_fields(
        &mut self,
        yaml: &str,
    ) -> Result<(), NplanError> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| {
            NplanError::new(
                ErrorKind::ParseError,
                format!("Invalid nullable fields document: {e}"),
            )
        })?;
        collect_null_paths(&value, "", &mut self.nullable_fields);
        Ok(())
    }

    /// Load the set of netdef IDs and global keywords that only the
    /// origin hint file may define; any other file's definition of them
    /// is ignored.
    pub fn load_nullable_overrides(
        &mut self,
        yaml: &str,
        origin_hint: &str,
    ) -> Result<(), NplanError> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| {
            NplanError::new(
                ErrorKind::ParseError,
                format!("Invalid nullable overrides document: {e}"),
            )
        })?;
        let Some(network) = value.get("network") else {
            return Ok(());
        };
        let Some(network) = network.as_mapping() else {
            return Ok(());
        };
        for (key, section_value) in network {
            let Some(key) = key.as_str() else { continue };
            if DeviceKind::from_section(key).is_some() {
                for id in section_value
                    .as_mapping()
                    .into_iter()
                    .flat_map(|m| m.keys())
                    .filter_map(|k| k.as_str())
                {
                    self.nullable_overrides
                        .insert(id.to_string(), origin_hint.to_string());
                }
            } else {
                self.nullable_overrides
                    .insert(key.to_string(), origin_hint.to_string());
            }
        }
        Ok(())
    }

    /// Load one YAML file.
    pub fn load_yaml(&mut self, filepath: &Path) -> Result<(), NplanError> {
        let content = std::fs::read_to_string(filepath).map_err(|e| {
            NplanError::new(
                ErrorKind::FileError,
                format!("Cannot read {}: {e}", filepath.display()),
            )
        })?;
        warn_open_permissions(filepath);
        self.load_yaml_content(filepath, &content)
    }

    /// Load a YAML document from an open reader; `filepath` is only used
    /// for provenance and error messages.
    pub fn load_yaml_from_reader<R: Read>(
        &mut self,
        filepath: &Path,
        mut reader: R,
    ) -> Result<(), NplanError> {
        let mut content = String::new();
        reader.read_to_string(&mut content).map_err(|e| {
            NplanError::new(
                ErrorKind::FileError,
                format!("Cannot read {}: {e}", filepath.display()),
            )
        })?;
        self.load_yaml_content(filepath, &content)
    }

    /// Walk the configuration hierarchy below `root_dir`: files from
    /// later roots shadow earlier ones by basename, the combined set is
    /// loaded in lexicographic basename order.
    pub fn load_yaml_hierarchy(
        &mut self,
        root_dir: &Path,
    ) -> Result<(), NplanError> {
        let mut by_basename: IndexMap<String, PathBuf> = IndexMap::new();
        for root in HIERARCHY_ROOTS {
            let dir = root_dir.join(root);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) =
                    path.file_name().and_then(|n| n.to_str())
                else {
                    continue;
                };
                if !name.ends_with(".yaml") && !name.ends_with(".yml") {
                    continue;
                }
                by_basename.insert(name.to_string(), path);
            }
        }
        by_basename.sort_keys();
        for path in by_basename.values() {
            self.load_yaml(path)?;
        }
        Ok(())
    }

    fn load_yaml_content(
        &mut self,
        filepath: &Path,
        content: &str,
    ) -> Result<(), NplanError> {
        let value: Value = match serde_yaml::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                return self
                    .report(NplanError::from_yaml(&e, filepath));
            }
        };
        if value.is_null() {
            log::debug!(
                "{}: empty document, nothing to do",
                filepath.display()
            );
            return Ok(());
        }

        // The typed pass is the grammar validation: unknown keys, wrong
        // node shapes and invalid enum values fail here with a source
        // position. In ignore errors mode malformed netdefs are instead
        // dropped one by one when the merged fragments are finalized.
        if !self.flags.ignore_errors
            && let Err(e) = serde_yaml::from_str::<NetworkDoc>(content)
        {
            return Err(NplanError::from_yaml(&e, filepath));
        }

        let Some(network) =
            value.get("network").and_then(|n| n.as_mapping())
        else {
            return self.report(
                NplanError::new(
                    ErrorKind::ParseError,
                    "Missing 'network' mapping".to_string(),
                )
                .with_file(filepath),
            );
        };

        match network.get("version").and_then(version_of) {
            Some(CUR_SCHEMA_VERSION) => (),
            Some(version) => {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        format!(
                            "Only version {CUR_SCHEMA_VERSION} is \
                             supported, got {version}"
                        ),
                    )
                    .with_file(filepath),
                )?;
            }
            None => {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        "Missing 'version' in the network mapping"
                            .to_string(),
                    )
                    .with_file(filepath),
                )?;
            }
        }

        let basename = filepath
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        for (key, section_value) in network {
            let Some(key) = key.as_str() else {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        format!("Invalid top level key {key:?}"),
                    )
                    .with_file(filepath),
                )?;
                continue;
            };
            match key {
                "version" => (),
                "renderer" => {
                    if self.overridden_elsewhere("renderer", &basename) {
                        continue;
                    }
                    match serde_yaml::from_value::<Renderer>(
                        section_value.clone(),
                    ) {
                        Ok(renderer) => {
                            self.global_renderer = Some(renderer);
                            self.file_renderers
                                .insert(filepath.to_path_buf(), renderer);
                        }
                        Err(e) => self.report(
                            NplanError::new(
                                ErrorKind::SchemaError,
                                format!("Invalid renderer: {e}"),
                            )
                            .with_file(filepath),
                        )?,
                    }
                }
                "openvswitch" => {
                    if self.overridden_elsewhere("openvswitch", &basename)
                    {
                        continue;
                    }
                    if let Some(mapping) = section_value.as_mapping() {
                        let mut mapping = mapping.clone();
                        escape_scalars(&mut mapping);
                        let mut dirty = BTreeSet::new();
                        let mut ovs =
                            std::mem::take(&mut self.global_ovs);
                        merge_mapping(&mut ovs, &mapping, "", &mut dirty);
                        self.global_ovs = ovs;
                        self.global_ovs_seen = true;
                    } else if !section_value.is_null() {
                        self.report(
                            NplanError::new(
                                ErrorKind::ParseError,
                                "openvswitch must be a mapping"
                                    .to_string(),
                            )
                            .with_file(filepath),
                        )?;
                    }
                }
                section => {
                    let Some(kind) = DeviceKind::from_section(section)
                    else {
                        self.report(
                            NplanError::new(
                                ErrorKind::ParseError,
                                format!("Unknown key '{section}'"),
                            )
                            .with_file(filepath),
                        )?;
                        continue;
                    };
                    self.load_section(
                        filepath, &basename, kind, section,
                        section_value,
                    )?;
                }
            }
        }
        self.sources.push(filepath.to_path_buf());
        Ok(())
    }

    fn load_section(
        &mut self,
        filepath: &Path,
        basename: &str,
        kind: DeviceKind,
        section: &str,
        section_value: &Value,
    ) -> Result<(), NplanError> {
        if section_value.is_null() {
            return Ok(());
        }
        let Some(mapping) = section_value.as_mapping() else {
            return self.report(
                NplanError::new(
                    ErrorKind::ParseError,
                    format!("'{section}' must be a mapping"),
                )
                .with_file(filepath),
            );
        };
        for (id, body) in mapping {
            let Some(id) = id.as_str() else {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        format!("Invalid netdef ID {id:?}"),
                    )
                    .with_file(filepath),
                )?;
                continue;
            };
            if let Err(e) = validate_netdef_id(id) {
                self.report(e.with_file(filepath))?;
                continue;
            }
            if self.overridden_elsewhere(id, basename) {
                log::debug!(
                    "{}: skipping '{id}', overridden by another origin",
                    filepath.display()
                );
                continue;
            }
            let mut body = match body {
                Value::Mapping(body) => body.clone(),
                Value::Null => Mapping::new(),
                _ => {
                    self.report(
                        NplanError::new(
                            ErrorKind::ParseError,
                            format!("'{id}' must be a mapping"),
                        )
                        .with_file(filepath),
                    )?;
                    continue;
                }
            };
            escape_scalars(&mut body);

            // Grammar dispatch: the per kind key table rejects unknown
            // keys at the netdef level; nested mappings are validated
            // by their typed deserializers.
            let mut bad_key = None;
            for key in body.keys() {
                match key.as_str() {
                    Some(key) if kind.accepts_key(key) => (),
                    Some(key) => {
                        bad_key = Some(key.to_string());
                        break;
                    }
                    None => {
                        bad_key = Some(format!("{key:?}"));
                        break;
                    }
                }
            }
            if let Some(bad_key) = bad_key {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        format!(
                            "Unknown key '{bad_key}' in {kind} \
                             definition '{id}'"
                        ),
                    )
                    .with_file(filepath),
                )?;
                continue;
            }

            let prefix = format!("network.{section}.{id}.");
            let nulled: Vec<String> = self
                .nullable_fields
                .iter()
                .filter_map(|path| path.strip_prefix(&prefix))
                .map(|rest| rest.to_string())
                .collect();

            let existing_kind =
                self.fragments.get(id).map(|fragment| fragment.kind);
            if let Some(existing_kind) = existing_kind
                && existing_kind != kind
            {
                self.report(
                    NplanError::new(
                        ErrorKind::ParseError,
                        format!(
                            "Updated definition '{id}' changes device \
                             type from {existing_kind} to {kind}"
                        ),
                    )
                    .with_file(filepath),
                )?;
                continue;
            }
            if let Some(fragment) = self.fragments.get_mut(id) {
                let mut dirty = std::mem::take(&mut fragment.dirty);
                let mut merged = std::mem::take(&mut fragment.body);
                merge_mapping(&mut merged, &body, "", &mut dirty);
                delete_paths(&mut merged, &nulled);
                fragment.body = merged;
                fragment.dirty = dirty;
                fragment.filepath = filepath.to_path_buf();
            } else {
                let mut dirty = BTreeSet::new();
                let mut merged = Mapping::new();
                merge_mapping(&mut merged, &body, "", &mut dirty);
                delete_paths(&mut merged, &nulled);
                self.fragments.insert(
                    id.to_string(),
                    NetdefFragment {
                        kind,
                        body: merged,
                        filepath: filepath.to_path_buf(),
                        dirty,
                    },
                );
            }
        }
        Ok(())
    }

    fn overridden_elsewhere(&self, id: &str, basename: &str) -> bool {
        self.nullable_overrides
            .get(id)
            .is_some_and(|hint| hint != basename)
    }

    /// Build the typed netdefs from the merged fragments and hand
    /// everything over; the parser is reset and reusable afterwards.
    pub(crate) fn take_results(
        &mut self,
    ) -> Result<ParserResults, NplanError> {
        let fragments = std::mem::take(&mut self.fragments);
        let mut netdefs: IndexMap<String, NetDef> = IndexMap::new();
        for (id, fragment) in fragments {
            let mut netdef = match NetDef::from_yaml_value(
                fragment.kind,
                Value::Mapping(fragment.body),
            ) {
                Ok(netdef) => netdef,
                Err(e) => {
                    self.report(
                        NplanError::new(
                            ErrorKind::SchemaError,
                            format!("Invalid definition '{id}': {e}"),
                        )
                        .with_file(&fragment.filepath),
                    )?;
                    continue;
                }
            };
            {
                let meta = &mut netdef.common_mut().meta;
                meta.id = id.clone();
                meta.filepath = Some(fragment.filepath.clone());
                meta.dirty = fragment.dirty;
            }
            if let Err(e) = netdef.validate_fields() {
                self.report(e.with_file(&fragment.filepath))?;
                continue;
            }
            netdefs.insert(id, netdef);
        }

        let global_ovs = if self.global_ovs_seen {
            let ovs_value =
                Value::Mapping(std::mem::take(&mut self.global_ovs));
            match serde_yaml::from_value::<OvsSettings>(ovs_value) {
                Ok(ovs) => {
                    if let Err(e) = ovs.validate("network.openvswitch") {
                        self.report(e)?;
                    }
                    self.create_patch_ports(&ovs, &mut netdefs)?;
                    Some(ovs)
                }
                Err(e) => {
                    self.report(NplanError::new(
                        ErrorKind::SchemaError,
                        format!("Invalid openvswitch settings: {e}"),
                    ))?;
                    None
                }
            }
        } else {
            None
        };

        let results = ParserResults {
            netdefs,
            global_renderer: self.global_renderer,
            global_ovs,
            sources: std::mem::take(&mut self.sources),
            file_renderers: std::mem::take(&mut self.file_renderers),
            error_count: self.error_count,
        };
        self.reset();
        Ok(results)
    }

    fn create_patch_ports(
        &mut self,
        ovs: &OvsSettings,
        netdefs: &mut IndexMap<String, NetDef>,
    ) -> Result<(), NplanError> {
        for pair in ovs.ports.iter().flatten() {
            let [a, b] = pair.as_slice() else { continue };
            for (port, peer) in [(a, b), (b, a)] {
                if netdefs.contains_key(port) {
                    self.report(NplanError::new(
                        ErrorKind::ConsistencyError,
                        format!(
                            "OVS patch port '{port}' collides with an \
                             existing definition"
                        ),
                    ))?;
                    continue;
                }
                let mut netdef =
                    NetDef::OvsPort(Box::new(crate::OvsPortNetdef {
                        peer: Some(peer.clone()),
                        ..Default::default()
                    }));
                netdef.common_mut().meta.id = port.clone();
                netdefs.insert(port.clone(), netdef);
            }
        }
        Ok(())
    }
}

fn version_of(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Merge `src` into `dest`: mappings merge recursively, a null value
/// deletes the key and records it as dirty, anything else replaces.
fn merge_mapping(
    dest: &mut Mapping,
    src: &Mapping,
    prefix: &str,
    dirty: &mut BTreeSet<String>,
) {
    for (key, value) in src {
        let path = match key.as_str() {
            Some(key) if prefix.is_empty() => key.to_string(),
            Some(key) => format!("{prefix}.{key}"),
            None => prefix.to_string(),
        };
        match value {
            Value::Null => {
                dest.remove(key);
                dirty.insert(path);
            }
            Value::Mapping(src_child) => {
                dirty.remove(&path);
                if let Some(Value::Mapping(dest_child)) =
                    dest.get_mut(key)
                {
                    let mut dest_child = std::mem::take(dest_child);
                    merge_mapping(
                        &mut dest_child,
                        src_child,
                        &path,
                        dirty,
                    );
                    dest.insert(
                        key.clone(),
                        Value::Mapping(dest_child),
                    );
                } else {
                    dest.insert(key.clone(), value.clone());
                }
            }
            _ => {
                dirty.remove(&path);
                dest.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Remove the given dotted paths from a mapping. Unlike an in-document
/// null this leaves no trace: the key simply disappears from the
/// emitted output.
fn delete_paths(mapping: &mut Mapping, paths: &[String]) {
    for path in paths {
        let mut current = &mut *mapping;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let key = Value::String(segment.to_string());
            if segments.peek().is_none() {
                current.remove(&key);
                break;
            }
            match current.get_mut(&key) {
                Some(Value::Mapping(child)) => current = child,
                _ => break,
            }
        }
    }
}

/// Collect dotted paths of null leaves, e.g.
/// `network.ethernets.eth0.dhcp4`.
fn collect_null_paths(
    value: &Value,
    prefix: &str,
    paths: &mut HashSet<String>,
) {
    match value {
        Value::Null => {
            if !prefix.is_empty() {
                paths.insert(prefix.to_string());
            }
        }
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let Some(key) = key.as_str() else { continue };
                let child_prefix = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_null_paths(child, &child_prefix, paths);
            }
        }
        _ => (),
    }
}

/// Escape control characters in every scalar string, octal style.
fn escape_scalars(mapping: &mut Mapping) {
    let escaped = Value::Mapping(mapping.clone());
    let escaped = escape_value(escaped);
    if let Value::Mapping(escaped) = escaped {
        *mapping = escaped;
    }
}

fn escape_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if s.chars().any(|c| c.is_control()) {
                let mut escaped = String::with_capacity(s.len());
                for c in s.chars() {
                    if c.is_control() {
                        escaped
                            .push_str(&format!("\\{:03o}", c as u32));
                    } else {
                        escaped.push(c);
                    }
                }
                Value::String(escaped)
            } else {
                Value::String(s)
            }
        }
        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter().map(escape_value).collect(),
        ),
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(k, v)| (k, escape_value(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(unix)]
fn warn_open_permissions(filepath: &Path) {
    use std::os::unix::fs::MetadataExt;
    if let Ok(metadata) = std::fs::metadata(filepath)
        && metadata.mode() & 0o077 != 0
    {
        log::warn!(
            "Permissions for {} are too open. Configuration should not \
             be readable by others",
            filepath.display()
        );
    }
}

#[cfg(not(unix))]
fn warn_open_permissions(_filepath: &Path) {}
