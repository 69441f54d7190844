// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{
    Backend, DeviceKind, ErrorKind, NetDef, NplanError, NplanNetdef,
    OvsSettings, Parser, Renderer, validation,
};

/// Reference kinds recorded in the missing IDs table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    BondMember,
    BridgeMember,
    VrfMember,
    VlanLink,
    VxlanLink,
    SriovLink,
    VethPeer,
    OvsPatchPeer,
}

impl RefKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::BondMember => "bond interface",
            Self::BridgeMember => "bridge interface",
            Self::VrfMember => "vrf interface",
            Self::VlanLink => "vlan link",
            Self::VxlanLink => "vxlan link",
            Self::SriovLink => "sriov link",
            Self::VethPeer => "veth peer",
            Self::OvsPatchPeer => "ovs patch port peer",
        }
    }

    /// Dangling references the NetworkManager backend tolerates by
    /// synthesizing a placeholder netdef.
    fn allows_placeholder(&self) -> bool {
        matches!(self, Self::VlanLink | Self::VethPeer)
    }
}

/// One pending cross-reference: `referrer` points at the not yet
/// defined `target`.
#[derive(Debug, Clone)]
struct PendingRef {
    referrer: String,
    kind: RefKind,
}

/// The per physical function part of an SR-IOV write plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct SriovPlan {
    /// Virtual function count per physical function netdef ID. Link
    /// manipulation itself is left to an external collaborator.
    pub vf_counts: IndexMap<String, u16>,
}

/// Consolidated result of one or more parser runs: the validated model
/// the renderers and the emitter consume.
#[derive(Debug, Default)]
pub struct NetplanState {
    netdefs: IndexMap<String, NetDef>,
    global_renderer: Option<Renderer>,
    global_ovs: Option<OvsSettings>,
    sources: Vec<PathBuf>,
    file_renderers: IndexMap<PathBuf, Renderer>,
    error_count: usize,
}

impl NetplanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer a parser's accumulated results into this state, then
    /// resolve cross-references and validate the model. The parser is
    /// reset and reusable afterwards.
    pub fn import_parser_results(
        &mut self,
        parser: &mut Parser,
    ) -> Result<(), NplanError> {
        let results = parser.take_results()?;
        self.error_count += results.error_count;
        if results.global_renderer.is_some() {
            self.global_renderer = results.global_renderer;
        }
        if results.global_ovs.is_some() {
            self.global_ovs = results.global_ovs;
        }
        self.sources.extend(results.sources);
        self.file_renderers.extend(results.file_renderers);
        for (id, netdef) in results.netdefs {
            self.netdefs.insert(id, netdef);
        }

        self.resolve_backends();
        self.resolve_references()?;
        self.promote_ovs_vlans();
        validation::validate_state(self)?;
        Ok(())
    }

    /// Drop everything, freeing all netdefs.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.netdefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.netdefs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NetDef> {
        self.netdefs.get(id)
    }

    /// Iterate netdefs in insertion order, which is load order.
    pub fn iter(&self) -> impl Iterator<Item = &NetDef> {
        self.netdefs.values()
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut NetDef> {
        self.netdefs.values_mut()
    }

    pub fn iter_backend(
        &self,
        backend: Backend,
    ) -> impl Iterator<Item = &NetDef> {
        self.iter().filter(move |n| n.backend() == backend)
    }

    pub fn global_renderer(&self) -> Option<Renderer> {
        self.global_renderer
    }

    pub fn global_ovs(&self) -> Option<&OvsSettings> {
        self.global_ovs.as_ref()
    }

    pub(crate) fn file_renderer(&self, path: &Path) -> Option<Renderer> {
        self.file_renderers.get(path).copied()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Errors downgraded to warnings during parsing.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub(crate) fn insert(&mut self, netdef: NetDef) {
        self.netdefs
            .insert(netdef.id().to_string(), netdef);
    }

    fn resolve_backends(&mut self) {
        let global_default = match self.global_renderer {
            Some(Renderer::NetworkManager) => Backend::NetworkManager,
            _ => Backend::Networkd,
        };
        for netdef in self.netdefs.values_mut() {
            let kind = netdef.kind();
            // Kinds only one backend can handle ignore the renderer
            // inheritance chain.
            let default = match kind {
                DeviceKind::Modem | DeviceKind::NmDevice => {
                    Backend::NetworkManager
                }
                DeviceKind::OvsPort => Backend::Ovs,
                _ => global_default,
            };
            let mut backend = match netdef.common().renderer {
                Some(Renderer::Networkd) => Backend::Networkd,
                Some(Renderer::NetworkManager) => Backend::NetworkManager,
                // `renderer: sriov` does not choose a backend; the
                // hardware offload flag is handled below.
                Some(Renderer::Sriov) | None => default,
            };
            if kind == DeviceKind::Modem || kind == DeviceKind::NmDevice {
                backend = Backend::NetworkManager;
            }
            if netdef.common().renderer == Some(Renderer::Sriov) {
                if kind == DeviceKind::Vlan {
                    netdef.common_mut().meta.sriov_vlan_filter = true;
                } else {
                    log::warn!(
                        "{}: 'renderer: sriov' is only meaningful for \
                         VLANs",
                        netdef.id()
                    );
                }
            }
            // Implicit open-vswitch promotion by bond mode or by
            // non-trivial OVS settings.
            if let NetDef::Bond(bond) = &*netdef
                && bond.mode().is_some_and(|m| m.is_ovs_only())
            {
                backend = Backend::Ovs;
            }
            if netdef
                .common()
                .openvswitch
                .as_ref()
                .is_some_and(|ovs| ovs.is_nontrivial())
            {
                backend = Backend::Ovs;
            }
            netdef.common_mut().meta.backend = Some(backend);
        }
    }

    /// A VLAN on top of an OVS device moves to the open-vswitch backend
    /// as well. Runs to a fixed point since the parent may itself be a
    /// freshly promoted VLAN.
    fn promote_ovs_vlans(&mut self) {
        loop {
            let mut promote: Vec<String> = Vec::new();
            for netdef in self.netdefs.values() {
                if let NetDef::Vlan(vlan) = netdef
                    && netdef.backend() != Backend::Ovs
                    && let Some(parent) = vlan
                        .link
                        .as_deref()
                        .and_then(|link| self.netdefs.get(link))
                    && parent.backend() == Backend::Ovs
                {
                    promote.push(netdef.id().to_string());
                }
            }
            if promote.is_empty() {
                break;
            }
            for id in promote {
                if let Some(netdef) = self.netdefs.get_mut(&id) {
                    netdef.common_mut().meta.backend =
                        Some(Backend::Ovs);
                }
            }
        }
    }

    /// Multi-pass reference resolution: on each pass count how many
    /// previously missing IDs became satisfied, stop at the fixed point.
    /// Residual missing IDs are errors, except those the NetworkManager
    /// backend tolerates via placeholder netdefs.
    fn resolve_references(&mut self) -> Result<(), NplanError> {
        let mut missing;
        let mut previously_missing: Option<usize> = None;
        loop {
            let (_, still_missing) = self.resolve_pass()?;
            let progress = previously_missing
                .is_none_or(|previous| still_missing.len() < previous);
            previously_missing = Some(still_missing.len());
            missing = still_missing;
            if missing.is_empty() || !progress {
                break;
            }
        }

        if missing.is_empty() {
            return Ok(());
        }

        // Placeholders for dangling NetworkManager references.
        let mut synthesized = false;
        for (target, pending) in &missing {
            for pending in pending {
                let backend = self
                    .netdefs
                    .get(&pending.referrer)
                    .map(|n| n.backend())
                    .unwrap_or_default();
                if pending.kind.allows_placeholder()
                    && backend == Backend::NetworkManager
                {
                    log::debug!(
                        "creating placeholder for '{target}' required \
                         by '{}'",
                        pending.referrer
                    );
                    self.netdefs.insert(
                        target.clone(),
                        NetDef::new_placeholder(
                            DeviceKind::NmDevice,
                            target,
                        ),
                    );
                    synthesized = true;
                    break;
                }
            }
        }
        if synthesized {
            let (_, missing) = self.resolve_pass()?;
            if missing.is_empty() {
                return Ok(());
            }
            return Err(missing_error(&missing));
        }
        Err(missing_error(&missing))
    }

    /// One resolution pass: walk every declared reference, apply the
    /// ones whose target exists (handlers are idempotent), return the
    /// number of applied references and the still missing table.
    fn resolve_pass(
        &mut self,
    ) -> Result<(usize, IndexMap<String, Vec<PendingRef>>), NplanError>
    {
        let mut missing: IndexMap<String, Vec<PendingRef>> =
            IndexMap::new();
        let mut found = 0usize;

        struct Action {
            owner: String,
            target: String,
            kind: RefKind,
        }
        let mut actions: Vec<Action> = Vec::new();

        for netdef in self.netdefs.values() {
            let id = netdef.id().to_string();
            let mut want = |target: &str, kind: RefKind| {
                if self.netdefs.contains_key(target) {
                    actions.push(Action {
                        owner: id.clone(),
                        target: target.to_string(),
                        kind,
                    });
                } else {
                    missing
                        .entry(target.to_string())
                        .or_default()
                        .push(PendingRef {
                            referrer: id.clone(),
                            kind,
                        });
                }
            };
            match netdef {
                NetDef::Bond(_) => {
                    for member in netdef.member_names().iter().flat_map(
                        |members| members.iter(),
                    ) {
                        want(member, RefKind::BondMember);
                    }
                }
                NetDef::Bridge(_) => {
                    for member in netdef.member_names().iter().flat_map(
                        |members| members.iter(),
                    ) {
                        want(member, RefKind::BridgeMember);
                    }
                }
                NetDef::Vrf(_) => {
                    for member in netdef.member_names().iter().flat_map(
                        |members| members.iter(),
                    ) {
                        want(member, RefKind::VrfMember);
                    }
                }
                NetDef::Vlan(vlan) => {
                    if let Some(link) = vlan.link.as_deref() {
                        want(link, RefKind::VlanLink);
                    }
                }
                NetDef::Tunnel(tunnel) => {
                    if let Some(link) = tunnel.link.as_deref() {
                        want(link, RefKind::VxlanLink);
                    }
                }
                NetDef::Ethernet(ethernet) => {
                    if let Some(link) = ethernet.link.as_deref() {
                        want(link, RefKind::SriovLink);
                    }
                }
                NetDef::Veth(veth) => {
                    if let Some(peer) = veth.peer.as_deref() {
                        want(peer, RefKind::VethPeer);
                    }
                }
                NetDef::OvsPort(port) => {
                    if let Some(peer) = port.peer.as_deref() {
                        want(peer, RefKind::OvsPatchPeer);
                    }
                }
                _ => (),
            }
        }

        for action in actions {
            self.apply_reference(&action.owner, &action.target, action.kind)?;
            found += 1;
        }
        Ok((found, missing))
    }

    fn apply_reference(
        &mut self,
        owner: &str,
        target: &str,
        kind: RefKind,
    ) -> Result<(), NplanError> {
        match kind {
            RefKind::BondMember
            | RefKind::BridgeMember
            | RefKind::VrfMember => {
                self.apply_membership(owner, target, kind)?;
            }
            RefKind::VlanLink => {
                if let Some(parent) = self.netdefs.get_mut(target) {
                    parent.common_mut().meta.has_vlans = true;
                }
            }
            RefKind::VxlanLink => {
                if let Some(parent) = self.netdefs.get_mut(target) {
                    parent.common_mut().meta.has_vxlans = true;
                }
            }
            RefKind::SriovLink | RefKind::OvsPatchPeer => (),
            RefKind::VethPeer => {
                if owner == target {
                    return Err(NplanError::new(
                        ErrorKind::ConsistencyError,
                        format!("Veth '{owner}' cannot peer itself"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn apply_membership(
        &mut self,
        owner: &str,
        member: &str,
        kind: RefKind,
    ) -> Result<(), NplanError> {
        // Primary flag comes from the owning bond's parameters.
        let primary = if kind == RefKind::BondMember {
            match self.netdefs.get(owner) {
                Some(NetDef::Bond(bond)) => {
                    bond.primary_member() == Some(member)
                }
                _ => false,
            }
        } else {
            false
        };
        let bridge_port = if kind == RefKind::BridgeMember {
            match self.netdefs.get(owner) {
                Some(NetDef::Bridge(bridge)) => bridge
                    .parameters
                    .as_ref()
                    .map(|params| {
                        (
                            params
                                .path_cost
                                .as_ref()
                                .and_then(|m| m.get(member))
                                .copied(),
                            params
                                .port_priority
                                .as_ref()
                                .and_then(|m| m.get(member))
                                .copied(),
                        )
                    })
                    .unwrap_or_default(),
                _ => Default::default(),
            }
        } else {
            Default::default()
        };

        let Some(netdef) = self.netdefs.get_mut(member) else {
            return Ok(());
        };
        let id = netdef.id().to_string();
        let meta = &mut netdef.common_mut().meta;
        let slot = match kind {
            RefKind::BondMember => &mut meta.bond,
            RefKind::BridgeMember => &mut meta.bridge,
            RefKind::VrfMember => &mut meta.vrf,
            _ => return Ok(()),
        };
        match slot.as_deref() {
            // Idempotent on identical re-assignment.
            Some(existing) if existing == owner => (),
            Some(existing) => {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "Interface '{id}' is already assigned to \
                         '{existing}', cannot assign to '{owner}'"
                    ),
                ));
            }
            None => *slot = Some(owner.to_string()),
        }
        if kind == RefKind::BondMember {
            if meta.bridge.is_some() {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "Interface '{id}' cannot be in bond '{owner}' \
                         and bridge '{}' at the same time",
                        meta.bridge.as_deref().unwrap_or_default()
                    ),
                ));
            }
            meta.bond_primary = primary;
        }
        if kind == RefKind::BridgeMember {
            if meta.bond.is_some() {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "Interface '{id}' cannot be in bridge \
                         '{owner}' and bond '{}' at the same time",
                        meta.bond.as_deref().unwrap_or_default()
                    ),
                ));
            }
            let (cost, priority) = bridge_port;
            if cost.is_some() {
                meta.bridge_path_cost = cost;
            }
            if priority.is_some() {
                meta.bridge_port_priority = priority;
            }
        }
        Ok(())
    }

    /// Prepare the SR-IOV write plan: virtual function counts per
    /// physical function. The actual netlink work is done by an
    /// external collaborator.
    pub fn finish_sriov_write(&self) -> Result<SriovPlan, NplanError> {
        let mut plan = SriovPlan::default();
        for netdef in self.iter() {
            if let NetDef::Ethernet(ethernet) = netdef
                && let Some(pf) = ethernet.link.as_deref()
            {
                *plan.vf_counts.entry(pf.to_string()).or_insert(0) += 1;
            }
        }
        for (pf, count) in plan.vf_counts.iter_mut() {
            if let Some(NetDef::Ethernet(ethernet)) = self.netdefs.get(pf)
                && let Some(explicit) = ethernet.virtual_function_count
            {
                if explicit < *count {
                    return Err(NplanError::new(
                        ErrorKind::ConsistencyError,
                        format!(
                            "{pf}: virtual-function-count {explicit} is \
                             smaller than the {count} defined virtual \
                             functions"
                        ),
                    ));
                }
                *count = explicit;
            }
        }
        Ok(plan)
    }

    /// Write the network daemon backend files below `root_dir`.
    pub fn finish_networkd_write(
        &self,
        root_dir: &Path,
    ) -> Result<(), NplanError> {
        crate::renderer::networkd::write(self, root_dir)
    }

    /// Write the NetworkManager backend files below `root_dir`.
    pub fn finish_nm_write(
        &self,
        root_dir: &Path,
    ) -> Result<(), NplanError> {
        crate::renderer::nm::write(self, root_dir)
    }

    /// Serialize one netdef into its canonical YAML file below
    /// `root_dir`.
    pub fn write_yaml_file(
        &self,
        id: &str,
        root_dir: &Path,
    ) -> Result<PathBuf, NplanError> {
        crate::emitter::write_netdef_file(self, id, root_dir)
    }

    /// Re-emit the whole state partitioned by origin file; netdefs
    /// without an origin go to `default_path`.
    pub fn update_yaml_hierarchy(
        &self,
        root_dir: &Path,
        default_path: &Path,
    ) -> Result<(), NplanError> {
        crate::emitter::update_hierarchy(self, root_dir, default_path)
    }

    /// Serialize the whole state into one YAML document.
    pub fn dump_yaml(&self) -> Result<String, NplanError> {
        crate::emitter::dump_state(self)
    }

    /// Import a NetworkManager keyfile as a netdef. The same
    /// resolution and validation as a parser import runs afterwards,
    /// so dangling references get their placeholders.
    pub fn load_keyfile(
        &mut self,
        filepath: &Path,
    ) -> Result<&NetDef, NplanError> {
        let netdef = crate::keyfile::import_keyfile(filepath)?;
        let id = netdef.id().to_string();
        self.insert(netdef);
        self.resolve_backends();
        self.resolve_references()?;
        self.promote_ovs_vlans();
        validation::validate_state(self)?;
        Ok(self.netdefs.get(&id).unwrap())
    }
}

fn missing_error(
    missing: &IndexMap<String, Vec<PendingRef>>,
) -> NplanError {
    let mut details: Vec<String> = Vec::new();
    for (target, pending) in missing {
        for p in pending {
            details.push(format!(
                "'{target}' ({} of '{}')",
                p.kind.as_str(),
                p.referrer
            ));
        }
    }
    NplanError::new(
        ErrorKind::ReferenceError,
        format!("Unresolved references: {}", details.join(", ")),
    )
}
