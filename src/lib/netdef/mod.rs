// SPDX-License-Identifier: Apache-2.0

pub(crate) mod address;
pub(crate) mod auth;
pub(crate) mod bond;
pub(crate) mod bridge;
pub(crate) mod common;
pub(crate) mod ethernet;
pub(crate) mod modem;
pub(crate) mod nm;
pub(crate) mod ovs;
pub(crate) mod tunnel;
pub(crate) mod vlan;
pub(crate) mod wifi;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError};
pub use self::{
    address::{AddressEntry, AddressLifetime, AddressOptions},
    auth::{
        AuthEapMethod, AuthKeyManagement, AuthPmfMode, AuthSettings,
    },
    bond::{
        BondAdSelect, BondArpAllTargets, BondArpValidate,
        BondFailOverMacPolicy, BondLacpRate, BondMode, BondNetdef,
        BondParameters, BondPrimaryReselectPolicy, BondTransmitHashPolicy,
    },
    bridge::{BridgeNetdef, BridgeParameters},
    common::{
        ActivationMode, Backend, CommonNetdef, DhcpOverrides,
        Ipv6AddressGeneration, LinkLocalFamily, MatchConfig, Nameservers,
        NetdefMeta, OptionalAddressType, Renderer, UseDomains,
    },
    ethernet::{DummyNetdef, EthernetNetdef, VethNetdef},
    modem::ModemNetdef,
    nm::{NetworkManagerSettings, NmDeviceNetdef},
    ovs::{
        OpenFlowProtocol, OvsConnectionMode, OvsController, OvsFailMode,
        OvsLacp, OvsPortNetdef, OvsSettings, OvsSsl,
    },
    tunnel::{
        KeyFlag, TunnelKeys, TunnelMode, TunnelNetdef, VxlanChecksum,
        VxlanExtension, VxlanNotification, WireguardPeer,
        WireguardPeerKeys,
    },
    vlan::{VlanNetdef, VrfNetdef},
    wifi::{
        AccessPointMode, WakeOnWlanFlag, WifiAccessPoint, WifiBand,
        WifiNetdef,
    },
};

/// Device type of a netdef, fixed by the YAML section it was declared in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum DeviceKind {
    Ethernet,
    Modem,
    Wifi,
    Bridge,
    Bond,
    Vlan,
    Vrf,
    Tunnel,
    Dummy,
    Veth,
    /// OVS patch port, created from a global `openvswitch.ports` pair.
    OvsPort,
    /// NetworkManager passthrough profile.
    NmDevice,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Modem => "modem",
            Self::Wifi => "wifi",
            Self::Bridge => "bridge",
            Self::Bond => "bond",
            Self::Vlan => "vlan",
            Self::Vrf => "vrf",
            Self::Tunnel => "tunnel",
            Self::Dummy => "dummy",
            Self::Veth => "veth",
            Self::OvsPort => "port",
            Self::NmDevice => "nm-device",
        }
    }

    /// The `network:` section this kind is declared under. `None` for
    /// kinds without a section of their own.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            Self::Ethernet => Some("ethernets"),
            Self::Modem => Some("modems"),
            Self::Wifi => Some("wifis"),
            Self::Bridge => Some("bridges"),
            Self::Bond => Some("bonds"),
            Self::Vlan => Some("vlans"),
            Self::Vrf => Some("vrfs"),
            Self::Tunnel => Some("tunnels"),
            Self::Dummy => Some("dummy-devices"),
            Self::Veth => Some("virtual-ethernets"),
            Self::OvsPort => None,
            Self::NmDevice => Some("nm-devices"),
        }
    }

    pub fn from_section(section: &str) -> Option<Self> {
        match section {
            "ethernets" => Some(Self::Ethernet),
            "modems" => Some(Self::Modem),
            "wifis" => Some(Self::Wifi),
            "bridges" => Some(Self::Bridge),
            "bonds" => Some(Self::Bond),
            "vlans" => Some(Self::Vlan),
            "vrfs" => Some(Self::Vrf),
            "tunnels" => Some(Self::Tunnel),
            "dummy-devices" => Some(Self::Dummy),
            "virtual-ethernets" => Some(Self::Veth),
            "nm-devices" => Some(Self::NmDevice),
            _ => None,
        }
    }

    /// All kinds with a YAML section, in canonical emission order.
    pub fn sections() -> &'static [Self] {
        &[
            Self::Ethernet,
            Self::Modem,
            Self::Wifi,
            Self::Bridge,
            Self::Bond,
            Self::Tunnel,
            Self::Vlan,
            Self::Vrf,
            Self::Dummy,
            Self::Veth,
            Self::NmDevice,
        ]
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Self::Ethernet | Self::Modem | Self::Wifi)
    }

    /// Grammar table: whether `key` is valid at the top level of a
    /// netdef body of this kind. Nested mappings are checked by their
    /// typed deserializers; the top level needs an explicit table
    /// because the per kind structs flatten their common part.
    pub(crate) fn accepts_key(&self, key: &str) -> bool {
        if COMMON_KEYS.contains(&key) {
            return true;
        }
        if self.is_physical() && PHYSICAL_KEYS.contains(&key) {
            return true;
        }
        let kind_keys: &[&str] = match self {
            Self::Ethernet => {
                &["auth", "link", "virtual-function-count"]
            }
            Self::Modem => &[
                "apn",
                "auto-config",
                "device-id",
                "network-id",
                "number",
                "password",
                "pin",
                "sim-id",
                "sim-operator-id",
                "username",
            ],
            Self::Wifi => &[
                "access-points",
                "auth",
                "regulatory-domain",
                "wakeonwlan",
            ],
            Self::Bridge | Self::Bond => &["interfaces", "parameters"],
            Self::Vlan => &["id", "link"],
            Self::Vrf => &["interfaces", "table"],
            Self::Tunnel => &[
                "ageing",
                "arp-proxy",
                "checksums",
                "do-not-fragment",
                "extensions",
                "flow-label",
                "id",
                "key",
                "keys",
                "limit",
                "link",
                "local",
                "mac-learning",
                "mark",
                "mode",
                "neigh-suppress",
                "notifications",
                "peers",
                "port",
                "port-range",
                "remote",
                "short-circuit",
                "ttl",
                "type-of-service",
            ],
            Self::Veth => &["peer"],
            Self::Dummy | Self::NmDevice => &[],
            Self::OvsPort => &["peer"],
        };
        kind_keys.contains(&key)
    }
}

/// Keys every device kind accepts.
const COMMON_KEYS: &[&str] = &[
    "accept-ra",
    "activation-mode",
    "addresses",
    "critical",
    "dhcp-identifier",
    "dhcp4",
    "dhcp4-overrides",
    "dhcp6",
    "dhcp6-overrides",
    "gateway4",
    "gateway6",
    "ignore-carrier",
    "ipv6-address-generation",
    "ipv6-address-token",
    "ipv6-mtu",
    "ipv6-privacy",
    "link-local",
    "macaddress",
    "mtu",
    "nameservers",
    "networkmanager",
    "openvswitch",
    "optional",
    "optional-addresses",
    "renderer",
    "routes",
    "routing-policy",
];

/// Keys only physical device kinds accept.
const PHYSICAL_KEYS: &[&str] = &[
    "emit-lldp",
    "generic-receive-offload",
    "generic-segmentation-offload",
    "large-receive-offload",
    "match",
    "receive-checksum-offload",
    "set-name",
    "tcp-segmentation-offload",
    "tcp6-segmentation-offload",
    "transmit-checksum-offload",
    "wakeonlan",
];

/// One network definition, the central entity of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NetDef {
    Ethernet(Box<EthernetNetdef>),
    Modem(Box<ModemNetdef>),
    Wifi(Box<WifiNetdef>),
    Bridge(Box<BridgeNetdef>),
    Bond(Box<BondNetdef>),
    Vlan(Box<VlanNetdef>),
    Vrf(Box<VrfNetdef>),
    Tunnel(Box<TunnelNetdef>),
    Dummy(Box<DummyNetdef>),
    Veth(Box<VethNetdef>),
    OvsPort(Box<OvsPortNetdef>),
    NmDevice(Box<NmDeviceNetdef>),
}

macro_rules! gen_netdef_no_arg {
    ( $self:ident, $func:ident ) => {
        match $self {
            Self::Ethernet(d) => d.$func(),
            Self::Modem(d) => d.$func(),
            Self::Wifi(d) => d.$func(),
            Self::Bridge(d) => d.$func(),
            Self::Bond(d) => d.$func(),
            Self::Vlan(d) => d.$func(),
            Self::Vrf(d) => d.$func(),
            Self::Tunnel(d) => d.$func(),
            Self::Dummy(d) => d.$func(),
            Self::Veth(d) => d.$func(),
            Self::OvsPort(d) => d.$func(),
            Self::NmDevice(d) => d.$func(),
        }
    };
}

/// Behavior shared by all netdef kinds.
pub trait NplanNetdef {
    fn common(&self) -> &CommonNetdef;
    fn common_mut(&mut self) -> &mut CommonNetdef;
    fn kind(&self) -> DeviceKind;

    /// Per netdef grammar validation, run right after the netdef is
    /// assembled from its merged YAML fragments.
    fn validate_fields(&mut self) -> Result<(), NplanError>;

    fn name(&self) -> &str {
        self.common().meta.id.as_str()
    }

    fn is_physical(&self) -> bool {
        self.kind().is_physical()
    }

    /// Reject physical-only keys on virtual device kinds.
    fn validate_physical_keys(&self) -> Result<(), NplanError> {
        if !self.is_physical()
            && let Some(key) = self.common().physical_key_in_use()
        {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "{}: '{key}' is not valid for a {} definition",
                    self.name(),
                    self.kind()
                ),
            ));
        }
        Ok(())
    }
}

macro_rules! gen_netdef_impl {
    ( $struct:ty, $kind:expr ) => {
        impl NplanNetdef for $struct {
            fn common(&self) -> &CommonNetdef {
                &self.common
            }

            fn common_mut(&mut self) -> &mut CommonNetdef {
                &mut self.common
            }

            fn kind(&self) -> DeviceKind {
                $kind
            }

            fn validate_fields(&mut self) -> Result<(), NplanError> {
                self.validate_physical_keys()?;
                let id = self.common.meta.id.clone();
                self.common.validate(&id)?;
                self.validate_kind_specific()
            }
        }
    };
}

gen_netdef_impl!(EthernetNetdef, DeviceKind::Ethernet);
gen_netdef_impl!(ModemNetdef, DeviceKind::Modem);
gen_netdef_impl!(WifiNetdef, DeviceKind::Wifi);
gen_netdef_impl!(BridgeNetdef, DeviceKind::Bridge);
gen_netdef_impl!(BondNetdef, DeviceKind::Bond);
gen_netdef_impl!(VlanNetdef, DeviceKind::Vlan);
gen_netdef_impl!(VrfNetdef, DeviceKind::Vrf);
gen_netdef_impl!(TunnelNetdef, DeviceKind::Tunnel);
gen_netdef_impl!(DummyNetdef, DeviceKind::Dummy);
gen_netdef_impl!(VethNetdef, DeviceKind::Veth);
gen_netdef_impl!(OvsPortNetdef, DeviceKind::OvsPort);
gen_netdef_impl!(NmDeviceNetdef, DeviceKind::NmDevice);

/// Hook for per kind validation beyond the common checks; default no-op.
trait KindValidate {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        Ok(())
    }
}

impl KindValidate for EthernetNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for ModemNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for WifiNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for BridgeNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for BondNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for VlanNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        // A hardware offloaded VLAN skips rendering but still needs a
        // valid id and link.
        self.validate()
    }
}
impl KindValidate for VrfNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for TunnelNetdef {
    fn validate_kind_specific(&mut self) -> Result<(), NplanError> {
        self.validate()
    }
}
impl KindValidate for DummyNetdef {}
impl KindValidate for VethNetdef {}
impl KindValidate for OvsPortNetdef {}
impl KindValidate for NmDeviceNetdef {}

impl NplanNetdef for NetDef {
    fn common(&self) -> &CommonNetdef {
        gen_netdef_no_arg!(self, common)
    }

    fn common_mut(&mut self) -> &mut CommonNetdef {
        gen_netdef_no_arg!(self, common_mut)
    }

    fn kind(&self) -> DeviceKind {
        gen_netdef_no_arg!(self, kind)
    }

    fn validate_fields(&mut self) -> Result<(), NplanError> {
        gen_netdef_no_arg!(self, validate_fields)
    }
}

impl NetDef {
    /// Deserialize the merged YAML fragment of a netdef into its typed
    /// representation.
    pub(crate) fn from_yaml_value(
        kind: DeviceKind,
        value: serde_yaml::Value,
    ) -> Result<Self, serde_yaml::Error> {
        Ok(match kind {
            DeviceKind::Ethernet => {
                Self::Ethernet(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Modem => {
                Self::Modem(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Wifi => {
                Self::Wifi(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Bridge => {
                Self::Bridge(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Bond => {
                Self::Bond(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Vlan => {
                Self::Vlan(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Vrf => {
                Self::Vrf(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Tunnel => {
                Self::Tunnel(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Dummy => {
                Self::Dummy(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::Veth => {
                Self::Veth(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::OvsPort => {
                Self::OvsPort(Box::new(serde_yaml::from_value(value)?))
            }
            DeviceKind::NmDevice => {
                Self::NmDevice(Box::new(serde_yaml::from_value(value)?))
            }
        })
    }

    /// Serialize the netdef body (without its ID or section) back to a
    /// YAML value, for the emitter.
    pub(crate) fn to_yaml_value(
        &self,
    ) -> Result<serde_yaml::Value, serde_yaml::Error> {
        match self {
            Self::Ethernet(d) => serde_yaml::to_value(d),
            Self::Modem(d) => serde_yaml::to_value(d),
            Self::Wifi(d) => serde_yaml::to_value(d),
            Self::Bridge(d) => serde_yaml::to_value(d),
            Self::Bond(d) => serde_yaml::to_value(d),
            Self::Vlan(d) => serde_yaml::to_value(d),
            Self::Vrf(d) => serde_yaml::to_value(d),
            Self::Tunnel(d) => serde_yaml::to_value(d),
            Self::Dummy(d) => serde_yaml::to_value(d),
            Self::Veth(d) => serde_yaml::to_value(d),
            Self::OvsPort(d) => serde_yaml::to_value(d),
            Self::NmDevice(d) => serde_yaml::to_value(d),
        }
    }

    /// Fresh placeholder netdef satisfying a dangling NetworkManager
    /// reference; a later real definition upgrades the kind in place.
    pub(crate) fn new_placeholder(kind: DeviceKind, id: &str) -> Self {
        let mut netdef = Self::from_yaml_value(
            kind,
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        )
        .unwrap_or_else(|_| {
            Self::NmDevice(Box::new(NmDeviceNetdef::default()))
        });
        let common = netdef.common_mut();
        common.meta.id = id.to_string();
        common.meta.placeholder = true;
        common.meta.backend = Some(Backend::NetworkManager);
        netdef
    }

    /// Member interfaces this netdef owns (bond, bridge and VRF).
    pub fn member_names(&self) -> Option<&[String]> {
        match self {
            Self::Bond(d) => d.interfaces.as_deref(),
            Self::Bridge(d) => d.interfaces.as_deref(),
            Self::Vrf(d) => d.interfaces.as_deref(),
            _ => None,
        }
    }

    /// The netdef referenced through a `link:` key (VLAN parent, VXLAN
    /// parent, SR-IOV physical function).
    pub fn link_name(&self) -> Option<&str> {
        match self {
            Self::Vlan(d) => d.link.as_deref(),
            Self::Tunnel(d) => d.link.as_deref(),
            Self::Ethernet(d) => d.link.as_deref(),
            _ => None,
        }
    }

    pub fn peer_name(&self) -> Option<&str> {
        match self {
            Self::Veth(d) => d.peer.as_deref(),
            Self::OvsPort(d) => d.peer.as_deref(),
            _ => None,
        }
    }

    pub fn backend(&self) -> Backend {
        self.common().meta.backend()
    }

    pub fn id(&self) -> &str {
        self.name()
    }
}

/// Typed schema of one YAML input file: `network:` with its sections.
/// Deserializing a file into this type is the per file grammar
/// validation pass. Netdef bodies are `Option` because an empty
/// definition may be written as a bare `eth0:` key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct NetworkDoc {
    pub network: NetworkSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct NetworkSection {
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<Renderer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernets: Option<IndexMap<String, Option<EthernetNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modems: Option<IndexMap<String, Option<ModemNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifis: Option<IndexMap<String, Option<WifiNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridges: Option<IndexMap<String, Option<BridgeNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonds: Option<IndexMap<String, Option<BondNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnels: Option<IndexMap<String, Option<TunnelNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlans: Option<IndexMap<String, Option<VlanNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrfs: Option<IndexMap<String, Option<VrfNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dummy_devices: Option<IndexMap<String, Option<DummyNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_ethernets: Option<IndexMap<String, Option<VethNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nm_devices: Option<IndexMap<String, Option<NmDeviceNetdef>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openvswitch: Option<OvsSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_round_trip_names() {
        for kind in DeviceKind::sections() {
            let section = kind.section().unwrap();
            assert_eq!(DeviceKind::from_section(section), Some(*kind));
        }
        assert_eq!(DeviceKind::from_section("bogus"), None);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let result: Result<NetworkDoc, _> = serde_yaml::from_str(
            "network: {version: 2, ethernet: {eth0: {}}}",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_nested_key_rejected() {
        let result: Result<NetworkDoc, _> = serde_yaml::from_str(
            "network: {version: 2, ethernets: {eth0: {nameservers: \
             {addressess: []}}}}",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_grammar_table() {
        assert!(DeviceKind::Ethernet.accepts_key("dhcp4"));
        assert!(DeviceKind::Ethernet.accepts_key("match"));
        assert!(!DeviceKind::Bridge.accepts_key("match"));
        assert!(DeviceKind::Bridge.accepts_key("interfaces"));
        assert!(!DeviceKind::Ethernet.accepts_key("dhcp5"));
        assert!(DeviceKind::Tunnel.accepts_key("key"));
        assert!(!DeviceKind::Dummy.accepts_key("peer"));
    }

    #[test]
    fn test_placeholder_netdef() {
        let netdef =
            NetDef::new_placeholder(DeviceKind::Ethernet, "eth0");
        assert!(netdef.common().meta.placeholder);
        assert_eq!(netdef.backend(), Backend::NetworkManager);
        assert_eq!(netdef.id(), "eth0");
    }
}
