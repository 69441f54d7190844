// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    ErrorKind, NetworkManagerSettings, NplanError, OvsSettings, Route,
    RoutingPolicy,
    ip::{parse_ip_addr, validate_mac_address},
    netdef::address::AddressEntry,
};

/// Rendering backend requested in YAML. `sriov` is only valid on VLANs and
/// marks the VLAN as hardware offloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Renderer {
    #[serde(rename = "networkd")]
    Networkd,
    #[serde(rename = "NetworkManager")]
    NetworkManager,
    #[serde(rename = "sriov")]
    Sriov,
}

/// The backend a netdef is finally rendered by, after renderer inheritance
/// and implicit open-vswitch promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Backend {
    #[default]
    Networkd,
    NetworkManager,
    Ovs,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Networkd => write!(f, "networkd"),
            Self::NetworkManager => write!(f, "NetworkManager"),
            Self::Ovs => write!(f, "OpenVSwitch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ActivationMode {
    Manual,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Ipv6AddressGeneration {
    Eui64,
    StablePrivacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum LinkLocalFamily {
    Ipv4,
    Ipv6,
}

/// Address types an `optional: false` interface is allowed to still be
/// waiting for at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OptionalAddressType {
    #[serde(rename = "ipv4-ll")]
    Ipv4LinkLocal,
    #[serde(rename = "ipv6-ra")]
    Ipv6RouterAdvertisement,
    #[serde(rename = "dhcp4")]
    Dhcp4,
    #[serde(rename = "dhcp6")]
    Dhcp6,
    #[serde(rename = "static")]
    Static,
}

impl OptionalAddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4LinkLocal => "ipv4-ll",
            Self::Ipv6RouterAdvertisement => "ipv6-ra",
            Self::Dhcp4 => "dhcp4",
            Self::Dhcp6 => "dhcp6",
            Self::Static => "static",
        }
    }
}

/// Hardware match for physical devices. A physical netdef without a match
/// block matches on its ID as the interface name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct MatchConfig {
    /// Interface name, glob patterns supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    /// Kernel driver name globs, any of which must match. Accepts a single
    /// scalar or a sequence. Network daemon backend only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_string_or_seq"
    )]
    pub driver: Option<Vec<String>>,
}

impl MatchConfig {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.macaddress.is_none()
            && self.driver.is_none()
    }

    /// Whether the name match needs glob expansion.
    pub fn name_is_glob(&self) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.contains(['*', '?', '[', ']']))
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        if let Some(mac) = self.macaddress.as_deref() {
            validate_mac_address(mac)?;
        }
        Ok(())
    }
}

/// `use-domains` takes a boolean or the special value `route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UseDomains {
    Boolean(bool),
    Route,
}

impl Serialize for UseDomains {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::Route => serializer.serialize_str("route"),
        }
    }
}

impl<'de> Deserialize<'de> for UseDomains {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct UseDomainsVisitor;

        impl serde::de::Visitor<'_> for UseDomainsVisitor {
            type Value = UseDomains;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str("boolean or the string 'route'")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(UseDomains::Boolean(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value.to_lowercase().as_str() {
                    "route" => Ok(UseDomains::Route),
                    "1" | "true" | "yes" | "on" | "y" => {
                        Ok(UseDomains::Boolean(true))
                    }
                    "0" | "false" | "no" | "off" | "n" => {
                        Ok(UseDomains::Boolean(false))
                    }
                    _ => Err(serde::de::Error::custom(
                        "use-domains needs a boolean or 'route'",
                    )),
                }
            }
        }

        deserializer.deserialize_any(UseDomainsVisitor)
    }
}

/// Per DHCP family behavior overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct DhcpOverrides {
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub use_dns: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub use_ntp: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub send_hostname: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub use_hostname: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub use_mtu: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub use_routes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_domains: Option<UseDomains>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub route_metric: Option<u32>,
}

impl DhcpOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct Nameservers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
}

impl Nameservers {
    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        for addr in self.addresses.iter().flatten() {
            parse_ip_addr(addr)?;
        }
        Ok(())
    }
}

/// Runtime bookkeeping attached to every netdef. Never serialized: the
/// emitter reconstructs memberships from the owning side (`interfaces:`
/// lists, `link:` keys) on the next parse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct NetdefMeta {
    /// Unique netdef ID, the key of the YAML mapping entry.
    pub id: String,
    /// Last file to touch this netdef, used to partition re-emission.
    pub filepath: Option<PathBuf>,
    /// Resolved backend. `None` until state import.
    pub backend: Option<Backend>,
    /// Back-reference: the bond owning this interface.
    pub bond: Option<String>,
    /// Back-reference: the bridge owning this interface.
    pub bridge: Option<String>,
    /// Back-reference: the VRF owning this interface.
    pub vrf: Option<String>,
    /// This interface is the primary member of its bond.
    pub bond_primary: bool,
    /// STP path cost written by the owning bridge's parameter map.
    pub bridge_path_cost: Option<u32>,
    /// Port priority written by the owning bridge's parameter map.
    pub bridge_port_priority: Option<u8>,
    /// Some VLAN references this netdef as its link.
    pub has_vlans: bool,
    /// Some VXLAN tunnel references this netdef as its link.
    pub has_vxlans: bool,
    /// Stub synthesized for an unresolved reference that the
    /// NetworkManager backend does not require to exist.
    pub placeholder: bool,
    /// `renderer: sriov` on a VLAN: hardware VLAN filter, no rendering.
    pub sriov_vlan_filter: bool,
    /// Fields deleted by a programmatic modification; emitted as explicit
    /// null so a subsequent read round-trips.
    pub dirty: BTreeSet<String>,
}

impl NetdefMeta {
    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }
}

/// Configuration shared by every device type.
///
/// Physical-only keys (`match`, `set-name`, wake on LAN, offloads) also
/// live here since the YAML grammar puts them on the same nesting level;
/// [crate::NplanNetdef::validate_fields] rejects them on virtual kinds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct CommonNetdef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<Renderer>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub dhcp4: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub dhcp6: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp4_overrides: Option<DhcpOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp6_overrides: Option<DhcpOverrides>,
    /// `mac` or `duid`, the client identifier sent in DHCPv4 requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_identifier: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub accept_ra: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_address_generation: Option<Ipv6AddressGeneration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_address_token: Option<String>,
    /// Deprecated, use default routes instead. Accepted with a warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway4: Option<String>,
    /// Deprecated, use default routes instead. Accepted with a warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Nameservers>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub mtu: Option<u32>,
    /// Network daemon backend only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub ipv6_mtu: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub ipv6_privacy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_local: Option<Vec<LinkLocalFamily>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_addresses: Option<Vec<OptionalAddressType>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub critical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_mode: Option<ActivationMode>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub ignore_carrier: Option<bool>,
    /// MAC to set on the device. Also accepts `permanent`, `random`,
    /// `stable` and `preserve`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_policy: Option<Vec<RoutingPolicy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkmanager: Option<NetworkManagerSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openvswitch: Option<OvsSettings>,

    // Physical device keys, rejected on virtual kinds.
    #[serde(skip_serializing_if = "Option::is_none", rename = "match")]
    pub match_config: Option<MatchConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub wakeonlan: Option<bool>,
    /// Whether to emit LLDP packets. Network daemon backend only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub emit_lldp: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub receive_checksum_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub transmit_checksum_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub tcp_segmentation_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub tcp6_segmentation_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub generic_segmentation_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub generic_receive_offload: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub large_receive_offload: Option<bool>,

    #[serde(skip)]
    pub meta: NetdefMeta,
}

const SET_MAC_KEYWORDS: [&str; 4] =
    ["permanent", "random", "stable", "preserve"];

impl CommonNetdef {
    pub fn dhcp4(&self) -> bool {
        self.dhcp4 == Some(true)
    }

    pub fn dhcp6(&self) -> bool {
        self.dhcp6 == Some(true)
    }

    pub fn has_static_addresses(&self) -> bool {
        self.addresses.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// Name of any physical-only key in use, for rejection on virtual
    /// device kinds.
    pub(crate) fn physical_key_in_use(&self) -> Option<&'static str> {
        if self.match_config.is_some() {
            Some("match")
        } else if self.set_name.is_some() {
            Some("set-name")
        } else if self.wakeonlan.is_some() {
            Some("wakeonlan")
        } else if self.emit_lldp.is_some() {
            Some("emit-lldp")
        } else if self.receive_checksum_offload.is_some()
            || self.transmit_checksum_offload.is_some()
            || self.tcp_segmentation_offload.is_some()
            || self.tcp6_segmentation_offload.is_some()
            || self.generic_segmentation_offload.is_some()
            || self.generic_receive_offload.is_some()
            || self.large_receive_offload.is_some()
        {
            Some("offload")
        } else {
            None
        }
    }

    pub(crate) fn validate(&self, id: &str) -> Result<(), NplanError> {
        if let Some(match_config) = self.match_config.as_ref() {
            match_config.validate()?;
        }
        if let Some(nameservers) = self.nameservers.as_ref() {
            nameservers.validate()?;
        }
        for entry in self.addresses.iter().flatten() {
            entry.validate()?;
        }
        for gateway in [self.gateway4.as_deref(), self.gateway6.as_deref()]
            .into_iter()
            .flatten()
        {
            parse_ip_addr(gateway)?;
            log::warn!(
                "{id}: gateway4/gateway6 are deprecated, use default \
                 routes instead"
            );
        }
        for route in self.routes.iter().flatten() {
            route.validate(id)?;
        }
        for rule in self.routing_policy.iter().flatten() {
            rule.validate(id)?;
        }
        if let Some(mac) = self.macaddress.as_deref()
            && !SET_MAC_KEYWORDS.contains(&mac)
        {
            validate_mac_address(mac)?;
        }
        if let Some(identifier) = self.dhcp_identifier.as_deref()
            && identifier != "mac"
            && identifier != "duid"
        {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "{id}: dhcp-identifier must be 'mac' or 'duid', \
                     not '{identifier}'"
                ),
            ));
        }
        if self.ipv6_address_generation.is_some()
            && self.ipv6_address_token.is_some()
        {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "{id}: ipv6-address-generation and \
                     ipv6-address-token are mutually exclusive"
                ),
            ));
        }
        if let Some(nm) = self.networkmanager.as_ref() {
            nm.validate(id);
        }
        Ok(())
    }
}
