// SPDX-License-Identifier: Apache-2.0

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, MapAccess, Visitor},
};

use crate::{
    ErrorKind, NplanError,
    ip::{is_ipv6_addr, parse_ip_addr, parse_route_dest},
    netdef::common::CommonNetdef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum TunnelMode {
    Ipip,
    Gre,
    Sit,
    Isatap,
    Vti,
    Vti6,
    Ip6ip6,
    Ipip6,
    Ip6gre,
    Ip6gretap,
    Gretap,
    Vxlan,
    Wireguard,
}

impl TunnelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipip => "ipip",
            Self::Gre => "gre",
            Self::Sit => "sit",
            Self::Isatap => "isatap",
            Self::Vti => "vti",
            Self::Vti6 => "vti6",
            Self::Ip6ip6 => "ip6ip6",
            Self::Ipip6 => "ipip6",
            Self::Ip6gre => "ip6gre",
            Self::Ip6gretap => "ip6gretap",
            Self::Gretap => "gretap",
            Self::Vxlan => "vxlan",
            Self::Wireguard => "wireguard",
        }
    }

    /// Whether the outer header of this mode is IPv6.
    pub fn is_ipv6_carrier(&self) -> bool {
        matches!(
            self,
            Self::Vti6
                | Self::Ip6ip6
                | Self::Ipip6
                | Self::Ip6gre
                | Self::Ip6gretap
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum KeyFlag {
    AgentOwned,
    NotSaved,
    NotRequired,
}

/// Tunnel keys. In YAML this is either a single scalar setting both the
/// input and output key, or a mapping:
/// ```yml
/// keys:
///   input: 1234
///   output: 5678
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct TunnelKeys {
    pub input: Option<String>,
    pub output: Option<String>,
    /// WireGuard private key, base64 or an absolute path to a key file.
    pub private: Option<String>,
    pub private_key_flags: Option<Vec<KeyFlag>>,
}

impl Serialize for TunnelKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        if let (Some(input), Some(output), None, None) = (
            self.input.as_ref(),
            self.output.as_ref(),
            self.private.as_ref(),
            self.private_key_flags.as_ref(),
        ) && input == output
        {
            return serializer.serialize_str(input);
        }
        let mut map = serializer.serialize_map(None)?;
        if let Some(v) = self.input.as_ref() {
            map.serialize_entry("input", v)?;
        }
        if let Some(v) = self.output.as_ref() {
            map.serialize_entry("output", v)?;
        }
        if let Some(v) = self.private.as_ref() {
            map.serialize_entry("private", v)?;
        }
        if let Some(v) = self.private_key_flags.as_ref() {
            map.serialize_entry("private-key-flags", v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TunnelKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = TunnelKeys;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter
                    .write_str("scalar key or input/output/private mapping")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(TunnelKeys {
                    input: Some(value.to_string()),
                    output: Some(value.to_string()),
                    ..Default::default()
                })
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut ret = TunnelKeys::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "input" => {
                            ret.input = Some(map.next_value::<String>()?)
                        }
                        "output" => {
                            ret.output = Some(map.next_value::<String>()?)
                        }
                        "private" => {
                            ret.private = Some(map.next_value::<String>()?)
                        }
                        "private-key-flags" => {
                            ret.private_key_flags =
                                Some(map.next_value::<Vec<KeyFlag>>()?)
                        }
                        _ => {
                            return Err(de::Error::unknown_field(
                                &key,
                                &[
                                    "input",
                                    "output",
                                    "private",
                                    "private-key-flags",
                                ],
                            ));
                        }
                    }
                }
                Ok(ret)
            }
        }

        deserializer.deserialize_any(KeysVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct WireguardPeerKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    /// Pre-shared key, base64 or an absolute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct WireguardPeer {
    /// `host:port`, `[v6]:port` or a bare address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<WireguardPeerKeys>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub keepalive: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VxlanNotification {
    #[serde(rename = "l2-miss")]
    L2Miss,
    #[serde(rename = "l3-miss")]
    L3Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum VxlanChecksum {
    Udp,
    ZeroUdp6Tx,
    ZeroUdp6Rx,
    RemoteTx,
    RemoteRx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum VxlanExtension {
    GroupBasedPolicy,
    GenericProtocolExtension,
}

/// Tunnel device: plain IP tunnels, WireGuard and VXLAN.
///
/// Example YAML input:
/// ```yml
/// tunnels:
///   vx0:
///     mode: vxlan
///     id: 1000
///     link: eth0
///     remote: 224.0.0.5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct TunnelNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TunnelMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u8_or_string"
    )]
    pub ttl: Option<u8>,
    /// Accepts the singular `key:` scalar shorthand as well.
    #[serde(skip_serializing_if = "Option::is_none", alias = "key")]
    pub keys: Option<TunnelKeys>,
    /// Firewall mark. WireGuard and VTI modes.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub mark: Option<u32>,
    /// Listen port for WireGuard, destination port for VXLAN.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u16_or_string"
    )]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<WireguardPeer>>,

    // VXLAN settings.
    /// VXLAN network identifier.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub id: Option<u32>,
    /// Parent netdef carrying this VXLAN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub ageing: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub limit: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u8_or_string"
    )]
    pub type_of_service: Option<u8>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub flow_label: Option<u32>,
    /// UDP source port range, `[min, max]`. An inverted pair is swapped
    /// with a warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<Vec<u16>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub do_not_fragment: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub short_circuit: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub arp_proxy: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub mac_learning: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub neigh_suppress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<VxlanNotification>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksums: Option<Vec<VxlanChecksum>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<VxlanExtension>>,
}

const VXLAN_VNI_MAX: u32 = (1 << 24) - 1;

impl TunnelNetdef {
    pub fn is_wireguard(&self) -> bool {
        self.mode == Some(TunnelMode::Wireguard)
    }

    pub fn is_vxlan(&self) -> bool {
        self.mode == Some(TunnelMode::Vxlan)
    }

    /// Source port range with an inverted pair swapped into order.
    pub fn normalized_port_range(&self) -> Option<(u16, u16)> {
        let range = self.port_range.as_ref()?;
        if range.len() != 2 {
            return None;
        }
        Some((range[0].min(range[1]), range[0].max(range[1])))
    }

    pub(crate) fn validate(&mut self) -> Result<(), NplanError> {
        let id = self.common.meta.id.clone();
        let Some(mode) = self.mode else {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!("{id}: tunnel mode is mandatory"),
            ));
        };
        for addr in [self.local.as_deref(), self.remote.as_deref()]
            .into_iter()
            .flatten()
        {
            // VXLAN accepts multicast groups, plain parse is enough.
            parse_ip_addr(addr)?;
            if mode.is_ipv6_carrier() && !is_ipv6_addr(addr) {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: {mode} tunnel endpoints must be IPv6",
                        mode = mode.as_str()
                    ),
                ));
            }
        }
        match mode {
            TunnelMode::Wireguard => {
                if self
                    .keys
                    .as_ref()
                    .and_then(|k| k.private.as_ref())
                    .is_none()
                {
                    return Err(NplanError::new(
                        ErrorKind::SchemaError,
                        format!(
                            "{id}: WireGuard tunnel needs a private key"
                        ),
                    ));
                }
                for peer in self.peers.iter().flatten() {
                    if peer
                        .keys
                        .as_ref()
                        .and_then(|k| k.public.as_ref())
                        .is_none()
                    {
                        return Err(NplanError::new(
                            ErrorKind::SchemaError,
                            format!(
                                "{id}: WireGuard peer needs a public key"
                            ),
                        ));
                    }
                    for allowed in peer.allowed_ips.iter().flatten() {
                        parse_route_dest(allowed)?;
                    }
                }
            }
            TunnelMode::Vxlan => {
                match self.id {
                    Some(vni) if vni <= VXLAN_VNI_MAX => (),
                    Some(vni) => {
                        return Err(NplanError::new(
                            ErrorKind::SchemaError,
                            format!(
                                "{id}: VXLAN ID {vni} exceeds the 24 \
                                 bit VNI space"
                            ),
                        ));
                    }
                    None => {
                        return Err(NplanError::new(
                            ErrorKind::SchemaError,
                            format!("{id}: VXLAN needs an id"),
                        ));
                    }
                }
                if let Some(range) = self.port_range.as_mut() {
                    if range.len() != 2 {
                        return Err(NplanError::new(
                            ErrorKind::SchemaError,
                            format!(
                                "{id}: port-range must hold exactly two \
                                 ports"
                            ),
                        ));
                    }
                    if range[0] > range[1] {
                        log::warn!(
                            "{id}: swapping inverted port-range \
                             [{}, {}]",
                            range[0],
                            range[1]
                        );
                        range.swap(0, 1);
                    }
                }
            }
            _ => {
                if self.remote.is_none() {
                    return Err(NplanError::new(
                        ErrorKind::SchemaError,
                        format!(
                            "{id}: {} tunnel needs a remote endpoint",
                            mode.as_str()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel(yaml: &str) -> TunnelNetdef {
        let mut tunnel: TunnelNetdef =
            serde_yaml::from_str(yaml).unwrap();
        tunnel.common.meta.id = "tun0".to_string();
        tunnel
    }

    #[test]
    fn test_scalar_key_sets_both() {
        let tunnel = tunnel(
            "{mode: gre, remote: 203.0.113.1, local: 192.0.2.2, key: \
             1234}",
        );
        let keys = tunnel.keys.unwrap();
        assert_eq!(keys.input.as_deref(), Some("1234"));
        assert_eq!(keys.output.as_deref(), Some("1234"));
    }

    #[test]
    fn test_mode_is_mandatory() {
        let mut t = tunnel("{remote: 203.0.113.1}");
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_vxlan_needs_id() {
        let mut t = tunnel("{mode: vxlan, remote: 224.0.0.5}");
        assert!(t.validate().is_err());
        let mut t = tunnel("{mode: vxlan, id: 16777216}");
        assert!(t.validate().is_err());
        let mut t = tunnel("{mode: vxlan, id: 1000}");
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_inverted_port_range_swapped() {
        let mut t = tunnel(
            "{mode: vxlan, id: 10, port-range: [6000, 5000]}",
        );
        t.validate().unwrap();
        assert_eq!(t.normalized_port_range(), Some((5000, 6000)));
        assert_eq!(t.port_range.as_deref(), Some(&[5000, 6000][..]));
    }

    #[test]
    fn test_wireguard_needs_keys() {
        let mut t = tunnel("{mode: wireguard}");
        assert!(t.validate().is_err());
        let mut t = tunnel(
            "{mode: wireguard, keys: {private: \
             4GgaQCy68nzNsUE5aJ9fuLzHhB65tAlwbmA72MWnOm8=}, peers: \
             [{keys: {public: \
             M9nt4YujIOmNrRmpIRTmYSfMdrpvE7u6WkG8FY8WjG4=}, allowed-ips: \
             [0.0.0.0/0]}]}",
        );
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_ipv6_carrier_endpoint_family() {
        let mut t =
            tunnel("{mode: ip6gre, remote: 203.0.113.1}");
        assert!(t.validate().is_err());
        let mut t =
            tunnel("{mode: ip6gre, remote: '2001:db8::1'}");
        assert!(t.validate().is_ok());
    }
}
