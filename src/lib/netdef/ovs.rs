// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError, netdef::common::CommonNetdef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum OvsLacp {
    Active,
    Passive,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum OvsFailMode {
    Secure,
    Standalone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OpenFlowProtocol {
    OpenFlow10,
    OpenFlow11,
    OpenFlow12,
    OpenFlow13,
    OpenFlow14,
    OpenFlow15,
    OpenFlow16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum OvsConnectionMode {
    InBand,
    OutOfBand,
}

/// External OpenFlow controller of an OVS bridge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct OvsController {
    /// Controller targets in ovs-vsctl(8) syntax, e.g.
    /// `tcp:127.0.0.1:6653` or `punix:/run/ovs.sock`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_mode: Option<OvsConnectionMode>,
}

/// SSL server endpoint options, global `openvswitch:` section only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct OvsSsl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl OvsSsl {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// OpenVSwitch settings, valid both per netdef and as the global
/// `network.openvswitch:` section. Anything beyond `external-ids` and
/// `other-config` promotes the owning netdef to the open-vswitch backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct OvsSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_config: Option<IndexMap<String, String>>,
    /// Bond interfaces only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp: Option<OvsLacp>,
    /// Bridge interfaces only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_mode: Option<OvsFailMode>,
    /// Bridge interfaces only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub mcast_snooping: Option<bool>,
    /// Bridge interfaces only.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub rstp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<OpenFlowProtocol>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OvsController>,
    /// Patch port pairs; global section only. Each pair creates two
    /// netdefs of the patch port kind referencing each other as peers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<Vec<String>>>,
    /// Global section only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<OvsSsl>,
}

impl OvsSettings {
    /// Whether these settings go beyond the external-ids/other-config
    /// pair that any backend can carry.
    pub fn is_nontrivial(&self) -> bool {
        self.lacp.is_some()
            || self.fail_mode.is_some()
            || self.mcast_snooping.is_some()
            || self.rstp.is_some()
            || self.protocols.is_some()
            || self.controller.is_some()
            || self.ports.is_some()
            || self.ssl.is_some()
    }

    pub(crate) fn validate(&self, id: &str) -> Result<(), NplanError> {
        for target in self
            .controller
            .iter()
            .flat_map(|c| c.addresses.iter().flatten())
        {
            validate_controller_target(id, target)?;
        }
        for pair in self.ports.iter().flatten() {
            if pair.len() != 2 {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: OVS patch ports must come in pairs, got \
                         {:?}",
                        pair
                    ),
                ));
            }
            if pair[0] == pair[1] {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: OVS patch port '{}' cannot peer itself",
                        pair[0]
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// OVS patch port created from a global `openvswitch.ports` pair. Not a
/// YAML section of its own; re-emitted through the global section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct OvsPortNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

/// Controller targets follow ovs-vsctl(8): active `tcp:`/`ssl:` targets
/// need a host and optional port, passive `ptcp:`/`pssl:` targets an
/// optional port and host, `unix:`/`punix:` targets a socket path.
fn validate_controller_target(
    id: &str,
    target: &str,
) -> Result<(), NplanError> {
    let err = || {
        NplanError::new(
            ErrorKind::SchemaError,
            format!("{id}: invalid OVS controller target '{target}'"),
        )
    };
    let Some((proto, rest)) = target.split_once(':') else {
        return Err(err());
    };
    match proto {
        "unix" | "punix" => {
            if rest.is_empty() {
                return Err(err());
            }
        }
        "tcp" | "ssl" => {
            // host[:port], IPv6 hosts in brackets
            if rest.is_empty() {
                return Err(err());
            }
        }
        "ptcp" | "pssl" => {
            // [port][:host]
            let port = rest.split(':').next().unwrap_or_default();
            if !port.is_empty() && port.parse::<u16>().is_err() {
                return Err(err());
            }
        }
        _ => return Err(err()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_targets() {
        for target in [
            "tcp:127.0.0.1:6653",
            "ssl:[fe80::1234]:6653",
            "ptcp:6653:10.0.0.1",
            "ptcp:",
            "unix:/run/openvswitch/ctl.sock",
            "punix:/run/ovs.sock",
        ] {
            assert!(
                validate_controller_target("br0", target).is_ok(),
                "{target} should be accepted"
            );
        }
        for target in ["http:10.0.0.1", "tcp:", "ptcp:abc", "nonsense"] {
            assert!(
                validate_controller_target("br0", target).is_err(),
                "{target} should be rejected"
            );
        }
    }

    #[test]
    fn test_nontrivial_promotion_boundary() {
        let trivial: OvsSettings = serde_yaml::from_str(
            "{external-ids: {iface-id: eth0}}",
        )
        .unwrap();
        assert!(!trivial.is_nontrivial());
        let nontrivial: OvsSettings =
            serde_yaml::from_str("{lacp: active}").unwrap();
        assert!(nontrivial.is_nontrivial());
    }

    #[test]
    fn test_patch_port_pairs() {
        let settings: OvsSettings = serde_yaml::from_str(
            "{ports: [[patch-a, patch-b]]}",
        )
        .unwrap();
        assert!(settings.validate("global").is_ok());
        let settings: OvsSettings =
            serde_yaml::from_str("{ports: [[patch-a]]}").unwrap();
        assert!(settings.validate("global").is_err());
        let settings: OvsSettings = serde_yaml::from_str(
            "{ports: [[patch-a, patch-a]]}",
        )
        .unwrap();
        assert!(settings.validate("global").is_err());
    }
}
