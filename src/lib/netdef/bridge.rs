// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError, netdef::common::CommonNetdef};

/// Bridge interface.
///
/// The per member `path-cost` and `port-priority` maps are written into
/// the referenced member netdefs during reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct BridgeNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BridgeParameters>,
}

impl BridgeNetdef {
    /// STP defaults to on once any bridge parameters are present.
    pub fn stp(&self) -> bool {
        self.parameters
            .as_ref()
            .map(|p| p.stp.unwrap_or(true))
            .unwrap_or(false)
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        if let Some(params) = self.parameters.as_ref() {
            for member in params
                .path_cost
                .iter()
                .flat_map(|m| m.keys())
                .chain(params.port_priority.iter().flat_map(|m| m.keys()))
            {
                if !self
                    .interfaces
                    .iter()
                    .flatten()
                    .any(|iface| iface == member)
                {
                    return Err(NplanError::new(
                        ErrorKind::SchemaError,
                        format!(
                            "{id}: bridge parameter references \
                             '{member}' which is not in the interfaces \
                             list"
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct BridgeParameters {
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub ageing_time: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub forward_delay: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub hello_time: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub max_age: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u16_or_string"
    )]
    pub priority: Option<u16>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub stp: Option<bool>,
    /// Per member STP path cost, keyed by member netdef ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_cost: Option<IndexMap<String, u32>>,
    /// Per member port priority, keyed by member netdef ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_priority: Option<IndexMap<String, u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stp_defaults_on_with_parameters() {
        let bridge: BridgeNetdef =
            serde_yaml::from_str("{parameters: {forward-delay: 4}}")
                .unwrap();
        assert!(bridge.stp());
        let bridge: BridgeNetdef = serde_yaml::from_str("{}").unwrap();
        assert!(!bridge.stp());
        let bridge: BridgeNetdef =
            serde_yaml::from_str("{parameters: {stp: false}}").unwrap();
        assert!(!bridge.stp());
    }

    #[test]
    fn test_path_cost_member_must_exist() {
        let mut bridge: BridgeNetdef = serde_yaml::from_str(
            "{interfaces: [eth0], parameters: {path-cost: {eth9: 50}}}",
        )
        .unwrap();
        bridge.common.meta.id = "br0".to_string();
        assert!(bridge.validate().is_err());
    }
}
