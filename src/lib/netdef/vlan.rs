// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError, netdef::common::CommonNetdef};

const VLAN_ID_MAX: u16 = 4094;

/// VLAN on top of another netdef.
///
/// `renderer: sriov` marks the VLAN as a hardware VLAN filter on an
/// SR-IOV virtual function; no backend files are written for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct VlanNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u16_or_string"
    )]
    pub id: Option<u16>,
    /// The parent netdef.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl VlanNetdef {
    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        match self.id {
            Some(vlan_id) if vlan_id > VLAN_ID_MAX => {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: VLAN id {vlan_id} exceeds the maximum of \
                         {VLAN_ID_MAX}"
                    ),
                ));
            }
            None => {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!("{id}: VLAN id is mandatory"),
                ));
            }
            _ => (),
        }
        if self.link.is_none() {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!("{id}: VLAN link is mandatory"),
            ));
        }
        Ok(())
    }
}

/// Virtual routing and forwarding domain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct VrfNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub table: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
}

impl VrfNetdef {
    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        let Some(table) = self.table else {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!("{id}: VRF table is mandatory"),
            ));
        };
        // Routes and rules inside a VRF must stay in its table.
        for route in self.common.routes.iter().flatten() {
            if route.table.is_some_and(|t| t != table) {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "{id}: route table {} does not match VRF table \
                         {table}",
                        route.table.unwrap_or_default()
                    ),
                ));
            }
        }
        for rule in self.common.routing_policy.iter().flatten() {
            if rule.table.is_some_and(|t| t != table) {
                return Err(NplanError::new(
                    ErrorKind::ConsistencyError,
                    format!(
                        "{id}: routing policy table {} does not match \
                         VRF table {table}",
                        rule.table.unwrap_or_default()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlan_id_bounds() {
        let mut vlan: VlanNetdef =
            serde_yaml::from_str("{id: 4095, link: eth0}").unwrap();
        vlan.common.meta.id = "vlan0".to_string();
        assert!(vlan.validate().is_err());
        let mut vlan: VlanNetdef =
            serde_yaml::from_str("{id: 4094, link: eth0}").unwrap();
        vlan.common.meta.id = "vlan0".to_string();
        assert!(vlan.validate().is_ok());
    }

    #[test]
    fn test_vlan_link_mandatory() {
        let mut vlan: VlanNetdef =
            serde_yaml::from_str("{id: 10}").unwrap();
        vlan.common.meta.id = "vlan10".to_string();
        assert!(vlan.validate().is_err());
    }

    #[test]
    fn test_vrf_route_table_must_match() {
        let mut vrf: VrfNetdef = serde_yaml::from_str(
            "{table: 1000, routes: [{to: default, via: 10.0.0.1, \
             table: 1001}]}",
        )
        .unwrap();
        vrf.common.meta.id = "vrf0".to_string();
        assert!(vrf.validate().is_err());
    }
}
