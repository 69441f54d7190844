// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{
    AuthSettings, NplanError, netdef::common::CommonNetdef,
};

/// Ethernet device.
///
/// Example YAML input:
/// ```yml
/// ethernets:
///   eno1:
///     match:
///       macaddress: "00:11:22:33:44:55"
///     set-name: lan0
///     dhcp4: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct EthernetNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSettings>,
    /// For SR-IOV virtual functions: the physical function this VF is
    /// bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// For SR-IOV physical functions: number of virtual functions to
    /// allocate. When unset the count is inferred from the VFs that
    /// reference this device.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u16_or_string"
    )]
    pub virtual_function_count: Option<u16>,
}

impl EthernetNetdef {
    pub fn is_sriov_vf(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        if let Some(auth) = self.auth.as_ref() {
            auth.validate(self.common.meta.id.as_str())?;
        }
        Ok(())
    }
}

/// Dummy device, carrying nothing beyond the common configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct DummyNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
}

/// One side of a virtual ethernet pair. The peer relationship is
/// symmetric and verified during state validation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct VethNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}
