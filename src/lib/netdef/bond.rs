// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{
    ErrorKind, NplanError, ip::parse_ip_addr,
    netdef::common::CommonNetdef,
};

/// Bond interface.
///
/// Example YAML input:
/// ```yml
/// bonds:
///   bond0:
///     interfaces: [eth0, eth1]
///     parameters:
///       mode: active-backup
///       primary: eth0
///       mii-monitor-interval: 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct BondNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BondParameters>,
}

impl BondNetdef {
    pub fn mode(&self) -> Option<BondMode> {
        self.parameters.as_ref().and_then(|p| p.mode)
    }

    pub fn primary_member(&self) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.primary.as_deref())
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        if let Some(params) = self.parameters.as_ref() {
            for target in params.arp_ip_targets.iter().flatten() {
                parse_ip_addr(target)?;
            }
            if params.arp_ip_targets.is_some()
                && params.arp_interval.unwrap_or(0) == 0
            {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: arp-ip-targets requires a non-zero \
                         arp-interval"
                    ),
                ));
            }
            if let Some(primary) = params.primary.as_deref()
                && !self
                    .interfaces
                    .iter()
                    .flatten()
                    .any(|member| member == primary)
            {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "{id}: primary member '{primary}' is not part \
                         of the interfaces list"
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct BondParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BondMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp_rate: Option<BondLacpRate>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub mii_monitor_interval: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub min_links: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmit_hash_policy: Option<BondTransmitHashPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_select: Option<BondAdSelect>,
    /// Deserialize from `all-members-active` or the historical
    /// `all-slaves-active`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string",
        alias = "all-slaves-active"
    )]
    pub all_members_active: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub arp_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_ip_targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_validate: Option<BondArpValidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_all_targets: Option<BondArpAllTargets>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub up_delay: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub down_delay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_over_mac_policy: Option<BondFailOverMacPolicy>,
    /// Deserialize from `gratuitous-arp` or the misspelled
    /// `gratuitious-arp` accepted by historical configurations.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string",
        alias = "gratuitious-arp"
    )]
    pub gratuitous_arp: Option<u32>,
    /// Deserialize from `packets-per-member` or the historical
    /// `packets-per-slave`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string",
        alias = "packets-per-slave"
    )]
    pub packets_per_member: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_reselect_policy: Option<BondPrimaryReselectPolicy>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub resend_igmp: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub learn_packet_interval: Option<u32>,
    /// The primary member interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
}

/// Bond mode. `balance-tcp` and `balance-slb` only exist on OpenVSwitch
/// and implicitly select the open-vswitch backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[non_exhaustive]
pub enum BondMode {
    #[serde(rename = "balance-rr")]
    #[default]
    BalanceRoundRobin,
    #[serde(rename = "active-backup")]
    ActiveBackup,
    #[serde(rename = "balance-xor")]
    BalanceXor,
    #[serde(rename = "broadcast")]
    Broadcast,
    #[serde(rename = "802.3ad")]
    Lacp,
    #[serde(rename = "balance-tlb")]
    BalanceTlb,
    #[serde(rename = "balance-alb")]
    BalanceAlb,
    #[serde(rename = "balance-tcp")]
    BalanceTcp,
    #[serde(rename = "balance-slb")]
    BalanceSlb,
}

impl BondMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BalanceRoundRobin => "balance-rr",
            Self::ActiveBackup => "active-backup",
            Self::BalanceXor => "balance-xor",
            Self::Broadcast => "broadcast",
            Self::Lacp => "802.3ad",
            Self::BalanceTlb => "balance-tlb",
            Self::BalanceAlb => "balance-alb",
            Self::BalanceTcp => "balance-tcp",
            Self::BalanceSlb => "balance-slb",
        }
    }

    pub fn is_ovs_only(&self) -> bool {
        matches!(self, Self::BalanceTcp | Self::BalanceSlb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondLacpRate {
    Slow,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BondTransmitHashPolicy {
    #[serde(rename = "layer2")]
    Layer2,
    #[serde(rename = "layer3+4")]
    Layer34,
    #[serde(rename = "layer2+3")]
    Layer23,
    #[serde(rename = "encap2+3")]
    Encap23,
    #[serde(rename = "encap3+4")]
    Encap34,
}

impl BondTransmitHashPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layer2 => "layer2",
            Self::Layer34 => "layer3+4",
            Self::Layer23 => "layer2+3",
            Self::Encap23 => "encap2+3",
            Self::Encap34 => "encap3+4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondAdSelect {
    Stable,
    Bandwidth,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondArpValidate {
    None,
    Active,
    Backup,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondArpAllTargets {
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondFailOverMacPolicy {
    None,
    Active,
    Follow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BondPrimaryReselectPolicy {
    Always,
    Better,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ovs_only_modes() {
        assert!(BondMode::BalanceTcp.is_ovs_only());
        assert!(BondMode::BalanceSlb.is_ovs_only());
        assert!(!BondMode::ActiveBackup.is_ovs_only());
    }

    #[test]
    fn test_mode_802_3ad_spelling() {
        let params: BondParameters =
            serde_yaml::from_str("{mode: 802.3ad}").unwrap();
        assert_eq!(params.mode, Some(BondMode::Lacp));
    }

    #[test]
    fn test_member_alias_spellings() {
        let params: BondParameters = serde_yaml::from_str(
            "{all-slaves-active: true, packets-per-slave: 2, \
             gratuitious-arp: 3}",
        )
        .unwrap();
        assert_eq!(params.all_members_active, Some(true));
        assert_eq!(params.packets_per_member, Some(2));
        assert_eq!(params.gratuitous_arp, Some(3));
    }

    #[test]
    fn test_primary_must_be_member() {
        let mut bond: BondNetdef = serde_yaml::from_str(
            "{interfaces: [eth0, eth1], parameters: {mode: \
             active-backup, primary: eth2}}",
        )
        .unwrap();
        bond.common.meta.id = "bond0".to_string();
        assert!(bond.validate().is_err());
    }

    #[test]
    fn test_arp_targets_need_interval() {
        let mut bond: BondNetdef = serde_yaml::from_str(
            "{parameters: {mode: active-backup, arp-ip-targets: \
             [10.0.0.1]}}",
        )
        .unwrap();
        bond.common.meta.id = "bond0".to_string();
        assert!(bond.validate().is_err());
    }
}
