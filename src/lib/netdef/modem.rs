// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError, netdef::common::CommonNetdef};

/// GSM/CDMA modem. Always rendered by the NetworkManager backend, which
/// hands the connection to ModemManager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct ModemNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apn: Option<String>,
    /// Let the modem decide APN, user and password from its SIM.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub auto_config: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_operator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ModemNetdef {
    /// GSM needs either auto-config or an APN; everything else is CDMA.
    pub fn is_gsm(&self) -> bool {
        self.auto_config == Some(true)
            || self.apn.is_some()
            || self.device_id.is_some()
            || self.network_id.is_some()
            || self.pin.is_some()
            || self.sim_id.is_some()
            || self.sim_operator_id.is_some()
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        if self.auto_config == Some(true)
            && (self.apn.is_some()
                || self.username.is_some()
                || self.password.is_some())
        {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "{id}: auto-config cannot be combined with apn, \
                     username or password"
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm_detection() {
        let modem: ModemNetdef =
            serde_yaml::from_str("{apn: internet}").unwrap();
        assert!(modem.is_gsm());
        let modem: ModemNetdef =
            serde_yaml::from_str("{number: '#777'}").unwrap();
        assert!(!modem.is_gsm());
    }

    #[test]
    fn test_auto_config_conflicts() {
        let mut modem: ModemNetdef = serde_yaml::from_str(
            "{auto-config: true, apn: internet}",
        )
        .unwrap();
        modem.common.meta.id = "wwan0".to_string();
        assert!(modem.validate().is_err());
    }
}
