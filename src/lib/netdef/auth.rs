// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NplanError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AuthKeyManagement {
    #[default]
    None,
    Psk,
    Eap,
    #[serde(rename = "eap-sha256")]
    EapSha256,
    #[serde(rename = "eap-suite-b-192")]
    EapSuiteB192,
    Sae,
    #[serde(rename = "802.1x")]
    Dot1x,
}

impl AuthKeyManagement {
    /// Protected management frames are implied by the key management
    /// choice: optional for SHA-256 EAP and required for SAE and
    /// WPA3-Enterprise.
    pub fn pmf_mode(&self) -> AuthPmfMode {
        match self {
            Self::EapSha256 => AuthPmfMode::Optional,
            Self::EapSuiteB192 | Self::Sae => AuthPmfMode::Required,
            _ => AuthPmfMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthPmfMode {
    Disabled,
    Optional,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AuthEapMethod {
    Tls,
    Peap,
    Ttls,
    Leap,
    Pwd,
}

/// 802.1x / WPA authentication parameters, used by ethernets, wifis and
/// wifi access points.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct AuthSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_management: Option<AuthKeyManagement>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "method")]
    pub eap_method: Option<AuthEapMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase2_auth: Option<String>,
}

impl AuthSettings {
    pub fn key_management(&self) -> AuthKeyManagement {
        self.key_management.unwrap_or_default()
    }

    pub fn uses_eap(&self) -> bool {
        matches!(
            self.key_management(),
            AuthKeyManagement::Eap
                | AuthKeyManagement::EapSha256
                | AuthKeyManagement::EapSuiteB192
                | AuthKeyManagement::Dot1x
        )
    }

    pub(crate) fn validate(&self, id: &str) -> Result<(), NplanError> {
        if self.eap_method.is_some() && !self.uses_eap() {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "{id}: EAP method requires an EAP key management \
                     mode"
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
    fn test_pmf_from_key_management() {
        assert_eq!(
            AuthKeyManagement::Sae.pmf_mode(),
            AuthPmfMode::Required
        );
        assert_eq!(
            AuthKeyManagement::EapSha256.pmf_mode(),
            AuthPmfMode::Optional
        );
        assert_eq!(
            AuthKeyManagement::Psk.pmf_mode(),
            AuthPmfMode::Disabled
        );
    }

    #[test]
    fn test_eap_method_needs_eap() {
        let auth: AuthSettings = serde_yaml::from_str(
            "{key-management: psk, method: peap}",
        )
        .unwrap();
        assert!(auth.validate("eth0").is_err());
    }

    #[test]
    fn test_key_management_802_1x() {
        let auth: AuthSettings =
            serde_yaml::from_str("{key-management: 802.1x}").unwrap();
        assert_eq!(
            auth.key_management(),
            AuthKeyManagement::Dot1x
        );
        assert!(auth.uses_eap());
    }
}
