// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    AuthSettings, NetworkManagerSettings, NplanError,
    ip::validate_mac_address, netdef::common::CommonNetdef,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AccessPointMode {
    #[default]
    Infrastructure,
    Adhoc,
    Ap,
    /// Modes the model does not represent, e.g. mesh profiles imported
    /// from a keyfile.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WifiBand {
    #[serde(rename = "5GHz")]
    Band5GHz,
    #[serde(rename = "2.4GHz")]
    Band2_4GHz,
}

/// One access point of a wifi netdef, keyed by SSID in YAML:
/// ```yml
/// wifis:
///   wlan0:
///     access-points:
///       "Joe's Home":
///         password: "s3kr1t"
///       workplace:
///         auth:
///           key-management: eap
///           method: ttls
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct WifiAccessPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AccessPointMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<WifiBand>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub channel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub hidden: Option<bool>,
    /// Shorthand for WPA-PSK with this passphrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkmanager: Option<NetworkManagerSettings>,
}

impl WifiAccessPoint {
    pub fn mode(&self) -> AccessPointMode {
        self.mode.unwrap_or_default()
    }

    /// The effective auth block: an explicit `auth:` wins, a bare
    /// `password:` implies WPA-PSK.
    pub fn effective_auth(&self) -> Option<AuthSettings> {
        if let Some(auth) = self.auth.as_ref() {
            return Some(auth.clone());
        }
        self.password.as_ref().map(|password| AuthSettings {
            key_management: Some(crate::AuthKeyManagement::Psk),
            password: Some(password.clone()),
            ..Default::default()
        })
    }

    pub(crate) fn validate(
        &self,
        id: &str,
        ssid: &str,
    ) -> Result<(), NplanError> {
        if let Some(bssid) = self.bssid.as_deref() {
            validate_mac_address(bssid)?;
        }
        if let Some(auth) = self.auth.as_ref() {
            auth.validate(id)?;
        }
        if let Some(nm) = self.networkmanager.as_ref() {
            nm.validate(&format!("{id}:{ssid}"));
        }
        Ok(())
    }
}

/// Wake on wireless LAN trigger flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WakeOnWlanFlag {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "magic_pkt")]
    MagicPacket,
    #[serde(rename = "gtk_rekey_failure")]
    GtkRekeyFailure,
    #[serde(rename = "eap_identity_req")]
    EapIdentityRequest,
    #[serde(rename = "four_way_handshake")]
    FourWayHandshake,
    #[serde(rename = "rfkill_release")]
    RfkillRelease,
    #[serde(rename = "tcp")]
    Tcp,
}

/// Wifi device with its access points.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct WifiNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
    /// Keyed by SSID. A duplicated SSID within one file is a YAML
    /// duplicate mapping error; redefinition across files overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_points: Option<IndexMap<String, WifiAccessPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wakeonwlan: Option<Vec<WakeOnWlanFlag>>,
    /// Regulatory domain country code; the first netdef to set it wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulatory_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSettings>,
}

impl WifiNetdef {
    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        let id = self.common.meta.id.as_str();
        for (ssid, ap) in self.access_points.iter().flatten() {
            ap.validate(id, ssid)?;
        }
        if let Some(auth) = self.auth.as_ref() {
            auth.validate(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthKeyManagement;

    #[test]
    fn test_password_implies_psk() {
        let ap: WifiAccessPoint =
            serde_yaml::from_str("{password: hunter2}").unwrap();
        let auth = ap.effective_auth().unwrap();
        assert_eq!(auth.key_management, Some(AuthKeyManagement::Psk));
        assert_eq!(auth.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_explicit_auth_wins() {
        let ap: WifiAccessPoint = serde_yaml::from_str(
            "{password: hunter2, auth: {key-management: sae, password: \
             other}}",
        )
        .unwrap();
        let auth = ap.effective_auth().unwrap();
        assert_eq!(auth.key_management, Some(AuthKeyManagement::Sae));
        assert_eq!(auth.password.as_deref(), Some("other"));
    }

    #[test]
    fn test_band_spelling() {
        let ap: WifiAccessPoint =
            serde_yaml::from_str("{band: 5GHz}").unwrap();
        assert_eq!(ap.band, Some(WifiBand::Band5GHz));
        let ap: WifiAccessPoint =
            serde_yaml::from_str("{band: 2.4GHz}").unwrap();
        assert_eq!(ap.band, Some(WifiBand::Band2_4GHz));
    }

    #[test]
    fn test_duplicate_ssid_in_one_file_is_error() {
        let result: Result<WifiNetdef, _> = serde_yaml::from_str(
            "access-points:\n  office: {}\n  office: {hidden: true}\n",
        );
        assert!(result.is_err());
    }
}
