// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::netdef::common::CommonNetdef;

/// NetworkManager specific settings attached to a netdef or wifi access
/// point. The `passthrough` map is the escape hatch for keyfile settings
/// the model does not represent: ordered `group.key` entries written
/// verbatim after the structured rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct NetworkManagerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passthrough: Option<IndexMap<String, String>>,
}

impl NetworkManagerSettings {
    /// Iterate passthrough entries whose key has the mandatory
    /// `group.key` shape, split into (group, key, value).
    pub fn valid_passthrough(
        &self,
    ) -> impl Iterator<Item = (&str, &str, &str)> {
        self.passthrough.iter().flat_map(|map| {
            map.iter().filter_map(|(key, value)| {
                key.split_once('.')
                    .map(|(group, key)| (group, key, value.as_str()))
            })
        })
    }

    /// Malformed passthrough keys are dropped at rendering time; warn
    /// about them once during validation.
    pub(crate) fn validate(&self, id: &str) {
        for key in self
            .passthrough
            .iter()
            .flat_map(|map| map.keys())
            .filter(|key| !key.contains('.'))
        {
            log::warn!(
                "{id}: ignoring invalid passthrough key '{key}', \
                 expected 'group.key' syntax"
            );
        }
    }
}

/// Netdef for a connection profile the model does not represent
/// structurally. Only emitted by the NetworkManager renderer, driven by
/// the passthrough map; typically created by the keyfile importer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct NmDeviceNetdef {
    #[serde(flatten)]
    pub common: CommonNetdef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_key_shape() {
        let nm: NetworkManagerSettings = serde_yaml::from_str(
            "{passthrough: {'connection.permissions': 'user:x:', \
             'bogus': '1'}}",
        )
        .unwrap();
        let valid: Vec<_> = nm.valid_passthrough().collect();
        assert_eq!(
            valid,
            vec![("connection", "permissions", "user:x:")]
        );
    }

    #[test]
    fn test_passthrough_preserves_order() {
        let nm: NetworkManagerSettings = serde_yaml::from_str(
            "{passthrough: {'b.b': '1', 'a.a': '2', 'c.c': '3'}}",
        )
        .unwrap();
        let groups: Vec<_> =
            nm.valid_passthrough().map(|(g, _, _)| g).collect();
        assert_eq!(groups, vec!["b", "a", "c"]);
    }
}
