// SPDX-License-Identifier: Apache-2.0

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};

use crate::{NplanError, ip::parse_addr_prefix};

/// Address lifetime, `forever` or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AddressLifetime {
    Forever,
    Zero,
}

impl Serialize for AddressLifetime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Forever => serializer.serialize_str("forever"),
            Self::Zero => serializer.serialize_u64(0),
        }
    }
}

impl<'de> Deserialize<'de> for AddressLifetime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LifetimeVisitor;

        impl Visitor<'_> for LifetimeVisitor {
            type Value = AddressLifetime;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str("'forever' or 0")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                match value {
                    "forever" => Ok(AddressLifetime::Forever),
                    "0" => Ok(AddressLifetime::Zero),
                    _ => Err(de::Error::custom(
                        "lifetime needs to be 'forever' or 0",
                    )),
                }
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value == 0 {
                    Ok(AddressLifetime::Zero)
                } else {
                    Err(de::Error::custom(
                        "lifetime needs to be 'forever' or 0",
                    ))
                }
            }
        }

        deserializer.deserialize_any(LifetimeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct AddressOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<AddressLifetime>,
}

impl AddressOptions {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.lifetime.is_none()
    }
}

/// One entry of a netdef's `addresses:` sequence. Either a plain
/// `address/prefix` scalar or a single entry mapping carrying per address
/// options:
/// ```yml
/// addresses:
/// - 192.0.2.5/24
/// - 2001:db8::10/64:
///     label: maas
///     lifetime: forever
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct AddressEntry {
    /// `address/prefix` as written in YAML.
    pub address: String,
    pub options: AddressOptions,
}

impl AddressEntry {
    pub fn new(address: String) -> Self {
        Self {
            address,
            options: AddressOptions::default(),
        }
    }

    pub fn is_ipv6(&self) -> bool {
        crate::ip::is_ipv6_addr(&self.address)
    }

    pub(crate) fn validate(&self) -> Result<(), NplanError> {
        parse_addr_prefix(&self.address)?;
        Ok(())
    }
}

impl Serialize for AddressEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.options.is_empty() {
            serializer.serialize_str(&self.address)
        } else {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(&self.address, &self.options)?;
            map.end()
        }
    }
}

impl<'de> Deserialize<'de> for AddressEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AddressEntryVisitor;

        impl<'de> Visitor<'de> for AddressEntryVisitor {
            type Value = AddressEntry;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "'address/prefix' string or single entry mapping \
                     with address options",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(AddressEntry::new(value.to_string()))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let Some((address, options)) =
                    map.next_entry::<String, AddressOptions>()?
                else {
                    return Err(de::Error::custom(
                        "empty address options mapping",
                    ));
                };
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom(
                        "address options mapping must hold a single \
                         address",
                    ));
                }
                Ok(AddressEntry { address, options })
            }
        }

        deserializer.deserialize_any(AddressEntryVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_address() {
        let entry: AddressEntry =
            serde_yaml::from_str("192.0.2.5/24").unwrap();
        assert_eq!(entry.address, "192.0.2.5/24");
        assert!(entry.options.is_empty());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_address_with_options() {
        let entry: AddressEntry = serde_yaml::from_str(
            "{'2001:db8::10/64': {label: maas, lifetime: forever}}",
        )
        .unwrap();
        assert_eq!(entry.address, "2001:db8::10/64");
        assert_eq!(entry.options.label.as_deref(), Some("maas"));
        assert_eq!(
            entry.options.lifetime,
            Some(AddressLifetime::Forever)
        );
    }

    #[test]
    fn test_address_round_trip() {
        let entry: AddressEntry = serde_yaml::from_str(
            "{'192.0.2.5/24': {lifetime: 0}}",
        )
        .unwrap();
        let yaml = serde_yaml::to_string(&entry).unwrap();
        let again: AddressEntry = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(entry, again);
    }

    #[test]
    fn test_scalar_serializes_plain() {
        let entry = AddressEntry::new("192.0.2.5/24".to_string());
        let yaml = serde_yaml::to_string(&entry).unwrap();
        assert_eq!(yaml.trim(), "192.0.2.5/24");
    }
}
