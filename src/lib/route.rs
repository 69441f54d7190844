// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{
    ErrorKind, NplanError,
    ip::{AddressFamily, is_ipv6_addr, parse_ip_addr, parse_route_dest},
};

/// The kernel main routing table.
pub(crate) const DEFAULT_ROUTE_TABLE: u32 = 254;
pub(crate) const DEFAULT_ROUTE_METRIC: u32 = 100;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RouteType {
    #[default]
    Unicast,
    Anycast,
    Blackhole,
    Broadcast,
    Local,
    Multicast,
    Nat,
    Prohibit,
    Throw,
    Unreachable,
    Xresolve,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unicast => "unicast",
            Self::Anycast => "anycast",
            Self::Blackhole => "blackhole",
            Self::Broadcast => "broadcast",
            Self::Local => "local",
            Self::Multicast => "multicast",
            Self::Nat => "nat",
            Self::Prohibit => "prohibit",
            Self::Throw => "throw",
            Self::Unreachable => "unreachable",
            Self::Xresolve => "xresolve",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RouteScope {
    #[default]
    Global,
    Link,
    Host,
}

impl RouteScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Link => "link",
            Self::Host => "host",
        }
    }
}

/// Static route attached to a netdef.
///
/// Example YAML input:
/// ```yml
/// routes:
/// - to: default
///   via: 192.0.2.1
///   metric: 100
/// - to: 10.0.0.0/8
///   via: 192.0.2.254
///   table: 76
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct Route {
    /// Destination network or the special value `default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    /// Source address selection hint. Network daemon backend only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "type",
        default
    )]
    pub route_type: Option<RouteType>,
    /// Derived from the route type and `via` when not set explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<RouteScope>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub metric: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub table: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub mtu: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub congestion_window: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub advertised_receive_window: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_bool_or_string"
    )]
    pub on_link: Option<bool>,
}

impl Route {
    pub fn is_default(&self) -> bool {
        matches!(
            self.to.as_deref(),
            Some("default") | Some("0.0.0.0/0") | Some("::/0")
        )
    }

    pub fn route_type(&self) -> RouteType {
        self.route_type.unwrap_or_default()
    }

    /// Address family of this route, detected from its addresses. `None`
    /// when only `to: default` is given and no other address is present.
    pub fn family(&self) -> Option<AddressFamily> {
        for addr in [self.via.as_deref(), self.from.as_deref()]
            .into_iter()
            .flatten()
        {
            return Some(if is_ipv6_addr(addr) {
                AddressFamily::Ipv6
            } else {
                AddressFamily::Ipv4
            });
        }
        match self.to.as_deref() {
            Some("default") | None => None,
            Some(to) => Some(if is_ipv6_addr(to) {
                AddressFamily::Ipv6
            } else {
                AddressFamily::Ipv4
            }),
        }
    }

    /// The scope the backends should receive: explicit scope wins, else
    /// derived from the route type and the presence of a gateway.
    pub fn effective_scope(&self) -> RouteScope {
        if let Some(scope) = self.scope {
            return scope;
        }
        match self.route_type() {
            RouteType::Local | RouteType::Nat | RouteType::Anycast => {
                RouteScope::Host
            }
            RouteType::Unicast if self.via.is_none() => RouteScope::Link,
            _ => RouteScope::Global,
        }
    }

    pub fn effective_table(&self) -> u32 {
        self.table.unwrap_or(DEFAULT_ROUTE_TABLE)
    }

    pub fn effective_metric(&self) -> u32 {
        self.metric.unwrap_or(DEFAULT_ROUTE_METRIC)
    }

    pub(crate) fn validate(&self, netdef_id: &str) -> Result<(), NplanError> {
        let mut family: Option<AddressFamily> = None;
        if let Some(to) = self.to.as_deref()
            && to != "default"
        {
            family = Some(parse_route_dest(to)?);
        }
        for addr in [self.via.as_deref(), self.from.as_deref()]
            .into_iter()
            .flatten()
        {
            let addr_family = if is_ipv6_addr(addr) {
                AddressFamily::Ipv6
            } else {
                AddressFamily::Ipv4
            };
            parse_ip_addr(addr)?;
            if let Some(family) = family
                && family != addr_family
            {
                return Err(NplanError::new(
                    ErrorKind::SchemaError,
                    format!(
                        "Route of {netdef_id} mixes IPv4 and IPv6 \
                         addresses"
                    ),
                ));
            }
            family = Some(addr_family);
        }

        match self.effective_scope() {
            RouteScope::Global
                if self.route_type() == RouteType::Unicast =>
            {
                if self.to.is_none() || self.via.is_none() {
                    return Err(NplanError::new(
                        ErrorKind::SchemaError,
                        format!(
                            "Unicast global route of {netdef_id} needs \
                             both 'to' and 'via'"
                        ),
                    ));
                }
            }
            RouteScope::Link | RouteScope::Host => {
                if self.to.is_none() {
                    return Err(NplanError::new(
                        ErrorKind::SchemaError,
                        format!(
                            "Link or host scope route of {netdef_id} \
                             needs 'to'"
                        ),
                    ));
                }
            }
            _ => (),
        }
        Ok(())
    }
}

/// Policy routing rule. Network daemon backend only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[non_exhaustive]
pub struct RoutingPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub priority: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub table: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub mark: Option<u32>,
    /// Type of service, 0..255.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "crate::deserializer::option_u8_or_string"
    )]
    pub type_of_service: Option<u8>,
}

impl RoutingPolicy {
    pub(crate) fn validate(&self, netdef_id: &str) -> Result<(), NplanError> {
        for dest in [self.from.as_deref(), self.to.as_deref()]
            .into_iter()
            .flatten()
        {
            parse_route_dest(dest)?;
        }
        if self.from.is_none() && self.to.is_none() {
            return Err(NplanError::new(
                ErrorKind::SchemaError,
                format!(
                    "Routing policy of {netdef_id} needs 'from' or 'to'"
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
    fn test_route_family_detect() {
        let route: Route =
            serde_yaml::from_str("{to: default, via: 10.0.0.1}").unwrap();
        assert_eq!(route.family(), Some(AddressFamily::Ipv4));
        let route: Route =
            serde_yaml::from_str("{to: default, via: 'fe80::1'}").unwrap();
        assert_eq!(route.family(), Some(AddressFamily::Ipv6));
    }

    #[test]
    fn test_route_mixed_family_rejected() {
        let route: Route =
            serde_yaml::from_str("{to: 10.0.0.0/8, via: 'fe80::1'}")
                .unwrap();
        assert!(route.validate("eth0").is_err());
    }

    #[test]
    fn test_unicast_global_needs_via() {
        let route: Route =
            serde_yaml::from_str("{to: 10.0.0.0/8, scope: global}").unwrap();
        assert!(route.validate("eth0").is_err());
    }

    #[test]
    fn test_scope_derivation() {
        let route: Route =
            serde_yaml::from_str("{to: 10.0.0.0/8, via: 10.0.0.1}").unwrap();
        assert_eq!(route.effective_scope(), RouteScope::Global);
        let route: Route =
            serde_yaml::from_str("{to: 10.0.0.0/8}").unwrap();
        assert_eq!(route.effective_scope(), RouteScope::Link);
        let route: Route =
            serde_yaml::from_str("{to: 10.0.0.1, type: local}").unwrap();
        assert_eq!(route.effective_scope(), RouteScope::Host);
    }

    #[test]
    fn test_default_route_detect() {
        for to in ["default", "0.0.0.0/0", "::/0"] {
            let route = Route {
                to: Some(to.to_string()),
                ..Default::default()
            };
            assert!(route.is_default());
        }
    }

    #[test]
    fn test_routing_policy_needs_selector() {
        let rule = RoutingPolicy::default();
        assert!(rule.validate("eth0").is_err());
    }
}
