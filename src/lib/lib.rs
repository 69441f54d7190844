// SPDX-License-Identifier: Apache-2.0

mod emitter;
mod error;
mod ip;
mod keyfile;
mod netdef;
mod parser;
mod renderer;
mod route;
mod state;
mod validation;

pub(crate) mod deserializer;

pub use self::{
    error::{ErrorKind, NplanError},
    ip::AddressFamily,
    netdef::{
        AccessPointMode, ActivationMode, AddressEntry, AddressLifetime,
        AddressOptions, AuthEapMethod, AuthKeyManagement, AuthPmfMode,
        AuthSettings, Backend, BondAdSelect, BondArpAllTargets,
        BondArpValidate, BondFailOverMacPolicy, BondLacpRate, BondMode,
        BondNetdef, BondParameters, BondPrimaryReselectPolicy,
        BondTransmitHashPolicy, BridgeNetdef, BridgeParameters,
        CommonNetdef, DeviceKind, DhcpOverrides, DummyNetdef,
        EthernetNetdef, Ipv6AddressGeneration, KeyFlag, LinkLocalFamily,
        MatchConfig, ModemNetdef, Nameservers, NetDef, NetdefMeta,
        NetworkDoc, NetworkManagerSettings, NetworkSection,
        NmDeviceNetdef, NplanNetdef, OpenFlowProtocol,
        OptionalAddressType, OvsConnectionMode, OvsController,
        OvsFailMode, OvsLacp, OvsPortNetdef, OvsSettings, OvsSsl,
        Renderer, TunnelKeys, TunnelMode, TunnelNetdef, UseDomains,
        VethNetdef, VlanNetdef, VrfNetdef, VxlanChecksum, VxlanExtension,
        VxlanNotification, WakeOnWlanFlag, WifiAccessPoint, WifiBand,
        WifiNetdef, WireguardPeer, WireguardPeerKeys,
    },
    parser::{Parser, ParserFlags},
    route::{Route, RouteScope, RouteType, RoutingPolicy},
    state::{NetplanState, SriovPlan},
};

/// The only supported schema version of the `network:` mapping.
pub const CUR_SCHEMA_VERSION: u32 = 2;

/// Environment variable switching the parser into error collecting mode.
pub const IGNORE_ERRORS_ENV: &str = "NETPLAN_PARSER_IGNORE_ERRORS";

/// Stamp file guarding against racing a pending `try` transaction.
pub const TRY_STAMP_PATH: &str = "run/netplan/netplan-try.ready";

/// Whether a `try` transaction is pending below the given root; file
/// generation must abort while the stamp exists.
pub fn try_stamp_exists(root_dir: &std::path::Path) -> bool {
    root_dir.join(TRY_STAMP_PATH).exists()
}

#[cfg(test)]
mod unit_tests;
