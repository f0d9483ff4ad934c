//! Configuration types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::telemetry::LogConfig;

/// Session configuration (config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub lcp: LcpConfig,
    #[serde(default)]
    pub ipcp: IpcpConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pap: Option<PapConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

/// HDLC framing parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Control characters the peer escapes when sending to us
    pub accm_rx: u32,
    /// Control characters we escape when sending
    pub accm_tx: u32,
    /// FCS width in bits, 16 or 32
    pub fcs: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            accm_rx: 0xffff_ffff,
            accm_tx: 0xffff_ffff,
            fcs: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LcpConfig {
    pub restart_timer_ms: u64,
    pub max_configure: u8,
    pub max_terminate: u8,
    pub max_failure: u8,
    pub mru: u16,
    /// Seconds between Echo-Requests, 0 disables the link monitor
    pub echo_interval_secs: u64,
    pub echo_failures: u8,
}

impl Default for LcpConfig {
    fn default() -> Self {
        Self {
            restart_timer_ms: 3000,
            max_configure: 10,
            max_terminate: 2,
            max_failure: 5,
            mru: 1500,
            echo_interval_secs: 30,
            echo_failures: 3,
        }
    }
}

impl LcpConfig {
    pub fn restart_timer(&self) -> Duration {
        Duration::from_millis(self.restart_timer_ms)
    }

    pub fn echo_interval(&self) -> Duration {
        Duration::from_secs(self.echo_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpcpConfig {
    pub restart_timer_ms: u64,
    pub max_configure: u8,
    pub max_terminate: u8,
    pub max_failure: u8,
    /// Address we request, 0.0.0.0 asks the peer to assign one
    pub address: Ipv4Addr,
    /// Address the peer must use; also suggested when it asks for one.
    /// "0.0.0.0" in the file leaves the choice to the peer.
    #[serde(
        deserialize_with = "unspecified_as_none",
        serialize_with = "none_as_unspecified"
    )]
    pub peer_address: Option<Ipv4Addr>,
    pub require_peer_address: bool,
}

impl Default for IpcpConfig {
    fn default() -> Self {
        Self {
            restart_timer_ms: 3000,
            max_configure: 10,
            max_terminate: 2,
            max_failure: 5,
            address: Ipv4Addr::UNSPECIFIED,
            peer_address: Some(Ipv4Addr::new(10, 64, 64, 64)),
            require_peer_address: true,
        }
    }
}

impl IpcpConfig {
    pub fn restart_timer(&self) -> Duration {
        Duration::from_millis(self.restart_timer_ms)
    }
}

fn unspecified_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Ipv4Addr>, D::Error> {
    let addr = Ipv4Addr::deserialize(deserializer)?;
    Ok((!addr.is_unspecified()).then_some(addr))
}

fn none_as_unspecified<S: Serializer>(
    addr: &Option<Ipv4Addr>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    addr.unwrap_or(Ipv4Addr::UNSPECIFIED).serialize(serializer)
}

/// PAP credentials; without them there is no authentication phase
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PapConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_pap_retry_timer_ms")]
    pub retry_timer_ms: u64,
    #[serde(default = "default_pap_max_retries")]
    pub max_retries: u8,
}

fn default_pap_retry_timer_ms() -> u64 {
    3000
}

fn default_pap_max_retries() -> u8 {
    3
}

impl PapConfig {
    pub fn retry_timer(&self) -> Duration {
        Duration::from_millis(self.retry_timer_ms)
    }
}
