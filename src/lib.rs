//! pppos - PPP over serial links
//!
//! RFC 1661 control protocols (LCP, IPCP, PAP client) on top of RFC 1662
//! HDLC-like framing. The protocol engine is sans-I/O; a tokio session
//! runtime drives it over any byte stream.

pub mod config;
pub mod control;
pub mod error;
pub mod link;
pub mod protocol;
pub mod session;
pub mod telemetry;

pub use error::{Error, Result};
