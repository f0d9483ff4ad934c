//! LCP protocol - RFC 1661
//!
//! Link Control Protocol constants and option helpers. The packet layout is
//! the generic control packet in `cp`.

use super::cp::codes;

/// Codes LCP understands (Configure-Request through Discard-Request),
/// as a bitmask indexed by code
pub const SUPPORTED_CODES: u16 = 0x0ffe;

/// Default Maximum-Receive-Unit
pub const DEFAULT_MRU: u16 = 1500;

/// Largest MRU this implementation accepts from a peer
pub const MAX_MRU: u16 = 2000;

/// Smallest MRU worth configuring locally
pub const MIN_MRU: u16 = 64;

/// LCP option types
pub mod options {
    /// Maximum-Receive-Unit
    pub const MRU: u8 = 1;
    /// Async-Control-Character-Map
    pub const ACCM: u8 = 2;
    /// Authentication-Protocol
    pub const AUTH_PROTOCOL: u8 = 3;
    /// Quality-Protocol
    pub const QUALITY_PROTOCOL: u8 = 4;
    /// Magic-Number
    pub const MAGIC_NUMBER: u8 = 5;
    /// Protocol-Field-Compression
    pub const PFC: u8 = 7;
    /// Address-and-Control-Field-Compression
    pub const ACFC: u8 = 8;

    /// Human readable option name for logs
    pub fn name(opt_type: u8) -> &'static str {
        match opt_type {
            MRU => "MRU",
            ACCM => "ACCM",
            AUTH_PROTOCOL => "Auth-Protocol",
            QUALITY_PROTOCOL => "Quality-Protocol",
            MAGIC_NUMBER => "Magic-Number",
            PFC => "PFC",
            ACFC => "ACFC",
            _ => "unknown",
        }
    }
}

/// Whether a Code-Reject for `code` makes LCP unusable
///
/// Configure and Terminate packets are essential to the automaton; anything
/// else (Echo, Discard, ...) can be lived without.
pub fn is_critical_code(code: u8) -> bool {
    (codes::CONFIGURE_REQUEST..=codes::TERMINATE_ACK).contains(&code)
}
