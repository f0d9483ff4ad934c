//! IPCP protocol - RFC 1332
//!
//! Internet Protocol Control Protocol constants and option helpers.

/// Codes IPCP understands (Configure-Request through Code-Reject),
/// as a bitmask indexed by code
pub const SUPPORTED_CODES: u16 = 0x00fe;

/// IPCP option types
pub mod options {
    /// IP-Addresses (deprecated, RFC 1172)
    pub const IP_ADDRESSES: u8 = 1;
    /// IP-Compression-Protocol
    pub const IP_COMPRESSION: u8 = 2;
    /// IP-Address
    pub const IP_ADDRESS: u8 = 3;

    /// Human readable option name for logs
    pub fn name(opt_type: u8) -> &'static str {
        match opt_type {
            IP_ADDRESSES => "IP-Addresses",
            IP_COMPRESSION => "IP-Compression-Protocol",
            IP_ADDRESS => "IP-Address",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_codes_mask() {
        for code in 1..=7u8 {
            assert!(SUPPORTED_CODES & (1 << code) != 0);
        }
        for code in [0u8, 8, 9, 10, 11] {
            assert_eq!(SUPPORTED_CODES & (1 << code), 0);
        }
    }
}
