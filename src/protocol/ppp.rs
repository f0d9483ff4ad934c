//! PPP protocol - RFC 1661 / RFC 1662
//!
//! PPP frame parsing and building over HDLC-like framing. The byte-stuffing
//! and FCS live in `hdlc`; this module handles the unescaped frame body:
//! address, control and protocol fields followed by the information field.

use crate::{Error, Result};

/// All-Stations address
pub const ADDRESS: u8 = 0xff;
/// Unnumbered Information control field
pub const CONTROL: u8 = 0x03;

/// Address + control + protocol
pub const PPP_HEADER_SIZE: usize = 4;

/// PPP protocol numbers
pub mod protocols {
    /// Internet Protocol version 4
    pub const IP: u16 = 0x0021;
    /// Internet Protocol Control Protocol
    pub const IPCP: u16 = 0x8021;
    /// Link Control Protocol
    pub const LCP: u16 = 0xc021;
    /// Password Authentication Protocol
    pub const PAP: u16 = 0xc023;
}

/// Parsed PPP frame (zero-copy reference)
#[derive(Debug)]
pub struct PppFrame<'a> {
    buffer: &'a [u8],
}

impl<'a> PppFrame<'a> {
    /// Parse an unescaped frame with its FCS already stripped
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < PPP_HEADER_SIZE {
            return Err(Error::Parse("PPP frame too short".into()));
        }
        if buffer[0] != ADDRESS || buffer[1] != CONTROL {
            return Err(Error::Parse(format!(
                "unexpected address/control 0x{:02x}/0x{:02x}",
                buffer[0], buffer[1]
            )));
        }
        if buffer[3] & 0x01 == 0 {
            return Err(Error::Parse("invalid protocol field".into()));
        }
        Ok(Self { buffer })
    }

    /// Protocol field
    pub fn protocol(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Payload (protocol-specific data)
    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[PPP_HEADER_SIZE..]
    }

    /// Get the raw buffer
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer
    }
}

/// Builder for PPP frames
#[derive(Debug, Default)]
pub struct PppBuilder {
    protocol: u16,
    payload: Vec<u8>,
}

impl PppBuilder {
    /// Create a new PPP frame builder
    pub fn new(protocol: u16) -> Self {
        Self {
            protocol,
            payload: Vec::new(),
        }
    }

    /// Set the payload
    pub fn payload(mut self, data: &[u8]) -> Self {
        self.payload = data.to_vec();
        self
    }

    /// Build the unescaped frame body
    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PPP_HEADER_SIZE + self.payload.len());
        frame.push(ADDRESS);
        frame.push(CONTROL);
        frame.extend_from_slice(&self.protocol.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}
