//! PAP protocol - RFC 1334
//!
//! Password Authentication Protocol packets. PAP reuses the control packet
//! header; only the data layout differs.

use super::cp::{ControlPacket, CpBuilder};
use crate::{Error, Result};

/// PAP packet codes
pub mod codes {
    /// Authenticate-Request
    pub const AUTHENTICATE_REQUEST: u8 = 1;
    /// Authenticate-Ack (success)
    pub const AUTHENTICATE_ACK: u8 = 2;
    /// Authenticate-Nak (failure)
    pub const AUTHENTICATE_NAK: u8 = 3;
}

/// Parsed PAP packet (zero-copy reference)
#[derive(Debug)]
pub struct PapPacket<'a> {
    packet: ControlPacket<'a>,
}

impl<'a> PapPacket<'a> {
    /// Parse PAP packet from buffer
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        let packet = ControlPacket::parse(buffer)
            .map_err(|e| Error::Parse(format!("PAP: {}", e)))?;
        Ok(Self { packet })
    }

    /// Code field
    pub fn code(&self) -> u8 {
        self.packet.code()
    }

    /// Identifier field
    pub fn identifier(&self) -> u8 {
        self.packet.identifier()
    }

    /// Get Peer-ID from Authenticate-Request
    pub fn peer_id(&self) -> Option<&'a [u8]> {
        if self.code() != codes::AUTHENTICATE_REQUEST {
            return None;
        }
        length_prefixed(self.packet.data(), 0).map(|(field, _)| field)
    }

    /// Get Password from Authenticate-Request
    pub fn password(&self) -> Option<&'a [u8]> {
        if self.code() != codes::AUTHENTICATE_REQUEST {
            return None;
        }
        let data = self.packet.data();
        let (_, next) = length_prefixed(data, 0)?;
        length_prefixed(data, next).map(|(field, _)| field)
    }

    /// Get message from Authenticate-Ack/Nak
    ///
    /// A missing or inconsistent message is reported as empty.
    pub fn message(&self) -> Option<&'a [u8]> {
        if !self.is_success() && !self.is_failure() {
            return None;
        }
        Some(
            length_prefixed(self.packet.data(), 0)
                .map(|(field, _)| field)
                .unwrap_or(&[]),
        )
    }

    /// Check if this is an authentication success
    pub fn is_success(&self) -> bool {
        self.code() == codes::AUTHENTICATE_ACK
    }

    /// Check if this is an authentication failure
    pub fn is_failure(&self) -> bool {
        self.code() == codes::AUTHENTICATE_NAK
    }
}

/// Read a one-byte length prefixed field at `offset`, returning it and the
/// offset following it
fn length_prefixed(data: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let len = *data.get(offset)? as usize;
    let start = offset + 1;
    let field = data.get(start..start + len)?;
    Some((field, start + len))
}

fn push_length_prefixed(data: &mut Vec<u8>, field: &[u8], what: &str) -> Result<()> {
    let len = u8::try_from(field.len())
        .map_err(|_| Error::InvalidPacket(format!("PAP {} longer than 255 bytes", what)))?;
    data.push(len);
    data.extend_from_slice(field);
    Ok(())
}

/// Build an Authenticate-Request
pub fn authenticate_request(identifier: u8, peer_id: &str, password: &str) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(2 + peer_id.len() + password.len());
    push_length_prefixed(&mut data, peer_id.as_bytes(), "peer id")?;
    push_length_prefixed(&mut data, password.as_bytes(), "password")?;
    Ok(CpBuilder::new(codes::AUTHENTICATE_REQUEST, identifier)
        .raw_data(&data)
        .build())
}

/// Build an Authenticate-Ack or Authenticate-Nak
pub fn authenticate_response(identifier: u8, success: bool, message: &str) -> Result<Vec<u8>> {
    let code = if success {
        codes::AUTHENTICATE_ACK
    } else {
        codes::AUTHENTICATE_NAK
    };
    let mut data = Vec::with_capacity(1 + message.len());
    push_length_prefixed(&mut data, message.as_bytes(), "message")?;
    Ok(CpBuilder::new(code, identifier).raw_data(&data).build())
}
