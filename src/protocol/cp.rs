//! Control packet codec - RFC 1661 §5
//!
//! LCP, IPCP and PAP share the same packet header:
//!
//! ```text
//! code (1) | identifier (1) | length (2, BE) | data (length - 4)
//! ```
//!
//! Configure-* packets carry a run of type-length-value options. The run is
//! validated as a whole before any option is handed out, so a truncated or
//! zero-length option can never be interpreted.

use crate::{Error, Result};

/// Control packet header size (code + identifier + length)
pub const CP_HEADER_SIZE: usize = 4;

/// Option header size (type + length)
pub const OPTION_HEADER_SIZE: usize = 2;

/// Control packet codes
pub mod codes {
    /// Configure-Request
    pub const CONFIGURE_REQUEST: u8 = 1;
    /// Configure-Ack
    pub const CONFIGURE_ACK: u8 = 2;
    /// Configure-Nak
    pub const CONFIGURE_NAK: u8 = 3;
    /// Configure-Reject
    pub const CONFIGURE_REJECT: u8 = 4;
    /// Terminate-Request
    pub const TERMINATE_REQUEST: u8 = 5;
    /// Terminate-Ack
    pub const TERMINATE_ACK: u8 = 6;
    /// Code-Reject
    pub const CODE_REJECT: u8 = 7;
    /// Protocol-Reject
    pub const PROTOCOL_REJECT: u8 = 8;
    /// Echo-Request
    pub const ECHO_REQUEST: u8 = 9;
    /// Echo-Reply
    pub const ECHO_REPLY: u8 = 10;
    /// Discard-Request
    pub const DISCARD_REQUEST: u8 = 11;

    /// Human readable code name for logs
    pub fn name(code: u8) -> &'static str {
        match code {
            CONFIGURE_REQUEST => "Configure-Request",
            CONFIGURE_ACK => "Configure-Ack",
            CONFIGURE_NAK => "Configure-Nak",
            CONFIGURE_REJECT => "Configure-Reject",
            TERMINATE_REQUEST => "Terminate-Request",
            TERMINATE_ACK => "Terminate-Ack",
            CODE_REJECT => "Code-Reject",
            PROTOCOL_REJECT => "Protocol-Reject",
            ECHO_REQUEST => "Echo-Request",
            ECHO_REPLY => "Echo-Reply",
            DISCARD_REQUEST => "Discard-Request",
            _ => "Unknown",
        }
    }
}

/// Parsed control packet (zero-copy reference)
#[derive(Debug, Clone, Copy)]
pub struct ControlPacket<'a> {
    buffer: &'a [u8],
}

impl<'a> ControlPacket<'a> {
    /// Parse a control packet from the PPP information field
    ///
    /// Octets past the length field are padding and ignored.
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < CP_HEADER_SIZE {
            return Err(Error::Parse("control packet too short".into()));
        }

        let length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        if length < CP_HEADER_SIZE {
            return Err(Error::Parse("control packet length too small".into()));
        }
        if buffer.len() < length {
            return Err(Error::Parse("control packet truncated".into()));
        }

        Ok(Self {
            buffer: &buffer[..length],
        })
    }

    /// Code field
    pub fn code(&self) -> u8 {
        self.buffer[0]
    }

    /// Identifier field (for matching requests and responses)
    pub fn identifier(&self) -> u8 {
        self.buffer[1]
    }

    /// Length field (total packet length including header)
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Data (options for Configure-*, payload otherwise)
    pub fn data(&self) -> &'a [u8] {
        &self.buffer[CP_HEADER_SIZE..]
    }

    /// Validated option run of a Configure-* packet
    pub fn options(&self) -> Result<OptionIter<'a>> {
        OptionIter::new(self.data())
    }

    /// Code of the packet carried by a Code-Reject
    pub fn rejected_code(&self) -> Option<u8> {
        if self.code() != codes::CODE_REJECT {
            return None;
        }
        self.data().first().copied()
    }

    /// Protocol carried by a Protocol-Reject
    pub fn rejected_protocol(&self) -> Option<u16> {
        if self.code() != codes::PROTOCOL_REJECT {
            return None;
        }
        let data = self.data();
        if data.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([data[0], data[1]]))
    }

    /// Get the raw packet (without trailing padding)
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buffer
    }
}

/// One configuration option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpOption<'a> {
    /// Option type
    pub opt_type: u8,
    /// Option data (excluding type and length bytes)
    pub data: &'a [u8],
    raw: &'a [u8],
}

impl<'a> CpOption<'a> {
    /// The complete TLV as it appeared on the wire
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }
}

/// Iterator over a validated option run
#[derive(Debug, Clone)]
pub struct OptionIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> OptionIter<'a> {
    /// Validate `data` as an option run and iterate over it
    pub fn new(data: &'a [u8]) -> Result<Self> {
        validate_options(data)?;
        Ok(Self { data, offset: 0 })
    }
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = CpOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + OPTION_HEADER_SIZE > self.data.len() {
            return None;
        }

        let opt_type = self.data[self.offset];
        let opt_len = self.data[self.offset + 1] as usize;
        let end = self.offset + opt_len;
        if opt_len < OPTION_HEADER_SIZE || end > self.data.len() {
            return None;
        }

        let opt = CpOption {
            opt_type,
            data: &self.data[self.offset + OPTION_HEADER_SIZE..end],
            raw: &self.data[self.offset..end],
        };

        self.offset = end;
        Some(opt)
    }
}

/// Check that option lengths add up exactly to the run length
pub fn validate_options(data: &[u8]) -> Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        if offset + OPTION_HEADER_SIZE > data.len() {
            return Err(Error::InvalidPacket(format!(
                "truncated option header at offset {}",
                offset
            )));
        }
        let opt_len = data[offset + 1] as usize;
        if opt_len < OPTION_HEADER_SIZE {
            return Err(Error::InvalidPacket(format!(
                "option {} has length {}",
                data[offset], opt_len
            )));
        }
        if offset + opt_len > data.len() {
            return Err(Error::InvalidPacket(format!(
                "option {} overruns packet by {} bytes",
                data[offset],
                offset + opt_len - data.len()
            )));
        }
        offset += opt_len;
    }
    Ok(())
}

/// Whether `option` (a complete TLV) appears verbatim in `reference`
pub fn is_subset(option: &[u8], reference: &[u8]) -> bool {
    match OptionIter::new(reference) {
        Ok(mut iter) => iter.any(|opt| opt.as_bytes() == option),
        Err(_) => false,
    }
}

/// Builder for control packets
#[derive(Debug, Default)]
pub struct CpBuilder {
    code: u8,
    identifier: u8,
    data: Vec<u8>,
}

impl CpBuilder {
    /// Create a new control packet builder
    pub fn new(code: u8, identifier: u8) -> Self {
        Self {
            code,
            identifier,
            data: Vec::new(),
        }
    }

    /// Create Configure-Request builder
    pub fn configure_request(identifier: u8) -> Self {
        Self::new(codes::CONFIGURE_REQUEST, identifier)
    }

    /// Create Configure-Ack builder
    pub fn configure_ack(identifier: u8) -> Self {
        Self::new(codes::CONFIGURE_ACK, identifier)
    }

    /// Create Configure-Nak builder
    pub fn configure_nak(identifier: u8) -> Self {
        Self::new(codes::CONFIGURE_NAK, identifier)
    }

    /// Create Configure-Reject builder
    pub fn configure_reject(identifier: u8) -> Self {
        Self::new(codes::CONFIGURE_REJECT, identifier)
    }

    /// Create Terminate-Request builder
    pub fn terminate_request(identifier: u8) -> Self {
        Self::new(codes::TERMINATE_REQUEST, identifier)
    }

    /// Create Terminate-Ack builder
    pub fn terminate_ack(identifier: u8) -> Self {
        Self::new(codes::TERMINATE_ACK, identifier)
    }

    /// Create Code-Reject builder carrying the rejected packet
    ///
    /// The rejected packet is truncated so the result fits in `max_len`.
    pub fn code_reject(identifier: u8, rejected: &[u8], max_len: usize) -> Self {
        let room = max_len.saturating_sub(CP_HEADER_SIZE);
        let take = rejected.len().min(room);
        Self::new(codes::CODE_REJECT, identifier).raw_data(&rejected[..take])
    }

    /// Create Protocol-Reject builder carrying the rejected information field
    pub fn protocol_reject(identifier: u8, protocol: u16, info: &[u8], max_len: usize) -> Self {
        let room = max_len.saturating_sub(CP_HEADER_SIZE + 2);
        let take = info.len().min(room);
        let mut builder = Self::new(codes::PROTOCOL_REJECT, identifier);
        builder.data.extend_from_slice(&protocol.to_be_bytes());
        builder.data.extend_from_slice(&info[..take]);
        builder
    }

    /// Create Echo-Request builder
    pub fn echo_request(identifier: u8, magic: u32) -> Self {
        let mut builder = Self::new(codes::ECHO_REQUEST, identifier);
        builder.data.extend_from_slice(&magic.to_be_bytes());
        builder
    }

    /// Create Echo-Reply builder answering `request_data`
    ///
    /// The request's Magic-Number is replaced by ours, the rest is echoed.
    pub fn echo_reply(identifier: u8, magic: u32, request_data: &[u8]) -> Self {
        let mut builder = Self::new(codes::ECHO_REPLY, identifier);
        builder.data.extend_from_slice(&magic.to_be_bytes());
        if request_data.len() > 4 {
            builder.data.extend_from_slice(&request_data[4..]);
        }
        builder
    }

    /// Add a raw option
    pub fn add_option(mut self, opt_type: u8, data: &[u8]) -> Self {
        let opt_len = (OPTION_HEADER_SIZE + data.len()) as u8;
        self.data.push(opt_type);
        self.data.push(opt_len);
        self.data.extend_from_slice(data);
        self
    }

    /// Set raw data (options run or payload)
    pub fn raw_data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// Build the control packet
    pub fn build(self) -> Vec<u8> {
        let length = (CP_HEADER_SIZE + self.data.len()) as u16;
        let mut packet = Vec::with_capacity(length as usize);

        packet.push(self.code);
        packet.push(self.identifier);
        packet.extend_from_slice(&length.to_be_bytes());
        packet.extend_from_slice(&self.data);

        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_configure_request() {
        let data = [
            0x01, // Code: Configure-Request
            0x01, // Identifier
            0x00, 0x0e, // Length=14 (4 header + 4 MRU + 6 Magic)
            // MRU option
            0x01, 0x04, // Type=1, Length=4
            0x05, 0xd4, // MRU=1492
            // Magic-Number option
            0x05, 0x06, // Type=5, Length=6
            0x12, 0x34, 0x56, 0x78, // Magic
        ];

        let packet = ControlPacket::parse(&data).unwrap();
        assert_eq!(packet.code(), codes::CONFIGURE_REQUEST);
        assert_eq!(packet.identifier(), 1);
        assert_eq!(packet.length(), 14);

        let opts: Vec<_> = packet.options().unwrap().collect();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].opt_type, 1);
        assert_eq!(opts[0].data, &[0x05, 0xd4]);
        assert_eq!(opts[0].as_bytes(), &[0x01, 0x04, 0x05, 0xd4]);
        assert_eq!(opts[1].opt_type, 5);
        assert_eq!(opts[1].data, &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_parse_ignores_padding() {
        let data = [0x02, 0x07, 0x00, 0x08, 0x01, 0x04, 0x05, 0xdc, 0x00, 0x00];
        let packet = ControlPacket::parse(&data).unwrap();
        assert_eq!(packet.as_bytes().len(), 8);
        assert_eq!(packet.options().unwrap().count(), 1);
    }

    #[test]
    fn test_parse_too_short() {
        let data = [0x01, 0x01, 0x00];
        assert!(ControlPacket::parse(&data).is_err());
    }

    #[test]
    fn test_parse_invalid_length() {
        let data = [0x01, 0x01, 0x00, 0x02]; // Length=2, but min is 4
        assert!(ControlPacket::parse(&data).is_err());
    }

    #[test]
    fn test_parse_truncated() {
        let data = [0x01, 0x01, 0x00, 0x10]; // Length=16, but only 4 bytes
        assert!(ControlPacket::parse(&data).is_err());
    }

    #[test]
    fn test_options_zero_length() {
        // Option with length 0 would loop forever without validation
        let data = [0x01, 0x01, 0x00, 0x08, 0x01, 0x00, 0x05, 0xdc];
        let packet = ControlPacket::parse(&data).unwrap();
        assert!(packet.options().is_err());
    }

    #[test]
    fn test_options_overrun() {
        // MRU claims 6 bytes, only 4 in packet
        let data = [0x01, 0x01, 0x00, 0x08, 0x01, 0x06, 0x05, 0xdc];
        let packet = ControlPacket::parse(&data).unwrap();
        assert!(packet.options().is_err());
    }

    #[test]
    fn test_options_trailing_byte() {
        // One stray byte after a complete option
        let data = [0x01, 0x01, 0x00, 0x09, 0x01, 0x04, 0x05, 0xdc, 0x03];
        let packet = ControlPacket::parse(&data).unwrap();
        assert!(packet.options().is_err());
    }

    #[test]
    fn test_options_empty() {
        let data = [0x01, 0x01, 0x00, 0x04];
        let packet = ControlPacket::parse(&data).unwrap();
        assert_eq!(packet.options().unwrap().count(), 0);
    }

    #[test]
    fn test_is_subset() {
        let sent = [0x01, 0x04, 0x05, 0xdc, 0x03, 0x06, 0x0a, 0x00, 0x00, 0x01];
        assert!(is_subset(&[0x01, 0x04, 0x05, 0xdc], &sent));
        assert!(is_subset(&[0x03, 0x06, 0x0a, 0x00, 0x00, 0x01], &sent));
        // Same type, different value
        assert!(!is_subset(&[0x01, 0x04, 0x05, 0xd4], &sent));
        // Never sent
        assert!(!is_subset(&[0x02, 0x06, 0x00, 0x00, 0x00, 0x00], &sent));
        // Malformed reference
        assert!(!is_subset(&[0x01, 0x04, 0x05, 0xdc], &[0x01, 0x04, 0x05]));
    }

    #[test]
    fn test_rejected_code() {
        let data = [0x07, 0x03, 0x00, 0x08, 0x09, 0x01, 0x00, 0x04];
        let packet = ControlPacket::parse(&data).unwrap();
        assert_eq!(packet.rejected_code(), Some(0x09));
        assert_eq!(packet.rejected_protocol(), None);
    }

    #[test]
    fn test_rejected_protocol() {
        let data = [0x08, 0x03, 0x00, 0x08, 0x80, 0x57, 0x01, 0x01];
        let packet = ControlPacket::parse(&data).unwrap();
        assert_eq!(packet.rejected_protocol(), Some(0x8057));
        assert_eq!(packet.rejected_code(), None);
    }

    #[test]
    fn test_build_configure_request() {
        let packet = CpBuilder::configure_request(1)
            .add_option(1, &1492u16.to_be_bytes())
            .build();

        assert_eq!(packet, vec![0x01, 0x01, 0x00, 0x08, 0x01, 0x04, 0x05, 0xd4]);
    }

    #[test]
    fn test_build_configure_ack() {
        let options_data = [0x01, 0x04, 0x05, 0xd4]; // MRU=1492
        let packet = CpBuilder::configure_ack(5).raw_data(&options_data).build();

        let parsed = ControlPacket::parse(&packet).unwrap();
        assert_eq!(parsed.code(), codes::CONFIGURE_ACK);
        assert_eq!(parsed.identifier(), 5);
        assert_eq!(parsed.data(), &options_data);
    }

    #[test]
    fn test_build_code_reject_truncates() {
        let rejected = [0x0c, 0x01, 0x00, 0x0a, 1, 2, 3, 4, 5, 6];
        let packet = CpBuilder::code_reject(7, &rejected, 8).build();
        assert_eq!(packet, vec![0x07, 0x07, 0x00, 0x08, 0x0c, 0x01, 0x00, 0x0a]);
    }

    #[test]
    fn test_build_protocol_reject() {
        let packet = CpBuilder::protocol_reject(2, 0x8057, &[0x01, 0x01, 0x00, 0x04], 1500).build();
        assert_eq!(
            packet,
            vec![0x08, 0x02, 0x00, 0x0a, 0x80, 0x57, 0x01, 0x01, 0x00, 0x04]
        );
    }

    #[test]
    fn test_build_echo() {
        let request = CpBuilder::echo_request(10, 0).build();
        assert_eq!(request, vec![0x09, 0x0a, 0x00, 0x08, 0, 0, 0, 0]);

        let reply = CpBuilder::echo_reply(10, 0, &[0xde, 0xad, 0xbe, 0xef, 0x41, 0x42]).build();
        assert_eq!(
            reply,
            vec![0x0a, 0x0a, 0x00, 0x0a, 0, 0, 0, 0, 0x41, 0x42]
        );
    }

    #[test]
    fn test_code_names() {
        assert_eq!(codes::name(codes::CONFIGURE_NAK), "Configure-Nak");
        assert_eq!(codes::name(codes::DISCARD_REQUEST), "Discard-Request");
        assert_eq!(codes::name(42), "Unknown");
    }
}
