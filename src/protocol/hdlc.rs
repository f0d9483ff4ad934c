//! HDLC-like framing - RFC 1662
//!
//! Byte-stuffed framing for PPP over asynchronous serial links:
//!
//! ```text
//! 0x7e | 0xff | 0x03 | protocol | information | FCS (2 or 4, LE) | 0x7e
//! ```
//!
//! Flag and escape octets, plus every control character mapped in the
//! Async-Control-Character-Map, are sent as `0x7d, byte ^ 0x20`.

use super::fcs::FcsWidth;

/// Frame delimiter
pub const FLAG: u8 = 0x7e;
/// Control escape
pub const CONTROL_ESCAPE: u8 = 0x7d;
/// Value XORed into an escaped octet
pub const ESCAPE_XOR: u8 = 0x20;

/// Largest unescaped frame accepted by the reader
/// (2000 byte MRU + address/control + protocol + FCS-32)
pub const MAX_FRAME_SIZE: usize = 2000 + 2 + 2 + 4;

/// Async-Control-Character-Map
///
/// Bit `n` set means character `n` (0x00-0x1f) must be escaped on transmit
/// and is ignored when received unescaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accm(pub u32);

impl Accm {
    /// Every control character is mapped (the RFC 1662 default)
    pub const ALL: Accm = Accm(0xffff_ffff);
    /// No control character is mapped
    pub const NONE: Accm = Accm(0);

    /// Whether `byte` is a mapped control character
    pub fn is_mapped(self, byte: u8) -> bool {
        byte < 0x20 && self.0 & (1 << byte) != 0
    }
}

impl Default for Accm {
    fn default() -> Self {
        Self::ALL
    }
}

/// Why a received frame was thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// FCS check failed
    BadFcs,
    /// Frame shorter than its FCS
    TooShort,
    /// Frame exceeded `MAX_FRAME_SIZE`
    TooLong,
    /// Escape immediately followed by a flag (abort sequence)
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Hunting for a flag
    Idle,
    /// Collecting frame octets
    InFrame,
    /// Previous octet was a control escape
    Escaped,
}

/// Incremental frame decoder
#[derive(Debug)]
pub struct FrameReader {
    state: ReaderState,
    buffer: Vec<u8>,
    accm: Accm,
    fcs: FcsWidth,
}

impl FrameReader {
    /// Create a reader with the given receive ACCM and FCS width
    pub fn new(accm: Accm, fcs: FcsWidth) -> Self {
        Self {
            state: ReaderState::Idle,
            buffer: Vec::with_capacity(256),
            accm,
            fcs,
        }
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.state = ReaderState::Idle;
        self.buffer.clear();
    }

    /// Feed one octet from the link
    ///
    /// Returns `Some` when a flag closes a non-empty frame. A good frame is
    /// returned without its FCS (address, control, protocol, information).
    pub fn push(&mut self, byte: u8) -> Option<Result<Vec<u8>, FrameError>> {
        if byte == FLAG {
            let aborted = self.state == ReaderState::Escaped;
            let was_idle = self.state == ReaderState::Idle;
            self.state = ReaderState::InFrame;

            if was_idle || self.buffer.is_empty() {
                self.buffer.clear();
                return None;
            }
            let frame = std::mem::take(&mut self.buffer);
            if aborted {
                return Some(Err(FrameError::Aborted));
            }
            return Some(self.finish(frame));
        }

        match self.state {
            ReaderState::Idle => None,
            ReaderState::InFrame if byte == CONTROL_ESCAPE => {
                self.state = ReaderState::Escaped;
                None
            }
            ReaderState::InFrame if self.accm.is_mapped(byte) => None,
            ReaderState::InFrame => self.store(byte),
            ReaderState::Escaped => {
                self.state = ReaderState::InFrame;
                self.store(byte ^ ESCAPE_XOR)
            }
        }
    }

    /// Feed a chunk of octets, collecting every frame it completes
    pub fn consume(&mut self, data: &[u8]) -> Vec<Result<Vec<u8>, FrameError>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    fn store(&mut self, byte: u8) -> Option<Result<Vec<u8>, FrameError>> {
        if self.buffer.len() >= MAX_FRAME_SIZE {
            self.reset();
            return Some(Err(FrameError::TooLong));
        }
        self.buffer.push(byte);
        None
    }

    fn finish(&self, mut frame: Vec<u8>) -> Result<Vec<u8>, FrameError> {
        let fcs_len = self.fcs.size();
        if frame.len() <= fcs_len {
            return Err(FrameError::TooShort);
        }
        if !self.fcs.is_good(&frame) {
            return Err(FrameError::BadFcs);
        }
        frame.truncate(frame.len() - fcs_len);
        Ok(frame)
    }
}

/// Encode one frame for transmission
///
/// `frame` holds address, control, protocol and information fields.
pub fn encode_frame(frame: &[u8], accm: Accm, fcs: FcsWidth) -> Vec<u8> {
    let trailer = fcs.trailer(frame);
    let mut out = Vec::with_capacity(2 + (frame.len() + trailer.len()) * 2);

    out.push(FLAG);
    for &byte in frame.iter().chain(trailer.iter()) {
        if byte == FLAG || byte == CONTROL_ESCAPE || accm.is_mapped(byte) {
            out.push(CONTROL_ESCAPE);
            out.push(byte ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
    out.push(FLAG);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> FrameReader {
        FrameReader::new(Accm::ALL, FcsWidth::Fcs16)
    }

    #[test]
    fn test_accm_mapping() {
        assert!(Accm::ALL.is_mapped(0x00));
        assert!(Accm::ALL.is_mapped(0x1f));
        assert!(!Accm::ALL.is_mapped(0x20));
        assert!(!Accm::NONE.is_mapped(0x11));
        // Only XON/XOFF mapped
        let accm = Accm(0x000a_0000);
        assert!(accm.is_mapped(0x11));
        assert!(accm.is_mapped(0x13));
        assert!(!accm.is_mapped(0x12));
    }

    #[test]
    fn test_encode_escapes() {
        let frame = [0xff, 0x03, 0x7e, 0x7d, 0x01, 0x41];
        let encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16);

        assert_eq!(encoded[0], FLAG);
        assert_eq!(*encoded.last().unwrap(), FLAG);
        assert_eq!(
            &encoded[1..10],
            &[0xff, 0x7d, 0x23, 0x7d, 0x5e, 0x7d, 0x5d, 0x7d, 0x21]
        );
        assert_eq!(encoded[10], 0x41);
        // No bare flag or control character between the delimiters
        let body = &encoded[1..encoded.len() - 1];
        assert!(body.iter().all(|&b| b != FLAG && b >= 0x20));
    }

    #[test]
    fn test_encode_without_accm_keeps_control_chars() {
        let frame = [0xff, 0x03, 0x00, 0x21, 0x01];
        let encoded = encode_frame(&frame, Accm::NONE, FcsWidth::Fcs16);
        assert_eq!(&encoded[1..6], &frame);
    }

    #[test]
    fn test_decode_encoded_frame() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x01, 0x01, 0x00, 0x08, 0x01, 0x04, 0x7e, 0x11];
        let encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16);

        let frames = reader().consume(&encoded);
        assert_eq!(frames, vec![Ok(frame.to_vec())]);
    }

    #[test]
    fn test_decode_fcs32() {
        let frame = [0xff, 0x03, 0x80, 0x21, 0x02, 0x07, 0x00, 0x04];
        let encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs32);

        let mut reader = FrameReader::new(Accm::ALL, FcsWidth::Fcs32);
        assert_eq!(reader.consume(&encoded), vec![Ok(frame.to_vec())]);
    }

    #[test]
    fn test_decode_bad_fcs() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x05, 0x01, 0x00, 0x04];
        let mut encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16);
        encoded[5] ^= 0x40;

        assert_eq!(reader().consume(&encoded), vec![Err(FrameError::BadFcs)]);
    }

    #[test]
    fn test_decode_shared_flags() {
        let a = [0xff, 0x03, 0xc0, 0x21, 0x09, 0x01, 0x00, 0x08];
        let b = [0xff, 0x03, 0x80, 0x21, 0x06, 0x02, 0x00, 0x04];
        let mut stream = encode_frame(&a, Accm::ALL, FcsWidth::Fcs16);
        // Second frame reuses the closing flag of the first
        stream.extend_from_slice(&encode_frame(&b, Accm::ALL, FcsWidth::Fcs16)[1..]);

        let frames = reader().consume(&stream);
        assert_eq!(frames, vec![Ok(a.to_vec()), Ok(b.to_vec())]);
    }

    #[test]
    fn test_decode_ignores_noise_before_flag_and_empty_frames() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x0b, 0x03, 0x00, 0x04];
        let mut stream = vec![0x41, 0x54, 0x0d, FLAG, FLAG, FLAG];
        stream.extend_from_slice(&encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16));

        assert_eq!(reader().consume(&stream), vec![Ok(frame.to_vec())]);
    }

    #[test]
    fn test_decode_drops_mapped_control_chars() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x0b, 0x03, 0x00, 0x04];
        let encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16);

        // Inject XON/XOFF inserted by a modem
        let mut noisy = Vec::new();
        for (i, b) in encoded.iter().enumerate() {
            noisy.push(*b);
            if i == 3 {
                noisy.push(0x11);
                noisy.push(0x13);
            }
        }

        assert_eq!(reader().consume(&noisy), vec![Ok(frame.to_vec())]);
    }

    #[test]
    fn test_decode_abort_sequence() {
        let stream = [FLAG, 0xff, 0x03, 0xc0, 0x21, CONTROL_ESCAPE, FLAG];
        assert_eq!(reader().consume(&stream), vec![Err(FrameError::Aborted)]);
    }

    #[test]
    fn test_decode_abort_then_next_frame() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x0b, 0x03, 0x00, 0x04];
        let mut stream = vec![FLAG, 0xff, 0x03, CONTROL_ESCAPE];
        stream.extend_from_slice(&encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16));

        assert_eq!(
            reader().consume(&stream),
            vec![Err(FrameError::Aborted), Ok(frame.to_vec())]
        );
    }

    #[test]
    fn test_decode_too_short() {
        let stream = [FLAG, 0xb8, FLAG];
        assert_eq!(reader().consume(&stream), vec![Err(FrameError::TooShort)]);
    }

    #[test]
    fn test_decode_too_long() {
        let mut stream = vec![FLAG];
        stream.extend(std::iter::repeat(0x55).take(MAX_FRAME_SIZE + 1));
        stream.push(FLAG);

        // Overflow reported once; the rest is skipped up to the next flag
        assert_eq!(reader().consume(&stream), vec![Err(FrameError::TooLong)]);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let frame = [0xff, 0x03, 0xc0, 0x21, 0x0b, 0x03, 0x00, 0x04];
        let encoded = encode_frame(&frame, Accm::ALL, FcsWidth::Fcs16);

        let mut reader = reader();
        assert!(reader.consume(&encoded[..5]).is_empty());
        reader.reset();
        assert_eq!(reader.consume(&encoded), vec![Ok(frame.to_vec())]);
    }
}
