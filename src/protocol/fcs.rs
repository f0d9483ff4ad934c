//! Frame Check Sequence - RFC 1662 Appendix C
//!
//! 16-bit (CRC-CCITT) and 32-bit (CRC-32) FCS as used by HDLC-like framing.
//! Both are computed LSB first with lookup tables generated at compile time.

/// Initial FCS-16 value
pub const FCS16_INIT: u16 = 0xffff;
/// FCS-16 residue of a frame received without error
pub const FCS16_GOOD: u16 = 0xf0b8;
/// Initial FCS-32 value
pub const FCS32_INIT: u32 = 0xffff_ffff;
/// FCS-32 residue of a frame received without error
pub const FCS32_GOOD: u32 = 0xdebb_20e3;

const FCS16_POLY: u16 = 0x8408;
const FCS32_POLY: u32 = 0xedb8_8320;

static FCS16_TABLE: [u16; 256] = fcs16_table();
static FCS32_TABLE: [u32; 256] = fcs32_table();

const fn fcs16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut v = i as u16;
        let mut bit = 0;
        while bit < 8 {
            v = if v & 1 != 0 { (v >> 1) ^ FCS16_POLY } else { v >> 1 };
            bit += 1;
        }
        table[i] = v;
        i += 1;
    }
    table
}

const fn fcs32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut v = i as u32;
        let mut bit = 0;
        while bit < 8 {
            v = if v & 1 != 0 { (v >> 1) ^ FCS32_POLY } else { v >> 1 };
            bit += 1;
        }
        table[i] = v;
        i += 1;
    }
    table
}

/// Fold `data` into a running 16-bit FCS
pub fn fcs16(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |fcs, &b| {
        (fcs >> 8) ^ FCS16_TABLE[((fcs ^ b as u16) & 0xff) as usize]
    })
}

/// Fold `data` into a running 32-bit FCS
pub fn fcs32(seed: u32, data: &[u8]) -> u32 {
    data.iter().fold(seed, |fcs, &b| {
        (fcs >> 8) ^ FCS32_TABLE[((fcs ^ b as u32) & 0xff) as usize]
    })
}

/// FCS width used on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FcsWidth {
    #[default]
    Fcs16,
    Fcs32,
}

impl FcsWidth {
    /// Number of FCS octets appended to each frame
    pub fn size(self) -> usize {
        match self {
            FcsWidth::Fcs16 => 2,
            FcsWidth::Fcs32 => 4,
        }
    }

    /// Compute the transmitted FCS bytes (complemented, little-endian)
    pub fn trailer(self, data: &[u8]) -> Vec<u8> {
        match self {
            FcsWidth::Fcs16 => (fcs16(FCS16_INIT, data) ^ 0xffff).to_le_bytes().to_vec(),
            FcsWidth::Fcs32 => (fcs32(FCS32_INIT, data) ^ 0xffff_ffff)
                .to_le_bytes()
                .to_vec(),
        }
    }

    /// Check a frame that still carries its FCS bytes
    pub fn is_good(self, frame_with_fcs: &[u8]) -> bool {
        if frame_with_fcs.len() < self.size() {
            return false;
        }
        match self {
            FcsWidth::Fcs16 => fcs16(FCS16_INIT, frame_with_fcs) == FCS16_GOOD,
            FcsWidth::Fcs32 => fcs32(FCS32_INIT, frame_with_fcs) == FCS32_GOOD,
        }
    }
}
