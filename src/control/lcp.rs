//! LCP option rules

use super::option::{OptionDescriptor, OptionPolicy};
use crate::protocol::lcp::{options, MAX_MRU};
use crate::protocol::ppp::protocols;

/// Negotiates the Maximum-Receive-Unit and, with credentials, accepts
/// being authenticated with PAP
///
/// Peer MRU values up to [`MAX_MRU`] are accepted as they are; larger
/// ones are Nak'ed with [`MAX_MRU`]. Any other authentication protocol is
/// Nak'ed with PAP.
#[derive(Debug, Clone)]
pub struct LcpPolicy {
    mru: u16,
    pap: bool,
}

impl LcpPolicy {
    pub fn new(mru: u16) -> Self {
        Self { mru, pap: false }
    }

    /// Accept the peer's request to authenticate us with PAP
    pub fn with_pap(mut self) -> Self {
        self.pap = true;
        self
    }
}

impl OptionPolicy for LcpPolicy {
    fn descriptors(&self) -> Vec<OptionDescriptor> {
        let mut descriptors = vec![OptionDescriptor::new(options::MRU, 2, self.mru as u32)];
        if self.pap {
            // Only the authenticator requests this one
            descriptors.push(
                OptionDescriptor::new(options::AUTH_PROTOCOL, 2, protocols::PAP as u32)
                    .disabled(),
            );
        }
        descriptors
    }

    fn is_valid(&self, desc: &OptionDescriptor, value: u32) -> bool {
        match desc.opt_type {
            options::MRU => value <= MAX_MRU as u32,
            options::AUTH_PROTOCOL => value == protocols::PAP as u32,
            _ => false,
        }
    }

    fn nak_value(&self, desc: &OptionDescriptor, requested: Option<u32>) -> Option<u32> {
        match (desc.opt_type, requested) {
            (options::MRU, Some(_)) => Some(MAX_MRU as u32),
            _ => Some(desc.default),
        }
    }

    fn adopt_nak(&self, desc: &OptionDescriptor, suggested: u32) -> Option<u32> {
        match desc.opt_type {
            options::MRU => Some(suggested.min(MAX_MRU as u32)),
            _ => None,
        }
    }

    fn option_name(&self, opt_type: u8) -> &'static str {
        options::name(opt_type)
    }
}
