//! IPCP option rules

use std::net::Ipv4Addr;

use super::option::{OptionDescriptor, OptionPolicy};
use crate::protocol::ipcp::options;

/// Negotiates the IP-Address option
///
/// We request `address`, where 0.0.0.0 asks the peer to assign one. The
/// peer must use a non-zero address, and `peer_address` when configured;
/// that is also the value suggested in a Nak. Without a `peer_address`
/// an unusable address is rejected.
#[derive(Debug, Clone)]
pub struct IpcpPolicy {
    address: Ipv4Addr,
    peer_address: Option<Ipv4Addr>,
    require_peer_address: bool,
}

impl IpcpPolicy {
    pub fn new(
        address: Ipv4Addr,
        peer_address: Option<Ipv4Addr>,
        require_peer_address: bool,
    ) -> Self {
        Self {
            address,
            peer_address,
            require_peer_address,
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn peer_address(&self) -> Option<Ipv4Addr> {
        self.peer_address
    }
}

impl OptionPolicy for IpcpPolicy {
    fn descriptors(&self) -> Vec<OptionDescriptor> {
        let desc = OptionDescriptor::new(options::IP_ADDRESS, 4, u32::from(self.address));
        if self.require_peer_address {
            vec![desc.required()]
        } else {
            vec![desc]
        }
    }

    fn is_valid(&self, desc: &OptionDescriptor, value: u32) -> bool {
        match desc.opt_type {
            options::IP_ADDRESS => {
                value != 0 && self.peer_address.map_or(true, |p| u32::from(p) == value)
            }
            _ => false,
        }
    }

    fn nak_value(&self, desc: &OptionDescriptor, requested: Option<u32>) -> Option<u32> {
        match (desc.opt_type, self.peer_address, requested) {
            (options::IP_ADDRESS, Some(peer), _) => Some(u32::from(peer)),
            // No address to hand out
            (options::IP_ADDRESS, None, Some(_)) => None,
            // Ask the peer to include its own address
            (options::IP_ADDRESS, None, None) => Some(0),
            _ => Some(desc.default),
        }
    }

    fn adopt_nak(&self, desc: &OptionDescriptor, suggested: u32) -> Option<u32> {
        match desc.opt_type {
            options::IP_ADDRESS if suggested != 0 => Some(suggested),
            _ => None,
        }
    }

    fn option_name(&self, opt_type: u8) -> &'static str {
        options::name(opt_type)
    }
}
