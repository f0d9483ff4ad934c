//! Configuration option negotiation
//!
//! Each protocol instance owns an [`OptionTable`]: one [`OptionDescriptor`]
//! per option it understands plus an [`OptionPolicy`] that decides which
//! values are acceptable. The table classifies a peer's Configure-Request,
//! builds our own requests and folds Nak/Reject answers back into the
//! descriptors.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::cp::{self, ControlPacket, OPTION_HEADER_SIZE};

/// Capacity of the Nak/Reject work buffers
pub const OPTION_BUF_SIZE: usize = 128;

/// Per-option flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionFlags(u8);

impl OptionFlags {
    /// Include the option in our Configure-Requests
    pub const ENABLED: OptionFlags = OptionFlags(0x01);
    /// The peer must include the option in its Configure-Requests
    pub const REQUIRED: OptionFlags = OptionFlags(0x02);

    pub const fn union(self, other: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 | other.0)
    }

    pub fn contains(self, other: OptionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: OptionFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: OptionFlags) {
        self.0 &= !other.0;
    }
}

/// One negotiable option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub opt_type: u8,
    /// Size of the value in bytes (1, 2 or 4)
    pub size: usize,
    /// Value we put in our next Configure-Request
    pub value: u32,
    /// Value used when negotiation starts over
    pub default: u32,
    pub flags: OptionFlags,
    /// Value the peer acknowledged for us
    pub local: Option<u32>,
    /// Value we acknowledged for the peer
    pub peer: Option<u32>,
}

impl OptionDescriptor {
    /// Enabled descriptor requesting `default`
    pub fn new(opt_type: u8, size: usize, default: u32) -> Self {
        Self {
            opt_type,
            size,
            value: default,
            default,
            flags: OptionFlags::ENABLED,
            local: None,
            peer: None,
        }
    }

    /// Mark the option as mandatory in the peer's requests
    pub fn required(mut self) -> Self {
        self.flags.insert(OptionFlags::REQUIRED);
        self
    }

    /// Do not request the option ourselves
    pub fn disabled(mut self) -> Self {
        self.flags.remove(OptionFlags::ENABLED);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(OptionFlags::ENABLED)
    }

    pub fn is_required(&self) -> bool {
        self.flags.contains(OptionFlags::REQUIRED)
    }

    /// Decode option data, `None` when the size is wrong
    pub fn decode(&self, data: &[u8]) -> Option<u32> {
        if data.len() != self.size {
            return None;
        }
        Some(data.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
    }

    /// Encode `value` in this option's width
    pub fn encode(&self, value: u32) -> Vec<u8> {
        value.to_be_bytes()[4 - self.size.min(4)..].to_vec()
    }
}

/// Protocol-specific option rules
pub trait OptionPolicy: fmt::Debug {
    /// Descriptors for a fresh negotiation
    fn descriptors(&self) -> Vec<OptionDescriptor>;

    /// Whether the peer may use `value`
    fn is_valid(&self, desc: &OptionDescriptor, value: u32) -> bool;

    /// Value to suggest in a Configure-Nak
    ///
    /// `requested` is `None` when a required option is missing or its
    /// value has the wrong size. Returning `None` rejects the option.
    fn nak_value(&self, desc: &OptionDescriptor, requested: Option<u32>) -> Option<u32>;

    /// Value to request next after the peer suggested `suggested`
    ///
    /// `None` keeps the current value.
    fn adopt_nak(&self, desc: &OptionDescriptor, suggested: u32) -> Option<u32>;

    /// Option name for logs
    fn option_name(&self, opt_type: u8) -> &'static str;
}

/// Answer to a peer's Configure-Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ack,
    /// Options run for a Configure-Nak
    Nak(Vec<u8>),
    /// Options run for a Configure-Reject
    Reject(Vec<u8>),
}

impl Verdict {
    pub fn is_ack(&self) -> bool {
        matches!(self, Verdict::Ack)
    }

    /// Control packet code carrying this verdict
    pub fn code(&self) -> u8 {
        match self {
            Verdict::Ack => cp::codes::CONFIGURE_ACK,
            Verdict::Nak(_) => cp::codes::CONFIGURE_NAK,
            Verdict::Reject(_) => cp::codes::CONFIGURE_REJECT,
        }
    }
}

/// Bounded options run writer
#[derive(Debug)]
pub struct OptionWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl OptionWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    /// Append a complete TLV
    pub fn push_raw(&mut self, tlv: &[u8]) -> Result<()> {
        let available = self.capacity - self.buf.len();
        if tlv.len() > available {
            return Err(Error::BufferFull {
                needed: tlv.len(),
                available,
            });
        }
        self.buf.extend_from_slice(tlv);
        Ok(())
    }

    /// Append an option built from type and data
    pub fn push_option(&mut self, opt_type: u8, data: &[u8]) -> Result<()> {
        let needed = OPTION_HEADER_SIZE + data.len();
        let available = self.capacity - self.buf.len();
        if needed > available || needed > u8::MAX as usize {
            return Err(Error::BufferFull { needed, available });
        }
        self.buf.push(opt_type);
        self.buf.push(needed as u8);
        self.buf.extend_from_slice(data);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Option state of one protocol instance
#[derive(Debug)]
pub struct OptionTable<P> {
    policy: P,
    options: Vec<OptionDescriptor>,
    max_failure: u8,
    failures: u8,
}

impl<P: OptionPolicy> OptionTable<P> {
    pub fn new(policy: P, max_failure: u8) -> Self {
        let options = policy.descriptors();
        Self {
            policy,
            options,
            max_failure,
            failures: 0,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn get(&self, opt_type: u8) -> Option<&OptionDescriptor> {
        self.options.iter().find(|d| d.opt_type == opt_type)
    }

    fn get_mut(&mut self, opt_type: u8) -> Option<&mut OptionDescriptor> {
        self.options.iter_mut().find(|d| d.opt_type == opt_type)
    }

    /// Start negotiation over from the policy defaults
    pub fn reset(&mut self) {
        self.options = self.policy.descriptors();
        self.failures = 0;
    }

    /// Forget the Nak count, done on Initialize-Restart-Count
    pub fn reset_failures(&mut self) {
        self.failures = 0;
    }

    /// Whether Naks have been turned into Rejects
    pub fn nak_exhausted(&self) -> bool {
        self.failures >= self.max_failure
    }

    /// Classify a peer's Configure-Request
    ///
    /// Unknown options are rejected, unacceptable values are Nak'ed with
    /// our preferred value and missing required options are Nak'ed with
    /// their default. A Reject wins over a Nak which wins over an Ack.
    /// Once `max_failure` Naks were sent, unacceptable values are rejected
    /// instead and missing options are no longer asked for.
    pub fn classify(&mut self, request: &ControlPacket) -> Result<Verdict> {
        let mut reject = OptionWriter::new(OPTION_BUF_SIZE);
        let mut nak = OptionWriter::new(OPTION_BUF_SIZE);
        let mut seen = Vec::new();
        let exhausted = self.nak_exhausted();

        for opt in request.options()? {
            let Some(desc) = self.get(opt.opt_type) else {
                debug!(
                    option = self.policy.option_name(opt.opt_type),
                    opt_type = opt.opt_type,
                    "Rejecting unknown option"
                );
                reject.push_raw(opt.as_bytes())?;
                continue;
            };
            seen.push(opt.opt_type);

            let value = desc.decode(opt.data);
            if value.is_some_and(|v| self.policy.is_valid(desc, v)) {
                continue;
            }
            let suggestion = if exhausted {
                None
            } else {
                self.policy.nak_value(desc, value)
            };
            match suggestion {
                Some(suggestion) => {
                    debug!(
                        option = self.policy.option_name(desc.opt_type),
                        ?value,
                        suggestion,
                        "Nak'ing option"
                    );
                    nak.push_option(desc.opt_type, &desc.encode(suggestion))?;
                }
                None => reject.push_raw(opt.as_bytes())?,
            }
        }

        if !exhausted {
            for desc in self.options.iter().filter(|d| d.is_required()) {
                if seen.contains(&desc.opt_type) {
                    continue;
                }
                if let Some(suggestion) = self.policy.nak_value(desc, None) {
                    nak.push_option(desc.opt_type, &desc.encode(suggestion))?;
                }
            }
        }

        if !reject.is_empty() {
            return Ok(Verdict::Reject(reject.into_inner()));
        }
        if !nak.is_empty() {
            self.failures = self.failures.saturating_add(1);
            if self.nak_exhausted() {
                warn!(
                    failures = self.failures,
                    "Peer keeps sending unacceptable options, rejecting from now on"
                );
            }
            return Ok(Verdict::Nak(nak.into_inner()));
        }
        Ok(Verdict::Ack)
    }

    /// Options run for our next Configure-Request
    pub fn build_request(&self) -> Result<Vec<u8>> {
        let mut out = OptionWriter::new(OPTION_BUF_SIZE);
        for desc in self.options.iter().filter(|d| d.is_enabled()) {
            out.push_option(desc.opt_type, &desc.encode(desc.value))?;
        }
        Ok(out.into_inner())
    }

    /// Record the values of an acknowledged request of the peer
    pub fn apply_peer(&mut self, request: &ControlPacket) -> Result<()> {
        for opt in request.options()? {
            if let Some(desc) = self.get_mut(opt.opt_type) {
                desc.peer = desc.decode(opt.data);
            }
        }
        Ok(())
    }

    /// Record the values of our request the peer acknowledged
    pub fn apply_local(&mut self, sent: &[u8]) -> Result<()> {
        for opt in cp::OptionIter::new(sent)? {
            if let Some(desc) = self.get_mut(opt.opt_type) {
                desc.local = desc.decode(opt.data);
            }
        }
        Ok(())
    }

    /// Adopt the peer's suggestions from a Configure-Nak
    ///
    /// An option the peer asks for that we did not send gets enabled.
    pub fn handle_nak(&mut self, nak: &ControlPacket) -> Result<()> {
        for opt in nak.options()? {
            let Some(index) = self.options.iter().position(|d| d.opt_type == opt.opt_type)
            else {
                debug!(opt_type = opt.opt_type, "Ignoring Nak for unknown option");
                continue;
            };
            let desc = &self.options[index];
            let Some(suggested) = desc.decode(opt.data) else {
                continue;
            };
            if let Some(value) = self.policy.adopt_nak(desc, suggested) {
                debug!(
                    option = self.policy.option_name(opt.opt_type),
                    value, "Adopting peer suggestion"
                );
                let desc = &mut self.options[index];
                desc.value = value;
                desc.flags.insert(OptionFlags::ENABLED);
            }
        }
        Ok(())
    }

    /// Stop requesting the options of a Configure-Reject
    ///
    /// The reject must only contain options of `sent` verbatim, otherwise
    /// it is refused as a whole and nothing changes.
    pub fn handle_reject(&mut self, reject: &ControlPacket, sent: &[u8]) -> Result<()> {
        let options = reject.options()?;
        if let Some(opt) = options.clone().find(|opt| !cp::is_subset(opt.as_bytes(), sent)) {
            return Err(Error::InvalidPacket(format!(
                "Configure-Reject modifies option {}",
                opt.opt_type
            )));
        }
        for opt in options {
            if let Some(desc) = self.get_mut(opt.opt_type) {
                desc.flags.remove(OptionFlags::ENABLED);
                desc.local = None;
            }
        }
        Ok(())
    }
}
