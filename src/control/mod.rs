//! PPP control plane
//!
//! The [`Engine`] owns one protocol instance per layer (LCP, PAP, IPCP
//! and the LCP echo monitor) and connects them through an internal event
//! queue. It performs no I/O itself: every call returns the
//! [`EngineAction`]s the caller has to carry out (transmit bytes, arm a
//! timer, bring the network layer up or down).

pub mod dispatcher;
pub mod fsm;
pub mod instance;
pub mod ipcp;
pub mod lcp;
pub mod monitor;
pub mod option;
pub mod pap;

use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::protocol::fcs::FcsWidth;
use crate::protocol::hdlc::{self, Accm};
use crate::protocol::ppp::{protocols, PppBuilder};
use crate::telemetry::LinkStats;

pub use dispatcher::Engine;
pub use fsm::{Event, State};
pub use instance::{ControlProtocol, CpConfig};

/// Protocol layers managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Lcp,
    Pap,
    Ipcp,
    /// LCP Echo keepalive
    Monitor,
}

impl Layer {
    /// PPP protocol number carrying this layer's packets
    pub fn protocol(self) -> u16 {
        match self {
            Layer::Lcp | Layer::Monitor => protocols::LCP,
            Layer::Pap => protocols::PAP,
            Layer::Ipcp => protocols::IPCP,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Lcp => "LCP",
            Layer::Pap => "PAP",
            Layer::Ipcp => "IPCP",
            Layer::Monitor => "LCP-echo",
        };
        f.write_str(name)
    }
}

/// Work the caller of the engine has to carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Write these bytes (an escaped, flag-delimited frame) to the link
    Transmit(Vec<u8>),
    /// Call [`Engine::timeout`] with `layer` and `token` after `after`
    ///
    /// Arming again supersedes earlier tokens of the same layer; stale
    /// tokens are ignored by the engine.
    ArmTimer {
        layer: Layer,
        after: Duration,
        token: u64,
    },
    /// IPCP reached Opened
    NetworkUp { local: Ipv4Addr, peer: Ipv4Addr },
    /// IPCP left Opened
    NetworkDown,
    /// An IP datagram arrived
    Deliver(Vec<u8>),
    /// LCP finished, the link can be released
    LinkFinished,
}

/// Layer notifications routed by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Up(Layer),
    Down(Layer),
    Started(Layer),
    Finished(Layer),
    /// Ask `layer` to close administratively
    Close(Layer, &'static str),
}

/// Collects what protocol instances emit while handling one input
#[derive(Debug)]
pub struct Outbox {
    actions: Vec<EngineAction>,
    signals: VecDeque<Signal>,
    accm: Accm,
    fcs: FcsWidth,
    mtu: usize,
    stats: Arc<LinkStats>,
}

impl Outbox {
    pub(crate) fn new(accm: Accm, fcs: FcsWidth, mtu: usize, stats: Arc<LinkStats>) -> Self {
        Self {
            actions: Vec::new(),
            signals: VecDeque::new(),
            accm,
            fcs,
            mtu,
            stats,
        }
    }

    /// Frame and queue a packet of `protocol` for transmission
    pub fn send(&mut self, protocol: u16, packet: &[u8]) {
        let frame = PppBuilder::new(protocol).payload(packet).build();
        let wire = hdlc::encode_frame(&frame, self.accm, self.fcs);
        trace!(protocol = format_args!("{:#06x}", protocol), len = wire.len(), "TX frame");
        self.stats.record_tx(wire.len());
        self.actions.push(EngineAction::Transmit(wire));
    }

    /// Largest packet the peer accepts
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub(crate) fn push(&mut self, action: EngineAction) {
        self.actions.push(action);
    }

    pub(crate) fn signal(&mut self, signal: Signal) {
        self.signals.push_back(signal);
    }

    pub(crate) fn next_signal(&mut self) -> Option<Signal> {
        self.signals.pop_front()
    }

    pub(crate) fn into_actions(self) -> Vec<EngineAction> {
        self.actions
    }
}

/// One restartable timer identified by a token
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    token: u64,
    armed: bool,
}

impl TimerSlot {
    pub(crate) fn arm(&mut self, layer: Layer, after: Duration, out: &mut Outbox) {
        self.token = self.token.wrapping_add(1);
        self.armed = true;
        out.push(EngineAction::ArmTimer {
            layer,
            after,
            token: self.token,
        });
    }

    pub(crate) fn disarm(&mut self) {
        if self.armed {
            self.token = self.token.wrapping_add(1);
            self.armed = false;
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consume an expiry, false when `token` is stale
    pub(crate) fn fire(&mut self, token: u64) -> bool {
        if !self.armed || token != self.token {
            return false;
        }
        self.armed = false;
        true
    }
}
