//! LCP Echo keepalive
//!
//! While LCP is opened an Echo-Request goes out every `interval`. Any
//! matching Echo-Reply clears the miss count; after `max_failures`
//! unanswered requests in a row (at least one) the link is closed.

use std::time::Duration;

use tracing::{debug, warn};

use super::{Layer, Outbox, Signal, TimerSlot};
use crate::protocol::cp::CpBuilder;
use crate::protocol::ppp::protocols;

#[derive(Debug)]
pub struct LinkMonitor {
    interval: Duration,
    max_failures: u8,
    outstanding: u8,
    identifier: u8,
    active: bool,
    timer: TimerSlot,
}

impl LinkMonitor {
    /// A zero `interval` disables the monitor
    pub fn new(interval: Duration, max_failures: u8) -> Self {
        Self {
            interval,
            max_failures,
            outstanding: 0,
            identifier: 0,
            active: false,
            timer: TimerSlot::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unanswered Echo-Requests
    pub fn outstanding(&self) -> u8 {
        self.outstanding
    }

    pub fn start(&mut self, out: &mut Outbox) {
        if self.interval.is_zero() {
            return;
        }
        self.active = true;
        self.outstanding = 0;
        self.timer.arm(Layer::Monitor, self.interval, out);
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.outstanding = 0;
        self.timer.disarm();
    }

    pub fn echo_reply(&mut self, identifier: u8) {
        if self.active && identifier == self.identifier {
            self.outstanding = 0;
        }
    }

    pub fn timeout(&mut self, token: u64, out: &mut Outbox) {
        if !self.timer.fire(token) || !self.active {
            return;
        }
        // Zero tolerance still gives the peer one request to answer
        if self.outstanding > 0 && self.outstanding >= self.max_failures {
            warn!(missed = self.outstanding, "Peer stopped answering Echo-Requests");
            self.stop();
            out.signal(Signal::Close(Layer::Lcp, "peer not responding"));
            return;
        }
        self.identifier = self.identifier.wrapping_add(1);
        self.outstanding += 1;
        debug!(id = self.identifier, outstanding = self.outstanding, "Sending Echo-Request");
        let packet = CpBuilder::echo_request(self.identifier, 0).build();
        out.send(protocols::LCP, &packet);
        self.timer.arm(Layer::Monitor, self.interval, out);
    }
}
