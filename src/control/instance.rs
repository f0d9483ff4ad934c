//! Generic control protocol instance
//!
//! [`ControlProtocol`] runs the RFC 1661 automaton for one protocol
//! (LCP or IPCP). Received packets are mapped to events, events are
//! looked up in the transition table and the resulting actions are
//! carried out against an [`Outbox`].

use std::time::Duration;

use tracing::{debug, info, warn};

use super::fsm::{self, Actions, Event, State};
use super::option::{OptionPolicy, OptionTable, Verdict};
use super::{Layer, Outbox, Signal, TimerSlot};
use crate::error::{Error, Result};
use crate::protocol::cp::{codes, ControlPacket, CpBuilder};
use crate::protocol::lcp;

/// Restart parameters of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpConfig {
    pub restart_timer: Duration,
    /// Configure-Requests sent before giving up
    pub max_configure: u8,
    /// Terminate-Requests sent before giving up
    pub max_terminate: u8,
    /// Configure-Naks sent before rejecting instead
    pub max_failure: u8,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            restart_timer: Duration::from_secs(3),
            max_configure: 10,
            max_terminate: 2,
            max_failure: 5,
        }
    }
}

/// Packet currently being handled
#[derive(Debug)]
struct Received<'a> {
    packet: ControlPacket<'a>,
    verdict: Option<Verdict>,
}

/// One control protocol automaton
#[derive(Debug)]
pub struct ControlProtocol<P> {
    layer: Layer,
    supported_codes: u16,
    config: CpConfig,
    state: State,
    restart_counter: u8,
    options: OptionTable<P>,
    identifier: u8,
    /// Identifier and options of the outstanding Configure-Request
    request_id: u8,
    sent_options: Vec<u8>,
    /// Identifier of the outstanding Terminate-Request
    terminate_id: Option<u8>,
    timer: TimerSlot,
}

impl<P: OptionPolicy> ControlProtocol<P> {
    /// Create an instance in the Initial state
    ///
    /// `supported_codes` has bit `n` set for every code `n` the protocol
    /// understands; anything else is answered with a Code-Reject.
    pub fn new(layer: Layer, supported_codes: u16, policy: P, config: CpConfig) -> Self {
        Self {
            layer,
            supported_codes,
            config,
            state: State::Initial,
            restart_counter: 0,
            options: OptionTable::new(policy, config.max_failure),
            identifier: 0,
            request_id: 0,
            sent_options: Vec::new(),
            terminate_id: None,
            timer: TimerSlot::default(),
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn restart_counter(&self) -> u8 {
        self.restart_counter
    }

    pub fn options(&self) -> &OptionTable<P> {
        &self.options
    }

    pub fn is_opened(&self) -> bool {
        self.state == State::Opened
    }

    /// Whether the restart timer is running
    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    fn next_identifier(&mut self) -> u8 {
        self.identifier = self.identifier.wrapping_add(1);
        self.identifier
    }

    fn supports(&self, code: u8) -> bool {
        code < 16 && self.supported_codes & (1 << code) != 0
    }

    /// Feed an administrative or lower-layer event
    pub fn event(&mut self, event: Event, out: &mut Outbox) -> Result<()> {
        self.run(event, None, out)
    }

    /// Handle an expiry of the restart timer
    pub fn timeout(&mut self, token: u64, out: &mut Outbox) -> Result<()> {
        if !self.timer.fire(token) {
            debug!(layer = %self.layer, token, "Ignoring stale timer");
            return Ok(());
        }
        let event = if self.restart_counter > 0 {
            Event::TimeoutPositive
        } else {
            Event::TimeoutNegative
        };
        self.run(event, None, out)
    }

    /// Handle a received control packet
    ///
    /// Returns `Ok(false)` when the packet was dropped because it does not
    /// answer anything outstanding. Malformed packets yield an error and
    /// leave the instance untouched.
    pub fn receive(&mut self, packet: &ControlPacket, out: &mut Outbox) -> Result<bool> {
        let code = packet.code();
        let id = packet.identifier();
        debug!(
            layer = %self.layer,
            code = codes::name(code),
            id,
            state = ?self.state,
            "RX"
        );

        if !self.supports(code) {
            self.run(Event::ReceiveUnknownCode, Some(received(packet, None)), out)?;
            return Ok(true);
        }

        let (event, verdict) = match code {
            codes::CONFIGURE_REQUEST => {
                let verdict = self.options.classify(packet)?;
                let event = if verdict.is_ack() {
                    Event::ReceiveConfReqGood
                } else {
                    Event::ReceiveConfReqBad
                };
                (event, Some(verdict))
            }
            codes::CONFIGURE_ACK => {
                if id != self.request_id || packet.data() != self.sent_options.as_slice() {
                    debug!(layer = %self.layer, id, "Configure-Ack does not match request");
                    return Ok(false);
                }
                self.options.apply_local(&self.sent_options)?;
                (Event::ReceiveConfAck, None)
            }
            codes::CONFIGURE_NAK => {
                if id != self.request_id {
                    debug!(layer = %self.layer, id, "Configure-Nak does not match request");
                    return Ok(false);
                }
                self.options.handle_nak(packet)?;
                (Event::ReceiveConfNakOrRej, None)
            }
            codes::CONFIGURE_REJECT => {
                if id != self.request_id {
                    debug!(layer = %self.layer, id, "Configure-Reject does not match request");
                    return Ok(false);
                }
                self.options.handle_reject(packet, &self.sent_options)?;
                (Event::ReceiveConfNakOrRej, None)
            }
            codes::TERMINATE_REQUEST => (Event::ReceiveTermReq, None),
            codes::TERMINATE_ACK => {
                if self.terminate_id != Some(id) {
                    debug!(layer = %self.layer, id, "Terminate-Ack does not match request");
                    return Ok(false);
                }
                self.terminate_id = None;
                (Event::ReceiveTermAck, None)
            }
            codes::CODE_REJECT => {
                let rejected = packet
                    .rejected_code()
                    .ok_or_else(|| Error::InvalidPacket("empty Code-Reject".to_string()))?;
                if lcp::is_critical_code(rejected) {
                    warn!(layer = %self.layer, code = codes::name(rejected), "Peer rejected a required code");
                    (Event::ReceiveCodeRejectCritical, None)
                } else {
                    (Event::ReceiveCodeRejectNonCritical, None)
                }
            }
            // Protocol-Rejects are routed by the dispatcher; reaching
            // here means the rejected protocol is not one we run.
            codes::PROTOCOL_REJECT => (Event::ReceiveCodeRejectNonCritical, None),
            _ => (Event::ReceiveEchoOrDiscard, None),
        };

        self.run(event, Some(received(packet, verdict)), out)?;
        Ok(true)
    }

    /// Reject a PPP protocol we do not run (LCP only)
    pub fn send_protocol_reject(&mut self, protocol: u16, info: &[u8], out: &mut Outbox) {
        let id = self.next_identifier();
        let packet = CpBuilder::protocol_reject(id, protocol, info, out.mtu()).build();
        debug!(layer = %self.layer, protocol = format_args!("{:#06x}", protocol), "Sending Protocol-Reject");
        out.stats().protocol_rejects_sent.inc();
        out.send(self.layer.protocol(), &packet);
    }

    fn run(&mut self, event: Event, rx: Option<Received>, out: &mut Outbox) -> Result<()> {
        let Some(tr) = fsm::transition(self.state, event) else {
            debug!(layer = %self.layer, ?event, state = ?self.state, "Event ignored");
            return Ok(());
        };

        let old = self.state;
        if matches!(old, State::Starting | State::Closed | State::Stopped)
            && tr.actions.contains(Actions::SCR)
        {
            // Fresh negotiation
            self.options.reset();
        }
        if event == Event::Down {
            self.restart_counter = 0;
            self.terminate_id = None;
        }

        for action in tr.actions.iter() {
            self.perform(action, tr.actions, rx.as_ref(), out)?;
        }

        self.state = tr.next;
        if !self.state.uses_restart_timer() {
            self.timer.disarm();
        }
        if old != self.state {
            info!(
                layer = %self.layer,
                from = ?old,
                to = ?self.state,
                ?event,
                actions = ?tr.actions,
                "State change"
            );
        }
        Ok(())
    }

    fn perform(
        &mut self,
        action: Actions,
        all: Actions,
        rx: Option<&Received>,
        out: &mut Outbox,
    ) -> Result<()> {
        match action {
            Actions::TLU => out.signal(Signal::Up(self.layer)),
            Actions::TLD => out.signal(Signal::Down(self.layer)),
            Actions::TLS => out.signal(Signal::Started(self.layer)),
            Actions::TLF => out.signal(Signal::Finished(self.layer)),
            Actions::IRC => {
                self.restart_counter = if all.contains(Actions::STR) {
                    self.config.max_terminate
                } else {
                    self.config.max_configure
                };
                self.options.reset_failures();
            }
            Actions::ZRC => {
                self.restart_counter = 0;
                self.timer.arm(self.layer, self.config.restart_timer, out);
            }
            Actions::SCR => self.send_configure_request(out)?,
            Actions::SCA => {
                if let Some(rx) = rx {
                    self.options.apply_peer(&rx.packet)?;
                    let packet = CpBuilder::configure_ack(rx.packet.identifier())
                        .raw_data(rx.packet.data())
                        .build();
                    out.send(self.layer.protocol(), &packet);
                }
            }
            Actions::SCN => {
                if let Some(Received {
                    packet,
                    verdict: Some(verdict),
                }) = rx
                {
                    let options: &[u8] = match verdict {
                        Verdict::Nak(options) | Verdict::Reject(options) => options.as_slice(),
                        Verdict::Ack => &[],
                    };
                    let packet = CpBuilder::new(verdict.code(), packet.identifier())
                        .raw_data(options)
                        .build();
                    out.send(self.layer.protocol(), &packet);
                }
            }
            Actions::STR => {
                let id = self.next_identifier();
                self.terminate_id = Some(id);
                self.restart_counter = self.restart_counter.saturating_sub(1);
                let packet = CpBuilder::terminate_request(id).build();
                out.send(self.layer.protocol(), &packet);
                self.timer.arm(self.layer, self.config.restart_timer, out);
            }
            Actions::STA => {
                let id = match rx {
                    Some(rx) => rx.packet.identifier(),
                    None => self.next_identifier(),
                };
                let packet = CpBuilder::terminate_ack(id).build();
                out.send(self.layer.protocol(), &packet);
            }
            Actions::SCJ => {
                if let Some(rx) = rx {
                    let id = self.next_identifier();
                    let packet =
                        CpBuilder::code_reject(id, rx.packet.as_bytes(), out.mtu()).build();
                    out.stats().code_rejects_sent.inc();
                    out.send(self.layer.protocol(), &packet);
                }
            }
            Actions::SER => {
                if let Some(rx) = rx.filter(|rx| rx.packet.code() == codes::ECHO_REQUEST) {
                    let packet =
                        CpBuilder::echo_reply(rx.packet.identifier(), 0, rx.packet.data())
                            .build();
                    out.send(self.layer.protocol(), &packet);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn send_configure_request(&mut self, out: &mut Outbox) -> Result<()> {
        let options = self.options.build_request()?;
        let id = self.next_identifier();
        self.request_id = id;
        self.restart_counter = self.restart_counter.saturating_sub(1);
        let packet = CpBuilder::configure_request(id).raw_data(&options).build();
        self.sent_options = options;
        out.send(self.layer.protocol(), &packet);
        self.timer.arm(self.layer, self.config.restart_timer, out);
        Ok(())
    }
}

fn received<'a>(packet: &ControlPacket<'a>, verdict: Option<Verdict>) -> Received<'a> {
    Received {
        packet: *packet,
        verdict,
    }
}
