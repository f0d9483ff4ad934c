//! Frame dispatcher
//!
//! The [`Engine`] decodes inbound octets, routes PPP frames by protocol
//! number to the owning instance and wires the layers together: LCP
//! coming up starts authentication or IPCP, LCP going down takes the
//! upper layers with it. Layer notifications go through a FIFO queue
//! that is drained after every input, so no instance is ever entered
//! while another one is still executing actions.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::fsm::{Event, State};
use super::instance::{ControlProtocol, CpConfig};
use super::ipcp::IpcpPolicy;
use super::lcp::LcpPolicy;
use super::monitor::LinkMonitor;
use super::pap::{PapClient, PapSettings};
use super::{EngineAction, Layer, Outbox, Signal};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::link::LinkEvent;
use crate::protocol::cp::{codes, ControlPacket};
use crate::protocol::fcs::FcsWidth;
use crate::protocol::hdlc::{Accm, FrameError, FrameReader};
use crate::protocol::lcp::{self as lcp_wire, options as lcp_options};
use crate::protocol::ipcp::{self as ipcp_wire, options as ipcp_options};
use crate::protocol::pap::PapPacket;
use crate::protocol::ppp::{protocols, PppFrame};
use crate::telemetry::LinkStats;

/// Input queued for one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Event(Event),
    Timeout(u64),
    LowerUp,
    LowerDown,
    Close(&'static str),
}

/// PPP control plane for one link
#[derive(Debug)]
pub struct Engine {
    lcp: ControlProtocol<LcpPolicy>,
    ipcp: ControlProtocol<IpcpPolicy>,
    pap: Option<PapClient>,
    monitor: LinkMonitor,
    reader: FrameReader,
    accm_tx: Accm,
    fcs: FcsWidth,
    stats: Arc<LinkStats>,
    pending: VecDeque<(Layer, Input)>,
}

impl Engine {
    /// Build an engine from a validated configuration
    pub fn new(config: &Config, stats: Arc<LinkStats>) -> Self {
        let fcs = if config.link.fcs == 32 {
            FcsWidth::Fcs32
        } else {
            FcsWidth::Fcs16
        };

        let mut lcp_policy = LcpPolicy::new(config.lcp.mru);
        if config.pap.is_some() {
            lcp_policy = lcp_policy.with_pap();
        }
        let lcp = ControlProtocol::new(
            Layer::Lcp,
            lcp_wire::SUPPORTED_CODES,
            lcp_policy,
            CpConfig {
                restart_timer: config.lcp.restart_timer(),
                max_configure: config.lcp.max_configure,
                max_terminate: config.lcp.max_terminate,
                max_failure: config.lcp.max_failure,
            },
        );

        let ipcp = ControlProtocol::new(
            Layer::Ipcp,
            ipcp_wire::SUPPORTED_CODES,
            IpcpPolicy::new(
                config.ipcp.address,
                config.ipcp.peer_address,
                config.ipcp.require_peer_address,
            ),
            CpConfig {
                restart_timer: config.ipcp.restart_timer(),
                max_configure: config.ipcp.max_configure,
                max_terminate: config.ipcp.max_terminate,
                max_failure: config.ipcp.max_failure,
            },
        );

        let pap = config.pap.as_ref().map(|pap| {
            PapClient::new(PapSettings {
                username: pap.username.clone(),
                password: pap.password.clone(),
                retry_timer: pap.retry_timer(),
                max_retries: pap.max_retries,
            })
        });

        Self {
            lcp,
            ipcp,
            pap,
            monitor: LinkMonitor::new(config.lcp.echo_interval(), config.lcp.echo_failures),
            reader: FrameReader::new(Accm(config.link.accm_rx), fcs),
            accm_tx: Accm(config.link.accm_tx),
            fcs,
            stats,
            pending: VecDeque::new(),
        }
    }

    pub fn lcp_state(&self) -> State {
        self.lcp.state()
    }

    pub fn ipcp_state(&self) -> State {
        self.ipcp.state()
    }

    pub fn lcp(&self) -> &ControlProtocol<LcpPolicy> {
        &self.lcp
    }

    pub fn ipcp(&self) -> &ControlProtocol<IpcpPolicy> {
        &self.ipcp
    }

    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    pub fn is_network_up(&self) -> bool {
        self.ipcp.is_opened()
    }

    /// MRU the peer announced, the default when it did not
    pub fn peer_mru(&self) -> usize {
        self.lcp
            .options()
            .get(lcp_options::MRU)
            .and_then(|desc| desc.peer)
            .map_or(lcp_wire::DEFAULT_MRU as usize, |mru| mru as usize)
    }

    /// Local and peer IPv4 addresses as negotiated by IPCP
    pub fn addresses(&self) -> (Ipv4Addr, Ipv4Addr) {
        let policy = self.ipcp.options().policy();
        let desc = self.ipcp.options().get(ipcp_options::IP_ADDRESS);
        let local = desc
            .and_then(|d| d.local)
            .map_or(policy.address(), Ipv4Addr::from);
        let peer = desc
            .and_then(|d| d.peer)
            .map(Ipv4Addr::from)
            .or(policy.peer_address())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        (local, peer)
    }

    /// Administrative open of LCP and IPCP
    pub fn open(&mut self) -> Vec<EngineAction> {
        info!("Opening link");
        self.pending.push_back((Layer::Lcp, Input::Event(Event::Open)));
        self.pending.push_back((Layer::Ipcp, Input::Event(Event::Open)));
        self.run(self.outbox())
    }

    /// Administrative close; LCP terminates and takes IPCP down
    pub fn close(&mut self) -> Vec<EngineAction> {
        info!("Closing link");
        self.pending.push_back((Layer::Lcp, Input::Event(Event::Close)));
        self.run(self.outbox())
    }

    /// Lower layer notification from the link driver
    pub fn link_event(&mut self, event: LinkEvent) -> Vec<EngineAction> {
        match event {
            LinkEvent::Up => {
                info!("Link up");
                self.pending.push_back((Layer::Lcp, Input::Event(Event::Up)));
            }
            LinkEvent::Down => {
                info!("Link down");
                self.reader.reset();
                self.pending.push_back((Layer::Lcp, Input::Event(Event::Down)));
                self.pending.push_back((Layer::Pap, Input::LowerDown));
                self.pending.push_back((Layer::Ipcp, Input::Event(Event::Down)));
                self.pending.push_back((Layer::Monitor, Input::LowerDown));
            }
        }
        self.run(self.outbox())
    }

    /// Timer expiry for `layer`, as requested by [`EngineAction::ArmTimer`]
    pub fn timeout(&mut self, layer: Layer, token: u64) -> Vec<EngineAction> {
        self.pending.push_back((layer, Input::Timeout(token)));
        self.run(self.outbox())
    }

    /// Feed octets read from the link
    pub fn receive(&mut self, data: &[u8]) -> Vec<EngineAction> {
        let mut out = self.outbox();
        for frame in self.reader.consume(data) {
            match frame {
                Ok(frame) => {
                    self.stats.record_rx(frame.len());
                    self.handle_frame(&frame, &mut out);
                    self.drain(&mut out);
                }
                Err(FrameError::BadFcs) => {
                    debug!("Dropping frame with bad FCS");
                    self.stats.fcs_errors.inc();
                }
                Err(e) => {
                    debug!(error = ?e, "Dropping frame");
                    self.stats.framing_errors.inc();
                }
            }
        }
        out.into_actions()
    }

    /// Frame an outgoing IPv4 datagram, dropped unless IPCP is opened
    pub fn send_ip(&mut self, datagram: &[u8]) -> Vec<EngineAction> {
        let mut out = self.outbox();
        if self.ipcp.is_opened() {
            out.send(protocols::IP, datagram);
        } else {
            debug!(len = datagram.len(), "Network down, dropping datagram");
            self.stats.dropped.inc();
        }
        out.into_actions()
    }

    fn outbox(&self) -> Outbox {
        Outbox::new(self.accm_tx, self.fcs, self.peer_mru(), self.stats.clone())
    }

    fn run(&mut self, mut out: Outbox) -> Vec<EngineAction> {
        self.drain(&mut out);
        out.into_actions()
    }

    /// Process signals and queued inputs until both are empty
    fn drain(&mut self, out: &mut Outbox) {
        loop {
            while let Some(signal) = out.next_signal() {
                self.route(signal, out);
            }
            let Some((layer, input)) = self.pending.pop_front() else {
                break;
            };
            if let Err(e) = self.deliver(layer, input, out) {
                self.note_error(layer, e);
            }
        }
    }

    fn deliver(&mut self, layer: Layer, input: Input, out: &mut Outbox) -> Result<()> {
        trace!(%layer, ?input, "Deliver");
        match (layer, input) {
            (Layer::Lcp, Input::Event(event)) => self.lcp.event(event, out),
            (Layer::Lcp, Input::Timeout(token)) => self.lcp.timeout(token, out),
            (Layer::Lcp, Input::Close(reason)) => {
                info!(%reason, "Closing LCP");
                self.lcp.event(Event::Close, out)
            }
            (Layer::Ipcp, Input::Event(event)) => self.ipcp.event(event, out),
            (Layer::Ipcp, Input::Timeout(token)) => self.ipcp.timeout(token, out),
            (Layer::Ipcp, Input::Close(_)) => self.ipcp.event(Event::Close, out),
            (Layer::Pap, input) => match (self.pap.as_mut(), input) {
                (Some(pap), Input::LowerUp) => pap.lower_up(out),
                (Some(pap), Input::LowerDown) => {
                    pap.lower_down();
                    Ok(())
                }
                (Some(pap), Input::Timeout(token)) => pap.timeout(token, out),
                _ => Ok(()),
            },
            (Layer::Monitor, Input::LowerUp) => {
                self.monitor.start(out);
                Ok(())
            }
            (Layer::Monitor, Input::LowerDown) => {
                self.monitor.stop();
                Ok(())
            }
            (Layer::Monitor, Input::Timeout(token)) => {
                self.monitor.timeout(token, out);
                Ok(())
            }
            (layer, input) => {
                debug!(%layer, ?input, "Input not applicable");
                Ok(())
            }
        }
    }

    /// Turn a layer notification into inputs for the layers above/below
    fn route(&mut self, signal: Signal, out: &mut Outbox) {
        debug!(?signal, "Signal");
        match signal {
            Signal::Up(Layer::Lcp) => {
                self.pending.push_back((Layer::Monitor, Input::LowerUp));
                if self.pap.is_some() && self.peer_wants_pap() {
                    self.pending.push_back((Layer::Pap, Input::LowerUp));
                } else {
                    self.pending.push_back((Layer::Ipcp, Input::Event(Event::Up)));
                }
            }
            Signal::Down(Layer::Lcp) => {
                self.pending.push_back((Layer::Pap, Input::LowerDown));
                self.pending.push_back((Layer::Ipcp, Input::Event(Event::Down)));
                self.pending.push_back((Layer::Monitor, Input::LowerDown));
            }
            Signal::Finished(Layer::Lcp) => {
                info!("LCP finished");
                out.push(EngineAction::LinkFinished);
            }
            Signal::Up(Layer::Pap) => {
                self.pending.push_back((Layer::Ipcp, Input::Event(Event::Up)));
            }
            Signal::Up(Layer::Ipcp) => {
                let (local, peer) = self.addresses();
                info!(%local, %peer, "Network up");
                out.push(EngineAction::NetworkUp { local, peer });
            }
            Signal::Down(Layer::Ipcp) => {
                info!("Network down");
                out.push(EngineAction::NetworkDown);
            }
            Signal::Finished(Layer::Ipcp) => {
                debug!("IPCP finished");
            }
            Signal::Close(layer, reason) => {
                self.pending.push_back((layer, Input::Close(reason)));
            }
            Signal::Started(_) | Signal::Up(_) | Signal::Down(_) | Signal::Finished(_) => {}
        }
    }

    /// Whether the peer asked to authenticate us with PAP
    fn peer_wants_pap(&self) -> bool {
        self.lcp
            .options()
            .get(lcp_options::AUTH_PROTOCOL)
            .and_then(|desc| desc.peer)
            == Some(protocols::PAP as u32)
    }

    fn handle_frame(&mut self, frame: &[u8], out: &mut Outbox) {
        let ppp = match PppFrame::parse(frame) {
            Ok(ppp) => ppp,
            Err(e) => {
                debug!(error = %e, "Dropping frame");
                self.stats.malformed.inc();
                return;
            }
        };
        let protocol = ppp.protocol();
        let payload = ppp.payload();
        trace!(protocol = format_args!("{:#06x}", protocol), len = payload.len(), "RX frame");

        // Only LCP runs until LCP is opened
        if protocol != protocols::LCP && !self.lcp.is_opened() {
            debug!(protocol = format_args!("{:#06x}", protocol), "LCP not opened, dropping");
            self.stats.dropped.inc();
            return;
        }

        let result = match protocol {
            protocols::LCP => self.receive_lcp(payload, out),
            protocols::IPCP => {
                ControlPacket::parse(payload).and_then(|p| self.ipcp.receive(&p, out))
            }
            protocols::PAP if self.pap.is_some() => self.receive_pap(payload, out),
            protocols::IP => {
                if self.ipcp.is_opened() {
                    self.stats.datagrams_delivered.inc();
                    out.push(EngineAction::Deliver(payload.to_vec()));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => {
                self.lcp.send_protocol_reject(protocol, payload, out);
                Ok(true)
            }
        };

        match result {
            Ok(true) => {}
            Ok(false) => self.stats.dropped.inc(),
            Err(e) => {
                let layer = match protocol {
                    protocols::IPCP => Layer::Ipcp,
                    protocols::PAP => Layer::Pap,
                    _ => Layer::Lcp,
                };
                self.note_error(layer, e);
            }
        }
    }

    fn receive_lcp(&mut self, payload: &[u8], out: &mut Outbox) -> Result<bool> {
        let packet = ControlPacket::parse(payload)?;
        match packet.code() {
            codes::PROTOCOL_REJECT => {
                let protocol = packet.rejected_protocol().ok_or_else(|| {
                    Error::InvalidPacket("Protocol-Reject without protocol".to_string())
                })?;
                warn!(protocol = format_args!("{:#06x}", protocol), "Peer rejected protocol");
                match protocol {
                    protocols::LCP => self.lcp.event(Event::ReceiveCodeRejectCritical, out)?,
                    protocols::IPCP | protocols::IP => {
                        self.ipcp.event(Event::ReceiveCodeRejectCritical, out)?
                    }
                    protocols::PAP => {
                        out.signal(Signal::Close(Layer::Lcp, "peer refused PAP"));
                    }
                    _ => self.lcp.receive(&packet, out).map(|_| ())?,
                }
                Ok(true)
            }
            codes::ECHO_REPLY => {
                self.monitor.echo_reply(packet.identifier());
                self.lcp.receive(&packet, out)
            }
            _ => self.lcp.receive(&packet, out),
        }
    }

    fn receive_pap(&mut self, payload: &[u8], out: &mut Outbox) -> Result<bool> {
        let packet = PapPacket::parse(payload)?;
        Ok(match self.pap.as_mut() {
            Some(pap) => pap.receive(&packet, out),
            None => false,
        })
    }

    fn note_error(&self, layer: Layer, error: Error) {
        match error {
            Error::BufferFull { .. } => {
                warn!(%layer, %error, "Negotiation overflowed option buffer");
                self.stats.option_overflows.inc();
            }
            _ => {
                debug!(%layer, %error, "Dropping malformed packet");
                self.stats.malformed.inc();
            }
        }
    }
}
