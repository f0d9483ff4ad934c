//! PAP client (RFC 1334)
//!
//! Sends Authenticate-Requests after LCP opens and retransmits them until
//! the authenticator answers or the retry budget runs out.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Layer, Outbox, Signal, TimerSlot};
use crate::error::Result;
use crate::protocol::pap::{self, PapPacket};
use crate::protocol::ppp::protocols;

/// PAP credentials and retransmission settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PapSettings {
    pub username: String,
    pub password: String,
    pub retry_timer: Duration,
    /// Retransmissions after the first request
    pub max_retries: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PapState {
    Idle,
    Requesting,
    Done,
}

#[derive(Debug)]
pub struct PapClient {
    settings: PapSettings,
    state: PapState,
    identifier: u8,
    retries_left: u8,
    timer: TimerSlot,
}

impl PapClient {
    pub fn new(settings: PapSettings) -> Self {
        Self {
            settings,
            state: PapState::Idle,
            identifier: 0,
            retries_left: 0,
            timer: TimerSlot::default(),
        }
    }

    pub fn state(&self) -> PapState {
        self.state
    }

    /// LCP opened, start authenticating
    pub fn lower_up(&mut self, out: &mut Outbox) -> Result<()> {
        self.state = PapState::Requesting;
        self.retries_left = self.settings.max_retries;
        self.send_request(out)
    }

    /// LCP went down
    pub fn lower_down(&mut self) {
        if self.state != PapState::Idle {
            debug!("PAP reset");
        }
        self.state = PapState::Idle;
        self.timer.disarm();
    }

    /// Handle an Authenticate-Ack or Authenticate-Nak
    ///
    /// Either answer completes authentication; a Nak is only logged, the
    /// authenticator decides whether to terminate the link. Returns false
    /// when the packet does not answer our outstanding request.
    pub fn receive(&mut self, packet: &PapPacket, out: &mut Outbox) -> bool {
        if self.state != PapState::Requesting || packet.identifier() != self.identifier {
            debug!(
                id = packet.identifier(),
                state = ?self.state,
                "Dropping unexpected PAP packet"
            );
            return false;
        }
        let message = packet.message().unwrap_or(&[]);
        let message = String::from_utf8_lossy(message);
        if packet.is_success() {
            info!(%message, "PAP authentication succeeded");
        } else if packet.is_failure() {
            warn!(%message, "PAP authentication refused");
        } else {
            debug!(code = packet.code(), "Ignoring PAP packet");
            return false;
        }
        self.timer.disarm();
        self.state = PapState::Done;
        out.signal(Signal::Up(Layer::Pap));
        true
    }

    pub fn timeout(&mut self, token: u64, out: &mut Outbox) -> Result<()> {
        if !self.timer.fire(token) || self.state != PapState::Requesting {
            return Ok(());
        }
        if self.retries_left == 0 {
            warn!("PAP authenticator did not answer");
            self.state = PapState::Idle;
            out.signal(Signal::Close(Layer::Lcp, "authentication timed out"));
            return Ok(());
        }
        self.retries_left -= 1;
        self.send_request(out)
    }

    fn send_request(&mut self, out: &mut Outbox) -> Result<()> {
        self.identifier = self.identifier.wrapping_add(1);
        let packet = pap::authenticate_request(
            self.identifier,
            &self.settings.username,
            &self.settings.password,
        )?;
        debug!(id = self.identifier, user = %self.settings.username, "Sending Authenticate-Request");
        out.send(protocols::PAP, &packet);
        self.timer.arm(Layer::Pap, self.settings.retry_timer, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::EngineAction;
    use crate::protocol::fcs::FcsWidth;
    use crate::protocol::hdlc::Accm;
    use crate::telemetry::LinkStats;
    use std::sync::Arc;

    fn outbox() -> Outbox {
        Outbox::new(Accm::ALL, FcsWidth::Fcs16, 1500, Arc::new(LinkStats::new()))
    }

    fn client() -> PapClient {
        PapClient::new(PapSettings {
            username: "user".to_string(),
            password: "secret".to_string(),
            retry_timer: Duration::from_secs(3),
            max_retries: 2,
        })
    }

    fn token(out: Outbox) -> u64 {
        out.into_actions()
            .into_iter()
            .find_map(|a| match a {
                EngineAction::ArmTimer { token, .. } => Some(token),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_ack_completes() {
        let mut pap = client();
        let mut out = outbox();
        pap.lower_up(&mut out).unwrap();
        assert_eq!(pap.state(), PapState::Requesting);

        let ack = pap::authenticate_response(1, true, "welcome").unwrap();
        let mut out = outbox();
        assert!(pap.receive(&PapPacket::parse(&ack).unwrap(), &mut out));
        assert_eq!(pap.state(), PapState::Done);
        assert_eq!(out.next_signal(), Some(Signal::Up(Layer::Pap)));
    }

    #[test]
    fn test_nak_also_completes() {
        let mut pap = client();
        pap.lower_up(&mut outbox()).unwrap();
        let nak = pap::authenticate_response(1, false, "bad password").unwrap();
        let mut out = outbox();
        assert!(pap.receive(&PapPacket::parse(&nak).unwrap(), &mut out));
        assert_eq!(out.next_signal(), Some(Signal::Up(Layer::Pap)));
    }

    #[test]
    fn test_wrong_identifier_dropped() {
        let mut pap = client();
        pap.lower_up(&mut outbox()).unwrap();
        let ack = pap::authenticate_response(9, true, "").unwrap();
        assert!(!pap.receive(&PapPacket::parse(&ack).unwrap(), &mut outbox()));
        assert_eq!(pap.state(), PapState::Requesting);
    }

    #[test]
    fn test_retries_then_closes_lcp() {
        let mut pap = client();
        let mut out = outbox();
        pap.lower_up(&mut out).unwrap();
        let mut t = token(out);

        for _ in 0..2 {
            let mut out = outbox();
            pap.timeout(t, &mut out).unwrap();
            assert_eq!(out.stats().tx_frames.get(), 1);
            t = token(out);
        }

        let mut out = outbox();
        pap.timeout(t, &mut out).unwrap();
        assert_eq!(pap.state(), PapState::Idle);
        assert_eq!(
            out.next_signal(),
            Some(Signal::Close(Layer::Lcp, "authentication timed out"))
        );
    }

    #[test]
    fn test_lower_down_cancels_timer() {
        let mut pap = client();
        let mut out = outbox();
        pap.lower_up(&mut out).unwrap();
        let t = token(out);
        pap.lower_down();
        let mut out = outbox();
        pap.timeout(t, &mut out).unwrap();
        assert!(out.into_actions().is_empty());
    }
}
