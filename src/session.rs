//! Session runtime
//!
//! A [`Session`] owns an [`Engine`] and a [`LinkDriver`] and runs them on
//! one task: driver reads, application commands and timer expiries are
//! multiplexed with `tokio::select!` and fed to the engine one at a
//! time. Timers are one-shot tasks that post their token back through the
//! command channel.

use std::net::Ipv4Addr;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::control::{Engine, EngineAction, Layer};
use crate::link::{LinkDriver, LinkEvent};
use crate::telemetry::LinkStatsSnapshot;
use crate::{Error, Result};

/// Receive buffer size, one maximum-size escaped frame fits
const RECV_BUF_SIZE: usize = 4096;

/// Requests from the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    SendIp(Vec<u8>),
}

#[derive(Debug)]
enum Message {
    Command(Command),
    Timeout { layer: Layer, token: u64 },
}

/// Notifications for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    NetworkUp { local: Ipv4Addr, peer: Ipv4Addr },
    NetworkDown,
    Datagram(Vec<u8>),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// LCP finished (closed locally, terminated by the peer or gave up)
    Finished,
    /// The driver reported the link gone
    LinkDown,
}

/// Summary returned when a session ends
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// Last negotiated (local, peer) addresses
    pub network: Option<(Ipv4Addr, Ipv4Addr)>,
    pub stats: LinkStatsSnapshot,
}

/// Cloneable control handle for a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl SessionHandle {
    pub fn open(&self) -> Result<()> {
        self.command(Command::Open)
    }

    /// Terminate the link gracefully
    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    pub fn send_ip(&self, datagram: Vec<u8>) -> Result<()> {
        self.command(Command::SendIp(datagram))
    }

    fn command(&self, command: Command) -> Result<()> {
        self.tx
            .send(Message::Command(command))
            .map_err(|_| Error::LinkClosed)
    }
}

pub struct Session<D> {
    engine: Engine,
    driver: D,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    network: Option<(Ipv4Addr, Ipv4Addr)>,
}

impl<D: LinkDriver> Session<D> {
    pub fn new(engine: Engine, driver: D) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            engine,
            driver,
            tx,
            rx,
            events: None,
            network: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    /// Receive network events; a later call replaces the earlier receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Bring the link up, open it and run until it finishes or goes away
    pub async fn run(mut self) -> Result<SessionReport> {
        let actions = self.engine.link_event(LinkEvent::Up);
        if let Some(end) = self.perform(actions).await? {
            return Ok(self.report(end));
        }
        let actions = self.engine.open();
        if let Some(end) = self.perform(actions).await? {
            return Ok(self.report(end));
        }

        let mut buf = vec![0u8; RECV_BUF_SIZE];
        let end = loop {
            let actions = tokio::select! {
                Some(message) = self.rx.recv() => self.handle_message(message),
                result = self.driver.recv(&mut buf) => {
                    let n = result?;
                    if n == 0 {
                        let actions = self.engine.link_event(LinkEvent::Down);
                        self.notify_only(actions);
                        break SessionEnd::LinkDown;
                    }
                    let mut actions = self.engine.receive(&buf[..n]);
                    while self.driver.recv_available() > 0 {
                        let n = self.driver.recv(&mut buf).await?;
                        actions.extend(self.engine.receive(&buf[..n]));
                    }
                    actions
                }
            };
            if let Some(end) = self.perform(actions).await? {
                break end;
            }
        };

        info!(?end, "Session ended");
        Ok(self.report(end))
    }

    fn handle_message(&mut self, message: Message) -> Vec<EngineAction> {
        match message {
            Message::Command(Command::Open) => self.engine.open(),
            Message::Command(Command::Close) => self.engine.close(),
            Message::Command(Command::SendIp(datagram)) => self.engine.send_ip(&datagram),
            Message::Timeout { layer, token } => self.engine.timeout(layer, token),
        }
    }

    async fn perform(&mut self, actions: Vec<EngineAction>) -> Result<Option<SessionEnd>> {
        let mut end = None;
        for action in actions {
            match action {
                EngineAction::Transmit(bytes) => self.driver.send(&bytes).await?,
                EngineAction::ArmTimer {
                    layer,
                    after,
                    token,
                } => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        // Session may be gone by now
                        let _ = tx.send(Message::Timeout { layer, token });
                    });
                }
                EngineAction::LinkFinished => end = Some(SessionEnd::Finished),
                other => self.notify(other),
            }
        }
        Ok(end)
    }

    /// Forward notifications, dropping anything that needs the link
    fn notify_only(&mut self, actions: Vec<EngineAction>) {
        for action in actions {
            match action {
                EngineAction::Transmit(_)
                | EngineAction::ArmTimer { .. }
                | EngineAction::LinkFinished => {}
                other => self.notify(other),
            }
        }
    }

    fn notify(&mut self, action: EngineAction) {
        let event = match action {
            EngineAction::NetworkUp { local, peer } => {
                self.network = Some((local, peer));
                SessionEvent::NetworkUp { local, peer }
            }
            EngineAction::NetworkDown => SessionEvent::NetworkDown,
            EngineAction::Deliver(datagram) => SessionEvent::Datagram(datagram),
            _ => return,
        };
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Event subscriber gone");
                self.events = None;
            }
        } else if let SessionEvent::Datagram(datagram) = event {
            warn!(len = datagram.len(), "No subscriber, dropping datagram");
        }
    }

    fn report(&self, end: SessionEnd) -> SessionReport {
        SessionReport {
            end,
            network: self.network,
            stats: self.engine.stats().snapshot(),
        }
    }
}
