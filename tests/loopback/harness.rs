//! In-memory link between two engines

use pppos::config::Config;
use pppos::control::{Engine, EngineAction};
use pppos::telemetry::LinkStats;
use std::sync::Arc;

/// One end of the link
pub struct Node {
    pub engine: Engine,
    /// Everything except transmissions, in order
    pub log: Vec<EngineAction>,
}

impl Node {
    pub fn new(config: &Config) -> Self {
        Self {
            engine: Engine::new(config, Arc::new(LinkStats::new())),
            log: Vec::new(),
        }
    }

    /// Split engine output into wire bytes and logged notifications
    pub fn absorb(&mut self, actions: Vec<EngineAction>) -> Vec<Vec<u8>> {
        let mut wire = Vec::new();
        for action in actions {
            match action {
                EngineAction::Transmit(bytes) => wire.push(bytes),
                // Timers never fire here
                EngineAction::ArmTimer { .. } => {}
                other => self.log.push(other),
            }
        }
        wire
    }

    pub fn logged(&self, action: &EngineAction) -> bool {
        self.log.contains(action)
    }
}

/// Deliver bytes back and forth until neither side transmits
pub fn exchange(a: &mut Node, b: &mut Node, mut a_tx: Vec<Vec<u8>>, mut b_tx: Vec<Vec<u8>>) {
    for _ in 0..100 {
        if a_tx.is_empty() && b_tx.is_empty() {
            return;
        }
        let mut next_a = Vec::new();
        let mut next_b = Vec::new();
        for bytes in a_tx.drain(..) {
            let actions = b.engine.receive(&bytes);
            next_b.extend(b.absorb(actions));
        }
        for bytes in b_tx.drain(..) {
            let actions = a.engine.receive(&bytes);
            next_a.extend(a.absorb(actions));
        }
        a_tx = next_a;
        b_tx = next_b;
    }
    panic!("link did not settle");
}

/// Open both ends and bring the link up
pub fn connect(a: &mut Node, b: &mut Node) {
    let mut a_tx = Vec::new();
    let mut b_tx = Vec::new();

    let actions = a.engine.open();
    a_tx.extend(a.absorb(actions));
    let actions = a.engine.link_event(pppos::link::LinkEvent::Up);
    a_tx.extend(a.absorb(actions));

    let actions = b.engine.open();
    b_tx.extend(b.absorb(actions));
    let actions = b.engine.link_event(pppos::link::LinkEvent::Up);
    b_tx.extend(b.absorb(actions));

    exchange(a, b, a_tx, b_tx);
}
