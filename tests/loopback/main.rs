//! Loopback tests: two engines negotiating against each other
//!
//! ```text
//! ┌──────────────┐  HDLC frames  ┌──────────────┐
//! │    client    │◀─────────────▶│    server    │
//! │ asks for an  │               │   10.0.0.1   │
//! │   address    │               │ assigns .2   │
//! └──────────────┘               └──────────────┘
//! ```

mod harness;

use harness::{connect, exchange, Node};
use pppos::config::Config;
use pppos::control::{Engine, EngineAction, State};
use pppos::link::StreamLink;
use pppos::session::{Session, SessionEnd, SessionEvent};
use pppos::telemetry::LinkStats;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const ASSIGNED: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

fn client_config() -> Config {
    let mut config = Config::default();
    config.lcp.echo_interval_secs = 0;
    config.ipcp.address = Ipv4Addr::UNSPECIFIED;
    config.ipcp.peer_address = None;
    config.ipcp.require_peer_address = false;
    config
}

fn server_config() -> Config {
    let mut config = Config::default();
    config.lcp.echo_interval_secs = 0;
    config.ipcp.address = SERVER;
    config.ipcp.peer_address = Some(ASSIGNED);
    config.ipcp.require_peer_address = true;
    config
}

#[test]
fn test_negotiation_reaches_opened() {
    let mut client = Node::new(&client_config());
    let mut server = Node::new(&server_config());
    connect(&mut client, &mut server);

    assert_eq!(client.engine.lcp_state(), State::Opened);
    assert_eq!(server.engine.lcp_state(), State::Opened);
    assert_eq!(client.engine.ipcp_state(), State::Opened);
    assert_eq!(server.engine.ipcp_state(), State::Opened);

    assert!(client.logged(&EngineAction::NetworkUp {
        local: ASSIGNED,
        peer: SERVER,
    }));
    assert!(server.logged(&EngineAction::NetworkUp {
        local: SERVER,
        peer: ASSIGNED,
    }));
    assert_eq!(client.engine.peer_mru(), 1500);
}

#[test]
fn test_datagrams_cross_the_link() {
    let mut client = Node::new(&client_config());
    let mut server = Node::new(&server_config());
    connect(&mut client, &mut server);

    // Minimal IPv4 header with bytes that need escaping
    let datagram = vec![0x45, 0x00, 0x00, 0x14, 0x7e, 0x7d, 0x11, 0x00];
    let actions = client.engine.send_ip(&datagram);
    let wire = client.absorb(actions);
    exchange(&mut client, &mut server, wire, Vec::new());

    assert!(server.logged(&EngineAction::Deliver(datagram)));
    assert_eq!(server.engine.stats().datagrams_delivered.get(), 1);
}

#[test]
fn test_close_terminates_both_sides() {
    let mut client = Node::new(&client_config());
    let mut server = Node::new(&server_config());
    connect(&mut client, &mut server);

    let actions = client.engine.close();
    let wire = client.absorb(actions);
    exchange(&mut client, &mut server, wire, Vec::new());

    assert!(client.logged(&EngineAction::NetworkDown));
    assert!(client.logged(&EngineAction::LinkFinished));
    assert_eq!(client.engine.lcp_state(), State::Closed);

    // Server acknowledged and waits out its restart timer
    assert!(server.logged(&EngineAction::NetworkDown));
    assert_eq!(server.engine.lcp_state(), State::Stopping);
}

#[test]
fn test_fcs32_without_escaping() {
    let mut client_cfg = client_config();
    let mut server_cfg = server_config();
    for config in [&mut client_cfg, &mut server_cfg] {
        config.link.fcs = 32;
        config.link.accm_rx = 0;
        config.link.accm_tx = 0;
    }
    let mut client = Node::new(&client_cfg);
    let mut server = Node::new(&server_cfg);
    connect(&mut client, &mut server);

    assert_eq!(client.engine.ipcp_state(), State::Opened);
    assert_eq!(server.engine.ipcp_state(), State::Opened);
    assert_eq!(client.engine.stats().fcs_errors.get(), 0);
}

#[test]
fn test_mismatched_fcs_never_opens() {
    let mut server_cfg = server_config();
    server_cfg.link.fcs = 32;
    let mut client = Node::new(&client_config());
    let mut server = Node::new(&server_cfg);
    connect(&mut client, &mut server);

    assert!(!client.engine.lcp().is_opened());
    assert!(!server.engine.lcp().is_opened());
    assert!(server.engine.stats().fcs_errors.get() > 0);
}

#[test]
fn test_smaller_mru_is_acked() {
    let mut client_cfg = client_config();
    client_cfg.lcp.mru = 1400;
    let mut client = Node::new(&client_cfg);
    let mut server = Node::new(&server_config());
    connect(&mut client, &mut server);

    assert_eq!(server.engine.peer_mru(), 1400);
    assert_eq!(client.engine.peer_mru(), 1500);
}

#[test]
fn test_oversized_mru_renegotiated_after_nak() {
    // Engine::new does not validate, so the client can ask for too much
    let mut client_cfg = client_config();
    client_cfg.lcp.mru = 4000;
    let mut client = Node::new(&client_cfg);
    let mut server = Node::new(&server_config());
    connect(&mut client, &mut server);

    assert!(client.engine.lcp().is_opened());
    assert!(server.engine.lcp().is_opened());
    // MRU option, Nak'ed down to 2000 and requested again
    let mru = client.engine.lcp().options().get(1).unwrap();
    assert_eq!(mru.value, 2000);
    assert_eq!(mru.local, Some(2000));
    assert_eq!(server.engine.peer_mru(), 2000);
}

#[tokio::test]
async fn test_sessions_over_duplex() {
    let (a, b) = tokio::io::duplex(16 * 1024);

    let mut client = Session::new(
        Engine::new(&client_config(), Arc::new(LinkStats::new())),
        StreamLink::new(a),
    );
    let server = Session::new(
        Engine::new(&server_config(), Arc::new(LinkStats::new())),
        StreamLink::new(b),
    );

    let mut events = client.subscribe();
    let handle = client.handle();
    let client_task = tokio::spawn(client.run());
    let server_task = tokio::spawn(server.run());

    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("network did not come up")
        .expect("session ended early");
    assert_eq!(
        event,
        SessionEvent::NetworkUp {
            local: ASSIGNED,
            peer: SERVER,
        }
    );

    handle.close().unwrap();
    let report = tokio::time::timeout(Duration::from_secs(10), client_task)
        .await
        .expect("client did not finish")
        .unwrap()
        .unwrap();
    assert_eq!(report.end, SessionEnd::Finished);
    assert_eq!(report.network, Some((ASSIGNED, SERVER)));

    // Server sees the link go away once the client hangs up
    let report = tokio::time::timeout(Duration::from_secs(10), server_task)
        .await
        .expect("server did not finish")
        .unwrap()
        .unwrap();
    assert!(matches!(
        report.end,
        SessionEnd::LinkDown | SessionEnd::Finished
    ));
}
