//! RFC 1661 §4 option negotiation automaton
//!
//! The state transition table is kept as two immutable tables indexed by
//! `[event][state]`: one holding the actions to perform, one holding the
//! next state. A `None` next state marks a transition the RFC leaves
//! undefined; such events are ignored.

use std::fmt;

/// Automaton states (RFC 1661 §4.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    Starting,
    Closed,
    Stopped,
    Closing,
    Stopping,
    ReqSent,
    AckRcvd,
    AckSent,
    Opened,
}

impl State {
    pub const ALL: [State; STATE_COUNT] = [
        State::Initial,
        State::Starting,
        State::Closed,
        State::Stopped,
        State::Closing,
        State::Stopping,
        State::ReqSent,
        State::AckRcvd,
        State::AckSent,
        State::Opened,
    ];

    /// Whether the restart timer runs in this state
    pub fn uses_restart_timer(self) -> bool {
        matches!(
            self,
            State::Closing | State::Stopping | State::ReqSent | State::AckRcvd | State::AckSent
        )
    }
}

/// Automaton events (RFC 1661 §4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Up,
    Down,
    Open,
    Close,
    TimeoutPositive,
    TimeoutNegative,
    ReceiveConfReqGood,
    ReceiveConfReqBad,
    ReceiveConfAck,
    ReceiveConfNakOrRej,
    ReceiveTermReq,
    ReceiveTermAck,
    ReceiveUnknownCode,
    ReceiveCodeRejectCritical,
    ReceiveCodeRejectNonCritical,
    ReceiveEchoOrDiscard,
}

impl Event {
    pub const ALL: [Event; EVENT_COUNT] = [
        Event::Up,
        Event::Down,
        Event::Open,
        Event::Close,
        Event::TimeoutPositive,
        Event::TimeoutNegative,
        Event::ReceiveConfReqGood,
        Event::ReceiveConfReqBad,
        Event::ReceiveConfAck,
        Event::ReceiveConfNakOrRej,
        Event::ReceiveTermReq,
        Event::ReceiveTermAck,
        Event::ReceiveUnknownCode,
        Event::ReceiveCodeRejectCritical,
        Event::ReceiveCodeRejectNonCritical,
        Event::ReceiveEchoOrDiscard,
    ];
}

pub const STATE_COUNT: usize = 10;
pub const EVENT_COUNT: usize = 16;

/// Set of actions (RFC 1661 §4.4)
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions(u16);

impl Actions {
    pub const NONE: Actions = Actions(0);
    /// This-Layer-Up
    pub const TLU: Actions = Actions(TLU);
    /// This-Layer-Down
    pub const TLD: Actions = Actions(TLD);
    /// This-Layer-Started
    pub const TLS: Actions = Actions(TLS);
    /// This-Layer-Finished
    pub const TLF: Actions = Actions(TLF);
    /// Initialize-Restart-Count
    pub const IRC: Actions = Actions(IRC);
    /// Zero-Restart-Count
    pub const ZRC: Actions = Actions(ZRC);
    /// Send-Configure-Request
    pub const SCR: Actions = Actions(SCR);
    /// Send-Configure-Ack
    pub const SCA: Actions = Actions(SCA);
    /// Send-Configure-Nak/Rej
    pub const SCN: Actions = Actions(SCN);
    /// Send-Terminate-Request
    pub const STR: Actions = Actions(STR);
    /// Send-Terminate-Ack
    pub const STA: Actions = Actions(STA);
    /// Send-Code-Reject
    pub const SCJ: Actions = Actions(SCJ);
    /// Send-Echo-Reply
    pub const SER: Actions = Actions(SER);

    /// Order in which actions of one transition are carried out
    pub const EXECUTION_ORDER: [Actions; 13] = [
        Actions::TLD,
        Actions::TLF,
        Actions::TLS,
        Actions::IRC,
        Actions::ZRC,
        Actions::SCR,
        Actions::SCA,
        Actions::SCN,
        Actions::STR,
        Actions::STA,
        Actions::SCJ,
        Actions::SER,
        Actions::TLU,
    ];

    pub const fn union(self, other: Actions) -> Actions {
        Actions(self.0 | other.0)
    }

    pub fn contains(self, other: Actions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Single actions of this set, in execution order
    pub fn iter(self) -> impl Iterator<Item = Actions> {
        Self::EXECUTION_ORDER
            .into_iter()
            .filter(move |a| self.contains(*a))
    }

    fn name(self) -> &'static str {
        match self.0 {
            TLU => "tlu",
            TLD => "tld",
            TLS => "tls",
            TLF => "tlf",
            IRC => "irc",
            ZRC => "zrc",
            SCR => "scr",
            SCA => "sca",
            SCN => "scn",
            STR => "str",
            STA => "sta",
            SCJ => "scj",
            SER => "ser",
            _ => "?",
        }
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let names: Vec<_> = self.iter().map(|a| a.name()).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Outcome of a defined transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub actions: Actions,
    pub next: State,
}

/// Look up the transition for `event` in `state`
///
/// Returns `None` when the RFC leaves the transition undefined.
pub fn transition(state: State, event: Event) -> Option<Transition> {
    let (e, s) = (event as usize, state as usize);
    NEXT_STATE[e][s].map(|next| Transition {
        actions: Actions(ACTIONS[e][s]),
        next,
    })
}

const TLU: u16 = 1 << 0;
const TLD: u16 = 1 << 1;
const TLS: u16 = 1 << 2;
const TLF: u16 = 1 << 3;
const IRC: u16 = 1 << 4;
const ZRC: u16 = 1 << 5;
const SCR: u16 = 1 << 6;
const SCA: u16 = 1 << 7;
const SCN: u16 = 1 << 8;
const STR: u16 = 1 << 9;
const STA: u16 = 1 << 10;
const SCJ: u16 = 1 << 11;
const SER: u16 = 1 << 12;

const X: Option<State> = None;
const INITIAL: Option<State> = Some(State::Initial);
const STARTING: Option<State> = Some(State::Starting);
const CLOSED: Option<State> = Some(State::Closed);
const STOPPED: Option<State> = Some(State::Stopped);
const CLOSING: Option<State> = Some(State::Closing);
const STOPPING: Option<State> = Some(State::Stopping);
const REQ_SENT: Option<State> = Some(State::ReqSent);
const ACK_RCVD: Option<State> = Some(State::AckRcvd);
const ACK_SENT: Option<State> = Some(State::AckSent);
const OPENED: Option<State> = Some(State::Opened);

// Columns: Initial, Starting, Closed, Stopped, Closing, Stopping,
//          ReqSent, AckRcvd, AckSent, Opened
#[rustfmt::skip]
static ACTIONS: [[u16; STATE_COUNT]; EVENT_COUNT] = [
    // Up
    [0, IRC | SCR, 0, 0, 0, 0, 0, 0, 0, 0],
    // Down
    [0, 0, 0, TLS, 0, 0, 0, 0, 0, TLD],
    // Open
    [TLS, 0, IRC | SCR, 0, 0, 0, 0, 0, 0, 0],
    // Close
    [0, TLF, 0, 0, 0, 0, IRC | STR, IRC | STR, IRC | STR, TLD | IRC | STR],
    // TO+
    [0, 0, 0, 0, STR, STR, SCR, SCR, SCR, 0],
    // TO-
    [0, 0, 0, 0, TLF, TLF, TLF, TLF, TLF, 0],
    // RCR+
    [0, 0, STA, IRC | SCR | SCA, 0, 0, SCA, SCA | TLU, SCA, TLD | SCR | SCA],
    // RCR-
    [0, 0, STA, IRC | SCR | SCN, 0, 0, SCN, SCN, SCN, TLD | SCR | SCN],
    // RCA
    [0, 0, STA, STA, 0, 0, IRC, SCR, IRC | TLU, TLD | SCR],
    // RCN
    [0, 0, STA, STA, 0, 0, IRC | SCR, SCR, IRC | SCR, TLD | SCR],
    // RTR
    [0, 0, STA, STA, STA, STA, STA, STA, STA, TLD | ZRC | STA],
    // RTA
    [0, 0, 0, 0, TLF, TLF, 0, 0, 0, TLD | SCR],
    // RUC
    [0, 0, SCJ, SCJ, SCJ, SCJ, SCJ, SCJ, SCJ, SCJ],
    // RXJ-
    [0, 0, TLF, TLF, TLF, TLF, TLF, TLF, TLF, TLD | IRC | STR],
    // RXJ+
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    // RXR
    [0, 0, 0, 0, 0, 0, 0, 0, 0, SER],
];

#[rustfmt::skip]
static NEXT_STATE: [[Option<State>; STATE_COUNT]; EVENT_COUNT] = [
    // Up
    [CLOSED, REQ_SENT, X, X, X, X, X, X, X, X],
    // Down
    [X, X, INITIAL, STARTING, INITIAL, STARTING, STARTING, STARTING, STARTING, STARTING],
    // Open
    [STARTING, STARTING, REQ_SENT, STOPPED, STOPPING, STOPPING, REQ_SENT, ACK_RCVD, ACK_SENT, OPENED],
    // Close
    [INITIAL, INITIAL, CLOSED, CLOSED, CLOSING, CLOSING, CLOSING, CLOSING, CLOSING, CLOSING],
    // TO+
    [X, X, X, X, CLOSING, STOPPING, REQ_SENT, REQ_SENT, ACK_SENT, X],
    // TO-
    [X, X, X, X, CLOSED, STOPPED, STOPPED, STOPPED, STOPPED, X],
    // RCR+
    [X, X, CLOSED, ACK_SENT, CLOSING, STOPPING, ACK_SENT, OPENED, ACK_SENT, ACK_SENT],
    // RCR-
    [X, X, CLOSED, REQ_SENT, CLOSING, STOPPING, REQ_SENT, ACK_RCVD, REQ_SENT, REQ_SENT],
    // RCA
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, ACK_RCVD, REQ_SENT, OPENED, REQ_SENT],
    // RCN
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, REQ_SENT, REQ_SENT, ACK_SENT, REQ_SENT],
    // RTR
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, REQ_SENT, REQ_SENT, REQ_SENT, STOPPING],
    // RTA
    [X, X, CLOSED, STOPPED, CLOSED, STOPPED, REQ_SENT, REQ_SENT, ACK_SENT, REQ_SENT],
    // RUC
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, REQ_SENT, ACK_RCVD, ACK_SENT, OPENED],
    // RXJ-
    [X, X, CLOSED, STOPPED, CLOSED, STOPPED, STOPPED, STOPPED, STOPPED, STOPPING],
    // RXJ+
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, REQ_SENT, REQ_SENT, ACK_SENT, OPENED],
    // RXR
    [X, X, CLOSED, STOPPED, CLOSING, STOPPING, REQ_SENT, ACK_RCVD, ACK_SENT, OPENED],
];

#[cfg(test)]
mod tests {
    use super::*;

    fn t(state: State, event: Event) -> Transition {
        transition(state, event).unwrap()
    }

    #[test]
    fn test_table_is_total() {
        for event in Event::ALL {
            for state in State::ALL {
                // Every pair yields a transition or an explicit "ignore"
                match transition(state, event) {
                    Some(tr) => assert!(State::ALL.contains(&tr.next)),
                    None => assert!(ACTIONS[event as usize][state as usize] == 0),
                }
            }
        }
    }

    #[test]
    fn test_enum_indices_match_tables() {
        for (i, state) in State::ALL.iter().enumerate() {
            assert_eq!(*state as usize, i);
        }
        for (i, event) in Event::ALL.iter().enumerate() {
            assert_eq!(*event as usize, i);
        }
    }

    #[test]
    fn test_open_from_initial() {
        let tr = t(State::Initial, Event::Open);
        assert_eq!(tr.actions, Actions::TLS);
        assert_eq!(tr.next, State::Starting);
    }

    #[test]
    fn test_up_from_starting() {
        let tr = t(State::Starting, Event::Up);
        assert_eq!(tr.actions, Actions::IRC.union(Actions::SCR));
        assert_eq!(tr.next, State::ReqSent);
    }

    #[test]
    fn test_ack_then_request_opens() {
        let tr = t(State::ReqSent, Event::ReceiveConfAck);
        assert_eq!(tr.actions, Actions::IRC);
        assert_eq!(tr.next, State::AckRcvd);

        let tr = t(State::AckRcvd, Event::ReceiveConfReqGood);
        assert_eq!(tr.actions, Actions::SCA.union(Actions::TLU));
        assert_eq!(tr.next, State::Opened);
    }

    #[test]
    fn test_request_then_ack_opens() {
        let tr = t(State::ReqSent, Event::ReceiveConfReqGood);
        assert_eq!(tr.actions, Actions::SCA);
        assert_eq!(tr.next, State::AckSent);

        let tr = t(State::AckSent, Event::ReceiveConfAck);
        assert_eq!(tr.actions, Actions::IRC.union(Actions::TLU));
        assert_eq!(tr.next, State::Opened);
    }

    #[test]
    fn test_renegotiation_from_opened() {
        let tr = t(State::Opened, Event::ReceiveConfReqBad);
        assert_eq!(
            tr.actions,
            Actions::TLD.union(Actions::SCR).union(Actions::SCN)
        );
        assert_eq!(tr.next, State::ReqSent);
    }

    #[test]
    fn test_terminate_request_in_opened() {
        let tr = t(State::Opened, Event::ReceiveTermReq);
        assert_eq!(
            tr.actions,
            Actions::TLD.union(Actions::ZRC).union(Actions::STA)
        );
        assert_eq!(tr.next, State::Stopping);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(t(State::ReqSent, Event::TimeoutPositive).next, State::ReqSent);
        assert_eq!(t(State::AckSent, Event::TimeoutPositive).next, State::AckSent);
        let tr = t(State::ReqSent, Event::TimeoutNegative);
        assert_eq!(tr.actions, Actions::TLF);
        assert_eq!(tr.next, State::Stopped);
        let tr = t(State::Closing, Event::TimeoutNegative);
        assert_eq!(tr.next, State::Closed);
        assert!(transition(State::Opened, Event::TimeoutPositive).is_none());
    }

    #[test]
    fn test_undefined_transitions() {
        assert!(transition(State::Initial, Event::ReceiveConfReqGood).is_none());
        assert!(transition(State::Starting, Event::Down).is_none());
        assert!(transition(State::Opened, Event::Up).is_none());
        assert!(transition(State::Closed, Event::TimeoutNegative).is_none());
    }

    #[test]
    fn test_code_reject_handling() {
        let tr = t(State::Opened, Event::ReceiveCodeRejectCritical);
        assert_eq!(
            tr.actions,
            Actions::TLD.union(Actions::IRC).union(Actions::STR)
        );
        assert_eq!(tr.next, State::Stopping);

        let tr = t(State::Opened, Event::ReceiveCodeRejectNonCritical);
        assert!(tr.actions.is_empty());
        assert_eq!(tr.next, State::Opened);

        // Unknown code is answered in every state past Starting
        for state in &State::ALL[2..] {
            assert_eq!(t(*state, Event::ReceiveUnknownCode).actions, Actions::SCJ);
        }
    }

    #[test]
    fn test_echo_only_answered_when_opened() {
        assert_eq!(t(State::Opened, Event::ReceiveEchoOrDiscard).actions, Actions::SER);
        assert!(t(State::AckSent, Event::ReceiveEchoOrDiscard).actions.is_empty());
    }

    #[test]
    fn test_execution_order() {
        let actions = Actions::TLU
            .union(Actions::SCA)
            .union(Actions::TLD)
            .union(Actions::IRC)
            .union(Actions::SCR);
        let order: Vec<_> = actions.iter().collect();
        assert_eq!(
            order,
            vec![
                Actions::TLD,
                Actions::IRC,
                Actions::SCR,
                Actions::SCA,
                Actions::TLU
            ]
        );
    }

    #[test]
    fn test_actions_debug() {
        let actions = Actions::IRC.union(Actions::SCR);
        assert_eq!(format!("{:?}", actions), "irc,scr");
        assert_eq!(format!("{:?}", Actions::NONE), "-");
    }

    #[test]
    fn test_timer_states() {
        assert!(State::ReqSent.uses_restart_timer());
        assert!(State::Closing.uses_restart_timer());
        assert!(!State::Opened.uses_restart_timer());
        assert!(!State::Stopped.uses_restart_timer());
        assert!(!State::Initial.uses_restart_timer());
    }
}
