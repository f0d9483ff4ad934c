//! Link drivers
//!
//! The engine never touches a device itself. A [`LinkDriver`] moves raw
//! octets between the session and whatever carries them: a serial port,
//! a pseudo-terminal, a TCP connection to a terminal server or an
//! in-memory pipe in tests.

mod stream;

pub use stream::StreamLink;

use crate::Result;
use std::future::Future;

/// Lower-layer notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link can carry frames
    Up,
    /// The link is gone
    Down,
}

/// Link driver trait
///
/// All drivers must implement this trait to be used with a session.
pub trait LinkDriver: Send {
    /// Write escaped, flag-delimited frame bytes to the link
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Octets that can be read without waiting
    fn recv_available(&self) -> usize;

    /// Read octets into `buf`; 0 means the link went down
    ///
    /// Completion of this future is the data-ready notification.
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;
}
