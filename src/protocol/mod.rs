//! PPP wire formats
//!
//! Framing, frame check sequences and control packet codecs. Everything here
//! is pure parsing and building; the protocol automatons live in `control`.

pub mod cp;
pub mod fcs;
pub mod hdlc;
pub mod ipcp;
pub mod lcp;
pub mod pap;
pub mod ppp;
