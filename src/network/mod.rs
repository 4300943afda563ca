//! Network subsystem for UDP audio transport
//!
//! Wire format: one datagram payload is exactly one raw PCM frame. No
//! header, no sequence number, no length prefix; both ends must agree on
//! the frame byte size ahead of time.

pub mod udp;

pub(crate) mod receiver;
pub(crate) mod sender;
