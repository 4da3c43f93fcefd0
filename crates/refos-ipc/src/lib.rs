//! Notification transport for the refos process-server: the ring buffer,
//! the name server, and per-process death-watch lists.
//!
//! None of these types perform real IPC; they model the shared-memory and
//! bookkeeping side of the protocol so `refos-server`'s dispatch loop can
//! drive them synchronously and be unit-tested without a kernel.

#![warn(missing_docs)]

pub mod nameserver;
pub mod ring;
pub mod watch;

pub use nameserver::{EndpointHandle, NameServer};
pub use ring::{RingBuffer, RingReader, RingWriter};
pub use watch::{ClientWatchList, WatchSlot};
