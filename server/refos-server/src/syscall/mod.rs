//! Client syscall surface, one module per interface group.
//!
//! Every handler here is a plain function over `&mut ServerState<K>` — the
//! real dispatch loop is expected to unmarshal a wire message, call the
//! matching handler, and either reply immediately or honour
//! [`crate::SyscallReply::Deferred`]. No handler touches
//! `pending_unblock`/`pending_destroy` directly except `exit` and
//! `window_map`, which are the two places the donor's handlers do the
//! same (`proc_queue_release`, waking a `window_map` caller).

pub mod dataspace;
pub mod memory;
pub mod nameserv;
pub mod process;
