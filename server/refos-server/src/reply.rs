//! RAII wrapper around a saved reply capability.
//!
//! A saved reply is just an owned cslot whose sole legitimate consumer is
//! a later `send` or an explicit drop-on-death. Wrapping it means a
//! handler that loses track of a blocked client (forgets to reply, forgets
//! to hand it to death cleanup) is caught at drop time rather than
//! silently leaking a permanently-blocked thread.

use crate::kernel::{Kernel, ReplyCap};

/// An owned, not-yet-consumed reply capability.
pub struct ReplyHandle {
    cap: Option<ReplyCap>,
}

impl ReplyHandle {
    /// Wraps a freshly saved reply capability.
    pub fn new(cap: ReplyCap) -> Self {
        Self { cap: Some(cap) }
    }

    /// Sends `payload` on this reply and consumes the handle.
    pub fn send(mut self, kernel: &mut impl Kernel, payload: i64) {
        let cap = self.cap.take().expect("reply handle used twice");
        kernel.send_reply(cap, payload);
    }

    /// Revokes this reply without sending anything (the owning process
    /// died while the client was suspended on it).
    pub fn discard(mut self, kernel: &mut impl Kernel) {
        let cap = self.cap.take().expect("reply handle used twice");
        kernel.drop_reply(cap);
    }

    /// Hands the raw capability to a caller that will store it elsewhere
    /// (e.g. a content-init waiter queue) without consuming it yet.
    pub fn into_raw(mut self) -> ReplyCap {
        self.cap.take().expect("reply handle used twice")
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        if self.cap.is_some() {
            log::error!("reply handle dropped without being sent or discarded: a client may be stuck blocked forever");
        }
    }
}
