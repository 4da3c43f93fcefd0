//! Seam between process-server logic and the underlying capability
//! operations the real microkernel provides.
//!
//! The microkernel itself is out of scope (spec §1). This trait captures
//! just enough of its surface — endpoint allocation, frame retyping, PD
//! pool object creation, reply-capability save/send — that the rest of
//! this crate can be exercised against [`MockKernel`] without one.

use refos_mm::{CNodeHandle, FrameHandle, PdHandle, PdObjectSource};

/// An owned kernel endpoint capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointHandle(pub u32);

/// A saved reply capability, captured from the current IPC caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCap(pub u64);

/// Kernel-level operations the dispatch loop and syscall handlers need.
pub trait Kernel {
    /// Allocates a synchronous endpoint.
    fn new_endpoint(&mut self) -> Option<EndpointHandle>;
    /// Allocates an asynchronous notification endpoint.
    fn new_async_endpoint(&mut self) -> Option<EndpointHandle>;
    /// Revokes and frees a previously allocated endpoint.
    fn free_endpoint(&mut self, ep: EndpointHandle);
    /// Retypes a fresh anonymous RAM frame.
    fn new_frame(&mut self) -> Option<FrameHandle>;
    /// Frees a previously retyped frame.
    fn free_frame(&mut self, frame: FrameHandle);
    /// Captures the current IPC caller's reply capability into a fresh
    /// cslot, suspending them until it is used.
    fn save_reply(&mut self) -> ReplyCap;
    /// Sends a reply on a saved capability, consuming it.
    fn send_reply(&mut self, reply: ReplyCap, payload: i64);
    /// Revokes a saved reply capability without sending anything (used
    /// when the owning process dies while a client is suspended on it).
    fn drop_reply(&mut self, reply: ReplyCap);
    /// Signals an asynchronous endpoint (non-blocking), waking whoever is
    /// waiting on it in a blocking-receive.
    fn notify(&mut self, ep: EndpointHandle);
}

/// An in-memory [`Kernel`] used by tests: every handle is just a counter.
#[derive(Default)]
pub struct MockKernel {
    next_ep: u32,
    next_frame: u64,
    next_reply: u64,
    /// Replies sent, in order, as `(reply, payload)` — inspected by tests.
    pub sent_replies: Vec<(ReplyCap, i64)>,
    /// Replies dropped without a payload — inspected by tests.
    pub dropped_replies: Vec<ReplyCap>,
    /// Endpoints notified, in order — inspected by tests.
    pub notified: Vec<EndpointHandle>,
}

impl MockKernel {
    /// Creates a fresh mock kernel.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Kernel for MockKernel {
    fn new_endpoint(&mut self) -> Option<EndpointHandle> {
        self.next_ep += 1;
        Some(EndpointHandle(self.next_ep))
    }

    fn new_async_endpoint(&mut self) -> Option<EndpointHandle> {
        self.new_endpoint()
    }

    fn free_endpoint(&mut self, _ep: EndpointHandle) {}

    fn new_frame(&mut self) -> Option<FrameHandle> {
        self.next_frame += 1;
        Some(FrameHandle(self.next_frame))
    }

    fn free_frame(&mut self, _frame: FrameHandle) {}

    fn save_reply(&mut self) -> ReplyCap {
        self.next_reply += 1;
        ReplyCap(self.next_reply)
    }

    fn send_reply(&mut self, reply: ReplyCap, payload: i64) {
        self.sent_replies.push((reply, payload));
    }

    fn drop_reply(&mut self, reply: ReplyCap) {
        self.dropped_replies.push(reply);
    }

    fn notify(&mut self, ep: EndpointHandle) {
        self.notified.push(ep);
    }
}

impl PdObjectSource for MockKernel {
    fn new_pd(&mut self, idx: usize) -> PdHandle {
        PdHandle(idx as u32)
    }

    fn new_cnode(&mut self, idx: usize) -> CNodeHandle {
        self.next_ep += 1;
        let _ = idx;
        CNodeHandle(self.next_ep)
    }
}
