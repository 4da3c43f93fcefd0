//! Process control block.

use std::cell::RefCell;
use std::rc::Rc;

use refos_core::{DataspaceId, Permissions, Pid, ThreadId};
use refos_ipc::{ClientWatchList, RingBuffer, RingWriter};
use refos_mm::VSpace;

use crate::kernel::ReplyCap;

/// A live process's control block.
///
/// Owned by the server's PID table ([`refos_mm::PidAllocator`]). The
/// vspace is reference-counted (`Rc`) because windows and the param
/// buffer can outlive a naive "one owner" model during teardown ordering;
/// in practice the PCB is the vspace's only real owner.
pub struct Pcb {
    /// This process's PID. Matches its index in the PID table.
    pub pid: Pid,
    /// Parent PID, non-owning. Cleared to `None` when the parent dies.
    pub parent: Option<Pid>,
    /// Name used only for logging.
    pub debug_name: String,
    /// Every thread in this process; index 0 is the initial thread and
    /// its lifetime equals the PCB's.
    pub threads: Vec<ThreadId>,
    /// This process's address space.
    pub vspace: Rc<RefCell<VSpace>>,
    /// Processes this PCB has subscribed to for death notification.
    pub watch_list: ClientWatchList,
    /// The dataspace installed as this process's oversized-call parameter
    /// buffer, if any.
    pub param_buffer: Option<DataspaceId>,
    /// This process's own notification ring, if it has installed one via
    /// `notification_buffer`.
    pub ring: Option<RefCell<(RingBuffer, RingWriter)>>,
    /// Privileged capabilities this process holds.
    pub permissions: Permissions,
    /// A reply saved by a handler that suspended this process's own call
    /// (distinct from replies this process owes to *its* clients).
    pub saved_reply: Option<ReplyCap>,
    /// Exit status set by `exit()`, consumed when a blocked parent is
    /// woken.
    pub exit_status: i32,
    /// True if the parent called `new_proc(block=true)` for this process
    /// and is suspended awaiting its exit.
    pub parent_waiting: bool,
    /// True while this process has a VM fault suspended on a saved reply
    /// (content-init or external-pager delegation). A second fault arriving
    /// while this is set is a book-keeping error, not a normal re-fault.
    pub fault_blocked: bool,
}

impl Pcb {
    /// Creates a new PCB for `pid`, with a fresh empty vspace.
    pub fn new(pid: Pid, parent: Option<Pid>, debug_name: String, vspace: VSpace) -> Self {
        Self {
            pid,
            parent,
            debug_name,
            threads: vec![ThreadId::INITIAL],
            vspace: Rc::new(RefCell::new(vspace)),
            watch_list: ClientWatchList::new(),
            param_buffer: None,
            ring: None,
            permissions: Permissions::empty(),
            saved_reply: None,
            exit_status: 0,
            parent_waiting: false,
            fault_blocked: false,
        }
    }

    /// Adds a cloned thread id to this process, returning it.
    pub fn spawn_thread(&mut self, tid: ThreadId) {
        self.threads.push(tid);
    }
}
