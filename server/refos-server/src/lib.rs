//! The refos process-server: wires the PID table, PD pool, window and
//! dataspace tables, and name server behind a single dispatch entry point.
//!
//! Everything here is driven by one `&mut ServerState` from a single
//! cooperative loop; no field is ever behind a `Mutex`/`RwLock` (see
//! [`dispatch`] for the concurrency model this implements).

#![warn(missing_docs)]

pub mod config;
pub mod death;
pub mod dispatch;
pub mod fault;
pub mod kernel;
pub mod pcb;
pub mod reply;
pub mod syscall;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use refos_core::{Pid, SysError, SysResult, WindowId};
use refos_ipc::NameServer;
use refos_mm::{PdObjectSource, PdPool, PidAllocator, RamDataspaceTable, VSpace, WindowTable};

use kernel::{Kernel, ReplyCap};
use pcb::Pcb;

/// Shared, interior-mutable handle to a live process's control block.
pub type PcbHandle = Rc<RefCell<Pcb>>;

/// A faulter suspended behind a window's external pager, waiting for
/// `window_map` to service it.
pub struct PagerWaiter {
    /// The process whose fault is suspended.
    pub faulter: Pid,
    /// Its saved reply capability.
    pub reply: ReplyCap,
}

/// A faulter `window_map` has already picked a payload for, whose reply
/// the post-action phase must actually send.
///
/// The reply-send is deferred out of `window_map` itself so the reply
/// capability and the rest of this dispatch's IPC state are not mutated
/// while a handler is still using them.
pub struct PendingUnblock {
    /// The process to unblock.
    pub pid: Pid,
    /// Its saved reply capability.
    pub reply: ReplyCap,
    /// The payload `window_map` computed (`src_addr`).
    pub payload: i64,
}

/// What a syscall handler wants the dispatch loop to do about replying to
/// its caller.
pub enum SyscallReply {
    /// Reply immediately with this payload.
    Now(i64),
    /// Do not reply now; a saved reply capability will resume this caller
    /// later (`new_proc(block=true)`'s parent, `exit`'s caller — which
    /// never gets replied to at all).
    Deferred,
}

/// All server-owned tables plus the kernel backend.
pub struct ServerState<K> {
    /// Live processes, keyed by PID.
    pub pids: PidAllocator<PcbHandle>,
    /// Pool of pre-allocated page-directory/root-CNode pairs.
    pub pdpool: PdPool,
    /// Global window table.
    pub windows: WindowTable,
    /// Global anonymous-RAM-dataspace table.
    pub dataspaces: RamDataspaceTable,
    /// Hierarchical name server.
    pub nameserver: NameServer,
    /// Kernel capability operations.
    pub kernel: K,
    /// A faulter whose reply should be sent at the next post-action
    /// phase, if any (a pager just serviced `window_map`).
    pub pending_unblock: Option<PendingUnblock>,
    /// PID to fully release at the next post-action phase, if any (the
    /// client just called `exit`).
    pub pending_destroy: Option<Pid>,
    /// Faults suspended behind an external pager, keyed by the window they
    /// faulted in. `window_map` pops and resumes the oldest waiter.
    pub pager_waiters: HashMap<WindowId, Vec<PagerWaiter>>,
}

impl<K: Kernel + PdObjectSource> ServerState<K> {
    /// Builds a fresh server state with `pd_pool_size` pre-allocated PD
    /// slots and room for `max_pids` simultaneously live processes.
    pub fn new(max_pids: usize, pd_pool_size: usize, mut kernel: K) -> Self {
        let pdpool = PdPool::new(pd_pool_size, &mut kernel);
        Self {
            pids: PidAllocator::new(max_pids),
            pdpool,
            windows: WindowTable::new(),
            dataspaces: RamDataspaceTable::new(),
            nameserver: NameServer::new(),
            kernel,
            pending_unblock: None,
            pending_destroy: None,
            pager_waiters: HashMap::new(),
        }
    }

    /// Looks up the PCB for `pid`, if live.
    pub fn pcb(&self, pid: Pid) -> Option<PcbHandle> {
        self.pids.get(pid).cloned()
    }

    /// Creates a new process: assigns a PID and a fresh vspace drawn from
    /// the PD pool.
    pub fn spawn_process(&mut self, parent: Option<Pid>, debug_name: String) -> SysResult<Pid> {
        let (slot, _pd, _cnode) = self.pdpool.assign()?;
        let vspace = VSpace::new(slot);
        let placeholder = Pid::new(0);
        let pcb = Rc::new(RefCell::new(Pcb::new(placeholder, parent, debug_name, vspace)));
        let Some(pid) = self.pids.alloc(pcb.clone()) else {
            self.pdpool.free(slot, &mut self.kernel);
            return Err(SysError::NoMem);
        };
        pcb.borrow_mut().pid = pid;
        log::debug!("spawned pid {pid} (parent {parent:?})");
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MockKernel;

    #[test]
    fn spawn_process_assigns_distinct_pids() {
        let mut state = ServerState::new(4, 4, MockKernel::new());
        let a = state.spawn_process(None, "a".into()).unwrap();
        let b = state.spawn_process(Some(a), "b".into()).unwrap();
        assert_ne!(a, b);
        assert_eq!(state.pcb(b).unwrap().borrow().parent, Some(a));
    }

    #[test]
    fn spawn_process_fails_once_pd_pool_is_exhausted() {
        let mut state = ServerState::new(4, 1, MockKernel::new());
        state.spawn_process(None, "a".into()).unwrap();
        assert_eq!(state.spawn_process(None, "b".into()), Err(SysError::NoMem));
    }
}
