//! Client death cleanup.
//!
//! Runs from the dispatch loop's post-action phase (never from inside a
//! handler still holding IPC state) against the PID named by
//! [`ServerState::pending_destroy`](crate::ServerState::pending_destroy).
//! Ordering follows the donor's `proc_release`: notify watchers, orphan
//! children, reply to a blocked parent, then release owned resources.

use refos_core::{NotificationRecord, Pid, SysError, SysResult};
use refos_mm::{PdObjectSource, WindowMode};

use crate::kernel::{EndpointHandle, Kernel};
use crate::ServerState;

/// Releases `pid`'s process entirely: notifies watchers and the parent,
/// then releases every resource the PCB owned.
///
/// Returns [`SysError::Invalid`] if `pid` does not name a live process.
pub fn release<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, pid: Pid) -> SysResult<()> {
    let Some(pcb) = state.pids.free(pid) else {
        log::warn!("death::release called on unknown pid {pid}");
        return Err(SysError::Invalid);
    };
    let (parent, exit_status) = {
        let p = pcb.borrow();
        (p.parent, p.exit_status)
    };

    notify_watchers(state, pid, exit_status);
    orphan_children(state, pid);
    if let Some(parent) = parent {
        reply_to_waiting_parent(state, parent, exit_status);
    }

    let mut p = pcb.borrow_mut();

    if let Some(dspace) = p.param_buffer.take() {
        release_dataspace_ref(state, dspace);
    }
    p.ring = None;
    if let Some(cap) = p.saved_reply.take() {
        state.kernel.drop_reply(cap);
    }

    let (tracked, windows) = p.vspace.borrow_mut().teardown();
    for obj in tracked {
        state.kernel.free_endpoint(EndpointHandle(obj.0 as u32));
    }
    for window_id in windows {
        release_window(state, window_id);
    }
    let pd_slot = p.vspace.borrow().pd_slot;
    state.pdpool.free(pd_slot, &mut state.kernel);

    for slot in p.watch_list.drain() {
        state.kernel.free_endpoint(EndpointHandle(slot.notify_ep));
    }

    log::debug!("released pid {pid}");
    Ok(())
}

fn notify_watchers<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dead: Pid, exit_status: i32) {
    let watchers: Vec<Pid> = {
        let mut out = Vec::new();
        state.pids.iterate(|watcher, pcb| {
            if pcb.borrow().watch_list.is_watching(dead) {
                out.push(watcher);
            }
        });
        out
    };
    let record = NotificationRecord::death(dead.as_u32(), exit_status);
    for watcher in watchers {
        let Some(pcb) = state.pcb(watcher) else { continue };
        let mut p = pcb.borrow_mut();
        if let Some(cell) = p.ring.as_mut() {
            let (ring, writer) = cell.get_mut();
            if writer.write_record(ring, record).is_err() {
                log::error!("death notification ring full for pid {watcher}, record dropped");
            }
        } else {
            log::warn!("pid {watcher} watches {dead} but has no notification ring installed");
        }
        p.watch_list.unwatch(dead);
    }
}

fn orphan_children<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dead: Pid) {
    state.pids.iterate(|_, pcb| {
        let mut p = pcb.borrow_mut();
        if p.parent == Some(dead) {
            p.parent = None;
            p.parent_waiting = false;
        }
    });
}

fn reply_to_waiting_parent<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, parent: Pid, exit_status: i32) {
    let Some(pcb) = state.pcb(parent) else {
        log::warn!("death cleanup: parent pid {parent} no longer live");
        return;
    };
    let mut p = pcb.borrow_mut();
    if !p.parent_waiting {
        return;
    }
    let Some(cap) = p.saved_reply.take() else {
        log::warn!("parent {parent} marked waiting but has no saved reply");
        return;
    };
    p.parent_waiting = false;
    drop(p);
    state.kernel.send_reply(cap, exit_status as i64);
}

pub(crate) fn release_dataspace_ref<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dspace: refos_core::DataspaceId) {
    let Some(ds) = state.dataspaces.get_mut(dspace) else { return };
    if ds.decref() == 0 {
        state.dataspaces.remove(dspace);
        for window_id in state.windows.windows_backed_by(dspace) {
            if let Some(w) = state.windows.get_mut(window_id) {
                w.set_mode(WindowMode::Empty);
            }
        }
    }
}

pub(crate) fn release_window<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, window_id: refos_core::WindowId) {
    let Some(window) = state.windows.remove(window_id) else { return };
    match window.mode {
        WindowMode::Empty => {}
        WindowMode::Anonymous { dspace, .. } => release_dataspace_ref(state, dspace),
        WindowMode::ExternalPager { notify_ep, .. } => {
            state.kernel.free_endpoint(EndpointHandle(notify_ep));
        }
    }
}
