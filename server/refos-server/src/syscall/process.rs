//! Process-group syscalls: lifecycle, endpoints, death-watch, parameter
//! buffer, thread clone, IRQ handler.
//!
//! Grounded on `proc_syscall.c`'s handlers of the same name.

use refos_core::{DataspaceId, Permissions, Pid, SysError, SysResult, ThreadId};
use refos_mm::{PdObjectSource, TrackedObject};

use crate::kernel::Kernel;
use crate::{ServerState, SyscallReply};

/// `ping`: trivial liveness check.
pub fn ping() -> SysResult<()> {
    Ok(())
}

/// Allocates a synchronous endpoint, tracked on the caller's vspace.
pub fn new_endpoint<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, caller: Pid) -> SysResult<u32> {
    new_endpoint_inner(state, caller, false)
}

/// Allocates an asynchronous notification endpoint, tracked the same way.
pub fn new_async_endpoint<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, caller: Pid) -> SysResult<u32> {
    new_endpoint_inner(state, caller, true)
}

fn new_endpoint_inner<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    async_ep: bool,
) -> SysResult<u32> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    let ep = if async_ep { state.kernel.new_async_endpoint() } else { state.kernel.new_endpoint() }
        .ok_or(SysError::NoMem)?;
    pcb.borrow().vspace.borrow_mut().track(TrackedObject(ep.0 as u64));
    Ok(ep.0)
}

/// Subscribes `caller` to `target`'s death, delivered via `death_ep`.
pub fn watch_client<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    target: Pid,
    death_ep: u32,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if !state.pids.is_live(target) {
        return Err(SysError::InvalidParam);
    }
    pcb.borrow_mut().watch_list.watch(target, death_ep);
    Ok(())
}

/// Removes `caller`'s watch on `target`, if any.
pub fn unwatch_client<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, caller: Pid, target: Pid) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    pcb.borrow_mut().watch_list.unwatch(target);
    Ok(())
}

/// Installs (or clears) `caller`'s shared parameter buffer.
///
/// `size == 0 && dspace.is_none()` clears the buffer and always succeeds;
/// any other combination where exactly one of the two names the empty
/// value is rejected (see DESIGN.md's open-question decision).
pub fn set_parambuffer<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    dspace: Option<DataspaceId>,
    size: u64,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    match (dspace, size) {
        (None, 0) => {
            if let Some(old) = pcb.borrow_mut().param_buffer.take() {
                crate::death::release_dataspace_ref(state, old);
            }
            Ok(())
        }
        (Some(id), size) if size > 0 => {
            {
                let ds = state.dataspaces.get_mut(id).ok_or(SysError::InvalidParam)?;
                if ds.size_bytes() < size {
                    return Err(SysError::InvalidParam);
                }
                ds.incref();
            }
            let old = pcb.borrow_mut().param_buffer.replace(id);
            if let Some(old) = old {
                crate::death::release_dataspace_ref(state, old);
            }
            Ok(())
        }
        _ => Err(SysError::InvalidParam),
    }
}

/// Spawns a child via the selfloader trampoline.
///
/// If `block`, the caller's reply is saved and `parent_waiting` is set on
/// its own PCB; the reply is sent later from `death::release` once the
/// child exits. Otherwise replies immediately with the child's pid.
pub fn new_proc<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    name: String,
    block: bool,
) -> SysResult<SyscallReply> {
    if name.is_empty() {
        return Err(SysError::InvalidParam);
    }
    let child = state.spawn_process(Some(caller), name)?;
    if block {
        let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
        let cap = state.kernel.save_reply();
        let mut p = pcb.borrow_mut();
        p.saved_reply = Some(cap);
        p.parent_waiting = true;
        Ok(SyscallReply::Deferred)
    } else {
        Ok(SyscallReply::Now(child.as_u32() as i64))
    }
}

/// Marks `caller` for post-action destruction with `status`. Never
/// replies directly — matches the donor's `skip_reply` on this call.
pub fn exit<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, caller: Pid, status: i32) -> SysResult<SyscallReply> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    pcb.borrow_mut().exit_status = status;
    if let Some(already) = state.pending_destroy {
        log::error!("pending_destroy already held by pid {already} when pid {caller} called exit");
    }
    state.pending_destroy = Some(caller);
    Ok(SyscallReply::Deferred)
}

/// Adds a new thread to `caller`'s vspace.
pub fn clone_thread<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, caller: Pid) -> SysResult<ThreadId> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    let mut p = pcb.borrow_mut();
    let tid = ThreadId::new(p.threads.len() as u32);
    p.spawn_thread(tid);
    Ok(tid)
}

/// Adjusts a thread's priority. No real scheduler is modelled here; this
/// only validates that `tid` belongs to `caller`.
pub fn nice<K: Kernel + PdObjectSource>(state: &ServerState<K>, caller: Pid, tid: ThreadId, _priority: u8) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if !pcb.borrow().threads.contains(&tid) {
        return Err(SysError::InvalidParam);
    }
    Ok(())
}

/// Returns the handler cap for `irq`, gated on the `DEVICE_IRQ` permission.
pub fn get_irq_handler<K: Kernel + PdObjectSource>(state: &ServerState<K>, caller: Pid, irq: u32) -> SysResult<u32> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if !pcb.borrow().permissions.contains(Permissions::DEVICE_IRQ) {
        return Err(SysError::AccessDenied);
    }
    Ok(irq)
}
