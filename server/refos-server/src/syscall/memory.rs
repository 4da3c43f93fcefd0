//! Memory-window syscalls: reservation, pager registration, notification
//! buffer installation, and pager-supplied frame delivery.
//!
//! Grounded on `mem_syscall.c`'s handlers of the same name.

use refos_core::{AccessRights, DataspaceId, Permissions, Pid, SysError, SysResult, WindowId};
use refos_ipc::{RingBuffer, RingWriter};
use refos_mm::window::WindowMode;
use refos_mm::PdObjectSource;

use crate::kernel::{EndpointHandle, Kernel};
use crate::{PendingUnblock, ServerState};

/// Reserves a vaddr range in `caller`'s vspace. Fails on overlap.
pub fn create_mem_window<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    vaddr: u64,
    size: u64,
    perms: AccessRights,
    cacheable: bool,
) -> SysResult<WindowId> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if !pcb.borrow().vspace.borrow().assoc().check(vaddr, size) {
        return Err(SysError::InvalidWindow);
    }
    let (window_id, _badge) = state.windows.insert(size, caller, perms, cacheable);
    pcb.borrow().vspace.borrow_mut().assoc_mut().insert(vaddr, size, window_id);
    Ok(window_id)
}

/// Resizes `window`'s reservation ("unmap-then-resize" ordering on
/// shrink — see DESIGN.md's open-question decision).
pub fn resize_mem_window<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    window: WindowId,
    new_size: u64,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    pcb.borrow().vspace.borrow_mut().assoc_mut().resize(window, new_size)?;
    if let Some(w) = state.windows.get_mut(window) {
        w.size = new_size;
    }
    Ok(())
}

/// Deletes `window`: removes its association and releases whatever
/// backed it.
pub fn delete_mem_window<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    window: WindowId,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    pcb.borrow().vspace.borrow_mut().assoc_mut().remove(window).ok_or(SysError::InvalidWindow)?;
    crate::death::release_window(state, window);
    Ok(())
}

/// Looks up the window covering `vaddr` in `caller`'s vspace.
pub fn get_mem_window<K: Kernel + PdObjectSource>(state: &ServerState<K>, caller: Pid, vaddr: u64) -> SysResult<WindowId> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    let vspace = pcb.borrow().vspace.clone();
    let vspace = vspace.borrow();
    vspace.assoc().find(vaddr).map(|a| a.window).ok_or(SysError::InvalidWindow)
}

/// Returns the dataspace currently backing `window`, if it is anonymous.
pub fn get_mem_window_dspace<K: Kernel + PdObjectSource>(state: &ServerState<K>, window: WindowId) -> SysResult<DataspaceId> {
    let w = state.windows.get(window).ok_or(SysError::InvalidWindow)?;
    match w.mode {
        WindowMode::Anonymous { dspace, .. } => Ok(dspace),
        _ => Err(SysError::InvalidParam),
    }
}

/// Registers `caller` as `window`'s external pager. The window must
/// currently be `Empty`.
pub fn register_as_pager<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    window: WindowId,
    notify_ep: u32,
) -> SysResult<()> {
    let w = state.windows.get_mut(window).ok_or(SysError::InvalidWindow)?;
    if !matches!(w.mode, WindowMode::Empty) {
        return Err(SysError::UnmapFirst);
    }
    w.set_mode(WindowMode::ExternalPager { notify_ep, pager: caller });
    Ok(())
}

/// Unregisters the current pager of `window`, releasing its endpoint.
pub fn unregister_as_pager<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, window: WindowId) -> SysResult<()> {
    let w = state.windows.get_mut(window).ok_or(SysError::InvalidWindow)?;
    match w.mode {
        WindowMode::ExternalPager { notify_ep, .. } => {
            state.kernel.free_endpoint(EndpointHandle(notify_ep));
            w.set_mode(WindowMode::Empty);
            Ok(())
        }
        _ => Err(SysError::InvalidParam),
    }
}

/// Installs a ring buffer for `caller`'s asynchronous notification
/// delivery, backed by `dspace` (its byte size becomes the ring's
/// capacity).
pub fn notification_buffer<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    dspace: DataspaceId,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    let ds = state.dataspaces.get(dspace).ok_or(SysError::InvalidParam)?;
    let capacity = (ds.size_bytes() as usize).max(2);
    let ring = RingBuffer::new(capacity);
    pcb.borrow_mut().ring = Some(std::cell::RefCell::new((ring, RingWriter::default())));
    Ok(())
}

/// The pager supplies a frame from its own vspace at `src_addr`, servicing
/// the oldest faulter suspended on `window`.
///
/// Queues `src_addr` as the reply payload for the oldest waiter; the
/// actual reply is sent by the post-action phase, not here, so the reply
/// capability isn't touched while this handler is still running. `win_offset`
/// identifies which page of the window faulted and is otherwise unused here
/// (no separate frame-retype step is modelled, see [`crate::kernel::Kernel`]).
pub fn window_map<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    window: WindowId,
    _win_offset: u64,
    src_addr: u64,
) -> SysResult<()> {
    let waiters = state.pager_waiters.get_mut(&window).ok_or(SysError::InvalidParam)?;
    let waiter = waiters.pop().ok_or(SysError::InvalidParam)?;
    if waiters.is_empty() {
        state.pager_waiters.remove(&window);
    }
    if state.pending_unblock.is_some() {
        log::error!("pending_unblock already occupied; dispatch loop should drain it every cycle");
    }
    state.pending_unblock = Some(PendingUnblock { pid: waiter.faulter, reply: waiter.reply, payload: src_addr as i64 });
    Ok(())
}

/// Maps a physical range directly into `window`. Requires `DEVICE_MAP`.
pub fn device_map<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    window: WindowId,
    paddr: u64,
    size: u64,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if !pcb.borrow().permissions.contains(Permissions::DEVICE_MAP) {
        return Err(SysError::AccessDenied);
    }
    let npages = size.div_ceil(refos_mm::PAGE_SIZE) as usize;
    let (dspace_id, _badge) = state.dataspaces.insert(npages, AccessRights::READ | AccessRights::WRITE);
    state.dataspaces.get_mut(dspace_id).unwrap().enable_physical_addr(paddr)?;
    let w = state.windows.get_mut(window).ok_or(SysError::InvalidWindow)?;
    if !matches!(w.mode, WindowMode::Empty) {
        return Err(SysError::UnmapFirst);
    }
    w.set_mode(WindowMode::Anonymous { dspace: dspace_id, offset: 0 });
    Ok(())
}
