//! Dataspace syscalls: anonymous RAM lifecycle, window binding, and the
//! content-init protocol (an external server supplies page content lazily).
//!
//! Grounded on `data_syscall.c`'s handlers of the same name.

use refos_core::{AccessRights, DataspaceId, Permissions, Pid, SysError, SysResult, WindowId};
use refos_mm::window::WindowMode;
use refos_mm::PdObjectSource;

use crate::kernel::{EndpointHandle, Kernel, ReplyCap};
use crate::ServerState;

/// Opens a new anonymous RAM dataspace of `size` bytes (rounded up to a
/// whole page), optionally backed by a fixed physical address.
///
/// `device_paddr` requires `DEVICE_MAP`; mirrors the donor's
/// `PROCSERV_DSPACE_FLAG_DEVICE_PADDR` flag.
pub fn open<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    size: u64,
    device_paddr: Option<u64>,
) -> SysResult<DataspaceId> {
    if size == 0 {
        return Err(SysError::InvalidParam);
    }
    let npages = size.div_ceil(refos_mm::PAGE_SIZE) as usize;
    let (id, _badge) = state.dataspaces.insert(npages, AccessRights::READ | AccessRights::WRITE);
    if let Some(paddr) = device_paddr {
        let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
        if !pcb.borrow().permissions.contains(Permissions::DEVICE_MAP) {
            state.dataspaces.remove(id);
            return Err(SysError::AccessDenied);
        }
        if let Err(e) = state.dataspaces.get_mut(id).unwrap().enable_physical_addr(paddr) {
            state.dataspaces.remove(id);
            return Err(e);
        }
    }
    Ok(id)
}

/// Closes `dspace`: purges it from every window and every process's
/// parameter buffer, then destroys it outright (the donor warns rather
/// than errors if the refcount was not exactly 1 at this point; we do
/// the same here via `log::warn!`).
pub fn close<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dspace: DataspaceId) -> SysResult<()> {
    for window_id in state.windows.windows_backed_by(dspace) {
        if let Some(w) = state.windows.get_mut(window_id) {
            w.set_mode(WindowMode::Empty);
        }
    }
    let param_holders: Vec<Pid> = {
        let mut out = Vec::new();
        state.pids.iterate(|pid, pcb| {
            if pcb.borrow().param_buffer == Some(dspace) {
                out.push(pid);
            }
        });
        out
    };
    for pid in param_holders {
        if let Some(pcb) = state.pcb(pid) {
            pcb.borrow_mut().param_buffer = None;
        }
    }
    let Some(ds) = state.dataspaces.get(dspace) else {
        return Err(SysError::InvalidParam);
    };
    if ds.refcount() != 1 {
        log::warn!("closing dataspace {dspace} with refcount {} (expected 1)", ds.refcount());
    }
    state.dataspaces.remove(dspace);
    Ok(())
}

/// Current size in bytes.
pub fn get_size<K: Kernel + PdObjectSource>(state: &ServerState<K>, dspace: DataspaceId) -> SysResult<u64> {
    Ok(state.dataspaces.get(dspace).ok_or(SysError::InvalidParam)?.size_bytes())
}

/// Grows `dspace` to at least `new_size` bytes (monotonic; see
/// `RamDataspace::expand`).
pub fn expand<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dspace: DataspaceId, new_size: u64) -> SysResult<()> {
    let ds = state.dataspaces.get_mut(dspace).ok_or(SysError::InvalidParam)?;
    let new_npages = new_size.div_ceil(refos_mm::PAGE_SIZE) as usize;
    ds.expand(new_npages)
}

/// Binds `dspace` into `window` at `offset`, releasing whatever backed
/// the window beforehand.
pub fn datamap<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    dspace: DataspaceId,
    window: WindowId,
    offset: u64,
) -> SysResult<()> {
    let ds = state.dataspaces.get(dspace).ok_or(SysError::InvalidParam)?;
    if offset > ds.size_bytes() {
        return Err(SysError::InvalidParam);
    }
    let w = state.windows.get_mut(window).ok_or(SysError::InvalidWindow)?;
    let previous = std::mem::replace(&mut w.mode, WindowMode::Anonymous { dspace, offset });
    state.dataspaces.get_mut(dspace).unwrap().incref();
    release_previous_mode(state, previous);
    Ok(())
}

/// Unbinds `window`, releasing its anonymous dataspace ref. A no-op if
/// the window is already empty; an error if it is bound to something
/// other than an anonymous dataspace.
pub fn dataunmap<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, window: WindowId) -> SysResult<()> {
    let w = state.windows.get_mut(window).ok_or(SysError::InvalidWindow)?;
    match w.mode {
        WindowMode::Empty => Ok(()),
        WindowMode::Anonymous { .. } => {
            let previous = std::mem::replace(&mut w.mode, WindowMode::Empty);
            release_previous_mode(state, previous);
            Ok(())
        }
        WindowMode::ExternalPager { .. } => Err(SysError::InvalidParam),
    }
}

fn release_previous_mode<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, previous: WindowMode) {
    match previous {
        WindowMode::Empty => {}
        WindowMode::Anonymous { dspace, .. } => crate::death::release_dataspace_ref(state, dspace),
        WindowMode::ExternalPager { notify_ep, .. } => state.kernel.free_endpoint(EndpointHandle(notify_ep)),
    }
}

/// Registers (or, with `notify_ep = None`, unregisters) `caller` as
/// `dspace`'s content initialiser. Returns the dataspace id as the
/// donor's `dataID` on registration, 0 on unregistration.
pub fn have_data<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    dspace: DataspaceId,
    notify_ep: Option<u32>,
) -> SysResult<u32> {
    let ds = state.dataspaces.get_mut(dspace).ok_or(SysError::InvalidParam)?;
    match notify_ep {
        None => {
            if let Some(ep) = ds.remove_content_init() {
                state.kernel.free_endpoint(EndpointHandle(ep));
            }
            Ok(0)
        }
        Some(ep) => {
            ds.content_init(ep, caller);
            Ok(dspace.as_u32())
        }
    }
}

/// Unregisters `dspace`'s content initialiser.
pub fn unhave_data<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, dspace: DataspaceId) -> SysResult<()> {
    have_data(state, Pid::new(0), dspace, None).map(|_| ())
}

/// The content initialiser supplies `size` bytes of content at `offset`,
/// read from its parameter buffer. Marks the covered pages provided and
/// wakes every faulter waiting on them.
pub fn provide_data_from_parambuffer<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    caller: Pid,
    dspace: DataspaceId,
    offset: u64,
    size: u64,
) -> SysResult<()> {
    let pcb = state.pcb(caller).ok_or(SysError::InvalidParam)?;
    if pcb.borrow().param_buffer.is_none() {
        return Err(SysError::NoParamBuffer);
    }
    let ds = state.dataspaces.get_mut(dspace).ok_or(SysError::InvalidParam)?;
    if ds.initialiser() != Some(caller) {
        return Err(SysError::AccessDenied);
    }
    let woken = ds.provide_data(offset, size)?;
    for (faulter, saved) in woken {
        if let Some(pcb) = state.pcb(faulter) {
            pcb.borrow_mut().fault_blocked = false;
        }
        state.kernel.send_reply(ReplyCap(saved.0), 0);
    }
    Ok(())
}

/// Not supported by this server — mirrors the donor's
/// `data_init_data_handler`, which always returns `EUNIMPLEMENTED`.
pub fn init_data<K: Kernel + PdObjectSource>(
    _state: &mut ServerState<K>,
    _dest: DataspaceId,
    _src: DataspaceId,
    _src_offset: u64,
) -> SysResult<()> {
    Err(SysError::Unimplemented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MockKernel;

    fn setup() -> (ServerState<MockKernel>, Pid) {
        let mut state = ServerState::new(8, 8, MockKernel::new());
        let pid = state.spawn_process(None, "a".into()).unwrap();
        (state, pid)
    }

    #[test]
    fn open_anon_get_size_expand_roundtrip() {
        let (mut state, pid) = setup();
        let ds = open(&mut state, pid, 0x2000, None).unwrap();
        assert_eq!(get_size(&state, ds).unwrap(), 0x2000);
        expand(&mut state, ds, 0x4000).unwrap();
        assert_eq!(get_size(&state, ds).unwrap(), 0x4000);
    }

    #[test]
    fn open_device_paddr_requires_permission() {
        let (mut state, pid) = setup();
        assert_eq!(open(&mut state, pid, 0x1000, Some(0xfee00000)), Err(SysError::AccessDenied));
        state.pcb(pid).unwrap().borrow_mut().permissions = Permissions::DEVICE_MAP;
        assert!(open(&mut state, pid, 0x1000, Some(0xfee00000)).is_ok());
    }

    #[test]
    fn datamap_then_close_purges_window() {
        let (mut state, pid) = setup();
        let ds = open(&mut state, pid, 0x1000, None).unwrap();
        let window = state.windows.insert(0x1000, pid, AccessRights::READ | AccessRights::WRITE, true).0;
        datamap(&mut state, ds, window, 0).unwrap();
        close(&mut state, ds).unwrap();
        assert!(matches!(state.windows.get(window).unwrap().mode, WindowMode::Empty));
    }

    #[test]
    fn dataunmap_on_empty_window_is_a_noop() {
        let (mut state, pid) = setup();
        let window = state.windows.insert(0x1000, pid, AccessRights::READ, true).0;
        assert_eq!(dataunmap(&mut state, window), Ok(()));
    }

    #[test]
    fn content_init_fault_then_provide_data_wakes_the_faulter() {
        let (mut state, pager) = setup();
        let client = state.spawn_process(None, "client".into()).unwrap();
        let ds = open(&mut state, pager, 0x1000, None).unwrap();
        have_data(&mut state, pager, ds, Some(11)).unwrap();
        let window = state.windows.insert(0x1000, client, AccessRights::READ, true).0;
        datamap(&mut state, ds, window, 0).unwrap();
        state.pcb(client).unwrap().borrow().vspace.borrow_mut().assoc_mut().insert(0x10000, 0x1000, window);

        crate::dispatch::handle_fault(&mut state, client, 0x10000, false);
        assert!(state.kernel.sent_replies.is_empty(), "faulter must stay suspended until content arrives");

        set_param_buffer_for_test(&mut state, pager, ds);
        provide_data_from_parambuffer(&mut state, pager, ds, 0, 0x1000).unwrap();
        assert_eq!(state.kernel.sent_replies.len(), 1);
    }

    fn set_param_buffer_for_test<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, pid: Pid, ds: DataspaceId) {
        state.pcb(pid).unwrap().borrow_mut().param_buffer = Some(ds);
    }

    #[test]
    fn provide_data_rejects_non_initialiser() {
        let (mut state, pid) = setup();
        let ds = open(&mut state, pid, 0x1000, None).unwrap();
        have_data(&mut state, pid, ds, Some(1)).unwrap();
        let impostor = state.spawn_process(None, "impostor".into()).unwrap();
        set_param_buffer_for_test(&mut state, impostor, ds);
        assert_eq!(
            provide_data_from_parambuffer(&mut state, impostor, ds, 0, 0x1000),
            Err(SysError::AccessDenied)
        );
    }

    #[test]
    fn init_data_is_unimplemented() {
        let (mut state, pid) = setup();
        let a = open(&mut state, pid, 0x1000, None).unwrap();
        let b = open(&mut state, pid, 0x1000, None).unwrap();
        assert_eq!(init_data(&mut state, a, b, 0), Err(SysError::Unimplemented));
    }
}
