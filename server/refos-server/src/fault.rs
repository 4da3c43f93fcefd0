//! VM fault classification and routing.
//!
//! The pager and content-init paths are morally `async`: they suspend on
//! a pending reply instead of returning one immediately. Modelled
//! explicitly via [`Outcome`] rather than an actual coroutine so callers
//! cannot forget to handle the suspended case.

use refos_core::{AccessRights, NotificationRecord, Pid};
use refos_mm::window::{AssocList, WindowMode, WindowTable};
use refos_mm::{RamDataspaceTable, PAGE_SIZE};

use crate::kernel::Kernel;
use crate::reply::ReplyHandle;

/// Result of routing a single VM fault.
pub enum Outcome {
    /// The fault was resolved locally; the faulter should be replied to
    /// (an empty reply unblocks it to re-run the faulting instruction).
    Replied,
    /// The faulting thread is permanently blocked: no window covers the
    /// address, or the access violates the window's permissions. Its
    /// reply capability has been dropped; the rest of the system
    /// continues.
    SegFault,
    /// Delegated to a content initialiser. The faulter's reply has
    /// already been stashed as a waiter on the dataspace page; the caller
    /// only needs to append `record` to the initialiser's ring and signal
    /// it.
    ContentInitDelegated { recipient: Pid, record: NotificationRecord },
    /// Delegated to an external pager. The caller must append `record` to
    /// the pager's ring, signal it, and hold `reply` until the pager
    /// services the fault via `window_map`.
    PagerDelegated { recipient: Pid, record: NotificationRecord, reply: ReplyHandle },
}

fn page_align_down(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

/// Routes one VM fault.
///
/// `assoc` is the faulting process's own window-association list;
/// `windows`/`dataspaces` are the server's global tables. `faulter` is used
/// only to tag content-init waiters so they can be matched back to the
/// right process when content arrives; the fault-blocked invariant itself
/// is checked by the caller before this is reached.
pub fn route_fault(
    assoc: &AssocList,
    windows: &WindowTable,
    dataspaces: &mut RamDataspaceTable,
    kernel: &mut impl Kernel,
    faulter: Pid,
    fault_addr: u64,
    is_write: bool,
) -> Outcome {
    let Some(a) = assoc.find(fault_addr) else {
        log::warn!("segmentation fault at {fault_addr:#x}: no covering window");
        return Outcome::SegFault;
    };
    let Some(window) = windows.get(a.window) else {
        log::error!("association for window {:?} has no backing record", a.window);
        return Outcome::SegFault;
    };
    let needed = if is_write { AccessRights::WRITE } else { AccessRights::READ };
    if !window.perms.contains(needed) {
        log::warn!("segmentation fault at {fault_addr:#x}: permission denied");
        return Outcome::SegFault;
    }

    match &window.mode {
        WindowMode::Empty => {
            log::warn!("segmentation fault at {fault_addr:#x}: window has no backing");
            Outcome::SegFault
        }
        WindowMode::Anonymous { dspace, offset } => {
            let dspace_offset = fault_addr + offset - page_align_down(a.base);
            let Some(ds) = dataspaces.get_mut(*dspace) else {
                log::error!("anonymous window points at a destroyed dataspace");
                return Outcome::SegFault;
            };
            if ds.content_init_enabled() && ds.need_content_init(dspace_offset) {
                let reply = ReplyHandle::new(kernel.save_reply());
                let saved = refos_mm::SavedReply(reply.into_raw().0);
                ds.add_content_init_waiter(dspace_offset, faulter, saved);
                let initialiser = ds.initialiser().expect("content-init enabled implies initialiser set");
                let record = NotificationRecord::content_init(dspace.as_u32(), page_align_down(dspace_offset));
                return Outcome::ContentInitDelegated { recipient: initialiser, record };
            }
            if ds.page_mapped(page_align_down(dspace_offset)) {
                log::error!(
                    "segmentation fault at {fault_addr:#x}: entry already occupied; book-keeping error"
                );
                return Outcome::SegFault;
            }
            let frame = ds.get_page(page_align_down(dspace_offset), |_| kernel.new_frame().expect("out of frames"));
            match frame {
                Ok(_frame) => Outcome::Replied,
                Err(_) => Outcome::SegFault,
            }
        }
        WindowMode::ExternalPager { pager, .. } => {
            let reply = ReplyHandle::new(kernel.save_reply());
            let record = NotificationRecord::fault_delegation(
                a.window.as_u32(),
                window.size,
                fault_addr,
                a.base,
                is_write,
                window.perms.bits() as u64,
                0,
            );
            Outcome::PagerDelegated { recipient: *pager, record, reply }
        }
    }
}
