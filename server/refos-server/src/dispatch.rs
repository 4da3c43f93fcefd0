//! Badge classification and the post-action phase.
//!
//! The real loop is `receive -> dispatch -> post_action -> receive`, driven
//! by the out-of-scope microkernel's blocking receive primitive (see
//! [`crate::kernel`]). This module owns the two pieces of that loop that
//! are pure bookkeeping: classifying an incoming badge into the handler
//! category it belongs to, and running the deferred single-slot
//! unblock/destroy fields after a handler returns.

use refos_core::ids::badge;
use refos_core::{NotificationRecord, Pid};
use refos_mm::PdObjectSource;

use crate::kernel::{EndpointHandle, Kernel};
use crate::{fault, PagerWaiter, ServerState};

/// What category of handler an incoming badge belongs to.
///
/// Checked in this order: a badge always falls in exactly one disjoint
/// range (see `refos_core::ids::badge`), except that a fault message is
/// distinguished from an ordinary syscall by its message label rather than
/// its badge — both arrive badged in the PID range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeClass {
    /// Badge names a live process; the message label decides fault vs.
    /// syscall (see [`classify_badge`]'s caller).
    Pid(Pid),
    /// Badge names a death-watch liveness target.
    Liveness(Pid),
    /// Badge names a window.
    Window(u32),
    /// Badge names a dataspace.
    Dataspace(u32),
    /// Badge is in the async-notification range.
    Notification(u32),
    /// Badge does not fall in any known range.
    Unknown,
}

/// Classifies a raw badge by the disjoint range it falls into.
pub fn classify_badge(raw: u64) -> BadgeClass {
    if raw >= badge::PID_BASE && raw < badge::PID_BASE + badge::RANGE_SPAN {
        return BadgeClass::Pid(Pid::new((raw - badge::PID_BASE) as u32));
    }
    if raw >= badge::LIVENESS_BASE && raw < badge::LIVENESS_BASE + badge::RANGE_SPAN {
        return BadgeClass::Liveness(Pid::new((raw - badge::LIVENESS_BASE) as u32));
    }
    if raw >= badge::WINDOW_BASE && raw < badge::WINDOW_BASE + badge::RANGE_SPAN {
        return BadgeClass::Window((raw - badge::WINDOW_BASE) as u32);
    }
    if raw >= badge::DATASPACE_BASE && raw < badge::DATASPACE_BASE + badge::RANGE_SPAN {
        return BadgeClass::Dataspace((raw - badge::DATASPACE_BASE) as u32);
    }
    if raw >= badge::NOTIFICATION_BASE && raw < badge::NOTIFICATION_BASE + badge::RANGE_SPAN {
        return BadgeClass::Notification((raw - badge::NOTIFICATION_BASE) as u32);
    }
    BadgeClass::Unknown
}

/// Routes a VM fault raised by `faulter`, delivering any resulting
/// notification and, for the external-pager path, queuing the faulter's
/// reply behind the window until `window_map` services it.
pub fn handle_fault<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    faulter: Pid,
    fault_addr: u64,
    is_write: bool,
) {
    let Some(pcb) = state.pcb(faulter) else {
        log::error!("fault reported for unknown pid {faulter}");
        return;
    };
    if pcb.borrow().fault_blocked {
        log::error!("pid {faulter} faulted at {fault_addr:#x} while already fault-blocked; book-keeping error");
        return;
    }
    let vspace = pcb.borrow().vspace.clone();
    let window_id = vspace.borrow().assoc().find(fault_addr).map(|a| a.window);

    let outcome = {
        let vs = vspace.borrow();
        fault::route_fault(vs.assoc(), &state.windows, &mut state.dataspaces, &mut state.kernel, faulter, fault_addr, is_write)
    };

    match outcome {
        fault::Outcome::Replied => {}
        fault::Outcome::SegFault => {
            log::warn!("pid {faulter} segfaulted at {fault_addr:#x}; leaving it blocked");
        }
        fault::Outcome::ContentInitDelegated { recipient, record } => {
            pcb.borrow_mut().fault_blocked = true;
            let notify_ep = state
                .dataspaces
                .get(refos_core::DataspaceId::new(record.args[0] as u32))
                .and_then(|ds| ds.content_init_notify_ep());
            deliver_notification(state, recipient, notify_ep, record);
        }
        fault::Outcome::PagerDelegated { recipient, record, reply } => {
            pcb.borrow_mut().fault_blocked = true;
            let notify_ep = window_id.and_then(|w| state.windows.get(w)).and_then(|w| match w.mode {
                refos_mm::window::WindowMode::ExternalPager { notify_ep, .. } => Some(notify_ep),
                _ => None,
            });
            if let Some(window_id) = window_id {
                state.pager_waiters.entry(window_id).or_default().push(PagerWaiter {
                    faulter,
                    reply: reply.into_raw(),
                });
            } else {
                log::error!("pager delegation for {faulter} with no resolvable window; reply leaked");
            }
            deliver_notification(state, recipient, notify_ep, record);
        }
    }
}

fn deliver_notification<K: Kernel + PdObjectSource>(
    state: &mut ServerState<K>,
    recipient: Pid,
    notify_ep: Option<u32>,
    record: NotificationRecord,
) {
    if let Some(pcb) = state.pcb(recipient) {
        let mut p = pcb.borrow_mut();
        match p.ring.as_mut() {
            Some(cell) => {
                let (ring, writer) = cell.get_mut();
                if writer.write_record(ring, record).is_err() {
                    log::error!("notification ring full for pid {recipient}, record dropped");
                }
            }
            None => log::error!("pid {recipient} has no notification ring installed"),
        }
    } else {
        log::error!("notification recipient pid {recipient} no longer live");
    }
    if let Some(ep) = notify_ep {
        state.kernel.notify(EndpointHandle(ep));
    }
}

/// Runs the deferred post-action phase: unblocks a pager-resumed faulter
/// and destroys an exited process, in that order.
///
/// Both fields are single-slot by construction (spec's dispatch loop never
/// queues more than one of each between dispatches); a handler that needs
/// to set one while the other is already occupied indicates a dispatch
/// loop bug and is logged rather than silently overwritten.
pub fn post_action<K: Kernel + PdObjectSource>(state: &mut ServerState<K>) {
    if let Some(unblock) = state.pending_unblock.take() {
        log::trace!("post-action: unblocking pid {}", unblock.pid);
        if let Some(pcb) = state.pcb(unblock.pid) {
            pcb.borrow_mut().fault_blocked = false;
        }
        state.kernel.send_reply(unblock.reply, unblock.payload);
    }
    if let Some(pid) = state.pending_destroy.take() {
        log::debug!("post-action: destroying pid {pid}");
        if let Err(e) = crate::death::release(state, pid) {
            log::error!("post-action destroy of pid {pid} failed: {e}");
        }
    }
}
