//! A process's address space: PD + CSpace ownership, tracked kernel
//! objects, and the window-association list.

use refos_core::WindowId;

use crate::window::AssocList;

/// Something a vspace allocated on a process's behalf and must release
/// when the vspace is torn down (e.g. an endpoint retyped for
/// `new_endpoint`). Opaque; the server crate supplies the concrete
/// release behaviour via [`VSpace::new`]'s `release` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedObject(pub u64);

/// A reference-counted process address space.
///
/// Owns exactly one PD+CSpace pair (drawn from a
/// [`PdPool`](crate::pdpool::PdPool)), the set of kernel objects retyped on
/// the process's behalf, and the window-association list. Dropping the
/// last `Rc` to a `VSpace` must run [`VSpace::teardown`] before the value
/// actually goes out of scope — this type does not implement `Drop`
/// itself because releasing a PD slot back to the pool needs access to a
/// `PdObjectSource`/`Kernel` the vspace does not own; the server crate's
/// `Pcb` drop path is the single required call site (see
/// `server/refos-server/src/pcb.rs`).
pub struct VSpace {
    /// Index into the owning [`PdPool`](crate::pdpool::PdPool).
    pub pd_slot: usize,
    tracked: Vec<TrackedObject>,
    assoc: AssocList,
}

impl VSpace {
    /// Creates a new, empty vspace bound to pool slot `pd_slot`.
    pub fn new(pd_slot: usize) -> Self {
        Self { pd_slot, tracked: Vec::new(), assoc: AssocList::new() }
    }

    /// Records a kernel object retyped on this vspace's behalf, so it is
    /// released alongside the vspace.
    pub fn track(&mut self, obj: TrackedObject) {
        self.tracked.push(obj);
    }

    /// Read-only access to the window-association list.
    pub fn assoc(&self) -> &AssocList {
        &self.assoc
    }

    /// Mutable access to the window-association list.
    pub fn assoc_mut(&mut self) -> &mut AssocList {
        &mut self.assoc
    }

    /// Drains every tracked object and every association, returning them
    /// so the caller (which owns the kernel-operation backend) can revoke
    /// caps, unmap frames, and return the PD slot to the pool.
    ///
    /// After this call the vspace holds no windows and no tracked objects;
    /// it is inert and ready to be dropped.
    pub fn teardown(&mut self) -> (Vec<TrackedObject>, Vec<WindowId>) {
        let windows = self
            .assoc
            .drain_all()
            .into_iter()
            .map(|a| a.window)
            .collect();
        (std::mem::take(&mut self.tracked), windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_teardown_drains_objects() {
        let mut vs = VSpace::new(0);
        vs.track(TrackedObject(1));
        vs.track(TrackedObject(2));
        let (objs, _windows) = vs.teardown();
        assert_eq!(objs.len(), 2);
        assert_eq!(vs.teardown().0.len(), 0, "second teardown must find nothing left");
    }

    #[test]
    fn teardown_returns_every_window() {
        let mut vs = VSpace::new(0);
        vs.assoc_mut().insert(0x1000, 0x1000, refos_core::WindowId::new(1));
        vs.assoc_mut().insert(0x2000, 0x1000, refos_core::WindowId::new(2));
        let (_objs, windows) = vs.teardown();
        assert_eq!(windows.len(), 2);
        assert!(vs.assoc().is_empty());
    }

    #[test]
    fn fresh_vspace_has_no_associations() {
        let vs = VSpace::new(3);
        assert!(vs.assoc().is_empty());
        assert!(vs.assoc().check(0x10000, 0x1000));
    }
}
