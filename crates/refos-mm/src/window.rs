//! Memory windows and the per-vspace association list.
//!
//! A [`Window`] is a reserved virtual-address range in one process's
//! address space with exactly one backing bound to it at a time
//! ([`WindowMode`]). The global [`WindowTable`] mints the outward badge
//! and owns the `Window` records; the vaddr-range bookkeeping for "which
//! windows live in this vspace, and where" is the separate [`AssocList`],
//! one per vspace, kept disjoint by construction.

use refos_core::{AccessRights, DataspaceId, Pid, SysError, WindowId};

/// What backs a window's virtual-address range.
///
/// Any transition out of [`WindowMode::Empty`] requires every frame
/// currently mapped in the window to be unmapped first, so stale pages
/// never survive a backing change (enforced by callers of
/// [`Window::set_mode`], not by this type itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMode {
    /// No backing; any fault is a segfault.
    Empty,
    /// Backed by an anonymous RAM dataspace at a byte offset.
    Anonymous {
        /// The backing dataspace.
        dspace: DataspaceId,
        /// Byte offset into the dataspace where this window's content begins.
        offset: u64,
    },
    /// Backed by an external pager process.
    ExternalPager {
        /// The pager's owned notification-endpoint handle.
        notify_ep: u32,
        /// The pager's PID.
        pager: Pid,
    },
}

/// A globally identified memory window.
#[derive(Debug, Clone)]
pub struct Window {
    /// Size in bytes.
    pub size: u64,
    /// Owning process (weak: windows do not keep a process alive).
    pub owner: Pid,
    /// Access permissions.
    pub perms: AccessRights,
    /// Whether the backing memory should be mapped cacheable.
    pub cacheable: bool,
    /// Current backing.
    pub mode: WindowMode,
    /// Badge of the outward-facing endpoint minted for this window.
    pub badge: u64,
}

impl Window {
    fn new(size: u64, owner: Pid, perms: AccessRights, cacheable: bool, badge: u64) -> Self {
        Self { size, owner, perms, cacheable, mode: WindowMode::Empty, badge }
    }

    /// Transitions this window to a new mode.
    ///
    /// The caller is responsible for having already unmapped every frame
    /// currently mapped in the window (required whenever leaving
    /// `Empty`) and for releasing whatever the previous mode owned
    /// (a dataspace ref, a pager endpoint) before calling this.
    pub fn set_mode(&mut self, mode: WindowMode) {
        self.mode = mode;
    }
}

/// Global table of live windows, keyed by [`WindowId`].
#[derive(Default)]
pub struct WindowTable {
    windows: slab::Slab<Window>,
}

impl WindowTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { windows: slab::Slab::new() }
    }

    /// Inserts a new window and mints its badge.
    pub fn insert(
        &mut self,
        size: u64,
        owner: Pid,
        perms: AccessRights,
        cacheable: bool,
    ) -> (WindowId, u64) {
        let key = self.windows.vacant_key();
        let badge = refos_core::ids::badge::WINDOW_BASE + key as u64;
        let window = Window::new(size, owner, perms, cacheable, badge);
        let key2 = self.windows.insert(window);
        debug_assert_eq!(key, key2);
        (WindowId::new(key as u32), badge)
    }

    /// Looks up a window by id.
    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(id.as_usize())
    }

    /// Looks up a window by id, mutably.
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(id.as_usize())
    }

    /// Removes a window and revokes its badge, returning the record.
    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        if !self.windows.contains(id.as_usize()) {
            return None;
        }
        Some(self.windows.remove(id.as_usize()))
    }

    /// Visits every window currently backed by `dspace` (used by "purge a
    /// dataspace", which forces every such window back to `Empty`).
    pub fn windows_backed_by(&self, dspace: DataspaceId) -> Vec<WindowId> {
        self.windows
            .iter()
            .filter(|(_, w)| matches!(w.mode, WindowMode::Anonymous { dspace: d, .. } if d == dspace))
            .map(|(idx, _)| WindowId::new(idx as u32))
            .collect()
    }
}

/// One entry of a vspace's sorted window-association list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assoc {
    /// Base virtual address within the owning vspace.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// The window this association names.
    pub window: WindowId,
}

impl Assoc {
    fn end(&self) -> u64 {
        self.base + self.size
    }

    fn contains_point(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// A single vspace's sorted, disjoint window-association list.
///
/// Invariant: intervals `[base, base+size)` are pairwise disjoint and kept
/// sorted by `base`.
#[derive(Debug, Default)]
pub struct AssocList {
    entries: Vec<Assoc>,
}

impl AssocList {
    /// Creates an empty association list.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn insertion_index(&self, base: u64) -> usize {
        self.entries.partition_point(|a| a.base < base)
    }

    /// Returns true iff `[vaddr, vaddr+size)` does not overlap any existing
    /// association. Two closed intervals `[a, b]` and `[c, d]` intersect iff
    /// `a <= d && c <= b`; this single condition also catches a proposed
    /// interval that straddles (wholly contains) an existing one.
    pub fn check(&self, vaddr: u64, size: u64) -> bool {
        if size == 0 {
            return false;
        }
        let end = vaddr + size - 1;
        !self.entries.iter().any(|a| vaddr <= a.end() - 1 && a.base <= end)
    }

    /// Returns the unique association whose interval contains `vaddr`, if any.
    pub fn find(&self, vaddr: u64) -> Option<&Assoc> {
        self.entries.iter().find(|a| a.contains_point(vaddr))
    }

    /// Returns the association whose interval entirely contains
    /// `[vaddr, vaddr+size)`, if any.
    pub fn find_range(&self, vaddr: u64, size: u64) -> Option<&Assoc> {
        if size == 0 {
            return None;
        }
        let end = vaddr + size - 1;
        self.entries
            .iter()
            .find(|a| a.base <= vaddr && a.end() - 1 >= end)
    }

    /// Inserts a new disjoint association. Caller must have already called
    /// [`check`](Self::check) and had it return `true`.
    pub fn insert(&mut self, base: u64, size: u64, window: WindowId) {
        let idx = self.insertion_index(base);
        self.entries.insert(idx, Assoc { base, size, window });
    }

    /// Removes the association for `window`, if present.
    pub fn remove(&mut self, window: WindowId) -> Option<Assoc> {
        let idx = self.entries.iter().position(|a| a.window == window)?;
        Some(self.entries.remove(idx))
    }

    /// Resizes the association for `window` to `new_size`.
    ///
    /// Shrinking always succeeds (the vacated tail is the caller's
    /// responsibility to unmap first, per the "unmap-then-resize"
    /// ordering). Growing is rejected with [`SysError::InvalidWindow`] if
    /// the extended range would overlap another association.
    pub fn resize(&mut self, window: WindowId, new_size: u64) -> Result<(), SysError> {
        let idx = self
            .entries
            .iter()
            .position(|a| a.window == window)
            .ok_or(SysError::InvalidWindow)?;
        let base = self.entries[idx].base;
        let old_size = self.entries[idx].size;
        if new_size <= old_size {
            self.entries[idx].size = new_size;
            return Ok(());
        }
        // Growing: temporarily remove self from consideration, then re-check.
        let removed = self.entries.remove(idx);
        if self.check(base, new_size) {
            self.insert(base, new_size, window);
            Ok(())
        } else {
            self.entries.insert(idx, removed);
            Err(SysError::InvalidWindow)
        }
    }

    /// Number of associations currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true iff the list holds no associations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every association, leaving the list empty.
    ///
    /// Used when tearing down a vspace: every window it still owns must be
    /// deleted by the caller.
    pub fn drain_all(&mut self) -> Vec<Assoc> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(id: u32) -> WindowId {
        WindowId::new(id)
    }

    #[test]
    fn non_overlapping_inserts_succeed() {
        let mut list = AssocList::new();
        assert!(list.check(0x10000, 0x8000));
        list.insert(0x10000, 0x8000, win(1));
        assert!(list.check(0x20000, 0x1000));
        list.insert(0x20000, 0x1000, win(2));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn straddling_interval_is_rejected() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x8000, win(1));
        // [0x14000, 0x15000) lies entirely within [0x10000, 0x18000).
        assert!(!list.check(0x14000, 0x1000));
    }

    #[test]
    fn scenario_create_then_rejected_then_succeeds_after_delete() {
        let mut list = AssocList::new();
        assert!(list.check(0x10000, 0x8000));
        list.insert(0x10000, 0x8000, win(1));
        assert!(!list.check(0x14000, 0x1000));
        list.remove(win(1));
        assert!(list.check(0x14000, 0x1000));
    }

    #[test]
    fn find_returns_containing_interval() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x8000, win(1));
        assert_eq!(list.find(0x14000).map(|a| a.window), Some(win(1)));
        assert_eq!(list.find(0x20000), None);
    }

    #[test]
    fn find_range_requires_full_containment() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x8000, win(1));
        assert!(list.find_range(0x10000, 0x8000).is_some());
        assert!(list.find_range(0x10000, 0x9000).is_none());
    }

    #[test]
    fn shrink_always_succeeds() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x8000, win(1));
        list.resize(win(1), 0x1000).unwrap();
        assert_eq!(list.find(0x10000).unwrap().size, 0x1000);
    }

    #[test]
    fn grow_rejected_on_overlap() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x1000, win(1));
        list.insert(0x12000, 0x1000, win(2));
        assert_eq!(list.resize(win(1), 0x3000), Err(SysError::InvalidWindow));
        // Original association must be untouched after a rejected grow.
        assert_eq!(list.find(0x10000).unwrap().size, 0x1000);
    }

    #[test]
    fn grow_succeeds_when_room_exists() {
        let mut list = AssocList::new();
        list.insert(0x10000, 0x1000, win(1));
        list.resize(win(1), 0x2000).unwrap();
        assert_eq!(list.find(0x10000).unwrap().size, 0x2000);
    }

    #[test]
    fn window_table_insert_and_remove() {
        let mut table = WindowTable::new();
        let (id, badge1) = table.insert(0x1000, Pid::new(1), AccessRights::READ, true);
        let (id2, badge2) = table.insert(0x1000, Pid::new(1), AccessRights::READ, true);
        assert_ne!(id, id2);
        assert_ne!(badge1, badge2);
        assert!(table.remove(id).is_some());
        assert!(table.get(id).is_none());
    }

    #[test]
    fn purge_finds_every_window_on_a_dataspace() {
        let mut table = WindowTable::new();
        let (a, _) = table.insert(0x1000, Pid::new(1), AccessRights::READ, true);
        let (b, _) = table.insert(0x1000, Pid::new(1), AccessRights::READ, true);
        table.get_mut(a).unwrap().set_mode(WindowMode::Anonymous {
            dspace: DataspaceId::new(5),
            offset: 0,
        });
        table.get_mut(b).unwrap().set_mode(WindowMode::Anonymous {
            dspace: DataspaceId::new(6),
            offset: 0,
        });
        let hits = table.windows_backed_by(DataspaceId::new(5));
        assert_eq!(hits, vec![a]);
    }
}
