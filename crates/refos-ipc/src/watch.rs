//! Per-process client death-watch list.

use std::collections::HashMap;

use refos_core::Pid;

/// An owned cslot holding a death-notify endpoint, plus the endpoint
/// itself. Opaque handle; the server crate is responsible for actually
/// revoking the cslot on unwatch/teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSlot {
    /// The endpoint a death record is sent to.
    pub notify_ep: u32,
}

/// Maps a watched [`Pid`] to the slot that should be notified of its death.
#[derive(Default)]
pub struct ClientWatchList {
    watches: HashMap<Pid, WatchSlot>,
}

impl ClientWatchList {
    /// Creates an empty watch list.
    pub fn new() -> Self {
        Self { watches: HashMap::new() }
    }

    /// Adds `target` to the watch list, to be notified via `notify_ep`.
    ///
    /// Replaces any existing watch on the same PID.
    pub fn watch(&mut self, target: Pid, notify_ep: u32) {
        self.watches.insert(target, WatchSlot { notify_ep });
    }

    /// Removes the watch on `target`, if present, returning its slot so
    /// the caller can revoke the owned cslot.
    pub fn unwatch(&mut self, target: Pid) -> Option<WatchSlot> {
        self.watches.remove(&target)
    }

    /// True iff `target` is currently watched.
    pub fn is_watching(&self, target: Pid) -> bool {
        self.watches.contains_key(&target)
    }

    /// Number of active watches held by this process.
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// True iff this process holds no watches.
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Drains every watch, returning the slots for cslot revocation.
    pub fn drain(&mut self) -> Vec<WatchSlot> {
        self.watches.drain().map(|(_, slot)| slot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_and_unwatch_roundtrip() {
        let mut list = ClientWatchList::new();
        let target = Pid::new(5);
        list.watch(target, 42);
        assert!(list.is_watching(target));
        let slot = list.unwatch(target).unwrap();
        assert_eq!(slot.notify_ep, 42);
        assert!(!list.is_watching(target));
    }

    #[test]
    fn rewatch_replaces_slot() {
        let mut list = ClientWatchList::new();
        let target = Pid::new(1);
        list.watch(target, 1);
        list.watch(target, 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list.unwatch(target).unwrap().notify_ep, 2);
    }

    #[test]
    fn drain_empties_the_list() {
        let mut list = ClientWatchList::new();
        list.watch(Pid::new(1), 1);
        list.watch(Pid::new(2), 2);
        let drained = list.drain();
        assert_eq!(drained.len(), 2);
        assert!(list.is_empty());
    }
}
