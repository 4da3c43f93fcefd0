//! Pool of pre-allocated page-directory + root-CNode object pairs.
//!
//! These kernel objects are large and expensive to retype from untyped
//! memory, so the pool allocates `N` of them once at startup and reuses
//! slots across process lifetimes instead of tearing them down. Reusing a
//! slot reallocates only the root-CNode (caps copied into it during a
//! process's lifetime must be gone before reuse); the page directory
//! itself is kept and its mappings are expected to already have been torn
//! down by the owning [`VSpace`](crate::vspace::VSpace) before `free` runs.

use refos_core::SysError;

/// Opaque handle to a pooled page-directory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdHandle(u32);

/// Opaque handle to a pooled root-CNode object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CNodeHandle(u32);

/// Mints a fresh `(PdHandle, CNodeHandle)` pair and a fresh `CNodeHandle`
/// on reallocation. Supplied by the hosting [`Kernel`](crate) backend; the
/// pool itself only tracks which indices are in use.
pub trait PdObjectSource {
    /// Retypes a new page-directory object. Called once per pool slot, at
    /// pool construction time.
    fn new_pd(&mut self, idx: usize) -> PdHandle;
    /// Retypes a new root-CNode object. Called at pool construction and
    /// again every time a slot is freed.
    fn new_cnode(&mut self, idx: usize) -> CNodeHandle;
}

/// A fixed-capacity pool of `(PdHandle, CNodeHandle)` pairs.
pub struct PdPool {
    slots: Vec<Option<(PdHandle, CNodeHandle)>>,
    free_list: Vec<usize>,
}

impl PdPool {
    /// Builds a pool of `capacity` slots, retyping every object up front
    /// via `source`.
    pub fn new(capacity: usize, source: &mut impl PdObjectSource) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        let mut free_list = Vec::with_capacity(capacity);
        for idx in 0..capacity {
            let pd = source.new_pd(idx);
            let cnode = source.new_cnode(idx);
            slots.push(Some((pd, cnode)));
            free_list.push(capacity - 1 - idx);
        }
        Self { slots, free_list }
    }

    /// Pops a slot from the pool.
    pub fn assign(&mut self) -> Result<(usize, PdHandle, CNodeHandle), SysError> {
        let idx = self.free_list.pop().ok_or(SysError::NoMem)?;
        let (pd, cnode) = self.slots[idx].expect("free-list slot must be occupied");
        Ok((idx, pd, cnode))
    }

    /// Returns slot `idx` to the pool, reallocating its root-CNode via
    /// `source` so stale caps cannot survive into the next tenant.
    pub fn free(&mut self, idx: usize, source: &mut impl PdObjectSource) {
        let (pd, _stale_cnode) = self.slots[idx].expect("double-free of pd pool slot");
        let cnode = source.new_cnode(idx);
        self.slots[idx] = Some((pd, cnode));
        self.free_list.push(idx);
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Total pool capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        next: u32,
    }

    impl PdObjectSource for CountingSource {
        fn new_pd(&mut self, _idx: usize) -> PdHandle {
            self.next += 1;
            PdHandle(self.next)
        }

        fn new_cnode(&mut self, _idx: usize) -> CNodeHandle {
            self.next += 1;
            CNodeHandle(self.next)
        }
    }

    #[test]
    fn assign_and_free_roundtrip() {
        let mut src = CountingSource { next: 0 };
        let mut pool = PdPool::new(4, &mut src);
        let (idx, _pd, _cnode) = pool.assign().unwrap();
        assert_eq!(pool.in_use(), 1);
        pool.free(idx, &mut src);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn free_reallocates_cnode_not_pd() {
        let mut src = CountingSource { next: 0 };
        let mut pool = PdPool::new(2, &mut src);
        let (idx, pd_before, cnode_before) = pool.assign().unwrap();
        pool.free(idx, &mut src);
        let (idx2, pd_after, cnode_after) = pool.assign().unwrap();
        assert_eq!(idx, idx2);
        assert_eq!(pd_before, pd_after, "pd object must be kept across reuse");
        assert_ne!(cnode_before, cnode_after, "cnode must be reallocated on free");
    }

    #[test]
    fn exhaustion_is_nomem() {
        let mut src = CountingSource { next: 0 };
        let mut pool = PdPool::new(1, &mut src);
        pool.assign().unwrap();
        assert_eq!(pool.assign().unwrap_err(), SysError::NoMem);
    }
}
