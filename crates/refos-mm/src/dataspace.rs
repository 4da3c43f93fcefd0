//! Anonymous RAM dataspaces: lazy frame materialisation and content-init.
//!
//! A [`RamDataspace`] is a reference-counted, dense-indexed byte range
//! whose frames are created on first touch. Two independent features are
//! layered on top of the plain page array: physical-address backing (for
//! device-MMIO dataspaces) and the content-init protocol (an external
//! server supplies bytes for a page on its first fault, and faulters queue
//! behind a per-page waiter list until it does).

use std::collections::HashMap;

use refos_core::{AccessRights, DataspaceId, SysError};

/// Page size in bytes used for frame materialisation and content-init
/// granularity.
pub const PAGE_SIZE: u64 = 0x1000;

/// A lazily materialised frame handle. Opaque to this crate; minted by
/// whatever backend implements frame allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub u64);

/// A saved reply, opaque to this crate. The server crate owns the real
/// RAII `ReplyHandle`; this is just a transport token so a waiter queue
/// can be stored here without a dependency on the server crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedReply(pub u64);

/// An anonymous RAM dataspace.
pub struct RamDataspace {
    /// Size in pages.
    pub npages: usize,
    pages: Vec<Option<FrameHandle>>,
    /// Access permissions content is mapped with.
    pub perms: AccessRights,
    /// If set, pages are materialised from `base_paddr + offset` instead of
    /// fresh anonymous frames. Mutually exclusive with content-init.
    pub physical_addr: Option<u64>,
    /// If set, an external server supplies content for pages lazily.
    content_init: Option<ContentInit>,
    /// Number of outstanding shared-refs (windows, a process's param
    /// buffer, a ring buffer). Destroyed by the caller once this hits 0.
    refcount: usize,
}

struct ContentInit {
    /// Owned notification endpoint of the initialising server.
    notify_ep: u32,
    /// PID of the initialising server.
    initialiser: refos_core::Pid,
    provided: Vec<bool>,
    waiters: HashMap<usize, Vec<(refos_core::Pid, SavedReply)>>,
}

impl RamDataspace {
    /// Creates a new dataspace of `npages` pages, all unmaterialised.
    pub fn new(npages: usize, perms: AccessRights) -> Self {
        Self {
            npages,
            pages: vec![None; npages],
            perms,
            physical_addr: None,
            content_init: None,
            refcount: 1,
        }
    }

    /// Takes a new shared-ref, returning the updated count.
    pub fn incref(&mut self) -> usize {
        self.refcount += 1;
        self.refcount
    }

    /// Releases a shared-ref, returning the updated count. Callers should
    /// destroy the dataspace once this reaches 0.
    pub fn decref(&mut self) -> usize {
        self.refcount = self.refcount.saturating_sub(1);
        self.refcount
    }

    /// Current outstanding shared-ref count.
    pub fn refcount(&self) -> usize {
        self.refcount
    }

    /// Enables physical-address backing at `base_paddr`.
    ///
    /// Requires the page array to currently be empty (no page touched yet)
    /// and content-init to not be enabled, per the mutual-exclusion
    /// invariant.
    pub fn enable_physical_addr(&mut self, base_paddr: u64) -> Result<(), SysError> {
        if self.content_init.is_some() {
            return Err(SysError::InvalidParam);
        }
        if self.pages.iter().any(Option::is_some) {
            return Err(SysError::InvalidParam);
        }
        self.physical_addr = Some(base_paddr);
        Ok(())
    }

    /// Materialises (or returns the already-materialised) frame at a
    /// page-aligned byte `offset`.
    ///
    /// `alloc_anon` is called to mint a fresh anonymous frame handle when
    /// one is needed and `physical_addr` is unset.
    pub fn get_page(
        &mut self,
        offset: u64,
        alloc_anon: impl FnOnce(u64) -> FrameHandle,
    ) -> Result<FrameHandle, SysError> {
        let idx = (offset / PAGE_SIZE) as usize;
        if idx >= self.npages {
            return Err(SysError::InvalidParam);
        }
        if let Some(frame) = self.pages[idx] {
            return Ok(frame);
        }
        let frame = match self.physical_addr {
            Some(base) => FrameHandle(base + idx as u64 * PAGE_SIZE),
            None => alloc_anon(offset),
        };
        self.pages[idx] = Some(frame);
        Ok(frame)
    }

    /// True if the page covering `offset` has already been materialised.
    ///
    /// A fault re-entering this page is a book-keeping error rather than a
    /// legitimate fault; callers on the fault path check this before
    /// calling [`get_page`](Self::get_page) rather than relying on its
    /// idempotent return.
    pub fn page_mapped(&self, offset: u64) -> bool {
        let idx = (offset / PAGE_SIZE) as usize;
        idx < self.pages.len() && self.pages[idx].is_some()
    }

    /// Grows the dataspace to `new_npages` pages.
    ///
    /// Shrinking is not supported (expansion is monotonic); existing page
    /// entries and the content-init bitmap are preserved.
    pub fn expand(&mut self, new_npages: usize) -> Result<(), SysError> {
        if new_npages < self.npages {
            return Err(SysError::Invalid);
        }
        self.pages.resize(new_npages, None);
        if let Some(ci) = &mut self.content_init {
            ci.provided.resize(new_npages, false);
        }
        self.npages = new_npages;
        Ok(())
    }

    /// Size in bytes (monotonic with `expand`).
    pub fn size_bytes(&self) -> u64 {
        self.npages as u64 * PAGE_SIZE
    }

    /// Registers an external server as this dataspace's content initialiser.
    pub fn content_init(&mut self, notify_ep: u32, initialiser: refos_core::Pid) {
        self.content_init = Some(ContentInit {
            notify_ep,
            initialiser,
            provided: vec![false; self.npages],
            waiters: HashMap::new(),
        });
    }

    /// Un-registers content-init, dropping any pending waiters.
    ///
    /// Returns the owned notify endpoint so the caller can revoke/delete it.
    pub fn remove_content_init(&mut self) -> Option<u32> {
        self.content_init.take().map(|ci| ci.notify_ep)
    }

    /// True iff content-init is enabled for this dataspace.
    pub fn content_init_enabled(&self) -> bool {
        self.content_init.is_some()
    }

    /// The content initialiser's PID, if content-init is enabled.
    pub fn initialiser(&self) -> Option<refos_core::Pid> {
        self.content_init.as_ref().map(|ci| ci.initialiser)
    }

    /// The content initialiser's owned notify endpoint, if content-init is
    /// enabled.
    pub fn content_init_notify_ep(&self) -> Option<u32> {
        self.content_init.as_ref().map(|ci| ci.notify_ep)
    }

    /// True while `provided[page]` is false for the page covering `offset`.
    ///
    /// Always false if content-init is not enabled.
    pub fn need_content_init(&self, offset: u64) -> bool {
        let idx = (offset / PAGE_SIZE) as usize;
        match &self.content_init {
            Some(ci) => idx < ci.provided.len() && !ci.provided[idx],
            None => false,
        }
    }

    /// Stashes a reply under the page covering `offset`, to be woken once
    /// that page's content is provided.
    ///
    /// `faulter` is carried alongside the reply so the caller can clear
    /// that process's fault-blocked bookkeeping once woken.
    ///
    /// Returns `true` if this was the first waiter enqueued on this page
    /// since it last became un-provided (used by property tests to check
    /// "exactly one notification per first fault").
    pub fn add_content_init_waiter(&mut self, offset: u64, faulter: refos_core::Pid, reply: SavedReply) -> bool {
        let idx = (offset / PAGE_SIZE) as usize;
        let ci = self.content_init.as_mut().expect("content-init not enabled");
        let bucket = ci.waiters.entry(idx).or_default();
        let first = bucket.is_empty();
        bucket.push((faulter, reply));
        first
    }

    /// Marks every page touched by `[offset, offset+size)` as provided and
    /// drains their waiter queues, returning the `(faulter, reply)` pairs
    /// to wake.
    pub fn provide_data(&mut self, offset: u64, size: u64) -> Result<Vec<(refos_core::Pid, SavedReply)>, SysError> {
        let ci = self.content_init.as_mut().ok_or(SysError::InvalidParam)?;
        let start = (offset / PAGE_SIZE) as usize;
        let end = ((offset + size + PAGE_SIZE - 1) / PAGE_SIZE) as usize;
        if end > ci.provided.len() {
            return Err(SysError::InvalidParam);
        }
        let mut woken = Vec::new();
        for idx in start..end {
            ci.provided[idx] = true;
            if let Some(waiters) = ci.waiters.remove(&idx) {
                woken.extend(waiters);
            }
        }
        Ok(woken)
    }
}

/// Global table of live dataspaces, keyed by [`DataspaceId`].
#[derive(Default)]
pub struct RamDataspaceTable {
    dataspaces: slab::Slab<RamDataspace>,
}

impl RamDataspaceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { dataspaces: slab::Slab::new() }
    }

    /// Creates a new dataspace and mints its badge.
    pub fn insert(&mut self, npages: usize, perms: AccessRights) -> (DataspaceId, u64) {
        let key = self.dataspaces.vacant_key();
        let badge = refos_core::ids::badge::DATASPACE_BASE + key as u64;
        let key2 = self.dataspaces.insert(RamDataspace::new(npages, perms));
        debug_assert_eq!(key, key2);
        (DataspaceId::new(key as u32), badge)
    }

    /// Looks up a dataspace by id.
    pub fn get(&self, id: DataspaceId) -> Option<&RamDataspace> {
        self.dataspaces.get(id.as_usize())
    }

    /// Looks up a dataspace by id, mutably.
    pub fn get_mut(&mut self, id: DataspaceId) -> Option<&mut RamDataspace> {
        self.dataspaces.get_mut(id.as_usize())
    }

    /// Removes a dataspace, returning it for destruction bookkeeping
    /// (revoke badge, free frames, release content-init endpoint, drain
    /// waiters) by the caller.
    pub fn remove(&mut self, id: DataspaceId) -> Option<RamDataspace> {
        if !self.dataspaces.contains(id.as_usize()) {
            return None;
        }
        Some(self.dataspaces.remove(id.as_usize()))
    }
}
