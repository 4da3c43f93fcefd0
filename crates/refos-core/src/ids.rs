//! Type-safe identifiers for process-server resources.
//!
//! These newtypes prevent accidental mixing of PIDs, window IDs, dataspace
//! IDs, and ring IDs at compile time. Every object reachable from outside
//! the core is named by one of these, drawn from a non-overlapping badge
//! range (see [`badge`]).

use core::fmt;

/// Process identifier. Index into the PID table; `0` is never live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Creates a new `Pid`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` (convenience for indexing).
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WindowId(u32);

impl WindowId {
    /// Creates a new `WindowId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` (convenience for indexing).
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anonymous RAM dataspace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DataspaceId(u32);

impl DataspaceId {
    /// Creates a new `DataspaceId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` (convenience for indexing).
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DataspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification-ring identifier (one per process owning a ring buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RingId(u32);

impl RingId {
    /// Creates a new `RingId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier, unique within the owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// The process's initial thread always has this id.
    pub const INITIAL: Self = Self(0);

    /// Creates a new `ThreadId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Badge-range base constants.
///
/// Badges are `base_of_kind + id`. Ranges are disjoint so the dispatcher
/// can classify an incoming IPC by inspecting only the unwrapped badge.
pub mod badge {
    /// Base of the PID badge range.
    pub const PID_BASE: u64 = 0x0001_0000;
    /// Base of the PID-liveness badge range (death-watch targets).
    pub const LIVENESS_BASE: u64 = 0x0002_0000;
    /// Base of the window badge range.
    pub const WINDOW_BASE: u64 = 0x0003_0000;
    /// Base of the dataspace badge range.
    pub const DATASPACE_BASE: u64 = 0x0004_0000;
    /// Base of the async-notification badge range.
    pub const NOTIFICATION_BASE: u64 = 0x0005_0000;
    /// Base of the client-session badge range.
    pub const SESSION_BASE: u64 = 0x0006_0000;

    /// One past the highest assignable id in any single range.
    pub const RANGE_SPAN: u64 = 0x0001_0000;
}

/// Mints the badge for a PID.
pub const fn pid_badge(pid: Pid) -> u64 {
    badge::PID_BASE + pid.as_u32() as u64
}

/// Mints the liveness badge for a PID (used as a death-watch target handle).
pub const fn liveness_badge(pid: Pid) -> u64 {
    badge::LIVENESS_BASE + pid.as_u32() as u64
}

/// Recovers the PID from a liveness badge, or `None` if out of range.
pub const fn pid_from_liveness_badge(badge: u64) -> Option<Pid> {
    if badge < badge::LIVENESS_BASE || badge >= badge::LIVENESS_BASE + badge::RANGE_SPAN {
        return None;
    }
    Some(Pid::new((badge - badge::LIVENESS_BASE) as u32))
}

/// Mints the badge for a window.
pub const fn window_badge(id: WindowId) -> u64 {
    badge::WINDOW_BASE + id.as_u32() as u64
}

/// Mints the badge for a dataspace.
pub const fn dataspace_badge(id: DataspaceId) -> u64 {
    badge::DATASPACE_BASE + id.as_u32() as u64
}
