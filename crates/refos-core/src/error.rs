//! The process-server error taxonomy.
//!
//! All fallible operations in the core return [`SysError`] rather than
//! panicking or raising an exception. `Ok`/generic-error distinctions are
//! kept flat to mirror the wire error codes a client actually observes.

use core::fmt;

/// An error returned by a process-server operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SysError {
    /// Malformed or out-of-range argument.
    Invalid = 1,
    /// A required parameter was missing or self-contradictory.
    InvalidParam = 2,
    /// The window id/handle given does not name a live window.
    InvalidWindow = 3,
    /// Out of memory (heap, untyped, or a fixed-capacity table is full).
    NoMem = 4,
    /// A frame is already mapped where the caller wanted to place one.
    UnmapFirst = 5,
    /// The caller lacks the permission this operation requires.
    AccessDenied = 6,
    /// No such named resource (e.g. name-server lookup miss).
    FileNotFound = 7,
    /// Internal: "do not reply here, the pager/content-initialiser will".
    Delegated = 8,
    /// Operation recognised but not implemented.
    Unimplemented = 9,
    /// Caller has no parameter buffer installed but the call requires one.
    NoParamBuffer = 10,
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid operation"),
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::InvalidWindow => write!(f, "invalid or overlapping window"),
            Self::NoMem => write!(f, "out of memory"),
            Self::UnmapFirst => write!(f, "frame already mapped, unmap first"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::FileNotFound => write!(f, "no such file or server"),
            Self::Delegated => write!(f, "delegated to external handler"),
            Self::Unimplemented => write!(f, "unimplemented"),
            Self::NoParamBuffer => write!(f, "no parameter buffer installed"),
        }
    }
}

impl std::error::Error for SysError {}

/// Convenience alias used throughout the core and server crates.
pub type SysResult<T> = Result<T, SysError>;
