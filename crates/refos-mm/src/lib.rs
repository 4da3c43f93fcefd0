//! Memory and process-table management for the refos process-server.
//!
//! PID allocation, the PD pool, the window registry and its per-vspace
//! association list, anonymous RAM dataspaces, and the vspace object
//! itself all live here. None of these types perform any IPC; they are
//! pure bookkeeping structures driven by the `refos-server` dispatch loop.

#![warn(missing_docs)]

pub mod dataspace;
pub mod pdpool;
pub mod pid;
pub mod vspace;
pub mod window;

pub use dataspace::{FrameHandle, RamDataspace, RamDataspaceTable, SavedReply, PAGE_SIZE};
pub use pdpool::{CNodeHandle, PdHandle, PdObjectSource, PdPool};
pub use pid::PidAllocator;
pub use vspace::{TrackedObject, VSpace};
pub use window::{Assoc, AssocList, Window, WindowMode, WindowTable};
