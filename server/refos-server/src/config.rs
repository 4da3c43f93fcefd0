//! Compile-time tunables.

/// Maximum number of simultaneously live processes.
pub const MAX_PIDS: usize = 256;

/// Size of the pre-allocated PD+CNode pool; one slot per concurrently
/// live vspace.
pub const PD_POOL_SIZE: usize = MAX_PIDS;

/// Page size in bytes, used for dataspace and fault-offset arithmetic.
pub const PAGE_SIZE: u64 = refos_mm::PAGE_SIZE;

/// Default capacity in bytes of a process's notification ring, when one
/// is installed via `notification_buffer`.
pub const DEFAULT_RING_CAPACITY: usize = 4096;
