//! Access and process permission bitmasks.

use bitflags::bitflags;

bitflags! {
    /// Memory access permissions on a window or dataspace mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessRights: u32 {
        /// Readable.
        const READ = 1 << 0;
        /// Writable.
        const WRITE = 1 << 1;
        /// Executable.
        const EXECUTE = 1 << 2;
    }
}

bitflags! {
    /// Privileged capabilities a process may hold.
    ///
    /// Mirrors the donor's `systemCapabilitiesMask`: most processes have
    /// none of these set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// May call `device_map` to map arbitrary physical addresses.
        const DEVICE_MAP = 1 << 0;
        /// May call `get_irq_handler`.
        const DEVICE_IRQ = 1 << 1;
        /// May perform raw I/O-port access.
        const DEVICE_IO_PORT = 1 << 2;
    }
}
