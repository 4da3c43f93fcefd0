//! Wire format for records written into a process's notification ring.
//!
//! A [`NotificationRecord`] is the fixed-size unit the fault router, the
//! content-init protocol, and client-death cleanup all append to a
//! recipient's [ring buffer](crate). Argument layout is per-label.

/// Number of `u64` argument slots carried by every record.
pub const NOTIFY_ARGS: usize = 7;

/// Magic value stamped into every record, used by a reader as a sanity
/// check that it has not desynchronised against the writer.
pub const NOTIFY_MAGIC: u32 = 0x524f_4653; // "ROFS"

/// What kind of event a [`NotificationRecord`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NotificationLabel {
    /// A VM fault delegated to an external pager.
    ///
    /// `args = [winID, winSize, faultAddr, assocBase, isWrite, permissions, pc]`.
    FaultDelegation = 1,
    /// A content-init request: a page was first-touched and needs bytes.
    ///
    /// `args = [dspaceID, pageAlignedOffset, 0, 0, 0, 0, 0]`.
    ContentInit = 2,
    /// A watched process has died.
    ///
    /// `args = [pid, exitStatus, 0, 0, 0, 0, 0]`.
    Death = 3,
}

/// A fixed-format record written to a notification ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Always [`NOTIFY_MAGIC`]; present so a reader can detect corruption.
    pub magic: u32,
    /// The event kind.
    pub label: NotificationLabel,
    /// Label-specific argument words.
    pub args: [u64; NOTIFY_ARGS],
}

impl NotificationRecord {
    /// Builds a fault-delegation record.
    pub fn fault_delegation(
        win_id: u32,
        win_size: u64,
        fault_addr: u64,
        assoc_base: u64,
        is_write: bool,
        permissions: u64,
        pc: u64,
    ) -> Self {
        Self {
            magic: NOTIFY_MAGIC,
            label: NotificationLabel::FaultDelegation,
            args: [
                win_id as u64,
                win_size,
                fault_addr,
                assoc_base,
                is_write as u64,
                permissions,
                pc,
            ],
        }
    }

    /// Builds a content-init request record.
    pub fn content_init(dspace_id: u32, page_aligned_offset: u64) -> Self {
        Self {
            magic: NOTIFY_MAGIC,
            label: NotificationLabel::ContentInit,
            args: [dspace_id as u64, page_aligned_offset, 0, 0, 0, 0, 0],
        }
    }

    /// Builds a death record.
    pub fn death(pid: u32, exit_status: i32) -> Self {
        Self {
            magic: NOTIFY_MAGIC,
            label: NotificationLabel::Death,
            args: [pid as u64, exit_status as u64, 0, 0, 0, 0, 0],
        }
    }

    /// Serialises this record into a fixed-size byte buffer.
    ///
    /// Layout: magic (4 bytes, LE) · label (4 bytes, LE) · args (7 * 8 bytes, LE).
    pub fn to_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&(self.label as u32).to_le_bytes());
        for (i, arg) in self.args.iter().enumerate() {
            let start = 8 + i * 8;
            buf[start..start + 8].copy_from_slice(&arg.to_le_bytes());
        }
        buf
    }

    /// Deserialises a record previously produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Returns `None` if the magic does not match or the label is unknown.
    pub fn from_bytes(buf: [u8; Self::WIRE_SIZE]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != NOTIFY_MAGIC {
            return None;
        }
        let label_raw = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let label = match label_raw {
            1 => NotificationLabel::FaultDelegation,
            2 => NotificationLabel::ContentInit,
            3 => NotificationLabel::Death,
            _ => return None,
        };
        let mut args = [0u64; NOTIFY_ARGS];
        for (i, slot) in args.iter_mut().enumerate() {
            let start = 8 + i * 8;
            *slot = u64::from_le_bytes(buf[start..start + 8].try_into().unwrap());
        }
        Some(Self { magic, label, args })
    }
}

impl NotificationRecord {
    /// Size in bytes of the wire encoding.
    pub const WIRE_SIZE: usize = 8 + NOTIFY_ARGS * 8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_delegation_roundtrip() {
        let rec = NotificationRecord::fault_delegation(3, 0x1000, 0x20100, 0x20000, true, 0b11, 0x400000);
        let bytes = rec.to_bytes();
        let back = NotificationRecord::from_bytes(bytes).unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn death_record_carries_pid_and_status() {
        let rec = NotificationRecord::death(42, 7);
        assert_eq!(rec.args[0], 42);
        assert_eq!(rec.args[1], 7);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let mut bytes = NotificationRecord::death(1, 0).to_bytes();
        bytes[0] ^= 0xff;
        assert!(NotificationRecord::from_bytes(bytes).is_none());
    }
}
