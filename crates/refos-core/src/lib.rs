//! Core types shared by every refos process-server crate.
//!
//! This crate contains the wire-level vocabulary everything else agrees
//! on: typed identifiers, badge arithmetic, the error taxonomy, access
//! permission bitmasks, and the notification record format. It has no
//! dependency on `refos-mm`/`refos-ipc`/`refos-server` so any of them can
//! be tested in isolation against it.

#![warn(missing_docs)]

pub mod error;
pub mod ids;
pub mod notify;
pub mod perms;

pub use error::{SysError, SysResult};
pub use ids::{DataspaceId, Pid, RingId, ThreadId, WindowId};
pub use notify::{NotificationLabel, NotificationRecord};
pub use perms::{AccessRights, Permissions};
