//! Name-server syscalls: register/unregister well-known mount points and
//! resolve a path's longest-registered prefix.
//!
//! Grounded on `name_syscall.c`'s handlers of the same name.

use refos_core::{SysError, SysResult};
use refos_ipc::EndpointHandle as NameServerEndpoint;
use refos_mm::PdObjectSource;

use crate::kernel::Kernel;
use crate::ServerState;

/// Registers `name` to `ep`, replacing any existing entry with the same
/// segment.
pub fn register<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, name: &str, ep: u32) -> SysResult<()> {
    if name.is_empty() {
        return Err(SysError::InvalidParam);
    }
    state.nameserver.register(name, NameServerEndpoint(ep));
    Ok(())
}

/// Removes the entry for `name`, if present.
pub fn unregister<K: Kernel + PdObjectSource>(state: &mut ServerState<K>, name: &str) -> SysResult<()> {
    state.nameserver.unregister(name);
    Ok(())
}

/// Resolves `path` against the longest registered prefix, returning the
/// endpoint and the number of bytes consumed so the caller can re-resolve
/// the remainder against the child server.
pub fn resolve_segment<K: Kernel + PdObjectSource>(state: &ServerState<K>, path: &str) -> SysResult<(u32, usize)> {
    state
        .nameserver
        .resolve(path)
        .map(|(ep, consumed)| (ep.0, consumed))
        .ok_or(SysError::FileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MockKernel;

    fn setup() -> ServerState<MockKernel> {
        ServerState::new(4, 4, MockKernel::new())
    }

    #[test]
    fn register_then_resolve_longest_prefix() {
        let mut state = setup();
        register(&mut state, "/dev", 1).unwrap();
        register(&mut state, "/dev/console", 2).unwrap();
        let (ep, consumed) = resolve_segment(&state, "/dev/console/0").unwrap();
        assert_eq!(ep, 2);
        assert_eq!(consumed, "/dev/console".len());
    }

    #[test]
    fn unregister_removes_entry() {
        let mut state = setup();
        register(&mut state, "/dev", 1).unwrap();
        unregister(&mut state, "/dev").unwrap();
        assert_eq!(resolve_segment(&state, "/dev"), Err(SysError::FileNotFound));
    }

    #[test]
    fn register_rejects_empty_name() {
        let mut state = setup();
        assert_eq!(register(&mut state, "", 1), Err(SysError::InvalidParam));
    }
}
