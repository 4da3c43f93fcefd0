//! refos-server binary entry point.
//!
//! The real process-server runs as the root task handed its initial
//! capabilities directly by the microkernel at boot, then blocks forever in
//! `seL4_Recv`/`seL4_ReplyRecv` on its well-known endpoint, dispatching each
//! message through [`refos_server::dispatch`]. Neither the boot protocol nor
//! the kernel's IPC transport exist in this tree — [`refos_server::kernel`]
//! is the seam a real transport would plug into, exercised here by
//! `kernel::MockKernel` in tests.
//!
//! This binary stands in for that missing bootstrap: it builds an empty
//! [`refos_server::ServerState`], spawns the `init` placeholder process a
//! real boot would hand off to, and logs readiness. There is no receive loop
//! to run because there is nothing to receive from.

use refos_server::kernel::MockKernel;
use refos_server::{config, ServerState};

fn main() {
    env_logger::init();

    let mut state = ServerState::new(config::MAX_PIDS, config::PD_POOL_SIZE, MockKernel::new());
    match state.spawn_process(None, "init".into()) {
        Ok(pid) => log::info!("process-server up, spawned init as pid {pid}"),
        Err(e) => log::error!("failed to spawn init: {e}"),
    }
}
