//! One OS thread per reactor, each running a single-threaded Tokio
//! runtime plus a `LocalSet`, ported from `Thread`/`IoServices` in
//! `Application.cpp`. Mapping a Boost.Asio `io_service` per thread
//! onto `tokio::runtime::Builder::new_current_thread()` keeps the
//! "one reactor owns its sessions exclusively" invariant the `Rc`
//! types in [`crate::session`] depend on.

use std::thread;

use tokio::runtime::Builder;
use tokio::task::LocalSet;

use crate::config::SessionConfig;
use crate::cpu::{pin_current_thread_to_cpu_core, CpuCoreId};
use crate::session::{self, SessionOutcome};

/// One session plus its position in the original configuration list,
/// so the orchestrator can report results in creation order regardless
/// of which reactor thread actually ran them.
pub struct Assignment {
    pub index: usize,
    pub config: SessionConfig,
}

/// Spawn a reactor thread, optionally pinned to `core_id`, that runs
/// every assigned session to completion and returns their outcomes.
pub fn run_reactor(
    core_id: Option<CpuCoreId>,
    assignments: Vec<Assignment>,
) -> thread::JoinHandle<Vec<(usize, SessionOutcome)>> {
    thread::spawn(move || {
        if let Some(id) = core_id {
            pin_current_thread_to_cpu_core(id);
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build reactor runtime");
        let local = LocalSet::new();

        local.block_on(&runtime, async move {
            let mut handles = Vec::with_capacity(assignments.len());
            for assignment in assignments {
                let index = assignment.index;
                let handle = tokio::task::spawn_local(session::run_session(assignment.config));
                handles.push((index, handle));
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            for (index, handle) in handles {
                let outcome = handle.await.expect("session task panicked");
                outcomes.push((index, outcome));
            }
            outcomes
        })
    })
}
