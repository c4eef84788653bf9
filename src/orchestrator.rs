//! Top-level orchestration: distribute sessions round-robin across
//! reactor threads, run them to completion, and report in creation
//! order. Ported from `Application::run` and the
//! `TcpApplication`/`UdpApplication` split in `Application.cpp` (here
//! unified, since the reactor pool is protocol-agnostic).

use tracing::{error, info};

use crate::config::SessionConfig;
use crate::cpu::CpuCoreId;
use crate::error::Error;
use crate::reactor::{self, Assignment};
use crate::session::SessionOutcome;

/// Run every session in `configs`, spread round-robin across
/// `reactor_count` reactor threads (the Nth thread pinned to
/// `cpu_ids[N]` when present), and return the process exit code: `0`
/// if every session succeeded, otherwise the first failure's
/// `exit_code()` in creation order.
pub fn run(configs: Vec<SessionConfig>, reactor_count: usize, cpu_ids: &[CpuCoreId]) -> i32 {
    let reactor_count = reactor_count.max(1);
    let mut buckets: Vec<Vec<Assignment>> = (0..reactor_count).map(|_| Vec::new()).collect();
    for (index, config) in configs.into_iter().enumerate() {
        buckets[index % reactor_count].push(Assignment { index, config });
    }

    let handles: Vec<_> = buckets
        .into_iter()
        .enumerate()
        .map(|(slot, assignments)| {
            let core_id = cpu_ids.get(slot).copied();
            reactor::run_reactor(core_id, assignments)
        })
        .collect();

    let mut outcomes: Vec<(usize, SessionOutcome)> = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(mut partial) => outcomes.append(&mut partial),
            Err(_) => error!("a reactor thread panicked"),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    let mut exit_code = 0;
    for (index, outcome) in outcomes {
        let failure = outcome.failure.as_ref().map(Error::exit_code);
        finalize(index, &outcome);
        if let Some(code) = failure {
            if exit_code == 0 {
                exit_code = code;
            }
        }
    }
    exit_code
}

/// Print the per-session result the way `Session::finalize` dumps
/// statistics on exit.
fn finalize(index: usize, outcome: &SessionOutcome) {
    match &outcome.failure {
        Some(err) => error!(session = index, error = %err, "session failed"),
        None => info!(session = index, "session completed\n{}", outcome.stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_session_line;

    #[test]
    fn round_robins_sessions_across_reactor_count() {
        let configs: Vec<SessionConfig> = (0..5)
            .map(|i| {
                parse_session_line(&format!(
                    "--connect 127.0.0.1:{} --size 1B --mode tx",
                    9000 + i
                ))
                .unwrap()
            })
            .collect();
        let mut buckets: Vec<Vec<usize>> = (0..2).map(|_| Vec::new()).collect();
        for (index, _) in configs.iter().enumerate() {
            buckets[index % 2].push(index);
        }
        assert_eq!(buckets[0], vec![0, 2, 4]);
        assert_eq!(buckets[1], vec![1, 3]);
    }
}
