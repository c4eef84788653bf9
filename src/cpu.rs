//! CPU core pinning, ported from `Cpu.hpp`'s
//! `pin_current_thread_to_cpu_core`, backed by the `core_affinity`
//! crate rather than hand-rolled `pthread_setaffinity_np` glue.

use tracing::warn;

pub type CpuCoreId = u32;

/// Pin the calling thread to the given core id. Unknown ids are
/// logged and ignored rather than treated as fatal: a reactor that
/// fails to pin still runs correctly, just without the placement
/// guarantee.
pub fn pin_current_thread_to_cpu_core(id: CpuCoreId) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.into_iter().find(|c| c.id == id as usize) {
        Some(core_id) => {
            if !core_affinity::set_for_current(core_id) {
                warn!(core = id, "failed to pin reactor thread to cpu core");
            }
        }
        None => warn!(core = id, "cpu core id not found on this host"),
    }
}
