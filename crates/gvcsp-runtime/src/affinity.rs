//! Worker CPU pinning
//!
//! Worker `i` is pinned to the `i`-th CPU of the process's allowed set,
//! wrapping around when there are more workers than CPUs. Failure only
//! costs locality, so it is logged and ignored.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
        use nix::unistd::Pid;

        fn allowed_cpus() -> nix::Result<Vec<usize>> {
            let set = sched_getaffinity(Pid::from_raw(0))?;
            let mut cpus = Vec::new();
            for cpu in 0..CpuSet::count() {
                if set.is_set(cpu)? {
                    cpus.push(cpu);
                }
            }
            Ok(cpus)
        }

        fn pin_to(cpu: usize) -> nix::Result<()> {
            let mut set = CpuSet::new();
            set.set(cpu)?;
            sched_setaffinity(Pid::from_raw(0), &set)
        }

        /// Pin the calling thread for worker `worker`. Returns the CPU used.
        pub fn pin_current_thread(worker: usize) -> Option<usize> {
            let cpus = match allowed_cpus() {
                Ok(cpus) if !cpus.is_empty() => cpus,
                Ok(_) => return None,
                Err(e) => {
                    tracing::warn!(worker, error = %e, "cannot read cpu affinity");
                    return None;
                }
            };
            let cpu = cpus[worker % cpus.len()];
            match pin_to(cpu) {
                Ok(()) => {
                    tracing::debug!(worker, cpu, "worker pinned");
                    Some(cpu)
                }
                Err(e) => {
                    tracing::warn!(worker, cpu, error = %e, "failed to pin worker");
                    None
                }
            }
        }
    } else {
        /// Pinning is not supported on this platform.
        pub fn pin_current_thread(_worker: usize) -> Option<usize> {
            None
        }
    }
}
