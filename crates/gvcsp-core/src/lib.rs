//! # gvcsp-core
//!
//! Core types for the gvcsp runtime (CSP processes on stackful green threads).
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Context switching, stacks, workers and channels live in `gvcsp-runtime`.
//!
//! ## Modules
//!
//! - `id` - task identifier type
//! - `state` - task state and the checked location machine
//! - `claim` - alt claim word (epoch + winner in one atomic)
//! - `args` - bounded argument list for `spawn_with`
//! - `slot` - stack slot allocator
//! - `spinlock` - short-critical-section lock used by channels and tasks
//! - `error` - error types
//! - `env` - environment variable helpers

pub mod id;
pub mod state;
pub mod claim;
pub mod args;
pub mod slot;
pub mod spinlock;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use id::TaskId;
pub use state::{Location, TaskState};
pub use claim::{AltClaim, Winner};
pub use args::TaskArgs;
pub use slot::SlotAllocator;
pub use spinlock::SpinLock;
pub use error::{ConfigError, MemoryError, RuntimeError, RuntimeResult, WorkerError};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_with};

/// Limits and layout constants
pub mod constants {
    /// Guard page placed below every task stack
    pub const GUARD_SIZE: usize = 4096;

    /// Smallest accepted task stack
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Upper bound on worker threads
    pub const MAX_WORKERS: usize = 256;

    /// Arguments accepted by `spawn_with`
    pub const MAX_TASK_ARGS: usize = 16;
}
