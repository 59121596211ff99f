//! Error types for the gvcsp runtime
//!
//! Contract violations (payload size mismatch, illegal transitions, too many
//! task arguments) are panics, not errors. Only recoverable conditions live
//! here.

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by runtime construction and `try_spawn`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Every stack slot is in use
    #[error("no stack slots available")]
    NoStackSlots,

    /// Runtime is shutting down and no longer accepts tasks
    #[error("runtime is shutting down")]
    ShuttingDown,

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration rejected by `validate`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0}")]
    InvalidValue(&'static str),
}

/// Stack arena errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// mmap of the arena failed (errno)
    #[error("failed to reserve stack arena (errno {0})")]
    ReserveFailed(i32),

    /// mprotect failed (errno)
    #[error("failed to change slot protection (errno {0})")]
    ProtectionFailed(i32),

    /// madvise failed (errno)
    #[error("failed to release slot pages (errno {0})")]
    AdviseFailed(i32),

    /// slot count times slot size overflows the address space
    #[error("too many slots for the address space")]
    TooManySlots,

    #[error("invalid slot index {0}")]
    InvalidSlot(u32),
}

/// Worker thread errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    #[error("worker thread panicked")]
    Panicked,
}
