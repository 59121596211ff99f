//! # gvcsp-runtime
//!
//! Runtime for CSP-style programs on stackful green threads.
//!
//! This crate provides:
//! - Context switching (x86_64 and aarch64 assembly)
//! - A stack arena with guard pages
//! - Worker threads, each running one cooperative scheduler
//! - Round-robin and work-stealing ready queues
//! - Unbuffered rendezvous channels and alt with deadlines
//!
//! Tasks never preempt each other: a task runs until it blocks on a
//! channel, alt, sleep or join, yields, or returns.

pub mod arch;
pub mod config;
pub mod memory;
pub mod parking;
pub mod policy;
pub mod timer;

mod affinity;
mod alt;
mod channel;
mod runtime;
mod scheduler;
mod task;
mod worker;

pub use alt::{Alt, Selected};
pub use channel::{Chan, RawChan};
pub use config::{PolicyKind, RuntimeConfig};
pub use runtime::{Ctx, Runtime};
pub use task::TaskHandle;

pub use gvcsp_core::{RuntimeError, RuntimeResult, TaskArgs, TaskId, TaskState};
