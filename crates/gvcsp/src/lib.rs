//! # gvcsp - CSP processes on green threads
//!
//! Stackful cooperative tasks multiplexed onto a pool of worker threads,
//! talking over unbuffered rendezvous channels.
//!
//! ## Features
//!
//! - **Rendezvous channels**: a write completes only when a reader takes it;
//!   the payload is copied straight between the two stacks
//! - **Alt**: wait on several channel reads plus an optional deadline;
//!   exactly one of them wins
//! - **Two ready-queue policies**: strict round-robin, or per-worker deques
//!   with work stealing
//! - **Fork-join**: `Par` spawns a group of tasks and waits for all of them
//!
//! ## Quick Start
//!
//! ```ignore
//! use gvcsp::{Chan, Runtime, RuntimeConfig};
//!
//! fn main() {
//!     let rt = Runtime::new(RuntimeConfig::from_env()).unwrap();
//!     let answer = rt.block_on(|cx| {
//!         let chan = Chan::<u64>::new();
//!         let tx = chan.clone();
//!         cx.spawn(move |cx| tx.write(cx, 42));
//!         chan.read(cx)
//!     });
//!     assert_eq!(answer, 42);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        Ctx::spawn, Chan::read/write, Alt::select, Par       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Runtime (remote queues, live count)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │◄────►│  Worker   │◄────►│  Worker   │   (steals)
//!    │ loop+timer│      │ loop+timer│      │ loop+timer│
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                    Stack Arena                          │
//!    │        guard page + stack per slot, one mmap            │
//!    └─────────────────────────────────────────────────────────┘
//! ```

mod par;

pub use par::{par, Par};

// Re-export core types
pub use gvcsp_core::{
    Location,
    RuntimeError,
    RuntimeResult,
    TaskArgs,
    TaskId,
    TaskState,
};

// Re-export env utilities
pub use gvcsp_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use gvcsp_runtime::{
    Alt,
    Chan,
    Ctx,
    PolicyKind,
    RawChan,
    Runtime,
    RuntimeConfig,
    Selected,
    TaskHandle,
};
