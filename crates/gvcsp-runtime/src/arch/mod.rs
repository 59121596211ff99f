//! Architecture-specific context switching
//!
//! Each backend exposes the same three items:
//! - `SavedRegs`: callee-saved state of a suspended context
//! - `init_context`: prepare a fresh context that enters `entry(arg)`
//! - `switch_context`: save the current context and resume another

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::{init_context, switch_context, SavedRegs};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::{init_context, switch_context, SavedRegs};
    } else {
        compile_error!("gvcsp supports x86_64 and aarch64 only");
    }
}

/// Entry point of a fresh context. It must never return: a finished
/// context switches away for good.
pub type ContextEntry = extern "C" fn(usize) -> !;
