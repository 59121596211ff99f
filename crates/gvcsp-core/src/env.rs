//! Environment variable helpers
//!
//! Every runtime knob can be overridden with a `GVCSP_*` variable.
//! Unset or unparsable values fall back to the supplied default.
//!
//! ```ignore
//! use gvcsp_core::env::{env_get, env_get_bool};
//!
//! let workers: usize = env_get("GVCSP_NUM_WORKERS", 4);
//! let pin = env_get_bool("GVCSP_PIN_WORKERS", true);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, or return `default`.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if set and well formed.
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag: "1", "true", "yes", "on" are true; "0", "false", "no",
/// "off" are false (case-insensitive); anything else keeps `default`.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Map `key` through `parse`; `None` from the parser keeps `default`.
pub fn env_get_with<T>(key: &str, default: T, parse: impl FnOnce(&str) -> Option<T>) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| parse(v.trim()))
        .unwrap_or(default)
}
