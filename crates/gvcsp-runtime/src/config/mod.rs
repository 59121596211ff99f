//! Runtime configuration
//!
//! # Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env`)
//! 3. `GVCSP_CONFIG_RS` overrides merged at build time
//! 4. Library defaults
//!
//! ```rust,ignore
//! use gvcsp_runtime::config::{PolicyKind, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_env()
//!     .num_workers(4)
//!     .policy(PolicyKind::RoundRobin);
//! ```

pub mod defaults;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gvcsp_core::constants::{MAX_WORKERS, MIN_STACK_SIZE};
use gvcsp_core::env::{env_get, env_get_bool, env_get_with};
pub use gvcsp_core::ConfigError;

/// Ready-queue policy used by every worker of a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// One FIFO per worker, no stealing
    RoundRobin,
    /// Per-worker deque; idle workers steal from peers
    WorkStealing,
}

impl PolicyKind {
    fn from_defaults() -> Self {
        if defaults::WORK_STEALING {
            PolicyKind::WorkStealing
        } else {
            PolicyKind::RoundRobin
        }
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" | "roundrobin" | "rr" => Ok(PolicyKind::RoundRobin),
            "work-stealing" | "workstealing" | "ws" => Ok(PolicyKind::WorkStealing),
            _ => Err(ConfigError::InvalidValue(
                "policy must be round-robin or work-stealing",
            )),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::RoundRobin => write!(f, "round-robin"),
            PolicyKind::WorkStealing => write!(f, "work-stealing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Worker threads; 0 means one per available CPU
    pub num_workers: usize,
    /// Usable stack bytes per task (rounded up to whole pages)
    pub stack_size: usize,
    /// Live tasks the stack arena can hold at once
    pub max_tasks: usize,
    pub policy: PolicyKind,
    /// Pin worker i to the i-th CPU of the process affinity mask
    pub pin_workers: bool,
    /// Spins on an empty ready queue before parking the worker
    pub idle_spins: u32,
    /// Upper bound on one idle park
    pub park_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Compile-time defaults with environment overrides.
    ///
    /// - `GVCSP_NUM_WORKERS` (0 = detect)
    /// - `GVCSP_STACK_SIZE`
    /// - `GVCSP_MAX_TASKS`
    /// - `GVCSP_POLICY` - `round-robin` | `work-stealing`
    /// - `GVCSP_PIN_WORKERS` - 0/1
    /// - `GVCSP_IDLE_SPINS`
    /// - `GVCSP_PARK_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("GVCSP_NUM_WORKERS", defaults::NUM_WORKERS),
            stack_size: env_get("GVCSP_STACK_SIZE", defaults::STACK_SIZE),
            max_tasks: env_get("GVCSP_MAX_TASKS", defaults::MAX_TASKS),
            policy: env_get_with("GVCSP_POLICY", PolicyKind::from_defaults(), |v| v.parse().ok()),
            pin_workers: env_get_bool("GVCSP_PIN_WORKERS", defaults::PIN_WORKERS),
            idle_spins: env_get("GVCSP_IDLE_SPINS", defaults::IDLE_SPINS),
            park_timeout: Duration::from_millis(env_get(
                "GVCSP_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )),
        }
    }

    /// Compile-time defaults only, ignoring the environment.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            stack_size: defaults::STACK_SIZE,
            max_tasks: defaults::MAX_TASKS,
            policy: PolicyKind::from_defaults(),
            pin_workers: defaults::PIN_WORKERS,
            idle_spins: defaults::IDLE_SPINS,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn max_tasks(mut self, n: usize) -> Self {
        self.max_tasks = n;
        self
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.pin_workers = pin;
        self
    }

    pub fn idle_spins(mut self, spins: u32) -> Self {
        self.idle_spins = spins;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    /// Worker count after resolving 0 to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.num_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_WORKERS)
        } else {
            self.num_workers
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolved_workers() > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers must be <= 256"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.max_tasks == 0 {
            return Err(ConfigError::InvalidValue("max_tasks must be > 0"));
        }
        if self.max_tasks + MAX_WORKERS > u32::MAX as usize {
            return Err(ConfigError::InvalidValue("max_tasks is too large"));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        Ok(())
    }

    /// Log the effective configuration at debug level.
    pub fn log(&self) {
        tracing::debug!(
            workers = self.resolved_workers(),
            stack_size = self.stack_size,
            max_tasks = self.max_tasks,
            policy = %self.policy,
            pin_workers = self.pin_workers,
            idle_spins = self.idle_spins,
            park_timeout = ?self.park_timeout,
            "gvcsp runtime config"
        );
    }
}
