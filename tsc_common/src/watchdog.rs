//! Supervisor contract for the `tsc` binary's I/O adapter threads.
//!
//! The controller core runs on the calling (RT) thread; the bus and
//! telemetry adapters each run on their own OS thread and communicate with
//! the core only through bounded channels. This trait is deliberately
//! thin — it captures the operations the binary's supervision loop needs to
//! detect a stalled or dead adapter thread, without mandating a specific
//! process or thread management strategy.

/// Identifies a managed adapter thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedModule {
    /// Field bus adapter thread.
    Bus,
    /// Telemetry publisher thread.
    Telemetry,
}

/// Health status returned by [`Watchdog::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// The adapter's last heartbeat is current.
    Healthy,
    /// The adapter is alive but its heartbeat is stale (possible hang).
    Stale { age_ticks: u64 },
    /// The adapter thread has exited.
    Dead,
    /// The adapter was never started.
    Unknown,
}

/// Error type for watchdog operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    #[error("failed to spawn {module:?}: {reason}")]
    SpawnFailed {
        module: ManagedModule,
        reason: String,
    },

    #[error("{module:?} not ready after {timeout_ticks} ticks")]
    ReadyTimeout {
        module: ManagedModule,
        timeout_ticks: u64,
    },

    #[error("watchdog error: {0}")]
    Other(String),
}

/// Supervisor contract for adapter thread lifecycle management.
pub trait Watchdog {
    /// Spawn an adapter thread, returning a join handle identifier.
    fn spawn(&mut self, module: ManagedModule) -> Result<(), WatchdogError>;

    /// Query the health of a managed adapter.
    fn health_check(&self, module: ManagedModule) -> HealthStatus;

    /// Request every managed adapter to stop, then join their threads.
    fn shutdown_all(&mut self) -> Result<(), WatchdogError>;
}
