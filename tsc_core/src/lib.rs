//! # Traffic Signal Controller — Phase Controller Core
//!
//! The ring-and-barrier scheduler, per-phase state machine, call/recall
//! bookkeeping, and deterministic tick loop that together drive an actuated
//! intersection. Everything here is pure logic: no I/O, no
//! wall-clock reads. The `tsc` binary owns the adapters (field bus,
//! telemetry) and the real tick pacing; this crate is their single-threaded
//! cooperative brain.
//!
//! ## Module Structure
//!
//! - [`config`] — schema-v4 configuration loading and validation
//! - [`timing`] — tick-driven countdown/elapsed timers, no wall clock
//! - [`phase_state`] — one phase's STOP→GO→CLEAR state machine
//! - [`call_queue`] — deduplicated, aged, weighted pending-service requests
//! - [`scheduler`] — ring-barrier concurrency control and phase selection
//! - [`random_actuation`] — deterministic synthetic detector actuation
//! - [`projection`] — load-switch output mapping
//! - [`runtime`] — the tick loop, mode machine, and recall/idle policy (and
//!   its [`runtime::RuntimeError`] fatal-bug taxonomy)

pub mod call_queue;
pub mod config;
pub mod phase_state;
pub mod projection;
pub mod random_actuation;
pub mod runtime;
pub mod scheduler;
pub mod timing;
