//! Single-host parallel solving over a fork-based worker pool.
//!
//! # Architecture
//!
//! ```text
//!                  +------------------+
//!                  |   Coordinator    |
//!                  |  (select loop)   |
//!                  +---------+--------+
//!                            |  pipes, one per worker
//!            +---------------+---------------+
//!            |               |               |
//!      +-----v-----+   +-----v-----+   +-----v-----+
//!      | Worker 1  |   | Worker 2  |   | Worker N  |
//!      | (fork'd)  |   | (fork'd)  |   | (fork'd)  |
//!      +-----------+   +-----------+   +-----------+
//! ```
//!
//! Each worker is a forked copy of the solver restricted to a stripe of the
//! combo space; its stdout/stderr feed a pipe the coordinator multiplexes
//! with a one-second `select` tick. Workers speak the line-framed `@@`
//! protocol ([`protocol`]); everything else they print is passed through as
//! opaque solver output. Probe and rebalance modes reuse the same
//! spawn/multiplex loop with different termination policies, and the
//! first-move queue mode adds a shared counter file ([`queue`]) for dynamic
//! ply-1 load balancing.

pub mod coordinator;
pub mod emitter;
pub mod ipc;
pub mod probe;
pub mod protocol;
pub mod queue;
pub mod rebalance;
pub mod worker;

pub use coordinator::{interrupted, Pool, PoolOptions, MAX_WORKERS};
pub use probe::{run_probe, HeavyCombo, HeavyComboTable, ProbeOptions};
pub use rebalance::{run_rebalance, RebalanceOptions};
pub use worker::{run_worker, solve_with_protocol, WorkerSetup};
