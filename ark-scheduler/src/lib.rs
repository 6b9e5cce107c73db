//! The work queue and worker pool the Query Reconciler runs on.
//!
//! Generic over the resource key `K` so it can schedule `Query`, `Agent`,
//! `A2ATaskMirror` reconciliations, or anything else the controller binary
//! wires up, without depending on `ark-core`'s CRD types directly.

pub mod pool;
pub mod queue;

pub use pool::{spawn, SchedulerOutcome, DEFAULT_WORKERS};
pub use queue::WorkQueue;
