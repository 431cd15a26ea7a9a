// SPDX-License-Identifier: GPL-3.0-or-later

//! HRCLS — Heterogeneous Redundant Compute Lane Scheduler.
//!
//! A hardware abstraction core that dispatches safety-critical compute jobs
//! across three dissimilar compute substrates (CPU, FPGA, DSP lanes),
//! enforces per-job Worst-Case Execution Time (WCET) budgets, and exposes
//! the deterministic primitives (uniform job/result framing, checksums,
//! disjoint job-id ranges, a cross-lane barrier) that an external 2-out-of-3
//! voter needs to compare lanes' outputs. This crate does not vote, route on
//! outcome, or certify any assurance level — see [`system::System`] for the
//! callable surface higher safety layers build on.
//!
//! ```no_run
//! use hrcls::{Job, Lane, Priority, System};
//! use slog::{Drain, Logger, o};
//!
//! let drain = slog::Discard;
//! let logger = Logger::root(drain.fuse(), o!());
//! let system = System::new(logger);
//! system.init(800).unwrap();
//!
//! let job = Job::new(Priority::Normal, 1_000_000, 1_000_000, "checksum", *b"ABCDEFGH")
//!     .with_output_capacity(4);
//! let job_id = system.submit_job(Lane::Cpu, job).unwrap();
//! let result = system.wait_job(Lane::Cpu, job_id, 1_000_000).unwrap();
//! assert_eq!(result.status, hrcls::JobStatus::Completed);
//! system.shutdown();
//! ```

pub mod barrier;
pub mod checksum;
pub mod error;
pub mod function_registry;
pub mod job;
pub mod lane;
pub mod logging;
pub mod power;
pub mod registry;
mod slot;
pub mod system;
pub mod time;
mod wcet;
mod worker;

pub use error::{HalError, HalResult};
pub use job::{Job, JobResult, JobStatus, Lane, Priority};
pub use lane::{LaneConfig, LaneDispatcher, LaneStatus, SelfTestResult};
pub use logging::terminal_logger;
pub use power::PowerState;
pub use registry::{SystemStats, VoteOutcome};
pub use system::System;
pub use wcet::Classification;
