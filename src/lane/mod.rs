// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared dispatcher machinery for all three lanes. Every lane exposes the
//! same public surface (`init`/`shutdown`/`submit`/`wait`/`poll`/`cancel`/
//! `get_status`); differences are confined to slot capacity, id range,
//! simulated execution ratio, and an optional submission precondition
//! (FPGA's bitstream gate). [`LaneCore`] implements the shared surface once;
//! `cpu`, `fpga`, and `dsp` each wrap it with their own extension hooks.

pub mod cpu;
pub mod dsp;
pub mod fpga;

use crate::error::{HalError, HalResult};
use crate::function_registry::FunctionRegistry;
use crate::job::{Job, JobResult, Lane};
use crate::power::PowerState;
use crate::slot::{SlotEntry, SlotTable};
use crate::time::Deadline;
use crate::worker;
use slog::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub use cpu::CpuLane;
pub use dsp::DspLane;
pub use fpga::FpgaLane;

/// A terminal-result observer, invoked once per completed/errored/timed-out/
/// cancelled job, on the worker thread that produced it.
pub type ResultCallback = Box<dyn Fn(&JobResult) + Send + Sync>;

/// Lane configuration, supplied to `init`.
#[derive(Debug, Clone)]
pub struct LaneConfig {
    pub lane: Lane,
    pub max_concurrent_jobs: u32,
    pub queue_depth: u32,
    pub wcet_monitoring: bool,
    pub power_gating_enabled: bool,
    pub clock_frequency_mhz: u32,
}

impl LaneConfig {
    pub fn new(lane: Lane) -> Self {
        Self {
            lane,
            max_concurrent_jobs: 0,
            queue_depth: 0,
            wcet_monitoring: true,
            power_gating_enabled: false,
            clock_frequency_mhz: 800,
        }
    }
}

/// Lane status and health snapshot, as returned by `get_lane_status`.
#[derive(Debug, Clone)]
pub struct LaneStatus {
    pub lane: Lane,
    pub online: bool,
    pub healthy: bool,
    pub slot_capacity: u32,
    pub pending_jobs: u32,
    pub submitted_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub total_execution_time_us: u64,
    pub cpu_usage_percent: u32,
    pub memory_usage_percent: u32,
    pub temperature_celsius: u32,
    pub power_consumption_mw: u32,
}

/// Result of `run_self_test`.
#[derive(Debug, Clone)]
pub struct SelfTestResult {
    pub passed: bool,
    pub test_duration_us: u32,
    pub errors_detected: u32,
    pub error_description: String,
}

#[derive(Default)]
pub(crate) struct LaneCounters {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub total_execution_time_us: u64,
}

/// Everything guarded by the lane's single mutex: the slot table, the
/// admission/lifecycle counters, and the online/initialised/tracing flags.
/// Invariant 7 ("all slot-table mutations occur under the lane mutex") is
/// enforced simply by these fields all living behind the same `Mutex`.
pub(crate) struct LaneInner {
    pub initialised: bool,
    pub online: bool,
    pub config: Option<LaneConfig>,
    pub slots: SlotTable,
    pub next_job_id: u32,
    pub stats: LaneCounters,
    pub power_state: PowerState,
    pub clock_mhz: u32,
    pub tracing_enabled: bool,
}

/// Shared dispatcher state and logic, generic over nothing: the three
/// concrete lane types (`CpuLane`, `FpgaLane`, `DspLane`) each wrap one and
/// supply a submission precondition plus a healthy-extra predicate (FPGA
/// requires a loaded bitstream; CPU and DSP have none).
pub(crate) struct LaneCore {
    tag: Lane,
    capacity: usize,
    sim_ratio: (u32, u32),
    registry: Arc<dyn FunctionRegistry>,
    logger: Logger,
    callbacks: Arc<Mutex<Vec<ResultCallback>>>,
    inner: Arc<Mutex<LaneInner>>,
    telemetry: SimulatedTelemetry,
    precondition: Box<dyn Fn(&LaneInner) -> HalResult<()> + Send + Sync>,
    healthy_extra: Box<dyn Fn(&LaneInner) -> bool + Send + Sync>,
}

/// Fixed simulated telemetry, matching the constants the source HAL reports
/// for each lane (no real sensors are in scope).
#[derive(Clone, Copy)]
pub(crate) struct SimulatedTelemetry {
    pub cpu_usage_percent: u32,
    pub memory_usage_percent: u32,
    pub temperature_celsius: u32,
    pub power_consumption_mw: u32,
}

impl LaneCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tag: Lane,
        capacity: usize,
        sim_ratio: (u32, u32),
        registry: Arc<dyn FunctionRegistry>,
        logger: Logger,
        callbacks: Arc<Mutex<Vec<ResultCallback>>>,
        telemetry: SimulatedTelemetry,
        precondition: Box<dyn Fn(&LaneInner) -> HalResult<()> + Send + Sync>,
        healthy_extra: Box<dyn Fn(&LaneInner) -> bool + Send + Sync>,
    ) -> Self {
        let inner = LaneInner {
            initialised: false,
            online: false,
            config: None,
            slots: SlotTable::new(capacity),
            next_job_id: tag.id_base(),
            stats: LaneCounters::default(),
            power_state: PowerState::default(),
            clock_mhz: 0,
            tracing_enabled: false,
        };
        Self {
            tag,
            capacity,
            sim_ratio,
            registry,
            logger,
            callbacks,
            inner: Arc::new(Mutex::new(inner)),
            telemetry,
            precondition,
            healthy_extra,
        }
    }

    pub(crate) fn tag(&self) -> Lane {
        self.tag
    }

    pub(crate) fn inner(&self) -> &Arc<Mutex<LaneInner>> {
        &self.inner
    }

    pub(crate) fn init(&self, config: LaneConfig) -> HalResult<()> {
        if config.lane != self.tag {
            return Err(HalError::InvalidParam);
        }
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if inner.initialised {
            return Ok(());
        }
        inner.online = true;
        inner.next_job_id = self.tag.id_base();
        inner.clock_mhz = config.clock_frequency_mhz;
        inner.config = Some(config);
        inner.initialised = true;
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised {
            return;
        }
        // signal cancellation to every in-flight worker before releasing
        // its slot, then join outside the lock.
        for idx in inner.slots.active_indices() {
            if let Some(entry) = inner.slots.get(idx) {
                entry.cancel.store(true, Ordering::Release);
            }
        }
        let released = inner.slots.drain_all();
        inner.online = false;
        inner.initialised = false;
        drop(inner);
        for entry in released {
            if let Some(handle) = entry.handle {
                let _ = handle.join();
            }
        }
    }

    pub(crate) fn submit(&self, mut job: Job) -> HalResult<u32> {
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised || !inner.online {
            return Err(HalError::LaneOffline);
        }
        (self.precondition)(&inner)?;
        let idx = inner.slots.find_free().ok_or(HalError::Busy)?;

        let job_id = inner.next_job_id;
        job.job_id = job_id;
        let result = Arc::new(Mutex::new(JobResult::pending(job_id, self.tag)));
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = worker::spawn(
            self.tag,
            job.clone(),
            self.registry.clone(),
            cancel.clone(),
            result.clone(),
            self.inner.clone(),
            self.sim_ratio,
            self.callbacks.clone(),
            self.logger.clone(),
        );
        let handle = match handle {
            Ok(h) => h,
            Err(_) => return Err(HalError::Hardware),
        };

        inner.next_job_id += 1;
        inner.slots.occupy(
            idx,
            SlotEntry {
                job,
                result,
                cancel,
                handle: Some(handle),
            },
        );
        inner.stats.jobs_submitted += 1;
        Ok(job_id)
    }

    pub(crate) fn wait(&self, job_id: u32, timeout_us: u32) -> HalResult<JobResult> {
        let result_cell = {
            let inner = self.inner.lock().expect("lane lock poisoned");
            let idx = inner.slots.find_by_job_id(job_id).ok_or(HalError::InvalidParam)?;
            inner.slots.get(idx).unwrap().result.clone()
        };

        // std::thread has no timed join; poll the shared result's status
        // until it turns terminal (or the deadline passes), then perform a
        // real join below, which by then returns essentially immediately.
        let deadline = Deadline::after_us(timeout_us);
        loop {
            if result_cell
                .lock()
                .expect("result lock poisoned")
                .status
                .is_terminal()
            {
                break;
            }
            match deadline.remaining() {
                Some(left) => thread::sleep(left.min(Duration::from_micros(200))),
                None => return Err(HalError::Timeout),
            }
        }

        let mut inner = self.inner.lock().expect("lane lock poisoned");
        let idx = inner.slots.find_by_job_id(job_id).ok_or(HalError::InvalidParam)?;
        let snapshot = inner.slots.get(idx).unwrap().result.lock().expect("result lock poisoned").clone();
        let entry = inner.slots.release(idx).expect("slot was occupied");
        drop(inner);
        if let Some(handle) = entry.handle {
            let _ = handle.join();
        }
        Ok(snapshot)
    }

    pub(crate) fn poll(&self, job_id: u32) -> HalResult<JobResult> {
        let inner = self.inner.lock().expect("lane lock poisoned");
        let idx = inner.slots.find_by_job_id(job_id).ok_or(HalError::InvalidParam)?;
        let snapshot = inner.slots.get(idx).unwrap().result.lock().expect("result lock poisoned").clone();
        if snapshot.status.is_terminal() {
            Ok(snapshot)
        } else {
            Err(HalError::Busy)
        }
    }

    pub(crate) fn cancel(&self, job_id: u32) -> HalResult<()> {
        let inner = self.inner.lock().expect("lane lock poisoned");
        let idx = inner.slots.find_by_job_id(job_id).ok_or(HalError::InvalidParam)?;
        inner.slots.get(idx).unwrap().cancel.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn status(&self) -> LaneStatus {
        let inner = self.inner.lock().expect("lane lock poisoned");
        LaneStatus {
            lane: self.tag,
            online: inner.online,
            healthy: inner.online && (self.healthy_extra)(&inner),
            slot_capacity: self.capacity as u32,
            pending_jobs: inner.slots.active_count() as u32,
            submitted_jobs: inner.stats.jobs_submitted,
            completed_jobs: inner.stats.jobs_completed,
            failed_jobs: inner.stats.jobs_failed,
            total_execution_time_us: inner.stats.total_execution_time_us,
            cpu_usage_percent: self.telemetry.cpu_usage_percent,
            memory_usage_percent: self.telemetry.memory_usage_percent,
            temperature_celsius: self.telemetry.temperature_celsius,
            power_consumption_mw: self.telemetry.power_consumption_mw,
        }
    }

    pub(crate) fn set_power_state(&self, state: PowerState) -> HalResult<()> {
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised {
            return Err(HalError::LaneOffline);
        }
        inner.power_state = state;
        Ok(())
    }

    pub(crate) fn set_clock_frequency(&self, mhz: u32) -> HalResult<()> {
        if mhz == 0 {
            return Err(HalError::InvalidParam);
        }
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised {
            return Err(HalError::LaneOffline);
        }
        inner.clock_mhz = mhz;
        Ok(())
    }

    pub(crate) fn set_tracing(&self, enable: bool) -> HalResult<()> {
        let mut inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised {
            return Err(HalError::LaneOffline);
        }
        inner.tracing_enabled = enable;
        Ok(())
    }

    /// Run the lane's function registry against `test_vector` twice and
    /// compare checksums, catching non-determinism without admitting a
    /// real job into the slot table.
    pub(crate) fn run_self_test(&self, test_vector: u32) -> HalResult<SelfTestResult> {
        let inner = self.inner.lock().expect("lane lock poisoned");
        if !inner.initialised {
            return Err(HalError::LaneOffline);
        }
        drop(inner);

        let start = crate::time::now_monotonic_us();
        let input = test_vector.to_le_bytes();
        let first = self.registry.execute("self_test", &input, 4);
        let second = self.registry.execute("self_test", &input, 4);
        let duration = (crate::time::now_monotonic_us() - start) as u32;

        match (first, second) {
            (Ok(a), Ok(b)) if a == b => Ok(SelfTestResult {
                passed: true,
                test_duration_us: duration,
                errors_detected: 0,
                error_description: String::new(),
            }),
            (Ok(_), Ok(_)) => Ok(SelfTestResult {
                passed: false,
                test_duration_us: duration,
                errors_detected: 1,
                error_description: "non-deterministic output across repeated runs".to_string(),
            }),
            _ => Ok(SelfTestResult {
                passed: false,
                test_duration_us: duration,
                errors_detected: 1,
                error_description: "function registry execution failed".to_string(),
            }),
        }
    }

}

/// Object-safe facade over a concrete lane, used by [`crate::system::System`]
/// to treat all three lanes uniformly for the lane-agnostic parts of the
/// callable surface.
pub trait LaneDispatcher: Send + Sync {
    fn tag(&self) -> Lane;
    fn init(&self, config: LaneConfig) -> HalResult<()>;
    fn shutdown(&self);
    fn submit(&self, job: Job) -> HalResult<u32>;
    fn wait(&self, job_id: u32, timeout_us: u32) -> HalResult<JobResult>;
    fn poll(&self, job_id: u32) -> HalResult<JobResult>;
    fn cancel(&self, job_id: u32) -> HalResult<()>;
    fn status(&self) -> LaneStatus;
    fn set_power_state(&self, state: PowerState) -> HalResult<()>;
    fn set_clock_frequency(&self, mhz: u32) -> HalResult<()>;
    fn set_tracing(&self, enable: bool) -> HalResult<()>;
    fn run_self_test(&self, test_vector: u32) -> HalResult<SelfTestResult>;
}
