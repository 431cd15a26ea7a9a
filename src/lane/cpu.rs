// SPDX-License-Identifier: GPL-3.0-or-later

//! CPU lane: the simplest backend, with no precondition on submission and a
//! simulated cache-statistics readout matching the source HAL's constants.

use super::{LaneConfig, LaneCore, LaneDispatcher, LaneStatus, SelfTestResult, SimulatedTelemetry};
use crate::error::HalResult;
use crate::function_registry::FunctionRegistry;
use crate::job::{Job, JobResult, Lane};
use crate::power::PowerState;
use slog::Logger;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Simulated L1/L2 cache counters, reported by `cpu_get_cache_stats`. Fixed
/// constants rather than a real performance-counter readout, matching the
/// source HAL's simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
}

const SIM_RATIO: (u32, u32) = (1, 2);

pub struct CpuLane {
    core: LaneCore,
    affinity_mask: AtomicU64,
}

impl CpuLane {
    pub(crate) fn new(
        capacity: usize,
        registry: Arc<dyn FunctionRegistry>,
        logger: Logger,
        callbacks: Arc<Mutex<Vec<super::ResultCallback>>>,
    ) -> Self {
        let telemetry = SimulatedTelemetry {
            cpu_usage_percent: 35,
            memory_usage_percent: 20,
            temperature_celsius: 45,
            power_consumption_mw: 2_500,
        };
        let core = LaneCore::new(
            Lane::Cpu,
            capacity,
            SIM_RATIO,
            registry,
            logger,
            callbacks,
            telemetry,
            Box::new(|_inner| Ok(())),
            Box::new(|_inner| true),
        );
        Self {
            core,
            affinity_mask: AtomicU64::new(u64::MAX),
        }
    }

    /// Restrict the lane's simulated worker threads to the CPUs set in
    /// `mask`. Recorded only; this crate does not call into the OS
    /// scheduler, per the source HAL's own simulation of affinity.
    pub fn set_affinity(&self, mask: u64) -> HalResult<()> {
        if mask == 0 {
            return Err(crate::error::HalError::InvalidParam);
        }
        self.affinity_mask.store(mask, Ordering::Relaxed);
        Ok(())
    }

    pub fn affinity(&self) -> u64 {
        self.affinity_mask.load(Ordering::Relaxed)
    }

    /// Simulated cache statistics, constant regardless of job history —
    /// the source HAL has no real performance-counter access either.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: 9_500,
            l1_misses: 500,
            l2_hits: 450,
            l2_misses: 50,
        }
    }
}

impl LaneDispatcher for CpuLane {
    fn tag(&self) -> Lane {
        self.core.tag()
    }

    fn init(&self, config: LaneConfig) -> HalResult<()> {
        self.core.init(config)
    }

    fn shutdown(&self) {
        self.core.shutdown()
    }

    fn submit(&self, job: Job) -> HalResult<u32> {
        self.core.submit(job)
    }

    fn wait(&self, job_id: u32, timeout_us: u32) -> HalResult<JobResult> {
        self.core.wait(job_id, timeout_us)
    }

    fn poll(&self, job_id: u32) -> HalResult<JobResult> {
        self.core.poll(job_id)
    }

    fn cancel(&self, job_id: u32) -> HalResult<()> {
        self.core.cancel(job_id)
    }

    fn status(&self) -> LaneStatus {
        self.core.status()
    }

    fn set_power_state(&self, state: PowerState) -> HalResult<()> {
        self.core.set_power_state(state)
    }

    fn set_clock_frequency(&self, mhz: u32) -> HalResult<()> {
        self.core.set_clock_frequency(mhz)
    }

    fn set_tracing(&self, enable: bool) -> HalResult<()> {
        self.core.set_tracing(enable)
    }

    fn run_self_test(&self, test_vector: u32) -> HalResult<SelfTestResult> {
        self.core.run_self_test(test_vector)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::function_registry::default_registry;
    use slog::{Discard, Logger};

    fn test_lane() -> CpuLane {
        CpuLane::new(
            4,
            default_registry(),
            Logger::root(Discard, slog::o!()),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    #[test]
    fn affinity_rejects_zero_mask() {
        let lane = test_lane();
        assert_eq!(lane.set_affinity(0), Err(crate::error::HalError::InvalidParam));
    }

    #[test]
    fn affinity_roundtrips() {
        let lane = test_lane();
        lane.set_affinity(0b0011).unwrap();
        assert_eq!(lane.affinity(), 0b0011);
    }

    #[test]
    fn cache_stats_are_stable() {
        let lane = test_lane();
        assert_eq!(lane.cache_stats(), lane.cache_stats());
    }
}
