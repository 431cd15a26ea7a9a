// SPDX-License-Identifier: GPL-3.0-or-later

//! DSP lane: a vector/scalar execution mode toggle and simulated memory
//! bandwidth telemetry, otherwise identical admission semantics to CPU.

use super::{LaneConfig, LaneCore, LaneDispatcher, LaneStatus, SelfTestResult, SimulatedTelemetry};
use crate::error::HalResult;
use crate::function_registry::FunctionRegistry;
use crate::job::{Job, JobResult, Lane};
use crate::power::PowerState;
use slog::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const SIM_RATIO: (u32, u32) = (1, 3);

/// Simulated memory bandwidth readout, reported by `dsp_get_memory_bandwidth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBandwidth {
    pub read_mbps: u32,
    pub write_mbps: u32,
}

pub struct DspLane {
    core: LaneCore,
    vector_mode: AtomicBool,
}

impl DspLane {
    pub(crate) fn new(
        capacity: usize,
        registry: Arc<dyn FunctionRegistry>,
        logger: Logger,
        callbacks: Arc<Mutex<Vec<super::ResultCallback>>>,
    ) -> Self {
        let telemetry = SimulatedTelemetry {
            cpu_usage_percent: 15,
            memory_usage_percent: 25,
            temperature_celsius: 48,
            power_consumption_mw: 1_800,
        };
        let core = LaneCore::new(
            Lane::Dsp,
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
            vector_mode: AtomicBool::new(false),
        }
    }

    /// Switch between scalar and vectorized simulated execution. Recorded
    /// only; the deterministic function registry does not branch on it.
    pub fn set_vector_mode(&self, enabled: bool) -> HalResult<()> {
        self.vector_mode.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub fn vector_mode(&self) -> bool {
        self.vector_mode.load(Ordering::Relaxed)
    }

    /// Simulated memory bandwidth, higher in vector mode.
    pub fn memory_bandwidth(&self) -> MemoryBandwidth {
        if self.vector_mode() {
            MemoryBandwidth {
                read_mbps: 6_400,
                write_mbps: 3_200,
            }
        } else {
            MemoryBandwidth {
                read_mbps: 3_200,
                write_mbps: 1_600,
            }
        }
    }
}

impl LaneDispatcher for DspLane {
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

    fn test_lane() -> DspLane {
        DspLane::new(
            4,
            default_registry(),
            Logger::root(Discard, slog::o!()),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    #[test]
    fn vector_mode_toggles() {
        let lane = test_lane();
        assert!(!lane.vector_mode());
        lane.set_vector_mode(true).unwrap();
        assert!(lane.vector_mode());
    }

    #[test]
    fn bandwidth_rises_in_vector_mode() {
        let lane = test_lane();
        let scalar = lane.memory_bandwidth();
        lane.set_vector_mode(true).unwrap();
        let vector = lane.memory_bandwidth();
        assert!(vector.read_mbps > scalar.read_mbps);
    }
}
