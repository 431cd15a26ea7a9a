// SPDX-License-Identifier: GPL-3.0-or-later

//! FPGA lane: submission is gated on a bitstream having been loaded first,
//! and utilization telemetry shifts once it is, matching the source HAL's
//! before/after constants.

use super::{LaneConfig, LaneCore, LaneDispatcher, LaneStatus, SelfTestResult, SimulatedTelemetry};
use crate::checksum::{self, CHECKSUM_SEED};
use crate::error::{HalError, HalResult};
use crate::function_registry::FunctionRegistry;
use crate::job::{Job, JobResult, Lane};
use crate::power::PowerState;
use slog::Logger;
use std::sync::{Arc, Mutex};

const SIM_RATIO: (u32, u32) = (1, 3);
const DEFAULT_BITSTREAM_ID: &str = "default_v1.0";

/// Logic/DSP-slice/block-RAM utilization percentages, reported by
/// `fpga_get_utilization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utilization {
    pub logic_percent: u32,
    pub dsp_percent: u32,
    pub bram_percent: u32,
}

struct BitstreamState {
    loaded: bool,
    id: String,
}

impl Default for BitstreamState {
    fn default() -> Self {
        Self {
            loaded: false,
            id: DEFAULT_BITSTREAM_ID.to_string(),
        }
    }
}

pub struct FpgaLane {
    core: LaneCore,
    bitstream: Arc<Mutex<BitstreamState>>,
}

impl FpgaLane {
    pub(crate) fn new(
        capacity: usize,
        registry: Arc<dyn FunctionRegistry>,
        logger: Logger,
        callbacks: Arc<Mutex<Vec<super::ResultCallback>>>,
    ) -> Self {
        let bitstream = Arc::new(Mutex::new(BitstreamState::default()));
        let telemetry = SimulatedTelemetry {
            cpu_usage_percent: 5,
            memory_usage_percent: 15,
            temperature_celsius: 52,
            power_consumption_mw: 4_200,
        };

        let precondition_bitstream = bitstream.clone();
        let precondition = Box::new(move |_inner: &super::LaneInner| {
            if precondition_bitstream
                .lock()
                .expect("bitstream lock poisoned")
                .loaded
            {
                Ok(())
            } else {
                Err(HalError::NotSupported)
            }
        });

        let healthy_bitstream = bitstream.clone();
        let healthy_extra = Box::new(move |_inner: &super::LaneInner| {
            healthy_bitstream.lock().expect("bitstream lock poisoned").loaded
        });

        let core = LaneCore::new(
            Lane::Fpga,
            capacity,
            SIM_RATIO,
            registry,
            logger,
            callbacks,
            telemetry,
            precondition,
            healthy_extra,
        );
        Self { core, bitstream }
    }

    /// Load a bitstream, computing its id from the deterministic function
    /// hash over its bytes, matching the source HAL's `custom_%08x` format.
    /// Until this is called, `submit` rejects jobs with `NotSupported`.
    pub fn load_bitstream(&self, bitstream_data: &[u8]) -> HalResult<()> {
        if bitstream_data.is_empty() {
            return Err(HalError::InvalidParam);
        }
        let hash = checksum::polynomial31(CHECKSUM_SEED, bitstream_data);
        let mut state = self.bitstream.lock().expect("bitstream lock poisoned");
        state.loaded = true;
        state.id = format!("custom_{hash:08x}");
        Ok(())
    }

    pub fn bitstream_id(&self) -> String {
        self.bitstream.lock().expect("bitstream lock poisoned").id.clone()
    }

    pub fn bitstream_loaded(&self) -> bool {
        self.bitstream.lock().expect("bitstream lock poisoned").loaded
    }

    /// Utilization telemetry, which steps up once a bitstream is loaded —
    /// an idle FPGA fabric genuinely uses less of itself than one running a
    /// custom design.
    pub fn utilization(&self) -> Utilization {
        if self.bitstream_loaded() {
            Utilization {
                logic_percent: 45,
                dsp_percent: 70,
                bram_percent: 80,
            }
        } else {
            Utilization {
                logic_percent: 25,
                dsp_percent: 40,
                bram_percent: 60,
            }
        }
    }
}

impl LaneDispatcher for FpgaLane {
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
    use crate::job::Priority;
    use slog::{Discard, Logger};

    fn test_lane() -> FpgaLane {
        let lane = FpgaLane::new(
            4,
            default_registry(),
            Logger::root(Discard, slog::o!()),
            Arc::new(Mutex::new(Vec::new())),
        );
        lane.init(LaneConfig::new(Lane::Fpga)).unwrap();
        lane
    }

    #[test]
    fn submit_without_bitstream_is_not_supported() {
        let lane = test_lane();
        let job = Job::new(Priority::Normal, 10_000, 10_000, "f", vec![1, 2, 3]);
        assert_eq!(lane.submit(job), Err(HalError::NotSupported));
    }

    #[test]
    fn loading_bitstream_unblocks_submission() {
        let lane = test_lane();
        lane.load_bitstream(b"bitstream-bytes").unwrap();
        assert!(lane.bitstream_loaded());
        let job = Job::new(Priority::Normal, 10_000, 10_000, "f", vec![1, 2, 3]);
        assert!(lane.submit(job).is_ok());
    }

    #[test]
    fn bitstream_id_follows_custom_format() {
        let lane = test_lane();
        lane.load_bitstream(b"abc").unwrap();
        assert!(lane.bitstream_id().starts_with("custom_"));
    }

    #[test]
    fn utilization_rises_after_load() {
        let lane = test_lane();
        let before = lane.utilization();
        lane.load_bitstream(b"abc").unwrap();
        let after = lane.utilization();
        assert!(after.logic_percent > before.logic_percent);
    }
}
