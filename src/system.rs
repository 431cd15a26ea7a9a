// SPDX-License-Identifier: GPL-3.0-or-later

//! The `System` facade: owns the three lanes, the barrier registry, and the
//! system-wide statistics registry, and implements the lane-agnostic
//! callable surface on top of them. This is the type an embedding
//! application constructs once and threads through its own concurrency.

use crate::barrier::BarrierRegistry;
use crate::error::{HalError, HalResult};
use crate::function_registry::{default_registry, FunctionRegistry};
use crate::job::{Job, JobResult, Lane};
use crate::lane::cpu::CacheStats;
use crate::lane::dsp::MemoryBandwidth;
use crate::lane::fpga::Utilization;
use crate::lane::{CpuLane, DspLane, FpgaLane, LaneConfig, LaneDispatcher, LaneStatus, ResultCallback, SelfTestResult};
use crate::power::PowerState;
use crate::registry::{SystemRegistry, SystemStats};
use slog::{info, o, Logger};
use std::sync::{Arc, Mutex};

const CPU_CAPACITY: usize = 32;
const FPGA_CAPACITY: usize = 16;
const DSP_CAPACITY: usize = 16;

/// The scheduler's three lanes plus the cross-lane machinery (barrier,
/// system stats, terminal-result callbacks) needed by higher safety layers.
pub struct System {
    cpu: CpuLane,
    fpga: FpgaLane,
    dsp: DspLane,
    barrier: Arc<BarrierRegistry>,
    stats: SystemRegistry,
    callbacks: Arc<Mutex<Vec<ResultCallback>>>,
    logger: Logger,
}

impl System {
    /// Construct a system with the default deterministic function registry,
    /// shared by all three lanes (real hardware drivers would inject their
    /// own per-lane registries instead).
    pub fn new(logger: Logger) -> Self {
        Self::with_registry(logger, default_registry())
    }

    pub fn with_registry(logger: Logger, registry: Arc<dyn FunctionRegistry>) -> Self {
        let callbacks: Arc<Mutex<Vec<ResultCallback>>> = Arc::new(Mutex::new(Vec::new()));
        Self {
            cpu: CpuLane::new(CPU_CAPACITY, registry.clone(), logger.new(o!("lane" => "cpu")), callbacks.clone()),
            fpga: FpgaLane::new(FPGA_CAPACITY, registry.clone(), logger.new(o!("lane" => "fpga")), callbacks.clone()),
            dsp: DspLane::new(DSP_CAPACITY, registry, logger.new(o!("lane" => "dsp")), callbacks.clone()),
            barrier: Arc::new(BarrierRegistry::new()),
            stats: SystemRegistry::new(),
            callbacks,
            logger,
        }
    }

    fn dispatcher(&self, lane: Lane) -> &dyn LaneDispatcher {
        match lane {
            Lane::Cpu => &self.cpu,
            Lane::Fpga => &self.fpga,
            Lane::Dsp => &self.dsp,
        }
    }

    fn all_dispatchers(&self) -> [&dyn LaneDispatcher; 3] {
        [&self.cpu, &self.fpga, &self.dsp]
    }

    /// Initialize all three lanes with the given per-lane base configuration
    /// (only `lane` and `clock_frequency_mhz` are honored per-lane here;
    /// callers wanting distinct queue depths should call `configure_lane`
    /// again after `init`).
    pub fn init(&self, clock_frequency_mhz: u32) -> HalResult<()> {
        for lane in Lane::ALL {
            let mut config = LaneConfig::new(lane);
            config.clock_frequency_mhz = clock_frequency_mhz;
            self.dispatcher(lane).init(config)?;
        }
        info!(self.logger, "system initialised"; "clock_mhz" => clock_frequency_mhz);
        Ok(())
    }

    /// Shut down all three lanes, cancelling and joining every in-flight
    /// worker. Idempotent.
    pub fn shutdown(&self) {
        for lane in Lane::ALL {
            self.dispatcher(lane).shutdown();
        }
        info!(self.logger, "system shut down");
    }

    pub fn configure_lane(&self, config: LaneConfig) -> HalResult<()> {
        self.dispatcher(config.lane).init(config)
    }

    pub fn submit_job(&self, lane: Lane, job: Job) -> HalResult<u32> {
        self.dispatcher(lane).submit(job)
    }

    /// Fan out `job` to every online lane under a common caller-supplied
    /// correlation id. Best-effort: a rejection from one lane does not roll
    /// back acceptances already made by others. Returns the lane-scoped job
    /// ids actually accepted, plus the first error encountered (if any).
    pub fn submit_redundant_job(&self, job: Job) -> (Vec<(Lane, u32)>, Option<HalError>) {
        let mut accepted = Vec::new();
        let mut first_error = None;
        for lane in Lane::ALL {
            match self.dispatcher(lane).submit(job.clone()) {
                Ok(job_id) => accepted.push((lane, job_id)),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        (accepted, first_error)
    }

    pub fn wait_job(&self, lane: Lane, job_id: u32, timeout_us: u32) -> HalResult<JobResult> {
        self.dispatcher(lane).wait(job_id, timeout_us)
    }

    pub fn poll_job(&self, lane: Lane, job_id: u32) -> HalResult<JobResult> {
        self.dispatcher(lane).poll(job_id)
    }

    pub fn cancel_job(&self, lane: Lane, job_id: u32) -> HalResult<()> {
        self.dispatcher(lane).cancel(job_id)
    }

    /// Rendezvous at `group_id` with one expected participant per currently
    /// online lane.
    pub fn barrier_sync(&self, group_id: &str, timeout_us: u32) -> HalResult<()> {
        let expected = self
            .all_dispatchers()
            .iter()
            .filter(|d| d.status().online)
            .count();
        self.barrier.sync(group_id, expected, timeout_us)
    }

    pub fn get_lane_status(&self, lane: Lane) -> LaneStatus {
        self.dispatcher(lane).status()
    }

    pub fn get_system_stats(&self) -> SystemStats {
        self.stats.snapshot(&self.all_dispatchers())
    }

    /// Entry point for the external voter to record how a redundant job's
    /// cross-lane results compared; the core does not judge votes itself.
    pub fn record_vote_outcome(&self, outcome: crate::registry::VoteOutcome) {
        self.stats.record_vote_outcome(outcome);
    }

    pub fn set_power_state(&self, lane: Lane, state: PowerState) -> HalResult<()> {
        self.dispatcher(lane).set_power_state(state)
    }

    pub fn set_clock_frequency(&self, lane: Lane, mhz: u32) -> HalResult<()> {
        self.dispatcher(lane).set_clock_frequency(mhz)
    }

    pub fn run_self_test(&self, lane: Lane, test_vector: u32) -> HalResult<SelfTestResult> {
        self.dispatcher(lane).run_self_test(test_vector)
    }

    pub fn set_tracing(&self, lane: Lane, enable: bool) -> HalResult<()> {
        self.dispatcher(lane).set_tracing(enable)
    }

    /// Register a callback invoked on every terminal Result, across all
    /// lanes. Callbacks run synchronously on the worker thread that produced
    /// the result, after that worker's counters are updated.
    pub fn register_callback(&self, callback: impl Fn(&JobResult) + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .expect("callback lock poisoned")
            .push(Box::new(callback));
    }

    // --- Lane-specific hooks ---

    pub fn cpu_set_affinity(&self, mask: u64) -> HalResult<()> {
        self.cpu.set_affinity(mask)
    }

    pub fn cpu_get_cache_stats(&self) -> CacheStats {
        self.cpu.cache_stats()
    }

    pub fn fpga_load_bitstream(&self, bitstream_data: &[u8]) -> HalResult<()> {
        self.fpga.load_bitstream(bitstream_data)
    }

    pub fn fpga_get_utilization(&self) -> Utilization {
        self.fpga.utilization()
    }

    pub fn dsp_set_vector_mode(&self, enabled: bool) -> HalResult<()> {
        self.dsp.set_vector_mode(enabled)
    }

    pub fn dsp_get_memory_bandwidth(&self) -> MemoryBandwidth {
        self.dsp.memory_bandwidth()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::Priority;
    use slog::{Discard, Logger};

    fn test_system() -> System {
        let system = System::new(Logger::root(Discard, o!()));
        system.init(800).unwrap();
        system
    }

    #[test]
    fn happy_path_cpu() {
        let system = test_system();
        let job = Job::new(Priority::Normal, 2_000_000, 1_000_000, "f", *b"ABCDEFGH")
            .with_output_capacity(4);
        let job_id = system.submit_job(Lane::Cpu, job).unwrap();
        let result = system.wait_job(Lane::Cpu, job_id, 2_000_000).unwrap();
        assert_eq!(result.status, crate::job::JobStatus::Completed);
        assert_eq!(result.output.len(), 4);
    }

    #[test]
    fn wcet_violation_is_reported_as_error() {
        let system = test_system();
        let job = Job::new(Priority::Normal, 2_000_000, 1, "f", *b"ABCDEFGH").with_output_capacity(4);
        let job_id = system.submit_job(Lane::Cpu, job).unwrap();
        let result = system.wait_job(Lane::Cpu, job_id, 2_000_000).unwrap();
        assert_eq!(result.status, crate::job::JobStatus::Error);
        assert_eq!(result.error_message, "WCET violation");
    }

    #[test]
    fn redundant_submit_yields_disjoint_ids_and_equal_checksums() {
        let system = test_system();
        system.fpga_load_bitstream(b"bits").unwrap();
        let job = Job::new(Priority::Normal, 2_000_000, 1_000_000, "f", *b"ABCDEFGH")
            .with_output_capacity(4);
        let (accepted, err) = system.submit_redundant_job(job);
        assert!(err.is_none());
        assert_eq!(accepted.len(), 3);

        let mut checksums = Vec::new();
        for (lane, job_id) in &accepted {
            let result = system.wait_job(*lane, *job_id, 2_000_000).unwrap();
            checksums.push(result.checksum);
        }
        assert!(checksums.windows(2).all(|w| w[0] == w[1]));

        let ids: Vec<u32> = accepted.iter().map(|(_, id)| *id).collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn fpga_rejects_submission_before_bitstream_load() {
        let system = test_system();
        let job = Job::new(Priority::Normal, 2_000_000, 1_000_000, "f", vec![1, 2, 3]);
        assert_eq!(system.submit_job(Lane::Fpga, job), Err(HalError::NotSupported));
    }

    #[test]
    fn shutdown_tears_down_in_flight_jobs() {
        let system = test_system();
        let mut ids = Vec::new();
        for _ in 0..4 {
            let job = Job::new(Priority::Normal, 2_000_000, 10_000_000, "f", vec![1, 2, 3]);
            ids.push(system.submit_job(Lane::Cpu, job).unwrap());
        }
        system.shutdown();
        for id in ids {
            assert_eq!(system.poll_job(Lane::Cpu, id), Err(HalError::InvalidParam));
        }
    }

    #[test]
    fn system_stats_aggregate_across_lanes() {
        let system = test_system();
        let job = Job::new(Priority::Normal, 2_000_000, 1_000_000, "f", vec![1, 2, 3]);
        let job_id = system.submit_job(Lane::Cpu, job).unwrap();
        system.wait_job(Lane::Cpu, job_id, 2_000_000).unwrap();
        let stats = system.get_system_stats();
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.online_lanes, 3);
    }
}
