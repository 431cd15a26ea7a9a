// SPDX-License-Identifier: GPL-3.0-or-later

//! The per-job worker: a single OS thread spawned alongside the submitting
//! caller, which times its own execution, runs the job's function through
//! the lane's [`FunctionRegistry`], WCET-classifies the outcome, and writes
//! the final [`JobResult`]. It never releases its slot — that happens when
//! a consumer calls `wait`, keeping the result reachable to pollers until
//! explicitly reaped.

use crate::checksum::{self, CHECKSUM_SEED};
use crate::function_registry::FunctionRegistry;
use crate::job::{Job, JobStatus, Lane};
use crate::lane::{LaneInner, ResultCallback};
use crate::time::now_monotonic_us;
use crate::wcet::{self, ExecOutcome};
use slog::{o, trace, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Spawn the worker thread for `job`, already admitted into a slot on
/// `lane`. `sim_ratio` is `(numerator, denominator)` of `wcet_us` the
/// simulated function body sleeps for, modelling the substrate's relative
/// performance.
#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn(
    lane: Lane,
    job: Job,
    registry: Arc<dyn FunctionRegistry>,
    cancel: Arc<AtomicBool>,
    result: Arc<Mutex<crate::job::JobResult>>,
    lane_inner: Arc<Mutex<LaneInner>>,
    sim_ratio: (u32, u32),
    callbacks: Arc<Mutex<Vec<ResultCallback>>>,
    logger: Logger,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("hrcls-{lane}-{}", job.job_id()))
        .spawn(move || {
            let log = logger.new(o!("job_id" => job.job_id(), "lane" => lane.to_string()));
            run(
                lane, job, registry, cancel, result, lane_inner, sim_ratio, callbacks, &log,
            );
        })
}

fn run(
    lane: Lane,
    job: Job,
    registry: Arc<dyn FunctionRegistry>,
    cancel: Arc<AtomicBool>,
    result: Arc<Mutex<crate::job::JobResult>>,
    lane_inner: Arc<Mutex<LaneInner>>,
    sim_ratio: (u32, u32),
    callbacks: Arc<Mutex<Vec<ResultCallback>>>,
    log: &Logger,
) {
    let start_us = now_monotonic_us();
    {
        let mut r = result.lock().expect("result lock poisoned");
        r.status = JobStatus::Running;
    }
    trace!(log, "worker started");

    if cancel.load(Ordering::Acquire) {
        finish_cancelled(&result, start_us);
        record_failure(&lane_inner, 0);
        notify(&callbacks, &result);
        return;
    }

    let (num, den) = sim_ratio;
    let sleep_us = (job.wcet_us as u64 * num as u64) / den.max(1) as u64;
    sleep_in_slices(sleep_us, &cancel);

    if cancel.load(Ordering::Acquire) {
        finish_cancelled(&result, start_us);
        record_failure(&lane_inner, 0);
        notify(&callbacks, &result);
        return;
    }

    let exec_outcome = if job.function_name.is_empty() {
        ExecOutcome::Failed(crate::error::HalError::InvalidParam.code())
    } else {
        match registry.execute(&job.function_name, &job.input, job.output_capacity) {
            Ok(output) => {
                let checksum = checksum::polynomial31(CHECKSUM_SEED, &output);
                let mut r = result.lock().expect("result lock poisoned");
                r.output = output;
                r.checksum = checksum;
                drop(r);
                ExecOutcome::Success
            }
            Err(e) => ExecOutcome::Failed(e.code()),
        }
    };

    let execution_time_us = (now_monotonic_us() - start_us) as u32;
    let classification = wcet::classify(execution_time_us, job.wcet_us, exec_outcome);

    {
        let mut r = result.lock().expect("result lock poisoned");
        r.execution_time_us = execution_time_us;
        r.status = classification.status;
        r.error_code = classification.error_code;
        r.error_message = classification.error_message;
    }

    record_completion(
        &lane_inner,
        execution_time_us,
        classification.status == JobStatus::Completed,
    );
    notify(&callbacks, &result);
    trace!(log, "worker finished"; "execution_time_us" => execution_time_us);
}

/// Sleep in small slices so a cancellation request is observed promptly
/// instead of only at well-separated checkpoints.
fn sleep_in_slices(total_us: u64, cancel: &AtomicBool) {
    const SLICE: Duration = Duration::from_micros(500);
    let mut remaining = Duration::from_micros(total_us);
    while remaining > Duration::ZERO {
        if cancel.load(Ordering::Acquire) {
            return;
        }
        let step = remaining.min(SLICE);
        thread::sleep(step);
        remaining -= step;
    }
}

fn finish_cancelled(result: &Mutex<crate::job::JobResult>, start_us: u64) {
    let mut r = result.lock().expect("result lock poisoned");
    r.status = JobStatus::Cancelled;
    r.output.clear();
    r.checksum = 0;
    r.execution_time_us = (now_monotonic_us() - start_us) as u32;
    r.error_code = crate::error::SUCCESS_CODE;
    r.error_message = "";
}

fn record_completion(lane_inner: &Mutex<LaneInner>, execution_time_us: u32, completed: bool) {
    let mut inner = lane_inner.lock().expect("lane lock poisoned");
    inner.stats.total_execution_time_us += execution_time_us as u64;
    if completed {
        inner.stats.jobs_completed += 1;
    } else {
        inner.stats.jobs_failed += 1;
    }
}

/// A cancelled job still counts as "failed" for the submitted/completed/
/// failed accounting (invariant 3), but carries no execution time.
fn record_failure(lane_inner: &Mutex<LaneInner>, execution_time_us: u32) {
    record_completion(lane_inner, execution_time_us, false);
}

fn notify(callbacks: &Mutex<Vec<ResultCallback>>, result: &Mutex<crate::job::JobResult>) {
    let snapshot = result.lock().expect("result lock poisoned").clone();
    for cb in callbacks.lock().expect("callback lock poisoned").iter() {
        cb(&snapshot);
    }
}
