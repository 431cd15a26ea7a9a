// SPDX-License-Identifier: GPL-3.0-or-later

use hrcls::{HalError, Job, JobStatus, Lane, Priority, System};
use slog::{o, Discard, Logger};

fn test_system() -> System {
    let system = System::new(Logger::root(Discard, o!()));
    system.init(800).expect("init");
    system
}

#[test]
fn admission_back_pressure_on_full_slot_table() {
    let system = test_system();
    let mut ids = Vec::new();
    for _ in 0..32 {
        let job = Job::new(Priority::Normal, 5_000_000, 5_000_000, "f", vec![1, 2, 3]);
        ids.push(system.submit_job(Lane::Cpu, job).expect("slot available"));
    }

    let overflow = Job::new(Priority::Normal, 5_000_000, 5_000_000, "f", vec![1, 2, 3]);
    assert_eq!(system.submit_job(Lane::Cpu, overflow), Err(HalError::Busy));

    let first = ids[0];
    system
        .wait_job(Lane::Cpu, first, 5_000_000)
        .expect("first job completes");

    let retry = Job::new(Priority::Normal, 5_000_000, 5_000_000, "f", vec![1, 2, 3]);
    assert!(system.submit_job(Lane::Cpu, retry).is_ok());

    system.shutdown();
}

#[test]
fn barrier_releases_once_every_online_lane_arrives() {
    use std::sync::Arc;
    use std::thread;

    let system = Arc::new(test_system());
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let sys = system.clone();
            thread::spawn(move || sys.barrier_sync("checkpoint", 2_000_000))
        })
        .collect();

    let third = system.barrier_sync("checkpoint", 2_000_000);
    assert!(third.is_ok());
    for h in handles {
        assert!(h.join().unwrap().is_ok());
    }
}

#[test]
fn cancel_marks_job_cancelled_with_zero_checksum() {
    let system = test_system();
    let job = Job::new(Priority::Normal, 5_000_000, 5_000_000, "f", vec![1, 2, 3]);
    let job_id = system.submit_job(Lane::Cpu, job).expect("submitted");
    system.cancel_job(Lane::Cpu, job_id).expect("cancel accepted");
    let result = system
        .wait_job(Lane::Cpu, job_id, 5_000_000)
        .expect("wait observes cancellation");
    assert_eq!(result.status, JobStatus::Cancelled);
    assert_eq!(result.checksum, 0);
}

#[test]
fn dsp_lane_accepts_jobs_without_precondition() {
    let system = test_system();
    let job = Job::new(Priority::High, 2_000_000, 1_000_000, "f", vec![9, 9, 9]).with_output_capacity(4);
    let job_id = system.submit_job(Lane::Dsp, job).expect("dsp has no gate");
    let result = system.wait_job(Lane::Dsp, job_id, 2_000_000).expect("wait");
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.lane, Lane::Dsp);
}
