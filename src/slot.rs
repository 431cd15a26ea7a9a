// SPDX-License-Identifier: GPL-3.0-or-later

//! The bounded slot table: a fixed-capacity array of tagged variants
//! (`Free` / `Occupied`), admission and lookup by linear scan. Capacity is
//! small (16-32) so O(capacity) admission is not a real cost, and a fixed
//! table gives bounded memory and an explicit back-pressure signal
//! (`Busy`) instead of burying unbounded latency behind a growable queue.

use crate::job::{Job, JobResult};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Everything a slot needs to track one in-flight job: the admitted job
/// itself, a handle to its worker thread, a cooperative cancellation
/// token, and the shared cell the worker writes its result into.
pub(crate) struct SlotEntry {
    pub job: Job,
    pub result: Arc<Mutex<JobResult>>,
    pub cancel: Arc<AtomicBool>,
    pub handle: Option<JoinHandle<()>>,
}

pub(crate) enum SlotState {
    Free,
    Occupied(SlotEntry),
}

/// A fixed-capacity table of slots, indexed by position, looked up by
/// job id via linear scan.
pub(crate) struct SlotTable {
    slots: Vec<SlotState>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| SlotState::Free).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the first free slot, if any.
    pub fn find_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, SlotState::Free))
    }

    /// Occupy a previously-free slot. Panics if the slot was already
    /// occupied, since that would indicate a caller bug (every caller must
    /// have just observed it free under the same lock).
    pub fn occupy(&mut self, index: usize, entry: SlotEntry) {
        match &self.slots[index] {
            SlotState::Free => self.slots[index] = SlotState::Occupied(entry),
            SlotState::Occupied(_) => panic!("slot {index} already occupied"),
        }
    }

    /// Index of the active slot holding `job_id`, if any. A slot is only
    /// reachable by job-id lookup while it is active (invariant 1).
    pub fn find_by_job_id(&self, job_id: u32) -> Option<usize> {
        self.slots.iter().position(|s| match s {
            SlotState::Occupied(entry) => entry.job.job_id() == job_id,
            SlotState::Free => false,
        })
    }

    pub fn get(&self, index: usize) -> Option<&SlotEntry> {
        match &self.slots[index] {
            SlotState::Occupied(entry) => Some(entry),
            SlotState::Free => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SlotEntry> {
        match &mut self.slots[index] {
            SlotState::Occupied(entry) => Some(entry),
            SlotState::Free => None,
        }
    }

    /// Free a slot, handing back its entry so the caller can join the
    /// worker thread outside the lock.
    pub fn release(&mut self, index: usize) -> Option<SlotEntry> {
        match std::mem::replace(&mut self.slots[index], SlotState::Free) {
            SlotState::Occupied(entry) => Some(entry),
            SlotState::Free => None,
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Occupied(_)))
            .count()
    }

    /// All occupied slot indices, for shutdown's cancel-everything pass.
    pub fn active_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| matches!(s, SlotState::Occupied(_)).then_some(i))
            .collect()
    }

    /// Release every occupied slot, handing back its entries so the caller
    /// can signal cancellation and join workers outside the lock.
    pub fn drain_all(&mut self) -> Vec<SlotEntry> {
        self.active_indices()
            .into_iter()
            .filter_map(|i| self.release(i))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::{JobResult, Lane, Priority};
    use std::sync::atomic::AtomicBool;

    fn dummy_entry(job_id: u32) -> SlotEntry {
        let mut job = Job::new(Priority::Normal, 1_000, 1_000, "f", vec![]);
        job.job_id = job_id;
        SlotEntry {
            result: Arc::new(Mutex::new(JobResult::pending(job_id, Lane::Cpu))),
            job,
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    #[test]
    fn starts_all_free() {
        let t = SlotTable::new(4);
        assert_eq!(t.capacity(), 4);
        assert_eq!(t.active_count(), 0);
        assert_eq!(t.find_free(), Some(0));
    }

    #[test]
    fn occupy_then_lookup_by_job_id() {
        let mut t = SlotTable::new(2);
        let idx = t.find_free().unwrap();
        t.occupy(idx, dummy_entry(42));
        assert_eq!(t.find_by_job_id(42), Some(idx));
        assert_eq!(t.find_by_job_id(99), None);
        assert_eq!(t.active_count(), 1);
    }

    #[test]
    fn full_table_has_no_free_slot() {
        let mut t = SlotTable::new(2);
        t.occupy(0, dummy_entry(1));
        t.occupy(1, dummy_entry(2));
        assert_eq!(t.find_free(), None);
    }

    #[test]
    fn release_frees_and_unlinks() {
        let mut t = SlotTable::new(1);
        t.occupy(0, dummy_entry(7));
        assert!(t.release(0).is_some());
        assert_eq!(t.find_by_job_id(7), None);
        assert_eq!(t.find_free(), Some(0));
        assert!(t.release(0).is_none());
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn occupy_twice_panics() {
        let mut t = SlotTable::new(1);
        t.occupy(0, dummy_entry(1));
        t.occupy(0, dummy_entry(2));
    }
}
