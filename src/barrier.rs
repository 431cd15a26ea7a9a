// SPDX-License-Identifier: GPL-3.0-or-later

//! Named cross-lane rendezvous. Each `group_id` identifies an independent
//! barrier instance; a participant calls [`BarrierRegistry::sync`] with the
//! number of parties it expects (one per online lane) and blocks until that
//! many have arrived, or its own deadline expires. A participant that times
//! out poisons the group for everyone still waiting on it, until the last
//! party leaves or a fresh `group_id` is used.

use crate::error::{HalError, HalResult};
use crate::time::Deadline;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

struct Group {
    expected: usize,
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

impl Group {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: 0,
            generation: 0,
            poisoned: false,
        }
    }
}

/// Registry of in-progress named barriers, keyed by `group_id`.
#[derive(Default)]
pub struct BarrierRegistry {
    groups: Mutex<HashMap<String, Group>>,
    condvar: Condvar,
}

impl BarrierRegistry {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
        }
    }

    /// Arrive at the named barrier, expecting `expected` total participants.
    /// Blocks until either `expected` arrivals are observed (release, with
    /// happens-before from every arrival to every release) or `timeout_us`
    /// elapses, in which case the group is poisoned and `Timeout` is
    /// returned to every party still waiting on this generation.
    pub fn sync(self: &Arc<Self>, group_id: &str, expected: usize, timeout_us: u32) -> HalResult<()> {
        if expected == 0 {
            return Err(HalError::InvalidParam);
        }
        let deadline = Deadline::after_us(timeout_us);
        let mut groups = self.groups.lock().expect("barrier lock poisoned");

        let entry = groups
            .entry(group_id.to_string())
            .or_insert_with(|| Group::new(expected));
        if entry.poisoned {
            entry.poisoned = false;
            entry.arrived = 0;
            entry.generation += 1;
        }
        entry.expected = expected;
        let my_generation = entry.generation;
        entry.arrived += 1;

        if entry.arrived >= entry.expected {
            self.condvar.notify_all();
            return Ok(());
        }

        loop {
            let remaining = match deadline.remaining() {
                Some(d) => d,
                None => {
                    if let Some(g) = groups.get_mut(group_id) {
                        if g.generation == my_generation {
                            g.poisoned = true;
                            self.condvar.notify_all();
                        }
                    }
                    return Err(HalError::Timeout);
                }
            };

            let (guard, timed_out) = self
                .condvar
                .wait_timeout(groups, remaining)
                .expect("barrier lock poisoned");
            groups = guard;

            let g = match groups.get(group_id) {
                Some(g) => g,
                None => return Err(HalError::InvalidParam),
            };
            if g.generation != my_generation {
                // group was reset by a timeout from another party; we
                // already arrived under a superseded generation.
                return Err(HalError::Timeout);
            }
            if g.poisoned {
                return Err(HalError::Timeout);
            }
            if g.arrived >= g.expected {
                return Ok(());
            }
            if timed_out.timed_out() && deadline.has_expired() {
                if let Some(g) = groups.get_mut(group_id) {
                    g.poisoned = true;
                }
                self.condvar.notify_all();
                return Err(HalError::Timeout);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn two_parties_release_together() {
        let registry = Arc::new(BarrierRegistry::new());
        let r1 = registry.clone();
        let h = thread::spawn(move || r1.sync("g", 2, 2_000_000));
        let result = registry.sync("g", 2, 2_000_000);
        assert!(result.is_ok());
        assert!(h.join().unwrap().is_ok());
    }

    #[test]
    fn lone_party_times_out() {
        let registry = Arc::new(BarrierRegistry::new());
        let result = registry.sync("solo", 2, 1_000);
        assert_eq!(result, Err(HalError::Timeout));
    }

    #[test]
    fn zero_expected_is_invalid() {
        let registry = Arc::new(BarrierRegistry::new());
        assert_eq!(registry.sync("g", 0, 1_000), Err(HalError::InvalidParam));
    }

    #[test]
    fn fresh_group_id_after_poisoning_is_unaffected() {
        let registry = Arc::new(BarrierRegistry::new());
        let _ = registry.sync("poisoned", 2, 1_000);
        let r1 = registry.clone();
        let h = thread::spawn(move || r1.sync("fresh", 2, 2_000_000));
        let result = registry.sync("fresh", 2, 2_000_000);
        assert!(result.is_ok());
        assert!(h.join().unwrap().is_ok());
    }
}
