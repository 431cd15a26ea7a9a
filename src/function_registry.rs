// SPDX-License-Identifier: GPL-3.0-or-later

//! The opaque function selector a [`Job`](crate::job::Job) names
//! (`function_name`) is resolved through a registry injected into each
//! lane at `init`, rather than hard-coded into the worker. Real hardware
//! drivers would implement [`FunctionRegistry`] to dispatch into their
//! substrate's actual instruction set; this crate ships the deterministic
//! simulation described by the spec as the default entry.

use crate::checksum::{self, FUNCTION_SEED};
use crate::error::{HalError, HalResult};
use std::fmt::Debug;
use std::sync::Arc;

/// Resolves a job's `function_name` to executable behavior.
///
/// Implementations must be deterministic: for the same `name` and `input`,
/// every call (on every lane) must return the same bytes. This is what
/// lets the 2oo3 voter compare checksums produced on different substrates.
pub trait FunctionRegistry: Debug + Send + Sync {
    /// Execute `name` against `input`, returning up to `output_capacity`
    /// bytes of output.
    fn execute(&self, name: &str, input: &[u8], output_capacity: usize) -> HalResult<Vec<u8>>;
}

/// Default registry: every function name resolves to the same deterministic
/// hash-fold simulation described by the source HAL, since the real
/// function table (actual CPU/FPGA/DSP instruction dispatch) lives outside
/// this core.
#[derive(Debug, Default)]
pub struct DeterministicRegistry;

impl FunctionRegistry for DeterministicRegistry {
    fn execute(&self, name: &str, input: &[u8], output_capacity: usize) -> HalResult<Vec<u8>> {
        if name.is_empty() {
            return Err(HalError::InvalidParam);
        }
        if output_capacity == 0 {
            return Ok(Vec::new());
        }
        let hash = checksum::polynomial31(FUNCTION_SEED, input);
        let word = hash.to_le_bytes();
        let len = output_capacity.min(word.len());
        Ok(word[..len].to_vec())
    }
}

/// Convenience constructor for the default registry, shared across lanes.
pub fn default_registry() -> Arc<dyn FunctionRegistry> {
    Arc::new(DeterministicRegistry)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_empty_function_name() {
        let reg = DeterministicRegistry;
        assert_eq!(reg.execute("", b"abc", 4), Err(HalError::InvalidParam));
    }

    #[test]
    fn zero_capacity_yields_empty_output() {
        let reg = DeterministicRegistry;
        assert_eq!(reg.execute("f", b"abc", 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn output_truncates_to_capacity() {
        let reg = DeterministicRegistry;
        let full = reg.execute("f", b"ABCDEFGH", 4).unwrap();
        let truncated = reg.execute("f", b"ABCDEFGH", 2).unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(truncated.len(), 2);
        assert_eq!(&full[..2], &truncated[..]);
    }

    #[test]
    fn identical_input_yields_identical_output_across_instances() {
        let a = DeterministicRegistry;
        let b = DeterministicRegistry;
        assert_eq!(
            a.execute("f", b"same", 4).unwrap(),
            b.execute("f", b"same", 4).unwrap()
        );
    }
}
