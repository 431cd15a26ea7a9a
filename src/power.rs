// SPDX-License-Identifier: GPL-3.0-or-later

//! Lane power state, the `set_power_state` / `set_clock_frequency` hooks of
//! the external interface. Modeled as simulated state rather than real
//! voltage-controller I2C traffic, per spec Non-goals (no real hardware
//! drivers).

/// A lane's commanded power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    Standby,
    Active,
    Turbo,
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Active
    }
}
