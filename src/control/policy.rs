// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Actuator derivation policy
//!
//! Pure mapping from a sensor reading plus the current control state to the
//! fan and buzzer output levels. No I/O and no side effects, which is what
//! the test suite exercises directly.

use crate::control::ControlState;

/// One fresh temperature/humidity sample. No history is retained in-core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

/// Derived actuator levels, recomputed every cycle and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorDecision {
    pub fan_on: bool,
    pub buzzer_on: bool,
}

/// Derive the actuator levels for one cycle.
///
/// A manual override forces its channel; in auto mode the channel is on iff
/// the temperature is strictly above the threshold (equality resolves to
/// off).
pub fn decide(reading: &SensorReading, state: &ControlState) -> ActuatorDecision {
    let auto_on = reading.temperature > state.threshold;
    ActuatorDecision {
        fan_on: state.manual_fan.level().unwrap_or(auto_on),
        buzzer_on: state.manual_buzzer.level().unwrap_or(auto_on),
    }
}
