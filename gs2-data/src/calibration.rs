#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of physical emitter/receiver heads per sensor.
pub const MAX_MODULES: usize = 3;

/// Piecewise compensation coefficients for one module.
///
/// Each module reports two angular segments (slots 0..80 and 80..160) with a
/// slope `k`, an offset `b` and a shared mounting-bias term. The raw wire
/// values are scaled integers; see [`ModuleCompensation::from_scaled`].
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleCompensation {
    pub k0: f64,
    pub b0: f64,
    pub k1: f64,
    pub b1: f64,
    /// Mounting-angle bias in degrees.
    pub bias: f64,
}

impl ModuleCompensation {
    /// Builds coefficients from the scaled integers of a parameter response.
    /// K/B values are divided by 10000, the bias arrives in tenths of a
    /// degree.
    pub fn from_scaled(k0: u16, k1: u16, b0: u16, b1: u16, bias_tenths: u8) -> Self {
        ModuleCompensation {
            k0: f64::from(k0) / 10000.0,
            k1: f64::from(k1) / 10000.0,
            b0: f64::from(b0) / 10000.0,
            b1: f64::from(b1) / 10000.0,
            bias: f64::from(bias_tenths) * 0.1,
        }
    }
}

/// Per-module calibration coefficients, populated once per connection from
/// the device's parameter-query exchange and immutable until reconnect.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationTable {
    pub modules: [ModuleCompensation; MAX_MODULES],
}

impl CalibrationTable {
    /// Identity coefficients (unit slope, no offset, no bias) for every
    /// module. Used when a device does not report parameters.
    pub fn identity() -> Self {
        let unit = ModuleCompensation {
            k0: 1.0,
            b0: 0.0,
            k1: 1.0,
            b1: 0.0,
            bias: 0.0,
        };
        CalibrationTable {
            modules: [unit; MAX_MODULES],
        }
    }

    pub fn module(&self, index: u8) -> &ModuleCompensation {
        &self.modules[usize::from(index) % MAX_MODULES]
    }
}
