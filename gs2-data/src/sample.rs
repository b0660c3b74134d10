#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of sample slots carried by every module frame.
pub const SAMPLES_PER_MODULE: usize = 160;

/// One decoded measurement unit, prior to scan assembly.
///
/// The angle is kept in the sensor's quantized wire representation:
/// `(degrees * 64) << 1 | 1`, with the low bit acting as a slot-alignment
/// sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Module-relative slot index, 0..160.
    pub index: u8,
    /// Compensated distance in raw units (mm). Zero when invalid.
    pub distance: u16,
    /// Quantized angle with the check bit in the low position.
    pub angle_q6_checkbit: u16,
    /// Return strength, when intensity reporting is enabled.
    pub quality: u8,
    /// Module index (0..3) this sample belongs to.
    pub module: u8,
    /// Frame tag of the module frame this sample arrived in.
    pub frame: u8,
    /// Marks the first sample of a new logical scan.
    pub sync: bool,
    /// Cleared when the sample failed checksum or angle validation.
    pub valid: bool,
}

impl RawSample {
    /// Decodes the quantized angle into degrees, dropping the check bit.
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.angle_q6_checkbit >> 1) / 64.0
    }
}

impl Default for RawSample {
    fn default() -> Self {
        RawSample {
            index: 0,
            distance: 0,
            // Check bit only; angle zero.
            angle_q6_checkbit: 1,
            quality: 0,
            module: 0,
            frame: 0,
            sync: false,
            valid: false,
        }
    }
}

/// One complete logical scan's worth of raw samples, as published by the
/// acquisition thread.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawScanFrame {
    /// Samples in acquisition order, 160 per participating module.
    pub samples: Vec<RawSample>,
    /// Acquisition timestamp in nanoseconds.
    pub stamp: u64,
    /// Nominal scan frequency in Hz.
    pub scan_frequency: f64,
    /// Module index of the leading sample.
    pub module: u8,
    /// False when any contributing frame failed its checksum.
    pub checksum_correct: bool,
}
