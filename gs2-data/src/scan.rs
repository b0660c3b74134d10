#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One measured return in the sensor's shared polar frame.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserPoint {
    /// Angle in radians, wrapped to (-pi, pi].
    pub angle: f64,
    /// Range in meters. Zero means "no return".
    pub range: f64,
    /// Return strength of the laser pulse.
    pub intensity: f64,
}

/// Scan-level metadata attached to every processed scan.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanConfig {
    /// Smallest angle of the scan window, in radians.
    pub min_angle: f64,
    /// Largest angle of the scan window, in radians.
    pub max_angle: f64,
    /// Angular distance between consecutive output points, in radians.
    pub angle_increment: f64,
    /// Time between consecutive samples, in seconds.
    pub time_increment: f64,
    /// Duration of the whole scan, in seconds.
    pub scan_time: f64,
    /// Smallest valid range, in meters.
    pub min_range: f64,
    /// Largest valid range, in meters.
    pub max_range: f64,
}

/// One processed lap of lidar data, as handed to the consumer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    /// Ordered output points.
    pub points: Vec<LaserPoint>,
    /// Metadata describing the scan window and timing.
    pub config: ScanConfig,
    /// Acquisition timestamp of the first sample, in nanoseconds.
    pub stamp: u64,
    /// Module index (0..3) the leading sample was measured by.
    pub module: u8,
    /// Checksum validation result of the underlying frames.
    pub checksum_correct: bool,
}
