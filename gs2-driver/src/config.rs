use crate::constants::DEFAULT_TIMEOUT_MS;
use std::time::Duration;

/// Everything the driver needs to know about the device and the desired
/// scan shaping, gathered in one place instead of process-wide state.
///
/// All angles are in degrees; ranges are in meters.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub port_name: String,
    pub baud_rate: u32,
    /// Pad and bucket every scan to exactly `fixed_size` points.
    pub fixed_resolution: bool,
    pub fixed_size: usize,
    /// Mirror the scan around the forward axis.
    pub reversion: bool,
    /// Flip the rotation direction.
    pub inverted: bool,
    pub auto_reconnect: bool,
    /// Device has no command channel; skip queries and acknowledgements.
    pub single_channel: bool,
    /// Expect per-sample intensity bytes in the scan payload.
    pub intensity: bool,
    pub min_angle_deg: f64,
    pub max_angle_deg: f64,
    pub min_range: f64,
    pub max_range: f64,
    /// Rotation applied to every sample before windowing.
    pub angle_offset_deg: f64,
    /// Angular intervals whose samples are zeroed out, `[start, end]` pairs.
    pub ignore_zones_deg: Vec<(f64, f64)>,
    pub scan_frequency_hz: f64,
    pub timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            port_name: String::new(),
            baud_rate: 230_400,
            fixed_resolution: true,
            fixed_size: 160,
            reversion: false,
            inverted: false,
            auto_reconnect: true,
            single_channel: false,
            intensity: false,
            min_angle_deg: -180.0,
            max_angle_deg: 180.0,
            min_range: 0.01,
            max_range: 64.0,
            angle_offset_deg: 0.0,
            ignore_zones_deg: Vec::new(),
            scan_frequency_hz: 10.0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl DriverConfig {
    pub fn new(port_name: &str) -> Self {
        DriverConfig {
            port_name: port_name.to_string(),
            ..DriverConfig::default()
        }
    }
}
