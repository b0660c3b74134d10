use gs2_data::RawScanFrame;

/// Plausibility check run against every assembled scan before it is handed
/// to the consumer. A failing check surfaces as
/// [`GsError::HardwareAbnormal`](crate::GsError::HardwareAbnormal).
///
/// No check is installed by default.
pub trait ScanHealthCheck: Send {
    /// Returns `Err(reason)` when the scan looks implausible.
    fn inspect(&mut self, scan: &RawScanFrame) -> Result<(), String>;
}

/// Flags scans in which too few samples carry a non-zero range, which on
/// this sensor indicates a blocked or failing optical path rather than an
/// empty room.
pub struct SampleRateCheck {
    /// Minimum fraction of non-zero samples, 0.0 to 1.0.
    pub min_valid_fraction: f64,
    /// Consecutive failing scans tolerated before reporting.
    pub max_strikes: u32,
    strikes: u32,
}

impl SampleRateCheck {
    pub fn new(min_valid_fraction: f64, max_strikes: u32) -> Self {
        SampleRateCheck {
            min_valid_fraction,
            max_strikes,
            strikes: 0,
        }
    }
}

impl ScanHealthCheck for SampleRateCheck {
    fn inspect(&mut self, scan: &RawScanFrame) -> Result<(), String> {
        if scan.samples.is_empty() {
            return Ok(());
        }
        let non_zero = scan.samples.iter().filter(|s| s.distance > 0).count();
        let fraction = non_zero as f64 / scan.samples.len() as f64;
        if fraction >= self.min_valid_fraction {
            self.strikes = 0;
            return Ok(());
        }
        self.strikes += 1;
        if self.strikes > self.max_strikes {
            return Err(format!(
                "only {:.0}% of samples report a range over {} consecutive scans",
                fraction * 100.0,
                self.strikes
            ));
        }
        Ok(())
    }
}
