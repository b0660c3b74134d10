pub mod calibration;
pub mod sample;
pub mod scan;
pub mod state;

pub use calibration::{CalibrationTable, ModuleCompensation, MAX_MODULES};
pub use sample::{RawSample, RawScanFrame, SAMPLES_PER_MODULE};
pub use scan::{LaserPoint, Scan, ScanConfig};
pub use state::ConnectionState;
