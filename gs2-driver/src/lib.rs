//! Driver for GS2-class multi-module solid-state lidars.
//!
//! The driver owns a serial transport and one background acquisition
//! thread. Raw frames are synchronized, checksum-validated, calibrated and
//! reassembled into logical scans; the most recent logical scan is handed
//! to the consumer through a single-slot mailbox via [`GsLidar::grab_scan`].

mod assemble;
mod backoff;
mod calib;
mod config;
mod constants;
mod driver_threads;
mod error;
mod frame;
mod health;
mod mailbox;
mod packet;
mod reassembly;
mod serial;
mod session;
mod time;

pub use crate::config::DriverConfig;
pub use crate::error::GsError;
pub use crate::health::{SampleRateCheck, ScanHealthCheck};

use crate::assemble::{ascend_scan, process_scan};
use crate::driver_threads::{AcquisitionThread, DriverShared};
use crate::mailbox::{scan_mailbox, ScanReceiver};
use crate::packet::PacketDecoder;
use crate::reassembly::Reassembler;
use crate::time::sleep_ms;
use gs2_data::{CalibrationTable, ConnectionState, Scan, MAX_MODULES};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Scans consumed by an installed health check before a scan start is
/// declared healthy.
const HEALTH_WARMUP_SCANS: usize = 3;

/// Handle to one GS2-class device.
///
/// Typical lifecycle: [`GsLidar::new`] with a [`DriverConfig`], then
/// `connect`, `start_scan`, repeated `grab_scan`, and `stop_scan` or
/// `disconnect`. Dropping the handle disconnects.
pub struct GsLidar {
    config: DriverConfig,
    shared: Arc<DriverShared>,
    thread: Option<AcquisitionThread>,
    receiver: Option<ScanReceiver>,
    calibration: Arc<CalibrationTable>,
    module_count: u8,
    health: Option<Box<dyn ScanHealthCheck>>,
}

impl GsLidar {
    pub fn new(config: DriverConfig) -> Self {
        let auto_reconnect = config.auto_reconnect;
        GsLidar {
            config,
            shared: Arc::new(DriverShared::new(auto_reconnect)),
            thread: None,
            receiver: None,
            calibration: Arc::new(CalibrationTable::identity()),
            module_count: 1,
            health: None,
        }
    }

    /// Opens the serial transport, clears the DTR line and forces the
    /// device into a known idle state.
    pub fn connect(&mut self) -> Result<(), GsError> {
        if self.shared.state.load().is_connected() {
            return Ok(());
        }
        self.shared.state.store(ConnectionState::Connecting);
        match self.open_transport() {
            Ok(()) => {
                self.shared.state.store(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.shared.state.store(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn open_transport(&mut self) -> Result<(), GsError> {
        let mut port = serial::open_port(&self.config.port_name, self.config.baud_rate)?;
        if !cfg!(test) {
            // Pseudo-terminals used in testing reject control-line changes,
            // and the stop/flush would consume pre-written device responses
            // before the command exchanges run.
            serial::clear_dtr(&mut port)?;
            session::stop_scan(&mut port)?;
            sleep_ms(10);
            session::stop_scan(&mut port)?;
        }
        self.shared
            .auto_reconnect
            .store(self.config.auto_reconnect, Ordering::Relaxed);
        *self.shared.transport.lock().unwrap() = Some(port);
        Ok(())
    }

    /// Queries module addressing and calibration, starts the measurement
    /// stream and spawns the acquisition thread.
    pub fn start_scan(&mut self) -> Result<(), GsError> {
        self.start_scan_with(false)
    }

    /// Like [`GsLidar::start_scan`] but with the force opcode, which makes
    /// the device stream regardless of its motor state.
    pub fn force_start_scan(&mut self) -> Result<(), GsError> {
        self.start_scan_with(true)
    }

    fn start_scan_with(&mut self, force: bool) -> Result<(), GsError> {
        if self.shared.scanning.load(Ordering::Relaxed) {
            return Ok(());
        }
        if self.shared.state.load() != ConnectionState::Connected {
            return Err(GsError::NotConnected);
        }

        {
            let mut guard = self.shared.transport.lock().unwrap();
            let port = guard.as_mut().ok_or(GsError::NotConnected)?;
            let timeout = self.config.timeout;
            if self.config.single_channel {
                self.module_count = 1;
                self.calibration = Arc::new(CalibrationTable::identity());
            } else {
                let count = session::get_device_address(port, timeout)?;
                self.module_count = count.min(MAX_MODULES as u8);
                self.calibration = Arc::new(session::get_device_parameters(
                    port,
                    self.module_count,
                    timeout,
                )?);
            }
            // The device occasionally swallows the first start command.
            session::start_scan(port, force, self.config.single_channel, timeout).or_else(
                |_| session::start_scan(port, force, self.config.single_channel, timeout),
            )?;
        }

        let decoder = PacketDecoder::new(
            self.calibration.clone(),
            self.config.intensity,
            self.config.scan_frequency_hz,
        );
        let reassembler = Reassembler::new(usize::from(self.module_count));
        let (publisher, receiver) = scan_mailbox();
        let health_installed = self.health.is_some();
        let thread = AcquisitionThread::spawn(
            self.shared.clone(),
            decoder,
            reassembler,
            publisher,
            self.health.take(),
            self.config.clone(),
        );
        self.thread = Some(thread);
        self.receiver = Some(receiver);
        self.shared.scanning.store(true, Ordering::Relaxed);
        self.shared.state.store(ConnectionState::Scanning);

        if health_installed {
            for _ in 0..HEALTH_WARMUP_SCANS {
                let warmup = match self.receiver.as_ref() {
                    Some(receiver) => receiver.recv_timeout(self.config.timeout),
                    None => break,
                };
                if warmup.is_err() {
                    break;
                }
                let reason = self.shared.abnormal.lock().unwrap().take();
                if let Some(reason) = reason {
                    let _ = self.stop_scan();
                    return Err(GsError::HardwareAbnormal(reason));
                }
            }
        }
        Ok(())
    }

    /// Stops the acquisition thread, then the device stream. The link
    /// stays open; `start_scan` may be called again.
    pub fn stop_scan(&mut self) -> Result<(), GsError> {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
        self.receiver = None;
        self.shared.scanning.store(false, Ordering::Relaxed);

        let has_transport = {
            let mut guard = self.shared.transport.lock().unwrap();
            match guard.as_mut() {
                Some(port) => {
                    session::stop_scan(port)?;
                    true
                }
                None => false,
            }
        };
        self.shared.state.store(if has_transport {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        });
        Ok(())
    }

    /// Blocks until the acquisition thread publishes the next logical scan,
    /// then post-processes it into the consumer-facing form. Latest-wins: a
    /// scan the consumer never fetched is replaced, not queued.
    pub fn grab_scan(&mut self, timeout: Duration) -> Result<Scan, GsError> {
        if let Some(reason) = self.shared.abnormal.lock().unwrap().take() {
            return Err(GsError::HardwareAbnormal(reason));
        }
        let receiver = self.receiver.as_ref().ok_or(GsError::NotScanning)?;
        let mut raw = receiver.recv_timeout(timeout)?;
        ascend_scan(&mut raw.samples)?;
        Ok(process_scan(&raw, &self.config))
    }

    /// Soft-reboots the device. Any running acquisition is stopped first.
    pub fn reset(&mut self) -> Result<(), GsError> {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
        self.receiver = None;
        self.shared.scanning.store(false, Ordering::Relaxed);
        let mut guard = self.shared.transport.lock().unwrap();
        let port = guard.as_mut().ok_or(GsError::NotConnected)?;
        session::reset(port)
    }

    /// Terminal teardown: disables auto-reconnect, joins the acquisition
    /// thread and closes the transport. Requires `connect` to resume.
    pub fn disconnect(&mut self) {
        self.shared.auto_reconnect.store(false, Ordering::Relaxed);
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
        self.receiver = None;
        self.shared.scanning.store(false, Ordering::Relaxed);
        let mut guard = self.shared.transport.lock().unwrap();
        if let Some(port) = guard.as_mut() {
            let _ = session::stop_scan(port);
        }
        *guard = None;
        drop(guard);
        self.shared.state.store(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.scanning.load(Ordering::Relaxed)
    }

    /// Number of modules detected by the last address query.
    pub fn module_count(&self) -> u8 {
        self.module_count
    }

    /// Scan frames dropped or invalidated for checksum or framing damage
    /// since the last `connect`.
    pub fn corrupted_frame_count(&self) -> usize {
        self.shared.corrupted_frames.load(Ordering::Relaxed)
    }

    /// Calibration coefficients received from the device, identity until
    /// the first successful `start_scan`.
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    // Setters return the previous value. Values that feed the acquisition
    // thread (intensity, single-channel) take effect on the next scan start.

    pub fn set_auto_reconnect(&mut self, enabled: bool) -> bool {
        let previous = self.config.auto_reconnect;
        self.config.auto_reconnect = enabled;
        self.shared.auto_reconnect.store(enabled, Ordering::Relaxed);
        previous
    }

    pub fn set_angle_offset_deg(&mut self, degrees: f64) -> f64 {
        std::mem::replace(&mut self.config.angle_offset_deg, degrees)
    }

    pub fn set_ignore_zones_deg(&mut self, zones: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
        std::mem::replace(&mut self.config.ignore_zones_deg, zones)
    }

    pub fn set_range_limits(&mut self, min_range: f64, max_range: f64) -> (f64, f64) {
        let previous = (self.config.min_range, self.config.max_range);
        self.config.min_range = min_range;
        self.config.max_range = max_range;
        previous
    }

    pub fn set_angle_limits_deg(&mut self, min_angle: f64, max_angle: f64) -> (f64, f64) {
        let previous = (self.config.min_angle_deg, self.config.max_angle_deg);
        self.config.min_angle_deg = min_angle;
        self.config.max_angle_deg = max_angle;
        previous
    }

    pub fn set_fixed_resolution(&mut self, enabled: bool, size: usize) -> (bool, usize) {
        let previous = (self.config.fixed_resolution, self.config.fixed_size);
        self.config.fixed_resolution = enabled;
        self.config.fixed_size = size;
        previous
    }

    pub fn set_reversion(&mut self, reversion: bool) -> bool {
        std::mem::replace(&mut self.config.reversion, reversion)
    }

    pub fn set_inverted(&mut self, inverted: bool) -> bool {
        std::mem::replace(&mut self.config.inverted, inverted)
    }

    pub fn set_intensity(&mut self, intensity: bool) -> bool {
        std::mem::replace(&mut self.config.intensity, intensity)
    }

    /// Installs a health check consumed by the next `start_scan`.
    pub fn set_health_check(&mut self, check: Box<dyn ScanHealthCheck>) {
        self.health = Some(check);
    }
}

impl Drop for GsLidar {
    fn drop(&mut self) {
        self.disconnect();
    }
}
