//! Background acquisition: frame reading, reassembly and reconnect logic.

use crate::backoff::{RECONNECT_POLICY, REOPEN_POLICY};
use crate::config::DriverConfig;
use crate::constants::MAX_TIMEOUT_COUNT;
use crate::error::GsError;
use crate::frame::{FrameHeader, FrameSync};
use crate::health::ScanHealthCheck;
use crate::mailbox::ScanPublisher;
use crate::packet::{ModulePacket, PacketDecoder};
use crate::reassembly::Reassembler;
use crate::serial;
use crate::session;
use crate::time::sleep_ms;
use crossbeam_channel::{bounded, Receiver, Sender};
use crossbeam_utils::atomic::AtomicCell;
use gs2_data::ConnectionState;
use log::{debug, info, warn};
use serialport::SerialPort;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// State shared between the driver handle and the acquisition thread.
///
/// The transport mutex is held only for short, bounded sections; command
/// sessions take it exclusively after the thread has been joined.
pub(crate) struct DriverShared {
    pub(crate) transport: Mutex<Option<Box<dyn SerialPort>>>,
    pub(crate) scanning: AtomicBool,
    pub(crate) auto_reconnect: AtomicBool,
    pub(crate) state: AtomicCell<ConnectionState>,
    pub(crate) corrupted_frames: AtomicUsize,
    pub(crate) abnormal: Mutex<Option<String>>,
}

impl DriverShared {
    pub(crate) fn new(auto_reconnect: bool) -> Self {
        DriverShared {
            transport: Mutex::new(None),
            scanning: AtomicBool::new(false),
            auto_reconnect: AtomicBool::new(auto_reconnect),
            state: AtomicCell::new(ConnectionState::Disconnected),
            corrupted_frames: AtomicUsize::new(0),
            abnormal: Mutex::new(None),
        }
    }
}

/// Handle to the acquisition thread. Dropping it terminates and joins the
/// thread.
pub(crate) struct AcquisitionThread {
    terminator_tx: Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl AcquisitionThread {
    pub(crate) fn spawn(
        shared: Arc<DriverShared>,
        decoder: PacketDecoder,
        reassembler: Reassembler,
        publisher: ScanPublisher,
        health: Option<Box<dyn ScanHealthCheck>>,
        config: DriverConfig,
    ) -> Self {
        let (terminator_tx, terminator_rx) = bounded(10);
        let handle = std::thread::spawn(move || {
            acquisition_loop(
                shared,
                decoder,
                reassembler,
                publisher,
                health,
                config,
                terminator_rx,
            );
        });
        AcquisitionThread {
            terminator_tx,
            handle: Some(handle),
        }
    }

    pub(crate) fn stop(&mut self) {
        let _ = self.terminator_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AcquisitionThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

/// Reads exactly `n` bytes, locking the transport per poll so command
/// sessions can interleave after the thread is stopped. Returns `None` on
/// termination.
fn read_exact_shared(
    shared: &DriverShared,
    n: usize,
    deadline: Instant,
    terminator_rx: &Receiver<bool>,
) -> Result<Option<Vec<u8>>, GsError> {
    loop {
        if do_terminate(terminator_rx) {
            return Ok(None);
        }
        {
            let mut guard = shared.transport.lock().unwrap();
            let port = guard.as_mut().ok_or(GsError::NotConnected)?;
            if serial::get_n_read(port)? >= n {
                let data = serial::read(port, n, Duration::from_millis(10))?;
                return Ok(Some(data));
            }
        }
        if Instant::now() >= deadline {
            return Err(GsError::Timeout);
        }
        sleep_ms(2);
    }
}

/// Synchronizes on the next scan frame and decodes it. `Ok(None)` means the
/// thread was asked to terminate mid-read.
fn read_next_packet(
    shared: &DriverShared,
    decoder: &mut PacketDecoder,
    timeout: Duration,
    terminator_rx: &Receiver<bool>,
) -> Result<Option<ModulePacket>, GsError> {
    let deadline = Instant::now() + timeout;
    let mut sync = FrameSync::expecting(crate::constants::ANS_SCAN);
    let header: FrameHeader = loop {
        let chunk = match read_exact_shared(shared, sync.pending(), deadline, terminator_rx)? {
            Some(chunk) => chunk,
            None => return Ok(None),
        };
        if let Some(header) = sync.advance(&chunk) {
            break header;
        }
    };
    let body_len = usize::from(header.payload_len) + 1;
    let body = match read_exact_shared(shared, body_len, deadline, terminator_rx)? {
        Some(body) => body,
        None => return Ok(None),
    };
    decoder.decode(&header, &body).map(Some)
}

/// Closes the transport and keeps trying to reopen the port and restart the
/// scan until it succeeds or the thread is asked to terminate.
fn try_reconnect(
    shared: &DriverShared,
    config: &DriverConfig,
    terminator_rx: &Receiver<bool>,
) -> bool {
    if !shared.auto_reconnect.load(Ordering::Relaxed) {
        return false;
    }
    shared.state.store(ConnectionState::Reconnecting);
    warn!("lost contact with {}, reconnecting", config.port_name);
    *shared.transport.lock().unwrap() = None;

    let mut attempt: u32 = 0;
    loop {
        if do_terminate(terminator_rx) {
            return false;
        }
        attempt += 1;
        sleep_ms(REOPEN_POLICY.delay_ms(attempt));

        let mut port = match serial::open_port(&config.port_name, config.baud_rate) {
            Ok(port) => port,
            Err(e) => {
                debug!("reopen attempt {} failed: {}", attempt, e);
                continue;
            }
        };
        let _ = serial::clear_dtr(&mut port);
        let _ = serial::flush(&mut port);
        // The sensor occasionally swallows the first start command right
        // after a reopen, so it is issued twice.
        let started =
            session::start_scan(&mut port, false, config.single_channel, config.timeout).or_else(
                |_| session::start_scan(&mut port, false, config.single_channel, config.timeout),
            );
        match started {
            Ok(()) => {
                *shared.transport.lock().unwrap() = Some(port);
                shared.state.store(ConnectionState::Scanning);
                info!("reconnected to {}", config.port_name);
                return true;
            }
            Err(e) => warn!("scan restart on {} failed: {}", config.port_name, e),
        }
    }
}

pub(crate) fn acquisition_loop(
    shared: Arc<DriverShared>,
    mut decoder: PacketDecoder,
    mut reassembler: Reassembler,
    publisher: ScanPublisher,
    mut health: Option<Box<dyn ScanHealthCheck>>,
    config: DriverConfig,
    terminator_rx: Receiver<bool>,
) {
    let mut timeouts: u32 = 0;
    let mut reconnect_rounds: u32 = 0;

    if !cfg!(test) {
        // Bytes buffered before the stream started would force an initial
        // resynchronization.
        if let Some(port) = shared.transport.lock().unwrap().as_mut() {
            let _ = serial::flush(port);
        }
    }

    loop {
        if do_terminate(&terminator_rx) {
            return;
        }

        match read_next_packet(&shared, &mut decoder, config.timeout, &terminator_rx) {
            Ok(Some(packet)) => {
                timeouts = 0;
                reconnect_rounds = 0;
                if !packet.checksum_ok {
                    shared.corrupted_frames.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(scan) = reassembler.insert(packet) {
                    if let Some(check) = health.as_mut() {
                        if let Err(reason) = check.inspect(&scan) {
                            warn!("scan health check failed: {}", reason);
                            *shared.abnormal.lock().unwrap() = Some(reason);
                        }
                    }
                    publisher.publish(scan);
                }
            }
            Ok(None) => return,
            Err(GsError::Timeout) => {
                timeouts += 1;
                if timeouts > MAX_TIMEOUT_COUNT {
                    timeouts = 0;
                    reconnect_rounds += 1;
                    sleep_ms(RECONNECT_POLICY.delay_ms(reconnect_rounds));
                    if !try_reconnect(&shared, &config, &terminator_rx) {
                        break;
                    }
                }
            }
            Err(e @ (GsError::ChecksumMismatch(_, _) | GsError::InvalidPayloadLength(_)))
            | Err(e @ GsError::InvalidModuleAddress(_)) => {
                // Protocol damage is absorbed locally; the reader will
                // resynchronize on the next frame marker.
                debug!("discarding damaged frame: {}", e);
                shared.corrupted_frames.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("acquisition read failed: {}", e);
                reconnect_rounds += 1;
                sleep_ms(RECONNECT_POLICY.delay_ms(reconnect_rounds));
                if !try_reconnect(&shared, &config, &terminator_rx) {
                    break;
                }
            }
        }
    }

    shared.scanning.store(false, Ordering::Relaxed);
    shared.state.store(ConnectionState::Disconnected);
}
