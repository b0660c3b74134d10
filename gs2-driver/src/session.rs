//! Command round trips executed while the acquisition thread is stopped.

use crate::constants::{
    ANS_SCAN, CMD_FORCE_SCAN, CMD_GET_ADDRESS, CMD_GET_PARAMETER, CMD_RESET, CMD_START_SCAN,
    CMD_STOP_SCAN, N_QUERY_TRIALS, PARAM_PAYLOAD_SIZE, SYNC_BYTE, SYNC_LEN,
};
use crate::error::GsError;
use crate::frame::{FrameHeader, FrameSync};
use crate::packet::frame_checksum;
use crate::serial::{flush, read, send_data};
use crate::time::sleep_ms;
use gs2_data::{CalibrationTable, ModuleCompensation, MAX_MODULES};
use log::debug;
use serialport::SerialPort;
use std::time::{Duration, Instant};

/// Writes one command frame. The trailing checksum covers the command byte,
/// the length bytes and the payload; the address byte is not summed.
pub(crate) fn send_command(
    port: &mut Box<dyn SerialPort>,
    address: u8,
    command: u8,
    payload: &[u8],
) -> Result<(), GsError> {
    let payload_len = payload.len() as u16;
    let mut frame = Vec::with_capacity(SYNC_LEN + 4 + payload.len() + 1);
    frame.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);
    frame.push(address);
    frame.push(command);
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(frame_checksum(command, payload_len, payload));
    send_data(port, &frame)?;
    Ok(())
}

/// Blocks until a complete response header arrives, resynchronizing over any
/// garbage bytes in between.
pub(crate) fn wait_response_header(
    port: &mut Box<dyn SerialPort>,
    timeout: Duration,
) -> Result<FrameHeader, GsError> {
    let deadline = Instant::now() + timeout;
    let mut sync = FrameSync::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(GsError::Timeout);
        }
        let chunk = read(port, sync.pending(), remaining)?;
        if let Some(header) = sync.advance(&chunk) {
            return Ok(header);
        }
    }
}

/// Queries the composite device address. The response header encodes the
/// number of connected modules as `(address << 1) + 1`.
pub(crate) fn get_device_address(
    port: &mut Box<dyn SerialPort>,
    timeout: Duration,
) -> Result<u8, GsError> {
    let mut last = GsError::Timeout;
    for _ in 0..N_QUERY_TRIALS {
        if !cfg!(test) {
            // In testing, skip flushing to keep pre-written device responses
            flush(port)?;
        }
        send_command(port, 0x00, CMD_GET_ADDRESS, &[])?;
        match wait_response_header(port, timeout) {
            Ok(header) if header.frame_type == CMD_GET_ADDRESS => {
                let module_count = (header.address << 1) + 1;
                debug!("device reports {} module(s)", module_count);
                return Ok(module_count);
            }
            Ok(header) => {
                last = GsError::UnexpectedFrameType(CMD_GET_ADDRESS, header.frame_type);
            }
            Err(e) => last = e,
        }
    }
    Err(last)
}

/// Queries the per-module compensation coefficients. One command round trip
/// yields one response frame per module; the response crc covers the address
/// byte in addition to the fields the command checksum covers.
pub(crate) fn get_device_parameters(
    port: &mut Box<dyn SerialPort>,
    module_count: u8,
    timeout: Duration,
) -> Result<CalibrationTable, GsError> {
    if !cfg!(test) {
        flush(port)?;
    }
    send_command(port, 0x00, CMD_GET_PARAMETER, &[])?;

    let mut table = CalibrationTable::identity();
    for _ in 0..module_count.min(MAX_MODULES as u8) {
        let header = wait_response_header(port, timeout)?;
        if header.frame_type != CMD_GET_PARAMETER {
            return Err(GsError::UnexpectedFrameType(
                CMD_GET_PARAMETER,
                header.frame_type,
            ));
        }
        let payload_len = usize::from(header.payload_len);
        if payload_len < PARAM_PAYLOAD_SIZE {
            return Err(GsError::InvalidPayloadLength(payload_len));
        }
        let body = read(port, payload_len + 1, timeout)?;
        let (payload, crc) = body.split_at(payload_len);

        let calculated = frame_checksum(header.frame_type, header.payload_len, payload)
            .wrapping_add(header.address);
        if calculated != crc[0] {
            return Err(GsError::ChecksumMismatch(crc[0], calculated));
        }

        let module = header.address >> 1;
        if usize::from(module) >= MAX_MODULES {
            return Err(GsError::InvalidModuleAddress(header.address));
        }
        let k0 = u16::from_le_bytes([payload[0], payload[1]]);
        let b0 = u16::from_le_bytes([payload[2], payload[3]]);
        let k1 = u16::from_le_bytes([payload[4], payload[5]]);
        let b1 = u16::from_le_bytes([payload[6], payload[7]]);
        let bias = payload[8];
        table.modules[usize::from(module)] =
            ModuleCompensation::from_scaled(k0, k1, b0, b1, bias);
        debug!(
            "module {} compensation: k0={} b0={} k1={} b1={} bias={}",
            module, k0, b0, k1, b1, bias
        );
        sleep_ms(5);
    }
    Ok(table)
}

/// Starts the measurement stream. Single-channel devices never acknowledge,
/// so the acknowledgement wait is skipped for them.
pub(crate) fn start_scan(
    port: &mut Box<dyn SerialPort>,
    force: bool,
    single_channel: bool,
    timeout: Duration,
) -> Result<(), GsError> {
    let command = if force { CMD_FORCE_SCAN } else { CMD_START_SCAN };
    send_command(port, 0x00, command, &[])?;
    if single_channel {
        return Ok(());
    }
    let header = wait_response_header(port, timeout)?;
    if header.frame_type != ANS_SCAN {
        return Err(GsError::UnexpectedFrameType(ANS_SCAN, header.frame_type));
    }
    Ok(())
}

pub(crate) fn stop_scan(port: &mut Box<dyn SerialPort>) -> Result<(), GsError> {
    send_command(port, 0x00, CMD_STOP_SCAN, &[])?;
    sleep_ms(10);
    flush(port)?;
    Ok(())
}

/// Soft-reboots the device. The sensor drops the link while restarting, so
/// no acknowledgement is read.
pub(crate) fn reset(port: &mut Box<dyn SerialPort>) -> Result<(), GsError> {
    send_command(port, 0x00, CMD_RESET, &[])?;
    Ok(())
}
