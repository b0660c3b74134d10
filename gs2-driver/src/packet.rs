use crate::calib::{encode_angle_q6, transform_sample};
use crate::constants::{
    ANGLE_VALIDITY_SPLIT, PAYLOAD_LEN_INTENSITY, PAYLOAD_LEN_STANDARD,
};
use crate::error::GsError;
use crate::frame::FrameHeader;
use crate::time::now_nanos;
use gs2_data::{CalibrationTable, RawSample, SAMPLES_PER_MODULE};
use std::sync::Arc;

/// One fully decoded 160-slot module frame.
pub(crate) struct ModulePacket {
    pub module: u8,
    pub frame: u8,
    pub samples: [RawSample; SAMPLES_PER_MODULE],
    pub checksum_ok: bool,
    pub stamp: u64,
    pub scan_frequency: f64,
}

/// 8-bit truncated sum over the frame type, the two length bytes and every
/// payload byte. The module address is not part of the scan-frame checksum.
pub(crate) fn frame_checksum(frame_type: u8, payload_len: u16, payload: &[u8]) -> u8 {
    let [len_low, len_high] = payload_len.to_le_bytes();
    payload.iter().fold(
        frame_type.wrapping_add(len_low).wrapping_add(len_high),
        |sum, &byte| sum.wrapping_add(byte),
    )
}

/// Maps a wire module address (0x01/0x02/0x04, one bit per head) to a
/// module index. Address zero is treated as the first head for
/// single-channel devices.
pub(crate) fn module_index(address: u8) -> Result<u8, GsError> {
    match address {
        0x00 | 0x01 => Ok(0),
        0x02 => Ok(1),
        0x04 => Ok(2),
        other => Err(GsError::InvalidModuleAddress(other)),
    }
}

/// Decodes scan payloads into calibrated raw samples.
///
/// Holds the per-connection calibration table and a wrapping per-module
/// frame counter used to tag reassembly. A checksum mismatch does not drop
/// the frame; the samples are decoded as invalid so downstream state still
/// advances.
pub(crate) struct PacketDecoder {
    calibration: Arc<CalibrationTable>,
    intensity: bool,
    scan_frequency: f64,
    frame_counters: [u8; 3],
}

impl PacketDecoder {
    pub(crate) fn new(calibration: Arc<CalibrationTable>, intensity: bool, scan_frequency: f64) -> Self {
        PacketDecoder {
            calibration,
            intensity,
            scan_frequency,
            frame_counters: [0; 3],
        }
    }

    /// Decodes one frame body (payload plus trailing checksum byte)
    /// belonging to `header`.
    pub(crate) fn decode(
        &mut self,
        header: &FrameHeader,
        body: &[u8],
    ) -> Result<ModulePacket, GsError> {
        let payload_len = header.payload_len as usize;
        if body.len() != payload_len + 1 {
            return Err(GsError::InvalidPayloadLength(body.len()));
        }
        // The slot layout is fixed by the negotiated mode; a frame of the
        // other width would be misindexed, so it is rejected as damage.
        let (slot_size, expected_len) = if self.intensity {
            (3, PAYLOAD_LEN_INTENSITY)
        } else {
            (2, PAYLOAD_LEN_STANDARD)
        };
        if payload_len != expected_len {
            return Err(GsError::InvalidPayloadLength(payload_len));
        }

        let module = module_index(header.address)?;
        let payload = &body[..payload_len];
        let expected = body[payload_len];
        let calculated = frame_checksum(header.frame_type, header.payload_len, payload);
        let checksum_ok = calculated == expected;

        // The counter advances whether or not the checksum held, so the
        // modules of a multi-head device stay on the same sweep after
        // corruption. 0xFF is reserved to tag the corrupted frame itself.
        let counter = &mut self.frame_counters[usize::from(module)];
        *counter = counter.wrapping_add(1);
        if *counter == 0xFF {
            *counter = 0;
        }
        let frame = if checksum_ok { *counter } else { 0xFF };

        let comp = self.calibration.module(module);
        let mut samples = [RawSample::default(); SAMPLES_PER_MODULE];
        for (n, sample) in samples.iter_mut().enumerate() {
            sample.index = n as u8;
            sample.module = module;
            sample.frame = frame;
            sample.sync = n == 0;
            if !checksum_ok {
                continue;
            }

            let slot = &payload[n * slot_size..(n + 1) * slot_size];
            let (quality, raw_distance) = if self.intensity {
                (slot[0], u16::from_le_bytes([slot[1], slot[2]]))
            } else {
                (0, u16::from_le_bytes([slot[0], slot[1]]))
            };

            let (angle_deg, distance) = if raw_distance > 0 {
                transform_sample(raw_distance, n, comp)
            } else {
                (0.0, 0)
            };
            sample.quality = quality;
            sample.distance = distance;
            sample.angle_q6_checkbit = encode_angle_q6(angle_deg);

            // Samples of the first segment must land above the 180-degree
            // split, second-segment samples below it; anything else is a
            // misdecoded slot.
            let first_segment = n < SAMPLES_PER_MODULE / 2;
            let above_split = sample.angle_q6_checkbit > ANGLE_VALIDITY_SPLIT;
            if first_segment == above_split {
                sample.valid = true;
            } else {
                sample.distance = 0;
                sample.valid = false;
            }
        }

        Ok(ModulePacket {
            module,
            frame,
            samples,
            checksum_ok,
            stamp: now_nanos(),
            scan_frequency: self.scan_frequency,
        })
    }
}
