use std::error::Error;
use std::fmt::{Debug, Display};
use std::{fmt, io};

/// Failure modes of the GS2 driver.
///
/// `NotConnected`, `SerialError` and `IoError` cover link failures; `Timeout` is
/// recoverable and the caller may retry; the checksum/frame variants are
/// protocol errors which the acquisition loop absorbs locally but which are
/// fatal inside command sessions; `HardwareAbnormal` reports implausible
/// scan statistics from an otherwise responsive device.
#[derive(Debug)]
pub enum GsError {
    NotConnected,
    NotScanning,
    Timeout,
    ChecksumMismatch(u8, u8),
    UnexpectedFrameType(u8, u8),
    InvalidPayloadLength(usize),
    InvalidModuleAddress(u8),
    EmptyScan,
    HardwareAbnormal(String),
    SerialError(serialport::Error),
    IoError(io::Error),
}

impl fmt::Display for GsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GsError::NotConnected => write!(f, "The device is not connected."),
            GsError::NotScanning => write!(f, "The acquisition thread is not running."),
            GsError::Timeout => write!(f, "Operation timed out"),
            GsError::ChecksumMismatch(expected, calculated) => write!(
                f,
                "Checksum mismatched. Calculated = {:02X}, expected = {:02X}.",
                calculated, expected
            ),
            GsError::UnexpectedFrameType(expected, actual) => write!(
                f,
                "Expected frame type {:02X} but obtained {:02X}.",
                expected, actual
            ),
            GsError::InvalidPayloadLength(len) => {
                write!(f, "Unsupported scan payload length of {} bytes.", len)
            }
            GsError::InvalidModuleAddress(addr) => {
                write!(f, "Module address {:02X} maps to no known module.", addr)
            }
            GsError::EmptyScan => write!(f, "Every sample of the scan reported zero range."),
            GsError::HardwareAbnormal(reason) => {
                write!(f, "The device reports implausible scan data: {}", reason)
            }
            GsError::IoError(err) => Display::fmt(&err, f),
            GsError::SerialError(err) => Display::fmt(&err, f),
        }
    }
}

impl Error for GsError {}

impl From<io::Error> for GsError {
    fn from(err: io::Error) -> Self {
        GsError::IoError(err)
    }
}

impl From<serialport::Error> for GsError {
    fn from(err: serialport::Error) -> Self {
        GsError::SerialError(err)
    }
}
