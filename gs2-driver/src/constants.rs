/// Sync byte repeated four times at the start of every frame, both
/// directions.
pub(crate) const SYNC_BYTE: u8 = 0xA5;
/// Number of identical sync bytes forming the frame marker.
pub(crate) const SYNC_LEN: usize = 4;
/// Fixed frame header: sync marker, address, type, length (LE).
pub(crate) const HEADER_SIZE: usize = 8;

pub(crate) const CMD_GET_ADDRESS: u8 = 0x60;
pub(crate) const CMD_GET_PARAMETER: u8 = 0x61;
pub(crate) const CMD_START_SCAN: u8 = 0x63;
pub(crate) const CMD_STOP_SCAN: u8 = 0x64;
pub(crate) const CMD_RESET: u8 = 0x67;
pub(crate) const CMD_FORCE_SCAN: u8 = 0x21;
/// Scan data frames answer with the scan command code as their type byte.
pub(crate) const ANS_SCAN: u8 = CMD_START_SCAN;

/// Parameter response payload: K0, B0, K1, B1 (u16 LE each) and a bias byte.
pub(crate) const PARAM_PAYLOAD_SIZE: usize = 9;

/// Payload length without and with per-sample intensity reporting.
pub(crate) const PAYLOAD_LEN_STANDARD: usize = 320;
pub(crate) const PAYLOAD_LEN_INTENSITY: usize = 480;

/// Angle quantization: degrees * 64, shifted past the check bit.
pub(crate) const ANGLE_SHIFT: u16 = 1;
pub(crate) const ANGLE_CHECKBIT: u16 = 1;
/// 360 degrees in q6 units; used to wrap compensated angles.
pub(crate) const ANGLE_Q6_FULL_TURN: f64 = 23040.0;
/// Encoded angle at 180 degrees; the validity split between the two
/// calibration segments of a module frame.
pub(crate) const ANGLE_VALIDITY_SPLIT: u16 = 23041;

/// GS2 optical geometry: distance from the rotation center to the emitter
/// origin (mm), lateral receiver offset (mm) and module mounting angle
/// (degrees).
pub(crate) const ORIGIN_DISTANCE_MM: f64 = 1.22;
pub(crate) const ORIGIN_OFFSET_Y_MM: f64 = 5.315;
pub(crate) const MOUNT_ANGLE_DEG: f64 = 22.5;

/// Consecutive decode timeouts tolerated before reconnecting.
pub(crate) const MAX_TIMEOUT_COUNT: u32 = 2;
/// Round trips attempted per parameter/address query.
pub(crate) const N_QUERY_TRIALS: usize = 2;
/// Default deadline for one decode or command round trip.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 500;
