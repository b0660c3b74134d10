//! Post-processing of a raw logical scan into the consumer-facing point
//! list: angle shaping, filtering, fixed-resolution resampling and the
//! circular reordering pass.

use crate::config::DriverConfig;
use crate::constants::{ANGLE_CHECKBIT, ANGLE_SHIFT};
use crate::error::GsError;
use gs2_data::{LaserPoint, RawSample, RawScanFrame, Scan, ScanConfig};
use std::f64::consts::PI;

fn degree_to_radian(e: f64) -> f64 {
    e * PI / 180.0
}

/// Wraps an angle to (-pi, pi].
fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

fn in_ignore_zone(angle: f64, zones: &[(f64, f64)]) -> bool {
    zones
        .iter()
        .any(|&(start, end)| degree_to_radian(start) <= angle && angle <= degree_to_radian(end))
}

fn decoded_angle(sample: &RawSample) -> f64 {
    sample.angle_degrees()
}

fn overwrite_angle(sample: &mut RawSample, degrees: f64) {
    let checkbit = sample.angle_q6_checkbit & ANGLE_CHECKBIT;
    sample.angle_q6_checkbit = (((degrees * 64.0) as u16) << ANGLE_SHIFT) | checkbit;
}

/// Rewrites missing-sample angles and rotates the buffer so it starts at the
/// angular zero crossing. Returns the rotation that was applied.
///
/// Leading gaps are back-filled from the first valid sample at the nominal
/// per-sample step, clamped at 0 degrees; trailing gaps are forward-filled
/// symmetrically, wrapping past 360. Remaining interior gaps take
/// `front + i * step`. The zero crossing is the first index whose angle drops
/// by more than 180 degrees from its predecessor.
pub(crate) fn ascend_scan(samples: &mut [RawSample]) -> Result<usize, GsError> {
    let count = samples.len();
    let first_valid = samples
        .iter()
        .position(|s| s.distance != 0)
        .ok_or(GsError::EmptyScan)?;
    let increment = 360.0 / count as f64;

    for i in (0..first_valid).rev() {
        let mut expect = decoded_angle(&samples[i + 1]) - increment;
        if expect < 0.0 {
            expect = 0.0;
        }
        overwrite_angle(&mut samples[i], expect);
    }

    let last_valid = samples
        .iter()
        .rposition(|s| s.distance != 0)
        .unwrap_or(count - 1);
    for i in last_valid + 1..count {
        let mut expect = decoded_angle(&samples[i - 1]) + increment;
        if expect > 360.0 {
            expect -= 360.0;
        }
        overwrite_angle(&mut samples[i], expect);
    }

    let front_angle = decoded_angle(&samples[0]);
    for i in 1..count {
        if samples[i].distance == 0 {
            let mut expect = front_angle + i as f64 * increment;
            if expect > 360.0 {
                expect -= 360.0;
            }
            overwrite_angle(&mut samples[i], expect);
        }
    }

    let mut zero_pos = 0;
    let mut pre_degree = decoded_angle(&samples[0]);
    for (i, sample) in samples.iter().enumerate().skip(1) {
        let degree = decoded_angle(sample);
        if pre_degree - degree > 180.0 {
            zero_pos = i;
            break;
        }
        pre_degree = degree;
    }
    samples.rotate_left(zero_pos);
    Ok(zero_pos)
}

/// Turns one reassembled raw scan into the consumer-facing `Scan`,
/// applying the configured shaping steps in order: angle offset, reversion
/// and inversion, wrap to (-pi, pi], ignore zones, range validity, angle
/// window and, when requested, fixed-resolution bucketing with zero-padded
/// output.
pub(crate) fn process_scan(raw: &RawScanFrame, config: &DriverConfig) -> Scan {
    let count = raw.samples.len();
    let bucket_count = if config.fixed_resolution {
        config.fixed_size
    } else {
        count
    };

    let min_angle = degree_to_radian(config.min_angle_deg);
    let max_angle = degree_to_radian(config.max_angle_deg);
    let scan_time = if raw.scan_frequency > 0.0 {
        1.0 / raw.scan_frequency
    } else {
        0.0
    };
    let scan_config = ScanConfig {
        min_angle,
        max_angle,
        angle_increment: (max_angle - min_angle) / (bucket_count.max(2) - 1) as f64,
        time_increment: scan_time / count.saturating_sub(1).max(1) as f64,
        scan_time,
        min_range: config.min_range,
        max_range: config.max_range,
    };

    let mut points = Vec::with_capacity(bucket_count.max(count));
    for sample in &raw.samples {
        let mut angle =
            degree_to_radian(sample.angle_degrees() + config.angle_offset_deg);
        if config.reversion {
            angle += PI;
        }
        if config.inverted {
            angle = 2.0 * PI - angle;
        }
        angle = normalize_angle(angle);

        let mut range = f64::from(sample.distance) / 1000.0;
        let mut intensity = f64::from(sample.quality);
        if in_ignore_zone(angle, &config.ignore_zones_deg) {
            range = 0.0;
        }
        if !(config.min_range..=config.max_range).contains(&range) {
            range = 0.0;
            intensity = 0.0;
        }

        if angle < min_angle || angle > max_angle {
            continue;
        }
        let point = LaserPoint {
            angle,
            range,
            intensity,
        };
        if config.fixed_resolution {
            let index = ((angle - min_angle) / scan_config.angle_increment).ceil() as i64;
            if index >= 0 && index < bucket_count as i64 {
                points.push(point);
            }
        } else {
            points.push(point);
        }
    }
    if config.fixed_resolution {
        points.resize(bucket_count, LaserPoint::default());
    }

    Scan {
        points,
        config: scan_config,
        stamp: raw.stamp,
        module: raw.module,
        checksum_correct: raw.checksum_correct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::encode_angle_q6;

    fn sample_at(angle_deg: f64, distance: u16) -> RawSample {
        RawSample {
            distance,
            angle_q6_checkbit: encode_angle_q6(angle_deg),
            quality: 47,
            valid: distance > 0,
            ..RawSample::default()
        }
    }

    fn frame_of(samples: Vec<RawSample>) -> RawScanFrame {
        RawScanFrame {
            samples,
            stamp: 12345,
            scan_frequency: 10.0,
            module: 0,
            checksum_correct: true,
        }
    }

    fn evenly_spaced(count: usize, distance: u16) -> Vec<RawSample> {
        let step = 360.0 / count as f64;
        (0..count)
            .map(|i| sample_at(i as f64 * step, distance))
            .collect()
    }

    #[test]
    fn test_ignore_zone_zeroes_range() {
        let mut config = DriverConfig::default();
        config.fixed_resolution = false;
        config.ignore_zones_deg = vec![(10.0, 20.0)];

        let raw = frame_of(vec![
            sample_at(5.0, 1000),
            sample_at(15.0, 1000),
            sample_at(20.0, 1000),
            sample_at(25.0, 1000),
        ]);
        let scan = process_scan(&raw, &config);
        assert_eq!(scan.points.len(), 4);
        assert!(scan.points[0].range > 0.0);
        assert_eq!(scan.points[1].range, 0.0);
        assert_eq!(scan.points[2].range, 0.0);
        assert!(scan.points[3].range > 0.0);
    }

    #[test]
    fn test_range_validity_zeroes_range_and_intensity() {
        let mut config = DriverConfig::default();
        config.fixed_resolution = false;
        config.min_range = 0.1;
        config.max_range = 2.0;

        // 50 mm is below the minimum, 3000 mm above the maximum.
        let raw = frame_of(vec![sample_at(5.0, 50), sample_at(6.0, 3000)]);
        let scan = process_scan(&raw, &config);
        for point in &scan.points {
            assert_eq!(point.range, 0.0);
            assert_eq!(point.intensity, 0.0);
        }
    }

    #[test]
    fn test_fixed_resolution_pads_to_bucket_count() {
        let mut config = DriverConfig::default();
        config.fixed_size = 16;
        // Keep only a narrow window so few raw samples survive.
        config.min_angle_deg = 0.0;
        config.max_angle_deg = 45.0;

        // Only two of the samples fall inside the window, so most of the
        // 16 buckets must be zero-padded.
        let raw = frame_of(vec![
            sample_at(5.0, 1000),
            sample_at(40.0, 1000),
            sample_at(90.0, 1000),
            sample_at(180.0, 1000),
            sample_at(270.0, 1000),
        ]);
        let scan = process_scan(&raw, &config);
        assert_eq!(scan.points.len(), 16);
        assert_eq!(scan.points.iter().filter(|p| p.range > 0.0).count(), 2);
        assert!(scan.points.iter().any(|p| p.range == 0.0));
    }

    #[test]
    fn test_reversion_rotates_half_turn() {
        let mut config = DriverConfig::default();
        config.fixed_resolution = false;
        config.reversion = true;

        let raw = frame_of(vec![sample_at(0.0, 1000)]);
        let scan = process_scan(&raw, &config);
        assert!((scan.points[0].angle - PI).abs() < 1e-9);
    }

    #[test]
    fn test_ascend_fills_gaps_and_rotates() {
        let count = 8;
        let step = 360.0 / count as f64;
        // Acquisition order starts at 225 degrees and wraps past zero;
        // two samples report no return.
        let mut samples: Vec<RawSample> = (0..count)
            .map(|i| sample_at((225.0 + i as f64 * step) % 360.0, 1000))
            .collect();
        samples[2].distance = 0;
        samples[5].distance = 0;

        let rotation = ascend_scan(&mut samples).unwrap();
        // 225 + 3*45 = 360 wraps to 0, so the crossing sits at index 3.
        assert_eq!(rotation, 3);
        for pair in samples.windows(2) {
            let a = pair[0].angle_degrees();
            let b = pair[1].angle_degrees();
            assert!(b >= a - 1e-9, "angles must ascend: {} then {}", a, b);
        }
    }

    #[test]
    fn test_ascend_is_idempotent_on_ordered_input() {
        let count = 16;
        let mut samples = evenly_spaced(count, 1000);
        let rotation = ascend_scan(&mut samples).unwrap();
        assert_eq!(rotation, 0);
        let before = samples.clone();
        let rotation = ascend_scan(&mut samples).unwrap();
        assert_eq!(rotation, 0);
        assert_eq!(samples, before);
    }

    #[test]
    fn test_ascend_rejects_all_zero_scan() {
        let mut samples = evenly_spaced(8, 0);
        assert!(matches!(ascend_scan(&mut samples), Err(GsError::EmptyScan)));
    }
}
