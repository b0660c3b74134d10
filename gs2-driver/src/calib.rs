use crate::constants::{
    ANGLE_CHECKBIT, ANGLE_Q6_FULL_TURN, ANGLE_SHIFT, MOUNT_ANGLE_DEG, ORIGIN_DISTANCE_MM,
    ORIGIN_OFFSET_Y_MM,
};
use gs2_data::ModuleCompensation;

/// Applies the per-module geometric calibration to one raw sample.
///
/// Slot `n` selects the calibration segment: segment 0 for `n < 80` with
/// mirrored index `80 - n`, segment 1 for `n >= 80` with `160 - n`. The
/// intermediate angle is linear in the mirrored index, or the arctangent of
/// that linear form when the offset coefficient is at most unity. The
/// compensated ray is then rotated by the module mounting angle (plus the
/// per-module bias), translated by the emitter origin offsets, and
/// converted back to polar form with the angle wrapped to [0, 360).
///
/// Returns `(angle_degrees, distance)` in the sensor's shared frame.
pub(crate) fn transform_sample(
    distance: u16,
    n: usize,
    comp: &ModuleCompensation,
) -> (f64, u16) {
    let (k, b, segment1) = if n < 80 {
        (comp.k0, comp.b0, false)
    } else {
        (comp.k1, comp.b1, true)
    };
    let pixel_u = if segment1 {
        (160 - n) as f64
    } else {
        (80 - n) as f64
    };

    let theta_deg = if b > 1.0 {
        k * pixel_u - b
    } else {
        (k * pixel_u - b).atan().to_degrees()
    };

    let mount = MOUNT_ANGLE_DEG + comp.bias;
    // The receiver looks across the emitter origin; segment 1 mirrors the
    // mounting rotation.
    let lens_angle = if segment1 {
        mount + theta_deg
    } else {
        mount - theta_deg
    };
    let ray = (f64::from(distance) - ORIGIN_DISTANCE_MM) / lens_angle.to_radians().cos();

    let theta = theta_deg.to_radians();
    let rot = if segment1 {
        (-mount).to_radians()
    } else {
        mount.to_radians()
    };
    let x = rot.cos() * ray * theta.cos() + rot.sin() * ray * theta.sin();
    let y = -rot.sin() * ray * theta.cos() + rot.cos() * ray * theta.sin();
    let x = x + ORIGIN_DISTANCE_MM;
    let y = if segment1 {
        y + ORIGIN_OFFSET_Y_MM
    } else {
        y - ORIGIN_OFFSET_Y_MM
    };

    let out_distance = (x * x + y * y).sqrt();
    let mut out_angle = y.atan2(x).to_degrees();
    if out_angle < 0.0 {
        out_angle += 360.0;
    }

    (out_angle, out_distance as u16)
}

/// Quantizes a compensated angle into the wire's `angle_q6_checkbit`
/// representation, wrapping angles outside [0, 360).
pub(crate) fn encode_angle_q6(angle_deg: f64) -> u16 {
    let q6 = angle_deg * 64.0;
    let wrapped = if q6 < 0.0 {
        q6 + ANGLE_Q6_FULL_TURN
    } else if q6 > ANGLE_Q6_FULL_TURN {
        q6 - ANGLE_Q6_FULL_TURN
    } else {
        q6
    };
    ((wrapped as u16) << ANGLE_SHIFT) + ANGLE_CHECKBIT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_k() -> ModuleCompensation {
        ModuleCompensation {
            k0: 0.005,
            b0: 0.0,
            k1: 0.005,
            b1: 0.0,
            bias: 0.0,
        }
    }

    fn decoded_degrees(angle_deg: f64) -> f64 {
        f64::from(encode_angle_q6(angle_deg) >> ANGLE_SHIFT) / 64.0
    }

    /// Angular difference wrapped to [-180, 180).
    fn wrapped_diff(a: f64, b: f64) -> f64 {
        let mut d = a - b;
        while d >= 180.0 {
            d -= 360.0;
        }
        while d < -180.0 {
            d += 360.0;
        }
        d
    }

    #[test]
    fn test_encode_angle_q6() {
        assert_eq!(encode_angle_q6(0.0), 1);
        assert_eq!(encode_angle_q6(90.0), (90 * 64 << 1) + 1);
        // Negative and >360 angles wrap back into [0, 360).
        assert_eq!(encode_angle_q6(-90.0), encode_angle_q6(270.0));
        assert_eq!(encode_angle_q6(400.0), encode_angle_q6(40.0));
    }

    #[test]
    fn test_transform_constant_distance_is_smooth() {
        let comp = small_k();
        let mut previous: Option<f64> = None;
        for n in 0..80 {
            let (angle, distance) = transform_sample(1000, n, &comp);
            assert!(distance > 0);
            if let Some(prev) = previous {
                assert!(wrapped_diff(angle, prev).abs() < 2.0);
            }
            previous = Some(angle);
        }
    }

    #[test]
    fn test_segment_boundary_continuity() {
        // Coefficients whose linear forms meet at the segment seam: the two
        // mirrored halves both land near -25 degrees at n=79/n=80. The jump
        // across the boundary must not exceed the neighboring in-segment
        // increments by more than one quantization step (1/64 degree).
        let comp = ModuleCompensation {
            k0: -45.0 / 79.0,
            b0: 2.0,
            k1: -45.0 / 79.0,
            b1: 2.0,
            bias: 0.0,
        };
        let angle = |n: usize| decoded_degrees(transform_sample(1000, n, &comp).0);
        let step0 = wrapped_diff(angle(79), angle(78)).abs();
        let step1 = wrapped_diff(angle(81), angle(80)).abs();
        let boundary = wrapped_diff(angle(80), angle(79)).abs();
        assert!(boundary <= step0 + step1 + 1.0 / 64.0);
    }

    #[test]
    fn test_linear_branch_when_offset_exceeds_unity() {
        // With b > 1 the intermediate angle is the raw linear form, not its
        // arctangent.
        let linear = ModuleCompensation {
            k0: 0.5,
            b0: 2.0,
            k1: 0.5,
            b1: 2.0,
            bias: 0.0,
        };
        let atan = ModuleCompensation {
            b0: 0.9,
            b1: 0.9,
            ..linear
        };
        let (a_linear, _) = transform_sample(1000, 10, &linear);
        let (a_atan, _) = transform_sample(1000, 10, &atan);
        assert!((a_linear - a_atan).abs() > 1e-6);
    }
}
