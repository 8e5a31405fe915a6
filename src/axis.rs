//! PWM ↔ logical-axis mapping (§4.9).

/// `min_pwm`/`max_pwm` of 0 means "no calibration yet" → 0. Otherwise maps
/// `pwm` linearly from `[min_pwm, max_pwm]` into `[min_out, max_out]`,
/// clamped to that output range.
pub fn pwm_to_axis(pwm: f64, min_pwm: f64, max_pwm: f64, min_out: f64, max_out: f64) -> f64 {
    if min_pwm == 0.0 || max_pwm == 0.0 {
        return 0.0;
    }
    let p = (pwm - min_pwm) / (max_pwm - min_pwm);
    (min_out + p * (max_out - min_out)).clamp(min_out.min(max_out), min_out.max(max_out))
}

/// Control surface channels derived from `SERVO_OUTPUT_RAW`: aileron,
/// elevator, rudder in `-1..1`, throttle in `0..1`. In quadcopter mode
/// (§4.9) the single `throttle` is replaced by four independent motor
/// throttles and the fixed-wing fields are left at their defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlMirror {
    pub aileron: f64,
    pub elevator: f64,
    pub rudder: f64,
    pub throttle: f64,
    pub quad_throttle: Option<[f64; 4]>,
}

/// Per-channel `RCx_MIN`/`RCx_MAX` calibration, indexed 1..=8 (channel 0 unused).
#[derive(Debug, Clone, Copy, Default)]
pub struct RcLimits {
    pub min: [f64; 9],
    pub max: [f64; 9],
}

/// Four throttle values (one per motor), all scaled against RC3's limits,
/// per §4.9's quadcopter-mode rule.
pub fn recompute_quad_throttle(servo_raw: &[u16; 8], limits: &RcLimits) -> [f64; 4] {
    let scale = |pwm: u16| pwm_to_axis(pwm as f64, limits.min[3], limits.max[3], 0.0, 1.0);
    [
        scale(servo_raw[0]),
        scale(servo_raw[1]),
        scale(servo_raw[2]),
        scale(servo_raw[3]),
    ]
}

#[allow(clippy::too_many_arguments)]
pub fn recompute_control_mirror(
    servo_raw: &[u16; 8],
    limits: &RcLimits,
    rc1mul: f64,
    rc2mul: f64,
    rc4mul: f64,
    quadcopter: bool,
) -> ControlMirror {
    if quadcopter {
        return ControlMirror {
            quad_throttle: Some(recompute_quad_throttle(servo_raw, limits)),
            ..ControlMirror::default()
        };
    }
    let axis = |channel: usize, pwm: u16, out_lo: f64, out_hi: f64| {
        pwm_to_axis(pwm as f64, limits.min[channel], limits.max[channel], out_lo, out_hi)
    };
    ControlMirror {
        aileron: axis(1, servo_raw[0], -1.0, 1.0) * rc1mul,
        elevator: axis(2, servo_raw[1], -1.0, 1.0) * rc2mul,
        throttle: axis(3, servo_raw[2], 0.0, 1.0),
        rudder: axis(4, servo_raw[3], -1.0, 1.0) * rc4mul,
        quad_throttle: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_calibration_yields_zero() {
        assert_eq!(pwm_to_axis(1500.0, 0.0, 2000.0, -1.0, 1.0), 0.0);
        assert_eq!(pwm_to_axis(1500.0, 1000.0, 0.0, -1.0, 1.0), 0.0);
    }

    #[test]
    fn midpoint_maps_to_middle_of_output_range() {
        let v = pwm_to_axis(1500.0, 1000.0, 2000.0, -1.0, 1.0);
        assert!((v - 0.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_calibration_pwm_clamps() {
        let v = pwm_to_axis(3000.0, 1000.0, 2000.0, -1.0, 1.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn throttle_range_is_zero_to_one() {
        let mut limits = RcLimits::default();
        limits.min[3] = 1000.0;
        limits.max[3] = 2000.0;
        let mirror = recompute_control_mirror(&[0, 0, 2000, 0, 0, 0, 0, 0], &limits, 1.0, 1.0, 1.0, false);
        assert_eq!(mirror.throttle, 1.0);
    }

    #[test]
    fn rc_mul_settings_scale_the_fixed_wing_axes() {
        let mut limits = RcLimits::default();
        limits.min[1] = 1000.0;
        limits.max[1] = 2000.0;
        let mirror = recompute_control_mirror(&[2000, 0, 0, 0, 0, 0, 0, 0], &limits, -1.0, 1.0, 1.0, false);
        assert_eq!(mirror.aileron, -1.0);
    }

    #[test]
    fn quadcopter_mode_produces_four_throttles_from_rc3_limits() {
        let mut limits = RcLimits::default();
        limits.min[3] = 1000.0;
        limits.max[3] = 2000.0;
        let mirror = recompute_control_mirror(&[1000, 1500, 2000, 1250, 0, 0, 0, 0], &limits, 1.0, 1.0, 1.0, true);
        let throttles = mirror.quad_throttle.expect("quadcopter mode should populate quad_throttle");
        assert_eq!(throttles, [0.0, 0.5, 1.0, 0.25]);
    }
}
