//! Surface roughness models
//!
//! The momentum roughness follows the Charnock relation with a smooth-flow term,
//!
//! $$ z_0 = \alpha \frac{u_*^2}{g} + 0.11 \frac{\nu}{u_*} $$
//!
//! where the Charnock parameter $\alpha$ depends on the available sea-state
//! information:
//!
//! - wind speed only: $\alpha = 0.0017 \min(U_{10N}, 19) - 0.005$
//! - wave phase speed $c_p$: $\alpha = 0.114 (u_*/c_p)^{0.622}$
//! - phase speed and significant wave height $H_s$:
//!   $\alpha = H_s \, 0.15 (u_*/c_p)^{2.2} g / u_*^2$
//!
//! Elements without wave data fall back to the wind-speed relation.

use crate::constants::{ROUGHNESS_CEILING, ROUGHNESS_FLOOR};

const WIND_SLOPE: f64 = 0.0017;
const WIND_OFFSET: f64 = -0.005;
const WIND_SATURATION: f64 = 19.0;

const WAVE_AGE_COEFFICIENT: f64 = 0.114;
const WAVE_AGE_EXPONENT: f64 = 0.622;

const SEA_STATE_COEFFICIENT: f64 = 0.15;
const SEA_STATE_EXPONENT: f64 = 2.2;

/// Bound a roughness length to the physically meaningful range.
pub fn clamp_roughness(z: f64) -> f64 {
    z.clamp(ROUGHNESS_FLOOR, ROUGHNESS_CEILING)
}

/// Momentum roughness length (m).
pub fn momentum_roughness(charnock: f64, usr: f64, gravity: f64, viscosity: f64) -> f64 {
    clamp_roughness(charnock * usr * usr / gravity + 0.11 * viscosity / usr)
}

/// Thermal and moisture roughness length (m) from the roughness Reynolds number.
pub fn scalar_roughness(zo: f64, usr: f64, viscosity: f64) -> f64 {
    let rr = zo * usr / viscosity;
    clamp_roughness((5.8e-5 / rr.powf(0.72)).min(1.6e-4))
}

/// Charnock parameter from the 10 m neutral wind speed.
pub fn wind_charnock(u10n: f64) -> f64 {
    WIND_SLOPE * u10n.min(WIND_SATURATION) + WIND_OFFSET
}

/// Charnock parameter for one element given the available wave data.
///
/// NaN `phase_speed` or `wave_height` selects the next simpler model.
pub fn charnock(u10n: f64, usr: f64, gravity: f64, phase_speed: f64, wave_height: f64) -> f64 {
    if phase_speed.is_nan() {
        return wind_charnock(u10n);
    }
    let wave_age = usr / phase_speed;
    if wave_height.is_nan() {
        WAVE_AGE_COEFFICIENT * wave_age.powf(WAVE_AGE_EXPONENT)
    } else {
        let zo = wave_height * SEA_STATE_COEFFICIENT * wave_age.powf(SEA_STATE_EXPONENT);
        zo * gravity / (usr * usr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wind_charnock_saturates() {
        assert_relative_eq!(wind_charnock(10.0), 0.012, epsilon = 1e-12);
        assert_relative_eq!(wind_charnock(19.0), wind_charnock(30.0));
        assert!(wind_charnock(5.0) < wind_charnock(15.0));
    }

    #[test]
    fn test_model_selection() {
        let (u10n, usr, g) = (10.0, 0.35, 9.8);
        assert_eq!(charnock(u10n, usr, g, f64::NAN, f64::NAN), wind_charnock(u10n));
        // A NaN phase speed ignores the wave height too
        assert_eq!(charnock(u10n, usr, g, f64::NAN, 2.0), wind_charnock(u10n));

        let wave_age = charnock(u10n, usr, g, 10.0, f64::NAN);
        assert_relative_eq!(wave_age, 0.114 * (0.035_f64).powf(0.622), epsilon = 1e-12);

        let sea_state = charnock(u10n, usr, g, 10.0, 2.0);
        assert_relative_eq!(
            sea_state,
            2.0 * 0.15 * (0.035_f64).powf(2.2) * g / (usr * usr),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_roughness_lengths() {
        let zo = momentum_roughness(0.011, 0.3, 9.8, 1.5e-5);
        assert!(zo > 1e-5 && zo < 1e-3, "zo = {}", zo);

        let zot = scalar_roughness(zo, 0.3, 1.5e-5);
        assert!(zot <= 1.6e-4);
        assert!(zot < zo);
    }

    #[test]
    fn test_roughness_is_clamped() {
        assert_eq!(momentum_roughness(0.011, 1e-12, 9.8, 1.5e-5), ROUGHNESS_CEILING);
        assert_eq!(scalar_roughness(1.0, 1e6, 1.5e-5), ROUGHNESS_FLOOR);
    }
}
