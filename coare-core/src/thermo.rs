//! Closed-form thermodynamics of moist air and sea water
//!
//! Scalar functions are evaluated element-wise; [`DerivedThermo`] collects the
//! read-only quantities the similarity iteration needs.

use crate::constants::{
    ADIABATIC_LAPSE, GAS_CONSTANT_DRY_AIR, KELVIN_OFFSET, SPECIFIC_HEAT_AIR,
};
use crate::errors::{CoareError, CoareResult};
use crate::field::{Field, Mask};
use crate::observation::{Humidity, NormalizedObservation};
use crate::parameters::CoareParameters;
use ndarray::Zip;

/// Saturation vapour pressure over water (mb), Buck (1981) with pressure enhancement.
///
/// $$ e_s = 6.1121 \exp\left(\frac{17.502 T}{T + 240.97}\right)(1.0007 + 3.46 \times 10^{-6} P) $$
pub fn saturation_vapor_pressure(t: f64, p: f64) -> f64 {
    6.1121 * (17.502 * t / (t + 240.97)).exp() * (1.0007 + 3.46e-6 * p)
}

/// Saturation specific humidity at the sea surface (g/kg).
///
/// Salinity lowers the vapour pressure by 2%.
pub fn qsat_sea(t: f64, p: f64) -> f64 {
    let es = 0.98 * saturation_vapor_pressure(t, p);
    622.0 * es / (p - 0.378 * es)
}

/// Specific humidity (g/kg) and vapour pressure (mb) of air at relative humidity `rh` (%).
pub fn qsat_air(t: f64, p: f64, rh: f64) -> (f64, f64) {
    let em = 0.01 * rh * saturation_vapor_pressure(t, p);
    (622.0 * em / (p - 0.378 * em), em)
}

/// Relative humidity (%) from specific humidity `q` (kg/kg).
pub fn relative_humidity(t: f64, p: f64, q: f64) -> f64 {
    let em = q * p / (0.378 * q + 0.622);
    100.0 * em / saturation_vapor_pressure(t, p)
}

/// Gravitational acceleration (m/s^2) at latitude `lat` (degrees), WGS84 ellipsoid.
pub fn gravity(lat: f64) -> f64 {
    const GAMMA: f64 = 9.7803267715;
    const C1: f64 = 0.0052790414;
    const C2: f64 = 0.0000232718;
    const C3: f64 = 0.0000001262;
    const C4: f64 = 0.0000000007;

    let x2 = lat.to_radians().sin().powi(2);
    GAMMA * (1.0 + C1 * x2 + C2 * x2.powi(2) + C3 * x2.powi(3) + C4 * x2.powi(4))
}

/// Kinematic viscosity of dry air (m^2/s) at temperature `t` (°C).
pub fn air_viscosity(t: f64) -> f64 {
    1.326e-5 * (1.0 + 6.542e-3 * t + 8.301e-6 * t * t - 4.84e-9 * t * t * t)
}

/// Latent heat of vaporisation (J/kg) at sea temperature `ts` (°C).
pub fn latent_heat(ts: f64) -> f64 {
    (2.501 - 0.00237 * ts) * 1e6
}

/// Density of moist air (kg/m^3) from pressure (mb), temperature (°C) and
/// specific humidity (kg/kg).
pub fn air_density(p: f64, t: f64, q: f64) -> f64 {
    p * 100.0 / (GAS_CONSTANT_DRY_AIR * (t + KELVIN_OFFSET) * (1.0 + 0.61 * q))
}

/// Thermodynamic quantities derived once from the observation.
///
/// Humidities are carried in kg/kg.
#[derive(Debug, Clone)]
pub struct DerivedThermo {
    /// Saturation specific humidity at the sea surface
    pub surface_humidity: Field,
    /// Specific humidity of the air at `zq`
    pub air_humidity: Field,
    /// Relative humidity of the air at `zq` (%)
    pub relative_humidity: Field,
    pub latent_heat: Field,
    pub air_density: Field,
    /// Specific heat of dry air (J/kg/K)
    pub specific_heat: f64,
    pub viscosity: Field,
    pub gravity: Field,
    /// Air-sea temperature difference corrected for the adiabatic lapse (K)
    pub temperature_difference: Field,
    /// Air-sea humidity difference (kg/kg)
    pub humidity_difference: Field,
    /// Air temperature (K)
    pub air_temperature_kelvin: Field,
}

impl DerivedThermo {
    pub fn from_observation(
        obs: &NormalizedObservation,
        parameters: &CoareParameters,
    ) -> CoareResult<Self> {
        let t = &obs.air_temperature;
        let p = &obs.pressure;
        let ts = &obs.sea_temperature;

        let surface_denominator = Zip::from(ts)
            .and(p)
            .map_collect(|&ts, &p| p - 0.378 * 0.98 * saturation_vapor_pressure(ts, p));
        check_vapor_denominator("sea_temperature", &obs.valid, &surface_denominator)?;

        let surface_humidity = Zip::from(ts)
            .and(p)
            .map_collect(|&ts, &p| qsat_sea(ts, p) / 1000.0);

        let (air_humidity, relative_humidity) = match &obs.humidity {
            Humidity::Relative(rh) => {
                let denominator = Zip::from(t)
                    .and(p)
                    .and(rh)
                    .map_collect(|&t, &p, &rh| p - 0.378 * qsat_air(t, p, rh).1);
                check_vapor_denominator("relative_humidity", &obs.valid, &denominator)?;
                let q = Zip::from(t)
                    .and(p)
                    .and(rh)
                    .map_collect(|&t, &p, &rh| qsat_air(t, p, rh).0 / 1000.0);
                (q, rh.clone())
            }
            Humidity::Specific(q) => {
                let rh = Zip::from(t)
                    .and(p)
                    .and(q)
                    .map_collect(|&t, &p, &q| relative_humidity(t, p, q));
                (q.clone(), rh)
            }
        };

        let air_density = Zip::from(p)
            .and(t)
            .and(&air_humidity)
            .map_collect(|&p, &t, &q| air_density(p, t, q));

        let gravity = match parameters.gravity {
            Some(g) => obs.latitude.mapv(|_| g),
            None => obs.latitude.mapv(gravity),
        };

        let temperature_difference = Zip::from(ts)
            .and(t)
            .and(&obs.temperature_height)
            .map_collect(|&ts, &t, &zt| ts - t - ADIABATIC_LAPSE * zt);

        Ok(Self {
            humidity_difference: &surface_humidity - &air_humidity,
            surface_humidity,
            air_humidity,
            relative_humidity,
            latent_heat: ts.mapv(latent_heat),
            air_density,
            specific_heat: SPECIFIC_HEAT_AIR,
            viscosity: t.mapv(air_viscosity),
            gravity,
            temperature_difference,
            air_temperature_kelvin: t.mapv(|t| t + KELVIN_OFFSET),
        })
    }
}

/// Fail if the `P - 0.378 e` denominator is not positive for a valid element.
fn check_vapor_denominator(field: &str, valid: &Mask, denominator: &Field) -> CoareResult<()> {
    let bad = Zip::from(valid)
        .and(denominator)
        .fold(false, |bad, &valid, &d| bad || (valid && d <= 0.0));
    if bad {
        return Err(CoareError::NonFiniteInput {
            field: field.to_string(),
            reason: "vapour pressure exceeds the air pressure".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::BulkObservation;
    use approx::assert_relative_eq;

    #[test]
    fn test_saturation_vapor_pressure() {
        // 6.1121 * 1.0007 at 0 °C and zero pressure enhancement
        assert_relative_eq!(saturation_vapor_pressure(0.0, 0.0), 6.1121 * 1.0007);
        // About 23.4 mb at 20 °C
        let es = saturation_vapor_pressure(20.0, 1013.0);
        assert!((es - 23.4).abs() < 0.2, "es = {}", es);
    }

    #[test]
    fn test_humidity_roundtrip() {
        let (q, _) = qsat_air(20.0, 1015.0, 80.0);
        let rh = relative_humidity(20.0, 1015.0, q / 1000.0);
        assert_relative_eq!(rh, 80.0, epsilon = 1e-9);
        assert!(qsat_sea(20.0, 1015.0) > q);
    }

    #[test]
    fn test_gravity() {
        assert_relative_eq!(gravity(0.0), 9.7803267715);
        let pole = gravity(90.0);
        assert!((pole - 9.8322).abs() < 1e-3, "g at pole = {}", pole);
        assert_relative_eq!(gravity(45.0), gravity(-45.0));
    }

    #[test]
    fn test_air_properties() {
        assert_relative_eq!(air_viscosity(0.0), 1.326e-5);
        assert_relative_eq!(latent_heat(0.0), 2.501e6);
        let rho = air_density(1015.0, 20.0, 0.0);
        assert!((rho - 1.206).abs() < 1e-3, "rho = {}", rho);
    }

    #[test]
    fn test_derived_thermo() {
        let obs = BulkObservation::new(5.0, 10.0, 20.0, 2.0, Humidity::relative(80.0), 2.0, 22.0)
            .normalize()
            .unwrap();
        let thermo = DerivedThermo::from_observation(&obs, &CoareParameters::default()).unwrap();

        let dt = thermo.temperature_difference.iter().copied().next().unwrap();
        assert_relative_eq!(dt, 2.0 - 0.0098 * 2.0, epsilon = 1e-12);
        let dq = thermo.humidity_difference.iter().copied().next().unwrap();
        assert!(dq > 0.0);
        assert_relative_eq!(
            thermo.gravity.iter().copied().next().unwrap(),
            9.7803267715
        );
    }

    #[test]
    fn test_fixed_gravity_and_specific_humidity() {
        let obs = BulkObservation::new(
            5.0,
            10.0,
            20.0,
            2.0,
            Humidity::specific(0.012),
            2.0,
            22.0,
        )
        .normalize()
        .unwrap();
        let params = CoareParameters {
            gravity: Some(9.81),
            ..Default::default()
        };
        let thermo = DerivedThermo::from_observation(&obs, &params).unwrap();

        assert_eq!(thermo.gravity.iter().copied().next(), Some(9.81));
        assert_eq!(thermo.air_humidity.iter().copied().next(), Some(0.012));
        let rh = thermo.relative_humidity.iter().copied().next().unwrap();
        assert!(rh > 60.0 && rh < 90.0, "rh = {}", rh);
    }

    #[test]
    fn test_vapor_denominator_rejected() {
        // Saturation pressure near 100 °C exceeds a 10 mb atmosphere
        let obs = BulkObservation::new(5.0, 10.0, 20.0, 2.0, Humidity::relative(80.0), 2.0, 95.0)
            .with_pressure(10.0)
            .normalize()
            .unwrap();
        assert!(matches!(
            DerivedThermo::from_observation(&obs, &CoareParameters::default()),
            Err(CoareError::NonFiniteInput { .. })
        ));
    }
}
