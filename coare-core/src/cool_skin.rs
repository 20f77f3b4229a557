//! Cool-skin model of Fairall et al. (1996)
//!
//! The ocean loses heat through a molecular sublayer of thickness $\delta$ at the
//! surface, so the skin is cooler than the bulk water by
//!
//! $$ \Delta T = \frac{Q_{col} \, \delta}{k_w} $$
//!
//! where $Q_{col}$ is the net surface cooling minus the shortwave absorbed in the
//! sublayer and $k_w$ the thermal conductivity of sea water.

use crate::constants::{
    CONDUCTIVITY_WATER, DENSITY_WATER, GAS_CONSTANT_DRY_AIR, KELVIN_OFFSET, SALINITY_EXPANSION,
    SPECIFIC_HEAT_WATER, STEFAN_BOLTZMANN, VISCOSITY_WATER,
};
use crate::field::Field;
use crate::observation::NormalizedObservation;
use crate::parameters::CoareParameters;
use crate::thermo::DerivedThermo;
use ndarray::Zip;

/// Upper bound of the sublayer thickness without convective thinning (m).
const MAX_SKIN_THICKNESS: f64 = 0.01;

/// Read-only cool-skin properties of the sea surface.
#[derive(Debug, Clone)]
pub struct CoolSkin {
    /// Thermal expansion coefficient of sea water
    pub expansion: Field,
    /// Saunders convective factor
    pub bigc: Field,
    /// Clausius-Clapeyron factor converting the skin temperature depression to a
    /// humidity depression
    pub wetc: Field,
    /// Shortwave radiation absorbed by the sea (W/m^2)
    pub net_shortwave: Field,
    pub longwave_down: Field,
    pub sea_temperature: Field,
    pub emissivity: f64,
    /// 1 when the sea temperature is a bulk temperature, 0 for a skin temperature
    pub factor: f64,
}

/// Cool-skin state after one surface heat budget update.
#[derive(Debug, Clone)]
pub struct SkinResponse {
    pub dter: Field,
    pub dqer: Field,
    pub tkt: Field,
    pub rnl: Field,
}

impl CoolSkin {
    pub fn new(
        obs: &NormalizedObservation,
        thermo: &DerivedThermo,
        parameters: &CoareParameters,
    ) -> Self {
        let ts = &obs.sea_temperature;
        let expansion = ts.mapv(|ts| 2.1e-5 * (ts + 3.2).powf(0.79));
        let bigc = Zip::from(&thermo.gravity)
            .and(&thermo.air_density)
            .map_collect(|&g, &rhoa| {
                16.0 * g * SPECIFIC_HEAT_WATER * (DENSITY_WATER * VISCOSITY_WATER).powi(3)
                    / (CONDUCTIVITY_WATER.powi(2) * rhoa * rhoa)
            });
        let wetc = Zip::from(&thermo.latent_heat)
            .and(&thermo.surface_humidity)
            .and(ts)
            .map_collect(|&le, &qs, &ts| {
                0.622 * le * qs / (GAS_CONSTANT_DRY_AIR * (ts + KELVIN_OFFSET).powi(2))
            });

        Self {
            expansion,
            bigc,
            wetc,
            net_shortwave: obs.shortwave_down.mapv(|rs| (1.0 - parameters.albedo) * rs),
            longwave_down: obs.longwave_down.clone(),
            sea_temperature: ts.clone(),
            emissivity: parameters.emissivity,
            factor: parameters.cool_skin_factor(),
        }
    }

    /// Net upward longwave radiation (W/m^2) for a skin depression `dter`.
    pub fn net_longwave(&self, dter: &Field) -> Field {
        let (emissivity, factor) = (self.emissivity, self.factor);
        Zip::from(&self.sea_temperature)
            .and(dter)
            .and(&self.longwave_down)
            .map_collect(|&ts, &dter, &rl| {
                emissivity
                    * (STEFAN_BOLTZMANN * (ts - dter * factor + KELVIN_OFFSET).powi(4) - rl)
            })
    }

    /// Update the skin state from the current turbulent fluxes.
    ///
    /// `sensible` and `latent` are the upward heat fluxes (W/m^2), `tkt` and `rnl`
    /// the sublayer thickness and net longwave of the previous round.
    pub fn respond(
        &self,
        thermo: &DerivedThermo,
        usr: &Field,
        sensible: &Field,
        latent: &Field,
        tkt: &Field,
        rnl: &Field,
    ) -> SkinResponse {
        let qout = rnl + sensible + latent;
        let absorbed = Zip::from(&self.net_shortwave)
            .and(tkt)
            .map_collect(|&rns, &tkt| {
                rns * (0.065 + 11.0 * tkt - 6.6e-5 / tkt * (1.0 - (-tkt / 8.0e-4).exp()))
            });
        let qcol = qout - absorbed;

        let alq = Zip::from(&self.expansion)
            .and(&qcol)
            .and(latent)
            .and(&thermo.latent_heat)
            .map_collect(|&al, &qcol, &hlb, &le| {
                al * qcol + SALINITY_EXPANSION * hlb * SPECIFIC_HEAT_WATER / le
            });

        let tkt = Zip::from(&alq)
            .and(usr)
            .and(&thermo.air_density)
            .and(&self.bigc)
            .map_collect(|&alq, &usr, &rhoa, &bigc| skin_thickness(alq, usr, rhoa, bigc));

        let dter = &qcol * &tkt / CONDUCTIVITY_WATER;
        let dqer = &self.wetc * &dter;
        let rnl = self.net_longwave(&dter);

        SkinResponse {
            dter,
            dqer,
            tkt,
            rnl,
        }
    }
}

/// Thickness of the molecular sublayer (m).
///
/// Convective instability (`alq > 0`) thins the layer following Saunders;
/// otherwise it is capped at 1 cm.
pub fn skin_thickness(alq: f64, usr: f64, rhoa: f64, bigc: f64) -> f64 {
    let scale = VISCOSITY_WATER / ((rhoa / DENSITY_WATER).sqrt() * usr);
    if alq > 0.0 {
        let xlamx = 6.0 / (1.0 + (bigc * alq / usr.powi(4)).powf(0.75)).powf(0.333);
        xlamx * scale
    } else {
        (6.0 * scale).min(MAX_SKIN_THICKNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{BulkObservation, Humidity};
    use approx::assert_relative_eq;

    fn setup(params: &CoareParameters) -> (DerivedThermo, CoolSkin) {
        let obs = BulkObservation::new(8.0, 10.0, 18.0, 2.0, Humidity::relative(75.0), 2.0, 20.0)
            .with_shortwave_down(0.0)
            .with_longwave_down(380.0)
            .normalize()
            .unwrap();
        let thermo = DerivedThermo::from_observation(&obs, params).unwrap();
        let skin = CoolSkin::new(&obs, &thermo, params);
        (thermo, skin)
    }

    #[test]
    fn test_skin_thickness_bounds() {
        // Stable surface: capped at 1 cm for weak friction velocities
        assert_eq!(skin_thickness(-1.0, 1e-4, 1.2, 1.0), MAX_SKIN_THICKNESS);
        let thin = skin_thickness(-1.0, 0.3, 1.2, 1.0);
        assert!(thin < MAX_SKIN_THICKNESS && thin > 0.0);
        // Convection thins the layer
        assert!(skin_thickness(1e-4, 0.3, 1.2, 1.0) < thin);
    }

    #[test]
    fn test_night_time_cooling() {
        let params = CoareParameters::default();
        let (thermo, skin) = setup(&params);

        let usr = crate::field::scalar(0.3);
        let sensible = crate::field::scalar(20.0);
        let latent = crate::field::scalar(100.0);
        let tkt = crate::field::scalar(0.001);
        let rnl = skin.net_longwave(&crate::field::scalar(0.3));

        let response = skin.respond(&thermo, &usr, &sensible, &latent, &tkt, &rnl);
        let dter = response.dter.iter().copied().next().unwrap();
        let dqer = response.dqer.iter().copied().next().unwrap();

        // Net heat loss without sunlight cools the skin by tenths of a degree
        assert!(dter > 0.05 && dter < 1.0, "dter = {}", dter);
        assert!(dqer > 0.0);
        assert!(response.tkt.iter().all(|&t| t > 0.0 && t <= MAX_SKIN_THICKNESS));
    }

    #[test]
    fn test_net_longwave_respects_factor() {
        let params = CoareParameters {
            cool_skin: false,
            ..Default::default()
        };
        let (_, skin) = setup(&params);
        let with_depression = skin.net_longwave(&crate::field::scalar(0.5));
        let without = skin.net_longwave(&crate::field::scalar(0.0));
        assert_relative_eq!(
            with_depression.iter().copied().next().unwrap(),
            without.iter().copied().next().unwrap()
        );
    }
}
