//! Fluxes, transfer coefficients and height-adjusted diagnostics
//!
//! Converts the converged similarity state into the published COARE3.5 outputs.
//! Heat fluxes are positive upward (from the ocean into the atmosphere).

use crate::constants::{
    GAS_CONSTANT_DRY_AIR, KELVIN_OFFSET, PRANDTL_TURBULENT, SPECIFIC_HEAT_WATER, STANDARD_HEIGHT,
};
use crate::field::{Field, Mask};
use crate::solver::{ConvergenceStatus, ConvergenceTracker, IterationState, Similarity};
use crate::stability::{evaluate, psit_26, psiu_26};
use crate::thermo::relative_humidity;
use ndarray::{ArrayD, Zip};

/// Lowest wind speed used in the drag coefficient denominator (m/s).
const MIN_DRAG_WIND: f64 = 0.1;

/// Output of one COARE3.5 solve. Every field has the broadcast shape of the inputs.
#[derive(Debug, Clone)]
pub struct FluxResult {
    /// Friction velocity including gustiness (m/s)
    pub friction_velocity: Field,
    /// Wind stress (N/m^2)
    pub stress: Field,
    /// Sensible heat flux (W/m^2)
    pub sensible_heat_flux: Field,
    /// Latent heat flux (W/m^2)
    pub latent_heat_flux: Field,
    /// Buoyancy flux (W/m^2)
    pub buoyancy_flux: Field,
    /// Buoyancy flux measured by a sonic anemometer (W/m^2)
    pub sonic_buoyancy_flux: Field,
    /// Webb correction to add to an eddy covariance latent heat flux measured with
    /// a water vapour density sensor (W/m^2)
    pub webb_correction: Field,
    /// Temperature scale (K)
    pub temperature_scale: Field,
    /// Humidity scale (g/kg)
    pub humidity_scale: Field,
    /// Momentum roughness length (m)
    pub momentum_roughness: Field,
    /// Thermal roughness length (m)
    pub thermal_roughness: Field,
    /// Moisture roughness length (m)
    pub moisture_roughness: Field,
    /// Drag coefficient at `zu`
    pub drag_coefficient: Field,
    /// Stanton number at `zt`
    pub stanton_number: Field,
    /// Dalton number at `zq`
    pub dalton_number: Field,
    /// Obukhov length (m)
    pub obukhov_length: Field,
    /// Stability parameter zu/L
    pub stability: Field,
    /// Cool-skin temperature depression (K)
    pub skin_temperature_depression: Field,
    /// Cool-skin humidity depression (kg/kg)
    pub skin_humidity_depression: Field,
    /// Cool-skin thickness (m)
    pub skin_thickness: Field,
    /// Wind speed at the reference height (m/s)
    pub wind_reference: Field,
    /// Air temperature at the reference height (°C)
    pub temperature_reference: Field,
    /// Specific humidity at the reference height (g/kg)
    pub humidity_reference: Field,
    /// Relative humidity at the reference height (%)
    pub relative_humidity_reference: Field,
    /// Neutral wind speed at the reference height (m/s)
    pub neutral_wind_reference: Field,
    /// Net upward longwave radiation (W/m^2)
    pub net_longwave: Field,
    /// Latent heat of vaporisation (J/kg)
    pub latent_heat: Field,
    /// Air density (kg/m^3)
    pub air_density: Field,
    /// Neutral wind speed at `zu` (m/s)
    pub neutral_wind: Field,
    /// Wind speed at 10 m (m/s)
    pub wind_10m: Field,
    /// Neutral wind speed at 10 m (m/s)
    pub neutral_wind_10m: Field,
    /// Neutral drag coefficient at 10 m, times 1000
    pub neutral_drag_10m: Field,
    /// Neutral Stanton number at 10 m, times 1000
    pub neutral_stanton_10m: Field,
    /// Neutral Dalton number at 10 m, times 1000
    pub neutral_dalton_10m: Field,
    /// Heat flux carried by rain (W/m^2)
    pub rain_heat_flux: Field,
    /// Saturation specific humidity at the sea surface (g/kg)
    pub surface_humidity: Field,
    /// Evaporation rate (mm/h)
    pub evaporation: Field,
    /// Air temperature at 10 m (°C)
    pub temperature_10m: Field,
    /// Specific humidity at 10 m (g/kg)
    pub humidity_10m: Field,
    /// Relative humidity at 10 m (%)
    pub relative_humidity_10m: Field,
    /// Wind speed including gustiness (m/s)
    pub gust_wind: Field,
    /// Boundary layer height used for the gustiness (m)
    pub boundary_layer_height: Field,
    /// Per-element outcome of the similarity iteration
    pub status: ArrayD<ConvergenceStatus>,
    /// Rounds each element iterated
    pub iterations: ArrayD<u32>,
}

impl FluxResult {
    /// Assemble the outputs from the converged similarity state.
    pub fn assemble(
        similarity: &Similarity,
        state: IterationState,
        tracker: ConvergenceTracker,
    ) -> Self {
        let obs = similarity.obs;
        let thermo = similarity.thermo;
        let params = similarity.parameters;
        let factor = similarity.skin.factor;
        let von = params.von_karman;
        let limit = params.zeta_limit;
        let zref = params.reference_height;
        let cpa = thermo.specific_heat;

        let u = &obs.wind_speed;
        let t = &obs.air_temperature;
        let zu = &obs.wind_height;
        let zt = &obs.temperature_height;
        let zq = &obs.humidity_height;
        let rhoa = &thermo.air_density;
        let le = &thermo.latent_heat;
        let ta = &thermo.air_temperature_kelvin;
        let q = &thermo.air_humidity;

        let IterationState {
            usr,
            tsr,
            qsr,
            zet,
            zo,
            zot,
            zoq,
            wind,
            dter,
            tkt,
            rnl,
            ..
        } = state;

        // Fraction of the gust-augmented wind carried by the mean wind
        let ratio = u / &wind;

        // Fluxes
        let rho_usr = rhoa * &usr;
        let stress = &rho_usr * &usr * &ratio;
        let sensible = -(&rho_usr * cpa) * &tsr;
        let latent = -(&rho_usr * le) * &qsr;
        let virtual_scale = &tsr + &(ta * &qsr * 0.61);
        let sonic_scale = &tsr + &(ta * &qsr * 0.51);
        let buoyancy = -(&rho_usr * cpa) * &virtual_scale;
        let sonic_buoyancy = -(&rho_usr * cpa) * &sonic_scale;

        let vapour_velocity = Zip::from(&latent)
            .and(le)
            .and(q)
            .and(rhoa)
            .map_collect(|&hlb, &le, &q, &rhoa| 1.61 * hlb / le / (1.0 + 1.61 * q) / rhoa);
        let thermal_velocity = Zip::from(&sensible)
            .and(rhoa)
            .and(ta)
            .map_collect(|&hsb, &rhoa, &ta| hsb / rhoa / cpa / ta);
        let wbar = vapour_velocity + thermal_velocity;
        let webb = Zip::from(&wbar)
            .and(rhoa)
            .and(q)
            .and(le)
            .map_collect(|&wbar, &rhoa, &q, &le| rhoa * wbar * q * le);
        let evaporation = &latent / le * 3600.0;

        // Transfer coefficients relative to the gust-augmented wind
        let dqer = &similarity.skin.wetc * &dter * factor;
        let drag = Zip::from(&stress)
            .and(rhoa)
            .and(&wind)
            .and(u)
            .map_collect(|&tau, &rhoa, &s, &u| tau / rhoa / s / u.max(MIN_DRAG_WIND));
        let stanton = Zip::from(&usr)
            .and(&tsr)
            .and(&wind)
            .and(&thermo.temperature_difference)
            .and(&dter)
            .map_collect(|&usr, &tsr, &s, &dt, &dter| -usr * tsr / s / (dt - dter * factor));
        let dalton = Zip::from(&usr)
            .and(&qsr)
            .and(&wind)
            .and(&thermo.humidity_difference)
            .and(&dqer)
            .map_collect(|&usr, &qsr, &s, &dq, &dqer| -usr * qsr / s / (dq - dqer));

        let log10 = |z0: &Field| z0.mapv(|z0| (STANDARD_HEIGHT / z0).ln());
        let log_zo = log10(&zo);
        // Neutral 10 m coefficients are reported per thousand
        let scaled = 1000.0 * von * von;
        let neutral_drag = log_zo.mapv(|l| scaled / (l * l));
        let neutral_stanton = (scaled * PRANDTL_TURBULENT) / (&log_zo * &log10(&zot));
        let neutral_dalton = (scaled * PRANDTL_TURBULENT) / (&log_zo * &log10(&zoq));

        // Profile corrections at the measurement, 10 m and reference heights
        let at_height = |psi: fn(f64) -> f64, z: &Field| evaluate(psi, &(&zet * z / zu), limit);
        let at_fixed = |psi: fn(f64) -> f64, z: f64| evaluate(psi, &(&zet * z / zu), limit);
        let psi = evaluate(psiu_26, &zet, limit);
        let psi10 = at_fixed(psiu_26, STANDARD_HEIGHT);
        let psirf = at_fixed(psiu_26, zref);
        let psi_t = at_height(psit_26, zt);
        let psi10_t = at_fixed(psit_26, STANDARD_HEIGHT);
        let psirf_t = at_fixed(psit_26, zref);

        let log_ratio = |z: f64, from: &Field| from.mapv(|from| (z / from).ln());
        let usr_von = &usr / von;
        let mean_scale = &usr_von * &ratio;

        // Winds
        let wind_10m = (&wind + &(&usr_von * &(log_ratio(STANDARD_HEIGHT, zu) - &psi10 + &psi)))
            * &ratio;
        let wind_reference = u + &(&mean_scale * &(log_ratio(zref, zu) - &psirf + &psi));
        let neutral_wind = u + &(&psi * &mean_scale);
        let neutral_wind_10m = &wind_10m + &(&psi10 * &mean_scale);
        let neutral_wind_reference = &wind_reference + &(&psirf * &mean_scale);

        // Temperature and humidity
        let lapse = thermo.gravity.mapv(|g| g / cpa);
        let tsr_von = &tsr / von;
        let temperature_10m = t
            + &(&tsr_von * &(log_ratio(STANDARD_HEIGHT, zt) - &psi10_t + &psi_t))
            + &(&lapse * &zt.mapv(|zt| zt - STANDARD_HEIGHT));
        let temperature_reference = t
            + &(&tsr_von * &(log_ratio(zref, zt) - &psirf_t + &psi_t))
            + &(&lapse * &zt.mapv(|zt| zt - zref));
        let qsr_von = &qsr / von;
        // Humidity shares the temperature profile correction at zt
        let humidity_10m = q + &(&qsr_von * &(log_ratio(STANDARD_HEIGHT, zq) - &psi10_t + &psi_t));
        let humidity_reference = q + &(&qsr_von * &(log_ratio(zref, zq) - &psirf_t + &psi_t));

        let p = &obs.pressure;
        let relative_humidity_10m = Zip::from(&temperature_10m)
            .and(p)
            .and(&humidity_10m)
            .map_collect(|&t, &p, &q| relative_humidity(t, p, q));
        let relative_humidity_reference = Zip::from(&temperature_reference)
            .and(p)
            .and(&humidity_reference)
            .map_collect(|&t, &p, &q| relative_humidity(t, p, q));

        let rain_heat_flux = rain_heat_flux(similarity, &dter, &dqer);

        FluxResult {
            stress,
            sensible_heat_flux: sensible,
            latent_heat_flux: latent,
            buoyancy_flux: buoyancy,
            sonic_buoyancy_flux: sonic_buoyancy,
            webb_correction: webb,
            temperature_scale: tsr,
            humidity_scale: qsr * 1000.0,
            momentum_roughness: zo,
            thermal_roughness: zot,
            moisture_roughness: zoq,
            drag_coefficient: drag,
            stanton_number: stanton,
            dalton_number: dalton,
            obukhov_length: zu / &zet,
            stability: zet,
            skin_temperature_depression: dter,
            skin_humidity_depression: dqer,
            skin_thickness: tkt,
            wind_reference,
            temperature_reference,
            humidity_reference: humidity_reference * 1000.0,
            relative_humidity_reference,
            neutral_wind_reference,
            net_longwave: rnl,
            latent_heat: le.clone(),
            air_density: rhoa.clone(),
            neutral_wind,
            wind_10m,
            neutral_wind_10m,
            neutral_drag_10m: neutral_drag,
            neutral_stanton_10m: neutral_stanton,
            neutral_dalton_10m: neutral_dalton,
            rain_heat_flux,
            surface_humidity: &thermo.surface_humidity * 1000.0,
            evaporation,
            temperature_10m,
            humidity_10m: humidity_10m * 1000.0,
            relative_humidity_10m,
            gust_wind: wind,
            boundary_layer_height: obs.boundary_layer_height.clone(),
            friction_velocity: usr,
            status: tracker.status,
            iterations: tracker.iterations,
        }
    }

    /// True where the similarity iteration converged.
    pub fn converged(&self) -> Mask {
        self.status.mapv(|s| s == ConvergenceStatus::Converged)
    }

    /// Outputs keyed by their published COARE names, in the published order.
    pub fn fields(&self) -> Vec<(&'static str, &Field)> {
        vec![
            ("usr", &self.friction_velocity),
            ("tau", &self.stress),
            ("hsb", &self.sensible_heat_flux),
            ("hlb", &self.latent_heat_flux),
            ("hbb", &self.buoyancy_flux),
            ("hsbb", &self.sonic_buoyancy_flux),
            ("hlwebb", &self.webb_correction),
            ("tsr", &self.temperature_scale),
            ("qsr", &self.humidity_scale),
            ("zo", &self.momentum_roughness),
            ("zot", &self.thermal_roughness),
            ("zoq", &self.moisture_roughness),
            ("Cd", &self.drag_coefficient),
            ("Ch", &self.stanton_number),
            ("Ce", &self.dalton_number),
            ("L", &self.obukhov_length),
            ("zet", &self.stability),
            ("dter", &self.skin_temperature_depression),
            ("dqer", &self.skin_humidity_depression),
            ("tkt", &self.skin_thickness),
            ("Urf", &self.wind_reference),
            ("Trf", &self.temperature_reference),
            ("Qrf", &self.humidity_reference),
            ("RHrf", &self.relative_humidity_reference),
            ("UrfN", &self.neutral_wind_reference),
            ("Rnl", &self.net_longwave),
            ("Le", &self.latent_heat),
            ("rhoa", &self.air_density),
            ("UN", &self.neutral_wind),
            ("U10", &self.wind_10m),
            ("U10N", &self.neutral_wind_10m),
            ("Cdn_10", &self.neutral_drag_10m),
            ("Chn_10", &self.neutral_stanton_10m),
            ("Cen_10", &self.neutral_dalton_10m),
            ("RF", &self.rain_heat_flux),
            ("Qs", &self.surface_humidity),
            ("Evap", &self.evaporation),
            ("T10", &self.temperature_10m),
            ("Q10", &self.humidity_10m),
            ("RH10", &self.relative_humidity_10m),
            ("ut", &self.gust_wind),
            ("zi", &self.boundary_layer_height),
        ]
    }

    /// Look up an output by its published COARE name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, field)| field)
    }
}

/// Sensible heat carried by rain falling at the wet-bulb temperature (Gosnell et al. 1995).
fn rain_heat_flux(similarity: &Similarity, dter: &Field, dqer: &Field) -> Field {
    let obs = similarity.obs;
    let thermo = similarity.thermo;
    let cpa = thermo.specific_heat;
    let factor = similarity.skin.factor;

    // Wet-bulb factor from the vapour and heat diffusivities
    let alfac = Zip::from(&obs.air_temperature)
        .and(&thermo.air_density)
        .and(&thermo.air_humidity)
        .and(&thermo.latent_heat)
        .map_collect(|&t, &rhoa, &q, &le| {
            let dwat = 2.11e-5 * ((t + KELVIN_OFFSET) / KELVIN_OFFSET).powf(1.94);
            let dtmp = (1.0 + 3.309e-3 * t - 1.44e-6 * t * t) * 0.02411 / (rhoa * cpa);
            let dqs_dt = q * le / (GAS_CONSTANT_DRY_AIR * (t + KELVIN_OFFSET).powi(2));
            1.0 / (1.0 + 0.622 * (dqs_dt * le * dwat) / (cpa * dtmp))
        });
    let skin_difference = Zip::from(&obs.sea_temperature)
        .and(&obs.air_temperature)
        .and(dter)
        .map_collect(|&ts, &t, &dter| ts - t - dter * factor);
    let humidity_term = Zip::from(&thermo.humidity_difference)
        .and(dqer)
        .and(&thermo.latent_heat)
        .map_collect(|&dq, &dqer, &le| (dq - dqer) * le / cpa);

    &obs.rain_rate * &alfac * SPECIFIC_HEAT_WATER * (skin_difference + humidity_term) / 3600.0
}
