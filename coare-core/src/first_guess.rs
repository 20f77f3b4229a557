//! Neutral-start first guess
//!
//! The first stability estimate comes from the bulk Richardson number
//!
//! $$ Ri_b = -\frac{g z_u}{T_a} \frac{\Delta T - \Delta T_{skin} + 0.61 T_a \Delta q}{S^2} $$
//!
//! mapped to $\zeta$ with the neutral transfer coefficients, following Grachev and
//! Fairall (1997). The flux scales then follow from the log-profile law.

use crate::constants::STANDARD_HEIGHT;
use crate::field::{Field, Mask};
use crate::roughness::clamp_roughness;
use crate::solver::{IterationState, Scales, Similarity};
use crate::stability::psiu_40;
use ndarray::Zip;

/// Gust velocity assumed before any buoyancy flux is known (m/s).
const FIRST_GUESS_GUST: f64 = 0.5;
/// Skin temperature depression assumed before the first heat budget (K).
const FIRST_GUESS_DTER: f64 = 0.3;
/// Neutral Stanton number at 10 m.
const NEUTRAL_STANTON: f64 = 0.00115;
/// Roughness of the reference log profile used to extrapolate the wind to 10 m (m).
const REFERENCE_ROUGHNESS: f64 = 1e-4;
/// First stability estimates above this value mark a very thin Obukhov length.
const STRONGLY_STABLE_ZETA: f64 = 50.0;

/// Initial state of the similarity iteration.
#[derive(Debug, Clone)]
pub struct FirstGuess {
    pub state: IterationState,
    /// Elements whose first stability estimate exceeds 50; they keep the solution
    /// of the first round.
    pub strongly_stable: Mask,
}

/// Build the first guess from the observation.
pub fn first_guess(similarity: &Similarity) -> FirstGuess {
    let obs = similarity.obs;
    let thermo = similarity.thermo;
    let params = similarity.parameters;
    let factor = similarity.skin.factor;
    let von = params.von_karman;
    let charn0 = params.charnock;
    let beta = params.gustiness;

    let wind = obs
        .wind_speed
        .mapv(|u| (u * u + FIRST_GUESS_GUST * FIRST_GUESS_GUST).sqrt());
    let u10 = neutral_wind_10m(&wind, &obs.wind_height);
    let usr10 = u10.mapv(|u10| 0.035 * u10);
    let zo10 = Zip::from(&usr10)
        .and(&thermo.gravity)
        .and(&thermo.viscosity)
        .map_collect(|&usr, &g, &visa| {
            clamp_roughness(charn0 * usr * usr / g + 0.11 * visa / usr)
        });
    let zot10 = zo10.mapv(|zo10| {
        let cd10 = (von / (STANDARD_HEIGHT / zo10).ln()).powi(2);
        let ct10 = NEUTRAL_STANTON / cd10.sqrt();
        clamp_roughness(STANDARD_HEIGHT / (von / ct10).exp())
    });

    // Neutral transfer coefficients at the measurement heights
    let cc = Zip::from(&zo10)
        .and(&zot10)
        .and(&obs.wind_height)
        .and(&obs.temperature_height)
        .map_collect(|&zo10, &zot10, &zu, &zt| {
            let cd = (von / (zu / zo10).ln()).powi(2);
            let ct = von / (zt / zot10).ln();
            von * ct / cd
        });

    let virtual_difference = Zip::from(&thermo.temperature_difference)
        .and(&thermo.humidity_difference)
        .and(&thermo.air_temperature_kelvin)
        .map_collect(|&dt, &dq, &ta| {
            ((dt - FIRST_GUESS_DTER * factor) + 0.61 * ta * dq) / ta
        });
    let richardson = Zip::from(&thermo.gravity)
        .and(&obs.wind_height)
        .and(&virtual_difference)
        .and(&wind)
        .map_collect(|&g, &zu, &dtv, &s| -g * zu * dtv / (s * s));
    let convective_limit = Zip::from(&obs.wind_height)
        .and(&obs.boundary_layer_height)
        .map_collect(|&zu, &zi| -zu / zi / 0.004 / beta.powi(3));

    let zetu = Zip::from(&richardson)
        .and(&cc)
        .and(&convective_limit)
        .map_collect(|&ri, &cc, &ri_cu| {
            if ri < 0.0 {
                cc * ri / (1.0 + ri / ri_cu)
            } else {
                cc * ri * (1.0 + 3.0 * ri / cc)
            }
        });
    let strongly_stable = zetu.mapv(|z| z > STRONGLY_STABLE_ZETA);

    let dter = obs.wind_speed.mapv(|_| FIRST_GUESS_DTER);
    let Scales { usr, tsr, qsr } =
        similarity.scales(psiu_40, &zetu, &zo10, &zot10, &zot10, &wind, &dter);

    let charnock = similarity.charnock(&u10, &usr);
    let zet = similarity.stability(&usr, &tsr, &qsr);
    let rnl = similarity.skin.net_longwave(&dter);

    let state = IterationState {
        dqer: &similarity.skin.wetc * &dter,
        tkt: obs.wind_speed.mapv(|_| 0.001),
        usr,
        tsr,
        qsr,
        zet,
        zo: zo10,
        zoq: zot10.clone(),
        zot: zot10,
        wind,
        charnock,
        dter,
        rnl,
    };

    FirstGuess {
        state,
        strongly_stable,
    }
}

/// Neutral 10 m wind extrapolated from the measurement height (m/s).
pub fn neutral_wind_10m(wind: &Field, wind_height: &Field) -> Field {
    Zip::from(wind).and(wind_height).map_collect(|&s, &zu| {
        s * (STANDARD_HEIGHT / REFERENCE_ROUGHNESS).ln() / (zu / REFERENCE_ROUGHNESS).ln()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cool_skin::CoolSkin;
    use crate::observation::{BulkObservation, Humidity};
    use crate::parameters::CoareParameters;
    use crate::thermo::DerivedThermo;
    use ndarray::array;

    fn guess(obs: BulkObservation) -> FirstGuess {
        let params = CoareParameters::default();
        let obs = obs.normalize().unwrap();
        let thermo = DerivedThermo::from_observation(&obs, &params).unwrap();
        let skin = CoolSkin::new(&obs, &thermo, &params);
        first_guess(&Similarity {
            obs: &obs,
            thermo: &thermo,
            skin: &skin,
            parameters: &params,
        })
    }

    #[test]
    fn test_first_guess_is_physical() {
        let guess = guess(BulkObservation::new(
            array![3.0, 10.0, 20.0],
            10.0,
            20.0,
            2.0,
            Humidity::relative(80.0),
            2.0,
            22.0,
        ));
        let state = &guess.state;

        assert!(state.usr.iter().all(|&u| u > 0.0));
        // Warm water under cooler air gives upward heat fluxes (negative scales)
        assert!(state.tsr.iter().all(|&t| t < 0.0));
        assert!(state.qsr.iter().all(|&q| q < 0.0));
        assert!(state.zet.iter().all(|&z| z < 0.0));
        assert!(state.zo.iter().all(|&z| z > 0.0 && z < 1e-2));
        assert!(guess.strongly_stable.iter().all(|&k| !k));
        // Friction velocity grows with the wind
        assert!(state.usr[[0]] < state.usr[[1]] && state.usr[[1]] < state.usr[[2]]);
    }

    #[test]
    fn test_strongly_stable_flag() {
        // Light wind, much warmer air over cold water
        let guess = guess(BulkObservation::new(
            array![0.5, 10.0],
            10.0,
            array![15.0, 15.0],
            2.0,
            Humidity::relative(90.0),
            2.0,
            0.0,
        ));
        assert_eq!(guess.strongly_stable, array![true, false].into_dyn());
    }

    #[test]
    fn test_neutral_wind_10m() {
        let wind = array![8.0].into_dyn();
        let at_10m = neutral_wind_10m(&wind, &array![10.0].into_dyn());
        assert_eq!(at_10m, wind);
        let from_2m = neutral_wind_10m(&wind, &array![2.0].into_dyn());
        assert!(from_2m[[0]] > 8.0);
    }
}
