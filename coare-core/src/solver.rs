//! Masked element-wise Monin-Obukhov similarity iteration
//!
//! Every round computes a candidate state for all elements, then commits it only
//! where the element is still [`ConvergenceStatus::Active`]. Converged elements are
//! therefore frozen at the state in which they converged, and the result of an
//! element never depends on its neighbours.
//!
//! Plain fixed-point iteration cycles in light winds, where the cool-skin
//! response flips the sign of the temperature scale and $\zeta$ jumps between
//! stable and unstable values. From round [`ACCELERATION_START`] the candidate of
//! every unconverged element is replaced by a damped Anderson(1) update
//!
//! $$ x_{k+1} = \bar x + \beta \bar r, \quad \bar x = x_k - \gamma (x_k - x_{k-1}),
//! \quad \bar r = r_k - \gamma (r_k - r_{k-1}) $$
//!
//! where $r_k = G(x_k) - x_k$ is the residual of the round over the carried
//! quantities and $\gamma$ minimises the weighted norm of $\bar r$. The fixed
//! points are those of the plain iteration.
//!
//! The cool-skin thickness is capped only while the skin loses no heat, so it
//! jumps where the heat loss changes sign at very low $u_*$. An element whose
//! solution sits on that jump has no fixed point and ends
//! [`ConvergenceStatus::Exhausted`].

use crate::constants::{MIN_PROFILE_DENOMINATOR, PRANDTL_TURBULENT, STANDARD_HEIGHT};
use crate::cool_skin::CoolSkin;
use crate::errors::{CoareError, CoareResult};
use crate::field::{commit, count, Field, Mask};
use crate::first_guess::FirstGuess;
use crate::observation::NormalizedObservation;
use crate::parameters::CoareParameters;
use crate::roughness::{charnock, momentum_roughness, scalar_roughness};
use crate::stability::{evaluate, psit_26, psiu_26};
use crate::thermo::DerivedThermo;
use ndarray::{ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// First round whose candidate is mixed with the previous round.
pub const ACCELERATION_START: usize = 4;

/// Fraction $\beta$ of the mixed residual added to the mixed state.
const MIXING: f64 = 0.8;

/// Bound on the extrapolation coefficient $\gamma$.
const MAX_EXTRAPOLATION: f64 = 10.0;

/// Number of quantities carried from one round to the next.
const CARRIED: usize = 7;

/// Per-element outcome of the similarity iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Still iterating
    Active,
    /// Met the convergence criterion, or was frozen after the first round as
    /// strongly stable
    Converged,
    /// Ran out of iterations without converging
    Exhausted,
    /// A required input was missing (NaN)
    Missing,
}

/// State mutated by the similarity iteration.
#[derive(Debug, Clone)]
pub struct IterationState {
    /// Friction velocity including gustiness (m/s)
    pub usr: Field,
    /// Temperature scale (K)
    pub tsr: Field,
    /// Humidity scale (kg/kg)
    pub qsr: Field,
    /// Stability parameter zu/L
    pub zet: Field,
    pub zo: Field,
    pub zot: Field,
    pub zoq: Field,
    /// Gust-augmented wind speed (m/s)
    pub wind: Field,
    pub charnock: Field,
    pub dter: Field,
    pub dqer: Field,
    pub tkt: Field,
    pub rnl: Field,
}

impl IterationState {
    fn fields_mut(&mut self) -> [&mut Field; 13] {
        [
            &mut self.usr,
            &mut self.tsr,
            &mut self.qsr,
            &mut self.zet,
            &mut self.zo,
            &mut self.zot,
            &mut self.zoq,
            &mut self.wind,
            &mut self.charnock,
            &mut self.dter,
            &mut self.dqer,
            &mut self.tkt,
            &mut self.rnl,
        ]
    }

    fn fields(&self) -> [&Field; 13] {
        [
            &self.usr,
            &self.tsr,
            &self.qsr,
            &self.zet,
            &self.zo,
            &self.zot,
            &self.zoq,
            &self.wind,
            &self.charnock,
            &self.dter,
            &self.dqer,
            &self.tkt,
            &self.rnl,
        ]
    }

    /// Quantities that feed the next round, in the order used by [`anderson_step`].
    fn carried(&self) -> [&Field; CARRIED] {
        [
            &self.charnock,
            &self.usr,
            &self.zet,
            &self.wind,
            &self.dter,
            &self.tkt,
            &self.rnl,
        ]
    }

    fn carried_mut(&mut self) -> [&mut Field; CARRIED] {
        [
            &mut self.charnock,
            &mut self.usr,
            &mut self.zet,
            &mut self.wind,
            &mut self.dter,
            &mut self.tkt,
            &mut self.rnl,
        ]
    }

    /// Copy `update` into this state wherever `mask` is set.
    pub fn commit(&mut self, update: &IterationState, mask: &Mask) {
        for (target, source) in self.fields_mut().into_iter().zip(update.fields()) {
            commit(target, source, mask);
        }
    }

    /// Set every quantity to NaN where `valid` is false.
    pub fn mask_missing(&mut self, valid: &Mask) {
        for field in self.fields_mut() {
            Zip::from(field).and(valid).for_each(|v, &ok| {
                if !ok {
                    *v = f64::NAN;
                }
            });
        }
    }
}

/// Per-element convergence bookkeeping.
///
/// Elements start `Active` (or `Missing`) and only ever move forward to
/// `Converged` or `Exhausted`.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    pub status: ArrayD<ConvergenceStatus>,
    pub iterations: ArrayD<u32>,
}

impl ConvergenceTracker {
    pub fn new(valid: &Mask) -> Self {
        Self {
            status: valid.mapv(|ok| {
                if ok {
                    ConvergenceStatus::Active
                } else {
                    ConvergenceStatus::Missing
                }
            }),
            iterations: ArrayD::zeros(IxDyn(valid.shape())),
        }
    }

    pub fn active(&self) -> Mask {
        self.status.mapv(|s| s == ConvergenceStatus::Active)
    }

    pub fn count(&self, status: ConvergenceStatus) -> usize {
        self.status.iter().filter(|&&s| s == status).count()
    }

    /// Count a round for every element in `active` and mark `converged` ones.
    pub fn record(&mut self, active: &Mask, converged: &Mask) {
        Zip::from(&mut self.status)
            .and(&mut self.iterations)
            .and(active)
            .and(converged)
            .for_each(|status, iterations, &active, &converged| {
                if active {
                    *iterations += 1;
                    if converged {
                        *status = ConvergenceStatus::Converged;
                    }
                }
            });
    }

    /// Mark every element still active as exhausted.
    pub fn finish(&mut self) {
        self.status.mapv_inplace(|s| match s {
            ConvergenceStatus::Active => ConvergenceStatus::Exhausted,
            other => other,
        });
        let exhausted = self.count(ConvergenceStatus::Exhausted);
        if exhausted > 0 {
            log::warn!(
                "{} of {} elements did not converge within the iteration budget",
                exhausted,
                self.status.len()
            );
        }
    }
}

/// Read-only inputs shared by the first guess and every similarity round.
#[derive(Debug, Clone, Copy)]
pub struct Similarity<'a> {
    pub obs: &'a NormalizedObservation,
    pub thermo: &'a DerivedThermo,
    pub skin: &'a CoolSkin,
    pub parameters: &'a CoareParameters,
}

/// Flux scales from the log-profile law.
pub(crate) struct Scales {
    pub usr: Field,
    pub tsr: Field,
    pub qsr: Field,
}

/// Denominator of the log-profile law, bounded away from zero.
pub(crate) fn log_profile(z: f64, z0: f64, psi: f64) -> f64 {
    ((z / z0).ln() - psi).max(MIN_PROFILE_DENOMINATOR)
}

impl<'a> Similarity<'a> {
    /// Friction, temperature and humidity scales for a given stability and roughness.
    ///
    /// `momentum_psi` selects the velocity profile correction.
    pub(crate) fn scales(
        &self,
        momentum_psi: fn(f64) -> f64,
        zet: &Field,
        zo: &Field,
        zot: &Field,
        zoq: &Field,
        wind: &Field,
        dter: &Field,
    ) -> Scales {
        let obs = self.obs;
        let von = self.parameters.von_karman;
        let limit = self.parameters.zeta_limit;
        let factor = self.skin.factor;

        let psi_u = evaluate(momentum_psi, zet, limit);
        let psi_t = evaluate(psit_26, &(zet * &obs.temperature_height / &obs.wind_height), limit);
        let psi_q = evaluate(psit_26, &(zet * &obs.humidity_height / &obs.wind_height), limit);

        let usr = Zip::from(wind)
            .and(&obs.wind_height)
            .and(zo)
            .and(&psi_u)
            .map_collect(|&s, &zu, &zo, &psi| von * s / log_profile(zu, zo, psi));
        let tsr = Zip::from(&self.thermo.temperature_difference)
            .and(dter)
            .and(&obs.temperature_height)
            .and(zot)
            .and(&psi_t)
            .map_collect(|&dt, &dter, &zt, &zot, &psi| {
                -(dt - dter * factor) * von * PRANDTL_TURBULENT / log_profile(zt, zot, psi)
            });
        let humidity_depression = &self.skin.wetc * dter * factor;
        let qsr = Zip::from(&self.thermo.humidity_difference)
            .and(&humidity_depression)
            .and(&obs.humidity_height)
            .and(zoq)
            .and(&psi_q)
            .map_collect(|&dq, &dqer, &zq, &zoq, &psi| {
                -(dq - dqer) * von * PRANDTL_TURBULENT / log_profile(zq, zoq, psi)
            });

        Scales { usr, tsr, qsr }
    }

    /// Stability parameter $\zeta = \kappa g z_u (t_* + 0.61 T_a q_*) / (T_a u_*^2)$.
    pub(crate) fn stability(&self, usr: &Field, tsr: &Field, qsr: &Field) -> Field {
        let von = self.parameters.von_karman;
        let virtual_scale = Zip::from(&self.thermo.air_temperature_kelvin)
            .and(tsr)
            .and(qsr)
            .map_collect(|&ta, &tsr, &qsr| (tsr + 0.61 * ta * qsr) / ta);
        Zip::from(&self.thermo.gravity)
            .and(&self.obs.wind_height)
            .and(usr)
            .and(&virtual_scale)
            .map_collect(|&g, &zu, &usr, &tv| von * g * zu * tv / (usr * usr))
    }

    /// Charnock parameter from the 10 m neutral wind of the current scales.
    pub(crate) fn charnock(&self, u10n: &Field, usr: &Field) -> Field {
        Zip::from(u10n)
            .and(usr)
            .and(&self.thermo.gravity)
            .and(&self.obs.wave_phase_speed)
            .and(&self.obs.wave_height)
            .map_collect(|&u10n, &usr, &g, &cp, &sigh| charnock(u10n, usr, g, cp, sigh))
    }

    /// One similarity round: the candidate state that follows `state`.
    pub fn refine(&self, state: &IterationState) -> IterationState {
        let obs = self.obs;
        let thermo = self.thermo;
        let params = self.parameters;

        let zo = Zip::from(&state.charnock)
            .and(&state.usr)
            .and(&thermo.gravity)
            .and(&thermo.viscosity)
            .map_collect(|&charn, &usr, &g, &visa| momentum_roughness(charn, usr, g, visa));
        let zot = Zip::from(&zo)
            .and(&state.usr)
            .and(&thermo.viscosity)
            .map_collect(|&zo, &usr, &visa| scalar_roughness(zo, usr, visa));
        let zoq = zot.clone();

        let Scales { usr, tsr, qsr } =
            self.scales(psiu_26, &state.zet, &zo, &zot, &zoq, &state.wind, &state.dter);

        // Convective gustiness from the surface buoyancy flux
        let buoyancy = Zip::from(&thermo.gravity)
            .and(&thermo.air_temperature_kelvin)
            .and(&usr)
            .and(&tsr)
            .and(&qsr)
            .map_collect(|&g, &ta, &usr, &tsr, &qsr| -g / ta * usr * (tsr + 0.61 * ta * qsr));
        let (beta, min_gust) = (params.gustiness, params.min_gust);
        let wind = Zip::from(&obs.wind_speed)
            .and(&buoyancy)
            .and(&obs.boundary_layer_height)
            .map_collect(|&u, &bf, &zi| {
                let gust = if bf > 0.0 {
                    beta * (bf * zi).powf(0.333)
                } else {
                    min_gust
                };
                (u * u + gust * gust).sqrt()
            });

        let sensible = -(&thermo.air_density * thermo.specific_heat) * &usr * &tsr;
        let latent = -(&thermo.air_density * &thermo.latent_heat) * &usr * &qsr;
        let skin = self
            .skin
            .respond(thermo, &usr, &sensible, &latent, &state.tkt, &state.rnl);

        let von = params.von_karman;
        let u10n = Zip::from(&usr)
            .and(&obs.wind_speed)
            .and(&wind)
            .and(&zo)
            .map_collect(|&usr, &u, &s, &zo| usr / von * (u / s) * (STANDARD_HEIGHT / zo).ln());
        let charnock = self.charnock(&u10n, &usr);
        let zet = self.stability(&usr, &tsr, &qsr);

        IterationState {
            usr,
            tsr,
            qsr,
            zet,
            zo,
            zot,
            zoq,
            wind,
            charnock,
            dter: skin.dter,
            dqer: skin.dqer,
            tkt: skin.tkt,
            rnl: skin.rnl,
        }
    }

    /// Iterate from the first guess until every element converges or the budget
    /// runs out.
    pub fn iterate(
        &self,
        guess: FirstGuess,
    ) -> CoareResult<(IterationState, ConvergenceTracker)> {
        let FirstGuess {
            mut state,
            strongly_stable,
        } = guess;
        state.mask_missing(&self.obs.valid);

        let mut tracker = ConvergenceTracker::new(&self.obs.valid);
        // Input and unmixed candidate of the previous round
        let mut history: Option<(IterationState, IterationState)> = None;
        let tolerance = self.parameters.tolerance;
        let limit = self.parameters.zeta_limit;

        for round in 1..=self.parameters.max_iterations {
            let active = tracker.active();
            let n_active = count(&active);
            if n_active == 0 {
                break;
            }
            log::debug!("similarity round {}: {} active elements", round, n_active);

            let mut candidate = self.refine(&state);
            check_finite(&candidate, &active)?;

            // Past the zeta clamp only u* has to settle
            let converged = Zip::from(&candidate.zet)
                .and(&state.zet)
                .and(&candidate.usr)
                .and(&state.usr)
                .and(&strongly_stable)
                .map_collect(|&zet, &zet_prev, &usr, &usr_prev, &frozen| {
                    let saturated = zet.min(zet_prev) >= limit;
                    (frozen && round == 1)
                        || (((zet - zet_prev).abs() <= tolerance * zet.abs().max(1.0) || saturated)
                            && (usr - usr_prev).abs() <= tolerance * usr.max(1e-3))
                });

            let unmixed = candidate.clone();
            if let Some((previous, previous_unmixed)) = &history {
                if round >= ACCELERATION_START {
                    let mix = Zip::from(&active)
                        .and(&converged)
                        .map_collect(|&active, &converged| active && !converged);
                    accelerate(&mut candidate, &state, previous, previous_unmixed, &mix);
                }
            }

            history = Some((state.clone(), unmixed));
            state.commit(&candidate, &active);
            tracker.record(&active, &converged);
        }
        tracker.finish();

        Ok((state, tracker))
    }
}

/// Replace the carried quantities of `candidate` by their Anderson(1) update
/// wherever `mask` is set.
///
/// `candidate` must still hold the unmixed output of the round that started from
/// `state`.
fn accelerate(
    candidate: &mut IterationState,
    state: &IterationState,
    previous: &IterationState,
    previous_unmixed: &IterationState,
    mask: &Mask,
) {
    for index in ndarray::indices(mask.raw_dim()) {
        if !mask[&index] {
            continue;
        }
        let read = |s: &IterationState| s.carried().map(|field| field[&index]);
        let mixed = anderson_step(
            &read(state),
            &read(&*candidate),
            &read(previous),
            &read(previous_unmixed),
        );
        if let Some(mixed) = mixed {
            for (field, value) in candidate.carried_mut().into_iter().zip(mixed) {
                field[&index] = value;
            }
        }
    }
}

/// Weights that bring the residual of each carried quantity to a common scale.
fn residual_weights(g: &[f64; CARRIED]) -> [f64; CARRIED] {
    [
        100.0,
        1.0 / g[1].abs().max(0.01),
        1.0 / g[2].abs().max(1.0),
        1.0,
        10.0,
        1e4,
        0.1,
    ]
}

/// Damped Anderson(1) update of one element.
///
/// `x` is the input of the round and `g` its output, `x_prev` and `g_prev` the
/// same for the round before. Returns `None` when the update would leave u*,
/// the gust-augmented wind or the skin thickness non-positive.
fn anderson_step(
    x: &[f64; CARRIED],
    g: &[f64; CARRIED],
    x_prev: &[f64; CARRIED],
    g_prev: &[f64; CARRIED],
) -> Option<[f64; CARRIED]> {
    let weights = residual_weights(g);
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..CARRIED {
        let r = g[i] - x[i];
        let dr = (r - (g_prev[i] - x_prev[i])) * weights[i];
        numerator += r * weights[i] * dr;
        denominator += dr * dr;
    }
    let gamma = if denominator > 0.0 {
        (numerator / denominator).clamp(-MAX_EXTRAPOLATION, MAX_EXTRAPOLATION)
    } else {
        0.0
    };

    let mut mixed = [0.0; CARRIED];
    for i in 0..CARRIED {
        let r = g[i] - x[i];
        let r_prev = g_prev[i] - x_prev[i];
        mixed[i] = x[i] - gamma * (x[i] - x_prev[i]) + MIXING * (r - gamma * (r - r_prev));
    }
    let (usr, wind, tkt) = (mixed[1], mixed[3], mixed[5]);
    if usr > 0.0 && wind > 0.0 && tkt > 0.0 {
        Some(mixed)
    } else {
        None
    }
}

/// Fail if an active element produced a non-finite scale or stability.
fn check_finite(state: &IterationState, active: &Mask) -> CoareResult<()> {
    for (name, field) in [
        ("usr", &state.usr),
        ("tsr", &state.tsr),
        ("qsr", &state.qsr),
        ("zet", &state.zet),
    ] {
        let bad = Zip::from(field)
            .and(active)
            .fold(false, |bad, &v, &active| bad || (active && !v.is_finite()));
        if bad {
            return Err(CoareError::NonFiniteInput {
                field: name.to_string(),
                reason: "the similarity iteration produced a non-finite value".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_guess::first_guess;
    use crate::observation::{BulkObservation, Humidity};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn solve(
        obs: BulkObservation,
        params: &CoareParameters,
    ) -> (IterationState, ConvergenceTracker) {
        let obs = obs.normalize().unwrap();
        let thermo = DerivedThermo::from_observation(&obs, params).unwrap();
        let skin = CoolSkin::new(&obs, &thermo, params);
        let similarity = Similarity {
            obs: &obs,
            thermo: &thermo,
            skin: &skin,
            parameters: params,
        };
        similarity.iterate(first_guess(&similarity)).unwrap()
    }

    #[test]
    fn test_tracker_transitions() {
        let valid = array![true, true, false].into_dyn();
        let mut tracker = ConvergenceTracker::new(&valid);
        assert_eq!(tracker.count(ConvergenceStatus::Active), 2);
        assert_eq!(tracker.count(ConvergenceStatus::Missing), 1);

        let active = tracker.active();
        tracker.record(&active, &array![true, false, true].into_dyn());
        assert_eq!(tracker.status[[0]], ConvergenceStatus::Converged);
        assert_eq!(tracker.status[[1]], ConvergenceStatus::Active);
        assert_eq!(tracker.status[[2]], ConvergenceStatus::Missing);
        assert_eq!(tracker.iterations, array![1u32, 1, 0].into_dyn());

        tracker.finish();
        assert_eq!(tracker.status[[1]], ConvergenceStatus::Exhausted);
        assert_eq!(tracker.status[[0]], ConvergenceStatus::Converged);
    }

    fn uniform(f: &Field) -> IterationState {
        IterationState {
            usr: f.clone(),
            tsr: f.clone(),
            qsr: f.clone(),
            zet: f.clone(),
            zo: f.clone(),
            zot: f.clone(),
            zoq: f.clone(),
            wind: f.clone(),
            charnock: f.clone(),
            dter: f.clone(),
            dqer: f.clone(),
            tkt: f.clone(),
            rnl: f.clone(),
        }
    }

    #[test]
    fn test_commit_only_touches_masked_elements() {
        let zeros = Field::zeros(IxDyn(&[2]));
        let ones = Field::ones(IxDyn(&[2]));
        let mut state = uniform(&zeros);
        state.commit(&uniform(&ones), &array![false, true].into_dyn());
        for field in state.fields() {
            assert_eq!(field, &array![0.0, 1.0].into_dyn());
        }

        state.mask_missing(&array![true, false].into_dyn());
        assert_eq!(state.usr[[0]], 0.0);
        assert!(state.usr[[1]].is_nan());
    }

    #[test]
    fn test_non_finite_values_fail_only_when_active() {
        let mut state = uniform(&Field::ones(IxDyn(&[2])));
        state.usr[[1]] = f64::NAN;
        state.zet[[0]] = f64::INFINITY;

        match check_finite(&state, &array![false, true].into_dyn()) {
            Err(CoareError::NonFiniteInput { field, .. }) => assert_eq!(field, "usr"),
            other => panic!("expected a non-finite error, got {:?}", other),
        }
        match check_finite(&state, &array![true, false].into_dyn()) {
            Err(CoareError::NonFiniteInput { field, .. }) => assert_eq!(field, "zet"),
            other => panic!("expected a non-finite error, got {:?}", other),
        }

        state.zet[[0]] = 0.5;
        assert!(check_finite(&state, &array![true, false].into_dyn()).is_ok());
    }

    /// Element of a linear map $G(x) = x^* + \lambda (x - x^*)$.
    fn linear_map(fixed: &[f64; CARRIED], lambda: f64, x: &[f64; CARRIED]) -> [f64; CARRIED] {
        let mut g = [0.0; CARRIED];
        for i in 0..CARRIED {
            g[i] = fixed[i] + lambda * (x[i] - fixed[i]);
        }
        g
    }

    #[test]
    fn test_anderson_step_lands_on_linear_fixed_point() {
        // Plain iteration diverges for lambda = -3
        let fixed = [0.01, 0.3, 1.5, 5.0, 0.2, 1e-3, 50.0];
        let offset = [1e-3, 0.02, 0.4, 0.1, 0.05, 2e-4, 3.0];
        let mut x = [0.0; CARRIED];
        let mut x_prev = [0.0; CARRIED];
        for i in 0..CARRIED {
            x[i] = fixed[i] + offset[i];
            x_prev[i] = fixed[i] + 0.5 * offset[i];
        }
        let g = linear_map(&fixed, -3.0, &x);
        let g_prev = linear_map(&fixed, -3.0, &x_prev);

        let mixed = anderson_step(&x, &g, &x_prev, &g_prev).unwrap();
        for i in 0..CARRIED {
            assert_relative_eq!(mixed[i], fixed[i], max_relative = 1e-10);
        }
    }

    #[test]
    fn test_anderson_step_rejects_non_positive_friction_velocity() {
        let fixed = [0.01, -0.1, 1.5, 5.0, 0.2, 1e-3, 50.0];
        let x = [0.011, 0.05, 1.6, 5.1, 0.25, 1.2e-3, 52.0];
        let x_prev = [0.0105, -0.025, 1.55, 5.05, 0.225, 1.1e-3, 51.0];
        let g = linear_map(&fixed, -3.0, &x);
        let g_prev = linear_map(&fixed, -3.0, &x_prev);

        assert!(anderson_step(&x, &g, &x_prev, &g_prev).is_none());
    }

    #[test]
    fn test_iteration_converges() {
        let obs = BulkObservation::new(
            array![2.0, 8.0, 15.0],
            10.0,
            array![25.0, 20.0, 18.0],
            2.0,
            Humidity::relative(80.0),
            2.0,
            20.0,
        );
        let (state, tracker) = solve(obs, &CoareParameters::default());

        assert_eq!(tracker.count(ConvergenceStatus::Converged), 3);
        assert!(tracker.iterations.iter().all(|&n| n >= 1 && n <= 20));
        assert!(state.usr.iter().all(|&u| u > 0.0));
        // Warm air over cool water is stable, cool air over warm water unstable
        assert!(state.zet[[0]] > 0.0);
        assert!(state.zet[[2]] < 0.0);
    }

    #[test]
    fn test_light_wind_over_cold_water_converges() {
        // Plain iteration cycles here between stable and unstable zeta
        let obs = BulkObservation::new(1.0, 10.0, 1.0, 2.0, Humidity::relative(50.0), 2.0, 0.0);
        let (state, tracker) = solve(obs, &CoareParameters::default());

        assert_eq!(tracker.count(ConvergenceStatus::Converged), 1);
        assert!(tracker.iterations.iter().all(|&n| n > ACCELERATION_START as u32));
        assert!(state.zet.iter().all(|&z| z > 0.0));
    }

    #[test]
    fn test_missing_elements_are_not_iterated() {
        let obs = BulkObservation::new(
            array![8.0, f64::NAN],
            10.0,
            20.0,
            2.0,
            Humidity::relative(80.0),
            2.0,
            21.0,
        );
        let (state, tracker) = solve(obs, &CoareParameters::default());

        assert_eq!(tracker.status[[1]], ConvergenceStatus::Missing);
        assert_eq!(tracker.iterations[[1]], 0);
        assert!(state.usr[[1]].is_nan());
        assert!(state.usr[[0]].is_finite());
    }

    #[test]
    fn test_budget_exhaustion() {
        let params = CoareParameters {
            max_iterations: 1,
            tolerance: 1e-14,
            ..Default::default()
        };
        let obs = BulkObservation::new(8.0, 10.0, 20.0, 2.0, Humidity::relative(80.0), 2.0, 23.0);
        let (_, tracker) = solve(obs, &params);

        assert_eq!(tracker.count(ConvergenceStatus::Exhausted), 1);
        assert_eq!(tracker.iterations.iter().copied().next(), Some(1));
    }
}
