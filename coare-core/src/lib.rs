//! COARE3.5 bulk air-sea flux algorithm
//!
//! Computes the turbulent exchange of momentum, sensible heat and latent heat
//! between the ocean and the atmosphere from bulk meteorological observations
//! (Fairall et al. 2003; Edson et al. 2013). Inputs are scalars or N-D arrays that
//! broadcast against each other; every output has the broadcast shape.
//!
//! The solve runs in four stages:
//!
//! 1. [`observation`]: validate and broadcast the inputs, fill defaults
//! 2. [`thermo`], [`cool_skin`], [`first_guess`]: derived thermodynamics and a
//!    neutral-start first guess
//! 3. [`solver`]: masked element-wise Monin-Obukhov similarity iteration
//! 4. [`fluxes`]: fluxes, transfer coefficients and height-adjusted diagnostics
//!
//! # Examples
//!
//! ```rust
//! use coare_core::{BulkObservation, Coare35, Humidity};
//!
//! let obs = BulkObservation::new(10.0, 10.0, 20.0, 3.0, Humidity::relative(80.0), 3.0, 20.0);
//! let result = Coare35::default().solve(&obs).unwrap();
//!
//! let tau = result.stress.iter().copied().next().unwrap();
//! assert!(tau > 0.1 && tau < 0.2);
//! ```

pub mod constants;
pub mod cool_skin;
pub mod errors;
pub mod field;
pub mod first_guess;
pub mod fluxes;
pub mod observation;
pub mod parameters;
pub mod roughness;
pub mod solver;
pub mod stability;
pub mod thermo;

pub use errors::{CoareError, CoareResult};
pub use fluxes::FluxResult;
pub use observation::{BulkObservation, Humidity};
pub use parameters::CoareParameters;
pub use solver::ConvergenceStatus;

use cool_skin::CoolSkin;
use first_guess::first_guess;
use serde::{Deserialize, Serialize};
use solver::Similarity;
use thermo::DerivedThermo;

/// COARE3.5 bulk flux solver.
///
/// Holds only the parameters; every call to [`Coare35::solve`] is independent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coare35 {
    parameters: CoareParameters,
}

impl Coare35 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: CoareParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &CoareParameters {
        &self.parameters
    }

    /// Compute fluxes and diagnostics for an observation.
    ///
    /// Fails on incompatible shapes, out-of-domain inputs or invalid parameters.
    /// Elements that do not converge are reported through
    /// [`FluxResult::status`], not as an error.
    pub fn solve(&self, observation: &BulkObservation) -> CoareResult<FluxResult> {
        self.parameters.validate()?;
        let obs = observation.normalize()?;
        log::debug!(
            "solving COARE3.5 for shape {:?} ({} elements)",
            obs.shape,
            obs.len()
        );

        let thermo = DerivedThermo::from_observation(&obs, &self.parameters)?;
        let skin = CoolSkin::new(&obs, &thermo, &self.parameters);
        let similarity = Similarity {
            obs: &obs,
            thermo: &thermo,
            skin: &skin,
            parameters: &self.parameters,
        };

        let (state, tracker) = similarity.iterate(first_guess(&similarity))?;
        Ok(FluxResult::assemble(&similarity, state, tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Coare35>();
    }

    #[test]
    fn test_invalid_parameters_rejected_before_solving() {
        let solver = Coare35::from_parameters(CoareParameters {
            tolerance: 0.0,
            ..Default::default()
        });
        let obs = BulkObservation::new(8.0, 10.0, 20.0, 2.0, Humidity::relative(80.0), 2.0, 21.0);
        assert!(matches!(
            solver.solve(&obs),
            Err(CoareError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let solver = Coare35::from_parameters(CoareParameters {
            max_iterations: 12,
            ..Default::default()
        });
        let json = serde_json::to_string(&solver).expect("Serialization failed");
        let parsed: Coare35 = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(parsed.parameters(), solver.parameters());
    }
}
