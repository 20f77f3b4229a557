//! COARE3.5 parameters
//!
//! Tunable constants and iteration controls for the bulk flux solver.

use crate::errors::{CoareError, CoareResult};
use serde::{Deserialize, Serialize};

/// Parameters for the COARE3.5 bulk flux solver.
///
/// Every constant that the published algorithm keeps as a module-level value is
/// carried here so concurrent solves with different physics do not interfere.
///
/// # Default Values
///
/// Defaults match the published COARE3.5 code, apart from the iteration budget
/// which is a convergence-controlled maximum rather than a fixed count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoareParameters {
    // Iteration controls
    /// Maximum number of similarity rounds before an element is reported as exhausted.
    /// Default: 20
    pub max_iterations: usize,

    /// Convergence tolerance on the stability parameter $\zeta = z_u / L$.
    ///
    /// Absolute for $|\zeta| \le 1$, relative above. The same tolerance is applied
    /// relative to the friction velocity.
    /// Default: 1e-4
    pub tolerance: f64,

    // Physical constants
    /// Charnock parameter used for the first-guess momentum roughness.
    /// Default: 0.011
    pub charnock: f64,

    /// Convective gustiness coefficient $\beta$.
    /// Default: 1.2
    pub gustiness: f64,

    /// Gust velocity used when the surface buoyancy flux is not positive (m/s).
    /// Default: 0.2
    pub min_gust: f64,

    /// von Kármán constant.
    /// Default: 0.4
    pub von_karman: f64,

    /// Gravitational acceleration (m/s^2).
    ///
    /// When unset, gravity is computed from latitude with the WGS84 formula.
    /// Default: None
    pub gravity: Option<f64>,

    /// Bound applied to $|\zeta|$ before the stability functions are evaluated.
    /// Default: 50.0
    pub zeta_limit: f64,

    /// Reference height for the `*_reference` diagnostics (m).
    /// Default: 10.0
    pub reference_height: f64,

    // Surface radiation
    /// Apply the cool-skin correction. Disable when the sea temperature input is
    /// already a skin temperature.
    /// Default: true
    pub cool_skin: bool,

    /// Sea surface shortwave albedo.
    /// Default: 0.055
    pub albedo: f64,

    /// Sea surface longwave emissivity.
    /// Default: 0.97
    pub emissivity: f64,
}

impl Default for CoareParameters {
    fn default() -> Self {
        Self {
            // Iteration
            max_iterations: 20,
            tolerance: 1e-4,

            // Physics
            charnock: 0.011,
            gustiness: 1.2,
            min_gust: 0.2,
            von_karman: 0.4,
            gravity: None,
            zeta_limit: 50.0,
            reference_height: 10.0,

            // Radiation
            cool_skin: true,
            albedo: 0.055,
            emissivity: 0.97,
        }
    }
}

impl CoareParameters {
    /// Parse parameters from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> CoareResult<Self> {
        let parameters: Self = toml::from_str(source)?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Check that every parameter is physically meaningful.
    pub fn validate(&self) -> CoareResult<()> {
        if self.max_iterations == 0 {
            return Err(CoareError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        let positive = [
            ("tolerance", self.tolerance),
            ("charnock", self.charnock),
            ("von_karman", self.von_karman),
            ("zeta_limit", self.zeta_limit),
            ("reference_height", self.reference_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoareError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("gustiness", self.gustiness),
            ("min_gust", self.min_gust),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CoareError::InvalidConfig(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [("albedo", self.albedo), ("emissivity", self.emissivity)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoareError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if let Some(g) = self.gravity {
            if !(g.is_finite() && g > 0.0) {
                return Err(CoareError::InvalidConfig(format!(
                    "gravity must be positive and finite, got {}",
                    g
                )));
            }
        }
        Ok(())
    }

    /// Multiplier applied to the cool-skin depressions (1 when enabled, 0 otherwise).
    pub fn cool_skin_factor(&self) -> f64 {
        if self.cool_skin {
            1.0
        } else {
            0.0
        }
    }
}
