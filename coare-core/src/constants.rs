//! Physical constants of the COARE3.5 algorithm.
//!
//! Tunable constants (von Kármán, Charnock, gustiness, ...) live in
//! [`crate::parameters::CoareParameters`] instead.

/// Offset between Celsius and the Kelvin scale used by COARE (K).
pub const KELVIN_OFFSET: f64 = 273.16;

/// Gas constant of dry air (J/kg/K).
pub const GAS_CONSTANT_DRY_AIR: f64 = 287.1;

/// Specific heat of dry air at constant pressure (J/kg/K).
pub const SPECIFIC_HEAT_AIR: f64 = 1004.67;

/// Stefan-Boltzmann constant (W/m^2/K^4).
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

/// Turbulent Prandtl number.
pub const PRANDTL_TURBULENT: f64 = 1.0;

/// Dry adiabatic lapse rate applied to the air temperature height (K/m).
pub const ADIABATIC_LAPSE: f64 = 0.0098;

// Sea water properties used by the cool-skin model
/// Specific heat of sea water (J/kg/K).
pub const SPECIFIC_HEAT_WATER: f64 = 4000.0;
/// Density of sea water (kg/m^3).
pub const DENSITY_WATER: f64 = 1022.0;
/// Kinematic viscosity of sea water (m^2/s).
pub const VISCOSITY_WATER: f64 = 1e-6;
/// Thermal conductivity of sea water (W/m/K).
pub const CONDUCTIVITY_WATER: f64 = 0.6;
/// Saltwater expansion coefficient factor for the cool-skin buoyancy term.
pub const SALINITY_EXPANSION: f64 = 0.026;

/// Floor and ceiling for every roughness length (m).
pub const ROUGHNESS_FLOOR: f64 = 1e-10;
pub const ROUGHNESS_CEILING: f64 = 1.0;

/// Smallest allowed denominator of the log-profile law.
pub const MIN_PROFILE_DENOMINATOR: f64 = 1e-3;

/// Standard height of the 10 m neutral wind and transfer coefficients (m).
pub const STANDARD_HEIGHT: f64 = 10.0;
