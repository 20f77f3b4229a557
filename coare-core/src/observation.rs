//! Bulk meteorological observations
//!
//! A [`BulkObservation`] holds every input of the algorithm as a scalar or an
//! N-D array. [`BulkObservation::normalize`] validates the physical domain of each
//! input, co-broadcasts them to one shape with NumPy broadcasting rules and fills
//! optional inputs with their defaults.
//!
//! # Examples
//!
//! ```rust
//! use coare_core::observation::{BulkObservation, Humidity};
//! use ndarray::array;
//!
//! let obs = BulkObservation::new(
//!     array![[5.0, 8.0, 12.0]],   // wind speed, shape (1, 3)
//!     10.0,                       // wind measured at 10 m
//!     array![[20.0], [22.0]],     // air temperature, shape (2, 1)
//!     2.0,
//!     Humidity::relative(80.0),
//!     2.0,
//!     25.0,                       // sea temperature
//! )
//! .with_pressure(1010.0);
//!
//! let normalized = obs.normalize().unwrap();
//! assert_eq!(normalized.shape, vec![2, 3]);
//! ```

use crate::errors::{CoareError, CoareResult};
use crate::field::{filled, Field, Mask};
use ndarray::{arr0, Array, Array1, Dimension, IxDyn, Zip};

/// Sea-level pressure used when none is supplied (mb).
pub const DEFAULT_PRESSURE: f64 = 1015.0;
/// Downward shortwave radiation used when none is supplied (W/m^2).
pub const DEFAULT_SHORTWAVE: f64 = 150.0;
/// Climatological downward longwave radiation used when none is supplied (W/m^2).
pub const DEFAULT_LONGWAVE: f64 = 370.0;
/// Latitude used when none is supplied (degrees north).
pub const DEFAULT_LATITUDE: f64 = 0.0;
/// Atmospheric boundary layer height used when none is supplied (m).
pub const DEFAULT_BOUNDARY_LAYER_HEIGHT: f64 = 600.0;
/// Rain rate used when none is supplied (mm/h).
pub const DEFAULT_RAIN_RATE: f64 = 0.0;

/// Conversion of the supported input containers into a [`Field`].
pub trait IntoField {
    fn into_field(self) -> Field;
}

impl IntoField for f64 {
    fn into_field(self) -> Field {
        arr0(self).into_dyn()
    }
}

impl<D: Dimension> IntoField for Array<f64, D> {
    fn into_field(self) -> Field {
        self.into_dyn()
    }
}

impl IntoField for Vec<f64> {
    fn into_field(self) -> Field {
        Array1::from_vec(self).into_dyn()
    }
}

/// Air humidity at height `zq`.
#[derive(Debug, Clone, PartialEq)]
pub enum Humidity {
    /// Relative humidity (%)
    Relative(Field),
    /// Specific humidity (kg/kg)
    Specific(Field),
}

impl Humidity {
    pub fn relative(value: impl IntoField) -> Self {
        Humidity::Relative(value.into_field())
    }

    pub fn specific(value: impl IntoField) -> Self {
        Humidity::Specific(value.into_field())
    }

    fn field(&self) -> &Field {
        match self {
            Humidity::Relative(f) | Humidity::Specific(f) => f,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Humidity::Relative(_) => "relative_humidity",
            Humidity::Specific(_) => "specific_humidity",
        }
    }
}

/// Bulk meteorological inputs of one solve.
///
/// Required inputs are set by [`BulkObservation::new`]; optional inputs through the
/// `with_*` builder methods. NaN marks missing data: a NaN in a required input
/// excludes that element from the solve, a NaN in an optional input is replaced by
/// the input's default.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkObservation {
    /// Wind speed relative to the sea surface (m/s)
    pub wind_speed: Field,
    /// Height of the wind measurement (m)
    pub wind_height: Field,
    /// Air temperature (°C)
    pub air_temperature: Field,
    /// Height of the air temperature measurement (m)
    pub temperature_height: Field,
    /// Air humidity
    pub humidity: Humidity,
    /// Height of the humidity measurement (m)
    pub humidity_height: Field,
    /// Sea temperature (°C), bulk unless the cool skin is disabled
    pub sea_temperature: Field,
    /// Sea-level air pressure (mb)
    pub pressure: Option<Field>,
    /// Downward shortwave radiation (W/m^2)
    pub shortwave_down: Option<Field>,
    /// Downward longwave radiation (W/m^2)
    pub longwave_down: Option<Field>,
    /// Latitude (degrees north)
    pub latitude: Option<Field>,
    /// Atmospheric boundary layer height (m)
    pub boundary_layer_height: Option<Field>,
    /// Rain rate (mm/h)
    pub rain_rate: Option<Field>,
    /// Phase speed of the dominant waves (m/s)
    pub wave_phase_speed: Option<Field>,
    /// Significant wave height (m)
    pub wave_height: Option<Field>,
}

impl BulkObservation {
    pub fn new(
        wind_speed: impl IntoField,
        wind_height: impl IntoField,
        air_temperature: impl IntoField,
        temperature_height: impl IntoField,
        humidity: Humidity,
        humidity_height: impl IntoField,
        sea_temperature: impl IntoField,
    ) -> Self {
        Self {
            wind_speed: wind_speed.into_field(),
            wind_height: wind_height.into_field(),
            air_temperature: air_temperature.into_field(),
            temperature_height: temperature_height.into_field(),
            humidity,
            humidity_height: humidity_height.into_field(),
            sea_temperature: sea_temperature.into_field(),
            pressure: None,
            shortwave_down: None,
            longwave_down: None,
            latitude: None,
            boundary_layer_height: None,
            rain_rate: None,
            wave_phase_speed: None,
            wave_height: None,
        }
    }

    pub fn with_pressure(mut self, value: impl IntoField) -> Self {
        self.pressure = Some(value.into_field());
        self
    }

    pub fn with_shortwave_down(mut self, value: impl IntoField) -> Self {
        self.shortwave_down = Some(value.into_field());
        self
    }

    pub fn with_longwave_down(mut self, value: impl IntoField) -> Self {
        self.longwave_down = Some(value.into_field());
        self
    }

    pub fn with_latitude(mut self, value: impl IntoField) -> Self {
        self.latitude = Some(value.into_field());
        self
    }

    pub fn with_boundary_layer_height(mut self, value: impl IntoField) -> Self {
        self.boundary_layer_height = Some(value.into_field());
        self
    }

    pub fn with_rain_rate(mut self, value: impl IntoField) -> Self {
        self.rain_rate = Some(value.into_field());
        self
    }

    pub fn with_wave_phase_speed(mut self, value: impl IntoField) -> Self {
        self.wave_phase_speed = Some(value.into_field());
        self
    }

    pub fn with_wave_height(mut self, value: impl IntoField) -> Self {
        self.wave_height = Some(value.into_field());
        self
    }

    fn required_fields(&self) -> [(&'static str, &Field); 7] {
        [
            ("wind_speed", &self.wind_speed),
            ("wind_height", &self.wind_height),
            ("air_temperature", &self.air_temperature),
            ("temperature_height", &self.temperature_height),
            (self.humidity.name(), self.humidity.field()),
            ("humidity_height", &self.humidity_height),
            ("sea_temperature", &self.sea_temperature),
        ]
    }

    fn optional_fields(&self) -> [(&'static str, Option<&Field>); 8] {
        [
            ("pressure", self.pressure.as_ref()),
            ("shortwave_down", self.shortwave_down.as_ref()),
            ("longwave_down", self.longwave_down.as_ref()),
            ("latitude", self.latitude.as_ref()),
            ("boundary_layer_height", self.boundary_layer_height.as_ref()),
            ("rain_rate", self.rain_rate.as_ref()),
            ("wave_phase_speed", self.wave_phase_speed.as_ref()),
            ("wave_height", self.wave_height.as_ref()),
        ]
    }

    /// Common broadcast shape of every supplied input.
    pub fn broadcast_shape(&self) -> CoareResult<Vec<usize>> {
        let present = self
            .required_fields()
            .into_iter()
            .chain(
                self.optional_fields()
                    .into_iter()
                    .filter_map(|(name, field)| field.map(|f| (name, f))),
            );

        let mut shape: Vec<usize> = Vec::new();
        for (name, field) in present {
            shape = broadcast_shapes(&shape, field.shape()).ok_or_else(|| {
                CoareError::ShapeMismatch {
                    field: name.to_string(),
                    shape: field.shape().to_vec(),
                    target: shape.clone(),
                }
            })?;
        }
        Ok(shape)
    }

    /// Check every supplied value against its physical domain.
    ///
    /// NaN is treated as missing data and always accepted.
    pub fn validate(&self) -> CoareResult<()> {
        check_domain("wind_speed", &self.wind_speed, |u| u >= 0.0, "must be >= 0 m/s")?;
        for (name, height) in [
            ("wind_height", &self.wind_height),
            ("temperature_height", &self.temperature_height),
            ("humidity_height", &self.humidity_height),
        ] {
            check_domain(name, height, |z| z > 0.0, "heights must be > 0 m")?;
        }
        check_domain(
            "air_temperature",
            &self.air_temperature,
            above_absolute_zero,
            "must be above absolute zero",
        )?;
        check_domain(
            "sea_temperature",
            &self.sea_temperature,
            above_absolute_zero,
            "must be above absolute zero",
        )?;
        check_domain(
            self.humidity.name(),
            self.humidity.field(),
            |h| h >= 0.0,
            "must be >= 0",
        )?;

        let optional: [(&str, Option<&Field>, fn(f64) -> bool, &str); 8] = [
            ("pressure", self.pressure.as_ref(), |p| p > 0.0, "must be > 0 mb"),
            (
                "shortwave_down",
                self.shortwave_down.as_ref(),
                |_| true,
                "",
            ),
            ("longwave_down", self.longwave_down.as_ref(), |_| true, ""),
            (
                "latitude",
                self.latitude.as_ref(),
                |lat| lat.abs() <= 90.0,
                "must lie within [-90, 90] degrees",
            ),
            (
                "boundary_layer_height",
                self.boundary_layer_height.as_ref(),
                |zi| zi > 0.0,
                "must be > 0 m",
            ),
            ("rain_rate", self.rain_rate.as_ref(), |r| r >= 0.0, "must be >= 0 mm/h"),
            (
                "wave_phase_speed",
                self.wave_phase_speed.as_ref(),
                |c| c > 0.0,
                "must be > 0 m/s",
            ),
            (
                "wave_height",
                self.wave_height.as_ref(),
                |h| h >= 0.0,
                "must be >= 0 m",
            ),
        ];
        for (name, field, valid, reason) in optional {
            if let Some(field) = field {
                check_domain(name, field, valid, reason)?;
            }
        }
        Ok(())
    }

    /// Validate and broadcast every input onto the common shape.
    pub fn normalize(&self) -> CoareResult<NormalizedObservation> {
        let shape = self.broadcast_shape()?;
        self.validate()?;

        let required = |name: &str, field: &Field| broadcast_to(name, field, &shape);
        let optional = |name: &str, field: &Option<Field>, default: f64| -> CoareResult<Field> {
            match field {
                Some(field) => Ok(broadcast_to(name, field, &shape)?
                    .mapv_into(|v| if v.is_nan() { default } else { v })),
                None => Ok(filled(&shape, default)),
            }
        };

        let humidity = match &self.humidity {
            Humidity::Relative(f) => Humidity::Relative(required("relative_humidity", f)?),
            Humidity::Specific(f) => Humidity::Specific(required("specific_humidity", f)?),
        };

        let normalized = NormalizedObservation {
            wind_speed: required("wind_speed", &self.wind_speed)?,
            wind_height: required("wind_height", &self.wind_height)?,
            air_temperature: required("air_temperature", &self.air_temperature)?,
            temperature_height: required("temperature_height", &self.temperature_height)?,
            humidity,
            humidity_height: required("humidity_height", &self.humidity_height)?,
            sea_temperature: required("sea_temperature", &self.sea_temperature)?,
            pressure: optional("pressure", &self.pressure, DEFAULT_PRESSURE)?,
            shortwave_down: optional("shortwave_down", &self.shortwave_down, DEFAULT_SHORTWAVE)?,
            longwave_down: optional("longwave_down", &self.longwave_down, DEFAULT_LONGWAVE)?,
            latitude: optional("latitude", &self.latitude, DEFAULT_LATITUDE)?,
            boundary_layer_height: optional(
                "boundary_layer_height",
                &self.boundary_layer_height,
                DEFAULT_BOUNDARY_LAYER_HEIGHT,
            )?,
            rain_rate: optional("rain_rate", &self.rain_rate, DEFAULT_RAIN_RATE)?,
            wave_phase_speed: optional("wave_phase_speed", &self.wave_phase_speed, f64::NAN)?,
            wave_height: optional("wave_height", &self.wave_height, f64::NAN)?,
            valid: Mask::from_elem(IxDyn(&shape), true),
            shape,
        };
        Ok(normalized.with_valid_mask())
    }
}

/// Observation broadcast onto one shape with defaults applied.
///
/// Absent wave inputs are NaN, meaning the wind-speed Charnock relation is used.
#[derive(Debug, Clone)]
pub struct NormalizedObservation {
    pub shape: Vec<usize>,
    pub wind_speed: Field,
    pub wind_height: Field,
    pub air_temperature: Field,
    pub temperature_height: Field,
    pub humidity: Humidity,
    pub humidity_height: Field,
    pub sea_temperature: Field,
    pub pressure: Field,
    pub shortwave_down: Field,
    pub longwave_down: Field,
    pub latitude: Field,
    pub boundary_layer_height: Field,
    pub rain_rate: Field,
    pub wave_phase_speed: Field,
    pub wave_height: Field,
    /// False where any required input is missing (NaN)
    pub valid: Mask,
}

impl NormalizedObservation {
    fn with_valid_mask(mut self) -> Self {
        let required = [
            &self.wind_speed,
            &self.wind_height,
            &self.air_temperature,
            &self.temperature_height,
            self.humidity.field(),
            &self.humidity_height,
            &self.sea_temperature,
        ];
        let mut valid = self.valid.clone();
        for field in required {
            Zip::from(&mut valid)
                .and(field)
                .for_each(|v, &x| *v = *v && x.is_finite());
        }
        self.valid = valid;
        self
    }

    /// Number of elements in the broadcast shape.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Humidity field broadcast to the common shape, with its unit tag.
    pub fn humidity(&self) -> &Humidity {
        &self.humidity
    }
}

fn above_absolute_zero(t: f64) -> bool {
    t > -crate::constants::KELVIN_OFFSET
}

fn check_domain(
    name: &str,
    field: &Field,
    valid: impl Fn(f64) -> bool,
    reason: &str,
) -> CoareResult<()> {
    if let Some(bad) = field
        .iter()
        .copied()
        .find(|&v| v.is_infinite() || !(v.is_nan() || valid(v)))
    {
        let reason = if bad.is_infinite() {
            format!("non-finite value {}", bad)
        } else {
            format!("{} (got {})", reason, bad)
        };
        return Err(CoareError::NonFiniteInput {
            field: name.to_string(),
            reason,
        });
    }
    Ok(())
}

/// Co-broadcast two shapes following NumPy rules. `None` if incompatible.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let pad_a = ndim - a.len();
    let pad_b = ndim - b.len();
    (0..ndim)
        .map(|i| {
            let da = if i < pad_a { 1 } else { a[i - pad_a] };
            let db = if i < pad_b { 1 } else { b[i - pad_b] };
            match (da, db) {
                (x, y) if x == y => Some(x),
                (1, y) => Some(y),
                (x, 1) => Some(x),
                _ => None,
            }
        })
        .collect()
}

fn broadcast_to(name: &str, field: &Field, shape: &[usize]) -> CoareResult<Field> {
    field
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| CoareError::ShapeMismatch {
            field: name.to_string(),
            shape: field.shape().to_vec(),
            target: shape.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn scalar_observation() -> BulkObservation {
        BulkObservation::new(10.0, 10.0, 20.0, 3.0, Humidity::relative(80.0), 3.0, 20.0)
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[], &[3]), Some(vec![3]));
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[4, 2, 3], &[3]), Some(vec![4, 2, 3]));
        assert_eq!(broadcast_shapes(&[2], &[3]), None);
    }

    #[test]
    fn test_scalar_inputs_normalize_to_zero_dimensions() {
        let obs = scalar_observation().normalize().unwrap();
        assert!(obs.shape.is_empty());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs.pressure.iter().copied().next(), Some(DEFAULT_PRESSURE));
        assert_eq!(obs.longwave_down.iter().copied().next(), Some(DEFAULT_LONGWAVE));
        assert_eq!(obs.latitude.iter().copied().next(), Some(DEFAULT_LATITUDE));
        assert_eq!(obs.rain_rate.iter().copied().next(), Some(DEFAULT_RAIN_RATE));
        assert!(obs.wave_phase_speed.iter().all(|v| v.is_nan()));
        assert!(obs.valid.iter().all(|&v| v));
    }

    #[test]
    fn test_arrays_broadcast_to_common_shape() {
        let obs = BulkObservation::new(
            Array3::from_elem((4, 2, 3), 8.0),
            10.0,
            array![19.0, 20.0, 21.0],
            3.0,
            Humidity::relative(array![[70.0], [80.0]]),
            3.0,
            20.0,
        )
        .normalize()
        .unwrap();

        assert_eq!(obs.shape, vec![4, 2, 3]);
        assert_eq!(obs.air_temperature.shape(), &[4, 2, 3]);
        assert_eq!(obs.pressure.shape(), &[4, 2, 3]);
        assert_eq!(obs.air_temperature[[3, 1, 2]], 21.0);
        match obs.humidity() {
            Humidity::Relative(rh) => assert_eq!(rh[[0, 1, 0]], 80.0),
            Humidity::Specific(_) => panic!("humidity kind changed"),
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let obs = BulkObservation::new(
            vec![5.0, 6.0],
            10.0,
            vec![20.0, 21.0, 22.0],
            3.0,
            Humidity::relative(80.0),
            3.0,
            20.0,
        );
        match obs.normalize() {
            Err(CoareError::ShapeMismatch { field, shape, target }) => {
                assert_eq!(field, "air_temperature");
                assert_eq!(shape, vec![3]);
                assert_eq!(target, vec![2]);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_pressure_is_rejected() {
        let obs = scalar_observation().with_pressure(vec![1013.0, -1.0]);
        match obs.normalize() {
            Err(CoareError::NonFiniteInput { field, .. }) => assert_eq!(field, "pressure"),
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_height_and_infinity_rejected() {
        let obs = BulkObservation::new(10.0, 0.0, 20.0, 3.0, Humidity::relative(80.0), 3.0, 20.0);
        assert!(matches!(
            obs.normalize(),
            Err(CoareError::NonFiniteInput { .. })
        ));

        let obs = BulkObservation::new(
            f64::INFINITY,
            10.0,
            20.0,
            3.0,
            Humidity::relative(80.0),
            3.0,
            20.0,
        );
        assert!(matches!(
            obs.normalize(),
            Err(CoareError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn test_nan_marks_missing_and_optional_nan_takes_default() {
        let obs = BulkObservation::new(
            vec![5.0, f64::NAN, 7.0],
            10.0,
            20.0,
            3.0,
            Humidity::relative(80.0),
            3.0,
            20.0,
        )
        .with_pressure(vec![1000.0, 1005.0, f64::NAN])
        .normalize()
        .unwrap();

        assert_eq!(obs.valid, array![true, false, true].into_dyn());
        assert_eq!(obs.pressure, array![1000.0, 1005.0, DEFAULT_PRESSURE].into_dyn());
    }
}
