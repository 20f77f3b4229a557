use coare_core::field::Field;
use coare_core::{BulkObservation, Coare35, CoareError, CoareParameters, Humidity};
use ndarray::{arr0, Array1};
use numpy::{IntoPyArray, PyReadonlyArrayDyn};
use pyo3::create_exception;
use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

create_exception!(
    xcoare,
    ShapeMismatchError,
    PyValueError,
    "Inputs cannot be broadcast to a common shape."
);
create_exception!(
    xcoare,
    NonFiniteInputError,
    PyValueError,
    "An input lies outside its physical domain."
);

fn to_py_err(err: CoareError) -> PyErr {
    match &err {
        CoareError::ShapeMismatch { .. } => ShapeMismatchError::new_err(err.to_string()),
        CoareError::NonFiniteInput { .. } => NonFiniteInputError::new_err(err.to_string()),
        CoareError::InvalidConfig(_) | CoareError::ConfigParse(_) => {
            PyValueError::new_err(err.to_string())
        }
    }
}

/// Convert a float, a float64 array or a sequence of floats into a field.
fn extract_field(name: &str, value: &Bound<'_, PyAny>) -> PyResult<Field> {
    if let Ok(value) = value.extract::<f64>() {
        return Ok(arr0(value).into_dyn());
    }
    if let Ok(array) = value.extract::<PyReadonlyArrayDyn<'_, f64>>() {
        return Ok(array.as_array().to_owned());
    }
    if let Ok(values) = value.extract::<Vec<f64>>() {
        return Ok(Array1::from_vec(values).into_dyn());
    }
    Err(PyTypeError::new_err(format!(
        "`{}` must be a float or an array of float64 values",
        name
    )))
}

fn extract_optional(name: &str, value: Option<&Bound<'_, PyAny>>) -> PyResult<Option<Field>> {
    match value {
        Some(value) if !value.is_none() => extract_field(name, value).map(Some),
        _ => Ok(None),
    }
}

/// Build the solver parameters from keyword options.
///
/// Unknown names and mistyped values are rejected.
fn parameters_from_options(options: Option<&Bound<'_, PyDict>>) -> PyResult<CoareParameters> {
    let Some(options) = options else {
        return Ok(CoareParameters::default());
    };
    log::debug!("coare35 options: {}", options);
    let parameters = pythonize::depythonize::<CoareParameters>(options.as_any());
    match parameters {
        Ok(parameters) => Ok(parameters),
        Err(e) => Err(PyValueError::new_err(format!("{}", e))),
    }
}

/// Run COARE3.5 on scalars or NumPy arrays.
///
/// Inputs broadcast against each other with NumPy rules. Humidity is given either
/// as relative humidity `rh` (%) or as specific humidity `qspec` (kg/kg), never
/// both. Keyword options override the solver parameters by name.
///
/// Returns a dict of arrays keyed by the published COARE output names, plus
/// `converged` and `iterations` per element.
#[pyfunction]
#[pyo3(signature = (
    u, zu, t, zt, rh, zq, ts,
    p=None, rs=None, rl=None, lat=None, zi=None, rain=None, cp=None, sigh=None, qspec=None,
    **options
))]
#[allow(clippy::too_many_arguments)]
fn coare35<'py>(
    py: Python<'py>,
    u: &Bound<'py, PyAny>,
    zu: &Bound<'py, PyAny>,
    t: &Bound<'py, PyAny>,
    zt: &Bound<'py, PyAny>,
    rh: Option<&Bound<'py, PyAny>>,
    zq: &Bound<'py, PyAny>,
    ts: &Bound<'py, PyAny>,
    p: Option<&Bound<'py, PyAny>>,
    rs: Option<&Bound<'py, PyAny>>,
    rl: Option<&Bound<'py, PyAny>>,
    lat: Option<&Bound<'py, PyAny>>,
    zi: Option<&Bound<'py, PyAny>>,
    rain: Option<&Bound<'py, PyAny>>,
    cp: Option<&Bound<'py, PyAny>>,
    sigh: Option<&Bound<'py, PyAny>>,
    qspec: Option<&Bound<'py, PyAny>>,
    options: Option<&Bound<'py, PyDict>>,
) -> PyResult<Bound<'py, PyDict>> {
    let humidity = match (extract_optional("rh", rh)?, extract_optional("qspec", qspec)?) {
        (Some(rh), None) => Humidity::Relative(rh),
        (None, Some(q)) => Humidity::Specific(q),
        (Some(_), Some(_)) => {
            return Err(PyValueError::new_err(
                "give either `rh` or `qspec`, not both",
            ))
        }
        (None, None) => return Err(PyValueError::new_err("one of `rh` or `qspec` is required")),
    };

    let mut obs = BulkObservation::new(
        extract_field("u", u)?,
        extract_field("zu", zu)?,
        extract_field("t", t)?,
        extract_field("zt", zt)?,
        humidity,
        extract_field("zq", zq)?,
        extract_field("ts", ts)?,
    );
    obs.pressure = extract_optional("p", p)?;
    obs.shortwave_down = extract_optional("rs", rs)?;
    obs.longwave_down = extract_optional("rl", rl)?;
    obs.latitude = extract_optional("lat", lat)?;
    obs.boundary_layer_height = extract_optional("zi", zi)?;
    obs.rain_rate = extract_optional("rain", rain)?;
    obs.wave_phase_speed = extract_optional("cp", cp)?;
    obs.wave_height = extract_optional("sigh", sigh)?;

    let solver = Coare35::from_parameters(parameters_from_options(options)?);
    let result = py.detach(|| solver.solve(&obs)).map_err(to_py_err)?;

    let output = PyDict::new(py);
    for (name, field) in result.fields() {
        output.set_item(name, field.clone().into_pyarray(py))?;
    }
    output.set_item("converged", result.converged().into_pyarray(py))?;
    output.set_item("iterations", result.iterations.into_pyarray(py))?;
    Ok(output)
}

#[pymodule]
#[pyo3(name = "_lib")]
fn xcoare(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(coare35, m)?)?;
    m.add("ShapeMismatchError", m.py().get_type::<ShapeMismatchError>())?;
    m.add("NonFiniteInputError", m.py().get_type::<NonFiniteInputError>())?;
    Ok(())
}
