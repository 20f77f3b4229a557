use thiserror::Error;

/// Error type for invalid inputs and configuration.
///
/// Non-convergence is not an error: elements that exhaust the iteration budget
/// are reported through [`crate::solver::ConvergenceStatus::Exhausted`].
#[derive(Error, Debug)]
pub enum CoareError {
    #[error("Input `{field}` with shape {shape:?} cannot be broadcast against shape {target:?}")]
    ShapeMismatch {
        field: String,
        shape: Vec<usize>,
        target: Vec<usize>,
    },
    #[error("Input `{field}` is outside its valid domain: {reason}")]
    NonFiniteInput { field: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Could not parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Convenience type for `Result<T, CoareError>`.
pub type CoareResult<T> = Result<T, CoareError>;
