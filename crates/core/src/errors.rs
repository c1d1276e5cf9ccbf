use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid value for `{field}`: `{value}`")]
    InvalidInput { field: &'static str, value: String },
}

impl DomainError {
    /// Malformed user input is dropped quietly instead of being reported as a
    /// failure.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}
