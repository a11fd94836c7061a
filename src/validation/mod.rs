use std::fmt;

pub const LOCATION_CODES: &[&str] = &["IN", "UK", "US"];
pub const TRANSACTION_TYPES: &[&str] = &["payment", "transfer", "cashout", "deposit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionErrorKind {
    Missing,
    NotAnInteger(String),
    NotANumber(String),
    UnknownTransactionType(String),
    UnknownLocation(String),
}

/// A form field whose raw text could not be turned into its wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub field: &'static str,
    pub kind: CoercionErrorKind,
}

impl CoercionError {
    pub fn new(field: &'static str, kind: CoercionErrorKind) -> Self {
        Self { field, kind }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CoercionErrorKind::Missing => write!(f, "{}: must not be empty", self.field),
            CoercionErrorKind::NotAnInteger(raw) => {
                write!(f, "{}: '{}' is not a whole number", self.field, raw)
            }
            CoercionErrorKind::NotANumber(raw) => {
                write!(f, "{}: '{}' is not a finite number", self.field, raw)
            }
            CoercionErrorKind::UnknownTransactionType(raw) => write!(
                f,
                "{}: '{}' must be one of: {}",
                self.field,
                raw,
                TRANSACTION_TYPES.join(", ")
            ),
            CoercionErrorKind::UnknownLocation(raw) => write!(
                f,
                "{}: '{}' must be one of: {}",
                self.field,
                raw,
                LOCATION_CODES.join(", ")
            ),
        }
    }
}

impl std::error::Error for CoercionError {}

pub type CoercionResult<T> = Result<T, CoercionError>;

/// Returns the value with surrounding whitespace removed. Interior text is
/// passed through untouched.
pub fn validate_required(field: &'static str, value: &str) -> CoercionResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoercionError::new(field, CoercionErrorKind::Missing));
    }

    Ok(value.to_string())
}

/// Returns the index of `value` in `allowed`, comparing case-sensitively.
pub fn validate_enum(value: &str, allowed: &[&str]) -> Option<usize> {
    allowed.iter().position(|candidate| value == *candidate)
}

pub fn coerce_integer(field: &'static str, raw: &str) -> CoercionResult<i64> {
    let value = validate_required(field, raw)?;
    value
        .parse::<i64>()
        .map_err(|_| CoercionError::new(field, CoercionErrorKind::NotAnInteger(value)))
}

/// Parses a finite `f64`. `NaN` and infinities are rejected even though
/// `str::parse` accepts their spellings.
pub fn coerce_number(field: &'static str, raw: &str) -> CoercionResult<f64> {
    let value = validate_required(field, raw)?;
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(CoercionError::new(field, CoercionErrorKind::NotANumber(value))),
    }
}
