//! Value marshaling between native containers and the plugin runtime's
//! sequence representation.
//!
//! Pure data transformation: vectors cross the boundary as flat sequences
//! in index order, matrices as `[n_rows, n_cols, flat-data]` so the shape
//! always travels with the payload.
use bnpmix_utils::Matrix;
use serde_json::Value;

use crate::error::MarshalError;

/// Convert a native `f64` into a runtime value.
///
/// The sequence representation has no non-finite numbers, so infinities
/// and NaN travel as the tagged strings `"inf"`, `"-inf"` and `"nan"`.
/// Log masses of empty clusters are legitimately `-inf`, so this is a
/// real code path, not a corner case.
pub fn number(x: f64) -> Value {
    if x.is_finite() {
        Value::from(x)
    } else if x.is_nan() {
        Value::from("nan")
    } else if x > 0.0 {
        Value::from("inf")
    } else {
        Value::from("-inf")
    }
}

fn decode_number(value: &Value, index: usize) -> Result<f64, MarshalError> {
    if let Some(x) = value.as_f64() {
        return Ok(x);
    }
    match value.as_str() {
        Some("inf") => Ok(f64::INFINITY),
        Some("-inf") => Ok(f64::NEG_INFINITY),
        Some("nan") => Ok(f64::NAN),
        _ => Err(MarshalError::NonNumeric { index }),
    }
}

/// Convert a native vector into a runtime sequence.
pub fn to_sequence(xs: &[f64]) -> Value {
    Value::Array(xs.iter().map(|&x| number(x)).collect())
}

/// Convert a runtime sequence back into a native vector.
///
/// Every element must be convertible to `f64`; anything else is a fatal
/// protocol mismatch.
pub fn from_sequence(value: &Value) -> Result<Vec<f64>, MarshalError> {
    let elems = value.as_array().ok_or(MarshalError::NotASequence)?;
    elems
        .iter()
        .enumerate()
        .map(|(index, elem)| decode_number(elem, index))
        .collect()
}

/// Convert a matrix into a shape-carrying runtime sequence.
pub fn matrix_to_sequence(m: &Matrix) -> Value {
    Value::Array(vec![
        Value::from(m.n_rows()),
        Value::from(m.n_cols()),
        to_sequence(m.values()),
    ])
}

/// Reconstruct a matrix from a shape-carrying runtime sequence.
pub fn matrix_from_sequence(value: &Value) -> Result<Matrix, MarshalError> {
    let parts = value.as_array().ok_or(MarshalError::NotASequence)?;
    let (n_rows, n_cols, flat) = match parts.as_slice() {
        [rows, cols, data] => {
            let n_rows = rows
                .as_u64()
                .ok_or(MarshalError::NonNumeric { index: 0 })?
                as usize;
            let n_cols = cols
                .as_u64()
                .ok_or(MarshalError::NonNumeric { index: 1 })?
                as usize;
            (n_rows, n_cols, from_sequence(data)?)
        }
        _ => return Err(MarshalError::NotASequence),
    };
    if flat.len() != n_rows * n_cols {
        return Err(MarshalError::ShapeMismatch {
            len: flat.len(),
            n_rows,
            n_cols,
        });
    }
    Ok(Matrix::from_raw_parts(flat, n_rows, n_cols))
}

/// Extract a scalar from a runtime value.
pub fn scalar(value: &Value) -> Result<f64, MarshalError> {
    decode_number(value, 0)
}

/// Extract a boolean from a runtime value.
pub fn boolean(value: &Value) -> Result<bool, MarshalError> {
    value.as_bool().ok_or(MarshalError::NonNumeric { index: 0 })
}
