//! Summary statistics over numeric sequences. Every function rejects an empty
//! input with [`TraceError::InvalidValue`].
use num_traits::Float;

use crate::error::TraceError;

pub fn mean<T: Float>(values: &[T]) -> Result<T, TraceError> {
    if values.is_empty() {
        return Err(TraceError::InvalidValue("cannot take the mean of an empty sequence"));
    }
    let total = values.iter().fold(T::zero(), |acc, v| acc + *v);
    Ok(total / T::from(values.len()).unwrap())
}

/// The population variance of `values`
pub fn variance<T: Float>(values: &[T]) -> Result<T, TraceError> {
    let mu = mean(values)?;
    let total = values
        .iter()
        .fold(T::zero(), |acc, v| acc + (*v - mu).powi(2));
    Ok(total / T::from(values.len()).unwrap())
}

/// The median of `values`, averaging the two central values of an even-length sequence
pub fn median<T: Float>(values: &[T]) -> Result<T, TraceError> {
    if values.is_empty() {
        return Err(TraceError::InvalidValue("cannot take the median of an empty sequence"));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        Ok(sorted[n / 2])
    } else {
        Ok((sorted[n / 2 - 1] + sorted[n / 2]) / T::from(2.0).unwrap())
    }
}
