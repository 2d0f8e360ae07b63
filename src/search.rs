//! Searches over sorted coordinate arrays.
use num_traits::Float;

/// Find the insertion point of `q` in the sorted `array`
pub fn binsearch<T: Float>(array: &[T], q: T) -> usize {
    array.partition_point(|x| *x < q)
}

/// Find the index of the value in the sorted `vec` closest to `target_val`.
///
/// When two values are equally distant, the lower index wins. Returns `None`
/// if `vec` is empty.
pub fn nearest<T: Float>(vec: &[T], target_val: T) -> Option<usize> {
    if vec.is_empty() {
        return None;
    }
    let n = vec.len() - 1;
    let i = binsearch(vec, target_val);
    if i == 0 {
        return Some(0);
    }
    if i > n {
        return Some(n);
    }
    let left_dist = (target_val - vec[i - 1]).abs();
    let right_dist = (vec[i] - target_val).abs();
    if right_dist < left_dist {
        Some(i)
    } else {
        Some(i - 1)
    }
}
