//! Numerical operations over paired coordinate arrays.
use num_traits::Float;

/// Integrate `y` over `x` with the trapezoid rule.
///
/// The arrays are paired up to the length of the shorter one, and fewer than two
/// points integrate to zero.
pub fn trapz<T: Float>(x: &[T], y: &[T]) -> T {
    let n = x.len().min(y.len());
    if n < 2 {
        return T::zero();
    }
    let half = T::from(0.5).unwrap();
    x[..n]
        .windows(2)
        .zip(y[..n].windows(2))
        .fold(T::zero(), |acc, (xs, ys)| {
            acc + (xs[1] - xs[0]) * half * (ys[0] + ys[1])
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trapz() {
        let x = [0.0, 1.0, 2.0, 4.0];
        let y = [0.0, 2.0, 2.0, 0.0];
        assert_eq!(trapz(&x, &y), 1.0 + 2.0 + 2.0);
        assert_eq!(trapz(&x[..1], &y[..1]), 0.0);
        let yf = [0.0f32, 2.0, 2.0];
        assert_eq!(trapz(&[0.0f32, 1.0, 3.0], &yf), 5.0);
    }
}
