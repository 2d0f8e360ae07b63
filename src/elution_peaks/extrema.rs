//! Local maxima and the valleys separating them in a smoothed intensity profile.
use super::{VALLEY_DEPTH_FACTOR, VALLEY_FLOOR_INTENSITY};

/// The maxima that survived valley testing and the accepted valleys between them,
/// both in ascending index order. Each valley lies between two consecutive maxima.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalExtrema {
    pub maxima: Vec<usize>,
    pub minima: Vec<usize>,
}

/// Find the local maxima of `values`, claiming `num_neighbors` points on either side
/// of each one.
///
/// Indices are visited from most to least intense, ties in index order. A positive,
/// unclaimed point is a maximum if no point in its window is claimed or strictly
/// greater, and then its whole window becomes claimed. The maxima are returned in
/// ascending index order.
pub fn find_local_maxima(values: &[f64], num_neighbors: usize) -> Vec<usize> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*b].total_cmp(&values[*a]));

    let mut claimed = vec![false; n];
    let mut maxima = Vec::new();
    for i in order {
        if claimed[i] || values[i] <= 0.0 {
            continue;
        }
        let start = i.saturating_sub(num_neighbors);
        let end = (i + num_neighbors).min(n - 1);
        let is_maximum = (start..=end).all(|j| !claimed[j] && values[j] <= values[i]);
        if is_maximum {
            claimed[start..=end].fill(true);
            maxima.push(i);
        }
    }
    maxima.sort_unstable();
    maxima
}

/// Bisect for the lowest point strictly between the maxima at `left` and `right`,
/// following the descending slope. Returns `None` if nothing lies between them.
pub fn bisect_valley(values: &[f64], left: usize, right: usize) -> Option<usize> {
    if right < left + 2 {
        return None;
    }
    let mut lb = left + 1;
    let mut rb = right - 1;
    while lb + 1 < rb {
        let mid = lb + (rb - lb) / 2;
        if values[mid] <= values[mid + 1] {
            rb = mid;
        } else {
            lb = mid;
        }
    }
    if values[lb] <= values[rb] {
        Some(lb)
    } else {
        Some(rb)
    }
}

/// Walk adjacent pairs of `maxima` and keep the valleys deep and wide enough to separate
/// two elution events.
///
/// A valley is kept if both maxima are at least [`VALLEY_DEPTH_FACTOR`] times its
/// intensity, floored at [`VALLEY_FLOOR_INTENSITY`], and it is at least `min_fwhm / 2`
/// away from both in time. Otherwise the weaker maximum is dropped and the stronger one
/// is compared to the next.
pub fn merge_maxima(times: &[f64], values: &[f64], maxima: &[usize], min_fwhm: f64) -> LocalExtrema {
    let mut extrema = LocalExtrema::default();
    if maxima.is_empty() {
        return extrema;
    }
    let min_distance = min_fwhm / 2.0;

    let mut left = maxima[0];
    for right in maxima.iter().copied().skip(1) {
        let valley = bisect_valley(values, left, right).filter(|valley| {
            let floor = values[*valley].max(VALLEY_FLOOR_INTENSITY);
            values[left] / floor >= VALLEY_DEPTH_FACTOR
                && values[right] / floor >= VALLEY_DEPTH_FACTOR
                && times[*valley] - times[left] >= min_distance
                && times[right] - times[*valley] >= min_distance
        });
        match valley {
            Some(valley) => {
                extrema.maxima.push(left);
                extrema.minima.push(valley);
                left = right;
            }
            None => {
                if values[left] <= values[right] {
                    left = right;
                }
            }
        }
    }
    extrema.maxima.push(left);
    extrema
}

/// Find local maxima with [`find_local_maxima`] and separate them with [`merge_maxima`]
pub fn find_local_extrema(
    times: &[f64],
    values: &[f64],
    num_neighbors: usize,
    min_fwhm: f64,
) -> LocalExtrema {
    let maxima = find_local_maxima(values, num_neighbors);
    log::trace!("Found {} candidate maxima at {maxima:?}", maxima.len());
    merge_maxima(times, values, &maxima, min_fwhm)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.0, 1.0, 5.0, 1.0, 0.0, 2.0, 6.0, 2.0, 0.0], 1, vec![2, 6])]
    #[case(&[3.0, 3.0, 0.0], 1, vec![0])]
    #[case(&[0.0, 0.0, -1.0], 1, vec![])]
    #[case(&[1.0, 4.0, 2.0, 5.0, 1.0], 1, vec![3])]
    #[case(&[1.0, 4.0, 2.0, 5.0, 1.0], 0, vec![0, 1, 2, 3, 4])]
    #[case(&[], 2, vec![])]
    fn test_find_local_maxima(
        #[case] values: &[f64],
        #[case] num_neighbors: usize,
        #[case] expected: Vec<usize>,
    ) {
        assert_eq!(find_local_maxima(values, num_neighbors), expected);
    }

    #[test]
    fn test_bisect_valley() {
        let values = [10.0, 5.0, 3.0, 1.0, 4.0, 9.0];
        assert_eq!(bisect_valley(&values, 0, 5), Some(3));
        assert_eq!(bisect_valley(&values, 0, 2), Some(1));
        assert_eq!(bisect_valley(&values, 0, 1), None);
    }

    #[test]
    fn test_merge_deep_valleys() {
        let times: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let values = [1.0, 10.0, 2.0, 8.0, 1.0, 9.0, 1.0];
        let extrema = merge_maxima(&times, &values, &[1, 3, 5], 1.0);
        assert_eq!(extrema.maxima, vec![1, 3, 5]);
        assert_eq!(extrema.minima, vec![2, 4]);
    }

    #[test]
    fn test_merge_shallow_valley() {
        let times: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let values = [1.0, 10.0, 6.0, 8.0, 1.0, 9.0, 1.0];
        let extrema = merge_maxima(&times, &values, &[1, 3, 5], 1.0);
        assert_eq!(extrema.maxima, vec![1, 5]);
        assert_eq!(extrema.minima, vec![4]);
    }

    #[test]
    fn test_merge_narrow_valley() {
        let times: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let values = [1.0, 10.0, 2.0, 8.0, 1.0, 9.0, 1.0];
        let extrema = merge_maxima(&times, &values, &[1, 3, 5], 4.0);
        assert_eq!(extrema.maxima, vec![1]);
        assert!(extrema.minima.is_empty());
    }
}
