//! Discard elution peaks whose widths are outliers among all detected peaks.
use log::debug;

use crate::mass_trace::MassTrace;

/// The lower rank quantile of peak widths kept by [`percentile_width_filter`]
pub const LOWER_WIDTH_QUANTILE: f64 = 0.05;
/// The upper rank quantile of peak widths kept by [`percentile_width_filter`]
pub const UPPER_WIDTH_QUANTILE: f64 = 0.95;

/// Estimate each trace's FWHM, sort ascending by it and keep those whose rank falls
/// in `[floor(0.05 n), floor(0.95 n)]`, inclusive.
///
/// Widths are measured on the smoothed profile when a trace has one and on the raw
/// profile otherwise. A trace whose width cannot be estimated is dropped.
pub fn percentile_width_filter(traces: Vec<MassTrace>) -> Vec<MassTrace> {
    let mut measured: Vec<(f64, MassTrace)> = traces
        .into_iter()
        .filter_map(|mut trace| {
            let use_smoothed = trace.has_smoothed_intensities();
            match trace.estimate_fwhm(use_smoothed) {
                Ok(fwhm) => Some((fwhm, trace)),
                Err(err) => {
                    debug!("Dropping {} from width filtering: {err}", trace.label());
                    None
                }
            }
        })
        .collect();
    let n = measured.len();
    if n == 0 {
        return Vec::new();
    }
    measured.sort_by(|a, b| a.0.total_cmp(&b.0));
    let lower = (LOWER_WIDTH_QUANTILE * n as f64).floor() as usize;
    let upper = ((UPPER_WIDTH_QUANTILE * n as f64).floor() as usize).min(n - 1);

    debug!(
        "Kept {} of {n} elution peaks with FWHM between {:.3} and {:.3}",
        upper + 1 - lower,
        measured[lower].0,
        measured[upper].0
    );
    measured
        .into_iter()
        .skip(lower)
        .take(upper + 1 - lower)
        .map(|(_, trace)| trace)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peak::RawPeak;

    /// A flat-topped trace whose half-maximum width is `width + 2` seconds
    fn trace_with_width(width: usize, label: usize) -> MassTrace {
        let n = width + 3;
        let apex = n / 2;
        let peaks = (0..n)
            .map(|i| {
                let y = if i == 0 || i == n - 1 { 0.0 } else { 150.0 };
                let y = if i == apex { 200.0 } else { y };
                RawPeak::new(i as f64, 300.0, y)
            })
            .collect();
        let mut trace = MassTrace::from_peaks(peaks).unwrap();
        trace.set_label(format!("T{label}"));
        trace
    }

    #[test]
    fn test_percentile_bounds() {
        let widths = [7, 3, 12, 5, 9, 1, 4, 20, 2, 6, 8, 10, 11, 13, 14, 15, 16, 17, 18, 19, 30, 25];
        let traces: Vec<MassTrace> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| trace_with_width(*w, i))
            .collect();
        let n = traces.len();
        let mut all_widths: Vec<f64> = widths.iter().map(|w| (*w + 2) as f64).collect();
        all_widths.sort_by(|a, b| a.total_cmp(b));

        let kept = percentile_width_filter(traces);
        let lower = (0.05 * n as f64).floor() as usize;
        let upper = (0.95 * n as f64).floor() as usize;
        assert!(kept.len() <= n - lower - (n - 1 - upper));
        assert_eq!(kept.len(), upper - lower + 1);
        assert!(kept
            .windows(2)
            .all(|w| w[0].fwhm().unwrap() <= w[1].fwhm().unwrap()));

        let lowest_kept = kept.first().unwrap().fwhm().unwrap();
        let highest_kept = kept.last().unwrap().fwhm().unwrap();
        for w in all_widths[..lower].iter() {
            assert!(*w <= lowest_kept);
        }
        for w in all_widths[upper + 1..].iter() {
            assert!(*w >= highest_kept);
        }
    }

    #[test]
    fn test_small_inputs() {
        assert!(percentile_width_filter(Vec::new()).is_empty());
        let kept = percentile_width_filter(vec![trace_with_width(4, 1)]);
        assert_eq!(kept.len(), 1);
        let kept = percentile_width_filter((1..6).map(|w| trace_with_width(w, w)).collect());
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[0].label(), "T1");
    }

    #[test]
    fn test_widths_measured_not_cached() {
        let traces: Vec<MassTrace> = (1..=20).rev().map(|w| trace_with_width(w, w)).collect();
        assert!(traces.iter().all(|t| !t.has_fwhm()));

        let kept = percentile_width_filter(traces);
        let labels: Vec<&str> = kept.iter().map(|t| t.label()).collect();
        let expected: Vec<String> = (2..=20).map(|w| format!("T{w}")).collect();
        assert_eq!(labels, expected);
        assert_eq!(kept[0].fwhm().unwrap(), 4.0);
        assert_eq!(kept[18].fwhm().unwrap(), 22.0);
    }

    #[test]
    fn test_prefers_smoothed_profile() {
        let mut narrow_when_smoothed = trace_with_width(10, 1);
        let mut smoothed = vec![0.0; narrow_when_smoothed.len()];
        smoothed[6] = 100.0;
        narrow_when_smoothed.set_smoothed_intensities(smoothed).unwrap();

        let mut traces: Vec<MassTrace> = (2..=20).map(|w| trace_with_width(5, w)).collect();
        traces.push(narrow_when_smoothed);
        traces.push(MassTrace::new());

        let kept = percentile_width_filter(traces);
        assert_eq!(kept.len(), 19);
        assert!(kept.iter().all(|t| t.label() != "T1" && !t.is_empty()));
    }
}
