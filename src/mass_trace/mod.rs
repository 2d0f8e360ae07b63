//! The [`MassTrace`] type: a time-ordered run of centroided peaks believed to come
//! from one ion species, together with its centroid and width statistics.
//!
//! A trace is grown from both ends while it is being tracked, then frozen. Its
//! statistics are computed afterwards by explicit `update_*` and `estimate_*`
//! calls, so the trace never silently recomputes anything on access.
use std::fmt::{self, Display};
use std::ops::{Index, Range};
use std::str::FromStr;

use mzpeaks::feature::Feature;
use mzpeaks::prelude::*;
use mzpeaks::{Time, MZ};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::peak::RawPeak;
use crate::stats::median;

mod hull;
mod shape;

pub use hull::ConvexHull;

/// How [`MassTrace::intensity`] summarizes a trace into one abundance value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QuantMethod {
    /// The area under the intensity profile
    #[default]
    Area,
    /// The median intensity of the trace's peaks
    Median,
    /// The apex intensity
    MaxHeight,
}

impl FromStr for QuantMethod {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "area" => Ok(Self::Area),
            "median" => Ok(Self::Median),
            "max_height" | "maxheight" => Ok(Self::MaxHeight),
            _ => Err(TraceError::IllegalArgument(format!(
                "Unknown quantification method {s:?}"
            ))),
        }
    }
}

impl Display for QuantMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Area => "area",
            Self::Median => "median",
            Self::MaxHeight => "max_height",
        };
        f.write_str(name)
    }
}

/// A sequence of [`RawPeak`]s with strictly increasing retention time, at most one per scan.
///
/// The smoothed intensity array is either empty (never set) or exactly as long as the
/// peak sequence.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassTrace {
    peaks: Vec<RawPeak>,
    smoothed_intensities: Vec<f64>,
    /// The nominal time between consecutive scans, `0.0` if unknown
    pub scan_time: f64,
    centroid_mz: f64,
    centroid_rt: f64,
    centroid_sd: Option<f64>,
    fwhm: Option<f64>,
    fwhm_borders: Option<(usize, usize)>,
    label: String,
    pub quant_method: QuantMethod,
}

impl MassTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trace from peaks already sorted by retention time.
    ///
    /// Fails with [`TraceError::IllegalArgument`] if two peaks are not in strictly
    /// increasing retention time order.
    pub fn from_peaks(peaks: Vec<RawPeak>) -> Result<Self, TraceError> {
        if let Some(pair) = peaks
            .windows(2)
            .find(|w| w[0].retention_time >= w[1].retention_time)
        {
            return Err(TraceError::IllegalArgument(format!(
                "Peaks must have strictly increasing retention times, {} followed {}",
                pair[1].retention_time, pair[0].retention_time
            )));
        }
        Ok(Self {
            peaks,
            ..Default::default()
        })
    }

    /// Add `peak` after the current last peak.
    ///
    /// Growing the trace discards any smoothed intensities and FWHM estimate.
    pub fn push_back(&mut self, peak: RawPeak) -> Result<(), TraceError> {
        if let Some(last) = self.peaks.last() {
            if peak.retention_time <= last.retention_time {
                return Err(TraceError::IllegalArgument(format!(
                    "Cannot append a peak at {} after {}",
                    peak.retention_time, last.retention_time
                )));
            }
        }
        self.invalidate_shape();
        self.peaks.push(peak);
        Ok(())
    }

    /// Add `peak` before the current first peak.
    ///
    /// Growing the trace discards any smoothed intensities and FWHM estimate.
    pub fn push_front(&mut self, peak: RawPeak) -> Result<(), TraceError> {
        if let Some(first) = self.peaks.first() {
            if peak.retention_time >= first.retention_time {
                return Err(TraceError::IllegalArgument(format!(
                    "Cannot prepend a peak at {} before {}",
                    peak.retention_time, first.retention_time
                )));
            }
        }
        self.invalidate_shape();
        self.peaks.insert(0, peak);
        Ok(())
    }

    /// Add `peak` at whichever end of the trace its retention time belongs to
    pub fn append(&mut self, peak: RawPeak) -> Result<(), TraceError> {
        match self.peaks.first() {
            Some(first) if peak.retention_time < first.retention_time => self.push_front(peak),
            _ => self.push_back(peak),
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&RawPeak> {
        self.peaks.get(i)
    }

    pub fn front(&self) -> Option<&RawPeak> {
        self.peaks.first()
    }

    pub fn back(&self) -> Option<&RawPeak> {
        self.peaks.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawPeak> {
        self.peaks.iter()
    }

    pub fn peaks(&self) -> &[RawPeak] {
        &self.peaks
    }

    pub fn retention_times(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.retention_time).collect()
    }

    pub fn raw_intensities(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.intensity).collect()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// The smoothed intensities, empty if they were never set
    pub fn smoothed_intensities(&self) -> &[f64] {
        &self.smoothed_intensities
    }

    pub fn has_smoothed_intensities(&self) -> bool {
        !self.smoothed_intensities.is_empty()
    }

    /// Store a smoothed intensity profile for this trace.
    ///
    /// Fails with [`TraceError::InvalidSize`], leaving the trace untouched, unless
    /// `values` has exactly one entry per peak.
    pub fn set_smoothed_intensities(&mut self, values: Vec<f64>) -> Result<(), TraceError> {
        if values.len() != self.peaks.len() {
            return Err(TraceError::InvalidSize {
                expected: self.peaks.len(),
                received: values.len(),
            });
        }
        self.smoothed_intensities = values;
        Ok(())
    }

    /// Copy the peaks and smoothed intensities in `range` into a new trace which
    /// keeps this trace's label, scan time and quantification method.
    pub fn sub_trace(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.peaks.len());
        let start = range.start.min(end);
        let smoothed_intensities = if self.has_smoothed_intensities() {
            self.smoothed_intensities[start..end].to_vec()
        } else {
            Vec::new()
        };
        Self {
            peaks: self.peaks[start..end].to_vec(),
            smoothed_intensities,
            scan_time: self.scan_time,
            label: self.label.clone(),
            quant_method: self.quant_method,
            ..Default::default()
        }
    }

    pub fn centroid_mz(&self) -> f64 {
        self.centroid_mz
    }

    pub fn centroid_rt(&self) -> f64 {
        self.centroid_rt
    }

    /// The intensity-weighted m/z standard deviation, if [`MassTrace::update_weighted_mz_sd`]
    /// has succeeded
    pub fn centroid_sd(&self) -> Option<f64> {
        self.centroid_sd
    }

    /// The retention time span from the first to the last peak, `0.0` for fewer than two peaks
    pub fn trace_length(&self) -> f64 {
        match (self.peaks.first(), self.peaks.last()) {
            (Some(first), Some(last)) => last.retention_time - first.retention_time,
            _ => 0.0,
        }
    }

    /// The mean time between consecutive peaks, `0.0` for fewer than two peaks
    pub fn average_cycle_time(&self) -> f64 {
        if self.peaks.len() < 2 {
            0.0
        } else {
            self.trace_length() / (self.peaks.len() - 1) as f64
        }
    }

    fn invalidate_shape(&mut self) {
        self.smoothed_intensities.clear();
        self.fwhm = None;
        self.fwhm_borders = None;
    }

    fn check_not_empty(&self) -> Result<(), TraceError> {
        if self.peaks.is_empty() {
            Err(TraceError::InvalidValue("MassTrace is empty"))
        } else {
            Ok(())
        }
    }

    fn check_smoothed(&self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        if self.smoothed_intensities.is_empty() {
            Err(TraceError::InvalidValue(
                "MassTrace has no smoothed intensities",
            ))
        } else {
            Ok(())
        }
    }

    fn weighted_mean_of(values: impl Iterator<Item = (f64, f64)>) -> Result<f64, TraceError> {
        let (acc, total) = values.fold((0.0, 0.0), |(acc, total), (x, w)| {
            (acc + x * w, total + w)
        });
        if total <= 0.0 {
            return Err(TraceError::InvalidValue(
                "MassTrace has a total intensity of zero",
            ));
        }
        Ok(acc / total)
    }

    /// Set the centroid retention time to the intensity-weighted mean retention time
    pub fn update_weighted_mean_rt(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        self.centroid_rt =
            Self::weighted_mean_of(self.peaks.iter().map(|p| (p.retention_time, p.intensity)))?;
        Ok(())
    }

    /// Set the centroid retention time to the smoothed-intensity weighted mean retention time
    pub fn update_smoothed_weighted_mean_rt(&mut self) -> Result<(), TraceError> {
        self.check_smoothed()?;
        self.centroid_rt = Self::weighted_mean_of(
            self.peaks
                .iter()
                .zip(self.smoothed_intensities.iter())
                .map(|(p, s)| (p.retention_time, *s)),
        )?;
        Ok(())
    }

    /// Set the centroid retention time to that of the smoothed apex
    pub fn update_smoothed_max_rt(&mut self) -> Result<(), TraceError> {
        let apex = self.find_max_by_intensity(true)?;
        self.centroid_rt = self.peaks[apex].retention_time;
        Ok(())
    }

    pub fn update_median_rt(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        self.centroid_rt = median(&self.retention_times())?;
        Ok(())
    }

    /// Set the centroid m/z to the intensity-weighted mean m/z
    pub fn update_weighted_mean_mz(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        self.centroid_mz =
            Self::weighted_mean_of(self.peaks.iter().map(|p| (p.mz, p.intensity)))?;
        Ok(())
    }

    pub fn update_median_mz(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        let mzs: Vec<f64> = self.peaks.iter().map(|p| p.mz).collect();
        self.centroid_mz = median(&mzs)?;
        Ok(())
    }

    pub fn update_mean_mz(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        self.centroid_mz =
            self.peaks.iter().map(|p| p.mz).sum::<f64>() / self.peaks.len() as f64;
        Ok(())
    }

    /// Compute the intensity-weighted standard deviation of m/z around the current centroid m/z.
    ///
    /// Fails with [`TraceError::InvalidValue`] if the trace is empty or its total intensity is zero.
    pub fn update_weighted_mz_sd(&mut self) -> Result<(), TraceError> {
        self.check_not_empty()?;
        let centroid = self.centroid_mz;
        let variance = Self::weighted_mean_of(
            self.peaks
                .iter()
                .map(|p| ((p.mz - centroid).powi(2), p.intensity)),
        )?;
        self.centroid_sd = Some(variance.sqrt());
        Ok(())
    }
}

impl Index<usize> for MassTrace {
    type Output = RawPeak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl<'a> IntoIterator for &'a MassTrace {
    type Item = &'a RawPeak;
    type IntoIter = std::slice::Iter<'a, RawPeak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl Display for MassTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MassTrace({}, mz={:.4}, rt={:.2}, size={})",
            self.label,
            self.centroid_mz,
            self.centroid_rt,
            self.peaks.len()
        )
    }
}

impl From<&MassTrace> for Feature<MZ, Time> {
    fn from(trace: &MassTrace) -> Self {
        let mut feature = Feature::default();
        for peak in trace.iter() {
            feature.push_raw(peak.mz, peak.retention_time, peak.intensity as f32);
        }
        feature
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::scenario_a_trace;

    #[test]
    fn test_push_ordering() {
        let mut trace = MassTrace::new();
        trace.push_back(RawPeak::new(10.0, 500.0, 100.0)).unwrap();
        trace.push_back(RawPeak::new(11.0, 500.0, 200.0)).unwrap();
        trace.push_front(RawPeak::new(9.0, 500.0, 50.0)).unwrap();
        trace.append(RawPeak::new(8.0, 500.0, 10.0)).unwrap();
        trace.append(RawPeak::new(12.0, 500.0, 10.0)).unwrap();
        assert_eq!(trace.len(), 5);
        assert!(trace
            .peaks()
            .windows(2)
            .all(|w| w[0].retention_time < w[1].retention_time));

        assert!(matches!(
            trace.push_back(RawPeak::new(12.0, 500.0, 10.0)),
            Err(TraceError::IllegalArgument(_))
        ));
        assert!(matches!(
            trace.push_front(RawPeak::new(8.0, 500.0, 10.0)),
            Err(TraceError::IllegalArgument(_))
        ));
        assert!(matches!(
            trace.append(RawPeak::new(10.0, 500.0, 10.0)),
            Err(TraceError::IllegalArgument(_))
        ));
        assert_eq!(trace.len(), 5);
        assert_eq!(trace.front().unwrap().retention_time, 8.0);
        assert_eq!(trace.back().unwrap().retention_time, 12.0);
        assert_eq!(trace[2].intensity, 100.0);
    }

    #[test]
    fn test_from_peaks_rejects_duplicate_time() {
        let peaks = vec![RawPeak::new(1.0, 100.0, 1.0), RawPeak::new(1.0, 100.0, 2.0)];
        assert!(matches!(
            MassTrace::from_peaks(peaks),
            Err(TraceError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_smoothed_length_guard() {
        let mut trace = scenario_a_trace();
        let err = trace
            .set_smoothed_intensities(vec![1.0; trace.len() + 1])
            .unwrap_err();
        assert_eq!(
            err,
            TraceError::InvalidSize {
                expected: 7,
                received: 8
            }
        );
        assert!(trace.smoothed_intensities().is_empty());
        assert!(!trace.has_smoothed_intensities());

        trace.set_smoothed_intensities(vec![1.0; 7]).unwrap();
        assert_eq!(trace.smoothed_intensities().len(), 7);

        let err = trace.set_smoothed_intensities(vec![2.0; 6]).unwrap_err();
        assert!(matches!(err, TraceError::InvalidSize { .. }));
        assert_eq!(trace.smoothed_intensities(), &[1.0; 7]);
    }

    #[test]
    fn test_empty_trace_guards() {
        let mut trace = MassTrace::new();
        let invalid = |r: Result<(), TraceError>| matches!(r, Err(TraceError::InvalidValue(_)));
        assert!(invalid(trace.update_weighted_mean_rt()));
        assert!(invalid(trace.update_median_rt()));
        assert!(invalid(trace.update_median_mz()));
        assert!(invalid(trace.update_mean_mz()));
        assert!(invalid(trace.update_weighted_mean_mz()));
        assert!(invalid(trace.update_weighted_mz_sd()));
        assert!(invalid(trace.update_smoothed_max_rt()));
        assert!(matches!(
            trace.find_max_by_intensity(false),
            Err(TraceError::InvalidValue(_))
        ));
        assert!(matches!(
            trace.estimate_fwhm(false),
            Err(TraceError::InvalidValue(_))
        ));
        assert_eq!(trace.trace_length(), 0.0);
    }

    #[test]
    fn test_smoothed_weighted_mean_rt() {
        let mut trace = MassTrace::from_peaks(vec![
            RawPeak::new(1.0, 500.0, 10.0),
            RawPeak::new(2.0, 500.0, 10.0),
            RawPeak::new(3.0, 500.0, 10.0),
        ])
        .unwrap();
        assert!(matches!(
            trace.update_smoothed_weighted_mean_rt(),
            Err(TraceError::InvalidValue(_))
        ));

        trace.set_smoothed_intensities(vec![3.0, 1.0, 0.0]).unwrap();
        trace.update_smoothed_weighted_mean_rt().unwrap();
        assert_eq!(trace.centroid_rt(), (1.0 * 3.0 + 2.0 * 1.0) / 4.0);

        trace.update_weighted_mean_rt().unwrap();
        assert_eq!(trace.centroid_rt(), 2.0);

        trace.set_smoothed_intensities(vec![0.0; 3]).unwrap();
        assert!(matches!(
            trace.update_smoothed_weighted_mean_rt(),
            Err(TraceError::InvalidValue(_))
        ));
        assert_eq!(trace.centroid_rt(), 2.0);
    }

    #[test]
    fn test_zero_intensity_sd() {
        let mut trace = MassTrace::from_peaks(vec![
            RawPeak::new(1.0, 123.123, 0.0),
            RawPeak::new(2.0, 123.321, 0.0),
        ])
        .unwrap();
        trace.update_mean_mz().unwrap();
        assert!(matches!(
            trace.update_weighted_mz_sd(),
            Err(TraceError::InvalidValue(_))
        ));
        assert!(trace.centroid_sd().is_none());
        assert!(matches!(
            trace.update_weighted_mean_mz(),
            Err(TraceError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_centroids() {
        let mut trace = scenario_a_trace();
        trace.update_weighted_mean_mz().unwrap();
        trace.update_weighted_mean_rt().unwrap();
        trace.update_weighted_mz_sd().unwrap();
        assert!((trace.centroid_mz() - 230.102).abs() < 1e-3);
        assert!((trace.centroid_rt() - 155.24).abs() < 0.5);
        let sd = trace.centroid_sd().unwrap();
        assert!(sd > 0.0 && sd < 1e-3);

        trace.update_median_rt().unwrap();
        assert_eq!(trace.centroid_rt(), 155.24);
        trace.update_mean_mz().unwrap();
        assert!((trace.centroid_mz() - 230.102).abs() < 1e-3);

        assert!((trace.trace_length() - 6.018).abs() < 1e-9);
        assert!((trace.average_cycle_time() - 6.018 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_sub_trace() {
        let mut trace = scenario_a_trace();
        trace.set_label("T1");
        trace.set_smoothed_intensities(trace.raw_intensities()).unwrap();
        let sub = trace.sub_trace(2..5);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.label(), "T1");
        assert_eq!(sub[0], trace[2]);
        assert_eq!(sub.smoothed_intensities(), &trace.smoothed_intensities()[2..5]);
    }

    #[test]
    fn test_quant_method_parse() {
        assert_eq!("area".parse::<QuantMethod>().unwrap(), QuantMethod::Area);
        assert_eq!("Median".parse::<QuantMethod>().unwrap(), QuantMethod::Median);
        assert_eq!(
            "max_height".parse::<QuantMethod>().unwrap(),
            QuantMethod::MaxHeight
        );
        assert!("volume".parse::<QuantMethod>().is_err());
    }

    #[test]
    fn test_feature_conversion() {
        let trace = scenario_a_trace();
        let feature: Feature<MZ, Time> = (&trace).into();
        assert_eq!(feature.len(), trace.len());
        assert_eq!(feature.start_time(), Some(152.22));
        assert_eq!(feature.end_time(), Some(158.238));
    }
}
