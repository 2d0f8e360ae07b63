//! Split mass traces into individual chromatographic elution peaks.
//!
//! Each trace's intensity profile is smoothed with a window spanning the expected
//! chromatographic peak width. Local maxima are found on the smoothed profile and
//! every valley deep enough between two of them becomes a split point. The resulting
//! sub-traces may then be filtered by their width and signal-to-noise ratio.
//!
//! ```rust
//! use mztrace::prelude::*;
//!
//! let peaks: Vec<RawPeak> = (0..60)
//!     .map(|i| {
//!         let t = i as f64;
//!         let y = 1e5 * (-(t - 15.0).powi(2) / 32.0).exp()
//!             + 6e4 * (-(t - 42.0).powi(2) / 32.0).exp()
//!             + 100.0;
//!         RawPeak::new(t, 445.12, y)
//!     })
//!     .collect();
//! let mut trace = MassTrace::from_peaks(peaks).unwrap();
//! trace.set_label("T1");
//!
//! let peaks = detect_elution_peaks(&trace, &ElutionPeakParams::default()).unwrap();
//! assert_eq!(peaks.len(), 2);
//! assert_eq!(peaks[0].label(), "T1.1");
//! assert_eq!(peaks[1].label(), "T1.2");
//! ```
use std::fmt::{self, Display};
use std::str::FromStr;

use log::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::mass_trace::MassTrace;
use crate::smooth::{LowessSmoother, Smoother};

mod extrema;
mod width_filter;

pub use extrema::{bisect_valley, find_local_extrema, find_local_maxima, merge_maxima, LocalExtrema};
pub use width_filter::{percentile_width_filter, LOWER_WIDTH_QUANTILE, UPPER_WIDTH_QUANTILE};

/// Both maxima flanking a valley must be at least this many times more intense than it
pub const VALLEY_DEPTH_FACTOR: f64 = 2.0;
/// Valley intensities are floored at this value before the depth comparison
pub const VALLEY_FLOOR_INTENSITY: f64 = 1.0;

/// How elution peaks are filtered by their full width at half maximum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakWidthFiltering {
    /// Keep every peak regardless of width
    Off,
    /// Keep peaks whose width lies within `[min_fwhm, max_fwhm]`
    #[default]
    Fixed,
    /// Keep peaks between the 5th and 95th percentile of all widths, see [`filter_by_peak_width`]
    Auto,
}

impl FromStr for PeakWidthFiltering {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "fixed" => Ok(Self::Fixed),
            "auto" => Ok(Self::Auto),
            _ => Err(TraceError::IllegalArgument(format!(
                "Unknown peak width filtering mode {s:?}"
            ))),
        }
    }
}

impl Display for PeakWidthFiltering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Fixed => f.write_str("fixed"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElutionPeakParams {
    /// The expected chromatographic peak width in seconds, which sets the smoothing window
    pub chrom_fwhm: f64,
    /// The minimum apex signal-to-noise ratio when `masstrace_snr_filtering` is enabled
    pub chrom_peak_snr: f64,
    pub width_filtering: PeakWidthFiltering,
    /// The minimum peak width in seconds. Valleys closer than half of this to a maximum
    /// are not split at.
    pub min_fwhm: f64,
    /// The maximum peak width in seconds under [`PeakWidthFiltering::Fixed`]
    pub max_fwhm: f64,
    pub masstrace_snr_filtering: bool,
}

impl Default for ElutionPeakParams {
    fn default() -> Self {
        Self {
            chrom_fwhm: 5.0,
            chrom_peak_snr: 3.0,
            width_filtering: PeakWidthFiltering::Fixed,
            min_fwhm: 1.0,
            max_fwhm: 60.0,
            masstrace_snr_filtering: false,
        }
    }
}

impl ElutionPeakParams {
    pub fn chrom_fwhm(mut self, value: f64) -> Self {
        self.chrom_fwhm = value;
        self
    }

    pub fn chrom_peak_snr(mut self, value: f64) -> Self {
        self.chrom_peak_snr = value;
        self
    }

    pub fn width_filtering(mut self, value: PeakWidthFiltering) -> Self {
        self.width_filtering = value;
        self
    }

    pub fn min_fwhm(mut self, value: f64) -> Self {
        self.min_fwhm = value;
        self
    }

    pub fn max_fwhm(mut self, value: f64) -> Self {
        self.max_fwhm = value;
        self
    }

    pub fn masstrace_snr_filtering(mut self, value: bool) -> Self {
        self.masstrace_snr_filtering = value;
        self
    }

    /// Check that every value is in its legal range
    pub fn validate(&self) -> Result<(), TraceError> {
        if !(self.chrom_fwhm > 0.0) {
            return Err(TraceError::IllegalArgument(format!(
                "chrom_fwhm must be positive, got {}",
                self.chrom_fwhm
            )));
        }
        if !(self.chrom_peak_snr >= 0.0) {
            return Err(TraceError::IllegalArgument(format!(
                "chrom_peak_snr must not be negative, got {}",
                self.chrom_peak_snr
            )));
        }
        if !(self.min_fwhm >= 0.0 && self.min_fwhm <= self.max_fwhm) {
            return Err(TraceError::IllegalArgument(format!(
                "Expected 0 <= min_fwhm <= max_fwhm, got {} and {}",
                self.min_fwhm, self.max_fwhm
            )));
        }
        Ok(())
    }
}

/// Splits [`MassTrace`]s at the valleys of their smoothed intensity profile
#[derive(Debug, Clone, Default)]
pub struct ElutionPeakDetector<S: Smoother = LowessSmoother> {
    pub params: ElutionPeakParams,
    smoother: S,
}

impl ElutionPeakDetector<LowessSmoother> {
    pub fn new(params: ElutionPeakParams) -> Self {
        Self::with_smoother(params, LowessSmoother::default())
    }
}

impl<S: Smoother> ElutionPeakDetector<S> {
    pub fn with_smoother(params: ElutionPeakParams, smoother: S) -> Self {
        Self { params, smoother }
    }

    pub fn smoother(&self) -> &S {
        &self.smoother
    }

    /// The number of points spanning `chrom_fwhm` in `trace`, at least one.
    ///
    /// Uses the trace's nominal scan time, or its average cycle time if that is not set.
    pub fn window_size(&self, trace: &MassTrace) -> usize {
        let scan_time = if trace.scan_time > 0.0 {
            trace.scan_time
        } else {
            trace.average_cycle_time()
        };
        if scan_time <= 0.0 {
            return 1;
        }
        ((self.params.chrom_fwhm / scan_time).ceil() as usize).max(1)
    }

    /// Smooth `trace`'s raw intensities and store the result on it, returning the window size
    pub fn smooth_trace(&self, trace: &mut MassTrace) -> Result<usize, TraceError> {
        let window = self.window_size(trace);
        let smoothed =
            self.smoother
                .smooth(&trace.retention_times(), &trace.raw_intensities(), window);
        trace.set_smoothed_intensities(smoothed)?;
        Ok(window)
    }

    /// Find the maxima and separating valleys of an already smoothed `trace`.
    ///
    /// Fails with [`TraceError::InvalidValue`] if the trace has no smoothed intensities.
    pub fn find_local_extrema(&self, trace: &MassTrace) -> Result<LocalExtrema, TraceError> {
        if !trace.has_smoothed_intensities() {
            return Err(TraceError::InvalidValue(
                "MassTrace has no smoothed intensities",
            ));
        }
        let num_neighbors = self.window_size(trace) / 2;
        Ok(find_local_extrema(
            &trace.retention_times(),
            trace.smoothed_intensities(),
            num_neighbors,
            self.params.min_fwhm,
        ))
    }

    fn passes_filters(&self, trace: &MassTrace) -> Result<bool, TraceError> {
        if self.params.width_filtering == PeakWidthFiltering::Fixed {
            let fwhm = trace.fwhm()?;
            if fwhm < self.params.min_fwhm || fwhm > self.params.max_fwhm {
                trace!("Rejected {} with FWHM {fwhm:.3}", trace.label());
                return Ok(false);
            }
        }
        if self.params.masstrace_snr_filtering {
            let snr = trace.compute_apex_snr()?;
            if snr < self.params.chrom_peak_snr {
                trace!("Rejected {} with apex SNR {snr:.3}", trace.label());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn finalize_segment(segment: &mut MassTrace) -> Result<(), TraceError> {
        segment.update_smoothed_max_rt()?;
        segment.update_weighted_mean_mz()?;
        segment.update_weighted_mz_sd()?;
        segment.estimate_fwhm(true)?;
        Ok(())
    }

    /// Split `trace` into its elution peaks.
    ///
    /// A trace with a single maximum is returned whole, with its label unchanged. A
    /// trace with no positive maximum yields nothing. Otherwise each segment, up to
    /// and including a valley, becomes a new trace labeled `{label}.{k}` counting
    /// from 1. Every result carries smoothed intensities and an FWHM estimate.
    pub fn detect_peaks(&self, trace: &MassTrace) -> Result<Vec<MassTrace>, TraceError> {
        if trace.is_empty() {
            return Err(TraceError::InvalidValue("MassTrace is empty"));
        }
        let mut work = trace.clone();
        self.smooth_trace(&mut work)?;
        let extrema = self.find_local_extrema(&work)?;

        if extrema.maxima.is_empty() {
            debug!("Dropping {}, it has no maxima", trace.label());
            return Ok(Vec::new());
        }

        let mut peaks = Vec::new();
        if extrema.minima.is_empty() {
            work.update_smoothed_max_rt()?;
            work.estimate_fwhm(true)?;
            if self.passes_filters(&work)? {
                peaks.push(work);
            }
            return Ok(peaks);
        }

        let mut bounds = extrema.minima;
        bounds.push(work.len() - 1);
        let mut start = 0;
        for (k, end) in bounds.into_iter().enumerate() {
            let mut segment = work.sub_trace(start..end + 1);
            segment.set_label(format!("{}.{}", work.label(), k + 1));
            start = end + 1;
            if let Err(err) = Self::finalize_segment(&mut segment) {
                debug!("Skipping segment {}: {err}", segment.label());
                continue;
            }
            if self.passes_filters(&segment)? {
                peaks.push(segment);
            }
        }
        Ok(peaks)
    }

    fn detect_peaks_or_skip(&self, trace: &MassTrace) -> Vec<MassTrace> {
        match self.detect_peaks(trace) {
            Ok(peaks) => peaks,
            Err(err) => {
                warn!("Failed to detect elution peaks in {}: {err}", trace.label());
                Vec::new()
            }
        }
    }

    /// Split every trace in `traces`, keeping their order. A trace that fails is
    /// logged and left out.
    pub fn detect_peaks_batch(&self, traces: &[MassTrace]) -> Vec<MassTrace> {
        let peaks: Vec<MassTrace> = split_each(self, traces).into_iter().flatten().collect();
        debug!(
            "Detected {} elution peaks in {} mass traces",
            peaks.len(),
            traces.len()
        );
        peaks
    }

    /// Apply the percentile width filter under [`PeakWidthFiltering::Auto`], and otherwise
    /// return `traces` unchanged.
    pub fn filter_by_peak_width(&self, traces: Vec<MassTrace>) -> Vec<MassTrace> {
        match self.params.width_filtering {
            PeakWidthFiltering::Auto => percentile_width_filter(traces),
            PeakWidthFiltering::Off | PeakWidthFiltering::Fixed => traces,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallelism")] {
        use rayon::prelude::*;

        fn split_each<S: Smoother>(
            detector: &ElutionPeakDetector<S>,
            traces: &[MassTrace],
        ) -> Vec<Vec<MassTrace>> {
            traces
                .par_iter()
                .map(|trace| detector.detect_peaks_or_skip(trace))
                .collect()
        }
    } else {
        fn split_each<S: Smoother>(
            detector: &ElutionPeakDetector<S>,
            traces: &[MassTrace],
        ) -> Vec<Vec<MassTrace>> {
            traces
                .iter()
                .map(|trace| detector.detect_peaks_or_skip(trace))
                .collect()
        }
    }
}

/// Split one trace into elution peaks with the default smoother.
/// See [`ElutionPeakDetector::detect_peaks`].
pub fn detect_elution_peaks(
    trace: &MassTrace,
    params: &ElutionPeakParams,
) -> Result<Vec<MassTrace>, TraceError> {
    params.validate()?;
    ElutionPeakDetector::new(*params).detect_peaks(trace)
}

/// Split many traces into elution peaks with the default smoother, in parallel when
/// the `parallelism` feature is enabled. See [`ElutionPeakDetector::detect_peaks_batch`].
pub fn detect_elution_peaks_batch(
    traces: &[MassTrace],
    params: &ElutionPeakParams,
) -> Result<Vec<MassTrace>, TraceError> {
    params.validate()?;
    Ok(ElutionPeakDetector::new(*params).detect_peaks_batch(traces))
}

/// Filter elution peaks by width under `params.width_filtering`.
/// See [`ElutionPeakDetector::filter_by_peak_width`].
pub fn filter_by_peak_width(traces: Vec<MassTrace>, params: &ElutionPeakParams) -> Vec<MassTrace> {
    ElutionPeakDetector::new(*params).filter_by_peak_width(traces)
}
