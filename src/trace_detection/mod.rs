//! Greedy, apex-first detection of mass traces in a run of centroided survey scans.
//!
//! Every peak above the noise floor is indexed once. Peaks exceeding the apex
//! signal-to-noise threshold seed traces, most intense first. Each seed grows
//! outward in time one scan at a time, taking the peak nearest the trace's running
//! centroid m/z if it lies within three running standard deviations and has not
//! been claimed yet. A trace that spans enough time with few enough gaps claims
//! all of its peaks, so no peak belongs to two traces.
//!
//! ```rust
//! use mztrace::prelude::*;
//!
//! let scans: ScanCollection = (0..30)
//!     .map(|i| {
//!         let t = i as f64;
//!         let height = 1e5 * (-(t - 15.0).powi(2) / 18.0).exp();
//!         Scan::new(1, t, vec![(301.14, height), (455.2, 5.0)])
//!     })
//!     .collect();
//!
//! let traces = detect_mass_traces(&scans, &MassTraceDetectionParams::default()).unwrap();
//! assert_eq!(traces.len(), 1);
//! assert!((traces[0].centroid_mz() - 301.14).abs() < 1e-6);
//! ```
use std::fmt::{self, Display};
use std::str::FromStr;

use log::{debug, info, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::mass_trace::{MassTrace, QuantMethod};
use crate::scan::ScanSource;
use crate::stats::{mean, variance};

mod running;
mod scan_index;

pub use running::RunningStatistics;
pub use scan_index::ScanIndex;

/// The fewest survey scans a run must have for detection to proceed
pub const MIN_SCANS: usize = 3;

/// The number of scans a direction must have walked before its sample rate is judged
const MIN_SCANS_TO_CONSIDER: usize = 5;

/// How the growth of a trace in one direction is stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceTerminationCriterion {
    /// Stop after more than `trace_termination_outliers` consecutive scans without a match
    #[default]
    Outlier,
    /// Stop once the fraction of walked scans with a match drops below `min_sample_rate`
    SampleRate,
}

impl FromStr for TraceTerminationCriterion {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "outlier" => Ok(Self::Outlier),
            "sample_rate" | "samplerate" => Ok(Self::SampleRate),
            _ => Err(TraceError::IllegalArgument(format!(
                "Unknown trace termination criterion {s:?}"
            ))),
        }
    }
}

impl Display for TraceTerminationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outlier => f.write_str("outlier"),
            Self::SampleRate => f.write_str("sample_rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassTraceDetectionParams {
    /// The m/z tolerance in parts-per-million that seeds each trace's standard deviation
    pub mass_error_ppm: f64,
    /// Peaks below this intensity are never collected
    pub noise_threshold_int: f64,
    /// A peak must exceed `chrom_peak_snr * noise_threshold_int` to seed a trace
    pub chrom_peak_snr: f64,
    /// Whether to re-estimate the m/z standard deviation as a trace grows
    pub reestimate_mt_sd: bool,
    /// The minimum fraction of spanned scans that must contribute a peak
    pub min_sample_rate: f64,
    /// The minimum retention time span of an accepted trace
    pub min_trace_length: f64,
    /// The maximum retention time span of an accepted trace, unbounded if `None`
    pub max_trace_length: Option<f64>,
    pub trace_termination_criterion: TraceTerminationCriterion,
    /// The number of consecutive misses tolerated under [`TraceTerminationCriterion::Outlier`]
    pub trace_termination_outliers: usize,
    /// The quantification method assigned to each trace
    pub quant_method: QuantMethod,
    /// Stop after accepting this many traces
    pub max_traces: Option<usize>,
}

impl Default for MassTraceDetectionParams {
    fn default() -> Self {
        Self {
            mass_error_ppm: 20.0,
            noise_threshold_int: 10.0,
            chrom_peak_snr: 3.0,
            reestimate_mt_sd: true,
            min_sample_rate: 0.5,
            min_trace_length: 5.0,
            max_trace_length: None,
            trace_termination_criterion: TraceTerminationCriterion::Outlier,
            trace_termination_outliers: 5,
            quant_method: QuantMethod::Area,
            max_traces: None,
        }
    }
}

impl MassTraceDetectionParams {
    pub fn mass_error_ppm(mut self, value: f64) -> Self {
        self.mass_error_ppm = value;
        self
    }

    pub fn noise_threshold_int(mut self, value: f64) -> Self {
        self.noise_threshold_int = value;
        self
    }

    pub fn chrom_peak_snr(mut self, value: f64) -> Self {
        self.chrom_peak_snr = value;
        self
    }

    pub fn reestimate_mt_sd(mut self, value: bool) -> Self {
        self.reestimate_mt_sd = value;
        self
    }

    pub fn min_sample_rate(mut self, value: f64) -> Self {
        self.min_sample_rate = value;
        self
    }

    pub fn min_trace_length(mut self, value: f64) -> Self {
        self.min_trace_length = value;
        self
    }

    pub fn max_trace_length(mut self, value: Option<f64>) -> Self {
        self.max_trace_length = value;
        self
    }

    pub fn trace_termination_criterion(mut self, value: TraceTerminationCriterion) -> Self {
        self.trace_termination_criterion = value;
        self
    }

    pub fn trace_termination_outliers(mut self, value: usize) -> Self {
        self.trace_termination_outliers = value;
        self
    }

    pub fn quant_method(mut self, value: QuantMethod) -> Self {
        self.quant_method = value;
        self
    }

    pub fn max_traces(mut self, value: Option<usize>) -> Self {
        self.max_traces = value;
        self
    }

    /// Check that every value is in its legal range
    pub fn validate(&self) -> Result<(), TraceError> {
        let fail = |msg: String| Err(TraceError::IllegalArgument(msg));
        if !(self.mass_error_ppm > 0.0) {
            return fail(format!("mass_error_ppm must be positive, got {}", self.mass_error_ppm));
        }
        if !(self.noise_threshold_int >= 0.0) {
            return fail(format!(
                "noise_threshold_int must not be negative, got {}",
                self.noise_threshold_int
            ));
        }
        if !(self.chrom_peak_snr >= 0.0) {
            return fail(format!("chrom_peak_snr must not be negative, got {}", self.chrom_peak_snr));
        }
        if !(0.0..=1.0).contains(&self.min_sample_rate) {
            return fail(format!(
                "min_sample_rate must be between 0 and 1, got {}",
                self.min_sample_rate
            ));
        }
        if !(self.min_trace_length >= 0.0) {
            return fail(format!(
                "min_trace_length must not be negative, got {}",
                self.min_trace_length
            ));
        }
        if let Some(max_trace_length) = self.max_trace_length {
            if !(max_trace_length >= self.min_trace_length) {
                return fail(format!(
                    "max_trace_length {max_trace_length} is less than min_trace_length {}",
                    self.min_trace_length
                ));
            }
        }
        if self.trace_termination_outliers < 1 {
            return fail("trace_termination_outliers must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Receives `(current, total)` milestones from a long-running detection pass
pub trait ProgressReporter {
    fn report(&self, current: usize, total: usize);
}

impl<F: Fn(usize, usize)> ProgressReporter for F {
    fn report(&self, current: usize, total: usize) {
        self(current, total)
    }
}

/// A peak eligible to seed a trace, located by its position in the survey scan list
#[derive(Debug, Clone, Copy, PartialEq)]
struct ApexCandidate {
    intensity: f64,
    scan: usize,
    peak: usize,
}

/// The progress of one direction of a growing trace
#[derive(Debug, Clone, Copy, Default)]
struct Walk {
    scans_walked: usize,
    hits: usize,
    consecutive_misses: usize,
    open: bool,
}

/// A trace under construction along with the scan positions of its peaks
#[derive(Debug, Default)]
struct TraceBuild {
    trace: MassTrace,
    members: Vec<(usize, usize)>,
    down: Walk,
    up: Walk,
}

impl TraceBuild {
    /// The fraction of spanned scans contributing a peak, ignoring the misses trailing
    /// off either end
    fn quality(&self) -> f64 {
        let spanned = (self.down.scans_walked + self.up.scans_walked + 1)
            .saturating_sub(self.down.consecutive_misses + self.up.consecutive_misses);
        if spanned == 0 {
            return 0.0;
        }
        self.trace.len() as f64 / spanned as f64
    }
}

/// Finds non-overlapping [`MassTrace`]s in the survey scans of a [`ScanSource`]
#[derive(Debug, Clone, Default)]
pub struct MassTraceDetector {
    pub params: MassTraceDetectionParams,
}

impl MassTraceDetector {
    pub fn new(params: MassTraceDetectionParams) -> Self {
        Self { params }
    }

    /// Detect traces in `scans`, ordered by descending intensity of their seed peak.
    ///
    /// Fails with [`TraceError::InsufficientData`] if fewer than [`MIN_SCANS`] survey scans
    /// hold a peak above the noise threshold, and with [`TraceError::IllegalArgument`] if
    /// the parameters are invalid, survey scan times are not strictly increasing, or a
    /// survey scan's m/z and intensity arrays differ in length.
    pub fn detect<S: ScanSource + ?Sized>(&self, scans: &S) -> Result<Vec<MassTrace>, TraceError> {
        self.detect_with_progress(scans, &|_: usize, _: usize| {})
    }

    pub fn detect_with_progress<S: ScanSource + ?Sized, P: ProgressReporter + ?Sized>(
        &self,
        scans: &S,
        progress: &P,
    ) -> Result<Vec<MassTrace>, TraceError> {
        self.params.validate()?;
        let noise = self.params.noise_threshold_int;

        let survey: Vec<usize> = (0..scans.len()).filter(|i| scans.ms_level(*i) == 1).collect();
        if let Some(i) = survey
            .iter()
            .find(|i| scans.mz_array(**i).len() != scans.intensity_array(**i).len())
        {
            return Err(TraceError::IllegalArgument(format!(
                "MS1 scan {i} has {} m/z values but {} intensities",
                scans.mz_array(*i).len(),
                scans.intensity_array(*i).len()
            )));
        }
        let usable = survey
            .iter()
            .filter(|i| scans.intensity_array(**i).iter().any(|v| *v >= noise))
            .count();
        if usable < MIN_SCANS {
            warn!(
                "Only {usable} MS1 scans with signal above {noise}, at least {MIN_SCANS} are required for mass trace detection"
            );
            return Err(TraceError::InsufficientData {
                required: MIN_SCANS,
                found: usable,
            });
        }

        let times: Vec<f64> = survey.iter().map(|i| scans.retention_time(*i)).collect();
        if let Some(pair) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(TraceError::IllegalArgument(format!(
                "MS1 scan times must be strictly increasing, {} followed {}",
                pair[1], pair[0]
            )));
        }
        let cycle_times: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let scan_time = mean(&cycle_times)?;
        debug!(
            "Average MS1 cycle time {scan_time:.4} (variance {:.4e}) over {} scans",
            variance(&cycle_times)?,
            survey.len()
        );

        let mut index = ScanIndex::new(survey.iter().map(|i| scans.mz_array(*i).len()));
        let apex_threshold = self.params.chrom_peak_snr * noise;
        let mut apices = Vec::new();
        for (pos, src) in survey.iter().enumerate() {
            for (peak, intensity) in scans.intensity_array(*src).iter().enumerate() {
                if *intensity < noise {
                    index.visit(pos, peak);
                } else if *intensity > apex_threshold {
                    apices.push(ApexCandidate {
                        intensity: *intensity,
                        scan: pos,
                        peak,
                    });
                }
            }
        }
        // Stable, so equal intensities keep their scan and m/z order
        apices.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        info!(
            "Tracking {} apex candidates among {} peaks in {} MS1 scans",
            apices.len(),
            index.total_peaks(),
            survey.len()
        );

        let total = apices.len();
        let step = (total / 100).max(1);
        let mut traces = Vec::new();
        for (i, apex) in apices.iter().enumerate() {
            if i % step == 0 {
                progress.report(i, total);
            }
            if index.is_visited(apex.scan, apex.peak) {
                continue;
            }

            let build = self.grow_trace(scans, &survey, &index, apex)?;
            if !self.accept(&build) {
                continue;
            }

            let mut trace = build.trace;
            trace.set_label(format!("T{}", traces.len() + 1));
            trace.scan_time = scan_time;
            trace.quant_method = self.params.quant_method;
            if let Err(err) = Self::finalize(&mut trace) {
                debug!("Discarding trace seeded at scan {} peak {}: {err}", apex.scan, apex.peak);
                continue;
            }
            for (scan, peak) in build.members.iter() {
                index.visit(*scan, *peak);
            }
            trace!("Accepted {trace}");
            traces.push(trace);

            if let Some(max_traces) = self.params.max_traces {
                if traces.len() >= max_traces {
                    debug!("Reached the limit of {max_traces} traces");
                    break;
                }
            }
        }
        progress.report(total, total);
        info!(
            "Detected {} mass traces claiming {} peaks",
            traces.len(),
            index.count_visited()
        );
        Ok(traces)
    }

    fn finalize(trace: &mut MassTrace) -> Result<(), TraceError> {
        trace.update_weighted_mean_rt()?;
        trace.update_weighted_mean_mz()?;
        trace.update_weighted_mz_sd()?;
        Ok(())
    }

    fn accept(&self, build: &TraceBuild) -> bool {
        let rt_range = build.trace.trace_length();
        let quality = build.quality();
        let long_enough = rt_range >= self.params.min_trace_length;
        let short_enough = self
            .params
            .max_trace_length
            .map_or(true, |max| rt_range <= max);
        let accepted = long_enough && short_enough && quality >= self.params.min_sample_rate;
        if !accepted && log::log_enabled!(log::Level::Trace) {
            trace!(
                "Rejected trace of {} peaks: RT range {rt_range:.3}, quality {quality:.3}",
                build.trace.len()
            );
        }
        accepted
    }

    fn should_stop(&self, walk: &Walk) -> bool {
        match self.params.trace_termination_criterion {
            TraceTerminationCriterion::Outlier => {
                walk.consecutive_misses > self.params.trace_termination_outliers
            }
            TraceTerminationCriterion::SampleRate => {
                walk.scans_walked > MIN_SCANS_TO_CONSIDER
                    && ((walk.hits + 1) as f64 / (walk.scans_walked + 1) as f64)
                        < self.params.min_sample_rate
            }
        }
    }

    /// Look for the next member of a trace in the survey scan at `pos`
    fn step<S: ScanSource + ?Sized>(
        &self,
        scans: &S,
        src: usize,
        pos: usize,
        index: &ScanIndex,
        stats: &RunningStatistics,
    ) -> Option<usize> {
        let centroid = stats.mean();
        let peak = scans.find_nearest(src, centroid)?;
        if index.is_visited(pos, peak) {
            return None;
        }
        let mz = scans.mz_array(src)[peak];
        if (mz - centroid).abs() <= 3.0 * stats.sd() {
            Some(peak)
        } else {
            None
        }
    }

    /// Grow a trace from `apex` in both directions, alternating one scan at a time
    fn grow_trace<S: ScanSource + ?Sized>(
        &self,
        scans: &S,
        survey: &[usize],
        index: &ScanIndex,
        apex: &ApexCandidate,
    ) -> Result<TraceBuild, TraceError> {
        let seed = scans.peak(survey[apex.scan], apex.peak);
        let mut stats = RunningStatistics::new(
            seed.mz,
            seed.intensity,
            seed.mz / 1e6 * self.params.mass_error_ppm,
        );
        let mut build = TraceBuild::default();
        build.trace.push_back(seed)?;
        build.members.push((apex.scan, apex.peak));

        let n = survey.len();
        let mut down_pos = apex.scan;
        let mut up_pos = apex.scan;
        build.down.open = down_pos > 0;
        build.up.open = up_pos + 1 < n;
        let reestimate = self.params.reestimate_mt_sd;

        while build.down.open || build.up.open {
            if build.down.open {
                down_pos -= 1;
                build.down.scans_walked += 1;
                let src = survey[down_pos];
                if let Some(peak) = self.step(scans, src, down_pos, index, &stats) {
                    let p = scans.peak(src, peak);
                    stats.push(p.mz, p.intensity, reestimate);
                    build.trace.push_front(p)?;
                    build.members.push((down_pos, peak));
                    build.down.hits += 1;
                    build.down.consecutive_misses = 0;
                } else {
                    build.down.consecutive_misses += 1;
                }
                if down_pos == 0 || self.should_stop(&build.down) {
                    build.down.open = false;
                }
            }

            if build.up.open {
                up_pos += 1;
                build.up.scans_walked += 1;
                let src = survey[up_pos];
                if let Some(peak) = self.step(scans, src, up_pos, index, &stats) {
                    let p = scans.peak(src, peak);
                    stats.push(p.mz, p.intensity, reestimate);
                    build.trace.push_back(p)?;
                    build.members.push((up_pos, peak));
                    build.up.hits += 1;
                    build.up.consecutive_misses = 0;
                } else {
                    build.up.consecutive_misses += 1;
                }
                if up_pos + 1 >= n || self.should_stop(&build.up) {
                    build.up.open = false;
                }
            }
        }
        Ok(build)
    }
}

/// Detect mass traces in `scans` with `params`. See [`MassTraceDetector::detect`].
pub fn detect_mass_traces<S: ScanSource + ?Sized>(
    scans: &S,
    params: &MassTraceDetectionParams,
) -> Result<Vec<MassTrace>, TraceError> {
    MassTraceDetector::new(*params).detect(scans)
}
