//! `mztrace` finds mass traces in a run of centroided LC-MS scans and splits
//! them into chromatographic elution peaks.
//!
//! A mass trace is a run of peaks at a consistent m/z across consecutive survey
//! scans. [`MassTraceDetector`] finds them greedily, most intense first, so that
//! no peak is claimed by two traces. [`ElutionPeakDetector`] then smooths each
//! trace's intensity profile and splits it at deep valleys between local maxima,
//! optionally filtering the pieces by their width and signal-to-noise ratio.
//!
//! Scans are read through the [`ScanSource`] trait, which [`ScanCollection`]
//! implements over owned [`Scan`]s or over `(time, MZPeakSetType<CentroidPeak>)`
//! pairs from `mzpeaks`.
//!
//! # Usage
//! ```
//! use mztrace::prelude::*;
//!
//! let scans: ScanCollection = (0..60)
//!     .map(|i| {
//!         let t = i as f64;
//!         let height = 1e5 * (-(t - 15.0).powi(2) / 32.0).exp()
//!             + 6e4 * (-(t - 42.0).powi(2) / 32.0).exp()
//!             + 100.0;
//!         Scan::new(1, t, vec![(445.12, height)])
//!     })
//!     .collect();
//!
//! let traces = detect_mass_traces(&scans, &MassTraceDetectionParams::default()).unwrap();
//! assert_eq!(traces.len(), 1);
//!
//! let params = ElutionPeakParams::default();
//! let peaks = detect_elution_peaks_batch(&traces, &params).unwrap();
//! let peaks = filter_by_peak_width(peaks, &params);
//! assert_eq!(peaks.len(), 2);
//! for peak in peaks.iter() {
//!     println!("{peak} FWHM={:.2}", peak.fwhm().unwrap());
//! }
//! ```
//!
//! ## Features
//! - `parallelism` (default) splits traces into elution peaks on a `rayon` thread pool.
//! - `serde` derives `Serialize` and `Deserialize` for peaks, traces, scans and parameters.
pub mod arrayops;
pub mod elution_peaks;
pub mod error;
pub mod mass_trace;
pub mod peak;
pub mod prelude;
pub mod scan;
pub mod search;
pub mod smooth;
pub mod stats;
pub mod trace_detection;

#[cfg(test)]
mod test_data;

pub use crate::elution_peaks::{
    detect_elution_peaks, detect_elution_peaks_batch, filter_by_peak_width, ElutionPeakDetector,
    ElutionPeakParams, PeakWidthFiltering,
};
pub use crate::error::TraceError;
pub use crate::mass_trace::{ConvexHull, MassTrace, QuantMethod};
pub use crate::peak::RawPeak;
pub use crate::scan::{Scan, ScanCollection, ScanSource};
pub use crate::smooth::{LowessSmoother, MovingAverageSmoother, Smoother};
pub use crate::trace_detection::{
    detect_mass_traces, MassTraceDetectionParams, MassTraceDetector, ProgressReporter,
    TraceTerminationCriterion,
};
