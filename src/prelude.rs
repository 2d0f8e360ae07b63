pub use crate::elution_peaks::{
    detect_elution_peaks, detect_elution_peaks_batch, filter_by_peak_width, ElutionPeakDetector,
    ElutionPeakParams, PeakWidthFiltering,
};
pub use crate::error::TraceError;
pub use crate::mass_trace::{MassTrace, QuantMethod};
pub use crate::peak::RawPeak;
pub use crate::scan::{Scan, ScanCollection, ScanSource};
pub use crate::smooth::Smoother;
pub use crate::trace_detection::{
    detect_mass_traces, MassTraceDetectionParams, MassTraceDetector, ProgressReporter,
};
