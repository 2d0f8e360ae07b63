use std::fmt;

use mzpeaks::peak::MZPoint;
use mzpeaks::{CoordinateLike, IntensityMeasurement, Time, MZ};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// A [`RawPeak`] is a single centroided signal observed in one scan, located in both
/// m/z and retention time.
///
/// It implements [`CoordinateLike`] over both [`MZ`] and [`Time`], so when both traits are in scope
/// use [`MZ::coordinate`] or [`Time::coordinate`] to disambiguate.
pub struct RawPeak {
    /// The acquisition time of the scan this peak was observed in
    pub retention_time: f64,
    pub mz: f64,
    pub intensity: f64,
}

impl RawPeak {
    pub fn new(retention_time: f64, mz: f64, intensity: f64) -> Self {
        Self {
            retention_time,
            mz,
            intensity,
        }
    }
}

impl CoordinateLike<MZ> for RawPeak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Time> for RawPeak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.retention_time
    }
}

impl IntensityMeasurement for RawPeak {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

impl From<RawPeak> for MZPoint {
    fn from(peak: RawPeak) -> Self {
        Self {
            mz: peak.mz,
            intensity: peak.intensity as f32,
        }
    }
}

impl From<RawPeak> for mzpeaks::CentroidPeak {
    fn from(peak: RawPeak) -> Self {
        mzpeaks::CentroidPeak::new(peak.mz, peak.intensity as f32, 0)
    }
}

impl fmt::Display for RawPeak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RawPeak({}, {}, {})",
            self.retention_time, self.mz, self.intensity
        )
    }
}
