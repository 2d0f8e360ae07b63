//! Read-only access to a run of centroided scans.
//!
//! The detector only needs random access to each scan's MS level, acquisition time
//! and m/z-sorted peak arrays, so any in-memory experiment type can take part by
//! implementing [`ScanSource`]. [`ScanCollection`] is the provided implementation.
use mzpeaks::{CentroidPeak, MZPeakSetType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak::RawPeak;
use crate::search::nearest;

/// One centroided scan, its peaks sorted by ascending m/z
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    pub ms_level: u8,
    pub retention_time: f64,
    pub mz_array: Vec<f64>,
    pub intensity_array: Vec<f64>,
}

impl Scan {
    /// Build a scan from `(m/z, intensity)` pairs in any order
    pub fn new(ms_level: u8, retention_time: f64, mut peaks: Vec<(f64, f64)>) -> Self {
        peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (mz_array, intensity_array) = peaks.into_iter().unzip();
        Self {
            ms_level,
            retention_time,
            mz_array,
            intensity_array,
        }
    }

    pub fn len(&self) -> usize {
        self.mz_array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz_array.is_empty()
    }

    pub fn peak(&self, index: usize) -> Option<RawPeak> {
        Some(RawPeak::new(
            self.retention_time,
            *self.mz_array.get(index)?,
            *self.intensity_array.get(index)?,
        ))
    }
}

/// An ordered, random-access collection of scans
pub trait ScanSource {
    /// The number of scans
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ms_level(&self, scan_index: usize) -> u8;

    fn retention_time(&self, scan_index: usize) -> f64;

    /// The m/z values of the scan's peaks in ascending order
    fn mz_array(&self, scan_index: usize) -> &[f64];

    /// The intensities of the scan's peaks, parallel to [`ScanSource::mz_array`]
    fn intensity_array(&self, scan_index: usize) -> &[f64];

    /// The index of the peak in the scan whose m/z is closest to `mz`, the lower
    /// m/z on ties, or `None` for an empty scan
    fn find_nearest(&self, scan_index: usize, mz: f64) -> Option<usize> {
        nearest(self.mz_array(scan_index), mz)
    }

    fn peak(&self, scan_index: usize, peak_index: usize) -> RawPeak {
        RawPeak::new(
            self.retention_time(scan_index),
            self.mz_array(scan_index)[peak_index],
            self.intensity_array(scan_index)[peak_index],
        )
    }
}

/// An in-memory [`ScanSource`] over owned [`Scan`]s, kept in acquisition order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanCollection {
    scans: Vec<Scan>,
}

impl ScanCollection {
    pub fn new(scans: Vec<Scan>) -> Self {
        Self { scans }
    }

    pub fn push(&mut self, scan: Scan) {
        self.scans.push(scan);
    }

    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scan> {
        self.scans.iter()
    }
}

impl ScanSource for ScanCollection {
    fn len(&self) -> usize {
        self.scans.len()
    }

    fn ms_level(&self, scan_index: usize) -> u8 {
        self.scans[scan_index].ms_level
    }

    fn retention_time(&self, scan_index: usize) -> f64 {
        self.scans[scan_index].retention_time
    }

    fn mz_array(&self, scan_index: usize) -> &[f64] {
        &self.scans[scan_index].mz_array
    }

    fn intensity_array(&self, scan_index: usize) -> &[f64] {
        &self.scans[scan_index].intensity_array
    }
}

impl FromIterator<Scan> for ScanCollection {
    fn from_iter<T: IntoIterator<Item = Scan>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Each `(time, peaks)` pair becomes an MS1 scan
impl FromIterator<(f64, MZPeakSetType<CentroidPeak>)> for ScanCollection {
    fn from_iter<T: IntoIterator<Item = (f64, MZPeakSetType<CentroidPeak>)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(time, peaks)| {
                let pairs = peaks
                    .iter()
                    .map(|p| (p.mz, p.intensity as f64))
                    .collect();
                Scan::new(1, time, pairs)
            })
            .collect()
    }
}
