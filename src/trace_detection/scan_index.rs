//! Flat addressing of every peak in a run, and the record of which peaks a trace has claimed.

const WORD_BITS: usize = u64::BITS as usize;

/// Maps `(scan, peak)` positions to a global peak ordinal using the prefix sums of the
/// per-scan peak counts, and tracks a visited bit per ordinal.
#[derive(Debug, Clone, Default)]
pub struct ScanIndex {
    offsets: Vec<usize>,
    visited: Vec<u64>,
    total_peaks: usize,
}

impl ScanIndex {
    /// Build an index over scans with the given peak counts, in scan order
    pub fn new(peak_counts: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = Vec::new();
        let mut total_peaks = 0;
        for count in peak_counts {
            offsets.push(total_peaks);
            total_peaks += count;
        }
        let visited = vec![0; total_peaks.div_ceil(WORD_BITS)];
        Self {
            offsets,
            visited,
            total_peaks,
        }
    }

    pub fn num_scans(&self) -> usize {
        self.offsets.len()
    }

    pub fn total_peaks(&self) -> usize {
        self.total_peaks
    }

    /// The number of peaks in `scan`
    pub fn scan_len(&self, scan: usize) -> usize {
        let end = self
            .offsets
            .get(scan + 1)
            .copied()
            .unwrap_or(self.total_peaks);
        end - self.offsets[scan]
    }

    #[inline]
    pub fn ordinal(&self, scan: usize, peak: usize) -> usize {
        debug_assert!(peak < self.scan_len(scan));
        self.offsets[scan] + peak
    }

    #[inline]
    pub fn is_visited(&self, scan: usize, peak: usize) -> bool {
        let i = self.ordinal(scan, peak);
        self.visited[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    #[inline]
    pub fn visit(&mut self, scan: usize, peak: usize) {
        let i = self.ordinal(scan, peak);
        self.visited[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    pub fn count_visited(&self) -> usize {
        self.visited.iter().map(|w| w.count_ones() as usize).sum()
    }
}
