//! Synthetic traces and runs shared by the unit tests.
use crate::mass_trace::MassTrace;
use crate::peak::RawPeak;
use crate::scan::{Scan, ScanCollection};

pub(crate) const SCENARIO_A_TIMES: [f64; 7] =
    [152.22, 153.23, 154.21, 155.24, 156.233, 157.24, 158.238];
pub(crate) const SCENARIO_A_INTENSITIES: [f64; 7] = [
    542.0, 542293.0, 18282393.0, 33329535.0, 17342933.0, 333291.0, 339.0,
];
const SCENARIO_A_MZS: [f64; 7] = [
    230.1021, 230.1019, 230.1020, 230.1018, 230.1022, 230.1020, 230.1024,
];

pub(crate) fn scenario_a_trace() -> MassTrace {
    let peaks = SCENARIO_A_TIMES
        .iter()
        .zip(SCENARIO_A_MZS.iter())
        .zip(SCENARIO_A_INTENSITIES.iter())
        .map(|((rt, mz), inten)| RawPeak::new(*rt, *mz, *inten))
        .collect();
    MassTrace::from_peaks(peaks).unwrap()
}

pub(crate) fn gaussian(t: f64, mu: f64, sigma: f64, height: f64) -> f64 {
    height * (-(t - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Two Gaussian elution events at the same m/z, well separated in time over a flat baseline
pub(crate) fn two_peak_trace() -> MassTrace {
    let peaks = (0..60)
        .map(|i| {
            let t = i as f64;
            let y = gaussian(t, 15.0, 4.0, 1e5) + gaussian(t, 42.0, 4.0, 6e4) + 100.0;
            RawPeak::new(t, 445.12, y)
        })
        .collect();
    let mut trace = MassTrace::from_peaks(peaks).unwrap();
    trace.set_label("T1");
    trace.scan_time = 1.0;
    trace
}

pub(crate) const SPECIES_A_MZ: f64 = 400.2;
pub(crate) const SPECIES_B_MZ: f64 = 512.3;

/// A run of 60 MS1 scans one second apart, interleaved with MS2 scans, holding two
/// co-eluting species at different m/z over a sprinkling of sub-threshold noise peaks.
pub(crate) fn two_species_run() -> ScanCollection {
    let mut scans = Vec::new();
    for i in 0..60 {
        let t = 100.0 + i as f64;
        let jitter = ((i * 7) % 5) as f64 * 0.0002 - 0.0004;
        let mut peaks = vec![
            (SPECIES_A_MZ + jitter, gaussian(t, 120.0, 3.0, 1e6)),
            (SPECIES_B_MZ - jitter, gaussian(t, 125.0, 4.0, 5e5)),
        ];
        for k in 0..4 {
            let mz = 300.0 + ((i * 37 + k * 53) % 97) as f64 * 3.01;
            peaks.push((mz, 4.0));
        }
        peaks.retain(|(_, inten)| *inten > 0.5);
        scans.push(Scan::new(1, t, peaks));
        scans.push(Scan::new(2, t + 0.5, vec![(SPECIES_A_MZ / 2.0, 1e5)]));
    }
    scans.into_iter().collect()
}
