//! Apex, width, area and noise estimates over a trace's intensity profile.
use crate::arrayops::trapz;
use crate::error::TraceError;
use crate::stats::median;

use super::{MassTrace, QuantMethod};

impl MassTrace {
    fn profile(&self, use_smoothed: bool) -> Result<Vec<f64>, TraceError> {
        if use_smoothed {
            self.check_smoothed()?;
            Ok(self.smoothed_intensities.clone())
        } else {
            self.check_not_empty()?;
            Ok(self.raw_intensities())
        }
    }

    /// Find the index of the most intense peak, the first one on ties.
    ///
    /// Fails with [`TraceError::InvalidValue`] if the trace is empty or, with `use_smoothed`,
    /// the smoothed intensities were never set.
    pub fn find_max_by_intensity(&self, use_smoothed: bool) -> Result<usize, TraceError> {
        let profile = self.profile(use_smoothed)?;
        let mut best = 0;
        for (i, v) in profile.iter().enumerate().skip(1) {
            if *v > profile[best] {
                best = i;
            }
        }
        Ok(best)
    }

    pub fn max_intensity(&self, use_smoothed: bool) -> Result<f64, TraceError> {
        let profile = self.profile(use_smoothed)?;
        let apex = self.find_max_by_intensity(use_smoothed)?;
        Ok(profile[apex])
    }

    /// Estimate the full width at half maximum and record its border indices.
    ///
    /// Starting from the apex, each border is the first index whose intensity is at
    /// or below half the apex intensity. A border that never drops that low clamps to
    /// the first or last index. A single peak has a width of zero.
    pub fn estimate_fwhm(&mut self, use_smoothed: bool) -> Result<f64, TraceError> {
        let profile = self.profile(use_smoothed)?;
        let apex = self.find_max_by_intensity(use_smoothed)?;
        let half_max = profile[apex] / 2.0;

        let mut left = apex;
        while left > 0 && profile[left] > half_max {
            left -= 1;
        }
        let mut right = apex;
        while right + 1 < profile.len() && profile[right] > half_max {
            right += 1;
        }

        let fwhm = (self.peaks[right].retention_time - self.peaks[left].retention_time).abs();
        self.fwhm_borders = Some((left, right));
        self.fwhm = Some(fwhm);
        log::trace!(
            "Estimated FWHM {fwhm:.3} over [{left}, {right}] for {}",
            self.label
        );
        Ok(fwhm)
    }

    /// The width computed by the last call to [`MassTrace::estimate_fwhm`].
    ///
    /// Fails with [`TraceError::InvalidValue`] if it was never estimated or the trace
    /// has grown since.
    pub fn fwhm(&self) -> Result<f64, TraceError> {
        self.fwhm.ok_or(TraceError::InvalidValue("MassTrace FWHM has not been estimated"))
    }

    /// Whether [`MassTrace::fwhm`] holds a current estimate
    pub fn has_fwhm(&self) -> bool {
        self.fwhm.is_some()
    }

    /// The inclusive peak index range the last FWHM estimate spans
    pub fn fwhm_borders(&self) -> Result<(usize, usize), TraceError> {
        self.fwhm_borders
            .ok_or(TraceError::InvalidValue("MassTrace FWHM has not been estimated"))
    }

    fn area_between(&self, values: &[f64], start: usize, end: usize) -> f64 {
        if self.peaks.is_empty() {
            return 0.0;
        }
        let end = end.min(self.peaks.len() - 1);
        let start = start.min(end);
        let times = self.retention_times();
        trapz(&times[start..=end], &values[start..=end])
    }

    /// The trapezoid-rule area under the raw intensity profile, `0.0` for fewer than two peaks
    pub fn compute_peak_area(&self) -> f64 {
        let raw = self.raw_intensities();
        trapz(&self.retention_times(), &raw)
    }

    pub fn compute_smoothed_peak_area(&self) -> Result<f64, TraceError> {
        self.check_smoothed()?;
        Ok(trapz(&self.retention_times(), &self.smoothed_intensities))
    }

    /// The raw intensity area between the recorded FWHM borders, inclusive.
    ///
    /// Fails with [`TraceError::InvalidValue`] unless the FWHM has been estimated.
    pub fn compute_fwhm_area(&self) -> Result<f64, TraceError> {
        let (start, end) = self.fwhm_borders()?;
        Ok(self.area_between(&self.raw_intensities(), start, end))
    }

    pub fn compute_fwhm_area_smooth(&self) -> Result<f64, TraceError> {
        self.check_smoothed()?;
        let (start, end) = self.fwhm_borders()?;
        Ok(self.area_between(&self.smoothed_intensities, start, end))
    }

    /// Narrow the FWHM borders to the region where the profile falls away from the
    /// apex, allowing one rising step on each side before stopping.
    fn robust_borders(&self, values: &[f64], apex: usize) -> Result<(usize, usize), TraceError> {
        let (lb, rb) = self.fwhm_borders()?;
        if apex < lb || apex > rb {
            return Ok((lb, rb));
        }

        let mut left = apex;
        let mut tolerance = 1;
        while left > lb {
            if values[left - 1] <= values[left] {
                left -= 1;
            } else if tolerance > 0 {
                tolerance -= 1;
                left -= 1;
            } else {
                break;
            }
        }

        let mut right = apex;
        tolerance = 1;
        while right < rb {
            if values[right + 1] <= values[right] {
                right += 1;
            } else if tolerance > 0 {
                tolerance -= 1;
                right += 1;
            } else {
                break;
            }
        }
        Ok((left, right))
    }

    /// Like [`MassTrace::compute_fwhm_area`], but stops integrating where the raw profile
    /// turns back up for more than one point
    pub fn compute_fwhm_area_robust(&self) -> Result<f64, TraceError> {
        let values = self.profile(false)?;
        let apex = self.find_max_by_intensity(false)?;
        let (start, end) = self.robust_borders(&values, apex)?;
        Ok(self.area_between(&values, start, end))
    }

    pub fn compute_fwhm_area_smooth_robust(&self) -> Result<f64, TraceError> {
        let values = self.profile(true)?;
        let apex = self.find_max_by_intensity(true)?;
        let (start, end) = self.robust_borders(&values, apex)?;
        Ok(self.area_between(&values, start, end))
    }

    /// Summarize the trace's abundance according to its [`QuantMethod`].
    pub fn intensity(&self, use_smoothed: bool) -> Result<f64, TraceError> {
        match self.quant_method {
            QuantMethod::Area => {
                if use_smoothed {
                    self.compute_smoothed_peak_area()
                } else {
                    self.check_not_empty()?;
                    Ok(self.compute_peak_area())
                }
            }
            QuantMethod::Median => median(&self.profile(use_smoothed)?),
            QuantMethod::MaxHeight => self.max_intensity(use_smoothed),
        }
    }

    /// The root mean squared error between the raw and smoothed intensities
    pub fn compute_mass_trace_noise(&self) -> Result<f64, TraceError> {
        self.check_smoothed()?;
        let sse: f64 = self
            .peaks
            .iter()
            .zip(self.smoothed_intensities.iter())
            .map(|(p, s)| (p.intensity - s).powi(2))
            .sum();
        Ok((sse / self.peaks.len() as f64).sqrt())
    }

    /// The smoothed area relative to the noise level spread over the trace's length.
    ///
    /// A noiseless trace has an infinite ratio.
    pub fn compute_mass_trace_snr(&self) -> Result<f64, TraceError> {
        let noise_area = self.compute_mass_trace_noise()? * self.trace_length();
        let area = self.compute_smoothed_peak_area()?;
        if noise_area > 0.0 {
            Ok(area / noise_area)
        } else {
            Ok(f64::INFINITY)
        }
    }

    /// The smoothed apex intensity relative to the noise level.
    ///
    /// A noiseless trace has an infinite ratio.
    pub fn compute_apex_snr(&self) -> Result<f64, TraceError> {
        let noise = self.compute_mass_trace_noise()?;
        let apex = self.max_intensity(true)?;
        if noise > 0.0 {
            Ok(apex / noise)
        } else {
            Ok(f64::INFINITY)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peak::RawPeak;
    use crate::test_data::scenario_a_trace;

    #[test]
    fn test_scenario_a_apex_and_width() {
        let mut trace = scenario_a_trace();
        assert_eq!(trace.find_max_by_intensity(false).unwrap(), 3);
        assert_eq!(trace.max_intensity(false).unwrap(), 33329535.0);
        let fwhm = trace.estimate_fwhm(false).unwrap();
        assert!((fwhm - 4.01).abs() < 1e-6, "{fwhm}");
        assert_eq!(trace.fwhm_borders().unwrap(), (1, 5));
        assert_eq!(trace.fwhm().unwrap(), fwhm);
    }

    #[test]
    fn test_single_point_width() {
        let mut trace = MassTrace::from_peaks(vec![RawPeak::new(5.0, 300.0, 1e4)]).unwrap();
        assert_eq!(trace.estimate_fwhm(false).unwrap(), 0.0);
        assert_eq!(trace.fwhm_borders().unwrap(), (0, 0));
        assert_eq!(trace.compute_peak_area(), 0.0);
    }

    #[test]
    fn test_apex_at_edge_clamps() {
        let mut trace = MassTrace::from_peaks(vec![
            RawPeak::new(1.0, 300.0, 100.0),
            RawPeak::new(2.0, 300.0, 80.0),
            RawPeak::new(3.0, 300.0, 30.0),
        ])
        .unwrap();
        let fwhm = trace.estimate_fwhm(false).unwrap();
        assert_eq!(trace.fwhm_borders().unwrap(), (0, 2));
        assert_eq!(fwhm, 2.0);
    }

    #[test]
    fn test_smoothed_accessors_require_smoothing() {
        let mut trace = scenario_a_trace();
        assert!(matches!(
            trace.find_max_by_intensity(true),
            Err(TraceError::InvalidValue(_))
        ));
        assert!(matches!(
            trace.max_intensity(true),
            Err(TraceError::InvalidValue(_))
        ));
        assert!(matches!(trace.intensity(true), Err(TraceError::InvalidValue(_))));
        assert!(matches!(
            trace.compute_mass_trace_noise(),
            Err(TraceError::InvalidValue(_))
        ));

        trace.set_smoothed_intensities(vec![0.0; 7]).unwrap();
        assert_eq!(trace.max_intensity(true).unwrap(), 0.0);
        assert_eq!(trace.find_max_by_intensity(true).unwrap(), 0);
    }

    #[test]
    fn test_areas() {
        let mut trace = MassTrace::from_peaks(vec![
            RawPeak::new(0.0, 300.0, 0.0),
            RawPeak::new(1.0, 300.0, 10.0),
            RawPeak::new(2.0, 300.0, 20.0),
            RawPeak::new(3.0, 300.0, 10.0),
            RawPeak::new(4.0, 300.0, 0.0),
        ])
        .unwrap();
        assert_eq!(trace.compute_peak_area(), 40.0);
        trace.estimate_fwhm(false).unwrap();
        assert_eq!(trace.fwhm_borders().unwrap(), (1, 3));
        assert_eq!(trace.compute_fwhm_area().unwrap(), 30.0);
        assert_eq!(trace.compute_fwhm_area_robust().unwrap(), 30.0);

        trace.set_smoothed_intensities(trace.raw_intensities()).unwrap();
        assert_eq!(trace.compute_smoothed_peak_area().unwrap(), 40.0);
        assert_eq!(trace.compute_fwhm_area_smooth().unwrap(), 30.0);
        assert_eq!(trace.compute_fwhm_area_smooth_robust().unwrap(), 30.0);
    }

    #[test]
    fn test_width_requires_estimate() {
        let mut trace = MassTrace::from_peaks(
            [0.0, 10.0, 40.0, 80.0, 100.0, 80.0, 40.0, 10.0, 0.0]
                .iter()
                .enumerate()
                .map(|(i, y)| RawPeak::new(i as f64, 300.0, *y))
                .collect(),
        )
        .unwrap();
        let unset = |r: Result<f64, TraceError>| matches!(r, Err(TraceError::InvalidValue(_)));
        assert!(!trace.has_fwhm());
        assert!(unset(trace.fwhm()));
        assert!(trace.fwhm_borders().is_err());
        assert!(unset(trace.compute_fwhm_area()));
        assert!(unset(trace.compute_fwhm_area_robust()));
        trace.set_smoothed_intensities(trace.raw_intensities()).unwrap();
        assert!(unset(trace.compute_fwhm_area_smooth()));

        assert_eq!(trace.estimate_fwhm(false).unwrap(), 4.0);
        assert_eq!(trace.fwhm_borders().unwrap(), (2, 6));
        assert_eq!(trace.compute_fwhm_area().unwrap(), 300.0);

        trace.push_back(RawPeak::new(100.0, 300.0, 500.0)).unwrap();
        assert!(!trace.has_fwhm());
        assert!(unset(trace.fwhm()));
        assert!(trace.fwhm_borders().is_err());
        assert!(unset(trace.compute_fwhm_area()));

        trace.estimate_fwhm(false).unwrap();
        assert_eq!(trace.fwhm_borders().unwrap(), (8, 9));
        trace.push_front(RawPeak::new(-1.0, 300.0, 5.0)).unwrap();
        assert!(unset(trace.fwhm()));
    }

    #[test]
    fn test_robust_area_stops_at_rebound() {
        let mut trace = MassTrace::from_peaks(
            [95.0, 90.0, 70.0, 80.0, 100.0, 80.0, 70.0, 60.0, 40.0]
                .iter()
                .enumerate()
                .map(|(i, y)| RawPeak::new(i as f64, 300.0, *y))
                .collect(),
        )
        .unwrap();
        trace.estimate_fwhm(false).unwrap();
        assert_eq!(trace.fwhm_borders().unwrap(), (0, 8));
        let full = trace.compute_fwhm_area().unwrap();
        let robust = trace.compute_fwhm_area_robust().unwrap();
        assert!(robust < full);
    }

    #[test]
    fn test_quantification() {
        let mut trace = scenario_a_trace();
        trace.quant_method = QuantMethod::MaxHeight;
        assert_eq!(trace.intensity(false).unwrap(), 33329535.0);
        trace.quant_method = QuantMethod::Median;
        assert_eq!(trace.intensity(false).unwrap(), 542293.0);
        trace.quant_method = QuantMethod::Area;
        assert_eq!(trace.intensity(false).unwrap(), trace.compute_peak_area());
    }

    #[test]
    fn test_noise_and_snr() {
        let mut trace = scenario_a_trace();
        trace.set_smoothed_intensities(trace.raw_intensities()).unwrap();
        assert_eq!(trace.compute_mass_trace_noise().unwrap(), 0.0);
        assert!(trace.compute_apex_snr().unwrap().is_infinite());

        let smoothed: Vec<f64> = trace.raw_intensities().iter().map(|v| v + 100.0).collect();
        trace.set_smoothed_intensities(smoothed).unwrap();
        assert!((trace.compute_mass_trace_noise().unwrap() - 100.0).abs() < 1e-9);
        let snr = trace.compute_apex_snr().unwrap();
        assert!((snr - 33329635.0 / 100.0).abs() < 1e-6);
        assert!(trace.compute_mass_trace_snr().unwrap() > 1.0);
    }
}
