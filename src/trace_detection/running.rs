//! Incremental centroid and spread estimates for a trace that is still growing.

/// The running intensity-weighted mean m/z of a growing trace and the m/z standard
/// deviation used to bound where its next peak may fall.
///
/// The mean is rescaled multiplicatively on each new point instead of being summed
/// from scratch, and the spread is combined in log space so that intensities spanning
/// many orders of magnitude do not overflow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStatistics {
    mean: f64,
    sd: f64,
    weighted_sum: f64,
    weight_sum: f64,
}

impl RunningStatistics {
    /// Start from a single point with an a priori standard deviation
    pub fn new(mz: f64, intensity: f64, initial_sd: f64) -> Self {
        Self {
            mean: mz,
            sd: initial_sd,
            weighted_sum: mz * intensity,
            weight_sum: intensity,
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Fold a new point into the mean, and into the standard deviation if `reestimate_sd`
    pub fn push(&mut self, mz: f64, intensity: f64, reestimate_sd: bool) {
        let previous_weight_sum = self.weight_sum;
        self.update_mean(mz, intensity);
        if reestimate_sd {
            self.update_sd(mz, intensity, previous_weight_sum);
        }
    }

    fn update_mean(&mut self, mz: f64, intensity: f64) {
        if self.weighted_sum > 0.0 && self.weight_sum > 0.0 {
            let counter_ratio = 1.0 + (intensity * mz) / self.weighted_sum;
            let denom_ratio = 1.0 + intensity / self.weight_sum;
            self.mean *= counter_ratio / denom_ratio;
            self.weighted_sum *= counter_ratio;
            self.weight_sum *= denom_ratio;
        } else {
            self.weighted_sum += intensity * mz;
            self.weight_sum += intensity;
            if self.weight_sum > 0.0 {
                self.mean = self.weighted_sum / self.weight_sum;
            }
        }
    }

    /// `sd'^2 = sd^2 * W / W' + (mz - mean')^2 * w / W'`, evaluated term by term in log space.
    /// The estimate is kept unchanged if the update collapses it to zero.
    fn update_sd(&mut self, mz: f64, intensity: f64, previous_weight_sum: f64) {
        if intensity <= 0.0 || previous_weight_sum <= 0.0 || self.weight_sum <= 0.0 {
            return;
        }
        let log_weight_sum = self.weight_sum.ln();
        let carried = (2.0 * self.sd.ln() + previous_weight_sum.ln() - log_weight_sum).exp();
        let added = (2.0 * (mz - self.mean).abs().ln() + intensity.ln() - log_weight_sum).exp();
        let sd = (carried + added).sqrt();
        if sd > f64::EPSILON {
            self.sd = sd;
        }
    }
}
