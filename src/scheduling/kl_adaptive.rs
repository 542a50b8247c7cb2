//! KL-adaptive learning rate scheduler.
//!
//! Adjusts a learning rate from the realized policy KL of each update
//! cycle: KL well above the target means the policy moved too much and the
//! rate is cut; KL well below means there is headroom and the rate is
//! raised. Inside the tolerance band the rate is left alone.
//!
//! # Data Validation
//!
//! Constructor arguments are checked with debug panics; in release builds
//! invalid values are sanitized so a bad config cannot produce NaN rates.

/// Learning rate scheduler driven by realized KL divergence.
#[derive(Debug, Clone)]
pub struct KlAdaptiveLr {
    threshold: f64,
    band_factor: f64,
    rate_factor: f64,
    min_rate: f64,
    max_rate: f64,
    rate: f64,
}

impl KlAdaptiveLr {
    /// Create a scheduler with the standard band (2.0) and factor (1.5).
    ///
    /// # Arguments
    ///
    /// * `initial_rate` - Starting learning rate (finite, positive)
    /// * `threshold` - Target KL per update cycle (finite, positive)
    ///
    /// # Panics (debug only)
    ///
    /// Panics if either argument is non-finite or non-positive.
    pub fn new(initial_rate: f64, threshold: f64) -> Self {
        debug_assert!(
            initial_rate.is_finite() && initial_rate > 0.0,
            "KlAdaptiveLr: initial_rate must be finite and positive, got {}",
            initial_rate
        );
        debug_assert!(
            threshold.is_finite() && threshold > 0.0,
            "KlAdaptiveLr: threshold must be finite and positive, got {}",
            threshold
        );

        let initial_rate = if initial_rate.is_finite() && initial_rate > 0.0 {
            initial_rate
        } else {
            1e-4
        };
        let threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            0.008
        };

        Self {
            threshold,
            band_factor: 2.0,
            rate_factor: 1.5,
            min_rate: 1e-6,
            max_rate: 1e-2,
            rate: initial_rate,
        }
    }

    /// Set the tolerance band multiplier around the threshold.
    pub fn with_band_factor(mut self, band_factor: f64) -> Self {
        debug_assert!(
            band_factor.is_finite() && band_factor >= 1.0,
            "KlAdaptiveLr: band_factor must be >= 1.0, got {}",
            band_factor
        );
        self.band_factor = if band_factor.is_finite() && band_factor >= 1.0 {
            band_factor
        } else {
            2.0
        };
        self
    }

    /// Set the multiplicative adjustment factor.
    pub fn with_rate_factor(mut self, rate_factor: f64) -> Self {
        debug_assert!(
            rate_factor.is_finite() && rate_factor > 1.0,
            "KlAdaptiveLr: rate_factor must be > 1.0, got {}",
            rate_factor
        );
        self.rate_factor = if rate_factor.is_finite() && rate_factor > 1.0 {
            rate_factor
        } else {
            1.5
        };
        self
    }

    /// Set the rate clamp bounds.
    pub fn with_bounds(mut self, min_rate: f64, max_rate: f64) -> Self {
        debug_assert!(
            min_rate > 0.0 && max_rate >= min_rate,
            "KlAdaptiveLr: bounds must satisfy 0 < min <= max, got [{}, {}]",
            min_rate,
            max_rate
        );
        if min_rate > 0.0 && max_rate >= min_rate {
            self.min_rate = min_rate;
            self.max_rate = max_rate;
        }
        self
    }

    /// Adjust the rate from the realized KL of the last cycle and return
    /// the new rate.
    ///
    /// Non-finite KL values leave the rate unchanged.
    pub fn update(&mut self, kl: f64) -> f64 {
        if !kl.is_finite() {
            return self.rate;
        }

        if kl > self.threshold * self.band_factor {
            self.rate /= self.rate_factor;
        } else if kl < self.threshold / self.band_factor {
            self.rate *= self.rate_factor;
        }

        self.rate = self.rate.clamp(self.min_rate, self.max_rate);
        self.rate
    }

    /// Current learning rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Target KL threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
