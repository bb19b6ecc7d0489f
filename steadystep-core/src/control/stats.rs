//! Position error statistics

use libm::{fabsf, sqrtf};

/// How a single error sample compares with the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Excursion {
    None,
    Warning,
    Error,
}

/// Running min/max/mean/RMS of the position error in steps
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorStats {
    count: u32,
    min: f32,
    max: f32,
    sum: f32,
    sum_squares: f32,
    warnings: u32,
    errors: u32,
}

impl ErrorStats {
    pub const fn new() -> Self {
        Self {
            count: 0,
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            sum_squares: 0.0,
            warnings: 0,
            errors: 0,
        }
    }

    /// Add one error sample and classify it
    ///
    /// A threshold of zero is disabled.
    pub fn record(&mut self, error: f32, warning_threshold: f32, error_threshold: f32) -> Excursion {
        if self.count == 0 {
            self.min = error;
            self.max = error;
        } else {
            self.min = self.min.min(error);
            self.max = self.max.max(error);
        }
        self.count = self.count.saturating_add(1);
        self.sum += error;
        self.sum_squares += error * error;

        let magnitude = fabsf(error);
        if error_threshold > 0.0 && magnitude >= error_threshold {
            self.errors = self.errors.saturating_add(1);
            Excursion::Error
        } else if warning_threshold > 0.0 && magnitude >= warning_threshold {
            self.warnings = self.warnings.saturating_add(1);
            Excursion::Warning
        } else {
            Excursion::None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn mean(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f32
        }
    }

    pub fn rms(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            sqrtf(self.sum_squares / self.count as f32)
        }
    }

    /// Samples at or above the warning threshold (but below the error one)
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }
}
