//! Plausibility Checking for Normalized Readings

use crate::error::ValidationError;
use health_model::{metric, Reading};
use serde::{Deserialize, Serialize};

/// Physiologically plausible ranges for canonical metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlausibilityConfig {
    /// Heart rate (bpm)
    pub heart_rate_range: (f64, f64),
    /// Systolic pressure (mmHg)
    pub systolic_range: (f64, f64),
    /// Diastolic pressure (mmHg)
    pub diastolic_range: (f64, f64),
    /// Oxygen saturation (%)
    pub spo2_range: (f64, f64),
    /// Body temperature (°C)
    pub temperature_range: (f64, f64),
    /// Blood glucose (mg/dL)
    pub glucose_range: (f64, f64),
    /// Respiratory rate (breaths/min)
    pub respiratory_range: (f64, f64),
}

impl Default for PlausibilityConfig {
    fn default() -> Self {
        Self {
            heart_rate_range: (20.0, 300.0),
            systolic_range: (40.0, 300.0),
            diastolic_range: (20.0, 200.0),
            spo2_range: (50.0, 100.0),
            temperature_range: (25.0, 45.0),
            glucose_range: (10.0, 1500.0),
            respiratory_range: (2.0, 80.0),
        }
    }
}

/// Rejects readings no sensor could honestly have produced
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: PlausibilityConfig,
}

impl Validator {
    pub fn new(config: PlausibilityConfig) -> Self {
        Self { config }
    }

    /// Validate a normalized reading
    pub fn validate(&self, reading: &Reading) -> Result<(), ValidationError> {
        if !reading.value.is_finite() {
            return Err(ValidationError::NonFinite {
                metric: reading.metric.clone(),
            });
        }

        match self.range_for(&reading.metric) {
            Some(range) => self.validate_range(&reading.metric, reading.value, range),
            None => Ok(()),
        }
    }

    fn range_for(&self, name: &str) -> Option<(f64, f64)> {
        let range = match name {
            metric::HEART_RATE => self.config.heart_rate_range,
            metric::SYSTOLIC => self.config.systolic_range,
            metric::DIASTOLIC => self.config.diastolic_range,
            metric::OXYGEN_SATURATION => self.config.spo2_range,
            metric::BODY_TEMPERATURE => self.config.temperature_range,
            metric::BLOOD_GLUCOSE => self.config.glucose_range,
            metric::RESPIRATORY_RATE => self.config.respiratory_range,
            _ => return None,
        };
        Some(range)
    }

    fn validate_range(
        &self,
        name: &str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                metric: name.to_string(),
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }
}
