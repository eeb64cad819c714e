//! Metric Name and Unit Normalization

use health_model::{metric, Reading};

/// Maps source-specific metric names and units onto canonical ones
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a reading in place.
    ///
    /// Unknown metrics keep their (trimmed, lowercased) name and unit.
    pub fn normalize(&self, mut reading: Reading) -> Reading {
        reading.metric = canonical_metric(&reading.metric);
        let unit = reading.unit.trim().to_ascii_lowercase();

        match reading.metric.as_str() {
            metric::BODY_TEMPERATURE => {
                // Fahrenheit either by unit or by a value no human survives in Celsius
                if matches!(unit.as_str(), "f" | "°f" | "degf" | "fahrenheit")
                    || (unit.is_empty() && reading.value > 50.0)
                {
                    reading.value = (reading.value - 32.0) * 5.0 / 9.0;
                }
                reading.unit = "C".to_string();
            }
            metric::BLOOD_GLUCOSE => {
                if matches!(unit.as_str(), "mmol/l" | "mmol") {
                    reading.value *= 18.0;
                }
                reading.unit = "mg/dL".to_string();
            }
            metric::OXYGEN_SATURATION => {
                if reading.value <= 1.0 && unit != "%" {
                    reading.value *= 100.0;
                }
                reading.unit = "%".to_string();
            }
            metric::HEART_RATE => reading.unit = "bpm".to_string(),
            metric::RESPIRATORY_RATE => reading.unit = "breaths/min".to_string(),
            metric::SYSTOLIC | metric::DIASTOLIC => {
                if unit == "kpa" {
                    reading.value *= 7.50062;
                }
                reading.unit = "mmHg".to_string();
            }
            _ => reading.unit = reading.unit.trim().to_string(),
        }

        reading
    }
}

fn canonical_metric(raw: &str) -> String {
    let key = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let canonical = match key.as_str() {
        "hr" | "pulse" | "heart_rate" | "heartrate" | "current_hr" => metric::HEART_RATE,
        "systolic" | "bp_systolic" | "blood_pressure_systolic" => metric::SYSTOLIC,
        "diastolic" | "bp_diastolic" | "blood_pressure_diastolic" => metric::DIASTOLIC,
        "spo2" | "oxygen_saturation" | "o2_saturation" => metric::OXYGEN_SATURATION,
        "temp" | "body_temp" | "temperature" | "body_temperature" => metric::BODY_TEMPERATURE,
        "glucose" | "blood_glucose" | "blood_sugar" => metric::BLOOD_GLUCOSE,
        "rr" | "respiratory_rate" | "respiration_rate" => metric::RESPIRATORY_RATE,
        _ => return key,
    };
    canonical.to_string()
}
