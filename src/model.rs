/// Core data types for the aquarium water-test tracker.
///
/// This module defines the shared domain model imported by the reference
/// table, the classifier and the binary. It contains no I/O and no
/// classification logic, only types and their display helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Parameter identifiers
// ---------------------------------------------------------------------------

pub const PARAM_AMMONIA: &str = "ammonia";
pub const PARAM_NITRITE: &str = "nitrite";
pub const PARAM_NITRATE: &str = "nitrate";
pub const PARAM_PH: &str = "ph";
/// General hardness.
pub const PARAM_GH: &str = "gh";
/// Carbonate hardness.
pub const PARAM_KH: &str = "kh";

// ---------------------------------------------------------------------------
// Parameter specs
// ---------------------------------------------------------------------------

/// Reference range for one monitored water-quality parameter.
///
/// Ranges are not uniform across parameters, so the thresholds live in a
/// [`RangeShape`] and classification dispatches on the shape rather than
/// on the parameter key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub range: RangeShape,
}

/// Parameter-specific threshold layout.
///
/// Thresholds are non-decreasing where more than one exists:
///   ideal_max <= caution_above <= danger_above
///   min <= preferred_below <= max
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RangeShape {
    /// Anything above zero is undesirable (ammonia, nitrite).
    ZeroTolerance {
        unit: String,
        ideal_max: f64,
        caution_above: f64,
        danger_above: f64,
    },
    /// Upper bound with a lower preferred ceiling (nitrate).
    UpperBounded {
        unit: String,
        #[serde(default)]
        min: f64,
        max: f64,
        preferred_below: f64,
    },
    /// Plain min/max range (pH).
    Bounded { unit: String, min: f64, max: f64 },
    /// Min/max in a primary unit; the alternate unit is display only (GH).
    DualUnitBounded {
        primary_unit: String,
        alt_unit: String,
        min: f64,
        max: f64,
        alt_min: f64,
        alt_max: f64,
    },
    /// Floor only, no upper classification (KH).
    LowerBounded {
        primary_unit: String,
        alt_unit: String,
        min: f64,
        alt_min: f64,
    },
}

impl RangeShape {
    /// Unit the classification thresholds are expressed in.
    pub fn unit(&self) -> &str {
        match self {
            RangeShape::ZeroTolerance { unit, .. }
            | RangeShape::UpperBounded { unit, .. }
            | RangeShape::Bounded { unit, .. } => unit,
            RangeShape::DualUnitBounded { primary_unit, .. }
            | RangeShape::LowerBounded { primary_unit, .. } => primary_unit,
        }
    }

    /// All numeric thresholds carried by this shape, display-only ones included.
    pub(crate) fn thresholds(&self) -> Vec<f64> {
        match self {
            RangeShape::ZeroTolerance { ideal_max, caution_above, danger_above, .. } => {
                vec![*ideal_max, *caution_above, *danger_above]
            }
            RangeShape::UpperBounded { min, max, preferred_below, .. } => {
                vec![*min, *max, *preferred_below]
            }
            RangeShape::Bounded { min, max, .. } => vec![*min, *max],
            RangeShape::DualUnitBounded { min, max, alt_min, alt_max, .. } => {
                vec![*min, *max, *alt_min, *alt_max]
            }
            RangeShape::LowerBounded { min, alt_min, .. } => vec![*min, *alt_min],
        }
    }
}

impl ParameterSpec {
    /// Human-readable range, as shown in the page's reference table.
    ///
    /// ```text
    /// 0 ppm
    /// 0 - 40 ppm (< 20 preferred)
    /// 6.5 - 7.5 pH
    /// 4 - 8 dGH / 70 - 140 ppm
    /// >= 3 dKH / 50 ppm
    /// ```
    pub fn range_summary(&self) -> String {
        match &self.range {
            RangeShape::ZeroTolerance { unit, ideal_max, .. } => format!("{} {}", ideal_max, unit),
            RangeShape::UpperBounded { unit, min, max, preferred_below } => {
                format!("{} - {} {} (< {} preferred)", min, max, unit, preferred_below)
            }
            RangeShape::Bounded { unit, min, max } => format!("{} - {} {}", min, max, unit),
            RangeShape::DualUnitBounded { primary_unit, alt_unit, min, max, alt_min, alt_max } => {
                format!(
                    "{} - {} {} / {} - {} {}",
                    min, max, primary_unit, alt_min, alt_max, alt_unit
                )
            }
            RangeShape::LowerBounded { primary_unit, alt_unit, min, alt_min } => {
                format!(">= {} {} / {} {}", min, primary_unit, alt_min, alt_unit)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// A single observed value for a parameter, exactly as entered.
///
/// `value` is `None` when the field was never filled in; an empty string is
/// kept as-is and treated the same way by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub parameter: String,
    pub value: Option<String>,
}

impl Reading {
    pub fn new(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value: Some(value.into()),
        }
    }

    pub fn missing(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification outcomes
// ---------------------------------------------------------------------------

/// Qualitative outcome of classifying one reading. Recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ideal,
    Preferred,
    Optimal,
    Acceptable,
    Elevated,
    Low,
    Warning,
    High,
    Danger,
    /// Unknown parameter, or no value supplied.
    Unknown,
    /// Value supplied but not numeric.
    Invalid,
}

impl Status {
    pub const ALL: [Status; 11] = [
        Status::Ideal,
        Status::Preferred,
        Status::Optimal,
        Status::Acceptable,
        Status::Elevated,
        Status::Low,
        Status::Warning,
        Status::High,
        Status::Danger,
        Status::Unknown,
        Status::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ideal => "ideal",
            Status::Preferred => "preferred",
            Status::Optimal => "optimal",
            Status::Acceptable => "acceptable",
            Status::Elevated => "elevated",
            Status::Low => "low",
            Status::Warning => "warning",
            Status::High => "high",
            Status::Danger => "danger",
            Status::Unknown => "unknown",
            Status::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse visual-severity bucket derived from a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayClass {
    Ok,
    Acceptable,
    Elevated,
    Warning,
    Danger,
    Unknown,
}

impl DisplayClass {
    /// CSS class name used by the host page.
    pub fn css_class(&self) -> &'static str {
        match self {
            DisplayClass::Ok => "param-ok",
            DisplayClass::Acceptable => "param-acceptable",
            DisplayClass::Elevated => "param-elevated",
            DisplayClass::Warning => "param-warning",
            DisplayClass::Danger => "param-danger",
            DisplayClass::Unknown => "param-unknown",
        }
    }
}

impl fmt::Display for DisplayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Preferred).unwrap();
        assert_eq!(json, "\"preferred\"");
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_css_class_names() {
        assert_eq!(DisplayClass::Ok.css_class(), "param-ok");
        assert_eq!(DisplayClass::Danger.to_string(), "param-danger");
        assert_eq!(DisplayClass::Unknown.css_class(), "param-unknown");
    }

    #[test]
    fn test_range_summary_formats() {
        let nitrate = ParameterSpec {
            key: PARAM_NITRATE.to_string(),
            label: "Nitrate (NO3)".to_string(),
            description: String::new(),
            range: RangeShape::UpperBounded {
                unit: "ppm".to_string(),
                min: 0.0,
                max: 40.0,
                preferred_below: 20.0,
            },
        };
        assert_eq!(nitrate.range_summary(), "0 - 40 ppm (< 20 preferred)");

        let kh = ParameterSpec {
            key: PARAM_KH.to_string(),
            label: "Carbonate Hardness (KH)".to_string(),
            description: String::new(),
            range: RangeShape::LowerBounded {
                primary_unit: "dKH".to_string(),
                alt_unit: "ppm".to_string(),
                min: 3.0,
                alt_min: 50.0,
            },
        };
        assert_eq!(kh.range_summary(), ">= 3 dKH / 50 ppm");
        assert_eq!(kh.range.unit(), "dKH");
    }

    #[test]
    fn test_reading_constructors() {
        let r = Reading::new(PARAM_PH, "7.0");
        assert_eq!(r.value.as_deref(), Some("7.0"));
        assert!(Reading::missing(PARAM_PH).value.is_none());
    }
}
