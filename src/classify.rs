//! Reading classification against the reference table.
//!
//! Everything here is pure: no I/O, no logging, no shared state. Bad input
//! never produces an error, it produces `Status::Unknown` (no parameter or
//! no value) or `Status::Invalid` (a value that is not a number).

use serde::{Deserialize, Serialize};

use crate::model::{DisplayClass, ParameterSpec, RangeShape, Reading, Status};
use crate::parameters::ReferenceTable;

/// Half-width of the band around the range midpoint that counts as optimal
/// for bounded parameters (pH).
pub const OPTIMAL_BAND: f64 = 0.2;

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// How raw text is turned into a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueParsing {
    /// Uses the longest numeric prefix, so `"12abc"` reads as 12 and
    /// `"7.0 pH"` as 7. This is what browsers do with form input.
    #[default]
    Lenient,
    /// The whole (trimmed) value must be a number.
    Strict,
}

/// Parses a raw reading value. Returns `None` if no number can be read.
pub fn parse_reading_value(raw: &str, mode: ValueParsing) -> Option<f64> {
    let trimmed = raw.trim_start();
    let len = numeric_prefix_len(trimmed);
    if len == 0 {
        return None;
    }
    if mode == ValueParsing::Strict && len != trimmed.trim_end().len() {
        return None;
    }

    let prefix = &trimmed[..len];
    let unsigned = prefix.trim_start_matches(['+', '-']);
    if unsigned == "Infinity" {
        return Some(if prefix.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    prefix.parse::<f64>().ok()
}

/// Length in bytes of the longest decimal-literal prefix of `s`:
/// `[+-]? (Infinity | digits [. digits] | . digits) ([eE] [+-]? digits)?`.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return i + "Infinity".len();
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }

    // Exponent only counts when at least one digit follows it.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies a raw reading for `identifier` using lenient parsing.
///
/// - unknown identifier, `None` or `""` → `Unknown`
/// - no numeric prefix → `Invalid`
/// - otherwise the parameter's shape rules apply
pub fn classify(table: &ReferenceTable, identifier: &str, raw: Option<&str>) -> Status {
    classify_with(table, identifier, raw, ValueParsing::Lenient)
}

/// Same as [`classify`] with an explicit parsing mode.
pub fn classify_with(
    table: &ReferenceTable,
    identifier: &str,
    raw: Option<&str>,
    parsing: ValueParsing,
) -> Status {
    let Some(spec) = table.get(identifier) else {
        return Status::Unknown;
    };
    let raw = match raw {
        None | Some("") => return Status::Unknown,
        Some(raw) => raw,
    };
    match parse_reading_value(raw, parsing) {
        Some(value) => classify_value(spec, value),
        None => Status::Invalid,
    }
}

pub fn classify_reading(table: &ReferenceTable, reading: &Reading) -> Status {
    classify(table, &reading.parameter, reading.value.as_deref())
}

/// Applies the shape rules to an already-numeric value.
///
/// Rules are evaluated top to bottom per shape, first match wins.
pub fn classify_value(spec: &ParameterSpec, value: f64) -> Status {
    if value.is_nan() {
        return Status::Invalid;
    }

    match &spec.range {
        RangeShape::ZeroTolerance { ideal_max, caution_above, danger_above, .. } => {
            if value <= *ideal_max {
                Status::Ideal
            } else if value > *danger_above {
                Status::Danger
            } else if value > *caution_above {
                Status::Warning
            } else {
                Status::Elevated
            }
        }
        RangeShape::UpperBounded { max, preferred_below, .. } => {
            if value <= *preferred_below {
                Status::Preferred
            } else if value <= *max {
                Status::Acceptable
            } else {
                Status::High
            }
        }
        RangeShape::Bounded { min, max, .. } => {
            if value < *min {
                Status::Low
            } else if value > *max {
                Status::High
            } else if (value - (min + max) / 2.0).abs() <= OPTIMAL_BAND {
                Status::Optimal
            } else {
                Status::Acceptable
            }
        }
        RangeShape::DualUnitBounded { min, max, .. } => {
            if value < *min {
                Status::Low
            } else if value > *max {
                Status::High
            } else {
                Status::Acceptable
            }
        }
        // No upper classification: only the floor matters for buffering.
        RangeShape::LowerBounded { min, .. } => {
            if value < *min {
                Status::Low
            } else {
                Status::Acceptable
            }
        }
    }
}

/// Maps every status onto its display bucket.
pub fn status_to_display_class(status: Status) -> DisplayClass {
    match status {
        Status::Ideal | Status::Preferred | Status::Optimal => DisplayClass::Ok,
        Status::Acceptable => DisplayClass::Acceptable,
        Status::Elevated | Status::Low => DisplayClass::Elevated,
        Status::Warning => DisplayClass::Warning,
        Status::High | Status::Danger => DisplayClass::Danger,
        Status::Unknown | Status::Invalid => DisplayClass::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// A reference table bundled with a parsing mode.
///
/// Holds no mutable state, so a shared reference can be used from any
/// number of threads.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: ReferenceTable,
    parsing: ValueParsing,
}

impl Classifier {
    pub fn new(table: ReferenceTable, parsing: ValueParsing) -> Self {
        Self { table, parsing }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn parsing(&self) -> ValueParsing {
        self.parsing
    }

    pub fn classify(&self, identifier: &str, raw: Option<&str>) -> Status {
        classify_with(&self.table, identifier, raw, self.parsing)
    }

    pub fn classify_reading(&self, reading: &Reading) -> Status {
        self.classify(&reading.parameter, reading.value.as_deref())
    }

    /// Status and display bucket in one call.
    pub fn assess(&self, identifier: &str, raw: Option<&str>) -> (Status, DisplayClass) {
        let status = self.classify(identifier, raw);
        (status, status_to_display_class(status))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ReferenceTable::freshwater_community(), ValueParsing::Lenient)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
