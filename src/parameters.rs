/// Reference table of monitored water-quality parameters.
///
/// Defines the canonical ranges the classifier compares readings against.
/// The table is built once at startup (either the built-in freshwater
/// community defaults or a TOML file) and is read-only afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{
    PARAM_AMMONIA, PARAM_GH, PARAM_KH, PARAM_NITRATE, PARAM_NITRITE, PARAM_PH, ParameterSpec,
    RangeShape,
};

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

/// Immutable mapping from parameter identifier to its [`ParameterSpec`].
///
/// Iteration follows declaration order, which is the order the page
/// renders its reference table in.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    specs: Vec<ParameterSpec>,
    index: HashMap<String, usize>,
}

/// On-disk layout: a list of `[[parameter]]` tables.
#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(rename = "parameter", default)]
    parameters: Vec<ParameterSpec>,
}

impl ReferenceTable {
    /// Builds a table, rejecting duplicate keys and out-of-order thresholds.
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            validate_spec(spec)?;
            if index.insert(spec.key.clone(), i).is_some() {
                return Err(ConfigError::DuplicateParameter {
                    key: spec.key.clone(),
                });
            }
        }
        Ok(Self { specs, index })
    }

    /// Parses a table from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TableFile = toml::from_str(content)?;
        Self::new(file.parameters)
    }

    /// Reads and parses a TOML table file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Looks up a parameter by identifier. Returns `None` if not found.
    pub fn get(&self, key: &str) -> Option<&ParameterSpec> {
        self.index.get(key).map(|&i| &self.specs[i])
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Ranges for a freshwater community aquarium.
    ///
    /// Ammonia 0 ppm, nitrite 0 ppm, nitrate 0 - 40 ppm (lower preferred),
    /// pH 6.5 - 7.5, GH 4 - 8 dGH / 70 - 140 ppm, KH 3 dKH / 50 ppm or above.
    /// Individual fish and plants may need something different.
    pub fn freshwater_community() -> Self {
        let specs = vec![
            spec(
                PARAM_AMMONIA,
                "Ammonia (NH3/NH4)",
                "Should always remain at 0 once the tank is cycled.",
                RangeShape::ZeroTolerance {
                    unit: "ppm".to_string(),
                    ideal_max: 0.0,
                    caution_above: 0.25,
                    danger_above: 1.0,
                },
            ),
            spec(
                PARAM_NITRITE,
                "Nitrite (NO2)",
                "Persistent nitrite indicates the second phase still in progress.",
                RangeShape::ZeroTolerance {
                    unit: "ppm".to_string(),
                    ideal_max: 0.0,
                    caution_above: 0.25,
                    danger_above: 1.0,
                },
            ),
            spec(
                PARAM_NITRATE,
                "Nitrate (NO3)",
                "Keep as low as practical (<20ppm preferred) via water changes / plants.",
                RangeShape::UpperBounded {
                    unit: "ppm".to_string(),
                    min: 0.0,
                    max: 40.0,
                    preferred_below: 20.0,
                },
            ),
            spec(
                PARAM_PH,
                "pH",
                "General mid-range community pH; species-specific needs may differ.",
                RangeShape::Bounded {
                    unit: "pH".to_string(),
                    min: 6.5,
                    max: 7.5,
                },
            ),
            spec(
                PARAM_GH,
                "General Hardness (GH)",
                "Moderate hardness suitable for many community fish and plants.",
                RangeShape::DualUnitBounded {
                    primary_unit: "dGH".to_string(),
                    alt_unit: "ppm".to_string(),
                    min: 4.0,
                    max: 8.0,
                    alt_min: 70.0,
                    alt_max: 140.0,
                },
            ),
            spec(
                PARAM_KH,
                "Carbonate Hardness (KH)",
                "At least 3 dKH (≈50ppm) helps buffer and stabilize pH.",
                RangeShape::LowerBounded {
                    primary_unit: "dKH".to_string(),
                    alt_unit: "ppm".to_string(),
                    min: 3.0,
                    alt_min: 50.0,
                },
            ),
        ];

        let index = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key.clone(), i))
            .collect();
        Self { specs, index }
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        Self::freshwater_community()
    }
}

fn spec(key: &str, label: &str, description: &str, range: RangeShape) -> ParameterSpec {
    ParameterSpec {
        key: key.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        range,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_spec(spec: &ParameterSpec) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidParameter {
        key: spec.key.clone(),
        reason: reason.to_string(),
    };

    if spec.key.trim().is_empty() {
        return Err(invalid("identifier must not be empty"));
    }
    if spec.range.thresholds().iter().any(|v| !v.is_finite()) {
        return Err(invalid("thresholds must be finite numbers"));
    }

    match &spec.range {
        RangeShape::ZeroTolerance { ideal_max, caution_above, danger_above, .. } => {
            if ideal_max > caution_above {
                return Err(invalid("ideal_max must not exceed caution_above"));
            }
            if caution_above > danger_above {
                return Err(invalid("caution_above must not exceed danger_above"));
            }
        }
        RangeShape::UpperBounded { min, max, preferred_below, .. } => {
            if min > max {
                return Err(invalid("min must not exceed max"));
            }
            if min > preferred_below {
                return Err(invalid("min must not exceed preferred_below"));
            }
            if preferred_below > max {
                return Err(invalid("preferred_below must not exceed max"));
            }
        }
        RangeShape::Bounded { min, max, .. } => {
            if min > max {
                return Err(invalid("min must not exceed max"));
            }
        }
        RangeShape::DualUnitBounded { min, max, alt_min, alt_max, .. } => {
            if min > max || alt_min > alt_max {
                return Err(invalid("min must not exceed max"));
            }
        }
        RangeShape::LowerBounded { .. } => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_contains_all_parameters_in_order() {
        let table = ReferenceTable::freshwater_community();
        assert_eq!(
            table.keys(),
            vec!["ammonia", "nitrite", "nitrate", "ph", "gh", "kh"]
        );
        assert_eq!(table.len(), 6);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_default_table_passes_validation() {
        // Rebuilding through the validating constructor must accept the defaults.
        let specs: Vec<_> = ReferenceTable::freshwater_community().iter().cloned().collect();
        assert!(ReferenceTable::new(specs).is_ok());
    }

    #[test]
    fn test_get_returns_none_for_unknown_key() {
        let table = ReferenceTable::default();
        assert!(table.get("phosphate").is_none());
        assert_eq!(table.get("ph").map(|s| s.label.as_str()), Some("pH"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let ph = ReferenceTable::default().get("ph").cloned().unwrap();
        let err = ReferenceTable::new(vec![ph.clone(), ph]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParameter { ref key } if key == "ph"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let bad = spec(
            "ammonia",
            "Ammonia",
            "",
            RangeShape::ZeroTolerance {
                unit: "ppm".to_string(),
                ideal_max: 0.0,
                caution_above: 2.0,
                danger_above: 1.0,
            },
        );
        let err = ReferenceTable::new(vec![bad]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }), "got {:?}", err);

        let bad_range = spec(
            "ph",
            "pH",
            "",
            RangeShape::Bounded {
                unit: "pH".to_string(),
                min: 8.0,
                max: 6.0,
            },
        );
        assert!(ReferenceTable::new(vec![bad_range]).is_err());
    }

    #[test]
    fn test_preferred_ceiling_below_min_rejected() {
        let bad = spec(
            "nitrate",
            "Nitrate",
            "",
            RangeShape::UpperBounded {
                unit: "ppm".to_string(),
                min: 10.0,
                max: 40.0,
                preferred_below: 5.0,
            },
        );
        let err = ReferenceTable::new(vec![bad]).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidParameter { ref reason, .. } if reason.contains("preferred_below")),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_non_finite_thresholds_rejected() {
        let bad = spec(
            "kh",
            "KH",
            "",
            RangeShape::LowerBounded {
                primary_unit: "dKH".to_string(),
                alt_unit: "ppm".to_string(),
                min: f64::NAN,
                alt_min: 50.0,
            },
        );
        assert!(ReferenceTable::new(vec![bad]).is_err());
    }

    #[test]
    fn test_table_from_toml() {
        let doc = r#"
            [[parameter]]
            key = "ph"
            label = "pH"
            [parameter.range]
            shape = "bounded"
            unit = "pH"
            min = 6.8
            max = 7.8

            [[parameter]]
            key = "kh"
            label = "Carbonate Hardness (KH)"
            description = "Floor only."
            [parameter.range]
            shape = "lower_bounded"
            primary_unit = "dKH"
            alt_unit = "ppm"
            min = 4.0
            alt_min = 70.0
        "#;
        let table = ReferenceTable::from_toml_str(doc).expect("fixture table should parse");
        assert_eq!(table.keys(), vec!["ph", "kh"]);
        match &table.get("ph").unwrap().range {
            RangeShape::Bounded { min, max, .. } => {
                assert_eq!(*min, 6.8);
                assert_eq!(*max, 7.8);
            }
            other => panic!("expected bounded shape, got {:?}", other),
        }
    }

    #[test]
    fn test_table_from_toml_with_unknown_shape_fails() {
        let doc = r#"
            [[parameter]]
            key = "ph"
            label = "pH"
            [parameter.range]
            shape = "triangular"
            unit = "pH"
        "#;
        assert!(matches!(
            ReferenceTable::from_toml_str(doc),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ReferenceTable::load_from_file("/nonexistent/parameters.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
