use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Dimension that can veto an opportunity on its own, regardless of the
/// weighted total.
pub const VIABILITY_DIMENSION: &str = "business_viability";

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionWeight {
    pub name: String,
    pub weight: f64,
}

/// Stage thresholds. All of these have defaults so a partial file only
/// overrides what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Weighted score below this persists the opportunity as rejected.
    pub min_weighted_score: f64,
    /// Business-viability score below this rejects outright, nothing persisted.
    pub min_viability: f64,
    /// Jaccard similarity against recent opportunities at or above this is
    /// treated as duplicate coverage.
    pub duplicate_similarity: f64,
    /// Opportunities below this weighted score are never handed to the
    /// derivative generator.
    pub derivation_min_score: i16,
    /// Derivative ideas scored below this are discarded before any checks.
    pub min_derivative_score: f64,
    /// Upper bound on ideas requested (and accepted) per opportunity.
    pub max_derivatives_per_opportunity: usize,
    /// Authority-domain count in the top results at or above this, with no
    /// content gap, fails the competitive check.
    pub big_site_threshold: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_weighted_score: 50.0,
            min_viability: 30.0,
            duplicate_similarity: 0.35,
            derivation_min_score: 70,
            min_derivative_score: 60.0,
            max_derivatives_per_opportunity: 5,
            big_site_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub dimensions: Vec<DimensionWeight>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            dimensions: vec![
                DimensionWeight {
                    name: "problem_severity".to_string(),
                    weight: 0.20,
                },
                DimensionWeight {
                    name: VIABILITY_DIMENSION.to_string(),
                    weight: 0.25,
                },
                DimensionWeight {
                    name: "timing".to_string(),
                    weight: 0.15,
                },
                DimensionWeight {
                    name: "competition_gap".to_string(),
                    weight: 0.15,
                },
                DimensionWeight {
                    name: "audience_reach".to_string(),
                    weight: 0.10,
                },
                DimensionWeight {
                    name: "execution_feasibility".to_string(),
                    weight: 0.15,
                },
            ],
            thresholds: Thresholds::default(),
        }
    }
}

impl ScoringConfig {
    /// Weighted score over the configured dimension set. Each value is
    /// clamped to [0, 100]; a dimension missing from the assessment
    /// contributes zero. With weights summing to 1.0 the result is always
    /// in [0, 100].
    #[must_use]
    pub fn weighted_score(&self, values: &BTreeMap<String, f64>) -> f64 {
        self.dimensions
            .iter()
            .map(|d| d.weight * values.get(&d.name).copied().unwrap_or(0.0).clamp(0.0, 100.0))
            .sum()
    }

    /// Names of the configured dimensions, for prompt construction.
    #[must_use]
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Load and validate the scoring configuration from a YAML file.
///
/// A missing file yields the built-in defaults so a fresh checkout runs
/// without any config; an unreadable or invalid file is a hard error.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed,
/// or fails validation.
pub fn load_scoring(path: &Path) -> Result<ScoringConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ScoringConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::ScoringFileIo {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    let config: ScoringConfig =
        serde_yaml::from_str(&content).map_err(ConfigError::ScoringFileParse)?;

    validate_scoring(&config)?;

    Ok(config)
}

fn validate_scoring(config: &ScoringConfig) -> Result<(), ConfigError> {
    if config.dimensions.is_empty() {
        return Err(ConfigError::Validation(
            "scoring config must define at least one dimension".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    let mut sum = 0.0;
    for dim in &config.dimensions {
        if dim.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dimension name must be non-empty".to_string(),
            ));
        }
        if dim.weight <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "dimension '{}' has non-positive weight {}",
                dim.name, dim.weight
            )));
        }
        if !seen.insert(dim.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate dimension name: '{}'",
                dim.name
            )));
        }
        sum += dim.weight;
    }

    if (sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::Validation(format!(
            "dimension weights must sum to 1.0, got {sum}"
        )));
    }

    if !seen.contains(VIABILITY_DIMENSION) {
        return Err(ConfigError::Validation(format!(
            "scoring config must include the '{VIABILITY_DIMENSION}' dimension"
        )));
    }

    let t = &config.thresholds;
    if !(0.0..=1.0).contains(&t.duplicate_similarity) {
        return Err(ConfigError::Validation(format!(
            "duplicate_similarity must be in [0, 1], got {}",
            t.duplicate_similarity
        )));
    }
    if !(0.0..=100.0).contains(&t.min_weighted_score) || !(0.0..=100.0).contains(&t.min_viability)
    {
        return Err(ConfigError::Validation(
            "score thresholds must be in [0, 100]".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(pairs: &[(&str, f64)]) -> Vec<DimensionWeight> {
        pairs
            .iter()
            .map(|(name, weight)| DimensionWeight {
                name: (*name).to_string(),
                weight: *weight,
            })
            .collect()
    }

    #[test]
    fn default_weights_sum_to_one() {
        let config = ScoringConfig::default();
        assert!(validate_scoring(&config).is_ok());
    }

    #[test]
    fn weighted_score_stays_in_range() {
        let config = ScoringConfig::default();
        let mut values = BTreeMap::new();
        for dim in &config.dimensions {
            values.insert(dim.name.clone(), 100.0);
        }
        let score = config.weighted_score(&values);
        assert!((0.0..=100.0).contains(&score));
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_score_clamps_out_of_range_values() {
        let config = ScoringConfig {
            dimensions: dims(&[("business_viability", 0.5), ("timing", 0.5)]),
            thresholds: Thresholds::default(),
        };
        let mut values = BTreeMap::new();
        values.insert("business_viability".to_string(), 250.0);
        values.insert("timing".to_string(), -40.0);
        let score = config.weighted_score(&values);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_score_missing_dimension_counts_zero() {
        let config = ScoringConfig {
            dimensions: dims(&[("business_viability", 0.5), ("timing", 0.5)]),
            thresholds: Thresholds::default(),
        };
        let mut values = BTreeMap::new();
        values.insert("business_viability".to_string(), 80.0);
        let score = config.weighted_score(&values);
        assert!((score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_weights_not_summing_to_one() {
        let config = ScoringConfig {
            dimensions: dims(&[("business_viability", 0.5), ("timing", 0.4)]),
            thresholds: Thresholds::default(),
        };
        let err = validate_scoring(&config).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn validate_rejects_missing_viability_dimension() {
        let config = ScoringConfig {
            dimensions: dims(&[("timing", 0.5), ("audience_reach", 0.5)]),
            thresholds: Thresholds::default(),
        };
        let err = validate_scoring(&config).unwrap_err();
        assert!(err.to_string().contains("business_viability"));
    }

    #[test]
    fn validate_rejects_duplicate_dimension() {
        let config = ScoringConfig {
            dimensions: dims(&[("business_viability", 0.5), ("business_viability", 0.5)]),
            thresholds: Thresholds::default(),
        };
        let err = validate_scoring(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate dimension"));
    }

    #[test]
    fn load_scoring_missing_file_falls_back_to_defaults() {
        let path = Path::new("/definitely/not/here/scoring.yaml");
        let config = load_scoring(path).unwrap();
        assert_eq!(config.dimensions.len(), ScoringConfig::default().dimensions.len());
    }

    #[test]
    fn thresholds_partial_override_keeps_defaults() {
        let yaml = r"
dimensions:
  - name: business_viability
    weight: 1.0
thresholds:
  min_weighted_score: 60
";
        let config: ScoringConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(validate_scoring(&config).is_ok());
        assert!((config.thresholds.min_weighted_score - 60.0).abs() < f64::EPSILON);
        assert!((config.thresholds.duplicate_similarity - 0.35).abs() < f64::EPSILON);
        assert_eq!(config.thresholds.max_derivatives_per_opportunity, 5);
    }
}
