use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{DelimitError, Result};

/// Key holding the RNG seed in the external configuration mapping.
pub const SEED_KEY: &str = "seed";
/// Key holding the ordered population -> sample count mapping.
pub const SAMPLING_DICT_KEY: &str = "sampling dict";
/// Optional key holding [`TrainingParams`] overrides.
pub const TRAINING_KEY: &str = "training";

/// Ordered mapping from population name to the number of sampled individuals.
///
/// The order is significant: genotype matrix rows are assigned to populations
/// in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplingDict {
    populations: Vec<(String, usize)>,
}

impl SamplingDict {
    pub fn new<S: Into<String>>(populations: Vec<(S, usize)>) -> Result<Self> {
        let populations: Vec<(String, usize)> = populations
            .into_iter()
            .map(|(name, count)| (name.into(), count))
            .collect();

        if populations.is_empty() {
            return Err(DelimitError::Configuration(
                "'sampling dict' must contain at least one population".to_string(),
            ));
        }
        for (i, (name, count)) in populations.iter().enumerate() {
            if *count == 0 {
                return Err(DelimitError::Configuration(format!(
                    "population '{}' in 'sampling dict' has a sample count of zero",
                    name
                )));
            }
            if populations[..i].iter().any(|(other, _)| other == name) {
                return Err(DelimitError::Configuration(format!(
                    "population '{}' appears more than once in 'sampling dict'",
                    name
                )));
            }
        }

        Ok(Self { populations })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.populations.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    /// Total number of sampled individuals, i.e. the expected genotype matrix row count.
    pub fn total_samples(&self) -> usize {
        self.populations.iter().map(|(_, count)| count).sum()
    }

    fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            DelimitError::Configuration(format!(
                "'{}' must be a mapping of population name to sample count",
                SAMPLING_DICT_KEY
            ))
        })?;

        let populations = map
            .iter()
            .map(|(name, count)| {
                count
                    .as_u64()
                    .map(|c| (name.clone(), c as usize))
                    .ok_or_else(|| {
                        DelimitError::Configuration(format!(
                            "sample count for population '{}' must be a non-negative integer, got {}",
                            name, count
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(populations)
    }
}

/// How many features each tree of the ensemble sees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().round() as usize).clamp(1, n_features.max(1)),
        }
    }
}

impl FromStr for MaxFeatures {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(MaxFeatures::All),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            _ => Err(format!("Unknown max_features setting: {}. Expected 'all' or 'sqrt'", s)),
        }
    }
}

/// Hyper-parameters shared by the predictors.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TrainingParams {
    /// Number of trees in the ensemble predictor.
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    /// Fraction of samples held out for validation.
    pub validation_fraction: f64,
    /// Folds of the held-out cross-validation used by the ensemble predictor.
    pub cv_folds: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            max_features: MaxFeatures::Sqrt,
            validation_fraction: 0.2,
            cv_folds: 2,
            epochs: 10,
            batch_size: 10,
            learning_rate: 1e-3,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(DelimitError::Configuration("n_trees must be at least 1".to_string()));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(DelimitError::Configuration(format!(
                "validation_fraction must lie in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if self.cv_folds < 2 {
            return Err(DelimitError::Configuration(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(DelimitError::Configuration(
                "epochs and batch_size must both be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(DelimitError::Configuration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// The slice of the species-delimitation configuration the predictors consume.
#[derive(Serialize, Debug, Clone)]
pub struct DelimitConfig {
    pub seed: u64,
    #[serde(rename = "sampling dict")]
    pub sampling: SamplingDict,
    pub training: TrainingParams,
}

impl DelimitConfig {
    pub fn new(seed: u64, sampling: SamplingDict) -> Self {
        Self {
            seed,
            sampling,
            training: TrainingParams::default(),
        }
    }

    pub fn with_training(mut self, training: TrainingParams) -> Result<Self> {
        training.validate()?;
        self.training = training;
        Ok(self)
    }

    /// Read the configuration out of the parsed configuration mapping.
    ///
    /// Unrelated keys (species tree, migration matrix, priors, ...) are ignored.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            DelimitError::Configuration("configuration must be a mapping".to_string())
        })?;

        let seed = map
            .get(SEED_KEY)
            .ok_or_else(|| missing_key(SEED_KEY))?
            .as_u64()
            .ok_or_else(|| {
                DelimitError::Configuration(format!("'{}' must be a non-negative integer", SEED_KEY))
            })?;

        let sampling =
            SamplingDict::from_value(map.get(SAMPLING_DICT_KEY).ok_or_else(|| missing_key(SAMPLING_DICT_KEY))?)?;

        let training = match map.get(TRAINING_KEY) {
            Some(v) => serde_json::from_value::<TrainingParams>(v.clone()).map_err(|e| {
                DelimitError::Configuration(format!("invalid '{}' section: {}", TRAINING_KEY, e))
            })?,
            None => TrainingParams::default(),
        };
        training.validate()?;

        log::debug!(
            "Loaded configuration: seed {}, {} populations ({} individuals)",
            seed,
            sampling.len(),
            sampling.total_samples()
        );

        Ok(Self {
            seed,
            sampling,
            training,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }
}

fn missing_key(key: &str) -> DelimitError {
    DelimitError::Configuration(format!("missing required key '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sampling_dict_keeps_order() {
        let config = DelimitConfig::from_value(&json!({
            "seed": 7,
            "sampling dict": {"popB": 2, "popA": 3, "popC": 1},
            "species tree": "ignored"
        }))
        .unwrap();

        let names: Vec<&str> = config.sampling.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["popB", "popA", "popC"]);
        assert_eq!(config.sampling.total_samples(), 6);
        assert_eq!(config.training.n_trees, 500);
    }

    #[test]
    fn test_missing_keys() {
        let err = DelimitConfig::from_value(&json!({"sampling dict": {"a": 1}})).unwrap_err();
        assert!(matches!(err, DelimitError::Configuration(ref m) if m.contains("seed")));

        let err = DelimitConfig::from_value(&json!({"seed": 1})).unwrap_err();
        assert!(matches!(err, DelimitError::Configuration(ref m) if m.contains("sampling dict")));
    }

    #[test]
    fn test_training_overrides() {
        let config = DelimitConfig::from_json_str(
            r#"{"seed": 1, "sampling dict": {"a": 2}, "training": {"epochs": 3, "max_features": "all"}}"#,
        )
        .unwrap();
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 10);
        assert_eq!(config.training.max_features, MaxFeatures::All);
    }

    #[test]
    fn test_rejects_zero_population() {
        assert!(SamplingDict::new(vec![("a", 0)]).is_err());
        assert!(SamplingDict::new(Vec::<(String, usize)>::new()).is_err());
        assert!(SamplingDict::new(vec![("a", 1), ("a", 2)]).is_err());
    }

    #[test]
    fn test_max_features() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!("SQRT".parse::<MaxFeatures>().unwrap(), MaxFeatures::Sqrt);
    }
}
