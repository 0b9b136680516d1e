//! Model families, hyperparameter grids and selection policies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MlopsError, Result};

/// Classifier family tried by the model selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "LogisticRegression",
            ModelFamily::RandomForest => "RandomForest",
            ModelFamily::GradientBoosting => "GradientBoosting",
        }
    }

    /// Hyperparameter names a grid may use for this family
    pub fn allowed_params(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::LogisticRegression => &["C", "solver", "max_iter"],
            ModelFamily::RandomForest => &["n_estimators", "max_depth", "min_samples_split"],
            ModelFamily::GradientBoosting => &["n_estimators", "max_depth", "learning_rate"],
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Unbounded / unset (e.g. no depth limit)
    None,
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }

    /// Numeric equality across Int/Float so `1` matches `1.0`
    pub fn matches(&self, other: &ParamValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < 1e-12,
            _ => self == other,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::None => f.write_str("None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// One hyperparameter combination, ordered by name
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Read a positive integer parameter
pub fn param_usize(params: &ParamSet, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(v)) if *v > 0 => Ok(*v as usize),
        Some(other) => Err(MlopsError::InvalidParameter {
            name: name.to_string(),
            value: other.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

/// Read an optional positive integer parameter (`None` means unbounded)
pub fn param_opt_usize(params: &ParamSet, name: &str, default: Option<usize>) -> Result<Option<usize>> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::None) => Ok(None),
        Some(_) => param_usize(params, name, 1).map(Some),
    }
}

/// Read a positive float parameter
pub fn param_f64(params: &ParamSet, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => match v.as_f64() {
            Some(x) if x > 0.0 && x.is_finite() => Ok(x),
            _ => Err(MlopsError::InvalidParameter {
                name: name.to_string(),
                value: v.to_string(),
                reason: "expected a positive number".to_string(),
            }),
        },
    }
}

/// Ordered hyperparameter grid; the cartesian product of its values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.params
            .push((name.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Like [`Self::with_param`] for values that are already `ParamValue`s
    pub fn with_values(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.params.push((name.to_string(), values));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, name: &str, value: &ParamValue) -> bool {
        self.values(name)
            .map_or(false, |vals| vals.iter().any(|v| v.matches(value)))
    }

    /// Number of combinations
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            0
        } else {
            self.params.iter().map(|(_, v)| v.len()).product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All combinations in a fixed order; the last declared parameter varies fastest
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.params.is_empty() {
            return Vec::new();
        }

        let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, values) in &self.params {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut c = combo.clone();
                    c.insert(name.clone(), value.clone());
                    next.push(c);
                }
            }
            combos = next;
        }
        combos
    }
}

/// What to do when a trial does not beat the all-positive baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Log a warning and keep the trial eligible
    #[default]
    Warn,
    /// Disqualify the trial from selection
    Reject,
}

impl std::str::FromStr for BaselinePolicy {
    type Err = MlopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(BaselinePolicy::Warn),
            "reject" => Ok(BaselinePolicy::Reject),
            other => Err(MlopsError::Config(format!("unknown baseline policy '{}'", other))),
        }
    }
}

/// A family, its search grid and the values known to work for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub family: ModelFamily,
    pub grid: ParamGrid,
    pub known_good: Vec<(String, ParamValue)>,
}

impl FamilyConfig {
    pub fn new(family: ModelFamily, grid: ParamGrid) -> Self {
        Self {
            family,
            grid,
            known_good: Vec::new(),
        }
    }

    pub fn with_known_good(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.known_good.push((name.to_string(), value.into()));
        self
    }

    /// The three reference families with their full grids
    pub fn reference() -> Vec<FamilyConfig> {
        vec![
            FamilyConfig::new(
                ModelFamily::LogisticRegression,
                ParamGrid::new()
                    .with_param("C", vec![0.1, 1.0, 10.0, 100.0])
                    .with_param("solver", vec!["liblinear", "lbfgs"])
                    .with_param("max_iter", vec![100i64, 200]),
            )
            .with_known_good("C", 1.0),
            FamilyConfig::new(
                ModelFamily::RandomForest,
                ParamGrid::new()
                    .with_param("n_estimators", vec![50i64, 100, 200])
                    .with_values(
                        "max_depth",
                        vec![ParamValue::Int(10), ParamValue::Int(20), ParamValue::None],
                    )
                    .with_param("min_samples_split", vec![2i64, 5, 10]),
            )
            .with_known_good("n_estimators", 100i64),
            FamilyConfig::new(
                ModelFamily::GradientBoosting,
                ParamGrid::new()
                    .with_param("n_estimators", vec![50i64, 100, 200])
                    .with_param("max_depth", vec![3i64, 6, 10])
                    .with_param("learning_rate", vec![0.01, 0.1, 0.2]),
            )
            .with_known_good("learning_rate", 0.1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_combinations_order() {
        let grid = ParamGrid::new()
            .with_param("a", vec![1i64, 2])
            .with_param("b", vec!["x", "y", "z"]);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);
        assert_eq!(grid.len(), 6);
        assert_eq!(combos[0]["a"], ParamValue::Int(1));
        assert_eq!(combos[0]["b"], ParamValue::from("x"));
        assert_eq!(combos[1]["b"], ParamValue::from("y"));
        assert_eq!(combos[3]["a"], ParamValue::Int(2));
    }

    #[test]
    fn test_reference_grid_sizes() {
        let sizes: Vec<usize> = FamilyConfig::reference().iter().map(|f| f.grid.len()).collect();
        assert_eq!(sizes, vec![16, 27, 27]);
    }

    #[test]
    fn test_contains_matches_int_and_float() {
        let grid = ParamGrid::new().with_param("C", vec![1i64, 10]);
        assert!(grid.contains("C", &ParamValue::Float(1.0)));
        assert!(!grid.contains("C", &ParamValue::Float(0.5)));
        assert!(!grid.contains("solver", &ParamValue::from("lbfgs")));
    }

    #[test]
    fn test_param_readers() {
        let mut params = ParamSet::new();
        params.insert("max_depth".to_string(), ParamValue::None);
        params.insert("n_estimators".to_string(), ParamValue::Int(50));
        params.insert("learning_rate".to_string(), ParamValue::Float(-1.0));

        assert_eq!(param_opt_usize(&params, "max_depth", Some(3)).unwrap(), None);
        assert_eq!(param_usize(&params, "n_estimators", 100).unwrap(), 50);
        assert_eq!(param_usize(&params, "min_samples_split", 2).unwrap(), 2);
        assert!(param_f64(&params, "learning_rate", 0.1).is_err());
    }

    #[test]
    fn test_param_value_json_is_untagged() {
        let mut params = ParamSet::new();
        params.insert("C".to_string(), ParamValue::Float(0.1));
        params.insert("max_depth".to_string(), ParamValue::None);
        params.insert("solver".to_string(), ParamValue::from("lbfgs"));
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"C":0.1,"max_depth":null,"solver":"lbfgs"}"#);

        let back: ParamSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_baseline_policy_parse() {
        assert_eq!("reject".parse::<BaselinePolicy>().unwrap(), BaselinePolicy::Reject);
        assert!("maybe".parse::<BaselinePolicy>().is_err());
    }
}
