//! Column schema for the diabetes-risk dataset
//!
//! The schema is a fixed, ordered contract per column: how the column is
//! stored (integer or string enum) and which values it may take (a numeric
//! range or a finite set). It is built once at startup and never mutated.

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// Name of the label column in the reference dataset
pub const LABEL_COLUMN: &str = "class";
/// Label value encoded as the positive class
pub const POSITIVE_LABEL: &str = "Positive";
/// Label value encoded as the negative class
pub const NEGATIVE_LABEL: &str = "Negative";

/// Role of a column in the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Label,
}

/// Runtime storage type expected for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Integer,
    StringEnum,
}

impl StorageType {
    /// Classify a polars dtype. Returns `None` for dtypes outside the schema
    /// vocabulary (floats, booleans, dates...).
    pub fn of(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                Some(StorageType::Integer)
            }
            DataType::String => Some(StorageType::StringEnum),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Integer => write!(f, "integer"),
            StorageType::StringEnum => write!(f, "string"),
        }
    }
}

/// Admissible values for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueRule {
    /// Inclusive numeric range
    Range { min: f64, max: f64 },
    /// Finite set of allowed string values
    OneOf(Vec<String>),
}

impl ValueRule {
    pub fn one_of(values: &[&str]) -> Self {
        ValueRule::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    /// Whether a numeric value satisfies a range rule
    pub fn admits_number(&self, value: f64) -> bool {
        match self {
            ValueRule::Range { min, max } => *min <= value && value <= *max,
            ValueRule::OneOf(_) => false,
        }
    }

    /// Whether a string value satisfies a set rule
    pub fn admits_str(&self, value: &str) -> bool {
        match self {
            ValueRule::OneOf(allowed) => allowed.iter().any(|a| a == value),
            ValueRule::Range { .. } => false,
        }
    }
}

/// Contract for one dataset column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub storage_type: StorageType,
    pub rule: ValueRule,
}

impl ColumnSpec {
    /// Integer column with an inclusive range
    pub fn numeric(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
            storage_type: StorageType::Integer,
            rule: ValueRule::Range { min, max },
        }
    }

    /// String column restricted to a set of values
    pub fn categorical(name: impl Into<String>, allowed: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Categorical,
            storage_type: StorageType::StringEnum,
            rule: ValueRule::one_of(allowed),
        }
    }

    /// String label column restricted to a set of values
    pub fn label(name: impl Into<String>, allowed: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Label,
            storage_type: StorageType::StringEnum,
            rule: ValueRule::one_of(allowed),
        }
    }

    /// JSON field name used by the prediction API
    pub fn api_field_name(&self) -> String {
        api_field_name(&self.name)
    }
}

/// Prediction API name of a column: spaces become underscores
pub fn api_field_name(column: &str) -> String {
    column.replace(' ', "_")
}

/// Ordered mapping from column name to [`ColumnSpec`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Reference schema of the diabetes early-risk dataset:
    /// integer Age, Male/Female Gender, fourteen Yes/No symptoms and the label.
    pub fn diabetes() -> Self {
        const YES_NO: &[&str] = &["Yes", "No"];
        let symptoms = [
            "Polyuria",
            "Polydipsia",
            "sudden weight loss",
            "weakness",
            "Polyphagia",
            "Genital thrush",
            "visual blurring",
            "Itching",
            "Irritability",
            "delayed healing",
            "partial paresis",
            "muscle stiffness",
            "Alopecia",
            "Obesity",
        ];

        let mut columns = vec![
            ColumnSpec::numeric("Age", 16.0, 90.0),
            ColumnSpec::categorical("Gender", &["Male", "Female"]),
        ];
        columns.extend(symptoms.iter().map(|name| ColumnSpec::categorical(*name, YES_NO)));
        columns.push(ColumnSpec::label(LABEL_COLUMN, &[POSITIVE_LABEL, NEGATIVE_LABEL]));

        Self::new(columns)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Numeric)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Categorical)
    }

    /// Every non-label column, in schema order
    pub fn feature_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind != ColumnKind::Label)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn label_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Label)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::diabetes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_schema_shape() {
        let schema = Schema::diabetes();
        assert_eq!(schema.len(), 17);
        assert_eq!(schema.feature_columns().len(), 16);
        assert_eq!(schema.numeric_columns(), vec!["Age".to_string()]);
        assert_eq!(schema.categorical_columns().len(), 15);
        let yes_no = schema
            .iter()
            .filter(|c| c.rule == ValueRule::one_of(&["Yes", "No"]))
            .count();
        assert_eq!(yes_no, 14);
        assert_eq!(schema.get("Gender").unwrap().rule, ValueRule::one_of(&["Male", "Female"]));
        assert_eq!(schema.label_column().unwrap().name, LABEL_COLUMN);
    }

    #[test]
    fn test_range_rule_is_inclusive() {
        let rule = ValueRule::Range { min: 16.0, max: 90.0 };
        assert!(rule.admits_number(16.0));
        assert!(rule.admits_number(90.0));
        assert!(!rule.admits_number(120.0));
        assert!(!rule.admits_number(15.0));
    }

    #[test]
    fn test_set_rule() {
        let rule = ValueRule::one_of(&["Male", "Female"]);
        assert!(rule.admits_str("Male"));
        assert!(!rule.admits_str("Unknown"));
        assert!(!rule.admits_str("male"));
    }

    #[test]
    fn test_storage_type_of_dtype() {
        assert_eq!(StorageType::of(&DataType::Int64), Some(StorageType::Integer));
        assert_eq!(StorageType::of(&DataType::String), Some(StorageType::StringEnum));
        assert_eq!(StorageType::of(&DataType::Float64), None);
    }

    #[test]
    fn test_api_field_name() {
        let spec = ColumnSpec::categorical("sudden weight loss", &["Yes", "No"]);
        assert_eq!(spec.api_field_name(), "sudden_weight_loss");
    }
}
