//! Label column encoding ("Positive" -> 1, "Negative" -> 0)

use ndarray::Array1;
use polars::prelude::*;

use crate::error::{MlopsError, Result};
use crate::schema::{NEGATIVE_LABEL, POSITIVE_LABEL};

pub fn encode_label(value: &str) -> Result<f64> {
    match value {
        POSITIVE_LABEL => Ok(1.0),
        NEGATIVE_LABEL => Ok(0.0),
        other => Err(MlopsError::LabelEncoding(format!(
            "unexpected label '{}', expected '{}' or '{}'",
            other, POSITIVE_LABEL, NEGATIVE_LABEL
        ))),
    }
}

/// Encode a whole label column
pub fn encode_labels(df: &DataFrame, column: &str) -> Result<Array1<f64>> {
    let col = df
        .column(column)
        .map_err(|_| MlopsError::MissingColumns(vec![column.to_string()]))?;
    let series = col.as_materialized_series().cast(&DataType::String)?;

    series
        .str()?
        .into_iter()
        .map(|v| match v {
            Some(s) => encode_label(s),
            None => Err(MlopsError::LabelEncoding("missing label".to_string())),
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// Human-readable diagnosis for a predicted class
pub fn diagnosis(prediction: f64) -> &'static str {
    if prediction >= 0.5 {
        "Diabetes: Yes"
    } else {
        "Diabetes: No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_label() {
        assert_eq!(encode_label("Positive").unwrap(), 1.0);
        assert_eq!(encode_label("Negative").unwrap(), 0.0);
        assert!(matches!(encode_label("positive"), Err(MlopsError::LabelEncoding(_))));
    }

    #[test]
    fn test_encode_labels_column() {
        let df = df!("class" => &["Positive", "Negative", "Positive"]).unwrap();
        let y = encode_labels(&df, "class").unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_encode_labels_rejects_unknown() {
        let df = df!("class" => &["Positive", "Maybe"]).unwrap();
        assert!(encode_labels(&df, "class").is_err());
    }

    #[test]
    fn test_diagnosis() {
        assert_eq!(diagnosis(1.0), "Diabetes: Yes");
        assert_eq!(diagnosis(0.0), "Diabetes: No");
    }
}
