//! Multinomial logistic regression over a small preprocessing pipeline.
//!
//! Inference is `softmax(W * encode(row) + b)` where `encode()` standardizes
//! the numeric columns and one-hot encodes the categorical ones.

use crate::classifier::{Classifier, ModelError};
use crate::row::{FeatureRow, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const MODEL_TYPE: &str = "softmax_regression";

/// One input column as declared by the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSpec {
    Numeric {
        name: String,
        #[serde(default)]
        mean: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    Categorical {
        name: String,
        categories: Vec<String>,
    },
}

fn default_scale() -> f64 {
    1.0
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            ColumnSpec::Numeric { name, .. } | ColumnSpec::Categorical { name, .. } => name,
        }
    }

    /// Number of encoded inputs this column contributes.
    fn width(&self) -> usize {
        match self {
            ColumnSpec::Numeric { .. } => 1,
            ColumnSpec::Categorical { categories, .. } => categories.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactJson {
    model_type: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    classes: Vec<String>,
    columns: Vec<ColumnSpec>,
    #[serde(alias = "weights")]
    coefficients: Vec<Vec<f64>>,
    #[serde(alias = "biases")]
    intercepts: Vec<f64>,
}

/// Linear softmax classifier loaded from a JSON artifact.
#[derive(Debug, Clone)]
pub struct SoftmaxClassifier {
    name: String,
    version: Option<String>,
    classes: Vec<String>,
    columns: Vec<ColumnSpec>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl SoftmaxClassifier {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model = Self::from_json_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            classes = model.classes.len(),
            columns = model.columns.len(),
            "loaded softmax artifact"
        );
        Ok(model)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let parsed: ArtifactJson = serde_json::from_str(json)?;

        if parsed.model_type != MODEL_TYPE {
            return Err(invalid(format!(
                "expected model_type '{}', got '{}'",
                MODEL_TYPE, parsed.model_type
            )));
        }

        // Classes: at least two, no duplicates
        if parsed.classes.len() < 2 {
            return Err(invalid(format!(
                "expected at least 2 classes, got {}",
                parsed.classes.len()
            )));
        }
        let mut seen = HashSet::new();
        for class in &parsed.classes {
            if !seen.insert(class.as_str()) {
                return Err(invalid(format!("duplicate class label '{}'", class)));
            }
        }

        // Columns: unique names, usable scales, non-empty category lists
        if parsed.columns.is_empty() {
            return Err(invalid("artifact declares no columns".to_string()));
        }
        let mut names = HashSet::new();
        for column in &parsed.columns {
            if !names.insert(column.name()) {
                return Err(invalid(format!("duplicate column '{}'", column.name())));
            }
            match column {
                ColumnSpec::Numeric { name, mean, scale } => {
                    if !mean.is_finite() || !scale.is_finite() || *scale == 0.0 {
                        return Err(invalid(format!(
                            "column '{}' needs a finite mean and a finite non-zero scale",
                            name
                        )));
                    }
                }
                ColumnSpec::Categorical { name, categories } => {
                    if categories.is_empty() {
                        return Err(invalid(format!("column '{}' has no categories", name)));
                    }
                }
            }
        }

        // Weight matrix: one row per class, one weight per encoded input
        let width: usize = parsed.columns.iter().map(ColumnSpec::width).sum();
        if parsed.coefficients.len() != parsed.classes.len() {
            return Err(invalid(format!(
                "expected {} coefficient rows, got {}",
                parsed.classes.len(),
                parsed.coefficients.len()
            )));
        }
        for (i, row) in parsed.coefficients.iter().enumerate() {
            if row.len() != width {
                return Err(invalid(format!(
                    "coefficient row {} has {} elements, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        if parsed.intercepts.len() != parsed.classes.len() {
            return Err(invalid(format!(
                "expected {} intercepts, got {}",
                parsed.classes.len(),
                parsed.intercepts.len()
            )));
        }
        let all_finite = parsed
            .coefficients
            .iter()
            .flatten()
            .chain(parsed.intercepts.iter())
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(invalid("coefficients and intercepts must be finite".to_string()));
        }

        Ok(Self {
            name: parsed.model_name.unwrap_or_else(|| MODEL_TYPE.to_string()),
            version: parsed.version,
            classes: parsed.classes,
            columns: parsed.columns,
            coefficients: parsed.coefficients,
            intercepts: parsed.intercepts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(ColumnSpec::name).collect()
    }

    // Standardize numeric columns, one-hot the categorical ones
    fn encode(&self, row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
        let mut encoded = Vec::with_capacity(self.coefficients[0].len());
        for column in &self.columns {
            let value = row
                .get(column.name())
                .ok_or_else(|| ModelError::MissingFeature(column.name().to_string()))?;
            match (column, value) {
                (ColumnSpec::Numeric { name, mean, scale }, FeatureValue::Number(x)) => {
                    if !x.is_finite() {
                        return Err(ModelError::NonFinite(name.clone()));
                    }
                    encoded.push((x - mean) / scale);
                }
                (ColumnSpec::Categorical { name, categories }, FeatureValue::Category(c)) => {
                    let hot = categories
                        .iter()
                        .position(|known| known == c)
                        .ok_or_else(|| ModelError::UnknownCategory {
                            column: name.clone(),
                            value: c.clone(),
                        })?;
                    encoded.extend((0..categories.len()).map(|i| if i == hot { 1.0 } else { 0.0 }));
                }
                (column, value) => {
                    return Err(ModelError::FeatureKind {
                        column: column.name().to_string(),
                        expected: match column {
                            ColumnSpec::Numeric { .. } => "numeric",
                            ColumnSpec::Categorical { .. } => "categorical",
                        },
                        found: value.kind(),
                    });
                }
            }
        }
        Ok(encoded)
    }
}

impl Classifier for SoftmaxClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
        let x = self.encode(row)?;

        // Linear combination per class: w1*x1 + w2*x2 + ... + b
        let logits: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, bias)| bias + weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>())
            .collect();

        Ok(softmax(&logits))
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

// Subtracting the max logit keeps exp() from overflowing
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn invalid(msg: String) -> ModelError {
    ModelError::InvalidArtifact(msg)
}
