use crate::row::FeatureRow;
use thiserror::Error;

/// Errors raised while loading an artifact or running inference.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("missing feature column '{0}'")]
    MissingFeature(String),
    #[error("feature column '{column}' expects a {expected} value, got {found}")]
    FeatureKind {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("found unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },
    #[error("feature column '{0}' is not finite")]
    NonFinite(String),
}

/// A trained classifier loaded once and shared read-only.
///
/// `predict_proba` returns one probability per entry of [`Classifier::classes`],
/// in the same order.
pub trait Classifier: Send + Sync {
    /// Class labels in the classifier's native order.
    fn classes(&self) -> &[String];

    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, ModelError>;

    /// Point prediction. Defaults to the label of the most probable class;
    /// ties go to the class listed first.
    fn predict(&self, row: &FeatureRow) -> Result<String, ModelError> {
        let probabilities = self.predict_proba(row)?;
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in probabilities.iter().copied().enumerate() {
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }
        best.and_then(|(i, _)| self.classes().get(i).cloned())
            .ok_or_else(|| ModelError::InvalidArtifact("classifier has no classes".to_string()))
    }

    /// Artifact version reported by the health endpoint, when known.
    fn version(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        classes: Vec<String>,
        probabilities: Vec<f64>,
    }

    impl Classifier for Fixed {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
            Ok(self.probabilities.clone())
        }
    }

    fn fixed(probabilities: Vec<f64>) -> Fixed {
        Fixed {
            classes: vec!["low".into(), "medium".into(), "high".into()],
            probabilities,
        }
    }

    #[test]
    fn test_default_predict_takes_argmax() {
        let model = fixed(vec![0.1, 0.7, 0.2]);
        assert_eq!(model.predict(&FeatureRow::new()).unwrap(), "medium");
    }

    #[test]
    fn test_default_predict_breaks_ties_by_first_class() {
        let model = fixed(vec![0.4, 0.2, 0.4]);
        assert_eq!(model.predict(&FeatureRow::new()).unwrap(), "low");
    }

    #[test]
    fn test_default_predict_without_classes_fails() {
        let model = Fixed {
            classes: Vec::new(),
            probabilities: Vec::new(),
        };
        assert!(model.predict(&FeatureRow::new()).is_err());
    }
}
