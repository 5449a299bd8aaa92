//! Feature assembly, classifier invocation and response formatting.

use crate::features::{AgeGroup, CityTier, LifestyleRisk, Occupation};
use crate::schema::UserInput;
use premium_model::{Classifier, FeatureRow, ModelError, SoftmaxClassifier};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Column names the classifier was trained with, in training order.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "income_lpa",
    "occupation",
    "age_group",
    "BMI",
    "lifeStyleRisk",
    "Tier_cities",
];

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("classifier returned {found} probabilities for {expected} classes")]
    ProbabilityCount { expected: usize, found: usize },
    #[error("classifier returned a non-finite probability for class '{0}'")]
    NonFiniteProbability(String),
}

/// The six values handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub income_lpa: f64,
    pub occupation: Occupation,
    pub age_group: AgeGroup,
    pub bmi: f64,
    pub lifestyle_risk: LifestyleRisk,
    pub city_tier: CityTier,
}

impl FeatureVector {
    pub fn from_input(input: &UserInput) -> Self {
        let derived = input.derived();
        Self {
            income_lpa: input.income_lpa,
            occupation: input.occupation,
            age_group: derived.age_group,
            bmi: derived.bmi,
            lifestyle_risk: derived.lifestyle_risk,
            city_tier: derived.city_tier,
        }
    }

    pub fn to_row(&self) -> FeatureRow {
        let [income, occupation, age_group, bmi, risk, tier] = FEATURE_COLUMNS;
        FeatureRow::new()
            .with(income, self.income_lpa)
            .with(occupation, self.occupation.as_str())
            .with(age_group, self.age_group.as_str())
            .with(bmi, self.bmi)
            .with(risk, self.lifestyle_risk.as_str())
            .with(tier, f64::from(self.city_tier.number()))
    }
}

/// Label → probability pairs, serialized as a JSON object in classifier order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassProbabilities(Vec<(String, f64)>);

impl ClassProbabilities {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, p)| p).sum()
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, p) in &self.0 {
            map.serialize_entry(label, p)?;
        }
        map.end()
    }
}

/// Successful `/predict` payload. The category key keeps the spelling existing
/// clients read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "pridected_catagory")]
    pub predicted_category: String,
    pub confidence: f64,
    pub class_probabilities: ClassProbabilities,
}

/// Wraps the process-wide classifier.
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    pub fn version(&self) -> Option<&str> {
        self.classifier.version()
    }

    pub fn predict(&self, input: &UserInput) -> Result<PredictionResult, PredictionError> {
        let features = FeatureVector::from_input(input);
        let row = features.to_row();

        let predicted_category = self.classifier.predict(&row)?;
        let probabilities = self.classifier.predict_proba(&row)?;

        let classes = self.classifier.classes();
        if probabilities.len() != classes.len() {
            return Err(PredictionError::ProbabilityCount {
                expected: classes.len(),
                found: probabilities.len(),
            });
        }
        if let Some(i) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(PredictionError::NonFiniteProbability(classes[i].clone()));
        }

        let confidence = probabilities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let class_probabilities = ClassProbabilities(
            classes
                .iter()
                .cloned()
                .zip(probabilities.iter().map(|p| round4(*p)))
                .collect(),
        );

        tracing::debug!(
            category = %predicted_category,
            confidence,
            bmi = features.bmi,
            city_tier = features.city_tier.number(),
            "prediction complete"
        );

        Ok(PredictionResult {
            predicted_category,
            confidence: round4(confidence),
            class_probabilities,
        })
    }
}

/// Loads the softmax artifact and checks it was trained on [`FEATURE_COLUMNS`].
pub fn load_classifier(path: &Path) -> Result<SoftmaxClassifier, ModelError> {
    let model = SoftmaxClassifier::from_path(path)?;
    let columns = model.column_names();
    if columns != FEATURE_COLUMNS {
        return Err(ModelError::InvalidArtifact(format!(
            "artifact columns {:?} do not match the service feature vector {:?}",
            columns, FEATURE_COLUMNS
        )));
    }
    Ok(model)
}

/// Rounds half away from zero to 4 decimal places.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;
    use serde_json::json;

    struct Mock {
        classes: Vec<String>,
        probabilities: Vec<f64>,
    }

    impl Classifier for Mock {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
            Ok(self.probabilities.clone())
        }
    }

    struct Broken;

    impl Classifier for Broken {
        fn classes(&self) -> &[String] {
            &[]
        }

        fn predict_proba(&self, _row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::MissingFeature("Tier_cities".to_string()))
        }
    }

    fn mock(probabilities: Vec<f64>) -> Predictor {
        Predictor::new(Arc::new(Mock {
            classes: vec!["low".into(), "medium".into(), "high".into()],
            probabilities,
        }))
    }

    fn input() -> UserInput {
        validate(&json!({
            "age": 52,
            "weight": 92.0,
            "height": 1.7,
            "income_lpa": 18.0,
            "smoker": true,
            "city": "jaipur",
            "occupation": "business_owner"
        }))
        .unwrap()
    }

    #[test]
    fn test_feature_vector() {
        let features = FeatureVector::from_input(&input());
        assert_eq!(features.age_group, AgeGroup::MiddleAged);
        assert_eq!(features.lifestyle_risk, LifestyleRisk::High);
        assert_eq!(features.city_tier, CityTier::Two);
        assert_eq!(features.occupation, Occupation::BusinessOwner);

        let row = features.to_row();
        let names: Vec<&str> = row.names().collect();
        assert_eq!(names, FEATURE_COLUMNS.to_vec());
        assert_eq!(
            row.get("Tier_cities"),
            Some(&premium_model::FeatureValue::Number(2.0))
        );
        assert_eq!(
            row.get("lifeStyleRisk"),
            Some(&premium_model::FeatureValue::Category("high".into()))
        );
    }

    #[test]
    fn test_predict_with_mock() {
        let result = mock(vec![0.1, 0.7, 0.2]).predict(&input()).unwrap();
        assert_eq!(result.predicted_category, "medium");
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.class_probabilities.get("low"), Some(0.1));
        assert_eq!(result.class_probabilities.get("medium"), Some(0.7));
        assert_eq!(result.class_probabilities.get("high"), Some(0.2));

        // Keys come out in classifier order
        let body = serde_json::to_string(&result).unwrap();
        assert_eq!(
            body,
            concat!(
                r#"{"pridected_catagory":"medium","confidence":0.7,"#,
                r#""class_probabilities":{"low":0.1,"medium":0.7,"high":0.2}}"#
            )
        );
    }

    #[test]
    fn test_rounding_and_sum() {
        let p = vec![0.123456, 0.654321, 0.222223];
        let result = mock(p).predict(&input()).unwrap();
        assert_eq!(result.class_probabilities.get("low"), Some(0.1235));
        assert_eq!(result.class_probabilities.get("medium"), Some(0.6543));
        assert_eq!(result.confidence, 0.6543);

        let eps = 0.0005 * result.class_probabilities.len() as f64;
        assert!((result.class_probabilities.total() - 1.0).abs() <= eps);

        let max = result
            .class_probabilities
            .iter()
            .map(|(_, p)| p)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.confidence, max);
    }

    #[test]
    fn test_classifier_failure() {
        let predictor = Predictor::new(Arc::new(Broken));
        let err = predictor.predict(&input()).unwrap_err();
        assert_eq!(err.to_string(), "missing feature column 'Tier_cities'");
    }

    #[test]
    fn test_probability_shape_is_checked() {
        let err = mock(vec![0.5, 0.5]).predict(&input()).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::ProbabilityCount { expected: 3, found: 2 }
        ));

        let err = mock(vec![0.5, f64::NAN, 0.5]).predict(&input()).unwrap_err();
        assert!(matches!(err, PredictionError::NonFiniteProbability(c) if c == "medium"));
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(0.00004), 0.0);
        assert_eq!(round4(0.99996), 1.0);
        assert_eq!(round4(0.7), 0.7);
    }

    #[test]
    fn test_bundled_artifact_end_to_end() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../model/artifacts/premium_category.json");
        let model = load_classifier(&path).unwrap();
        let predictor = Predictor::new(Arc::new(model));

        let result = predictor.predict(&input()).unwrap();
        assert!(predictor.classes().contains(&result.predicted_category));
        assert_eq!(result.class_probabilities.len(), 3);
        assert_eq!(
            result.class_probabilities.get(&result.predicted_category),
            Some(result.confidence)
        );
        assert!((result.class_probabilities.total() - 1.0).abs() <= 0.0015);
    }
}
