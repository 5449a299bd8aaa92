use std::fmt;

/// A single named input value handed to a classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureValue::Number(_) => "numeric",
            FeatureValue::Category(_) => "categorical",
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Category(c) => write!(f, "{}", c),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(n: f64) -> Self {
        FeatureValue::Number(n)
    }
}

impl From<&str> for FeatureValue {
    fn from(c: &str) -> Self {
        FeatureValue::Category(c.to_string())
    }
}

/// One row of model input: ordered `(column name, value)` pairs.
///
/// Column order is kept for display and logging; classifiers look values up
/// by name so a row built in a different order still scores the same.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(String, FeatureValue)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<FeatureValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column, replacing any earlier value stored under the same name.
    pub fn push(&mut self, name: &str, value: impl Into<FeatureValue>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
