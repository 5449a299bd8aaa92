//! Classifier artifact support for the premium category service.
//!
//! The service only talks to a model through the [`Classifier`] trait. The
//! concrete [`SoftmaxClassifier`] reads a JSON artifact describing a
//! multinomial linear model together with its column preprocessing
//! (standardized numeric columns, one-hot categorical columns).

mod classifier;
mod row;
mod softmax;

pub use classifier::{Classifier, ModelError};
pub use row::{FeatureRow, FeatureValue};
pub use softmax::{ColumnSpec, SoftmaxClassifier};
