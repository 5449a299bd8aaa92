//! Request body validation for `POST /predict`.
//!
//! The body arrives as untyped JSON and is checked field by field. Every
//! violation is collected, so a client sees all of its mistakes at once. Error
//! entries follow the `{type, loc, msg, input, ctx}` shape existing clients of
//! the service already parse.

use crate::features::{
    derive_age_group, derive_bmi, derive_city_tier, derive_lifestyle_risk, normalize_city,
    AgeGroup, CityTier, DerivedFeatures, LifestyleRisk, Occupation,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

/// A validated request. Derived features are computed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub age: u32,
    pub weight: f64,
    pub height: f64,
    pub income_lpa: f64,
    pub smoker: bool,
    /// Already trimmed and title-cased.
    pub city: String,
    pub occupation: Occupation,
}

impl UserInput {
    pub fn bmi(&self) -> f64 {
        derive_bmi(self.weight, self.height)
    }

    pub fn lifestyle_risk(&self) -> LifestyleRisk {
        derive_lifestyle_risk(self.smoker, self.bmi())
    }

    pub fn age_group(&self) -> AgeGroup {
        derive_age_group(self.age)
    }

    pub fn city_tier(&self) -> CityTier {
        derive_city_tier(&self.city)
    }

    pub fn derived(&self) -> DerivedFeatures {
        DerivedFeatures {
            bmi: self.bmi(),
            lifestyle_risk: self.lifestyle_risk(),
            age_group: self.age_group(),
            city_tier: self.city_tier(),
        }
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub loc: Vec<Value>,
    pub msg: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

impl FieldError {
    fn new(kind: &'static str, field: &str, msg: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            loc: vec![json!("body"), json!(field)],
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    fn with_ctx(mut self, ctx: Value) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// The name of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).and_then(Value::as_str)
    }
}

/// Every violation found in one request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field().unwrap_or("body"), e.msg))
            .collect();
        write!(f, "{} validation error(s): {}", self.0.len(), fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    /// The body was not parseable JSON at all. `loc` carries the character
    /// offset into `body` where decoding stopped.
    pub fn json_invalid(err: &serde_json::Error, body: &[u8]) -> Self {
        ValidationErrors(vec![FieldError {
            kind: "json_invalid",
            loc: vec![json!("body"), json!(char_offset(body, err.line(), err.column()))],
            msg: "JSON decode error".to_string(),
            input: json!({}),
            ctx: Some(json!({ "error": err.to_string() })),
        }])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().filter_map(FieldError::field).collect()
    }
}

// serde_json reports a 1-based line and the bytes consumed on that line
fn char_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    let end = (line_start + column).min(body.len());
    String::from_utf8_lossy(&body[..end]).chars().count()
}

/// Validates a raw JSON body into a [`UserInput`].
pub fn validate(raw: &Value) -> Result<UserInput, ValidationErrors> {
    let body = match raw.as_object() {
        Some(body) => body,
        None => {
            return Err(ValidationErrors(vec![FieldError {
                kind: "model_attributes_type",
                loc: vec![json!("body")],
                msg: "Input should be a valid dictionary or object to extract fields from"
                    .to_string(),
                input: raw.clone(),
                ctx: None,
            }]))
        }
    };

    let mut checker = Checker {
        body,
        errors: Vec::new(),
    };

    let age = checker.int("age", 0, 120);
    let weight = checker.float("weight", 0.0, None);
    let height = checker.float("height", 0.0, Some(2.5));
    let income_lpa = checker.float("income_lpa", 0.0, None);
    let smoker = checker.boolean("smoker");
    let city = checker.string("city");
    let occupation = checker.occupation("occupation");

    match (age, weight, height, income_lpa, smoker, city, occupation) {
        (
            Some(age),
            Some(weight),
            Some(height),
            Some(income_lpa),
            Some(smoker),
            Some(city),
            Some(occupation),
        ) if checker.errors.is_empty() =>
        {
            Ok(UserInput {
                // Bounded to 1..=119 by the range check
                age: age as u32,
                weight,
                height,
                income_lpa,
                smoker,
                city: normalize_city(&city),
                occupation,
            })
        }
        _ => Err(ValidationErrors(checker.errors)),
    }
}

struct Checker<'a> {
    body: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn present(&mut self, field: &str) -> Option<&'a Value> {
        let body: &'a Map<String, Value> = self.body;
        let value = body.get(field);
        if value.is_none() {
            self.errors.push(FieldError::new(
                "missing",
                field,
                "Field required",
                Value::Object(self.body.clone()),
            ));
        }
        value
    }

    // Integral floats such as 30.0 are accepted as integers
    fn int(&mut self, field: &str, gt: i64, lt: i64) -> Option<i64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Some(i),
                (None, Some(_), _) => Some(i64::MAX),
                (None, None, Some(f)) if f.fract() == 0.0 => Some(f as i64),
                _ => {
                    self.errors.push(FieldError::new(
                        "int_from_float",
                        field,
                        "Input should be a valid integer, got a number with a fractional part",
                        value.clone(),
                    ));
                    return None;
                }
            },
            _ => None,
        };
        let Some(i) = parsed else {
            self.errors.push(FieldError::new(
                "int_type",
                field,
                "Input should be a valid integer",
                value.clone(),
            ));
            return None;
        };

        if i <= gt {
            self.errors.push(
                FieldError::new(
                    "greater_than",
                    field,
                    format!("Input should be greater than {}", gt),
                    value.clone(),
                )
                .with_ctx(json!({ "gt": gt })),
            );
            return None;
        }
        if i >= lt {
            self.errors.push(
                FieldError::new(
                    "less_than",
                    field,
                    format!("Input should be less than {}", lt),
                    value.clone(),
                )
                .with_ctx(json!({ "lt": lt })),
            );
            return None;
        }
        Some(i)
    }

    fn float(&mut self, field: &str, gt: f64, lt: Option<f64>) -> Option<f64> {
        let value = self.present(field)?;
        let Some(x) = value.as_f64() else {
            self.errors.push(FieldError::new(
                "float_type",
                field,
                "Input should be a valid number",
                value.clone(),
            ));
            return None;
        };

        if x <= gt {
            self.errors.push(
                FieldError::new(
                    "greater_than",
                    field,
                    format!("Input should be greater than {}", gt),
                    value.clone(),
                )
                .with_ctx(json!({ "gt": gt })),
            );
            return None;
        }
        if let Some(lt) = lt {
            if x >= lt {
                self.errors.push(
                    FieldError::new(
                        "less_than",
                        field,
                        format!("Input should be less than {}", lt),
                        value.clone(),
                    )
                    .with_ctx(json!({ "lt": lt })),
                );
                return None;
            }
        }
        Some(x)
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        let value = self.present(field)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.errors.push(FieldError::new(
                    "bool_type",
                    field,
                    "Input should be a valid boolean",
                    value.clone(),
                ));
                None
            }
        }
    }

    fn string(&mut self, field: &str) -> Option<String> {
        let value = self.present(field)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.errors.push(FieldError::new(
                    "string_type",
                    field,
                    "Input should be a valid string",
                    value.clone(),
                ));
                None
            }
        }
    }

    fn occupation(&mut self, field: &str) -> Option<Occupation> {
        let value = self.present(field)?;
        if let Some(occupation) = value.as_str().and_then(|s| s.parse::<Occupation>().ok()) {
            return Some(occupation);
        }

        let quoted: Vec<String> = Occupation::ALL
            .iter()
            .map(|o| format!("'{}'", o.as_str()))
            .collect();
        let expected = match quoted.split_last() {
            Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
            None => String::new(),
        };
        self.errors.push(
            FieldError::new(
                "literal_error",
                field,
                format!("Input should be {}", expected),
                value.clone(),
            )
            .with_ctx(json!({ "expected": expected })),
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_body() -> Value {
        json!({
            "age": 30,
            "weight": 70.0,
            "height": 1.75,
            "income_lpa": 12.5,
            "smoker": false,
            "city": "  mumbai ",
            "occupation": "private_job"
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut body = valid_body();
        body[field] = value;
        body
    }

    fn without(field: &str) -> Value {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove(field);
        body
    }

    fn kinds(err: &ValidationErrors) -> Vec<&'static str> {
        err.errors().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_body() {
        let input = validate(&valid_body()).unwrap();
        assert_eq!(input.age, 30);
        assert_eq!(input.city, "Mumbai");
        assert_eq!(input.occupation, Occupation::PrivateJob);
        assert!(!input.smoker);

        let derived = input.derived();
        assert!((derived.bmi - 22.857).abs() < 1e-3);
        assert_eq!(derived.age_group, AgeGroup::Adult);
        assert_eq!(derived.lifestyle_risk, LifestyleRisk::Low);
        assert_eq!(derived.city_tier, CityTier::One);
    }

    #[test]
    fn test_age_bounds() {
        let err = validate(&with("age", json!(0))).unwrap_err();
        assert_eq!(kinds(&err), vec!["greater_than"]);
        assert_eq!(err.fields(), vec!["age"]);
        assert_eq!(err.errors()[0].msg, "Input should be greater than 0");

        let err = validate(&with("age", json!(120))).unwrap_err();
        assert_eq!(kinds(&err), vec!["less_than"]);

        assert_eq!(validate(&with("age", json!(1))).unwrap().age, 1);
        assert_eq!(validate(&with("age", json!(119))).unwrap().age, 119);
        assert_eq!(validate(&with("age", json!(45.0))).unwrap().age, 45);

        let err = validate(&with("age", json!(u64::MAX))).unwrap_err();
        assert_eq!(kinds(&err), vec!["less_than"]);
    }

    #[test]
    fn test_age_type_errors() {
        let err = validate(&with("age", json!(30.5))).unwrap_err();
        assert_eq!(kinds(&err), vec!["int_from_float"]);

        let err = validate(&with("age", json!("thirty"))).unwrap_err();
        assert_eq!(kinds(&err), vec!["int_type"]);
    }

    #[test]
    fn test_numeric_ranges() {
        let err = validate(&with("height", json!(2.5))).unwrap_err();
        assert_eq!(kinds(&err), vec!["less_than"]);
        assert_eq!(err.errors()[0].msg, "Input should be less than 2.5");

        let err = validate(&with("weight", json!(0))).unwrap_err();
        assert_eq!(kinds(&err), vec!["greater_than"]);

        let err = validate(&with("income_lpa", json!(-3.0))).unwrap_err();
        assert_eq!(err.fields(), vec!["income_lpa"]);

        // Integers are fine where a number is expected
        assert_eq!(validate(&with("weight", json!(80))).unwrap().weight, 80.0);
    }

    #[test]
    fn test_occupation_must_be_listed() {
        let err = validate(&with("occupation", json!("pilot"))).unwrap_err();
        assert_eq!(kinds(&err), vec!["literal_error"]);
        assert_eq!(
            err.errors()[0].msg,
            "Input should be 'retired', 'freelancer', 'student', 'government_job', \
             'business_owner', 'unemployed' or 'private_job'"
        );

        let err = validate(&with("occupation", json!(7))).unwrap_err();
        assert_eq!(kinds(&err), vec!["literal_error"]);
    }

    #[test]
    fn test_wrong_types() {
        let err = validate(&with("smoker", json!("yes please"))).unwrap_err();
        assert_eq!(kinds(&err), vec!["bool_type"]);

        let err = validate(&with("city", json!(42))).unwrap_err();
        assert_eq!(kinds(&err), vec!["string_type"]);

        let err = validate(&with("weight", json!("heavy"))).unwrap_err();
        assert_eq!(kinds(&err), vec!["float_type"]);
    }

    #[test]
    fn test_missing_field() {
        let err = validate(&without("city")).unwrap_err();
        assert_eq!(kinds(&err), vec!["missing"]);
        assert_eq!(err.errors()[0].loc, vec![json!("body"), json!("city")]);
    }

    #[test]
    fn test_collects_every_violation() {
        let body = json!({
            "age": 0,
            "weight": 70.0,
            "height": 3.0,
            "smoker": true,
            "city": "Pune",
            "occupation": "pilot"
        });
        let err = validate(&body).unwrap_err();
        assert_eq!(err.fields(), vec!["age", "height", "income_lpa", "occupation"]);
        assert_eq!(
            kinds(&err),
            vec!["greater_than", "less_than", "missing", "literal_error"]
        );
    }

    #[test]
    fn test_body_must_be_an_object() {
        let err = validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(kinds(&err), vec!["model_attributes_type"]);
        assert_eq!(err.errors()[0].field(), None);
    }

    #[test]
    fn test_error_serialization_shape() {
        let err = validate(&with("age", json!(0))).unwrap_err();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!([{
                "type": "greater_than",
                "loc": ["body", "age"],
                "msg": "Input should be greater than 0",
                "input": 0,
                "ctx": { "gt": 0 }
            }])
        );
    }

    fn decode_failure(body: &str) -> ValidationErrors {
        let err = serde_json::from_str::<Value>(body).unwrap_err();
        ValidationErrors::json_invalid(&err, body.as_bytes())
    }

    #[test]
    fn test_json_invalid_reports_offset() {
        let err = decode_failure("{\"age\": 30,");
        assert_eq!(kinds(&err), vec!["json_invalid"]);
        assert_eq!(err.errors()[0].loc, vec![json!("body"), json!(11)]);
    }

    #[test]
    fn test_json_invalid_offset_spans_lines() {
        let single = decode_failure("{\"age\": 30, \"city\": }");
        let multi = decode_failure("{\n\"age\": 30,\n\"city\": }");
        // Same failure point, shifted by the extra newline before it
        let single_at = single.errors()[0].loc[1].as_u64().unwrap();
        let multi_at = multi.errors()[0].loc[1].as_u64().unwrap();
        assert_eq!(multi_at, single_at + 1);
        assert!(multi_at > 10);
    }

    #[test]
    fn test_json_invalid_counts_characters() {
        let err = decode_failure("{\"city\": \"Pune\u{e9}\", }");
        let ascii = decode_failure("{\"city\": \"Punee\", }");
        assert_eq!(err.errors()[0].loc, ascii.errors()[0].loc);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let input = validate(&with("nickname", json!("ace"))).unwrap();
        assert_eq!(input.occupation, Occupation::PrivateJob);
    }
}
