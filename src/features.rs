use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use serde_with::{serde_as, DeserializeAs};

pub const FEATURE_COUNT: usize = 13;

/// Column order the classifier was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

/// The clinical inputs of one prediction, exactly as submitted.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, sqlx::FromRow)]
pub struct Features {
    #[serde_as(as = "Numeric")]
    pub age: f64,
    #[serde_as(as = "Numeric")]
    pub sex: f64,
    #[serde_as(as = "Numeric")]
    pub cp: f64,
    #[serde_as(as = "Numeric")]
    pub trestbps: f64,
    #[serde_as(as = "Numeric")]
    pub chol: f64,
    #[serde_as(as = "Numeric")]
    pub fbs: f64,
    #[serde_as(as = "Numeric")]
    pub restecg: f64,
    #[serde_as(as = "Numeric")]
    pub thalach: f64,
    #[serde_as(as = "Numeric")]
    pub exang: f64,
    #[serde_as(as = "Numeric")]
    pub oldpeak: f64,
    #[serde_as(as = "Numeric")]
    pub slope: f64,
    #[serde_as(as = "Numeric")]
    pub ca: f64,
    #[serde_as(as = "Numeric")]
    pub thal: f64,
}

#[derive(Debug)]
pub enum FeatureError {
    Malformed(serde_json::Error),
    NotFinite(&'static str),
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::NotFinite(name) => write!(f, "feature `{name}` is not a finite number"),
        }
    }
}

impl Features {
    pub fn from_json(body: &[u8]) -> Result<Self, FeatureError> {
        let features: Self = serde_json::from_slice(body).map_err(FeatureError::Malformed)?;

        for (name, value) in FEATURE_NAMES.into_iter().zip(features.to_vector()) {
            if !value.is_finite() {
                return Err(FeatureError::NotFinite(name));
            }
        }

        Ok(features)
    }

    pub fn to_vector(&self) -> FeatureVector {
        [
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalach,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }
}

/// Accepts a JSON number or a string holding one, like a form field would.
struct Numeric;

impl<'de> DeserializeAs<'de, f64> for Numeric {
    fn deserialize_as<D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NumericVisitor)
    }
}

struct NumericVisitor;

impl<'de> Visitor<'de> for NumericVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        v.trim()
            .parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}
