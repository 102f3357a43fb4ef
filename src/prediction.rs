use std::fmt;

use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;

use crate::features::{Features, FEATURE_COUNT};
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Risk {
    Low,
    High,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::High => "High Risk",
        }
    }
}

impl TryFrom<i64> for Risk {
    type Error = String;

    fn try_from(class: i64) -> Result<Self, Self::Error> {
        match class {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            _ => Err(format!("model returned unexpected class {class}")),
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every `/predict` response, including failures.
#[derive(Debug, Serialize)]
pub struct PredictionText {
    pub prediction_text: String,
}

impl PredictionText {
    pub fn risk(risk: Risk) -> Self {
        Self {
            prediction_text: risk.to_string(),
        }
    }

    pub fn error(msg: impl fmt::Display) -> Self {
        Self {
            prediction_text: format!("Error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub timestamp: Timestamp,
    #[sqlx(flatten)]
    pub features: Features,
    pub prediction_result: String,
}

// one row is rendered as a flat array in column order
impl Serialize for PredictionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_tuple(FEATURE_COUNT + 4)?;
        row.serialize_element(&self.id)?;
        row.serialize_element(&self.user_id)?;
        row.serialize_element(&self.timestamp)?;
        for value in self.features.to_vector() {
            row.serialize_element(&value)?;
        }
        row.serialize_element(&self.prediction_result)?;
        row.end()
    }
}
