use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dietary classification attached to every dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// `+1` in the dataset.
    Recommend,
    /// `-1` in the dataset.
    Avoid,
}

impl Label {
    pub fn as_i8(self) -> i8 {
        match self {
            Label::Recommend => 1,
            Label::Avoid => -1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Recommend => write!(f, "recommend"),
            Label::Avoid => write!(f, "avoid"),
        }
    }
}

impl TryFrom<f64> for Label {
    type Error = f64;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(Label::Recommend)
        } else if value == -1.0 {
            Ok(Label::Avoid)
        } else {
            Err(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLabelError(pub String);

impl fmt::Display for ParseLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid label '{}': expected 1 or -1", self.0)
    }
}

impl std::error::Error for ParseLabelError {}

impl FromStr for Label {
    type Err = ParseLabelError;

    // Accepts "1", "-1", "+1" and their float spellings ("1.0", "-1.0").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(|v| Label::try_from(v).ok())
            .ok_or_else(|| ParseLabelError(trimmed.to_string()))
    }
}

/// One row of the food/disease dataset, before it is joined with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    /// Zero-based data row number. Also the key of the row in the vector index.
    pub row: usize,
    pub food_entity: String,
    pub disease_entity: Option<String>,
    pub label: Label,
}

impl FoodRecord {
    /// Text embedded for this row when the index is built.
    pub fn index_text(&self) -> String {
        match self.disease_entity.as_deref().map(str::trim) {
            Some(disease) if !disease.is_empty() => format!("{} {}", self.food_entity, disease),
            _ => self.food_entity.clone(),
        }
    }
}

/// A dataset row joined with its (unit-normalized) vector from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodEntry {
    pub row: usize,
    pub food_entity: String,
    pub disease_entity: Option<String>,
    pub label: Label,
    pub embedding: Vec<f32>,
}

impl FoodEntry {
    pub fn new(record: FoodRecord, embedding: Vec<f32>) -> Self {
        Self {
            row: record.row,
            food_entity: record.food_entity,
            disease_entity: record.disease_entity,
            label: record.label,
            embedding,
        }
    }
}
