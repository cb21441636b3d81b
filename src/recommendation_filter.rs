use serde::{Deserialize, Serialize};

use crate::food::{FoodEntry, Label};

/// Foods to eat and foods to avoid, each in retrieval order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommend: Vec<String>,
    pub avoid: Vec<String>,
}

impl RecommendationResult {
    pub fn len(&self) -> usize {
        self.recommend.len() + self.avoid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommend.is_empty() && self.avoid.is_empty()
    }
}

/// Splits retrieved entries by label. Every entry lands in exactly one list;
/// nothing is deduplicated or reordered.
pub fn partition_by_label<'a, I>(entries: I) -> RecommendationResult
where
    I: IntoIterator<Item = &'a FoodEntry>,
{
    let mut result = RecommendationResult::default();
    for entry in entries {
        match entry.label {
            Label::Recommend => result.recommend.push(entry.food_entity.clone()),
            Label::Avoid => result.avoid.push(entry.food_entity.clone()),
        }
    }
    result
}
