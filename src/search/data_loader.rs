use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

use crate::error::LoadError;
use crate::food::{FoodRecord, Label};

const FOOD_ENTITY_COL: &str = "food_entity";
const LABEL_COL: &str = "label";
const DISEASE_ENTITY_COL: &str = "disease_entity";

fn column_index(headers: &StringRecord, name: &'static str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

/// Loads every row of the food/disease dataset. Row `i` of the file (after the header)
/// becomes `FoodRecord { row: i, .. }`; no row is ever skipped, so rows stay aligned
/// with the vector index.
pub fn load_food_dataset(csv_path: &Path) -> Result<Vec<FoodRecord>, LoadError> {
    if !csv_path.exists() {
        return Err(LoadError::DatasetNotFound(csv_path.to_path_buf()));
    }
    let csv_error = |source: csv::Error| LoadError::Dataset {
        path: csv_path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(csv_path)
        .map_err(csv_error)?;

    let headers = rdr.headers().map_err(csv_error)?.clone();
    let food_idx = column_index(&headers, FOOD_ENTITY_COL).ok_or(LoadError::MissingColumn(FOOD_ENTITY_COL))?;
    let label_idx = column_index(&headers, LABEL_COL).ok_or(LoadError::MissingColumn(LABEL_COL))?;
    let disease_idx = column_index(&headers, DISEASE_ENTITY_COL);

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;

        let food_entity = record.get(food_idx).unwrap_or_default().to_string();
        if food_entity.is_empty() {
            return Err(LoadError::EmptyFoodEntity(row));
        }

        let raw_label = record.get(label_idx).unwrap_or_default();
        let label: Label = raw_label.parse().map_err(|_| LoadError::InvalidLabel {
            row,
            value: raw_label.to_string(),
        })?;

        let disease_entity = disease_idx
            .and_then(|idx| record.get(idx))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        records.push(FoodRecord {
            row,
            food_entity,
            disease_entity,
            label,
        });
    }

    if records.is_empty() {
        return Err(LoadError::EmptyDataset(csv_path.to_path_buf()));
    }

    tracing::debug!(path = ?csv_path, rows = records.len(), "Loaded food dataset");
    Ok(records)
}
