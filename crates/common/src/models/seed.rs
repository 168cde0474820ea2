//! Seed identities: the people whose publication histories are harvested

use crate::errors::{AppError, Result};
use crate::models::table::{AUTHOR_COLUMNS, COLLISION_SUFFIX, PUBLICATION_COLUMNS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A seed identity with its Scopus author id and descriptive fields.
///
/// Every descriptive field is copied onto each publication (and therefore
/// each collaborator row) generated for this seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedIdentity {
    pub author_id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl SeedIdentity {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Build from a raw seed record, taking the id from `identifier_field`.
    ///
    /// Returns `Ok(None)` when the record has no usable identifier. Null and
    /// empty values are dropped and scalars are stringified.
    pub fn from_record(
        record: &Map<String, Value>,
        identifier_field: &str,
    ) -> Result<Option<Self>> {
        let Some(author_id) = record_author_id(record, identifier_field) else {
            return Ok(None);
        };

        let mut seed = Self::new(author_id);
        for (key, value) in record {
            if key == identifier_field {
                continue;
            }
            if let Some(text) = value_to_string(value).filter(|t| !t.is_empty()) {
                validate_field_name(key)?;
                seed.fields.insert(key.clone(), text);
            }
        }

        Ok(Some(seed))
    }

    /// Check every descriptive field against the reserved column names
    pub fn validate(&self) -> Result<()> {
        if self.author_id.trim().is_empty() {
            return Err(AppError::config("seed identity has an empty author id"));
        }
        self.fields.keys().try_for_each(|k| validate_field_name(k))
    }
}

/// Seed fields live on the publication side of the join, so they may not
/// shadow a publication column or the suffixed form of an author column.
pub fn validate_field_name(name: &str) -> Result<()> {
    if PUBLICATION_COLUMNS.contains(&name) {
        return Err(AppError::config(format!(
            "seed field '{}' would overwrite the publication column of the same name",
            name
        )));
    }
    if let Some(base) = name.strip_suffix(COLLISION_SUFFIX) {
        if AUTHOR_COLUMNS.contains(&base) {
            return Err(AppError::config(format!(
                "seed field '{}' is reserved for the suffixed author column",
                name
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct PeopleFile {
    people: Vec<Map<String, Value>>,
}

/// Read the records of a `{"people": [...]}` document
pub fn read_people(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("cannot read seeds file {}: {}", path.display(), e))
    })?;
    let file: PeopleFile = serde_json::from_str(&raw).map_err(|e| {
        AppError::config(format!("invalid seeds file {}: {}", path.display(), e))
    })?;
    Ok(file.people)
}

/// Author ids of every person in a seeds file, including people who never
/// made it into a harvested row
pub fn seed_ids_from_file(path: &Path, identifier_field: &str) -> Result<BTreeSet<String>> {
    Ok(read_people(path)?
        .iter()
        .filter_map(|record| record_author_id(record, identifier_field))
        .collect())
}

fn record_author_id(record: &Map<String, Value>, identifier_field: &str) -> Option<String> {
    record
        .get(identifier_field)
        .and_then(value_to_string)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
