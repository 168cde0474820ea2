//! Seed input: one Scopus author id, or a list of people records

use collabnet_common::errors::{AppError, Result};
use collabnet_common::models::seed::read_people;
use collabnet_common::models::SeedIdentity;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// What the harvest runs over
#[derive(Debug, Clone, PartialEq)]
pub enum SeedInput {
    /// A bare author id with no descriptive fields
    Single(String),
    /// People records; each needs the identifier field to be harvested
    People(Vec<Map<String, Value>>),
}

impl SeedInput {
    /// Exactly one of the two inputs must be given
    pub fn from_parts(
        author_id: Option<String>,
        people: Option<Vec<Map<String, Value>>>,
    ) -> Result<Self> {
        match (author_id, people) {
            (Some(_), Some(_)) => Err(AppError::config(
                "give either a seed author id or people, not both",
            )),
            (Some(id), None) if !id.trim().is_empty() => {
                Ok(SeedInput::Single(id.trim().to_string()))
            }
            (None, Some(people)) if !people.is_empty() => Ok(SeedInput::People(people)),
            _ => Err(AppError::config(
                "a seed author id or a non-empty people list is required",
            )),
        }
    }

    /// Read a `{"people": [...]}` document
    pub fn load_people(path: &Path) -> Result<Self> {
        Self::from_parts(None, Some(read_people(path)?))
    }

    /// Normalize into validated seed identities.
    ///
    /// People without an identifier are dropped with a warning naming them;
    /// if nobody has one, the input is rejected. Repeated ids keep the first
    /// record.
    pub fn resolve(&self, identifier_field: &str, name_field: &str) -> Result<Vec<SeedIdentity>> {
        let people = match self {
            SeedInput::Single(id) => return Ok(vec![SeedIdentity::new(id.clone())]),
            SeedInput::People(people) => people,
        };

        let mut seeds = Vec::with_capacity(people.len());
        let mut missing = Vec::new();
        let mut seen = HashSet::new();

        for (position, record) in people.iter().enumerate() {
            match SeedIdentity::from_record(record, identifier_field)? {
                Some(seed) => {
                    if seen.insert(seed.author_id.clone()) {
                        seeds.push(seed);
                    } else {
                        warn!(author_id = %seed.author_id, "Duplicate seed identity ignored");
                    }
                }
                None => missing.push(
                    record
                        .get(name_field)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("<record {}>", position + 1)),
                ),
            }
        }

        if seeds.is_empty() {
            return Err(AppError::config(format!(
                "none of the people records contain the field '{}'",
                identifier_field
            )));
        }
        if !missing.is_empty() {
            warn!(
                people = ?missing,
                field = identifier_field,
                "Seeds without an identifier were dropped"
            );
        }

        Ok(seeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_inputs_are_exclusive() {
        let listed = people(json!([{"Scopus ID": "2"}]));
        let both = SeedInput::from_parts(Some("1".into()), Some(listed));
        assert!(both.unwrap_err().is_input_error());
        assert!(SeedInput::from_parts(None, None).is_err());
        assert!(SeedInput::from_parts(None, Some(Vec::new())).is_err());
        assert!(SeedInput::from_parts(Some("  ".into()), None).is_err());
    }

    #[test]
    fn test_single_id() {
        let seeds = SeedInput::from_parts(Some("7004212771".into()), None)
            .unwrap()
            .resolve("Scopus ID", "Name")
            .unwrap();
        assert_eq!(seeds, vec![SeedIdentity::new("7004212771")]);
    }

    #[test]
    fn test_people_without_id_dropped() {
        let input = SeedInput::People(people(json!([
            {"Name": "Ada Byron", "Scopus ID": "7004212771", "Unit": "Maths"},
            {"Name": "No Id"},
            {"Name": "Null Id", "Scopus ID": null}
        ])));
        let seeds = input.resolve("Scopus ID", "Name").unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].fields.get("Unit").map(String::as_str), Some("Maths"));
    }

    #[test]
    fn test_nobody_with_id_is_rejected() {
        let input = SeedInput::People(people(json!([{"Name": "A"}, {"Name": "B"}])));
        let err = input.resolve("Scopus ID", "Name").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_reserved_field_is_rejected() {
        let input = SeedInput::People(people(json!([{"Scopus ID": "1", "doi": "10.1/x"}])));
        assert!(input.resolve("Scopus ID", "Name").unwrap_err().is_input_error());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let input = SeedInput::People(people(json!([
            {"Scopus ID": "1", "Name": "First"},
            {"Scopus ID": 1, "Name": "Second"}
        ])));
        let seeds = input.resolve("Scopus ID", "Name").unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].fields.get("Name").map(String::as_str), Some("First"));
    }

    #[test]
    fn test_load_people_file() {
        let dir = std::env::temp_dir().join(format!("collabnet-seeds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("people.json");
        let raw = r#"{"people": [{"Name": "Ada", "Scopus ID": "7004212771"}]}"#;
        std::fs::write(&path, raw).unwrap();

        let seeds = SeedInput::load_people(&path).unwrap().resolve("Scopus ID", "Name").unwrap();
        assert_eq!(seeds[0].author_id, "7004212771");

        let missing = SeedInput::load_people(&dir.join("absent.json")).unwrap_err();
        assert!(missing.is_input_error());
        std::fs::remove_dir_all(&dir).ok();
    }
}
