//! Unified collaborator table (one row per publication x coauthor)
//!
//! Column layout:
//! - publication columns, including the seed author id
//! - seed descriptive columns, in first-seen order
//! - author columns, suffixed with `_collaborator` when a seed column
//!   already uses the name

use crate::errors::{AppError, Result};
use crate::models::publication::{full_name, AffiliationIds, AuthorRecord, Publication};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const PUBLICATION_COLUMNS: [&str; 8] = [
    "publication_id",
    "doi",
    "type",
    "subtype",
    "date",
    "citation_count",
    "journal_name",
    "seed_author_id",
];

pub const AUTHOR_COLUMNS: [&str; 6] = [
    "given_name",
    "surname",
    "coauthor_name",
    "author_order",
    "external_id",
    "affiliation_ids",
];

pub const COLLISION_SUFFIX: &str = "_collaborator";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A publication joined with one of its coauthors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorRow {
    pub publication_id: String,
    pub doi: Option<String>,
    pub kind: Option<String>,
    pub subtype: Option<String>,
    pub date: Option<NaiveDate>,
    pub citation_count: u32,
    pub journal_name: Option<String>,
    pub seed_author_id: String,
    pub seed_fields: BTreeMap<String, String>,

    pub given_name: Option<String>,
    pub surname: Option<String>,
    /// Display name; rewritten to the canonical name by resolution
    pub coauthor_name: Option<String>,
    pub author_order: u32,
    pub external_id: String,
    pub affiliation_ids: AffiliationIds,
}

impl CollaboratorRow {
    /// Combine a publication with an author record sharing its join keys
    pub fn join(publication: &Publication, author: &AuthorRecord) -> Self {
        Self {
            publication_id: publication.publication_id.clone(),
            doi: publication.doi.clone(),
            kind: publication.kind.clone(),
            subtype: publication.subtype.clone(),
            date: publication.date,
            citation_count: publication.citation_count,
            journal_name: publication.journal_name.clone(),
            seed_author_id: publication.seed_author_id.clone(),
            seed_fields: publication.seed_fields.clone(),

            given_name: author.given_name.clone(),
            surname: author.surname.clone(),
            coauthor_name: author.full_name(),
            author_order: author.author_order,
            external_id: author.external_id.clone(),
            affiliation_ids: author.affiliation_ids.clone(),
        }
    }

    fn publication_values(&self) -> [String; 8] {
        [
            self.publication_id.clone(),
            opt(&self.doi),
            opt(&self.kind),
            opt(&self.subtype),
            self.date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
            self.citation_count.to_string(),
            opt(&self.journal_name),
            self.seed_author_id.clone(),
        ]
    }

    fn author_values(&self) -> [String; 6] {
        [
            opt(&self.given_name),
            opt(&self.surname),
            opt(&self.coauthor_name),
            self.author_order.to_string(),
            self.external_id.clone(),
            self.affiliation_ids.to_string(),
        ]
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// The joined publication x author relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedTable {
    seed_columns: Vec<String>,
    rows: Vec<CollaboratorRow>,
}

impl UnifiedTable {
    /// Empty seed values are dropped; CSV cannot tell them from absent ones
    pub fn new(mut rows: Vec<CollaboratorRow>) -> Self {
        for row in &mut rows {
            row.seed_fields.retain(|_, value| !value.is_empty());
        }
        let mut seen = BTreeSet::new();
        let mut seed_columns = Vec::new();
        for key in rows.iter().flat_map(|r| r.seed_fields.keys()) {
            if seen.insert(key.clone()) {
                seed_columns.push(key.clone());
            }
        }
        Self { seed_columns, rows }
    }

    pub fn rows(&self) -> &[CollaboratorRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollaboratorRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<CollaboratorRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn seed_columns(&self) -> &[String] {
        &self.seed_columns
    }

    /// Distinct seed author ids present in the table
    pub fn seed_ids(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.seed_author_id.clone()).collect()
    }

    /// Header row, with author-side collisions suffixed
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = PUBLICATION_COLUMNS.iter().map(|c| c.to_string()).collect();
        headers.extend(self.seed_columns.iter().cloned());
        headers.extend(AUTHOR_COLUMNS.iter().map(|c| {
            if self.seed_columns.iter().any(|s| s == c) {
                format!("{}{}", c, COLLISION_SUFFIX)
            } else {
                c.to_string()
            }
        }));
        headers
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.headers())?;

        for row in &self.rows {
            let mut record: Vec<String> = row.publication_values().to_vec();
            record.extend(
                self.seed_columns
                    .iter()
                    .map(|c| row.seed_fields.get(c).cloned().unwrap_or_default()),
            );
            record.extend(row.author_values());
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

        let column = |name: &str| -> Result<usize> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| {
                    AppError::malformed("unified table", format!("missing column '{}'", name))
                })
        };

        let publication_idx = PUBLICATION_COLUMNS
            .iter()
            .map(|&c| column(c))
            .collect::<Result<Vec<_>>>()?;

        let mut consumed: BTreeSet<usize> = publication_idx.iter().copied().collect();
        let mut author_idx = Vec::with_capacity(AUTHOR_COLUMNS.len());
        for name in AUTHOR_COLUMNS {
            let suffixed = format!("{}{}", name, COLLISION_SUFFIX);
            let idx = match index.get(suffixed.as_str()) {
                Some(&i) => i,
                None => column(name)?,
            };
            consumed.insert(idx);
            author_idx.push(idx);
        }

        let seed_idx: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let get = |i: usize| record.get(i).unwrap_or("").to_string();
            let get_opt = |i: usize| Some(get(i)).filter(|v| !v.is_empty());
            let context = || format!("unified table row {}", line + 1);

            let date = match get_opt(publication_idx[4]) {
                Some(raw) => Some(
                    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
                        AppError::malformed(context(), format!("bad date '{}': {}", raw, e))
                    })?,
                ),
                None => None,
            };
            let citation_count = parse_number(&get(publication_idx[5]), "citation_count", context)?;
            let author_order = parse_number(&get(author_idx[3]), "author_order", context)?;

            rows.push(CollaboratorRow {
                publication_id: get(publication_idx[0]),
                doi: get_opt(publication_idx[1]),
                kind: get_opt(publication_idx[2]),
                subtype: get_opt(publication_idx[3]),
                date,
                citation_count,
                journal_name: get_opt(publication_idx[6]),
                seed_author_id: get(publication_idx[7]),
                seed_fields: seed_idx
                    .iter()
                    .filter_map(|(i, name)| get_opt(*i).map(|v| (name.clone(), v)))
                    .collect(),

                given_name: get_opt(author_idx[0]),
                surname: get_opt(author_idx[1]),
                coauthor_name: get_opt(author_idx[2]).or_else(|| {
                    full_name(
                        get_opt(author_idx[0]).as_deref(),
                        get_opt(author_idx[1]).as_deref(),
                    )
                }),
                author_order,
                external_id: get(author_idx[4]),
                affiliation_ids: AffiliationIds::parse(&get(author_idx[5])),
            });
        }

        let mut table = Self::new(rows);
        // keep the file's column order even for columns that are empty everywhere
        table.seed_columns = seed_idx.into_iter().map(|(_, name)| name).collect();
        Ok(table)
    }

    pub fn write_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.write_csv(File::create(path)?)
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        Self::read_csv(File::open(path)?)
    }
}

impl<'a> IntoIterator for &'a UnifiedTable {
    type Item = &'a CollaboratorRow;
    type IntoIter = std::slice::Iter<'a, CollaboratorRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn parse_number(raw: &str, field: &str, context: impl Fn() -> String) -> Result<u32> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| {
        AppError::malformed(context(), format!("{} is not a number: '{}'", field, raw))
    })
}

/// Write serializable records (rankings, exploded tables) as CSV
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(seed_fields: &[(&str, &str)]) -> Publication {
        Publication {
            publication_id: "85012345678".into(),
            doi: Some("10.1000/xyz".into()),
            kind: Some("Journal".into()),
            subtype: Some("Article".into()),
            date: NaiveDate::from_ymd_opt(2021, 3, 1),
            citation_count: 12,
            journal_name: Some("Journal of Tests, Part A".into()),
            author_list_locator: "https://example.org/abstract/scopus_id/85012345678".into(),
            seed_author_id: "7004212771".into(),
            seed_fields: seed_fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn author(surname: &str, external_id: &str, affiliations: &[&str]) -> AuthorRecord {
        AuthorRecord {
            given_name: Some("Ana".into()),
            surname: Some(surname.into()),
            author_order: 2,
            external_id: external_id.into(),
            affiliation_ids: AffiliationIds::new(
                affiliations.iter().map(|s| s.to_string()).collect(),
            ),
            publication_id: "85012345678".into(),
            seed_author_id: "7004212771".into(),
        }
    }

    #[test]
    fn test_join_derives_coauthor_name() {
        let row = CollaboratorRow::join(&publication(&[]), &author("Lima", "1", &["600"]));
        assert_eq!(row.coauthor_name.as_deref(), Some("Ana Lima"));
        assert_eq!(row.seed_author_id, "7004212771");
    }

    #[test]
    fn test_headers_suffix_author_collisions() {
        let pub_with_surname = publication(&[("Name", "Ada"), ("surname", "Byron")]);
        let table = UnifiedTable::new(vec![CollaboratorRow::join(
            &pub_with_surname,
            &author("Lima", "1", &[]),
        )]);
        let headers = table.headers();

        assert!(headers.contains(&"surname".to_string()));
        assert!(headers.contains(&"surname_collaborator".to_string()));
        assert!(headers.contains(&"given_name".to_string()));
        assert_eq!(headers.len(), PUBLICATION_COLUMNS.len() + 2 + AUTHOR_COLUMNS.len());
    }

    #[test]
    fn test_csv_round_trip_keeps_collisions_apart() {
        let pub_with_surname = publication(&[("Name", "Ada"), ("surname", "Byron")]);
        let table = UnifiedTable::new(vec![
            CollaboratorRow::join(&pub_with_surname, &author("Lima", "1", &["600", "601"])),
            CollaboratorRow::join(&pub_with_surname, &author("Souza", "2", &[])),
        ]);

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let restored = UnifiedTable::read_csv(buffer.as_slice()).unwrap();

        assert_eq!(restored, table);
        assert_eq!(restored.rows()[0].surname.as_deref(), Some("Lima"));
        let seed_surname = restored.rows()[0].seed_fields.get("surname");
        assert_eq!(seed_surname.map(String::as_str), Some("Byron"));
        assert!(restored.rows()[1].affiliation_ids.is_empty());
    }

    #[test]
    fn test_csv_round_trip_with_blank_values() {
        let blank_unit = publication(&[("Name", "Ada"), ("Unit", "")]);
        let table = UnifiedTable::new(vec![
            CollaboratorRow::join(&blank_unit, &author("Lima", "1", &[""])),
            CollaboratorRow::join(&blank_unit, &author("Souza", "2", &["600", "", "601"])),
        ]);
        assert!(table.rows()[0].seed_fields.get("Unit").is_none());
        assert!(table.rows()[0].affiliation_ids.is_empty());

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let restored = UnifiedTable::read_csv(buffer.as_slice()).unwrap();

        assert_eq!(restored, table);
        assert_eq!(restored.rows()[1].affiliation_ids.to_string(), "600,,601");
    }

    #[test]
    fn test_read_rejects_missing_columns() {
        let csv = "publication_id,doi\n1,10.1/x\n";
        assert!(UnifiedTable::read_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_seed_ids() {
        let table = UnifiedTable::new(vec![
            CollaboratorRow::join(&publication(&[]), &author("Lima", "1", &[])),
            CollaboratorRow::join(&publication(&[]), &author("Souza", "2", &[])),
        ]);
        let ids: Vec<String> = table.seed_ids().into_iter().collect();
        assert_eq!(ids, vec!["7004212771".to_string()]);
    }
}
