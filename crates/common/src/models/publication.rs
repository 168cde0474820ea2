//! Publication and author records produced by the harvester

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One publication of a seed identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Trailing segment of the compound Scopus identifier
    pub publication_id: String,

    pub doi: Option<String>,

    /// Aggregation type (Journal, Conference Proceeding, ...)
    pub kind: Option<String>,

    /// Subtype description (Article, Review, ...)
    pub subtype: Option<String>,

    /// Cover date
    pub date: Option<NaiveDate>,

    pub citation_count: u32,

    pub journal_name: Option<String>,

    /// URL of the author-detail request for this publication.
    /// Carries the API key, so it is never persisted.
    #[serde(default, skip_serializing)]
    pub author_list_locator: String,

    /// Seed identity this publication was retrieved for
    pub seed_author_id: String,

    /// Descriptive fields carried over from the seed
    #[serde(default)]
    pub seed_fields: BTreeMap<String, String>,
}

/// One author in a publication's byline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub given_name: Option<String>,
    pub surname: Option<String>,

    /// Position in the byline, starting at 1
    pub author_order: u32,

    /// The coauthor's own Scopus id
    pub external_id: String,

    pub affiliation_ids: AffiliationIds,

    pub publication_id: String,
    pub seed_author_id: String,
}

impl AuthorRecord {
    /// Given name and surname joined by a space; None only when both are absent
    pub fn full_name(&self) -> Option<String> {
        full_name(self.given_name.as_deref(), self.surname.as_deref())
    }
}

pub(crate) fn full_name(given: Option<&str>, surname: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [given, surname]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Affiliation ids of one author on one publication, in source order.
///
/// Rendered as a comma-joined string. An author without affiliations has
/// an empty list, never a missing value; an affiliation without an id keeps
/// its place as an empty token, except when it is the only one, which
/// renders the same as no affiliation and is held as an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffiliationIds(Vec<String>);

impl AffiliationIds {
    pub const DELIMITER: char = ',';

    pub fn new(ids: Vec<String>) -> Self {
        if let [only] = ids.as_slice() {
            if only.is_empty() {
                return Self::default();
            }
        }
        Self(ids)
    }

    /// Parse the delimited representation
    pub fn parse(joined: &str) -> Self {
        if joined.is_empty() {
            return Self::default();
        }
        Self(joined.split(Self::DELIMITER).map(str::to_string).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-empty ids, trimmed
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

impl fmt::Display for AffiliationIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}
