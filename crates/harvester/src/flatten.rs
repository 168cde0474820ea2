//! Search-page flattening into publication records

use crate::lenient;
use crate::pages::{Link, Page};
use chrono::NaiveDate;
use collabnet_common::config::QueryParams;
use collabnet_common::errors::{AppError, Result};
use collabnet_common::metrics;
use collabnet_common::models::{Publication, SeedIdentity};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const AUTHOR_AFFILIATION_REL: &str = "author-affiliation";
const AFFILIATION_QUALIFIER: &str = ",affiliation";

/// The allow-listed fields of a search entry
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "dc:identifier")]
    identifier: Option<String>,

    #[serde(rename = "prism:doi")]
    doi: Option<String>,

    #[serde(rename = "prism:aggregationType")]
    aggregation_type: Option<String>,

    #[serde(rename = "subtypeDescription")]
    subtype: Option<String>,

    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,

    #[serde(rename = "citedby-count", default, deserialize_with = "lenient::opt_number")]
    cited_by: Option<u64>,

    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,

    #[serde(default)]
    link: Vec<Link>,
}

/// Publications from one seed's pages, plus entries skipped as malformed
#[derive(Debug, Default)]
pub struct Flattened {
    pub publications: Vec<Publication>,
    pub skipped: usize,
}

/// Converts raw search pages into publication records
pub struct RecordFlattener {
    fixed_params: QueryParams,
    skip_malformed: bool,
}

impl RecordFlattener {
    pub fn new(fixed_params: QueryParams, skip_malformed: bool) -> Self {
        Self {
            fixed_params,
            skip_malformed,
        }
    }

    /// Merge entries across pages (page order) and map each to a publication
    pub fn flatten(&self, pages: &[Page], seed: &SeedIdentity) -> Result<Flattened> {
        let mut out = Flattened::default();

        for (position, entry) in pages.iter().flat_map(|p| p.entries()).enumerate() {
            match self.to_publication(entry, seed) {
                Ok(publication) => out.publications.push(publication),
                Err(e @ AppError::MalformedEntry { .. }) if self.skip_malformed => {
                    warn!(seed = %seed.author_id, position, error = %e, "Skipping malformed entry");
                    metrics::record_skipped_entry();
                    out.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        metrics::record_publications(out.publications.len(), &seed.author_id);
        Ok(out)
    }

    fn to_publication(&self, entry: &Value, seed: &SeedIdentity) -> Result<Publication> {
        let entry_context = || format!("search entry for seed {}", seed.author_id);
        let raw: RawEntry = serde_json::from_value(entry.clone())
            .map_err(|e| AppError::malformed(entry_context(), e.to_string()))?;

        let identifier = raw
            .identifier
            .as_deref()
            .ok_or_else(|| AppError::malformed(entry_context(), "missing dc:identifier"))?;
        let publication_id = publication_id(identifier);

        let href = raw
            .link
            .iter()
            .find(|l| l.rel == AUTHOR_AFFILIATION_REL)
            .map(|l| l.href.as_str())
            .ok_or_else(|| {
                AppError::malformed(
                    format!("publication {}", publication_id),
                    "no author-affiliation link",
                )
            })?;
        let author_list_locator = author_locator(href, &self.fixed_params).map_err(|message| {
            AppError::malformed(format!("publication {}", publication_id), message)
        })?;

        let date = raw.cover_date.as_deref().and_then(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|e| {
                    warn!(
                        publication = %publication_id,
                        date = d,
                        error = %e,
                        "Unparseable cover date"
                    )
                })
                .ok()
        });

        Ok(Publication {
            publication_id,
            doi: raw.doi,
            kind: raw.aggregation_type,
            subtype: raw.subtype,
            date,
            citation_count: raw.cited_by.unwrap_or(0).min(u32::MAX as u64) as u32,
            journal_name: raw.publication_name,
            author_list_locator,
            seed_author_id: seed.author_id.clone(),
            seed_fields: seed.fields.clone(),
        })
    }
}

/// Trailing segment of a compound id such as `SCOPUS_ID:85012345678`
pub fn publication_id(identifier: &str) -> String {
    identifier.rsplit(':').next().unwrap_or(identifier).to_string()
}

/// Author-detail URL: the link without its affiliation qualifier, plus the
/// fixed query parameters
pub fn author_locator(
    href: &str,
    fixed_params: &QueryParams,
) -> std::result::Result<String, String> {
    let trimmed = href.strip_suffix(AFFILIATION_QUALIFIER).unwrap_or(href);
    let mut url = reqwest::Url::parse(trimmed)
        .map_err(|e| format!("invalid author link '{}': {}", href, e))?;
    url.query_pairs_mut()
        .extend_pairs(fixed_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    Ok(url.to_string())
}
