//! Author-list retrieval for a single publication

use crate::lenient;
use collabnet_common::errors::{AppError, Result};
use collabnet_common::metrics;
use collabnet_common::models::{AffiliationIds, AuthorRecord};
use collabnet_common::scopus::{redact, ScopusTransport};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize)]
struct RetrievalEnvelope {
    #[serde(rename = "abstracts-retrieval-response")]
    response: RetrievalResponse,
}

#[derive(Deserialize)]
struct RetrievalResponse {
    authors: Option<AuthorsBlock>,
}

#[derive(Deserialize)]
struct AuthorsBlock {
    #[serde(default)]
    author: OneOrMany<RawAuthor>,
}

/// Scopus sends a lone element instead of a one-element list
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct RawAuthor {
    #[serde(rename = "ce:given-name")]
    given_name: Option<String>,

    #[serde(rename = "ce:surname")]
    surname: Option<String>,

    #[serde(rename = "@seq", default, deserialize_with = "lenient::opt_number")]
    seq: Option<u64>,

    #[serde(rename = "@auid", default, deserialize_with = "lenient::opt_text")]
    auid: Option<String>,

    #[serde(default)]
    affiliation: Affiliations,
}

#[derive(Deserialize)]
struct RawAffiliation {
    #[serde(rename = "@id", default, deserialize_with = "lenient::opt_text")]
    id: Option<String>,
}

/// An author's affiliation field: absent, a single object, or a list
#[derive(Default)]
enum Affiliations {
    #[default]
    None,
    One(RawAffiliation),
    Many(Vec<RawAffiliation>),
}

impl<'de> Deserialize<'de> for Affiliations {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<OneOrMany<RawAffiliation>>::deserialize(deserializer)? {
            None => Affiliations::None,
            Some(OneOrMany::One(affiliation)) => Affiliations::One(affiliation),
            Some(OneOrMany::Many(list)) => Affiliations::Many(list),
        })
    }
}

impl Affiliations {
    fn into_ids(self) -> AffiliationIds {
        let list = match self {
            Affiliations::None => Vec::new(),
            Affiliations::One(affiliation) => vec![affiliation],
            Affiliations::Many(list) => list,
        };
        AffiliationIds::new(list.into_iter().map(|a| a.id.unwrap_or_default()).collect())
    }
}

/// Decode an author-detail response into byline-ordered records
pub fn parse_authors(
    body: Value,
    publication_id: &str,
    seed_author_id: &str,
) -> Result<Vec<AuthorRecord>> {
    let context = || format!("author list of publication {}", publication_id);

    let envelope: RetrievalEnvelope =
        serde_json::from_value(body).map_err(|e| AppError::malformed(context(), e.to_string()))?;
    let block = envelope
        .response
        .authors
        .ok_or_else(|| AppError::malformed(context(), "response has no authors"))?;

    block
        .author
        .into_vec()
        .into_iter()
        .enumerate()
        .map(|(position, raw)| {
            let missing = |attribute: &str| {
                AppError::malformed(
                    context(),
                    format!("author {} has no {}", position + 1, attribute),
                )
            };
            let external_id = raw
                .auid
                .filter(|id| !id.is_empty())
                .ok_or_else(|| missing("@auid"))?;
            let seq = raw.seq.ok_or_else(|| missing("@seq"))?;

            Ok(AuthorRecord {
                given_name: raw.given_name,
                surname: raw.surname,
                author_order: u32::try_from(seq).map_err(|_| {
                    AppError::malformed(context(), format!("author order {} out of range", seq))
                })?,
                external_id,
                affiliation_ids: raw.affiliation.into_ids(),
                publication_id: publication_id.to_string(),
                seed_author_id: seed_author_id.to_string(),
            })
        })
        .collect()
}

/// Fetches a publication's author list through a transport
#[derive(Clone)]
pub struct AuthorListFetcher {
    transport: Arc<dyn ScopusTransport>,
}

impl AuthorListFetcher {
    pub fn new(transport: Arc<dyn ScopusTransport>) -> Self {
        Self { transport }
    }

    pub async fn fetch_authors(
        &self,
        locator: &str,
        publication_id: &str,
        seed_author_id: &str,
    ) -> Result<Vec<AuthorRecord>> {
        debug!(url = %redact(locator), publication = publication_id, "Fetching author list");
        let body = self.transport.get_json(locator).await?;
        let authors = parse_authors(body, publication_id, seed_author_id)?;
        metrics::record_authors(authors.len());
        Ok(authors)
    }
}
