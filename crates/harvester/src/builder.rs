//! Collaborator table construction
//!
//! For each seed identity, in input order:
//! 1. fetch every search page and flatten it into publications
//! 2. fetch each publication's author list (bounded concurrency, order kept)
//! 3. optionally checkpoint the seed's results
//!
//! Publications and authors are then inner-joined on
//! (publication_id, seed_author_id) into the unified table.

use crate::authors::AuthorListFetcher;
use crate::checkpoint::CheckpointStore;
use crate::flatten::RecordFlattener;
use crate::pages::PageFetcher;
use crate::seeds::SeedInput;
use collabnet_common::config::{HarvestConfig, QueryParams, ScopusConfig};
use collabnet_common::errors::Result;
use collabnet_common::metrics;
use collabnet_common::models::{
    AuthorRecord, CollaboratorRow, Publication, SeedIdentity, UnifiedTable,
};
use collabnet_common::scopus::ScopusTransport;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Everything harvested for one seed identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBucket {
    pub seed: SeedIdentity,
    pub publications: Vec<Publication>,
    pub authors: Vec<AuthorRecord>,
    #[serde(default)]
    pub skipped: usize,
}

/// Counts reported after a build
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildSummary {
    pub seeds: usize,
    pub resumed_seeds: usize,
    pub publications: usize,
    pub authors: usize,
    pub rows: usize,
    pub skipped_entries: usize,
    pub elapsed_secs: f64,
}

pub struct CollaboratorTableBuilder {
    pages: PageFetcher,
    authors: AuthorListFetcher,
    flattener: RecordFlattener,
    search_params: QueryParams,
    identifier_field: String,
    name_field: String,
    max_concurrent: usize,
    checkpoints: Option<CheckpointStore>,
}

impl CollaboratorTableBuilder {
    pub fn new(
        transport: Arc<dyn ScopusTransport>,
        scopus: &ScopusConfig,
        api_key: &str,
        harvest: &HarvestConfig,
    ) -> Self {
        Self {
            pages: PageFetcher::new(transport.clone(), scopus.search_url()),
            authors: AuthorListFetcher::new(transport),
            flattener: RecordFlattener::new(scopus.fixed_params(api_key), harvest.skip_malformed),
            search_params: scopus.search_params(api_key),
            identifier_field: harvest.identifier_field.clone(),
            name_field: harvest.name_field.clone(),
            max_concurrent: harvest.max_concurrent_requests.max(1),
            checkpoints: None,
        }
    }

    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Harvest every seed and join the results.
    ///
    /// Input problems surface before any request is made; any fetch or
    /// malformed-entry error aborts the whole build.
    #[instrument(skip_all)]
    pub async fn build(&self, input: &SeedInput) -> Result<(UnifiedTable, BuildSummary)> {
        let started = Instant::now();
        let seeds = input.resolve(&self.identifier_field, &self.name_field)?;
        seeds.iter().try_for_each(SeedIdentity::validate)?;

        let mut summary = BuildSummary {
            seeds: seeds.len(),
            ..Default::default()
        };
        let mut publications = Vec::new();
        let mut authors = Vec::new();

        for seed in &seeds {
            let cached = match &self.checkpoints {
                Some(store) => store.load(&seed.author_id)?.filter(|b| b.seed == *seed),
                None => None,
            };

            let bucket = match cached {
                Some(bucket) => {
                    info!(seed = %seed.author_id, "Resuming seed from checkpoint");
                    summary.resumed_seeds += 1;
                    bucket
                }
                None => {
                    let bucket = self.harvest_seed(seed).await?;
                    if let Some(store) = &self.checkpoints {
                        store.save(&bucket)?;
                    }
                    bucket
                }
            };

            summary.skipped_entries += bucket.skipped;
            publications.extend(bucket.publications);
            authors.extend(bucket.authors);
        }

        let table = join(&publications, &authors);

        summary.publications = publications.len();
        summary.authors = authors.len();
        summary.rows = table.len();
        summary.elapsed_secs = started.elapsed().as_secs_f64();
        metrics::record_build(summary.elapsed_secs);

        Ok((table, summary))
    }

    #[instrument(skip_all, fields(seed = %seed.author_id))]
    async fn harvest_seed(&self, seed: &SeedIdentity) -> Result<SeedBucket> {
        let pages = self.pages.fetch_all(&seed.author_id, &self.search_params).await?;
        metrics::record_pages(pages.len());

        let flattened = self.flattener.flatten(&pages, seed)?;

        let author_lists: Vec<Vec<AuthorRecord>> = stream::iter(flattened.publications.iter())
            .map(|p| {
                self.authors
                    .fetch_authors(&p.author_list_locator, &p.publication_id, &seed.author_id)
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;
        let authors: Vec<AuthorRecord> = author_lists.into_iter().flatten().collect();

        info!(
            pages = pages.len(),
            publications = flattened.publications.len(),
            authors = authors.len(),
            skipped = flattened.skipped,
            "Seed harvested"
        );

        Ok(SeedBucket {
            seed: seed.clone(),
            publications: flattened.publications,
            authors,
            skipped: flattened.skipped,
        })
    }
}

/// Inner join on (publication_id, seed_author_id), publications in order,
/// each followed by its authors in byline order. Repeated keys on both
/// sides multiply.
pub fn join(publications: &[Publication], authors: &[AuthorRecord]) -> UnifiedTable {
    let mut by_key: HashMap<(&str, &str), Vec<&AuthorRecord>> = HashMap::new();
    for author in authors {
        by_key
            .entry((author.publication_id.as_str(), author.seed_author_id.as_str()))
            .or_default()
            .push(author);
    }

    let rows = publications
        .iter()
        .flat_map(|p| {
            by_key
                .get(&(p.publication_id.as_str(), p.seed_author_id.as_str()))
                .into_iter()
                .flatten()
                .map(move |a| CollaboratorRow::join(p, a))
        })
        .collect();

    UnifiedTable::new(rows)
}
