//! Collaborator ranking and affiliation explosion

use collabnet_common::models::{seed::seed_ids_from_file, UnifiedTable};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// How often one external collaborator occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingRow {
    pub external_id: String,
    pub canonical_name: Option<String>,
    pub occurrence_count: usize,
}

/// A ranking row repeated once per distinct affiliation of its collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplodedRow {
    pub external_id: String,
    pub canonical_name: Option<String>,
    pub occurrence_count: usize,
    pub affiliation_id: String,
}

/// Ranked collaborators, most frequent first (ties by external id)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingTable {
    rows: Vec<RankingRow>,
}

impl RankingTable {
    pub fn rows(&self) -> &[RankingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep the first `n` rows
    pub fn top(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }
}

pub struct CollaboratorRanker;

impl CollaboratorRanker {
    /// Ids that are never ranked: every seed in the table plus every seed
    /// listed in the seeds file, so seeds without rows of their own stay
    /// internal. An unreadable seeds file only narrows this to the table.
    pub fn internal_ids(
        table: &UnifiedTable,
        seeds_path: &Path,
        identifier_field: &str,
    ) -> BTreeSet<String> {
        let mut ids = table.seed_ids();
        match seed_ids_from_file(seeds_path, identifier_field) {
            Ok(listed) => ids.extend(listed),
            Err(e) => warn!(
                error = %e,
                seeds = %seeds_path.display(),
                "Seeds file unavailable, excluding only seeds present in the table"
            ),
        }
        ids
    }

    /// Count rows per coauthor id, leaving out the excluded ids (the seeds
    /// themselves) and, if given, rows of other publication subtypes.
    ///
    /// The name of a ranked id is the first name its rows carry, which is
    /// the canonical one once names are resolved.
    pub fn rank(
        table: &UnifiedTable,
        exclude_ids: &BTreeSet<String>,
        subtype: Option<&str>,
    ) -> RankingTable {
        let mut counts: BTreeMap<&str, (Option<&str>, usize)> = BTreeMap::new();

        for row in table
            .iter()
            .filter(|r| !exclude_ids.contains(&r.external_id))
            .filter(|r| subtype.map_or(true, |s| r.subtype.as_deref() == Some(s)))
        {
            let entry = counts.entry(row.external_id.as_str()).or_insert((None, 0));
            if entry.0.is_none() {
                entry.0 = row.coauthor_name.as_deref();
            }
            entry.1 += 1;
        }

        let mut rows: Vec<RankingRow> = counts
            .into_iter()
            .map(|(external_id, (name, count))| RankingRow {
                external_id: external_id.to_string(),
                canonical_name: name.map(str::to_string),
                occurrence_count: count,
            })
            .collect();
        // stable: ids already ascending
        rows.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));

        RankingTable { rows }
    }

    /// Distinct affiliation tokens of every coauthor id in the table
    pub fn affiliations_by_id(table: &UnifiedTable) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut by_id: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for row in table {
            by_id
                .entry(row.external_id.as_str())
                .or_default()
                .extend(row.affiliation_ids.tokens());
        }
        by_id
    }

    /// Inner-join each ranked id with its distinct affiliations. Counts are
    /// carried over unchanged; ids without any affiliation drop out.
    pub fn explode_affiliations(ranking: &RankingTable, table: &UnifiedTable) -> Vec<ExplodedRow> {
        let by_id = Self::affiliations_by_id(table);

        ranking
            .rows()
            .iter()
            .flat_map(|r| {
                by_id
                    .get(r.external_id.as_str())
                    .into_iter()
                    .flatten()
                    .map(move |affiliation| ExplodedRow {
                        external_id: r.external_id.clone(),
                        canonical_name: r.canonical_name.clone(),
                        occurrence_count: r.occurrence_count,
                        affiliation_id: affiliation.to_string(),
                    })
            })
            .collect()
    }

    /// Number of distinct affiliations among exploded rows
    pub fn distinct_affiliations(exploded: &[ExplodedRow]) -> usize {
        exploded
            .iter()
            .map(|r| r.affiliation_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
