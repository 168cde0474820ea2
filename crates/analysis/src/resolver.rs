//! Canonical coauthor names
//!
//! The same Scopus author id shows up under several spellings across
//! publications. Each id with more than one spelling gets one canonical
//! name: most frequent first, then longest, then (only when allowed) the
//! spelling seen first. Anything still tied is an error; the table is
//! never rewritten with an inconsistent mapping.

use collabnet_common::errors::{AmbiguousIdentity, AppError, Result};
use collabnet_common::metrics;
use collabnet_common::models::UnifiedTable;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Resolution settings
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverConfig {
    /// Let the first-seen spelling win a tie on count and length
    pub break_ties_by_arrival: bool,
}

/// external_id -> canonical name, for ids that needed resolving
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping(BTreeMap<String, String>);

impl NameMapping {
    pub fn get(&self, external_id: &str) -> Option<&str> {
        self.0.get(external_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One spelling of one id: how often it occurs and where it first appears
#[derive(Debug)]
struct Variant<'a> {
    name: &'a str,
    count: usize,
    first_seen: usize,
}

pub struct NameResolver {
    config: ResolverConfig,
}

impl NameResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Compute the canonical name of every id with several spellings
    #[instrument(skip_all, fields(rows = table.len()))]
    pub fn resolve(&self, table: &UnifiedTable) -> Result<NameMapping> {
        let mut variants: BTreeMap<&str, Vec<Variant<'_>>> = BTreeMap::new();

        for (position, row) in table.iter().enumerate() {
            let Some(name) = row.coauthor_name.as_deref() else {
                continue;
            };
            let spellings = variants.entry(row.external_id.as_str()).or_default();
            match spellings.iter_mut().find(|v| v.name == name) {
                Some(variant) => variant.count += 1,
                None => spellings.push(Variant {
                    name,
                    count: 1,
                    first_seen: position,
                }),
            }
        }

        let mut mapping = BTreeMap::new();
        let mut ambiguous = Vec::new();

        for (external_id, spellings) in variants.into_iter().filter(|(_, v)| v.len() > 1) {
            let winners = self.select(spellings);
            if winners.len() == 1 {
                debug!(external_id, name = winners[0], "Name resolved");
                mapping.insert(external_id.to_string(), winners[0].to_string());
            } else {
                ambiguous.push(AmbiguousIdentity {
                    external_id: external_id.to_string(),
                    candidates: winners.iter().map(|n| n.to_string()).collect(),
                });
            }
        }

        if !ambiguous.is_empty() {
            return Err(AppError::ResolutionAmbiguity {
                identities: ambiguous,
            });
        }

        info!(resolved = mapping.len(), "Coauthor names resolved");
        metrics::record_resolution(mapping.len());
        Ok(NameMapping(mapping))
    }

    /// Names surviving the tie-break chain, in arrival order
    fn select<'a>(&self, mut spellings: Vec<Variant<'a>>) -> Vec<&'a str> {
        let top_count = spellings.iter().map(|v| v.count).max().unwrap_or(0);
        spellings.retain(|v| v.count == top_count);

        let top_len = spellings.iter().map(|v| v.name.chars().count()).max().unwrap_or(0);
        spellings.retain(|v| v.name.chars().count() == top_len);

        spellings.sort_by_key(|v| v.first_seen);
        if self.config.break_ties_by_arrival {
            spellings.truncate(1);
        }
        spellings.into_iter().map(|v| v.name).collect()
    }

    /// Rewrite coauthor names through the mapping; unmapped rows keep theirs
    pub fn apply(&self, table: &UnifiedTable, mapping: &NameMapping) -> UnifiedTable {
        let rows = table
            .iter()
            .cloned()
            .map(|mut row| {
                if let Some(name) = mapping.get(&row.external_id) {
                    row.coauthor_name = Some(name.to_string());
                }
                row
            })
            .collect();
        UnifiedTable::new(rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use collabnet_common::models::{AffiliationIds, CollaboratorRow};
    use std::collections::BTreeSet;

    /// A table row for coauthor `external_id` on `publication_id` of seed `seed`
    pub fn row(
        seed: &str,
        publication_id: &str,
        external_id: &str,
        name: Option<&str>,
        affiliations: &str,
    ) -> CollaboratorRow {
        CollaboratorRow {
            publication_id: publication_id.into(),
            doi: None,
            kind: Some("Journal".into()),
            subtype: Some("Article".into()),
            date: None,
            citation_count: 0,
            journal_name: None,
            seed_author_id: seed.into(),
            seed_fields: Default::default(),
            given_name: None,
            surname: None,
            coauthor_name: name.map(str::to_string),
            author_order: 1,
            external_id: external_id.into(),
            affiliation_ids: AffiliationIds::parse(affiliations),
        }
    }

    fn named(external_id: &str, names: &[(&str, usize)]) -> Vec<CollaboratorRow> {
        let mut rows = Vec::new();
        for (name, count) in names {
            for i in 0..*count {
                rows.push(row("S", &format!("{}-{}", name, i), external_id, Some(*name), ""));
            }
        }
        rows
    }

    #[test]
    fn test_majority_then_length() {
        let table = UnifiedTable::new(named(
            "X",
            &[("Jon Smith", 3), ("John Smith", 3), ("Jonathan Smith", 1)],
        ));
        let mapping = NameResolver::new(ResolverConfig::default()).resolve(&table).unwrap();
        assert_eq!(mapping.get("X"), Some("John Smith"));
    }

    #[test]
    fn test_majority_beats_length() {
        let table = UnifiedTable::new(named("X", &[("J. Smith", 4), ("Jonathan Smith", 1)]));
        let mapping = NameResolver::new(ResolverConfig::default()).resolve(&table).unwrap();
        assert_eq!(mapping.get("X"), Some("J. Smith"));
    }

    #[test]
    fn test_unbreakable_tie_is_an_error() {
        let mut rows = named("X", &[("Ana Lima", 2), ("Ana Lime", 2)]);
        rows.extend(named("Y", &[("Bo Chen", 1)]));
        let table = UnifiedTable::new(rows);

        let err = NameResolver::new(ResolverConfig::default()).resolve(&table).unwrap_err();
        match err {
            AppError::ResolutionAmbiguity { identities } => {
                assert_eq!(identities.len(), 1);
                assert_eq!(identities[0].external_id, "X");
                assert_eq!(identities[0].candidates, vec!["Ana Lima", "Ana Lime"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_arrival_order_when_allowed() {
        let table = UnifiedTable::new(named("X", &[("Ana Lime", 2), ("Ana Lima", 2)]));
        let resolver = NameResolver::new(ResolverConfig {
            break_ties_by_arrival: true,
        });
        assert_eq!(resolver.resolve(&table).unwrap().get("X"), Some("Ana Lime"));
    }

    #[test]
    fn test_single_variant_passes_through() {
        let mut rows = named("Y", &[("Bo Chen", 2)]);
        rows.push(row("S", "p", "Y", None, ""));
        let table = UnifiedTable::new(rows);

        let resolver = NameResolver::new(ResolverConfig::default());
        let mapping = resolver.resolve(&table).unwrap();
        assert!(mapping.is_empty());
        assert_eq!(resolver.apply(&table, &mapping), table);
    }

    #[test]
    fn test_apply_rewrites_every_row_of_the_id() {
        let mut rows = named("X", &[("Jon Smith", 1), ("John Smith", 2)]);
        rows.push(row("S", "p", "X", None, ""));
        rows.extend(named("Y", &[("Bo Chen", 1)]));
        let table = UnifiedTable::new(rows);

        let resolver = NameResolver::new(ResolverConfig::default());
        let resolved = resolver.apply(&table, &resolver.resolve(&table).unwrap());

        let names: BTreeSet<Option<&str>> = resolved
            .iter()
            .filter(|r| r.external_id == "X")
            .map(|r| r.coauthor_name.as_deref())
            .collect();
        assert_eq!(names, BTreeSet::from([Some("John Smith")]));
        assert_eq!(resolved.len(), table.len());
        // input untouched
        assert!(table.iter().any(|r| r.coauthor_name.as_deref() == Some("Jon Smith")));
    }

    #[test]
    fn test_every_id_maps_to_one_name() {
        let mut rows = Vec::new();
        for (i, id) in ["A", "B", "C", "D"].iter().enumerate() {
            rows.extend(named(id, &[("Short", i + 1), ("Much Longer", 2)]));
        }
        let table = UnifiedTable::new(rows);
        let resolver = NameResolver::new(ResolverConfig::default());
        let resolved = resolver.apply(&table, &resolver.resolve(&table).unwrap());

        let mut per_id: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for r in resolved.iter() {
            per_id.entry(&r.external_id).or_default().extend(r.coauthor_name.as_deref());
        }
        assert!(per_id.values().all(|names| names.len() == 1));
    }
}
