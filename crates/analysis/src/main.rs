//! Collabnet Analysis
//!
//! Reads the unified collaborator table and:
//! 1. Resolves every coauthor id to one canonical name
//! 2. Ranks external collaborators by occurrence
//! 3. Explodes the ranking by affiliation id

mod ranking;
mod resolver;

use collabnet_common::{config::AppConfig, metrics, models::write_records, UnifiedTable, VERSION};
use ranking::CollaboratorRanker;
use resolver::{NameResolver, ResolverConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    let analysis = &config.analysis;

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.observability.log_level))
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(
        service = %config.observability.service_name,
        "Starting Collabnet Analysis v{}", VERSION
    );
    metrics::register_metrics();

    let table = UnifiedTable::read_path(&analysis.input_path)?;
    info!(rows = table.len(), input = %analysis.input_path.display(), "Collaborator table loaded");

    // Resolve names before anything is aggregated
    let resolver = NameResolver::new(ResolverConfig {
        break_ties_by_arrival: analysis.break_ties_by_arrival,
    });
    let mapping = resolver.resolve(&table).map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Name resolution failed");
        e
    })?;
    info!(renamed_ids = mapping.len(), "Name mapping applied");
    let table = resolver.apply(&table, &mapping);

    let internal = CollaboratorRanker::internal_ids(
        &table,
        &config.harvest.seeds_path,
        &config.harvest.identifier_field,
    );
    let mut ranking = CollaboratorRanker::rank(&table, &internal, analysis.subtype.as_deref());
    if let Some(n) = analysis.top_n {
        ranking = ranking.top(n);
    }
    if ranking.is_empty() {
        warn!("No external collaborators to rank");
    }
    write_records(&analysis.ranking_path, ranking.rows())?;

    let exploded = CollaboratorRanker::explode_affiliations(&ranking, &table);
    write_records(&analysis.affiliations_path, &exploded)?;

    info!(
        collaborators = ranking.len(),
        exploded_rows = exploded.len(),
        distinct_affiliations = CollaboratorRanker::distinct_affiliations(&exploded),
        ranking = %analysis.ranking_path.display(),
        affiliations = %analysis.affiliations_path.display(),
        "Collaborator ranking written"
    );

    Ok(())
}
