//! Collabnet Harvester
//!
//! Builds the unified collaborator table:
//! 1. Reads the seed identities (a single Scopus id argument, or the seeds file)
//! 2. Pages through each seed's Scopus search results
//! 3. Fetches every publication's author list
//! 4. Joins publications with authors and writes the table as CSV

mod authors;
mod builder;
mod checkpoint;
mod flatten;
mod lenient;
mod pages;
mod seeds;

use builder::CollaboratorTableBuilder;
use checkpoint::CheckpointStore;
use collabnet_common::{config::AppConfig, metrics, scopus::create_transport, VERSION};
use seeds::SeedInput;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

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
        "Starting Collabnet Harvester v{}", VERSION
    );
    metrics::register_metrics();

    // A Scopus author id on the command line replaces the seeds file
    let input = match std::env::args().nth(1) {
        Some(author_id) => SeedInput::from_parts(Some(author_id), None),
        None => SeedInput::load_people(&config.harvest.seeds_path),
    }
    .map_err(|e| {
        error!(error = %e, "Invalid seed input");
        e
    })?;

    let api_key = config.scopus.resolve_api_key()?;
    let transport = create_transport(&config.scopus)?;

    let mut builder =
        CollaboratorTableBuilder::new(transport, &config.scopus, &api_key, &config.harvest);
    if let Some(dir) = &config.harvest.checkpoint_dir {
        let store = CheckpointStore::open(dir)?;
        info!(dir = %store.dir().display(), "Checkpointing enabled");
        builder = builder.with_checkpoints(store);
    }

    let (table, summary) = builder.build(&input).await.map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Harvest failed");
        e
    })?;

    table.write_path(&config.harvest.output_path)?;

    info!(
        seeds = summary.seeds,
        resumed = summary.resumed_seeds,
        publications = summary.publications,
        authors = summary.authors,
        rows = summary.rows,
        seed_columns = table.seed_columns().len(),
        skipped = summary.skipped_entries,
        elapsed_secs = summary.elapsed_secs,
        output = %config.harvest.output_path.display(),
        "Collaborator table written"
    );

    Ok(())
}
