//  ██████╗██╗      █████╗ ██████╗ ██╗  ██╗███████╗
// ██╔════╝██║     ██╔══██╗██╔══██╗██║ ██╔╝██╔════╝
// ██║     ██║     ███████║██████╔╝█████╔╝ █████╗
// ██║     ██║     ██╔══██║██╔══██╗██╔═██╗ ██╔══╝
// ╚██████╗███████╗██║  ██║██║  ██║██║  ██╗███████╗
//  ╚═════╝╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝
//
// B E L T   E N G I N E
//
// Once per invocation: harvest the relay listings, load the stored snapshot,
// work out what appeared, vanished or moved, and write exactly that back.

mod config;
mod error;
mod models;
mod reconcile;
mod scrape;
mod store;
mod sync;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::reconcile::reconcile;
use crate::scrape::fetcher::build_client;
use crate::scrape::{scrape_all, RowRules, ScrapeContext};
use crate::store::{RecordStore, RedisStore};
use crate::sync::{apply_partition, SyncReport};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// One full sync pass against `store`.
///
/// The scrape runs on its own task while this one loads the snapshot. A
/// failed snapshot load or any scrape error stops the run before the store is
/// written to.
async fn run(store: &impl RecordStore, ctx: Arc<ScrapeContext>, urls: &[String]) -> Result<SyncReport> {
    let urls = urls.to_vec();
    let scrape = tokio::spawn(async move { scrape_all(ctx, &urls).await });

    let (outcome, snapshot) = tokio::join!(scrape, store.load_active());

    let snapshot = snapshot.context("cannot load the stored snapshot")?;
    let outcome = outcome.context("scrape task did not finish")?;

    if !outcome.errors.is_empty() {
        for e in &outcome.errors {
            error!(error = %e, "scrape error");
        }
        let rows = outcome.errors.iter().filter(|e| e.row_error().is_some()).count();
        bail!(
            "{} errors encountered during scraping ({} rows, {} pages)",
            outcome.errors.len(),
            rows,
            outcome.errors.len() - rows
        );
    }

    info!(
        scraped = outcome.records.len(),
        stored = snapshot.len(),
        "inputs ready"
    );

    let partition = reconcile(&snapshot, &outcome.records);
    info!(
        new = partition.new.len(),
        absent = partition.absent.len(),
        changed = partition.changed.len(),
        "reconciliation finished"
    );
    if partition.is_empty() {
        info!("stored snapshot already matches the listings");
    }

    Ok(apply_partition(store, &partition).await)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.base_url,
        table = %config.table,
        "CLARKE BELT ENGINE starting"
    );

    let urls = config.source_urls()?;
    let rules = RowRules::from_config(&config)?;
    let client = build_client(config.http_timeout).context("cannot build HTTP client")?;
    let store = RedisStore::connect(&config.redis_url, &config.table).await?;

    let ctx = Arc::new(ScrapeContext {
        client,
        rules,
        marker: config.listing_marker.clone(),
    });

    let report = run(&store, ctx, &urls).await.inspect_err(|e| {
        error!(error = %format!("{e:#}"), "run aborted");
    })?;

    info!(
        inserted = report.inserted.applied,
        closed = report.closed.applied,
        updated = report.updated.applied,
        "CLARKE BELT ENGINE finished: {} records applied",
        report.applied()
    );

    Ok(())
}
