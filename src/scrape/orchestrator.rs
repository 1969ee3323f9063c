// =============================================================================
// scrape/orchestrator.rs — FAN OUT, FAN IN
// =============================================================================
//
// One task per source page, one aggregator. Producers share three channels:
//
//   records   every parsed record, as soon as its row is done
//   errors    every page or row failure, same
//   deltas    +1 when a producer registers, -1 when it is finished
//
// The aggregator keeps a running sum of deltas. Once the sum has gone above
// zero and come back down to it, nobody is in flight and the run is over.
// No producer count is needed up front, so anything holding the delta sender
// can join as a producer.
//
// Two details keep the sum honest:
//
// - Every page is registered before any page task is spawned. Otherwise a
//   fast first page could take the sum 1 -> 0 before the second registered.
// - The -1 is sent from InFlight::drop, so it happens whatever the task did,
//   panics included.
//
// Records and errors travel on different channels from the deltas, so a -1
// can be seen before that producer's last record has been picked up. After
// the sum reaches zero every producer is done sending, and whatever is still
// queued is final; the aggregator drains it before returning.
// =============================================================================

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::models::{sort_by_position_name, Record};
use crate::scrape::fetcher::fetch_page;
use crate::scrape::page_parser::{parse_page, PageSinks};
use crate::scrape::record_builder::RowRules;

/// Everything a page task needs, shared read-only across tasks.
pub struct ScrapeContext {
    pub client: Client,
    pub rules: RowRules,
    pub marker: String,
}

/// Result of a full scrape: records sorted by `(position, name)`, and every
/// error in arrival order.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub records: Vec<Record>,
    pub errors: Vec<ScrapeError>,
}

/// Sending half of the fan-in: cloned into every producer.
#[derive(Clone)]
pub struct Producers {
    pub records: UnboundedSender<Record>,
    pub errors: UnboundedSender<ScrapeError>,
    pub deltas: UnboundedSender<i64>,
}

/// Receiving half of the fan-in: owned by the aggregator.
pub struct FanIn {
    records: UnboundedReceiver<Record>,
    errors: UnboundedReceiver<ScrapeError>,
    deltas: UnboundedReceiver<i64>,
}

pub fn fan_in() -> (Producers, FanIn) {
    let (record_tx, record_rx) = unbounded_channel();
    let (error_tx, error_rx) = unbounded_channel();
    let (delta_tx, delta_rx) = unbounded_channel();

    (
        Producers {
            records: record_tx,
            errors: error_tx,
            deltas: delta_tx,
        },
        FanIn {
            records: record_rx,
            errors: error_rx,
            deltas: delta_rx,
        },
    )
}

/// One registered producer. Sends +1 on creation and -1 on drop.
pub struct InFlight {
    deltas: UnboundedSender<i64>,
}

impl InFlight {
    pub fn register(deltas: &UnboundedSender<i64>) -> Self {
        let _ = deltas.send(1);
        Self {
            deltas: deltas.clone(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let _ = self.deltas.send(-1);
    }
}

/// Collect records and errors until every registered producer has finished.
///
/// Also returns if every delta sender is dropped without anyone registering,
/// which is what zero producers looks like.
pub async fn aggregate(mut fan_in: FanIn) -> (Vec<Record>, Vec<ScrapeError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    let mut in_flight: i64 = 0;
    let mut started = false;

    loop {
        tokio::select! {
            biased;

            Some(record) = fan_in.records.recv() => records.push(record),

            Some(error) = fan_in.errors.recv() => errors.push(error),

            delta = fan_in.deltas.recv() => match delta {
                Some(delta) => {
                    in_flight += delta;
                    debug!(delta, in_flight, "completion delta");
                    if in_flight > 0 {
                        started = true;
                    } else if started && in_flight == 0 {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    while let Ok(record) = fan_in.records.try_recv() {
        records.push(record);
    }
    while let Ok(error) = fan_in.errors.try_recv() {
        errors.push(error);
    }

    (records, errors)
}

/// Harvest every source page concurrently.
pub async fn scrape_all(ctx: Arc<ScrapeContext>, urls: &[String]) -> ScrapeOutcome {
    info!(pages = urls.len(), "online parsing started");

    let (producers, fan_in) = fan_in();

    let registrations: Vec<InFlight> = urls
        .iter()
        .map(|_| InFlight::register(&producers.deltas))
        .collect();

    for (url, in_flight) in urls.iter().cloned().zip(registrations) {
        let ctx = Arc::clone(&ctx);
        let producers = producers.clone();

        tokio::spawn(async move {
            let _in_flight = in_flight;
            scrape_page(&ctx, &url, &producers).await;
        });
    }

    // Only the tasks hold senders now.
    drop(producers);

    let (mut records, errors) = aggregate(fan_in).await;
    sort_by_position_name(&mut records);

    info!(
        records = records.len(),
        errors = errors.len(),
        "online parsing finished"
    );

    ScrapeOutcome { records, errors }
}

async fn scrape_page(ctx: &ScrapeContext, url: &str, producers: &Producers) {
    let body = match fetch_page(&ctx.client, url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %url, error = %e, "page skipped");
            let _ = producers.errors.send(e);
            return;
        }
    };

    let sinks = PageSinks {
        records: &producers.records,
        errors: &producers.errors,
    };
    parse_page(url, &body, &ctx.rules, &ctx.marker, &sinks);
}
