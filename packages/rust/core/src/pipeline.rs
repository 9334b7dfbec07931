//! End-to-end picklist run: orders → locations/lookups → pick path → CSV + JSON.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use cardpick_catalog::{CardSource, LookupCache};
use cardpick_marketplace::{OrderRetriever, OrderSource, RetrievalReport};
use cardpick_shared::{LineItem, Picklist, Result, RetrieveConfig};
use chrono::Local;
use tracing::{info, instrument, warn};

use crate::assembler::{AssembleOptions, LineItemAssembler};
use crate::export::{self, OutputPaths};
use crate::locations::{LocationPolicy, LocationResolver};
use crate::sorter;

/// Configuration for one `build_picklist` run.
#[derive(Debug, Clone)]
pub struct PicklistRequest {
    pub retrieve: RetrieveConfig,
    pub options: AssembleOptions,
    /// Directory the CSV and JSON files are written to.
    pub output_dir: PathBuf,
}

/// Result of a `build_picklist` run.
#[derive(Debug)]
pub struct PicklistOutcome {
    /// Items in pick-path order.
    pub picklist: Picklist,
    /// `None` when there was nothing to write.
    pub paths: Option<OutputPaths>,
    pub report: RetrievalReport,
    pub orders_processed: usize,
    /// Whether the location mapping was rewritten.
    pub locations_saved: bool,
    pub elapsed: Duration,
}

impl PicklistOutcome {
    pub fn items(&self) -> &[LineItem] {
        &self.picklist.items
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each order detail fetch.
    fn order_fetching(&self, current: usize, total: usize, label: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PicklistOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn order_fetching(&self, _current: usize, _total: usize, _label: &str) {}
    fn done(&self, _outcome: &PicklistOutcome) {}
}

/// Run the full picklist pipeline.
///
/// 1. Collect order summaries (a first-page failure aborts the run)
/// 2. Fetch order details, skipping failures
/// 3. Assemble line items through the location resolver and lookup cache
/// 4. Persist new location assignments and the image index
/// 5. Sort into pick-path order and write CSV + JSON
#[instrument(skip_all, fields(filter = %request.retrieve.filter))]
pub async fn build_picklist<O, P, S>(
    request: &PicklistRequest,
    source: &O,
    locations: &mut LocationResolver<P>,
    lookups: &mut LookupCache<S>,
    progress: &dyn ProgressReporter,
) -> Result<PicklistOutcome>
where
    O: OrderSource,
    P: LocationPolicy,
    S: CardSource,
{
    let start = Instant::now();
    let filter = request.retrieve.filter;
    let retriever = OrderRetriever::new(source, request.retrieve.clone());
    let mut report = RetrievalReport::default();

    // --- Phase 1: Order summaries ---
    progress.phase("Fetching orders");
    let summaries = retriever.collect_summaries(&mut report).await?;
    info!(matching = summaries.len(), "orders match filter");

    // --- Phase 2: Order details ---
    progress.phase("Fetching order details");
    let orders = retriever
        .fetch_details(&summaries, &mut report, |current, total, label| {
            progress.order_fetching(current, total, label)
        })
        .await;

    // --- Phase 3: Assembly ---
    progress.phase("Resolving locations and cards");
    let mut items = Vec::new();
    {
        let mut assembler = LineItemAssembler::new(locations, lookups, request.options);
        for order in &orders {
            items.extend(assembler.assemble_order(order).await);
        }
    }

    // --- Phase 4: Persist caches ---
    let locations_saved = match locations.save_if_changed() {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "could not save location mapping");
            false
        }
    };
    if let Err(e) = lookups.save() {
        warn!(error = %e, "could not save image index");
    }

    // --- Phase 5: Sort and export ---
    sorter::sort_pick_path(&mut items);
    let picklist = Picklist::new(&filter, items);

    let paths = if picklist.items.is_empty() {
        info!("no line items found, nothing exported");
        None
    } else {
        progress.phase("Writing picklist");
        let stem = export::output_stem(Local::now(), &filter);
        let paths = export::output_paths(&request.output_dir, &stem);
        export::write_csv(&paths.csv, &picklist.items)?;
        export::write_picklist(&paths.json, &picklist)?;
        Some(paths)
    };

    let outcome = PicklistOutcome {
        picklist,
        paths,
        report,
        orders_processed: orders.len(),
        locations_saved,
        elapsed: start.elapsed(),
    };

    info!(
        items = outcome.picklist.items.len(),
        orders = outcome.orders_processed,
        failures = outcome.report.failures.len(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "picklist complete"
    );
    progress.done(&outcome);

    Ok(outcome)
}
