//! Paginated order collection with status filtering.

use cardpick_shared::{Order, OrderSummary, Result, RetrieveConfig};
use tracing::{info, instrument, warn};

use crate::client::OrderSource;

/// A non-fatal problem hit during retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalFailure {
    /// Order id, or `page N` for a listing failure.
    pub subject: String,
    pub message: String,
}

/// What a retrieval did, for the run summary.
#[derive(Debug, Clone, Default)]
pub struct RetrievalReport {
    pub pages_requested: usize,
    pub failures: Vec<RetrievalFailure>,
}

/// Drives an [`OrderSource`] through pagination, filtering, and detail fetching.
pub struct OrderRetriever<'a, S> {
    source: &'a S,
    config: RetrieveConfig,
}

impl<'a, S: OrderSource> OrderRetriever<'a, S> {
    pub fn new(source: &'a S, config: RetrieveConfig) -> Self {
        Self { source, config }
    }

    /// Collect the filtered summaries in service order.
    ///
    /// A failure of the first page is returned as an error. A failure of any
    /// later page stops pagination and keeps the rows gathered so far.
    #[instrument(skip_all, fields(filter = %self.config.filter, page_size = self.config.page_size))]
    pub async fn collect_summaries(
        &self,
        report: &mut RetrievalReport,
    ) -> Result<Vec<OrderSummary>> {
        let page_size = self.config.page_size.max(1);
        let limit = self.config.filter.limit();
        let mut kept = Vec::new();
        let mut page = 0usize;

        loop {
            let offset = page * page_size;
            report.pages_requested += 1;

            let rows = match self.source.list_orders(offset, page_size).await {
                Ok(rows) => rows,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "order listing failed, keeping earlier pages");
                    report.failures.push(RetrievalFailure {
                        subject: format!("page {page}"),
                        message: e.to_string(),
                    });
                    break;
                }
            };

            let fetched = rows.len();
            kept.extend(
                rows.into_iter()
                    .filter(|row| self.config.filter.accepts(&row.status)),
            );

            if limit.is_some_and(|n| kept.len() >= n) || fetched < page_size {
                break;
            }
            page += 1;
        }

        if let Some(n) = limit {
            kept.truncate(n);
        }

        info!(
            orders = kept.len(),
            pages = report.pages_requested,
            "order summaries collected"
        );
        Ok(kept)
    }

    /// Fetch full detail for every summary that has an id.
    ///
    /// Failed fetches are recorded in `report` and skipped. `on_order` is called
    /// before each fetch with the 1-based position and the total.
    pub async fn fetch_details(
        &self,
        summaries: &[OrderSummary],
        report: &mut RetrievalReport,
        mut on_order: impl FnMut(usize, usize, &str),
    ) -> Vec<Order> {
        let total = summaries.len();
        let mut orders = Vec::with_capacity(total);

        for (i, summary) in summaries.iter().enumerate() {
            let Some(id) = summary.id.as_deref() else {
                continue;
            };
            on_order(i + 1, total, &summary.label);

            match self.source.get_order(id).await {
                Ok(order) => orders.push(order),
                Err(e) => {
                    warn!(order_id = id, error = %e, "could not fetch order details, skipping");
                    report.failures.push(RetrievalFailure {
                        subject: id.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        orders
    }

    /// Summaries then details, in one call.
    pub async fn retrieve(&self) -> Result<(Vec<Order>, RetrievalReport)> {
        let mut report = RetrievalReport::default();
        let summaries = self.collect_summaries(&mut report).await?;
        let orders = self.fetch_details(&summaries, &mut report, |_, _, _| {}).await;
        Ok((orders, report))
    }
}
