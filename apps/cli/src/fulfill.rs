//! `cardpick fulfill`: bulk fulfillment status updates for open orders.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::sync::LazyLock;

use cardpick_marketplace::{
    FulfillmentUpdate, HttpOrderClient, OrderRetriever, OrderSource, RetrievalReport,
};
use cardpick_shared::{
    FulfillmentStatus, OrderFilter, OrderSummary, RetrieveConfig, load_config,
    marketplace_credentials,
};
use clap::Args;
use color_eyre::eyre::{Result, eyre};
use regex::Regex;
use tracing::{info, warn};

/// `N` or `N-M`.
static SELECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:-(\d+))?$").expect("valid regex"));

#[derive(Args)]
pub(crate) struct FulfillArgs {
    /// New status: processing or shipped. Prompts when omitted.
    #[arg(long, value_parser = ["processing", "shipped"])]
    pub status: Option<String>,

    /// Orders to update by list number: "1 2 3", "1-5", or "all".
    #[arg(long)]
    pub orders: Option<String>,

    /// Tracking number sent with shipped updates.
    #[arg(long)]
    pub tracking: Option<String>,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Parse a 1-based selection into 0-based indices.
///
/// `Ok(None)` means the operator quit. Numbers outside `1..=count` are dropped.
pub(crate) fn parse_selection(input: &str, count: usize) -> Result<Option<BTreeSet<usize>>> {
    let input = input.trim().to_lowercase();
    if input == "q" {
        return Ok(None);
    }
    if input == "all" {
        return Ok(Some((0..count).collect()));
    }

    let mut selected = BTreeSet::new();
    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let caps = SELECTION_RE
            .captures(token)
            .ok_or_else(|| eyre!("invalid selection '{token}'"))?;
        let start: usize = caps[1].parse()?;
        let end: usize = match caps.get(2) {
            Some(m) => m.as_str().parse()?,
            None => start,
        };
        let low = start.min(end).max(1);
        let high = start.max(end).min(count);
        selected.extend((low..=high).map(|n| n - 1));
    }
    Ok(Some(selected))
}

fn format_total(cents: Option<i64>) -> String {
    match cents {
        Some(c) => format!("${:.2}", c as f64 / 100.0),
        None => "N/A".into(),
    }
}

fn print_orders(orders: &[OrderSummary]) {
    println!("{}", "=".repeat(80));
    println!("  {} open orders", orders.len());
    println!("{}", "=".repeat(80));
    for (i, order) in orders.iter().enumerate() {
        println!(
            "[{:3}] {:15} {:>10}  {}",
            i + 1,
            order.label,
            format_total(order.total_cents),
            order.status
        );
    }
    println!("{}", "=".repeat(80));
}

/// Line-oriented prompt over any reader and writer.
struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    /// `None` on end of input.
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn choose_status(&mut self) -> Result<Option<FulfillmentStatus>> {
        writeln!(self.output, "\nActions:")?;
        writeln!(self.output, "  [1] Mark as processing")?;
        writeln!(self.output, "  [2] Mark as shipped")?;
        writeln!(self.output, "  [q] Quit")?;
        loop {
            match self.ask("Choose action: ")?.as_deref() {
                None | Some("q") | Some("Q") => return Ok(None),
                Some("1") => return Ok(Some(FulfillmentStatus::Processing)),
                Some("2") => return Ok(Some(FulfillmentStatus::Shipped)),
                Some(_) => writeln!(self.output, "Please enter 1, 2, or q.")?,
            }
        }
    }

    fn choose_orders(&mut self, count: usize) -> Result<Option<BTreeSet<usize>>> {
        loop {
            let Some(answer) =
                self.ask("Select orders (e.g. 1 2 3, 1-5, all, q to quit): ")?
            else {
                return Ok(None);
            };
            match parse_selection(&answer, count) {
                Ok(Some(set)) if set.is_empty() => {
                    writeln!(self.output, "No valid orders selected.")?;
                }
                Ok(other) => return Ok(other),
                Err(e) => writeln!(self.output, "{e}")?,
            }
        }
    }

    fn confirm(&mut self) -> Result<bool> {
        Ok(matches!(
            self.ask("Continue? (y/n): ")?.as_deref(),
            Some("y") | Some("Y") | Some("yes")
        ))
    }
}

/// Open orders (unfulfilled or processing), in service order.
async fn open_orders<S: OrderSource>(source: &S, page_size: usize) -> Result<Vec<OrderSummary>> {
    let retriever = OrderRetriever::new(
        source,
        RetrieveConfig {
            filter: OrderFilter::All,
            page_size,
        },
    );
    let mut report = RetrievalReport::default();
    let summaries = retriever.collect_summaries(&mut report).await?;
    Ok(summaries
        .into_iter()
        .filter(|o| o.id.is_some() && o.status.is_open())
        .collect())
}

/// Send one update per order; returns (updated, failed).
async fn apply_updates<S: OrderSource>(
    source: &S,
    orders: &[&OrderSummary],
    update: &FulfillmentUpdate,
) -> (usize, usize) {
    let mut updated = 0;
    let mut failed = 0;
    for order in orders {
        let Some(id) = order.id.as_deref() else {
            continue;
        };
        match source.update_fulfillment(id, update).await {
            Ok(()) => {
                println!("[+] {}", order.label);
                updated += 1;
            }
            Err(e) => {
                warn!(order_id = id, error = %e, "fulfillment update failed");
                println!("[X] {} - FAILED", order.label);
                failed += 1;
            }
        }
    }
    (updated, failed)
}

pub(crate) async fn cmd_fulfill(args: FulfillArgs) -> Result<()> {
    let config = load_config()?;
    let credentials = marketplace_credentials(&config)?;
    let client = HttpOrderClient::from_config(&config, &credentials)?;

    let orders = open_orders(&client, config.defaults.page_size.max(1)).await?;
    if orders.is_empty() {
        println!("No open orders.");
        return Ok(());
    }
    print_orders(&orders);

    let stdin = std::io::stdin();
    let mut prompt = Prompt {
        input: stdin.lock(),
        output: std::io::stdout(),
    };

    let status = match args.status.as_deref() {
        Some("processing") => FulfillmentStatus::Processing,
        Some("shipped") => FulfillmentStatus::Shipped,
        Some(other) => return Err(eyre!("unsupported status '{other}'")),
        None => match prompt.choose_status()? {
            Some(status) => status,
            None => return Ok(()),
        },
    };

    let selection = match args.orders.as_deref() {
        Some(text) => parse_selection(text, orders.len())?.unwrap_or_default(),
        None => match prompt.choose_orders(orders.len())? {
            Some(set) => set,
            None => return Ok(()),
        },
    };
    if selection.is_empty() {
        return Err(eyre!("no orders selected"));
    }

    let tracking_number = if status.is_shipped() {
        match args.tracking {
            Some(t) => Some(t),
            None if args.yes => None,
            None => prompt
                .ask("Tracking number (leave blank for none): ")?
                .filter(|t| !t.is_empty()),
        }
    } else {
        None
    };

    let chosen: Vec<&OrderSummary> = selection.iter().map(|&i| &orders[i]).collect();
    println!("\nMarking {} order(s) as {status}:", chosen.len());
    for order in &chosen {
        println!("  {}", order.label);
    }
    if !args.yes && !prompt.confirm()? {
        println!("Cancelled.");
        return Ok(());
    }

    let update = FulfillmentUpdate {
        status,
        tracking_number,
    };
    info!(orders = chosen.len(), status = %update.status, "sending fulfillment updates");
    let (updated, failed) = apply_updates(&client, &chosen, &update).await;
    println!("\nDone: {updated} updated, {failed} failed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use cardpick_shared::{CardpickError, Order};

    use super::*;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn parses_numbers_and_ranges() {
        assert_eq!(parse_selection("1 2 3", 5).unwrap(), Some(set(&[0, 1, 2])));
        assert_eq!(parse_selection("2-4", 5).unwrap(), Some(set(&[1, 2, 3])));
        assert_eq!(parse_selection("4-2, 1", 5).unwrap(), Some(set(&[0, 1, 2, 3])));
        assert_eq!(parse_selection(" ALL ", 3).unwrap(), Some(set(&[0, 1, 2])));
        assert_eq!(parse_selection("q", 3).unwrap(), None);
    }

    #[test]
    fn out_of_range_is_dropped_and_garbage_rejected() {
        assert_eq!(parse_selection("0 3 9", 3).unwrap(), Some(set(&[2])));
        assert_eq!(parse_selection("2-10", 3).unwrap(), Some(set(&[1, 2])));
        assert!(parse_selection("1 two", 3).is_err());
        assert!(parse_selection("1--3", 3).is_err());
    }

    #[test]
    fn huge_ranges_are_clamped_to_the_listing() {
        assert_eq!(
            parse_selection("1-99999999999", 3).unwrap(),
            Some(set(&[0, 1, 2]))
        );
        assert_eq!(parse_selection("50-99999999999", 3).unwrap(), Some(set(&[])));
        assert_eq!(parse_selection("1-5", 0).unwrap(), Some(set(&[])));
    }

    #[test]
    fn prompt_reprompts_until_valid() {
        let mut prompt = Prompt {
            input: Cursor::new("x\n2\n"),
            output: Vec::new(),
        };
        assert_eq!(
            prompt.choose_status().unwrap(),
            Some(FulfillmentStatus::Shipped)
        );
        let shown = String::from_utf8(prompt.output).unwrap();
        assert!(shown.contains("Please enter 1, 2, or q."));
    }

    #[test]
    fn prompt_eof_quits() {
        let mut prompt = Prompt {
            input: Cursor::new(""),
            output: Vec::new(),
        };
        assert_eq!(prompt.choose_orders(4).unwrap(), None);
        assert!(!prompt.confirm().unwrap());
    }

    struct Board {
        summaries: Vec<OrderSummary>,
        sent: Mutex<Vec<(String, FulfillmentUpdate)>>,
    }

    impl OrderSource for Board {
        async fn list_orders(
            &self,
            offset: usize,
            limit: usize,
        ) -> cardpick_shared::Result<Vec<OrderSummary>> {
            Ok(self.summaries.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn get_order(&self, id: &str) -> cardpick_shared::Result<Order> {
            Err(CardpickError::Network(format!("{id}: not used")))
        }

        async fn update_fulfillment(
            &self,
            id: &str,
            update: &FulfillmentUpdate,
        ) -> cardpick_shared::Result<()> {
            if id == "bad" {
                return Err(CardpickError::Network(format!("{id}: HTTP 500")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((id.to_string(), update.clone()));
            Ok(())
        }
    }

    fn summary(id: Option<&str>, status: FulfillmentStatus) -> OrderSummary {
        OrderSummary {
            id: id.map(String::from),
            label: format!("#{}", id.unwrap_or("none")),
            status,
            total_cents: Some(1250),
        }
    }

    #[tokio::test]
    async fn only_open_orders_are_listed() {
        let board = Board {
            summaries: vec![
                summary(Some("a"), FulfillmentStatus::Unfulfilled),
                summary(Some("b"), FulfillmentStatus::Shipped),
                summary(Some("c"), FulfillmentStatus::Processing),
                summary(None, FulfillmentStatus::Unfulfilled),
            ],
            sent: Mutex::new(vec![]),
        };
        let open = open_orders(&board, 2).await.unwrap();
        let ids: Vec<_> = open.iter().filter_map(|o| o.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn updates_count_successes_and_failures() {
        let good = summary(Some("a"), FulfillmentStatus::Unfulfilled);
        let bad = summary(Some("bad"), FulfillmentStatus::Processing);
        let board = Board {
            summaries: vec![],
            sent: Mutex::new(vec![]),
        };
        let update = FulfillmentUpdate {
            status: FulfillmentStatus::Shipped,
            tracking_number: Some("1Z999".into()),
        };

        let (updated, failed) = apply_updates(&board, &[&good, &bad], &update).await;
        assert_eq!((updated, failed), (1, 1));
        let sent = board.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a");
        assert_eq!(sent[0].1.tracking_number.as_deref(), Some("1Z999"));
    }

    #[test]
    fn totals_format_as_dollars() {
        assert_eq!(format_total(Some(1250)), "$12.50");
        assert_eq!(format_total(None), "N/A");
    }
}
