//! Core domain types for cardpick picklists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CardpickError;

/// Current schema version for the picklist JSON format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Sentinel the marketplace and the lookup cache use for "no value".
pub const NOT_AVAILABLE: &str = "N/A";

/// True when a field carries no usable value (empty or the `N/A` sentinel).
pub fn is_missing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(NOT_AVAILABLE)
}

// ---------------------------------------------------------------------------
// FulfillmentStatus
// ---------------------------------------------------------------------------

/// Latest fulfillment status reported for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// No status yet, or explicitly unfulfilled.
    Unfulfilled,
    Processing,
    Shipped,
    /// Anything the marketplace reports that we do not act on.
    Other(String),
}

impl FulfillmentStatus {
    /// Interpret the raw status field; absent and empty both mean unfulfilled.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("unfulfilled") => Self::Unfulfilled,
            Some("processing") => Self::Processing,
            Some("shipped") => Self::Shipped,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn is_shipped(&self) -> bool {
        matches!(self, Self::Shipped)
    }

    /// Orders the fulfillment updater offers for a status change.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Unfulfilled | Self::Processing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unfulfilled => "unfulfilled",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrderFilter
// ---------------------------------------------------------------------------

/// Which orders a retrieval keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    /// Everything not yet shipped.
    Unshipped,
    Shipped,
    All,
    /// The first N orders in service order, regardless of status.
    MostRecent(usize),
}

impl OrderFilter {
    /// Pure predicate over the fulfillment status.
    pub fn accepts(&self, status: &FulfillmentStatus) -> bool {
        match self {
            Self::Unshipped => !status.is_shipped(),
            Self::Shipped => status.is_shipped(),
            Self::All | Self::MostRecent(_) => true,
        }
    }

    /// The bound on the number of orders kept, if any.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::MostRecent(n) => Some(*n),
            _ => None,
        }
    }

    /// Suffix used in output filenames.
    pub fn file_tag(&self) -> String {
        match self {
            Self::Unshipped => "not-shipped".into(),
            Self::Shipped => "shipped".into(),
            Self::All => "all".into(),
            Self::MostRecent(n) => format!("recent-{n}"),
        }
    }
}

impl std::fmt::Display for OrderFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unshipped => f.write_str("unshipped"),
            Self::Shipped => f.write_str("shipped"),
            Self::All => f.write_str("all"),
            Self::MostRecent(n) => write!(f, "recent:{n}"),
        }
    }
}

impl std::str::FromStr for OrderFilter {
    type Err = CardpickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "unshipped" | "not-shipped" => Ok(Self::Unshipped),
            "shipped" => Ok(Self::Shipped),
            "all" => Ok(Self::All),
            other => {
                let n = other
                    .strip_prefix("recent:")
                    .or_else(|| other.strip_prefix("recent-"))
                    .ok_or_else(|| CardpickError::validation(format!("unknown filter '{other}'")))?;
                match n.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(Self::MostRecent(n)),
                    _ => Err(CardpickError::validation(format!(
                        "most-recent bound must be a positive number, got '{n}'"
                    ))),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Orders (as retrieved)
// ---------------------------------------------------------------------------

/// One row of the paginated order listing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// Rows without an identifier are kept in the listing but never fetched.
    pub id: Option<String>,
    pub label: String,
    pub status: FulfillmentStatus,
    pub total_cents: Option<i64>,
}

/// The card an order line refers to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CardRef {
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    pub condition: String,
    pub finish: String,
}

/// A single line of an order detail record.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub catalog_sku: Option<String>,
    pub card: CardRef,
}

/// A fully fetched order. Immutable once fetched in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub label: String,
    pub status: FulfillmentStatus,
    pub items: Vec<OrderLine>,
}

// ---------------------------------------------------------------------------
// CardIdentity
// ---------------------------------------------------------------------------

/// The (set, number, name) triple external lookups are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardIdentity {
    pub set_code: String,
    pub collector_number: String,
    pub name: String,
}

impl CardIdentity {
    pub fn new(
        set_code: impl Into<String>,
        collector_number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            set_code: set_code.into(),
            collector_number: collector_number.into(),
            name: name.into(),
        }
    }

    /// Normalized cache key: `SET_number_sanitized_name`.
    ///
    /// Also used as the image filename stem, so it never contains path separators.
    pub fn cache_key(&self) -> String {
        let name = self
            .name
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        format!(
            "{}_{}_{}",
            filename_safe(&self.set_code.trim().to_uppercase()),
            filename_safe(self.collector_number.trim()),
            filename_safe(&name)
        )
    }
}

fn filename_safe(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

impl From<&CardRef> for CardIdentity {
    fn from(card: &CardRef) -> Self {
        Self::new(&card.set_code, &card.collector_number, &card.name)
    }
}

// ---------------------------------------------------------------------------
// LineItem / Picklist
// ---------------------------------------------------------------------------

/// One enriched, pickable line. Created during assembly, never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub order_id: String,
    pub order_label: String,
    pub location: String,
    pub quantity: u32,
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    pub condition: String,
    pub finish: String,
    /// Unit price in the marketplace currency.
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_sku: Option<String>,
    /// Card reference service id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Remote image URI, local cached path, or `N/A`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_line: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
}

impl LineItem {
    /// Composite key progress is tracked under.
    pub fn progress_key(&self) -> String {
        format!("{}|{}", self.order_id, self.name)
    }

    pub fn identity(&self) -> CardIdentity {
        CardIdentity::new(&self.set_code, &self.collector_number, &self.name)
    }
}

/// The JSON export envelope written next to the CSV and loaded by the TUI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picklist {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    /// The filter the run used, e.g. `unshipped` or `recent:20`.
    pub filter: String,
    pub items: Vec<LineItem>,
}

impl Picklist {
    pub fn new(filter: &OrderFilter, items: Vec<LineItem>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            generated_at: Utc::now(),
            filter: filter.to_string(),
            items,
        }
    }
}
