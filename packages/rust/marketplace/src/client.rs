//! HTTP client for the seller order API.

use std::future::Future;
use std::time::Duration;

use cardpick_shared::{
    AppConfig, CardRef, CardpickError, Credentials, FulfillmentStatus, NOT_AVAILABLE, Order,
    OrderLine, OrderSummary, Result,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User-Agent string for marketplace requests.
const USER_AGENT: &str = concat!("cardpick/", env!("CARGO_PKG_VERSION"));

const EMAIL_HEADER: &str = "X-ManaPool-Email";
const TOKEN_HEADER: &str = "X-ManaPool-Access-Token";

// ---------------------------------------------------------------------------
// OrderSource
// ---------------------------------------------------------------------------

/// Anything that can list, fetch, and update orders.
pub trait OrderSource {
    /// One page of order summaries starting at `offset`.
    fn list_orders(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<OrderSummary>>> + Send;

    /// Full detail record for one order.
    fn get_order(&self, id: &str) -> impl Future<Output = Result<Order>> + Send;

    /// Replace the order's fulfillment record.
    fn update_fulfillment(
        &self,
        id: &str,
        update: &FulfillmentUpdate,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A fulfillment status change sent to the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentUpdate {
    pub status: FulfillmentStatus,
    pub tracking_number: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Wrapped {
        #[serde(alias = "data")]
        orders: Vec<WireSummary>,
    },
    Bare(Vec<WireSummary>),
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    latest_fulfillment_status: Option<String>,
    #[serde(default)]
    total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DetailBody {
    order: Option<WireOrder>,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    latest_fulfillment_status: Option<String>,
    #[serde(default)]
    items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    price_cents: i64,
    #[serde(default)]
    product: WireProduct,
}

#[derive(Debug, Default, Deserialize)]
struct WireProduct {
    /// Numeric on some rows, string on others.
    #[serde(default)]
    tcgplayer_sku: Option<serde_json::Value>,
    #[serde(default)]
    single: WireSingle,
}

#[derive(Debug, Default, Deserialize)]
struct WireSingle {
    name: Option<String>,
    set: Option<String>,
    number: Option<String>,
    condition_id: Option<String>,
    finish_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireFulfillment<'a> {
    status: &'a str,
    tracking_number: Option<&'a str>,
    tracking_company: Option<&'a str>,
    tracking_url: Option<&'a str>,
    in_transit_at: Option<&'a str>,
    estimated_delivery_at: Option<&'a str>,
    delivered_at: Option<&'a str>,
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn sku_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<WireSummary> for OrderSummary {
    fn from(w: WireSummary) -> Self {
        Self {
            id: w.id.filter(|id| !id.trim().is_empty()),
            label: or_na(w.label),
            status: FulfillmentStatus::from_wire(w.latest_fulfillment_status.as_deref()),
            total_cents: w.total_cents,
        }
    }
}

impl From<WireItem> for OrderLine {
    fn from(w: WireItem) -> Self {
        let single = w.product.single;
        Self {
            quantity: w.quantity,
            unit_price_cents: w.price_cents,
            catalog_sku: sku_text(w.product.tcgplayer_sku),
            card: CardRef {
                name: or_na(single.name),
                set_code: or_na(single.set),
                collector_number: or_na(single.number),
                condition: or_na(single.condition_id),
                finish: or_na(single.finish_id),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// HttpOrderClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`OrderSource`] authenticated with the seller headers.
#[derive(Debug, Clone)]
pub struct HttpOrderClient {
    client: Client,
    base_url: String,
}

impl HttpOrderClient {
    /// Build a client for `base_url` with the auth headers installed on every request.
    pub fn new(base_url: &str, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(EMAIL_HEADER, header_value(&credentials.email)?);
        headers.insert(TOKEN_HEADER, header_value(&credentials.token)?);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CardpickError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        Self::new(
            &config.marketplace.base_url,
            credentials,
            Duration::from_secs(config.marketplace.timeout_secs),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CardpickError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CardpickError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CardpickError::Network(format!("{url}: failed to read body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| CardpickError::parse(format!("{url}: {e}")))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| CardpickError::config("marketplace credentials contain invalid characters"))
}

impl OrderSource for HttpOrderClient {
    async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<OrderSummary>> {
        let url = format!(
            "{}/seller/orders?limit={limit}&offset={offset}",
            self.base_url
        );
        debug!(%url, "listing orders");

        let body: ListingBody = self.get_json(&url).await?;
        let rows = match body {
            ListingBody::Wrapped { orders } | ListingBody::Bare(orders) => orders,
        };
        Ok(rows.into_iter().map(OrderSummary::from).collect())
    }

    async fn get_order(&self, id: &str) -> Result<Order> {
        let url = format!("{}/seller/orders/{id}", self.base_url);
        debug!(%url, "fetching order detail");

        let body: DetailBody = self.get_json(&url).await?;
        let order = body
            .order
            .ok_or_else(|| CardpickError::parse(format!("{url}: response has no order")))?;

        Ok(Order {
            id: id.to_string(),
            label: or_na(order.label),
            status: FulfillmentStatus::from_wire(order.latest_fulfillment_status.as_deref()),
            items: order.items.into_iter().map(OrderLine::from).collect(),
        })
    }

    async fn update_fulfillment(&self, id: &str, update: &FulfillmentUpdate) -> Result<()> {
        let url = format!("{}/seller/orders/{id}/fulfillment", self.base_url);
        let payload = WireFulfillment {
            status: update.status.as_str(),
            tracking_number: update.tracking_number.as_deref(),
            tracking_company: None,
            tracking_url: None,
            in_transit_at: None,
            estimated_delivery_at: None,
            delivered_at: None,
        };

        let response = self
            .client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CardpickError::Network(format!("{url}: {e}")))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(CardpickError::Network(format!("{url}: HTTP {status}"))),
        }
    }
}
