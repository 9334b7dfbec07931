//! Rate-limited client for the card reference service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cardpick_shared::{CardpickError, CatalogConfig, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// User-Agent string for reference service requests.
const USER_AGENT: &str = concat!("cardpick/", env!("CARGO_PKG_VERSION"));

/// Image downloads get a longer budget than API calls.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// CardRecord
// ---------------------------------------------------------------------------

/// The subset of a reference card record cardpick uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    /// Double-faced cards carry images per face instead.
    #[serde(default)]
    pub card_faces: Vec<CardFace>,
    #[serde(default)]
    pub prices: Prices,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub rarity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub normal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

/// Price strings as the service reports them (`"1.23"` or null).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(default)]
    pub usd_foil: Option<String>,
    #[serde(default)]
    pub eur: Option<String>,
    #[serde(default)]
    pub eur_foil: Option<String>,
}

impl CardRecord {
    /// The normal-size image, falling back to the front face.
    pub fn image_uri(&self) -> Option<&str> {
        self.image_uris
            .as_ref()
            .and_then(|u| u.normal.as_deref())
            .or_else(|| {
                self.card_faces
                    .iter()
                    .find_map(|f| f.image_uris.as_ref().and_then(|u| u.normal.as_deref()))
            })
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<CardRecord>,
}

// ---------------------------------------------------------------------------
// CardSource
// ---------------------------------------------------------------------------

/// Reference service queries. `Ok(None)` is a clean miss; `Err` is a transport
/// or payload failure.
pub trait CardSource {
    fn card_by_print(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> impl Future<Output = Result<Option<CardRecord>>> + Send;

    fn card_by_fuzzy_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<CardRecord>>> + Send;

    fn search_name_in_set(
        &self,
        name: &str,
        set_code: &str,
    ) -> impl Future<Output = Result<Option<CardRecord>>> + Send;

    /// Raw bytes of an image.
    fn download(&self, uri: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Enforces a minimum delay between consecutive calls across all clones.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until the interval since the previous call has elapsed.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// ScryfallClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`CardSource`]. Cheap to clone; clones share the rate limiter.
#[derive(Debug, Clone)]
pub struct ScryfallClient {
    client: Client,
    base_url: Url,
    limiter: RateLimiter,
}

impl ScryfallClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            CardpickError::config(format!("invalid catalog base URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CardpickError::config(format!(
                "invalid catalog base URL: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CardpickError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            limiter: RateLimiter::new(config.min_interval),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON document; 404 is `Ok(None)`.
    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        self.limiter.wait().await;
        debug!(%url, "card lookup");

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| CardpickError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CardpickError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CardpickError::Network(format!("{url}: failed to read body: {e}")))?;

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| CardpickError::parse(format!("{url}: {e}")))
    }
}

impl CardSource for ScryfallClient {
    async fn card_by_print(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<Option<CardRecord>> {
        let set = set_code.trim().to_lowercase();
        let url = self.endpoint(&["cards", &set, collector_number.trim()]);
        self.fetch(url, &[]).await
    }

    async fn card_by_fuzzy_name(&self, name: &str) -> Result<Option<CardRecord>> {
        let url = self.endpoint(&["cards", "named"]);
        self.fetch(url, &[("fuzzy", name.trim())]).await
    }

    async fn search_name_in_set(&self, name: &str, set_code: &str) -> Result<Option<CardRecord>> {
        let url = self.endpoint(&["cards", "search"]);
        let q = format!(
            "name:\"{}\" set:{}",
            name.trim().replace('"', ""),
            set_code.trim().to_lowercase()
        );
        let page: Option<SearchPage> = self.fetch(url, &[("q", q.as_str())]).await?;
        Ok(page.and_then(|p| p.data.into_iter().next()))
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(uri)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| CardpickError::Network(format!("{uri}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CardpickError::Network(format!("{uri}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardpickError::Network(format!("{uri}: failed to read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
