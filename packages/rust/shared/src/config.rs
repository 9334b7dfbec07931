//! Application configuration for cardpick.
//!
//! User config lives at `~/.cardpick/cardpick.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CardpickError, Result};
use crate::types::OrderFilter;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cardpick.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cardpick";

// ---------------------------------------------------------------------------
// Config structs (matching cardpick.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Marketplace API settings.
    #[serde(default)]
    pub marketplace: MarketplaceConfig,

    /// Card reference service settings.
    #[serde(default)]
    pub catalog: CatalogSettings,

    /// Location mapping settings.
    #[serde(default)]
    pub locations: LocationsConfig,

    /// Image cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory the CSV/JSON picklists are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default order filter: `unshipped`, `shipped`, `all`, or `recent:N`.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Orders requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Download card images into the local image cache.
    #[serde(default)]
    pub download_images: bool,

    /// Look up a market price for every line item.
    #[serde(default)]
    pub fetch_prices: bool,

    /// Unit price at or above which an item is listed in the high-value reminder.
    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filter: default_filter(),
            page_size: default_page_size(),
            download_images: false,
            fetch_prices: false,
            high_value_threshold: default_high_value_threshold(),
        }
    }
}

fn default_output_dir() -> String {
    "data".into()
}
fn default_filter() -> String {
    "unshipped".into()
}
fn default_page_size() -> usize {
    100
}
fn default_high_value_threshold() -> f64 {
    10.0
}

/// `[marketplace]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    /// API root, without a trailing slash.
    #[serde(default = "default_marketplace_url")]
    pub base_url: String,

    /// Name of the env var holding the account email (never store the value itself).
    #[serde(default = "default_email_env")]
    pub email_env: String,

    /// Name of the env var holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout.
    #[serde(default = "default_marketplace_timeout")]
    pub timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_marketplace_url(),
            email_env: default_email_env(),
            token_env: default_token_env(),
            timeout_secs: default_marketplace_timeout(),
        }
    }
}

fn default_marketplace_url() -> String {
    "https://manapool.com/api/v1".into()
}
fn default_email_env() -> String {
    "MANAPOOL_EMAIL".into()
}
fn default_token_env() -> String {
    "MANAPOOL_ACCESS_TOKEN".into()
}
fn default_marketplace_timeout() -> u64 {
    15
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Card reference API root.
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Minimum ms between two calls to the reference service.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,

    /// Lookup chain, tried in order: `exact`, `fuzzy`, `name-in-set`.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_catalog_timeout(),
            strategies: default_strategies(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://api.scryfall.com".into()
}
fn default_rate_limit() -> u64 {
    100
}
fn default_catalog_timeout() -> u64 {
    10
}
fn default_strategies() -> Vec<String> {
    vec!["exact".into(), "fuzzy".into()]
}

/// `[locations]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// Set-code → location mapping file.
    #[serde(default = "default_locations_file")]
    pub file: String,

    /// Label used for sets that have no assignment.
    #[serde(default = "default_label")]
    pub default_label: String,

    /// Assign `default_label` to unknown sets instead of prompting.
    #[serde(default)]
    pub auto_assign: bool,
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            file: default_locations_file(),
            default_label: default_label(),
            auto_assign: false,
        }
    }
}

fn default_locations_file() -> String {
    "locations.json".into()
}
fn default_label() -> String {
    "Unassigned".into()
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Identity key → local image path index.
    #[serde(default = "default_image_cache_file")]
    pub image_cache_file: String,

    /// Directory downloaded images are stored in.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            image_cache_file: default_image_cache_file(),
            images_dir: default_images_dir(),
        }
    }
}

fn default_image_cache_file() -> String {
    "image_cache.json".into()
}
fn default_images_dir() -> String {
    "images".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime order retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrieveConfig {
    /// Which orders to keep.
    pub filter: OrderFilter,
    /// Rows requested per page.
    pub page_size: usize,
}

impl TryFrom<&AppConfig> for RetrieveConfig {
    type Error = CardpickError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        if config.defaults.page_size == 0 {
            return Err(CardpickError::config("page_size must be at least 1"));
        }
        Ok(Self {
            filter: config.defaults.filter.parse()?,
            page_size: config.defaults.page_size,
        })
    }
}

/// Runtime card reference configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// API root.
    pub base_url: String,
    /// Minimum delay between calls.
    pub min_interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl From<&AppConfig> for CatalogConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.catalog.base_url.clone(),
            min_interval: Duration::from_millis(config.catalog.rate_limit_ms),
            timeout: Duration::from_secs(config.catalog.timeout_secs),
        }
    }
}

/// Marketplace credentials read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cardpick/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CardpickError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cardpick/cardpick.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CardpickError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CardpickError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CardpickError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CardpickError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CardpickError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the marketplace credentials from the env vars named in the config.
///
/// Missing or empty values are fatal; this runs before any network call.
pub fn marketplace_credentials(config: &AppConfig) -> Result<Credentials> {
    let read = |var_name: &str| match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(CardpickError::config(format!(
            "marketplace credentials not found. Set the {var_name} environment variable \
             (a .env file in the working directory is also read)."
        ))),
    };

    Ok(Credentials {
        email: read(&config.marketplace.email_env)?,
        token: read(&config.marketplace.token_env)?,
    })
}
