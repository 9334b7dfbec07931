//! Shared types, error model, and configuration for cardpick.
//!
//! This crate is the foundation depended on by all other cardpick crates.
//! It provides:
//! - [`CardpickError`], the unified error type
//! - Domain types ([`Order`], [`LineItem`], [`Picklist`], [`CardIdentity`], [`OrderFilter`])
//! - Configuration ([`AppConfig`], [`RetrieveConfig`], [`CatalogConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CatalogConfig, CatalogSettings, Credentials, DefaultsConfig,
    LocationsConfig, MarketplaceConfig, RetrieveConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, marketplace_credentials,
};
pub use error::{CardpickError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CardIdentity, CardRef, FulfillmentStatus, LineItem, NOT_AVAILABLE,
    Order, OrderFilter, OrderLine, OrderSummary, Picklist, is_missing,
};
