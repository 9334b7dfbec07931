//! Card reference lookups for cardpick.
//!
//! - [`ScryfallClient`]: rate-limited HTTP access to the reference service
//! - [`LookupChain`]: ordered fallback strategies, first hit wins
//! - [`LookupCache`]: per-run record memo plus the persisted image index

mod cache;
mod client;
mod price;
mod strategy;

pub use cache::{ImageResolution, LookupCache};
pub use client::{CardFace, CardRecord, CardSource, ImageUris, Prices, RateLimiter, ScryfallClient};
pub use price::extract_price;
pub use strategy::{Lookup, LookupChain, LookupStrategy};
