//! Lookup cache: per-run record memo, price memo, and the persisted image index.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use cardpick_shared::{CardIdentity, CardpickError, NOT_AVAILABLE, Result};
use cardpick_storage::JsonFile;
use tracing::{debug, info, warn};

use crate::client::{CardRecord, CardSource};
use crate::price::extract_price;
use crate::strategy::{Lookup, LookupChain};

/// Where a card's image can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageResolution {
    /// Downloaded into the local image cache.
    Local(PathBuf),
    /// Remote URI only (downloads disabled, or the download failed).
    Remote(String),
    NotFound,
}

impl ImageResolution {
    /// Text written to the `image` output column.
    pub fn to_field(&self) -> String {
        match self {
            Self::Local(p) => p.display().to_string(),
            Self::Remote(uri) => uri.clone(),
            Self::NotFound => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Identity key → local path or `N/A`, persisted as one JSON object.
struct ImageStore {
    file: JsonFile,
    dir: PathBuf,
    index: BTreeMap<String, String>,
    dirty: bool,
}

impl ImageStore {
    fn record(&mut self, key: String, value: String) {
        self.index.insert(key, value);
        self.dirty = true;
    }
}

/// Deduplicates reference lookups for a run.
///
/// Constructed once per run and owned by the single writer of the image index.
pub struct LookupCache<S> {
    source: S,
    chain: LookupChain,
    records: HashMap<String, Lookup>,
    prices: HashMap<String, Option<f64>>,
    images: Option<ImageStore>,
}

impl<S: CardSource> LookupCache<S> {
    /// A cache that keeps nothing on disk.
    pub fn new(source: S, chain: LookupChain) -> Self {
        Self {
            source,
            chain,
            records: HashMap::new(),
            prices: HashMap::new(),
            images: None,
        }
    }

    /// Enable image downloads into `images_dir`, indexed by `index_file`.
    pub fn with_image_store(mut self, index_file: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        let file = JsonFile::new(index_file);
        let index: BTreeMap<String, String> = file.load_or_default();
        debug!(entries = index.len(), path = %file.path().display(), "image index loaded");
        self.images = Some(ImageStore {
            file,
            dir: images_dir.into(),
            index,
            dirty: false,
        });
        self
    }

    pub fn downloads_enabled(&self) -> bool {
        self.images.is_some()
    }

    /// Entries currently in the image index.
    pub fn indexed_images(&self) -> usize {
        self.images.as_ref().map_or(0, |s| s.index.len())
    }

    /// Memoized chain lookup. Transport failures are not memoized.
    pub async fn lookup(&mut self, id: &CardIdentity) -> Lookup {
        let key = id.cache_key();
        if let Some(hit) = self.records.get(&key) {
            return hit.clone();
        }

        let result = self.chain.run(&self.source, id).await;
        if result != Lookup::Unavailable {
            self.records.insert(key, result.clone());
        }
        result
    }

    /// A record already looked up this run. Never touches the network.
    pub fn memoized(&self, id: &CardIdentity) -> Option<&CardRecord> {
        self.records.get(&id.cache_key()).and_then(Lookup::record)
    }

    /// The full record, if any strategy found one.
    pub async fn record(&mut self, id: &CardIdentity) -> Option<CardRecord> {
        match self.lookup(id).await {
            Lookup::Found(record) => Some(record),
            _ => None,
        }
    }

    /// Market price for the card, memoized in memory only.
    pub async fn resolve_price(&mut self, id: &CardIdentity) -> Option<f64> {
        let key = id.cache_key();
        if let Some(price) = self.prices.get(&key) {
            return *price;
        }

        let lookup = self.lookup(id).await;
        let price = lookup.record().and_then(|r| extract_price(&r.prices));
        if lookup != Lookup::Unavailable {
            self.prices.insert(key, price);
        }
        price
    }

    /// Image for the card.
    ///
    /// With downloads enabled, a cached file that still exists and a persisted
    /// `N/A` both answer without touching the network. A deleted file is
    /// fetched again. Only clean misses are persisted as `N/A`.
    pub async fn resolve_image(&mut self, id: &CardIdentity) -> ImageResolution {
        let key = id.cache_key();

        if let Some(store) = self.images.as_mut() {
            match store.index.get(&key).map(String::as_str) {
                Some(NOT_AVAILABLE) => return ImageResolution::NotFound,
                Some(path) if Path::new(path).exists() => {
                    return ImageResolution::Local(PathBuf::from(path));
                }
                Some(path) => {
                    info!(%key, %path, "cached image missing on disk, refreshing");
                }
                None => {
                    let target = store.dir.join(format!("{key}.jpg"));
                    if target.exists() {
                        store.record(key, target.display().to_string());
                        return ImageResolution::Local(target);
                    }
                }
            }
        }

        let lookup = self.lookup(id).await;
        let uri = lookup.record().and_then(|r| r.image_uri()).map(str::to_string);

        let Some(store) = self.images.as_mut() else {
            return uri.map_or(ImageResolution::NotFound, ImageResolution::Remote);
        };

        let Some(uri) = uri else {
            if lookup != Lookup::Unavailable {
                store.record(key, NOT_AVAILABLE.to_string());
            }
            return ImageResolution::NotFound;
        };

        let target = store.dir.join(format!("{key}.jpg"));
        match download_to(&self.source, &uri, &target).await {
            Ok(()) => {
                info!(file = %target.display(), "downloaded image");
                store.record(key, target.display().to_string());
                ImageResolution::Local(target)
            }
            Err(e) => {
                warn!(%uri, error = %e, "image download failed, keeping remote URI");
                ImageResolution::Remote(uri)
            }
        }
    }

    /// Persist the image index if anything changed.
    pub fn save(&mut self) -> Result<bool> {
        let Some(store) = self.images.as_mut() else {
            return Ok(false);
        };
        if !store.dirty {
            return Ok(false);
        }
        store.file.save(&store.index)?;
        store.dirty = false;
        info!(entries = store.index.len(), "image index saved");
        Ok(true)
    }
}

async fn download_to<S: CardSource>(source: &S, uri: &str, target: &Path) -> Result<()> {
    let bytes = source.download(uri).await?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CardpickError::io(parent, e))?;
    }
    std::fs::write(target, bytes).map_err(|e| CardpickError::io(target, e))
}
