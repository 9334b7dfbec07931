//! The loaded picklist, its picking progress, and lookup results.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use cardpick_catalog::ImageResolution;
use cardpick_core::export;
use cardpick_core::progress::{ProgressSnapshot, ProgressTracker};
use cardpick_shared::{CardpickError, LineItem, Picklist, Result};
use tracing::info;

use crate::worker::{LookupHandle, LookupRequest, LookupResult};

/// Newest `*_orders_*.json` picklist in `dir`, by its timestamped name.
pub(crate) fn latest_picklist(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| CardpickError::io(dir, e))?;

    let newest = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string());
            name.is_some_and(|n| {
                n.contains("_orders_") && n.ends_with(".json") && !n.ends_with(".progress.json")
            })
        })
        .max();
    Ok(newest)
}

pub(crate) struct Session {
    pub path: PathBuf,
    pub progress_path: PathBuf,
    pub picklist: Picklist,
    pub tracker: ProgressTracker,
    /// Fetched prices by identity key; `None` means the service had none.
    prices: HashMap<String, Option<f64>>,
    images: HashMap<String, ImageResolution>,
    pending: HashSet<String>,
    lookups: Option<LookupHandle>,
}

impl Session {
    /// Load a picklist and restore its saved progress, if any.
    pub(crate) fn open(path: &Path, progress_path: Option<PathBuf>) -> Result<Self> {
        let picklist = export::read_picklist(path)?;
        let tracker = ProgressTracker::new(&picklist.items);
        let progress_path = progress_path.unwrap_or_else(|| path.with_extension("progress.json"));

        let mut session = Self {
            path: path.to_path_buf(),
            progress_path,
            picklist,
            tracker,
            prices: HashMap::new(),
            images: HashMap::new(),
            pending: HashSet::new(),
            lookups: None,
        };
        if session.progress_path.exists() {
            session.load_progress()?;
        }
        info!(items = session.items().len(), path = %path.display(), "picklist loaded");
        Ok(session)
    }

    pub(crate) fn attach(&mut self, lookups: LookupHandle) {
        self.lookups = Some(lookups);
    }

    pub(crate) fn lookups_enabled(&self) -> bool {
        self.lookups.is_some()
    }

    pub(crate) fn items(&self) -> &[LineItem] {
        &self.picklist.items
    }

    pub(crate) fn is_grabbed(&self, index: usize) -> bool {
        self.tracker.is_grabbed(&self.picklist.items[index].progress_key())
    }

    pub(crate) fn toggle(&mut self, index: usize) -> Option<bool> {
        let key = self.picklist.items.get(index)?.progress_key();
        self.tracker.toggle(&key)
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    pub(crate) fn save_progress(&self) -> Result<&Path> {
        self.tracker.snapshot().save(&self.progress_path)?;
        Ok(&self.progress_path)
    }

    /// Re-apply the saved snapshot. Returns how many states were applied.
    pub(crate) fn load_progress(&mut self) -> Result<usize> {
        if !self.progress_path.exists() {
            return Err(CardpickError::Input(format!(
                "no saved progress at {}",
                self.progress_path.display()
            )));
        }
        let snapshot = ProgressSnapshot::load(&self.progress_path);
        Ok(self.tracker.restore(&snapshot))
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Queue price lookups for items that have none yet. Returns how many
    /// requests were sent.
    pub(crate) fn request_prices(&mut self, indices: &[usize]) -> usize {
        let Some(lookups) = self.lookups.as_ref() else {
            return 0;
        };
        let mut sent = 0;
        for &i in indices {
            let item = &self.picklist.items[i];
            let id = item.identity();
            let key = format!("price:{}", id.cache_key());
            if item.market_price.is_some()
                || self.prices.contains_key(&id.cache_key())
                || self.pending.contains(&key)
            {
                continue;
            }
            if !lookups.send(LookupRequest::Price(id)) {
                break;
            }
            self.pending.insert(key);
            sent += 1;
        }
        sent
    }

    /// Queue an image lookup for one item unless it is known or in flight.
    pub(crate) fn request_image(&mut self, index: usize) -> bool {
        let Some(lookups) = self.lookups.as_ref() else {
            return false;
        };
        let id = self.picklist.items[index].identity();
        let key = format!("image:{}", id.cache_key());
        if self.images.contains_key(&id.cache_key()) || self.pending.contains(&key) {
            return false;
        }
        if lookups.send(LookupRequest::Image(id)) {
            self.pending.insert(key);
            true
        } else {
            false
        }
    }

    /// Apply every finished lookup. Returns how many arrived.
    pub(crate) fn drain_lookups(&mut self) -> usize {
        let mut results = Vec::new();
        if let Some(lookups) = self.lookups.as_mut() {
            while let Some(result) = lookups.try_next() {
                results.push(result);
            }
        }
        let count = results.len();
        for result in results {
            self.apply(result);
        }
        count
    }

    pub(crate) fn apply(&mut self, result: LookupResult) {
        match result {
            LookupResult::Price { key, price } => {
                self.pending.remove(&format!("price:{key}"));
                if let Some(price) = price {
                    for item in &mut self.picklist.items {
                        if item.market_price.is_none() && item.identity().cache_key() == key {
                            item.market_price = Some(price);
                        }
                    }
                }
                self.prices.insert(key, price);
            }
            LookupResult::Image { key, image } => {
                self.pending.remove(&format!("image:{key}"));
                self.images.insert(key, image);
            }
        }
    }

    pub(crate) fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    /// Price column text: known price, `...` in flight, `N/A` when the
    /// service had none, blank when never asked.
    pub(crate) fn price_text(&self, index: usize) -> String {
        let item = &self.picklist.items[index];
        if let Some(price) = item.market_price {
            return format!("${price:.2}");
        }
        let key = item.identity().cache_key();
        if self.pending.contains(&format!("price:{key}")) {
            "...".into()
        } else if self.prices.contains_key(&key) {
            "N/A".into()
        } else {
            String::new()
        }
    }

    /// Image reference from the worker, falling back to the picklist's own.
    pub(crate) fn image_text(&self, index: usize) -> String {
        let item = &self.picklist.items[index];
        let key = item.identity().cache_key();
        if let Some(image) = self.images.get(&key) {
            return image.to_field();
        }
        if self.pending.contains(&format!("image:{key}")) {
            return "loading...".into();
        }
        item.image.clone().unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use cardpick_catalog::{LookupCache, LookupChain};
    use cardpick_shared::OrderFilter;
    use tokio::runtime::Handle;

    use super::*;
    use crate::worker::tests::OneBolt;

    pub(crate) fn item(order: &str, name: &str, set: &str, number: &str) -> LineItem {
        LineItem {
            order_id: order.into(),
            order_label: format!("#{order}"),
            location: "Binder 1".into(),
            quantity: 1,
            name: name.into(),
            set_code: set.into(),
            collector_number: number.into(),
            condition: "NM".into(),
            finish: "nonfoil".into(),
            unit_price: 1.0,
            catalog_sku: None,
            external_id: None,
            image: None,
            market_price: None,
            rarity: None,
            type_line: None,
            colors: vec![],
        }
    }

    fn write_list(dir: &Path, name: &str, items: Vec<LineItem>) -> PathBuf {
        let path = dir.join(name);
        export::write_picklist(&path, &Picklist::new(&OrderFilter::Unshipped, items)).unwrap();
        path
    }

    /// A session over `items`, backed by files in a temp dir.
    pub(crate) fn session_with(items: Vec<LineItem>) -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(dir.path(), "list.json", items);
        let session = Session::open(&path, None).unwrap();
        (dir, session)
    }

    #[test]
    fn latest_picklist_picks_newest_and_skips_progress() {
        let dir = tempfile::tempdir().unwrap();
        write_list(dir.path(), "2026-01-01_0900_orders_all.json", vec![]);
        write_list(dir.path(), "2026-02-01_0900_orders_not-shipped.json", vec![]);
        std::fs::write(
            dir.path().join("2026-03-01_0900_orders_all.progress.json"),
            "{}",
        )
        .unwrap();
        std::fs::write(dir.path().join("2026-04-01_0900_orders_all.csv"), "").unwrap();

        let newest = latest_picklist(dir.path()).unwrap().unwrap();
        assert!(newest.ends_with("2026-02-01_0900_orders_not-shipped.json"));
        assert_eq!(latest_picklist(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn progress_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(
            dir.path(),
            "list.json",
            vec![item("a", "Opt", "XLN", "65"), item("b", "Shock", "M19", "156")],
        );

        let mut session = Session::open(&path, None).unwrap();
        assert_eq!(session.toggle(1), Some(true));
        let saved = session.save_progress().unwrap().to_path_buf();
        assert!(saved.ends_with("list.progress.json"));

        let session = Session::open(&path, None).unwrap();
        assert!(!session.is_grabbed(0));
        assert!(session.is_grabbed(1));
    }

    #[test]
    fn loading_without_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(dir.path(), "list.json", vec![item("a", "Opt", "XLN", "65")]);
        let mut session = Session::open(&path, Some(dir.path().join("none.json"))).unwrap();
        assert!(session.load_progress().is_err());
    }

    #[test]
    fn price_results_fill_display_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(
            dir.path(),
            "list.json",
            vec![
                item("a", "Lightning Bolt", "M10", "146"),
                item("b", "Lightning Bolt", "M10", "146"),
                item("c", "Opt", "XLN", "65"),
            ],
        );
        let mut session = Session::open(&path, None).unwrap();
        let bolt_key = session.items()[0].identity().cache_key();
        let opt_key = session.items()[2].identity().cache_key();

        session.apply(LookupResult::Price {
            key: bolt_key,
            price: Some(2.5),
        });
        session.apply(LookupResult::Price {
            key: opt_key,
            price: None,
        });

        assert_eq!(session.price_text(0), "$2.50");
        assert_eq!(session.price_text(1), "$2.50");
        assert_eq!(session.price_text(2), "N/A");
    }

    #[tokio::test]
    async fn duplicate_requests_are_not_resent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_list(
            dir.path(),
            "list.json",
            vec![
                item("a", "Lightning Bolt", "M10", "146"),
                item("b", "Lightning Bolt", "M10", "146"),
            ],
        );
        let mut session = Session::open(&path, None).unwrap();
        assert_eq!(session.request_prices(&[0, 1]), 0);

        session.attach(LookupHandle::spawn(
            &Handle::current(),
            LookupCache::new(OneBolt::default(), LookupChain::default()),
        ));
        assert_eq!(session.request_prices(&[0, 1]), 1);
        assert_eq!(session.request_prices(&[0, 1]), 0);
        assert_eq!(session.price_text(1), "...");
        assert!(session.request_image(0));
        assert!(!session.request_image(1));
        assert_eq!(session.pending_lookups(), 2);
    }
}
