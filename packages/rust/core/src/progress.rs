//! Per-item "grabbed" state for a picking session.
//!
//! State is keyed by `order_id|name`, so it survives re-sorting and can be
//! restored onto a freshly loaded picklist.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use cardpick_shared::{LineItem, Result};
use cardpick_storage::JsonFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// On-disk form of a picking session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub grabbed_cards: Vec<String>,
    #[serde(default)]
    pub card_states: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    pub fn save(&self, path: &Path) -> Result<()> {
        JsonFile::new(path).save(self)?;
        info!(path = %path.display(), grabbed = self.grabbed_cards.len(), "progress saved");
        Ok(())
    }

    /// Missing or malformed files load as an empty snapshot.
    pub fn load(path: &Path) -> Self {
        JsonFile::new(path).load_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressCounts {
    pub total: usize,
    pub grabbed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationProgress {
    pub location: String,
    pub grabbed: usize,
    pub total: usize,
}

/// Grabbed/not-grabbed state over one picklist.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    states: HashMap<String, bool>,
}

impl ProgressTracker {
    /// Everything starts not grabbed.
    pub fn new(items: &[LineItem]) -> Self {
        Self {
            states: items.iter().map(|i| (i.progress_key(), false)).collect(),
        }
    }

    /// Flip an item's state. `None` if the key is not in this list.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let state = self.states.get_mut(key)?;
        *state = !*state;
        Some(*state)
    }

    pub fn set(&mut self, key: &str, grabbed: bool) -> bool {
        match self.states.get_mut(key) {
            Some(state) => {
                *state = grabbed;
                true
            }
            None => false,
        }
    }

    pub fn is_grabbed(&self, key: &str) -> bool {
        self.states.get(key).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let card_states: BTreeMap<String, bool> =
            self.states.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let grabbed_cards = card_states
            .iter()
            .filter(|(_, grabbed)| **grabbed)
            .map(|(k, _)| k.clone())
            .collect();
        ProgressSnapshot {
            grabbed_cards,
            card_states,
            saved_at: Some(Utc::now()),
        }
    }

    /// Apply a snapshot onto the current list. Keys the list does not contain
    /// are ignored. Returns how many keys were applied.
    pub fn restore(&mut self, snapshot: &ProgressSnapshot) -> usize {
        let mut applied = 0;
        for (key, grabbed) in &snapshot.card_states {
            if self.set(key, *grabbed) {
                applied += 1;
            }
        }
        for key in &snapshot.grabbed_cards {
            if !snapshot.card_states.contains_key(key) && self.set(key, true) {
                applied += 1;
            }
        }
        debug!(applied, offered = snapshot.card_states.len(), "progress restored");
        applied
    }

    pub fn counts(&self, items: &[LineItem]) -> ProgressCounts {
        let grabbed = items
            .iter()
            .filter(|i| self.is_grabbed(&i.progress_key()))
            .count();
        ProgressCounts {
            total: items.len(),
            grabbed,
            remaining: items.len() - grabbed,
        }
    }

    /// Progress per location, in first-appearance order.
    pub fn location_progress(&self, items: &[LineItem]) -> Vec<LocationProgress> {
        let mut out: Vec<LocationProgress> = Vec::new();
        for item in items {
            let grabbed = usize::from(self.is_grabbed(&item.progress_key()));
            match out.iter_mut().find(|p| p.location == item.location) {
                Some(p) => {
                    p.total += 1;
                    p.grabbed += grabbed;
                }
                None => out.push(LocationProgress {
                    location: item.location.clone(),
                    grabbed,
                    total: 1,
                }),
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Filtering and grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Remaining,
    Grabbed,
}

impl StatusFilter {
    pub fn next(&self) -> Self {
        match self {
            Self::All => Self::Remaining,
            Self::Remaining => Self::Grabbed,
            Self::Grabbed => Self::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Remaining => "Remaining",
            Self::Grabbed => "Grabbed",
        }
    }
}

/// What the operator currently wants to see.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Case-insensitive substring over name and set code.
    pub search: String,
    pub location: Option<String>,
    pub status: StatusFilter,
}

impl ItemFilter {
    pub fn matches(&self, item: &LineItem, grabbed: bool) -> bool {
        let search = self.search.trim().to_lowercase();
        if !search.is_empty()
            && !item.name.to_lowercase().contains(&search)
            && !item.set_code.to_lowercase().contains(&search)
        {
            return false;
        }
        if self
            .location
            .as_ref()
            .is_some_and(|loc| *loc != item.location)
        {
            return false;
        }
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Remaining => !grabbed,
            StatusFilter::Grabbed => grabbed,
        }
    }

    /// Indices from `order` that pass the filter, in the same order.
    pub fn visible(
        &self,
        items: &[LineItem],
        order: &[usize],
        tracker: &ProgressTracker,
    ) -> Vec<usize> {
        order
            .iter()
            .copied()
            .filter(|&i| self.matches(&items[i], tracker.is_grabbed(&items[i].progress_key())))
            .collect()
    }
}

/// Group indices under their location; locations keep first-seen order.
pub fn group_by_location(items: &[LineItem], indices: &[usize]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for &i in indices {
        let location = &items[i].location;
        match groups.iter_mut().find(|(loc, _)| loc == location) {
            Some((_, members)) => members.push(i),
            None => groups.push((location.clone(), vec![i])),
        }
    }
    groups
}

/// Distinct locations in first-seen order.
pub fn locations_of(items: &[LineItem]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        if !seen.contains(&item.location) {
            seen.push(item.location.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(order: &str, name: &str, set: &str, location: &str) -> LineItem {
        LineItem {
            order_id: order.into(),
            order_label: format!("#{order}"),
            location: location.into(),
            quantity: 1,
            name: name.into(),
            set_code: set.into(),
            collector_number: "1".into(),
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

    fn picklist() -> Vec<LineItem> {
        vec![
            item("o1", "Lightning Bolt", "M10", "Binder 1"),
            item("o1", "Opt", "XLN", "Binder 2"),
            item("o2", "Counterspell", "MH2", "Binder 1"),
        ]
    }

    #[test]
    fn toggle_flips_and_unknown_keys_are_none() {
        let items = picklist();
        let mut tracker = ProgressTracker::new(&items);

        assert_eq!(tracker.toggle("o1|Opt"), Some(true));
        assert!(tracker.is_grabbed("o1|Opt"));
        assert_eq!(tracker.toggle("o1|Opt"), Some(false));
        assert_eq!(tracker.toggle("o9|Nothing"), None);
    }

    #[test]
    fn restore_ignores_unknown_keys() {
        let items = picklist();
        let mut tracker = ProgressTracker::new(&items);

        let mut snapshot = ProgressSnapshot::default();
        snapshot.card_states.insert("o1|Opt".into(), true);
        snapshot.card_states.insert("gone|Card".into(), true);
        snapshot.grabbed_cards.push("o2|Counterspell".into());

        assert_eq!(tracker.restore(&snapshot), 2);
        assert!(tracker.is_grabbed("o1|Opt"));
        assert!(tracker.is_grabbed("o2|Counterspell"));
        assert!(!tracker.is_grabbed("o1|Lightning Bolt"));
    }

    #[test]
    fn snapshot_save_load_restores_onto_fresh_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let items = picklist();

        let mut tracker = ProgressTracker::new(&items);
        tracker.toggle("o1|Lightning Bolt");
        tracker.snapshot().save(&path).unwrap();

        let loaded = ProgressSnapshot::load(&path);
        assert_eq!(loaded.grabbed_cards, vec!["o1|Lightning Bolt".to_string()]);
        assert!(loaded.saved_at.is_some());

        let mut fresh = ProgressTracker::new(&items[..2]);
        assert_eq!(fresh.restore(&loaded), 2);
        assert!(fresh.is_grabbed("o1|Lightning Bolt"));
    }

    #[test]
    fn snapshot_without_saved_at_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, r#"{"grabbed_cards":["o1|Opt"],"card_states":{"o1|Opt":true}}"#)
            .unwrap();

        let loaded = ProgressSnapshot::load(&path);
        assert_eq!(loaded.saved_at, None);
        assert_eq!(loaded.card_states.len(), 1);

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(ProgressSnapshot::load(&path), ProgressSnapshot::default());
    }

    #[test]
    fn counts_and_location_progress() {
        let items = picklist();
        let mut tracker = ProgressTracker::new(&items);
        tracker.toggle("o2|Counterspell");

        assert_eq!(
            tracker.counts(&items),
            ProgressCounts {
                total: 3,
                grabbed: 1,
                remaining: 2
            }
        );
        let per_location = tracker.location_progress(&items);
        assert_eq!(per_location[0].location, "Binder 1");
        assert_eq!((per_location[0].grabbed, per_location[0].total), (1, 2));
        assert_eq!((per_location[1].grabbed, per_location[1].total), (0, 1));
    }

    #[test]
    fn filter_search_location_and_status() {
        let items = picklist();
        let mut tracker = ProgressTracker::new(&items);
        tracker.toggle("o1|Lightning Bolt");
        let order: Vec<usize> = (0..items.len()).collect();

        let search = ItemFilter {
            search: "xln".into(),
            ..Default::default()
        };
        assert_eq!(search.visible(&items, &order, &tracker), vec![1]);

        let location = ItemFilter {
            location: Some("Binder 1".into()),
            status: StatusFilter::Remaining,
            ..Default::default()
        };
        assert_eq!(location.visible(&items, &order, &tracker), vec![2]);

        let grabbed = ItemFilter {
            status: StatusFilter::Grabbed,
            ..Default::default()
        };
        assert_eq!(grabbed.visible(&items, &order, &tracker), vec![0]);
    }

    #[test]
    fn grouping_keeps_first_seen_order() {
        let items = picklist();
        let groups = group_by_location(&items, &[0, 1, 2]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], ("Binder 1".to_string(), vec![0, 2]));
        assert_eq!(locations_of(&items), vec!["Binder 1", "Binder 2"]);
    }
}
