//! Pick-path ordering.
//!
//! The default order walks the busiest location first, then within a location
//! the busiest set first, so the picker switches bins and binders as little as
//! possible:
//!
//! 1. per-location total quantity, descending
//! 2. location, ascending
//! 3. per-(location, set) total quantity, descending
//! 4. set code, ascending
//! 5. card name, ascending
//!
//! Aggregates are computed over the whole input. The sort is stable.

use std::cmp::Ordering;
use std::collections::HashMap;

use cardpick_shared::{CardpickError, LineItem, Result};

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

struct Volumes {
    by_location: HashMap<String, u64>,
    by_set: HashMap<(String, String), u64>,
}

impl Volumes {
    fn of(items: &[LineItem]) -> Self {
        let mut by_location = HashMap::new();
        let mut by_set = HashMap::new();
        for item in items {
            *by_location.entry(item.location.clone()).or_insert(0) += u64::from(item.quantity);
            *by_set
                .entry((item.location.clone(), item.set_code.clone()))
                .or_insert(0) += u64::from(item.quantity);
        }
        Self {
            by_location,
            by_set,
        }
    }

    fn location(&self, item: &LineItem) -> u64 {
        self.by_location.get(&item.location).copied().unwrap_or(0)
    }

    fn set(&self, item: &LineItem) -> u64 {
        self.by_set
            .get(&(item.location.clone(), item.set_code.clone()))
            .copied()
            .unwrap_or(0)
    }
}

/// Case-insensitive, with the exact text breaking ties so that labels which
/// differ only in case never compare equal and their groups stay contiguous.
fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Default pick path
// ---------------------------------------------------------------------------

/// Sort `items` into pick-path order in place.
pub fn sort_pick_path(items: &mut [LineItem]) {
    let volumes = Volumes::of(items);
    items.sort_by(|a, b| {
        volumes
            .location(b)
            .cmp(&volumes.location(a))
            .then_with(|| cmp_text(&a.location, &b.location))
            .then_with(|| volumes.set(b).cmp(&volumes.set(a)))
            .then_with(|| cmp_text(&a.set_code, &b.set_code))
            .then_with(|| cmp_text(&a.name, &b.name))
    });
}

// ---------------------------------------------------------------------------
// Alternate sort
// ---------------------------------------------------------------------------

/// A field the operator can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Location,
    Set,
    Name,
    Condition,
    Rarity,
    Price,
    CardType,
    Color,
}

impl SortKey {
    pub const ALL: [SortKey; 8] = [
        Self::Location,
        Self::Set,
        Self::Name,
        Self::Condition,
        Self::Rarity,
        Self::Price,
        Self::CardType,
        Self::Color,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::Set => "Set",
            Self::Name => "Name",
            Self::Condition => "Condition",
            Self::Rarity => "Rarity",
            Self::Price => "Price",
            Self::CardType => "Card Type",
            Self::Color => "Color",
        }
    }

    /// The next key in [`SortKey::ALL`], wrapping around.
    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|k| k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(&self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Self::Ascending => ord,
            Self::Descending => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortLevel {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Up to three sort levels, most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    levels: Vec<SortLevel>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            levels: vec![
                SortLevel {
                    key: SortKey::Location,
                    direction: SortDirection::Ascending,
                },
                SortLevel {
                    key: SortKey::Set,
                    direction: SortDirection::Ascending,
                },
                SortLevel {
                    key: SortKey::Name,
                    direction: SortDirection::Ascending,
                },
            ],
        }
    }
}

impl SortSpec {
    pub const MAX_LEVELS: usize = 3;

    pub fn new(levels: Vec<SortLevel>) -> Result<Self> {
        if levels.is_empty() || levels.len() > Self::MAX_LEVELS {
            return Err(CardpickError::validation(format!(
                "sort needs between 1 and {} levels, got {}",
                Self::MAX_LEVELS,
                levels.len()
            )));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[SortLevel] {
        &self.levels
    }

    /// Replace the primary level's key, keeping its direction.
    pub fn with_primary(mut self, key: SortKey) -> Self {
        if let Some(first) = self.levels.first_mut() {
            first.key = key;
        }
        self
    }

    /// Flip the primary level's direction.
    pub fn flip_primary(mut self) -> Self {
        if let Some(first) = self.levels.first_mut() {
            first.direction = first.direction.flip();
        }
        self
    }
}

fn rarity_rank(rarity: Option<&str>) -> Option<u8> {
    let rank = match rarity?.to_ascii_lowercase().as_str() {
        "common" => 0,
        "uncommon" => 1,
        "rare" => 2,
        "mythic" => 3,
        "special" => 4,
        "bonus" => 5,
        _ => 6,
    };
    Some(rank)
}

/// Market price when known, otherwise the order's unit price; zero is unknown.
fn sort_price(item: &LineItem) -> Option<f64> {
    item.market_price
        .or(Some(item.unit_price))
        .filter(|p| *p > 0.0)
}

fn color_key(item: &LineItem) -> String {
    const WUBRG: [&str; 5] = ["W", "U", "B", "R", "G"];
    WUBRG
        .iter()
        .filter(|c| item.colors.iter().any(|x| x.eq_ignore_ascii_case(c)))
        .copied()
        .collect()
}

/// Missing values go last regardless of direction.
fn cmp_optional<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(cmp(&a, &b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_level(level: &SortLevel, a: &LineItem, b: &LineItem) -> Ordering {
    let dir = level.direction;
    match level.key {
        SortKey::Location => dir.apply(cmp_text(&a.location, &b.location)),
        SortKey::Set => dir.apply(cmp_text(&a.set_code, &b.set_code)),
        SortKey::Name => dir.apply(cmp_text(&a.name, &b.name)),
        SortKey::Condition => dir.apply(cmp_text(&a.condition, &b.condition)),
        SortKey::Rarity => cmp_optional(
            rarity_rank(a.rarity.as_deref()),
            rarity_rank(b.rarity.as_deref()),
            dir,
            Ord::cmp,
        ),
        SortKey::Price => cmp_optional(sort_price(a), sort_price(b), dir, f64::total_cmp),
        SortKey::CardType => cmp_optional(
            a.type_line.as_deref(),
            b.type_line.as_deref(),
            dir,
            |x, y| cmp_text(x, y),
        ),
        SortKey::Color => dir.apply(color_key(a).cmp(&color_key(b))),
    }
}

/// Indices of `items` in `spec` order. The input is left untouched.
pub fn ordered_indices(items: &[LineItem], spec: &SortSpec) -> Vec<usize> {
    let location_primary = spec
        .levels
        .first()
        .is_some_and(|l| l.key == SortKey::Location);
    let volumes = location_primary.then(|| Volumes::of(items));

    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.sort_by(|&i, &j| {
        let (a, b) = (&items[i], &items[j]);
        let grouped = volumes
            .as_ref()
            .map_or(Ordering::Equal, |v| v.location(b).cmp(&v.location(a)));
        spec.levels
            .iter()
            .fold(grouped, |ord, level| ord.then_with(|| cmp_level(level, a, b)))
    });
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(location: &str, set: &str, name: &str, quantity: u32) -> LineItem {
        LineItem {
            order_id: "o1".into(),
            order_label: "#1".into(),
            location: location.into(),
            quantity,
            name: name.into(),
            set_code: set.into(),
            collector_number: "1".into(),
            condition: "NM".into(),
            finish: "nonfoil".into(),
            unit_price: 0.0,
            catalog_sku: None,
            external_id: None,
            image: None,
            market_price: None,
            rarity: None,
            type_line: None,
            colors: vec![],
        }
    }

    fn names(items: &[LineItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn location_volume_beats_location_name() {
        let mut items = vec![
            item("Bin1", "AAA", "A", 3),
            item("Bin1", "BBB", "B", 3),
            item("Bin2", "CCC", "C", 10),
        ];
        sort_pick_path(&mut items);
        assert_eq!(names(&items), vec!["C", "A", "B"]);
    }

    #[test]
    fn one_large_location_beats_two_smaller_lines() {
        let mut items = vec![
            item("Bin1", "AAA", "A", 5),
            item("Bin1", "BBB", "B", 1),
            item("Bin2", "CCC", "C", 10),
        ];
        sort_pick_path(&mut items);
        assert_eq!(names(&items), vec!["C", "A", "B"]);
    }

    #[test]
    fn sets_differing_only_in_case_stay_grouped() {
        let mut items = vec![
            item("Binder 1", "MH2", "Alpha", 1),
            item("Binder 1", "mh2", "Beta", 1),
            item("Binder 1", "MH2", "Gamma", 1),
            item("Binder 1", "mh2", "Delta", 1),
        ];
        sort_pick_path(&mut items);
        let order: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.set_code.as_str(), i.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("MH2", "Alpha"),
                ("MH2", "Gamma"),
                ("mh2", "Beta"),
                ("mh2", "Delta"),
            ]
        );

        let spec = SortSpec::new(vec![SortLevel {
            key: SortKey::Set,
            direction: SortDirection::Ascending,
        }])
        .unwrap();
        let sets: Vec<&str> = ordered_indices(&items, &spec)
            .into_iter()
            .map(|i| items[i].set_code.as_str())
            .collect();
        assert_eq!(sets, vec!["MH2", "MH2", "mh2", "mh2"]);
    }

    #[test]
    fn set_volume_within_location() {
        let mut items = vec![
            item("Bin1", "AAA", "Zap", 1),
            item("Bin1", "BBB", "Bolt", 2),
            item("Bin1", "BBB", "Anger", 1),
            item("Bin1", "AAA", "Opt", 1),
        ];
        sort_pick_path(&mut items);
        assert_eq!(names(&items), vec!["Anger", "Bolt", "Opt", "Zap"]);
    }

    #[test]
    fn equal_volumes_fall_back_to_labels() {
        let mut items = vec![
            item("binder b", "XYZ", "One", 2),
            item("Binder A", "XYZ", "Two", 2),
        ];
        sort_pick_path(&mut items);
        assert_eq!(names(&items), vec!["Two", "One"]);
    }

    #[test]
    fn sorting_is_deterministic_and_stable() {
        let build = || {
            let mut a = item("Bin1", "AAA", "Same", 1);
            a.order_id = "first".into();
            let mut b = item("Bin1", "AAA", "Same", 1);
            b.order_id = "second".into();
            vec![a, b, item("Bin2", "CCC", "Other", 1)]
        };
        let mut once = build();
        let mut twice = build();
        sort_pick_path(&mut once);
        sort_pick_path(&mut twice);
        sort_pick_path(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(once[0].order_id, "first");
        assert_eq!(once[1].order_id, "second");
    }

    #[test]
    fn location_primary_groups_by_volume() {
        let items = vec![
            item("Bin1", "AAA", "A", 1),
            item("Bin2", "CCC", "C", 5),
            item("Bin1", "BBB", "B", 1),
        ];
        let order = ordered_indices(&items, &SortSpec::default());
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn price_missing_sorts_last_both_ways() {
        let mut cheap = item("Bin1", "AAA", "Cheap", 1);
        cheap.market_price = Some(0.5);
        let mut pricey = item("Bin1", "AAA", "Pricey", 1);
        pricey.market_price = Some(25.0);
        let unknown = item("Bin1", "AAA", "Unknown", 1);
        let items = vec![unknown, cheap, pricey];

        let level = |direction| {
            SortSpec::new(vec![SortLevel {
                key: SortKey::Price,
                direction,
            }])
            .unwrap()
        };
        assert_eq!(ordered_indices(&items, &level(SortDirection::Ascending)), vec![1, 2, 0]);
        assert_eq!(ordered_indices(&items, &level(SortDirection::Descending)), vec![2, 1, 0]);
    }

    #[test]
    fn rarity_uses_rank_not_alphabet() {
        let mut a = item("Bin1", "AAA", "A", 1);
        a.rarity = Some("mythic".into());
        let mut b = item("Bin1", "AAA", "B", 1);
        b.rarity = Some("common".into());
        let mut c = item("Bin1", "AAA", "C", 1);
        c.rarity = Some("rare".into());
        let items = vec![a, b, c];

        let spec = SortSpec::new(vec![SortLevel {
            key: SortKey::Rarity,
            direction: SortDirection::Ascending,
        }])
        .unwrap();
        assert_eq!(ordered_indices(&items, &spec), vec![1, 2, 0]);
    }

    #[test]
    fn sort_level_limits() {
        let level = SortLevel {
            key: SortKey::Name,
            direction: SortDirection::Ascending,
        };
        assert!(SortSpec::new(vec![]).is_err());
        assert!(SortSpec::new(vec![level; 4]).is_err());
        assert!(SortSpec::new(vec![level; 3]).is_ok());
    }

    #[test]
    fn key_cycle_wraps() {
        assert_eq!(SortKey::Location.next(), SortKey::Set);
        assert_eq!(SortKey::Color.next(), SortKey::Location);
        let spec = SortSpec::default().with_primary(SortKey::Price).flip_primary();
        assert_eq!(spec.levels()[0].key, SortKey::Price);
        assert_eq!(spec.levels()[0].direction, SortDirection::Descending);
    }
}
