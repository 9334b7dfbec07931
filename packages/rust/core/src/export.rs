//! CSV and JSON picklist output, plus the high-value reminder.

use std::path::{Path, PathBuf};

use cardpick_shared::{CardpickError, LineItem, NOT_AVAILABLE, OrderFilter, Picklist, Result};
use cardpick_storage::JsonFile;
use chrono::{DateTime, Local};
use tracing::info;

/// Column order of the CSV picklist.
pub const CSV_COLUMNS: [&str; 13] = [
    "order_id",
    "order_label",
    "location",
    "quantity",
    "name",
    "set",
    "number",
    "condition",
    "finish",
    "price",
    "tcgplayer_sku",
    "scryfall_id",
    "image",
];

/// Paths a run writes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// `<YYYY-MM-DD_HHMM>_orders_<filter tag>`.
pub fn output_stem(at: DateTime<Local>, filter: &OrderFilter) -> String {
    format!("{}_orders_{}", at.format("%Y-%m-%d_%H%M"), filter.file_tag())
}

pub fn output_paths(dir: &Path, stem: &str) -> OutputPaths {
    OutputPaths {
        csv: dir.join(format!("{stem}.csv")),
        json: dir.join(format!("{stem}.json")),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// `=` and `@` always start a formula. A leading sign only does when the rest
/// looks like an expression, so names such as "+2 Mace" stay as they are.
fn should_neutralize(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some('=' | '@') => true,
        Some('+' | '-') => chars.any(|c| "=()!|+-*/^&%@".contains(c)),
        _ => false,
    }
}

/// Quote a text cell, defusing leading spreadsheet formula characters.
fn csv_escape(value: &str) -> String {
    let safe = if should_neutralize(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn opt_cell(value: Option<&str>) -> String {
    csv_escape(value.unwrap_or(NOT_AVAILABLE))
}

/// Render items as CSV text in their current order.
pub fn render_csv(items: &[LineItem]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');

    for item in items {
        let row = [
            csv_escape(&item.order_id),
            csv_escape(&item.order_label),
            csv_escape(&item.location),
            item.quantity.to_string(),
            csv_escape(&item.name),
            csv_escape(&item.set_code),
            csv_escape(&item.collector_number),
            csv_escape(&item.condition),
            csv_escape(&item.finish),
            format!("{:.2}", item.unit_price),
            opt_cell(item.catalog_sku.as_deref()),
            opt_cell(item.external_id.as_deref()),
            opt_cell(item.image.as_deref()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Write the CSV picklist (write to temp, then rename).
pub fn write_csv(path: &Path, items: &[LineItem]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CardpickError::io(parent, e))?;
    }
    let temp = path.with_extension("csv.tmp");
    std::fs::write(&temp, render_csv(items)).map_err(|e| CardpickError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| CardpickError::io(path, e))?;
    info!(path = %path.display(), rows = items.len(), "CSV picklist written");
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn write_picklist(path: &Path, picklist: &Picklist) -> Result<()> {
    JsonFile::new(path).save(picklist)?;
    info!(path = %path.display(), rows = picklist.items.len(), "JSON picklist written");
    Ok(())
}

/// Load a picklist written by [`write_picklist`].
pub fn read_picklist(path: &Path) -> Result<Picklist> {
    JsonFile::new(path)
        .load()?
        .ok_or_else(|| CardpickError::io(path, std::io::ErrorKind::NotFound.into()))
}

// ---------------------------------------------------------------------------
// High-value reminder
// ---------------------------------------------------------------------------

/// Items at or above `threshold`, most expensive first.
pub fn high_value_items(items: &[LineItem], threshold: f64) -> Vec<&LineItem> {
    let mut hits: Vec<&LineItem> = items.iter().filter(|i| i.unit_price >= threshold).collect();
    hits.sort_by(|a, b| b.unit_price.total_cmp(&a.unit_price));
    hits
}

/// The reminder text, or `None` when nothing qualifies.
pub fn high_value_reminder(items: &[LineItem], threshold: f64) -> Option<String> {
    let hits = high_value_items(items, threshold);
    if hits.is_empty() {
        return None;
    }

    let mut text = format!(
        "HIGH VALUE ALERT: {} cards worth ${threshold:.2}+ may be in binders:\n",
        hits.len()
    );
    for item in hits {
        text.push_str(&format!(
            "  - ${:.2} - {} [{}] (Order: {})\n",
            item.unit_price, item.name, item.set_code, item.order_label
        ));
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(name: &str, price: f64) -> LineItem {
        LineItem {
            order_id: "o1".into(),
            order_label: "#1001".into(),
            location: "Binder 1".into(),
            quantity: 1,
            name: name.into(),
            set_code: "MH2".into(),
            collector_number: "138".into(),
            condition: "NM".into(),
            finish: "nonfoil".into(),
            unit_price: price,
            catalog_sku: Some("556677".into()),
            external_id: None,
            image: None,
            market_price: None,
            rarity: None,
            type_line: None,
            colors: vec![],
        }
    }

    #[test]
    fn stem_uses_timestamp_and_filter_tag() {
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(
            output_stem(at, &OrderFilter::Unshipped),
            "2026-03-07_0905_orders_not-shipped"
        );
        assert_eq!(
            output_stem(at, &OrderFilter::MostRecent(20)),
            "2026-03-07_0905_orders_recent-20"
        );
    }

    #[test]
    fn csv_quotes_and_neutralizes() {
        assert_eq!(csv_escape("Ragavan, Nimble Pilferer"), "\"Ragavan, Nimble Pilferer\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(csv_escape("Opt"), "Opt");
    }

    #[test]
    fn leading_sign_only_neutralized_for_expressions() {
        assert_eq!(csv_escape("+2 Mace"), "+2 Mace");
        assert_eq!(csv_escape("-1 Rating"), "-1 Rating");
        assert_eq!(csv_escape("@SUM(A1)"), "'@SUM(A1)");
        assert_eq!(csv_escape("+1+1"), "'+1+1");
        assert_eq!(csv_escape("-cmd|' /C calc'!A0"), "'-cmd|' /C calc'!A0");
    }

    #[test]
    fn csv_has_header_and_na_for_missing() {
        let csv = render_csv(&[item("Ragavan, Nimble Pilferer", 54.5)]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "o1,#1001,Binder 1,1,\"Ragavan, Nimble Pilferer\",MH2,138,NM,nonfoil,54.50,556677,N/A,N/A"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn write_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let paths = output_paths(&dir.path().join("data"), "stem");
        let items = vec![item("Opt", 0.25)];

        write_csv(&paths.csv, &items).unwrap();
        assert!(std::fs::read_to_string(&paths.csv).unwrap().contains("Opt"));

        let picklist = Picklist::new(&OrderFilter::All, items.clone());
        write_picklist(&paths.json, &picklist).unwrap();
        let back = read_picklist(&paths.json).unwrap();
        assert_eq!(back.items, items);
        assert!(read_picklist(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn reminder_lists_expensive_first() {
        let items = vec![item("Opt", 0.25), item("Ragavan", 54.5), item("Bolt", 10.0)];
        let hits = high_value_items(&items, 10.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Ragavan");

        let text = high_value_reminder(&items, 10.0).unwrap();
        assert!(text.starts_with("HIGH VALUE ALERT: 2 cards"));
        assert!(text.contains("$54.50 - Ragavan [MH2] (Order: #1001)"));
        assert!(high_value_reminder(&items, 100.0).is_none());
    }
}
