//! Line item assembly: orders joined with locations and card lookups.

use cardpick_catalog::{CardSource, LookupCache};
use cardpick_shared::{CardIdentity, LineItem, Order, OrderLine};
use tracing::debug;

use crate::locations::{LocationPolicy, LocationResolver};

/// Which lookups assembly performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssembleOptions {
    /// Resolve an image reference for every line.
    pub images: bool,
    /// Resolve a market price for every line.
    pub prices: bool,
}

/// Reads through the resolver and the lookup cache; never writes their files.
pub struct LineItemAssembler<'a, P, S> {
    locations: &'a mut LocationResolver<P>,
    lookups: &'a mut LookupCache<S>,
    options: AssembleOptions,
}

impl<'a, P: LocationPolicy, S: CardSource> LineItemAssembler<'a, P, S> {
    pub fn new(
        locations: &'a mut LocationResolver<P>,
        lookups: &'a mut LookupCache<S>,
        options: AssembleOptions,
    ) -> Self {
        Self {
            locations,
            lookups,
            options,
        }
    }

    /// One line item per order line, in order.
    pub async fn assemble_order(&mut self, order: &Order) -> Vec<LineItem> {
        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            items.push(self.assemble_line(order, line).await);
        }
        debug!(order_id = %order.id, lines = items.len(), "order assembled");
        items
    }

    async fn assemble_line(&mut self, order: &Order, line: &OrderLine) -> LineItem {
        let card = &line.card;
        let identity = CardIdentity::from(card);
        let location = self.locations.resolve(&card.set_code);

        let image = if self.options.images {
            Some(self.lookups.resolve_image(&identity).await.to_field())
        } else {
            None
        };
        let market_price = if self.options.prices {
            self.lookups.resolve_price(&identity).await
        } else {
            None
        };
        let record = self.lookups.memoized(&identity);

        LineItem {
            order_id: order.id.clone(),
            order_label: order.label.clone(),
            location,
            quantity: line.quantity,
            name: card.name.clone(),
            set_code: card.set_code.clone(),
            collector_number: card.collector_number.clone(),
            condition: card.condition.clone(),
            finish: card.finish.clone(),
            unit_price: line.unit_price_cents as f64 / 100.0,
            catalog_sku: line.catalog_sku.clone(),
            external_id: record.and_then(|r| r.id.clone()),
            image,
            market_price,
            rarity: record.and_then(|r| r.rarity.clone()),
            type_line: record.and_then(|r| r.type_line.clone()),
            colors: record.and_then(|r| r.colors.clone()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cardpick_catalog::{CardRecord, ImageUris, LookupChain, Prices};
    use cardpick_shared::{CardRef, CardpickError, FulfillmentStatus, Result};

    use super::*;
    use crate::locations::AutoAssign;

    /// Answers every print lookup with one fixed record.
    struct OneCard {
        record: CardRecord,
    }

    impl CardSource for OneCard {
        async fn card_by_print(&self, _set: &str, _number: &str) -> Result<Option<CardRecord>> {
            Ok(Some(self.record.clone()))
        }
        async fn card_by_fuzzy_name(&self, _name: &str) -> Result<Option<CardRecord>> {
            Ok(None)
        }
        async fn search_name_in_set(&self, _n: &str, _s: &str) -> Result<Option<CardRecord>> {
            Ok(None)
        }
        async fn download(&self, uri: &str) -> Result<Vec<u8>> {
            Err(CardpickError::Network(format!("{uri}: offline")))
        }
    }

    fn order() -> Order {
        Order {
            id: "a1".into(),
            label: "#1001".into(),
            status: FulfillmentStatus::Unfulfilled,
            items: vec![OrderLine {
                quantity: 2,
                unit_price_cents: 1999,
                catalog_sku: Some("556677".into()),
                card: CardRef {
                    name: "Ragavan, Nimble Pilferer".into(),
                    set_code: "mh2".into(),
                    collector_number: "138".into(),
                    condition: "NM".into(),
                    finish: "nonfoil".into(),
                },
            }],
        }
    }

    fn record() -> CardRecord {
        CardRecord {
            id: Some("ragavan-id".into()),
            image_uris: Some(ImageUris {
                normal: Some("https://img.example/ragavan.jpg".into()),
            }),
            prices: Prices {
                usd: Some("54.10".into()),
                ..Default::default()
            },
            rarity: Some("mythic".into()),
            colors: Some(vec!["R".into()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn assembles_enriched_line_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut locations = LocationResolver::open(
            dir.path().join("locations.json"),
            AutoAssign {
                label: "Binder 4".into(),
            },
            "Unassigned",
        );
        let mut lookups = LookupCache::new(OneCard { record: record() }, LookupChain::default());
        let options = AssembleOptions {
            images: true,
            prices: true,
        };

        let items = LineItemAssembler::new(&mut locations, &mut lookups, options)
            .assemble_order(&order())
            .await;

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.location, "Binder 4");
        assert_eq!(item.unit_price, 19.99);
        assert_eq!(item.image.as_deref(), Some("https://img.example/ragavan.jpg"));
        assert_eq!(item.market_price, Some(54.10));
        assert_eq!(item.external_id.as_deref(), Some("ragavan-id"));
        assert_eq!(item.rarity.as_deref(), Some("mythic"));
        assert_eq!(item.colors, vec!["R".to_string()]);

        assert!(locations.save_if_changed().unwrap());
        let saved: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("locations.json")).unwrap())
                .unwrap();
        assert_eq!(saved.get("MH2").map(String::as_str), Some("Binder 4"));
    }

    #[tokio::test]
    async fn lookups_disabled_leaves_enrichment_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut locations = LocationResolver::open(
            dir.path().join("locations.json"),
            AutoAssign {
                label: "Binder 4".into(),
            },
            "Unassigned",
        );
        let mut lookups = LookupCache::new(OneCard { record: record() }, LookupChain::default());

        let items = LineItemAssembler::new(&mut locations, &mut lookups, AssembleOptions::default())
            .assemble_order(&order())
            .await;

        assert_eq!(items[0].image, None);
        assert_eq!(items[0].market_price, None);
        assert_eq!(items[0].external_id, None);
    }
}
