use crate::client::Prices;

/// First populated, finite price among `usd`, `usd_foil`, `eur`, `eur_foil`.
pub fn extract_price(prices: &Prices) -> Option<f64> {
    [&prices.usd, &prices.usd_foil, &prices.eur, &prices.eur_foil]
        .into_iter()
        .flatten()
        .find_map(|raw| raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_populated_field_wins() {
        let prices = Prices {
            usd: None,
            usd_foil: Some("4.10".into()),
            eur: Some("1.00".into()),
            eur_foil: None,
        };
        assert_eq!(extract_price(&prices), Some(4.10));
    }

    #[test]
    fn unparsable_values_are_skipped() {
        let prices = Prices {
            usd: Some("".into()),
            usd_foil: None,
            eur: Some("0.35".into()),
            eur_foil: None,
        };
        assert_eq!(extract_price(&prices), Some(0.35));
        assert_eq!(extract_price(&Prices::default()), None);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let prices = Prices {
            usd: Some("NaN".into()),
            usd_foil: Some("inf".into()),
            eur: Some("-infinity".into()),
            eur_foil: Some("2.50".into()),
        };
        assert_eq!(extract_price(&prices), Some(2.50));
    }
}
