//! Ordered fallback lookup strategies.

use cardpick_shared::{CardIdentity, CardpickError, Result, is_missing};
use tracing::{debug, warn};

use crate::client::{CardRecord, CardSource};

/// One way of asking the reference service for a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Set code plus collector number.
    ExactPrint,
    /// Fuzzy match on the card name.
    FuzzyName,
    /// Name search restricted to the set.
    NameInSet,
}

impl LookupStrategy {
    /// Strategies whose inputs are missing are skipped.
    pub fn applies_to(&self, id: &CardIdentity) -> bool {
        match self {
            Self::ExactPrint => !is_missing(&id.set_code) && !is_missing(&id.collector_number),
            Self::FuzzyName => !is_missing(&id.name),
            Self::NameInSet => !is_missing(&id.name) && !is_missing(&id.set_code),
        }
    }

    async fn query<S: CardSource>(&self, source: &S, id: &CardIdentity) -> Result<Option<CardRecord>> {
        match self {
            Self::ExactPrint => source.card_by_print(&id.set_code, &id.collector_number).await,
            Self::FuzzyName => source.card_by_fuzzy_name(&id.name).await,
            Self::NameInSet => source.search_name_in_set(&id.name, &id.set_code).await,
        }
    }
}

impl std::str::FromStr for LookupStrategy {
    type Err = CardpickError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "exact-print" => Ok(Self::ExactPrint),
            "fuzzy" | "fuzzy-name" => Ok(Self::FuzzyName),
            "name-in-set" | "search" => Ok(Self::NameInSet),
            other => Err(CardpickError::config(format!(
                "unknown lookup strategy '{other}' (expected exact, fuzzy, or name-in-set)"
            ))),
        }
    }
}

/// Result of running a chain for one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(CardRecord),
    /// Every applicable strategy answered "not found".
    NotFound,
    /// No hit, and at least one strategy failed in transport.
    Unavailable,
}

impl Lookup {
    pub fn record(&self) -> Option<&CardRecord> {
        match self {
            Self::Found(r) => Some(r),
            _ => None,
        }
    }
}

/// An ordered list of strategies with early exit.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupChain {
    strategies: Vec<LookupStrategy>,
}

impl Default for LookupChain {
    fn default() -> Self {
        Self::new(vec![LookupStrategy::ExactPrint, LookupStrategy::FuzzyName])
    }
}

impl LookupChain {
    pub fn new(strategies: Vec<LookupStrategy>) -> Self {
        Self { strategies }
    }

    /// Parse strategy names as written in the config file.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let strategies = names
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<LookupStrategy>>>()?;
        if strategies.is_empty() {
            return Err(CardpickError::config("at least one lookup strategy is required"));
        }
        Ok(Self::new(strategies))
    }

    /// The same chain with `strategy` appended if absent.
    pub fn with(mut self, strategy: LookupStrategy) -> Self {
        if !self.strategies.contains(&strategy) {
            self.strategies.push(strategy);
        }
        self
    }

    pub fn strategies(&self) -> &[LookupStrategy] {
        &self.strategies
    }

    /// Try each applicable strategy in order; first hit wins. Never errors.
    pub async fn run<S: CardSource>(&self, source: &S, id: &CardIdentity) -> Lookup {
        let mut failed = false;

        for strategy in self.strategies.iter().filter(|s| s.applies_to(id)) {
            match strategy.query(source, id).await {
                Ok(Some(record)) => {
                    debug!(?strategy, name = %id.name, "card found");
                    return Lookup::Found(record);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(?strategy, name = %id.name, error = %e, "lookup failed");
                    failed = true;
                }
            }
        }

        if failed {
            warn!(name = %id.name, set = %id.set_code, number = %id.collector_number, "card lookup unavailable");
            Lookup::Unavailable
        } else {
            warn!(name = %id.name, set = %id.set_code, number = %id.collector_number, "card not found");
            Lookup::NotFound
        }
    }
}
