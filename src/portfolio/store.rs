//! In-memory portfolio store.

use dashmap::DashMap;
use std::sync::Arc;

use crate::portfolio::fixtures;
use crate::portfolio::types::Portfolio;

/// Portfolios keyed by slug.
#[derive(Clone, Default)]
pub struct PortfolioStore {
    portfolios: Arc<DashMap<String, Portfolio>>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the sample portfolios.
    pub fn with_samples() -> Self {
        let store = Self::new();
        for portfolio in fixtures::samples() {
            store.insert(portfolio);
        }
        store
    }

    /// Insert or replace by slug.
    pub fn insert(&self, portfolio: Portfolio) {
        self.portfolios.insert(portfolio.slug.clone(), portfolio);
    }

    pub fn get(&self, slug: &str) -> Option<Portfolio> {
        self.portfolios.get(slug).map(|r| r.value().clone())
    }

    /// All portfolios ordered by slug.
    pub fn list(&self) -> Vec<Portfolio> {
        let mut all: Vec<Portfolio> = self.portfolios.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }
}
