//! Sanctions and PEP screening boundary
//!
//! The live lookup is an external collaborator. This module fixes the result
//! contract and ships a static provider used by tests and local environments.

use async_trait::async_trait;
use chrono::Utc;

use prodetect_database::entities::Customer;
use prodetect_errors::Result;

use crate::models::ScreeningOutcome;

/// Pluggable sanctions screening boundary
#[async_trait]
pub trait SanctionsScreeningProvider: Send + Sync {
    /// Screen a customer against sanctions, PEP and watchlist sources
    async fn screen(&self, customer: &Customer) -> Result<ScreeningOutcome>;
}

/// Provider returning a fixed screening outcome.
///
/// The default instance reports no hits across the standard source set.
pub struct StaticScreeningProvider {
    sanctions_hit: bool,
    pep_hit: bool,
    watchlist_hit: bool,
}

impl StaticScreeningProvider {
    pub fn clear() -> Self {
        Self {
            sanctions_hit: false,
            pep_hit: false,
            watchlist_hit: false,
        }
    }

    pub fn with_hits(sanctions_hit: bool, pep_hit: bool, watchlist_hit: bool) -> Self {
        Self {
            sanctions_hit,
            pep_hit,
            watchlist_hit,
        }
    }
}

impl Default for StaticScreeningProvider {
    fn default() -> Self {
        Self::clear()
    }
}

#[async_trait]
impl SanctionsScreeningProvider for StaticScreeningProvider {
    async fn screen(&self, _customer: &Customer) -> Result<ScreeningOutcome> {
        Ok(ScreeningOutcome {
            sanctions_hit: self.sanctions_hit,
            pep_hit: self.pep_hit,
            watchlist_hit: self.watchlist_hit,
            confidence_score: 0.95,
            sources_checked: vec![
                "UN".to_string(),
                "OFAC".to_string(),
                "EFCC".to_string(),
                "PEP_LIST".to_string(),
            ],
            screening_date: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_hit() {
        let clear = ScreeningOutcome {
            sanctions_hit: false,
            pep_hit: false,
            watchlist_hit: false,
            confidence_score: 0.95,
            sources_checked: vec![],
            screening_date: Utc::now(),
        };
        assert!(!clear.any_hit());

        let pep = ScreeningOutcome {
            pep_hit: true,
            ..clear.clone()
        };
        assert!(pep.any_hit());
    }
}
