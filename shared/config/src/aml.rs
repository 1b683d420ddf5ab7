//! AML monitoring configuration

use serde::{Deserialize, Serialize};
use validator::Validate;

use prodetect_common::aml;

/// Thresholds and jurisdiction settings for the monitoring engine.
///
/// Defaults carry the CBN-mandated values; deployments override them through
/// configuration rather than code.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AmlConfig {
    /// Currency Transaction Report threshold in NGN
    #[validate(range(min = 1))]
    pub ctr_threshold: i64,

    /// Default amount threshold for rule-based monitoring
    #[validate(range(min = 1))]
    pub default_amount_threshold: i64,

    /// Default cash transaction monitoring threshold
    #[validate(range(min = 1))]
    pub default_cash_threshold: i64,

    /// Velocity cap: transaction count over 24 hours
    #[validate(range(min = 1))]
    pub velocity_count_24h: u64,

    /// Velocity cap: aggregate amount over 24 hours in NGN
    #[validate(range(min = 1))]
    pub velocity_amount_24h: i64,

    /// Lower bound of the structuring band as a fraction of the CTR threshold
    pub structuring_band_low: f64,

    /// Upper bound of the structuring band as a fraction of the CTR threshold
    pub structuring_band_high: f64,

    /// Minimum number of in-band transactions before structuring is flagged
    #[validate(range(min = 2))]
    pub structuring_min_count: usize,

    /// Home jurisdiction (ISO 3166-1 alpha-2)
    #[validate(length(equal = 2))]
    pub home_country: String,

    /// High-risk jurisdictions for cross-border monitoring
    pub sanctioned_countries: Vec<String>,

    /// Institution name stamped into regulator filings
    #[validate(length(min = 1))]
    pub filing_institution: String,
}

impl AmlConfig {
    pub fn is_sanctioned_country(&self, country: &str) -> bool {
        self.sanctioned_countries.iter().any(|c| c == country)
    }
}

impl Default for AmlConfig {
    fn default() -> Self {
        Self {
            ctr_threshold: aml::CTR_THRESHOLD_NGN,
            default_amount_threshold: aml::DEFAULT_AMOUNT_THRESHOLD_NGN,
            default_cash_threshold: aml::DEFAULT_CASH_THRESHOLD_NGN,
            velocity_count_24h: aml::VELOCITY_COUNT_24H,
            velocity_amount_24h: aml::VELOCITY_AMOUNT_24H_NGN,
            structuring_band_low: aml::STRUCTURING_BAND_LOW,
            structuring_band_high: aml::STRUCTURING_BAND_HIGH,
            structuring_min_count: aml::STRUCTURING_MIN_COUNT,
            home_country: aml::HOME_COUNTRY.to_string(),
            sanctioned_countries: aml::HIGH_RISK_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            filing_institution: "ProDetect Bank".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cbn_values() {
        let config = AmlConfig::default();
        assert_eq!(config.ctr_threshold, 5_000_000);
        assert_eq!(config.default_amount_threshold, 1_000_000);
        assert_eq!(config.default_cash_threshold, 500_000);
        assert_eq!(config.velocity_count_24h, 50);
        assert_eq!(config.velocity_amount_24h, 10_000_000);
        assert!(config.is_sanctioned_country("IR"));
        assert!(!config.is_sanctioned_country("NG"));
    }
}
