//! Constants used across ProDetect services

/// Application constants
pub mod app {
    pub const NAME: &str = "ProDetect";
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const DESCRIPTION: &str = "AML monitoring, case management and regulatory reporting core";
}

/// Regulatory monetary thresholds (minor units of NGN)
pub mod aml {
    /// Currency Transaction Report threshold mandated by the CBN.
    pub const CTR_THRESHOLD_NGN: i64 = 5_000_000;

    /// Default amount threshold for rule-based monitoring.
    pub const DEFAULT_AMOUNT_THRESHOLD_NGN: i64 = 1_000_000;

    /// Default threshold for cash transaction monitoring.
    pub const DEFAULT_CASH_THRESHOLD_NGN: i64 = 500_000;

    /// Velocity caps over a rolling 24 hour window.
    pub const VELOCITY_COUNT_24H: u64 = 50;
    pub const VELOCITY_AMOUNT_24H_NGN: i64 = 10_000_000;

    /// Structuring band, expressed as fractions of the CTR threshold.
    pub const STRUCTURING_BAND_LOW: f64 = 0.8;
    pub const STRUCTURING_BAND_HIGH: f64 = 0.99;
    pub const STRUCTURING_MIN_COUNT: usize = 3;

    /// Transaction risk score at or above which a transaction is suspicious.
    pub const SUSPICIOUS_SCORE: f64 = 60.0;

    /// Customer risk category partition points.
    pub const HIGH_RISK_SCORE: f64 = 70.0;
    pub const MEDIUM_RISK_SCORE: f64 = 40.0;

    /// FATF high-risk jurisdictions monitored for cross-border flows.
    pub const HIGH_RISK_COUNTRIES: [&str; 4] = ["AF", "IR", "KP", "SY"];

    /// Home jurisdiction for cross-border determination.
    pub const HOME_COUNTRY: &str = "NG";
}

/// Audit retention and classification defaults
pub mod audit {
    /// Minimum retention in years (CBN requirement).
    pub const RETENTION_YEARS: i32 = 5;

    /// Default search result bound.
    pub const DEFAULT_SEARCH_LIMIT: u64 = 100;
}

/// Database defaults
pub mod database {
    pub const DEFAULT_PAGE_SIZE: u64 = 50;
    pub const MAX_PAGE_SIZE: u64 = 1000;
    pub const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_CONNECTIONS: u32 = 100;
    pub const MIN_CONNECTIONS: u32 = 5;
}
