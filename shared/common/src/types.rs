//! Common types used across ProDetect services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated caller identity supplied by the external identity provider.
///
/// The AML core only reads from the principal; it never creates or mutates
/// identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl Principal {
    pub fn new(id: Uuid, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            role: role.into(),
        }
    }

    /// System principal used by scheduled sweeps (SLA scans, seeding).
    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            email: "system@prodetect.internal".to_string(),
            role: "system".to_string(),
        }
    }
}

/// Inclusive date range used by reporting and forensics queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Sort order for listing queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_system_principal_is_nil() {
        let principal = Principal::system();
        assert!(principal.id.is_nil());
        assert_eq!(principal.role, "system");
    }

    #[test]
    fn test_date_range_contains_bounds() {
        let start = Utc::now();
        let end = start + Duration::days(7);
        let range = DateRange::new(start, end);

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + Duration::seconds(1)));
    }
}
