use chrono::{DateTime, Utc};

use crate::api::ApiError;

/// Fetch lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Consumer-visible state of one cached resource.
///
/// `data` holds the last successful payload and is never cleared by a later
/// refresh or failure. `placeholder` stands in until the first success.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: Option<T>,
    pub status: QueryStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub error: Option<ApiError>,
    placeholder: Option<T>,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(key: &str, placeholder: Option<T>) -> Self {
        Self {
            key: key.to_string(),
            data: None,
            status: QueryStatus::Idle,
            last_updated: None,
            error: None,
            placeholder,
        }
    }

    pub(crate) fn set_placeholder(&mut self, placeholder: T) -> bool {
        if self.placeholder.is_some() {
            return false;
        }
        self.placeholder = Some(placeholder);
        self.data.is_none()
    }

    /// What a consumer should display: the last good payload, or the
    /// placeholder if no fetch has succeeded yet.
    pub fn value(&self) -> Option<&T> {
        self.data.as_ref().or(self.placeholder.as_ref())
    }

    pub fn is_placeholder(&self) -> bool {
        self.data.is_none() && self.placeholder.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// A fetch has finished (either way) and none is running.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }

    /// Failed, but still holding an earlier good payload.
    pub fn is_stale_with_error(&self) -> bool {
        self.status == QueryStatus::Error && self.data.is_some()
    }

    /// Status to fall back to when a running fetch is abandoned.
    pub(crate) fn resting_status(&self) -> QueryStatus {
        if self.error.is_some() {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        }
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.last_updated
            .map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry_updated(ago: Duration) -> CacheEntry<u32> {
        let mut entry = CacheEntry::new("k", None);
        entry.data = Some(1);
        entry.last_updated = Some(Utc::now() - ago);
        entry
    }

    #[test]
    fn test_age_display() {
        assert_eq!(CacheEntry::<u32>::new("k", None).age_display(), "never");
        assert_eq!(entry_updated(Duration::seconds(5)).age_display(), "just now");
        assert_eq!(entry_updated(Duration::minutes(5)).age_display(), "5m ago");
        assert_eq!(entry_updated(Duration::minutes(90)).age_display(), "2h ago");
        assert_eq!(entry_updated(Duration::minutes(70)).age_display(), "1h ago");
        assert_eq!(entry_updated(Duration::hours(36)).age_display(), "2d ago");
        assert_eq!(entry_updated(Duration::seconds(-30)).age_display(), "just now");
    }

    #[test]
    fn test_placeholder_until_first_success() {
        let mut entry = CacheEntry::new("devices", Some(vec!["demo"]));
        assert!(entry.is_placeholder());
        assert_eq!(entry.value(), Some(&vec!["demo"]));

        entry.data = Some(vec![]);
        assert!(!entry.is_placeholder());
        assert_eq!(entry.value(), Some(&vec![]));
    }

    #[test]
    fn test_set_placeholder_keeps_first() {
        let mut entry = CacheEntry::new("k", None);
        assert!(entry.set_placeholder(1));
        assert!(!entry.set_placeholder(2));
        assert_eq!(entry.value(), Some(&1));
    }

    #[test]
    fn test_resting_status() {
        let mut entry: CacheEntry<u32> = CacheEntry::new("k", None);
        assert_eq!(entry.resting_status(), QueryStatus::Idle);
        entry.data = Some(3);
        assert_eq!(entry.resting_status(), QueryStatus::Success);
        entry.error = Some(ApiError::NetworkUnavailable("down".into()));
        assert_eq!(entry.resting_status(), QueryStatus::Error);
    }
}
