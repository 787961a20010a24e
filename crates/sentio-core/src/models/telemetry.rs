use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default look-back window for every time-ranged query.
const DEFAULT_RANGE_HOURS: i64 = 1;

const DEFAULT_METRICS_STEP: &str = "15s";
const DEFAULT_LOGS_LIMIT: u32 = 100;
const DEFAULT_TRACES_LIMIT: u32 = 50;

fn last_hour() -> (DateTime<Utc>, DateTime<Utc>) {
    let end = Utc::now();
    (end - Duration::hours(DEFAULT_RANGE_HOURS), end)
}

/// Body for `POST /metrics/query`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MetricsQuery {
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: String,
}

impl MetricsQuery {
    /// Query over the last hour at the default 15s step.
    pub fn new(query: impl Into<String>) -> Self {
        let (start, end) = last_hour();
        Self {
            query: query.into(),
            start,
            end,
            step: DEFAULT_METRICS_STEP.to_string(),
        }
    }

    pub fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }
}

/// Body for `POST /logs/query`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LogsQuery {
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: u32,
}

impl LogsQuery {
    pub fn new(query: impl Into<String>) -> Self {
        let (start, end) = last_hour();
        Self {
            query: query.into(),
            start,
            end,
            limit: DEFAULT_LOGS_LIMIT,
        }
    }

    pub fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Body for `POST /traces/query`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TracesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: u32,
}

impl Default for TracesQuery {
    fn default() -> Self {
        let (start, end) = last_hour();
        Self {
            service: None,
            operation: None,
            start,
            end,
            limit: DEFAULT_TRACES_LIMIT,
        }
    }
}

impl TracesQuery {
    pub fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_query_defaults_to_last_hour() {
        let q = MetricsQuery::new("up");
        assert_eq!(q.step, "15s");
        assert_eq!((q.end - q.start).num_minutes(), 60);
    }

    #[test]
    fn test_traces_query_omits_unset_filters() {
        let body = serde_json::to_value(TracesQuery::default().limit(10)).unwrap();
        assert!(body.get("service").is_none());
        assert!(body.get("operation").is_none());
        assert_eq!(body["limit"], 10);

        let body = serde_json::to_value(TracesQuery::default().service("gateway")).unwrap();
        assert_eq!(body["service"], "gateway");
    }

    #[test]
    fn test_logs_query_limit() {
        let q = LogsQuery::new(r#"{job="sentio"}"#);
        assert_eq!(q.limit, 100);
        assert_eq!(q.limit(5).limit, 5);
    }
}
