//! Johns Hopkins case adapters
//!
//! Two mirrors of the JHU data are supported. Both report cumulative case
//! totals, so daily new cases are the difference between consecutive days.
//!
//! - [`JhuHistory`]: `/v2/historical/{country}?lastdays=40`, totals keyed by
//!   `M/D/YY` date strings.
//! - [`JhuTimeline`]: `/api/timeline/{iso2}`, an array of dated snapshots. Its
//!   newest snapshot covers a partial day, which the metrics account for with
//!   a configurable index offset.

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use super::{
    daily_from_cumulative, parse_shape, CaseSeries, Domain, NormalizeError, SourceAdapter,
    SourceRequest,
};
use crate::catalog;

/// Base URL for the historical endpoint
const JHU_HISTORY_BASE_URL: &str = "https://corona.lmao.ninja/v2/historical";

/// Base URL for the timeline endpoint
const JHU_TIMELINE_BASE_URL: &str = "https://covid19-api.org/api/timeline";

/// Days of history requested from the historical endpoint
const HISTORY_DAYS: u32 = 40;

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    timeline: HistoricalTimeline,
}

#[derive(Debug, Deserialize)]
struct HistoricalTimeline {
    cases: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    last_update: Option<String>,
    cases: Option<i64>,
}

/// Adapter for the JHU historical endpoint
#[derive(Debug, Clone)]
pub struct JhuHistory {
    base_url: String,
}

impl Default for JhuHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl JhuHistory {
    pub fn new() -> Self {
        Self {
            base_url: JHU_HISTORY_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SourceAdapter for JhuHistory {
    type Record = CaseSeries;

    fn domain(&self) -> Domain {
        Domain::GlobalCases
    }

    fn request(&self, key: &str, _today: NaiveDate) -> Result<SourceRequest, NormalizeError> {
        let url = Url::parse_with_params(
            &format!("{}/{}", self.base_url, key),
            &[("lastdays", HISTORY_DAYS.to_string())],
        )
        .map_err(|e| NormalizeError::InvalidUrl(e.to_string()))?;

        Ok(SourceRequest {
            url: url.to_string(),
            shared: false,
        })
    }

    fn normalize(&self, key: &str, raw: &Value) -> Result<CaseSeries, NormalizeError> {
        if raw.get("timeline").is_none() {
            return Err(NormalizeError::MissingField("timeline".to_string()));
        }
        let response: HistoricalResponse = parse_shape(raw)?;

        let mut points = response
            .timeline
            .cases
            .iter()
            .map(|(date_str, total)| Ok((parse_us_date(date_str)?, *total)))
            .collect::<Result<Vec<(NaiveDate, i64)>, NormalizeError>>()?;
        points.sort_by(|a, b| b.0.cmp(&a.0));

        let last_updated_date = points
            .first()
            .map(|(day, _)| *day)
            .ok_or_else(|| NormalizeError::EmptySeries(key.to_string()))?;

        Ok(CaseSeries {
            daily_new_cases: daily_from_cumulative(&points)?,
            last_updated_date,
        })
    }
}

/// Adapter for the JHU timeline endpoint
#[derive(Debug, Clone)]
pub struct JhuTimeline {
    base_url: String,
}

impl Default for JhuTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl JhuTimeline {
    pub fn new() -> Self {
        Self {
            base_url: JHU_TIMELINE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SourceAdapter for JhuTimeline {
    type Record = CaseSeries;

    fn domain(&self) -> Domain {
        Domain::GlobalTimeline
    }

    /// The timeline endpoint is keyed by ISO-2 code
    fn request(&self, key: &str, _today: NaiveDate) -> Result<SourceRequest, NormalizeError> {
        let country =
            catalog::country(key).ok_or_else(|| NormalizeError::UnknownEntity(key.to_string()))?;
        let url = Url::parse(&format!("{}/{}", self.base_url, country.iso2))
            .map_err(|e| NormalizeError::InvalidUrl(e.to_string()))?;

        Ok(SourceRequest {
            url: url.to_string(),
            shared: false,
        })
    }

    fn normalize(&self, key: &str, raw: &Value) -> Result<CaseSeries, NormalizeError> {
        let entries: Vec<TimelineEntry> = parse_shape(raw)?;

        let mut points = entries
            .into_iter()
            .map(|entry| {
                let stamp = entry
                    .last_update
                    .ok_or_else(|| NormalizeError::MissingField("last_update".to_string()))?;
                let cases = entry
                    .cases
                    .ok_or_else(|| NormalizeError::MissingField("cases".to_string()))?;
                Ok((parse_iso_day(&stamp)?, cases))
            })
            .collect::<Result<Vec<(NaiveDate, i64)>, NormalizeError>>()?;
        // Upstream is newest first; keep the newest snapshot of a repeated day
        points.sort_by(|a, b| b.0.cmp(&a.0));
        points.dedup_by_key(|(day, _)| *day);

        let last_updated_date = points
            .first()
            .map(|(day, _)| *day)
            .ok_or_else(|| NormalizeError::EmptySeries(key.to_string()))?;

        Ok(CaseSeries {
            daily_new_cases: daily_from_cumulative(&points)?,
            last_updated_date,
        })
    }
}

/// Parses the `M/D/YY` keys of the historical endpoint
fn parse_us_date(date_str: &str) -> Result<NaiveDate, NormalizeError> {
    NaiveDate::parse_from_str(date_str, "%m/%d/%y")
        .map_err(|_| NormalizeError::InvalidDate(date_str.to_string()))
}

/// Parses the calendar day of an ISO 8601 timestamp such as `2021-05-20T02:21:05`
fn parse_iso_day(stamp: &str) -> Result<NaiveDate, NormalizeError> {
    stamp
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| NormalizeError::InvalidDate(stamp.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, 21).unwrap()
    }

    #[test]
    fn test_history_request_asks_for_forty_days() {
        let request = JhuHistory::new().request("DEU", today()).unwrap();
        assert_eq!(
            request.url,
            "https://corona.lmao.ninja/v2/historical/DEU?lastdays=40"
        );
        assert!(!request.shared);
    }

    #[test]
    fn test_history_normalize_differences_cumulative_totals() {
        let raw = json!({
            "country": "Germany",
            "timeline": {
                "cases": {
                    "5/16/21": 100,
                    "5/17/21": 110,
                    "5/18/21": 125,
                    "5/19/21": 130,
                    "5/20/21": 150
                },
                "deaths": {}
            }
        });

        let series = JhuHistory::new().normalize("DEU", &raw).unwrap();

        assert_eq!(series.daily_new_cases, vec![20, 5, 15, 10]);
        assert_eq!(
            series.last_updated_date,
            NaiveDate::from_ymd_opt(2021, 5, 20).unwrap()
        );
    }

    #[test]
    fn test_history_normalize_requires_timeline() {
        let raw = json!({ "message": "Country not found or doesn't have any historical data" });
        assert!(matches!(
            JhuHistory::new().normalize("XYZ", &raw),
            Err(NormalizeError::MissingField(_))
        ));
    }

    #[test]
    fn test_history_normalize_rejects_bad_date_keys() {
        let raw = json!({ "timeline": { "cases": { "2021-05-20": 1, "5/19/21": 0 } } });
        assert!(matches!(
            JhuHistory::new().normalize("DEU", &raw),
            Err(NormalizeError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_timeline_request_uses_iso2() {
        let request = JhuTimeline::new().request("DEU", today()).unwrap();
        assert_eq!(request.url, "https://covid19-api.org/api/timeline/DE");

        assert!(matches!(
            JhuTimeline::new().request("XYZ", today()),
            Err(NormalizeError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_timeline_normalize_keeps_newest_snapshot_per_day() {
        let raw = json!([
            { "country": "DE", "last_update": "2021-05-20T20:00:00", "cases": 160 },
            { "country": "DE", "last_update": "2021-05-20T02:00:00", "cases": 150 },
            { "country": "DE", "last_update": "2021-05-19T02:00:00", "cases": 130 },
            { "country": "DE", "last_update": "2021-05-18T02:00:00", "cases": 125 }
        ]);

        let series = JhuTimeline::new().normalize("DEU", &raw).unwrap();

        assert_eq!(series.daily_new_cases, vec![30, 5]);
        assert_eq!(
            series.last_updated_date,
            NaiveDate::from_ymd_opt(2021, 5, 20).unwrap()
        );
    }

    #[test]
    fn test_timeline_normalize_fails_on_missing_cases() {
        let raw = json!([
            { "last_update": "2021-05-20T02:00:00" },
            { "last_update": "2021-05-19T02:00:00", "cases": 1 }
        ]);
        assert!(matches!(
            JhuTimeline::new().normalize("DEU", &raw),
            Err(NormalizeError::MissingField(_))
        ));
    }
}
