//! Robert Koch Institute district adapters
//!
//! The district snapshot is found with a spatial point query built from the
//! region's coordinate. Its official district id ("RS") then keys the case
//! history query, which returns one record per reporting batch; those are
//! summed per reporting day.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use super::{
    parse_shape, sum_by_day, CaseSeries, DistrictSnapshot, Domain, NormalizeError, SourceAdapter,
    SourceRequest,
};
use crate::catalog;

/// ArcGIS layer with the current figures per district
const RKI_DISTRICTS_URL: &str = "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/RKI_Landkreisdaten/FeatureServer/0/query";

/// ArcGIS layer with the individual case reports
const RKI_CASES_URL: &str =
    "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services/RKI_COVID19/FeatureServer/0/query";

/// Days before the reference day covered by the history query
const HISTORY_WINDOW_DAYS: i64 = 15;

#[derive(Debug, Deserialize)]
struct FeatureSet<A> {
    features: Vec<Feature<A>>,
}

#[derive(Debug, Deserialize)]
struct Feature<A> {
    attributes: A,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct DistrictAttributes {
    RS: Option<String>,
    GEN: Option<String>,
    cases7_per_100k: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct CaseAttributes {
    /// Reporting day as a UNIX timestamp in milliseconds
    Meldedatum: Option<i64>,
    AnzahlFall: Option<i64>,
}

/// Adapter for the district snapshot layer
#[derive(Debug, Clone)]
pub struct RkiDistrictSnapshot {
    url: String,
}

impl Default for RkiDistrictSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RkiDistrictSnapshot {
    pub fn new() -> Self {
        Self {
            url: RKI_DISTRICTS_URL.to_string(),
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SourceAdapter for RkiDistrictSnapshot {
    type Record = DistrictSnapshot;

    fn domain(&self) -> Domain {
        Domain::LocalSnapshot
    }

    fn request(&self, key: &str, _today: NaiveDate) -> Result<SourceRequest, NormalizeError> {
        let region =
            catalog::region(key).ok_or_else(|| NormalizeError::UnknownEntity(key.to_string()))?;
        let geometry = format!("{:.3},{:.3}", region.longitude, region.latitude);

        let url = Url::parse_with_params(
            &self.url,
            &[
                ("where", "1=1"),
                ("outFields", "RS,GEN,cases7_per_100k"),
                ("geometry", geometry.as_str()),
                ("geometryType", "esriGeometryPoint"),
                ("inSR", "4326"),
                ("spatialRel", "esriSpatialRelWithin"),
                ("returnGeometry", "false"),
                ("outSR", "4326"),
                ("f", "json"),
            ],
        )
        .map_err(|e| NormalizeError::InvalidUrl(e.to_string()))?;

        Ok(SourceRequest {
            url: url.to_string(),
            shared: false,
        })
    }

    fn normalize(&self, key: &str, raw: &Value) -> Result<DistrictSnapshot, NormalizeError> {
        if raw.get("features").is_none() {
            return Err(NormalizeError::MissingField("features".to_string()));
        }
        let set: FeatureSet<DistrictAttributes> = parse_shape(raw)?;
        let attributes = set
            .features
            .into_iter()
            .next()
            .map(|feature| feature.attributes)
            .ok_or_else(|| NormalizeError::UnknownEntity(key.to_string()))?;

        Ok(DistrictSnapshot {
            district_id: attributes
                .RS
                .ok_or_else(|| NormalizeError::MissingField("RS".to_string()))?,
            name: attributes
                .GEN
                .ok_or_else(|| NormalizeError::MissingField("GEN".to_string()))?,
            cases7_per_100k: attributes
                .cases7_per_100k
                .ok_or_else(|| NormalizeError::MissingField("cases7_per_100k".to_string()))?,
        })
    }
}

/// Adapter for the case report layer
///
/// Needs the district id of every region it loads, taken from the snapshot
/// records of the same run.
#[derive(Debug, Clone)]
pub struct RkiDistrictHistory {
    url: String,
    /// Region key to official district id
    districts: HashMap<String, String>,
}

impl RkiDistrictHistory {
    pub fn new(districts: HashMap<String, String>) -> Self {
        Self {
            url: RKI_CASES_URL.to_string(),
            districts,
        }
    }

    pub fn with_url(url: impl Into<String>, districts: HashMap<String, String>) -> Self {
        Self {
            url: url.into(),
            districts,
        }
    }
}

impl SourceAdapter for RkiDistrictHistory {
    type Record = CaseSeries;

    fn domain(&self) -> Domain {
        Domain::LocalHistory
    }

    fn request(&self, key: &str, today: NaiveDate) -> Result<SourceRequest, NormalizeError> {
        let district_id = self
            .districts
            .get(key)
            .ok_or_else(|| NormalizeError::UnknownEntity(format!("district id of {}", key)))?;
        let from = today - Duration::days(HISTORY_WINDOW_DAYS);
        let until = today + Duration::days(1);
        let filter = format!(
            "IdLandkreis = '{}' AND Meldedatum >= TIMESTAMP '{} 00:00:00' AND Meldedatum <= TIMESTAMP '{} 00:00:00'",
            district_id,
            from.format("%Y-%m-%d"),
            until.format("%Y-%m-%d")
        );

        let url = Url::parse_with_params(
            &self.url,
            &[
                ("where", filter.as_str()),
                ("outFields", "Landkreis,Meldedatum,AnzahlFall"),
                ("outSR", "4326"),
                ("f", "json"),
            ],
        )
        .map_err(|e| NormalizeError::InvalidUrl(e.to_string()))?;

        Ok(SourceRequest {
            url: url.to_string(),
            shared: false,
        })
    }

    fn normalize(&self, key: &str, raw: &Value) -> Result<CaseSeries, NormalizeError> {
        if raw.get("features").is_none() {
            return Err(NormalizeError::MissingField("features".to_string()));
        }
        let set: FeatureSet<CaseAttributes> = parse_shape(raw)?;

        let reports = set
            .features
            .into_iter()
            .map(|feature| {
                let stamp = feature
                    .attributes
                    .Meldedatum
                    .ok_or_else(|| NormalizeError::MissingField("Meldedatum".to_string()))?;
                let count = feature
                    .attributes
                    .AnzahlFall
                    .ok_or_else(|| NormalizeError::MissingField("AnzahlFall".to_string()))?;
                let day = DateTime::from_timestamp_millis(stamp)
                    .ok_or_else(|| NormalizeError::InvalidDate(stamp.to_string()))?
                    .date_naive();
                Ok((day, count))
            })
            .collect::<Result<Vec<(NaiveDate, i64)>, NormalizeError>>()?;

        let per_day = fill_missing_days(&sum_by_day(reports));
        let last_updated_date = per_day
            .first()
            .map(|(day, _)| *day)
            .ok_or_else(|| NormalizeError::EmptySeries(key.to_string()))?;

        Ok(CaseSeries {
            daily_new_cases: per_day.into_iter().map(|(_, count)| count).collect(),
            last_updated_date,
        })
    }
}

/// Inserts a zero for every day without a single case report
///
/// Input and output are newest first.
fn fill_missing_days(per_day: &[(NaiveDate, i64)]) -> Vec<(NaiveDate, i64)> {
    let mut filled = Vec::with_capacity(per_day.len());
    for (day, count) in per_day {
        if let Some((previous_day, _)) = filled.last().copied() {
            let mut gap_day: NaiveDate = previous_day - Duration::days(1);
            while gap_day > *day {
                filled.push((gap_day, 0));
                gap_day = gap_day - Duration::days(1);
            }
        }
        filled.push((*day, *count));
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn millis(s: &str) -> i64 {
        day(s).and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis()
    }

    #[test]
    fn test_snapshot_request_uses_coordinate_lookup() {
        let request = RkiDistrictSnapshot::new()
            .request("A", day("2021-05-21"))
            .unwrap();

        let url = Url::parse(&request.url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["geometry"], "10.898,48.366");
        assert_eq!(params["outFields"], "RS,GEN,cases7_per_100k");
        assert_eq!(params["spatialRel"], "esriSpatialRelWithin");
    }

    #[test]
    fn test_snapshot_request_fails_for_unknown_region() {
        assert!(matches!(
            RkiDistrictSnapshot::new().request("HH", day("2021-05-21")),
            Err(NormalizeError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_snapshot_normalize_takes_first_feature() {
        let raw = json!({
            "features": [
                { "attributes": { "RS": "09772", "GEN": "Augsburg", "cases7_per_100k": 87.25 } }
            ]
        });

        let snapshot = RkiDistrictSnapshot::new().normalize("A", &raw).unwrap();

        assert_eq!(snapshot.district_id, "09772");
        assert_eq!(snapshot.name, "Augsburg");
        assert!((snapshot.cases7_per_100k - 87.25).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_normalize_fails_without_features() {
        let empty = json!({ "features": [] });
        let error = json!({ "error": { "code": 400 } });
        assert!(RkiDistrictSnapshot::new().normalize("A", &empty).is_err());
        assert!(matches!(
            RkiDistrictSnapshot::new().normalize("A", &error),
            Err(NormalizeError::MissingField(_))
        ));
    }

    #[test]
    fn test_history_request_filters_by_district_and_window() {
        let districts = HashMap::from([("A".to_string(), "09772".to_string())]);
        let request = RkiDistrictHistory::new(districts)
            .request("A", day("2021-05-21"))
            .unwrap();

        let url = Url::parse(&request.url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(
            params["where"],
            "IdLandkreis = '09772' AND Meldedatum >= TIMESTAMP '2021-05-06 00:00:00' AND Meldedatum <= TIMESTAMP '2021-05-22 00:00:00'"
        );
    }

    #[test]
    fn test_history_request_needs_district_id() {
        let history = RkiDistrictHistory::new(HashMap::new());
        assert!(matches!(
            history.request("A", day("2021-05-21")),
            Err(NormalizeError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_history_normalize_sums_reports_per_day() {
        let raw = json!({
            "features": [
                { "attributes": { "Landkreis": "SK Augsburg", "Meldedatum": millis("2021-01-01"), "AnzahlFall": 3 } },
                { "attributes": { "Landkreis": "SK Augsburg", "Meldedatum": millis("2021-01-01"), "AnzahlFall": 2 } },
                { "attributes": { "Landkreis": "SK Augsburg", "Meldedatum": millis("2021-01-02"), "AnzahlFall": 5 } }
            ]
        });

        let series = RkiDistrictHistory::new(HashMap::new())
            .normalize("A", &raw)
            .unwrap();

        assert_eq!(series.daily_new_cases, vec![5, 5]);
        assert_eq!(series.last_updated_date, day("2021-01-02"));
    }

    #[test]
    fn test_history_normalize_fills_days_without_reports() {
        let raw = json!({
            "features": [
                { "attributes": { "Meldedatum": millis("2021-01-04"), "AnzahlFall": 4 } },
                { "attributes": { "Meldedatum": millis("2021-01-01"), "AnzahlFall": 1 } }
            ]
        });

        let series = RkiDistrictHistory::new(HashMap::new())
            .normalize("A", &raw)
            .unwrap();

        assert_eq!(series.daily_new_cases, vec![4, 0, 0, 1]);
    }

    #[test]
    fn test_history_normalize_fails_on_empty_response() {
        let raw = json!({ "features": [] });
        assert!(matches!(
            RkiDistrictHistory::new(HashMap::new()).normalize("A", &raw),
            Err(NormalizeError::EmptySeries(_))
        ));
    }
}
