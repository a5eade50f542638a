use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::UisError;

const API_URL: &str = "https://api.uis.unesco.org";

/// Geography level accepted by the data endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoUnitType {
    National,
    Regional,
}

impl GeoUnitType {
    fn as_str(self) -> &'static str {
        match self {
            GeoUnitType::National => "NATIONAL",
            GeoUnitType::Regional => "REGIONAL",
        }
    }
}

/// Parameters for the indicator-data endpoint. At least one indicator or
/// one geo unit must be set.
#[derive(Debug, Clone, Default)]
pub struct DataQuery {
    pub indicators: Vec<String>,
    pub geo_units: Vec<String>,
    pub start: Option<i32>,
    pub end: Option<i32>,
    pub indicator_metadata: bool,
    pub footnotes: bool,
    pub geo_unit_type: Option<GeoUnitType>,
    pub version: Option<String>,
}

impl DataQuery {
    pub fn validate(&self) -> Result<(), UisError> {
        if self.indicators.is_empty() && self.geo_units.is_empty() {
            return Err(UisError::InvalidQuery(
                "at least one indicator or one geo unit must be provided".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(UisError::InvalidQuery(format!(
                    "start year {start} is greater than end year {end}"
                )));
            }
        }
        Ok(())
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for indicator in &self.indicators {
            params.push(("indicator".to_string(), indicator.clone()));
        }
        for geo_unit in &self.geo_units {
            params.push(("geoUnit".to_string(), geo_unit.clone()));
        }
        if let Some(start) = self.start {
            params.push(("start".to_string(), start.to_string()));
        }
        if let Some(end) = self.end {
            params.push(("end".to_string(), end.to_string()));
        }
        params.push((
            "indicatorMetadata".to_string(),
            bool_param(self.indicator_metadata),
        ));
        params.push(("footnotes".to_string(), bool_param(self.footnotes)));
        if let Some(geo_unit_type) = self.geo_unit_type {
            if self.geo_units.is_empty() {
                params.push(("geoUnitType".to_string(), geo_unit_type.as_str().to_string()));
            } else {
                // the API ignores the type once explicit geo units are given
                warn!("both geo units and a geo unit type are set, ignoring the type");
            }
        }
        if let Some(version) = &self.version {
            params.push(("version".to_string(), version.clone()));
        }
        params
    }
}

fn version_params(version: Option<&str>) -> Vec<(String, String)> {
    version
        .map(|version| ("version".to_string(), version.to_string()))
        .into_iter()
        .collect()
}

fn bool_param(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Client for the UIS statistics API, the query-based alternative to the
/// bulk archives.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new() -> Result<Self, UisError> {
        Self::with_base_url(API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, UisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("uisr/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UisError::Transfer(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| UisError::Transfer(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Indicator data, optionally with per-point footnotes and indicator
    /// metadata. Oversized queries surface as `OverLimit`.
    pub fn data(&self, query: &DataQuery) -> Result<Json, UisError> {
        query.validate()?;
        self.get_json("/api/public/data/indicators", &query.params())
    }

    pub fn geo_units(&self, version: Option<&str>) -> Result<Json, UisError> {
        self.get_json("/api/public/definitions/geounits", &version_params(version))
    }

    pub fn indicators(
        &self,
        disaggregations: bool,
        glossary_terms: bool,
        version: Option<&str>,
    ) -> Result<Json, UisError> {
        let mut params = vec![
            ("disaggregations".to_string(), bool_param(disaggregations)),
            ("glossaryTerms".to_string(), bool_param(glossary_terms)),
        ];
        params.extend(version_params(version));
        self.get_json("/api/public/definitions/indicators", &params)
    }

    pub fn versions(&self) -> Result<Json, UisError> {
        self.get_json("/api/public/versions", &[])
    }

    pub fn default_version(&self) -> Result<Json, UisError> {
        self.get_json("/api/public/versions/default", &[])
    }

    fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Json, UisError> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(%url, params = params.len(), "querying UIS API");
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|err| UisError::Transfer(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| UisError::Transfer(err.to_string()))?;
        if let Some(err) = over_limit_error(status, &body) {
            return Err(err);
        }
        if !(200..300).contains(&status) {
            return Err(UisError::TransferStatus {
                status,
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|err| UisError::Parse(err.to_string()))
    }
}

/// Map the API's two over-limit signals onto a dedicated error: a 400 whose
/// message says too much data was requested, and a 414 for a query string
/// with too many parameters.
fn over_limit_error(status: u16, body: &str) -> Option<UisError> {
    match status {
        400 => {
            let message = serde_json::from_str::<Json>(body)
                .ok()?
                .get("message")?
                .as_str()?
                .to_string();
            message
                .contains("Too much data requested")
                .then_some(UisError::OverLimit(message))
        }
        414 => Some(UisError::OverLimit(
            "too many parameters passed to the API, reduce the number of indicators or geo units"
                .to_string(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn query_requires_indicator_or_geo_unit() {
        let err = DataQuery::default().validate().unwrap_err();
        assert_matches!(err, UisError::InvalidQuery(_));

        let query = DataQuery {
            indicators: vec!["CR.1".to_string()],
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn query_rejects_inverted_year_range() {
        let query = DataQuery {
            geo_units: vec!["FRA".to_string()],
            start: Some(2021),
            end: Some(2019),
            ..Default::default()
        };
        let err = query.validate().unwrap_err();
        assert_matches!(err, UisError::InvalidQuery(_));
    }

    #[test]
    fn params_cover_all_set_fields() {
        let query = DataQuery {
            indicators: vec!["CR.1".to_string(), "CR.2".to_string()],
            geo_units: Vec::new(),
            start: Some(2010),
            end: Some(2020),
            indicator_metadata: true,
            footnotes: false,
            geo_unit_type: Some(GeoUnitType::Regional),
            version: Some("20240910".to_string()),
        };
        let params = query.params();
        assert_eq!(
            params,
            vec![
                ("indicator".to_string(), "CR.1".to_string()),
                ("indicator".to_string(), "CR.2".to_string()),
                ("start".to_string(), "2010".to_string()),
                ("end".to_string(), "2020".to_string()),
                ("indicatorMetadata".to_string(), "true".to_string()),
                ("footnotes".to_string(), "false".to_string()),
                ("geoUnitType".to_string(), "REGIONAL".to_string()),
                ("version".to_string(), "20240910".to_string()),
            ]
        );
    }

    #[test]
    fn geo_unit_type_is_dropped_when_geo_units_are_set() {
        let query = DataQuery {
            geo_units: vec!["FRA".to_string()],
            geo_unit_type: Some(GeoUnitType::National),
            ..Default::default()
        };
        assert!(
            !query
                .params()
                .iter()
                .any(|(name, _)| name == "geoUnitType")
        );
    }

    #[test]
    fn over_limit_responses_are_classified() {
        let body = r#"{"message":"Too much data requested (224879 records), please reduce the amount of records queried","error":"Bad Request","statusCode":400}"#;
        assert_matches!(over_limit_error(400, body), Some(UisError::OverLimit(_)));
        assert_matches!(over_limit_error(414, ""), Some(UisError::OverLimit(_)));

        let other = r#"{"message":"Invalid indicator","statusCode":400}"#;
        assert!(over_limit_error(400, other).is_none());
        assert!(over_limit_error(500, "boom").is_none());
    }
}
