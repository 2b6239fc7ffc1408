//! Typed records for OpenAQ v3 payloads.
//!
//! Wire keys are camelCase; fields are snake_case. Keys the client does not
//! know about are ignored so that additive API changes do not break
//! deserialization. Nullable wire fields are `Option`.

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Mapping and JSON views shared by every response object.
pub trait ApiObject: Serialize + DeserializeOwned {
    /// Field name to value mapping, using the wire key names.
    fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).map_err(Error::Json)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Json(serde::ser::Error::custom(format!(
                "expected a JSON object, got {other}"
            )))),
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Json)
    }

    fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Json)
    }

    fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::Json)
    }
}

/// Records that carry an API identifier, in both their nested (base) and
/// full forms.
pub trait Identified {
    fn id(&self) -> u32;
    fn name(&self) -> Option<&str>;
}

/// Total-found count from `meta.found`.
///
/// Large result sets report a lower bound (`">1000"`) instead of an exact
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    count: u64,
    exact: bool,
}

impl Found {
    pub fn exact(count: u64) -> Self {
        Self { count, exact: true }
    }

    pub fn at_least(count: u64) -> Self {
        Self {
            count,
            exact: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }
}

impl Serialize for Found {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.exact {
            serializer.serialize_u64(self.count)
        } else {
            serializer.serialize_str(&format!(">{}", self.count))
        }
    }
}

impl<'de> Deserialize<'de> for Found {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(count) => Ok(Found::exact(count)),
            Raw::Text(text) => {
                let text = text.trim();
                let (digits, exact) = match text.strip_prefix('>') {
                    Some(rest) => (rest.trim(), false),
                    None => (text, true),
                };
                let count = digits.parse::<u64>().map_err(|_| {
                    serde::de::Error::custom(format!("invalid found value {text:?}"))
                })?;
                Ok(Found { count, exact })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub name: String,
    pub website: String,
    pub page: u32,
    pub limit: u32,
    pub found: Found,
}

impl Meta {
    /// Number of pages implied by `found` at the current `limit`.
    ///
    /// When `found` is a lower bound the result is a lower bound too; use
    /// [`Response::has_next_page`] to drive paging.
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.found.count().div_ceil(u64::from(self.limit))
    }
}

pub const HEADER_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATELIMIT_USED: &str = "x-ratelimit-used";
pub const HEADER_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Rate-limit quota as reported by the response that produced an envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    #[serde(default)]
    pub x_ratelimit_limit: Option<u32>,
    #[serde(default)]
    pub x_ratelimit_remaining: Option<u32>,
    #[serde(default)]
    pub x_ratelimit_used: Option<u32>,
    /// Seconds until the current window resets.
    #[serde(default)]
    pub x_ratelimit_reset: Option<u32>,
}

impl Headers {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let int = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok())
        };
        Self {
            x_ratelimit_limit: int(HEADER_RATELIMIT_LIMIT),
            x_ratelimit_remaining: int(HEADER_RATELIMIT_REMAINING),
            x_ratelimit_used: int(HEADER_RATELIMIT_USED),
            x_ratelimit_reset: int(HEADER_RATELIMIT_RESET),
        }
    }
}

/// List envelope returned by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub meta: Meta,
    pub results: Vec<T>,
    #[serde(default)]
    pub headers: Headers,
}

impl<T> Response<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// First result, which is the record itself for `get` calls.
    pub fn first(&self) -> Option<&T> {
        self.results.first()
    }

    /// Whether a page after this one may hold more results.
    ///
    /// An exact `found` decides by page count. A lower-bound `found` says
    /// nothing about the end, so paging goes on until a page comes back
    /// short or empty.
    pub fn has_next_page(&self) -> bool {
        if self.meta.found.is_exact() {
            return u64::from(self.meta.page) < self.meta.page_count();
        }
        self.meta.limit > 0 && self.results.len() >= self.meta.limit as usize
    }
}

impl<T: Serialize + DeserializeOwned> ApiObject for Response<T> {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The same instant in UTC and in the location's local offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datetime {
    pub utc: DateTime<Utc>,
    pub local: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryBase {
    pub id: u32,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentBase {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerBase {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerBase {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBase {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBase {
    pub id: u32,
    pub name: String,
    pub units: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorBase {
    pub id: u32,
    pub name: String,
    pub parameter: ParameterBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// License reference nested in a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseBase {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub attribution: Option<Attribution>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    pub timezone: String,
    pub country: CountryBase,
    pub owner: OwnerBase,
    pub provider: ProviderBase,
    pub is_mobile: bool,
    pub is_monitor: bool,
    pub instruments: Vec<InstrumentBase>,
    pub sensors: Vec<SensorBase>,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub licenses: Option<Vec<LicenseBase>>,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bounds: [f64; 4],
    /// Metres from the query point, for coordinates/radius queries.
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub datetime_first: Option<Datetime>,
    #[serde(default)]
    pub datetime_last: Option<Datetime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerEntity {
    pub id: u32,
    pub name: String,
}

/// GeoJSON geometry covering a provider's locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: u32,
    pub name: String,
    pub source_name: String,
    pub export_prefix: String,
    /// Data license of the provider, in whatever shape the API returns it.
    #[serde(default)]
    pub license: Option<Value>,
    #[serde(default)]
    pub datetime_added: Option<String>,
    #[serde(default)]
    pub datetime_first: Option<String>,
    #[serde(default)]
    pub datetime_last: Option<String>,
    pub owner_entity: OwnerEntity,
    pub parameters: Vec<ParameterBase>,
    #[serde(default)]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: u32,
    pub name: String,
    pub units: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: u32,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub datetime_first: Option<String>,
    #[serde(default)]
    pub datetime_last: Option<String>,
    pub parameters: Vec<ParameterBase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: u32,
    pub name: String,
    pub is_monitor: bool,
    pub manufacturer: ManufacturerBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manufacturer {
    pub id: u32,
    pub name: String,
    pub instruments: Vec<InstrumentBase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: u32,
    pub name: String,
    pub commercial_use_allowed: bool,
    pub attribution_required: bool,
    pub share_alike_required: bool,
    pub modification_allowed: bool,
    pub redistribution_allowed: bool,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Distribution of the values behind an aggregated measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub q02: Option<f64>,
    #[serde(default)]
    pub q25: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub q75: Option<f64>,
    #[serde(default)]
    pub q98: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub sd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    #[serde(default)]
    pub expected_count: Option<u64>,
    #[serde(default)]
    pub expected_interval: Option<String>,
    #[serde(default)]
    pub observed_count: Option<u64>,
    #[serde(default)]
    pub observed_interval: Option<String>,
    #[serde(default)]
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub percent_coverage: Option<f64>,
    #[serde(default)]
    pub datetime_from: Option<Datetime>,
    #[serde(default)]
    pub datetime_to: Option<Datetime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub label: String,
    pub interval: String,
    #[serde(default)]
    pub datetime_from: Option<Datetime>,
    #[serde(default)]
    pub datetime_to: Option<Datetime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagInfo {
    pub has_flags: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub value: f64,
    #[serde(default)]
    pub flag_info: Option<FlagInfo>,
    pub parameter: ParameterBase,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub coverage: Option<Coverage>,
}

/// Most recent reading nested in a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBase {
    pub datetime: Datetime,
    pub value: f64,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: u32,
    pub name: String,
    pub parameter: ParameterBase,
    #[serde(default)]
    pub datetime_first: Option<Datetime>,
    #[serde(default)]
    pub datetime_last: Option<Datetime>,
    #[serde(default)]
    pub coverage: Option<Coverage>,
    #[serde(default)]
    pub latest: Option<LatestBase>,
    #[serde(default)]
    pub summary: Option<Summary>,
}

/// Most recent reading of one sensor, from a `latest` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Latest {
    pub datetime: Datetime,
    pub value: f64,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub sensors_id: u32,
    pub locations_id: u32,
}

impl ApiObject for Meta {}
impl ApiObject for Headers {}
impl ApiObject for Coordinates {}
impl ApiObject for Datetime {}
impl ApiObject for CountryBase {}
impl ApiObject for InstrumentBase {}
impl ApiObject for ManufacturerBase {}
impl ApiObject for OwnerBase {}
impl ApiObject for ProviderBase {}
impl ApiObject for ParameterBase {}
impl ApiObject for SensorBase {}
impl ApiObject for LicenseBase {}
impl ApiObject for Location {}
impl ApiObject for Provider {}
impl ApiObject for Parameter {}
impl ApiObject for Country {}
impl ApiObject for Instrument {}
impl ApiObject for Manufacturer {}
impl ApiObject for Owner {}
impl ApiObject for License {}
impl ApiObject for Measurement {}
impl ApiObject for Sensor {}
impl ApiObject for Latest {}

macro_rules! identified {
    ($($ty:ty),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> u32 {
                self.id
            }

            fn name(&self) -> Option<&str> {
                Some(&self.name)
            }
        })*
    };
}

identified!(
    CountryBase,
    InstrumentBase,
    ManufacturerBase,
    OwnerBase,
    ProviderBase,
    ParameterBase,
    SensorBase,
    LicenseBase,
    OwnerEntity,
    Provider,
    Parameter,
    Country,
    Instrument,
    Manufacturer,
    Owner,
    License,
    Sensor,
);

impl Identified for Location {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::*;

    fn meta_json() -> Value {
        json!({
            "name": "openaq-api",
            "website": "/",
            "page": 1,
            "limit": 100,
            "found": 2
        })
    }

    #[test]
    fn test_found_exact_and_lower_bound() {
        let exact: Found = serde_json::from_value(json!(2500)).unwrap();
        assert_eq!(exact, Found::exact(2500));

        let bound: Found = serde_json::from_value(json!(">1000")).unwrap();
        assert_eq!(bound.count(), 1000);
        assert!(!bound.is_exact());
        assert_eq!(serde_json::to_value(bound).unwrap(), json!(">1000"));

        let quoted: Found = serde_json::from_value(json!("42")).unwrap();
        assert!(quoted.is_exact());

        assert!(serde_json::from_value::<Found>(json!("lots")).is_err());
    }

    #[test]
    fn test_page_count() {
        let mut meta: Meta = serde_json::from_value(meta_json()).unwrap();
        meta.found = Found::exact(2500);
        meta.limit = 1000;
        assert_eq!(meta.page_count(), 3);
        meta.found = Found::exact(0);
        assert_eq!(meta.page_count(), 0);
    }

    #[test]
    fn test_has_next_page() {
        let page = |page: u32, found: Found, len: usize| Response {
            meta: Meta {
                page,
                limit: 2,
                found,
                ..serde_json::from_value::<Meta>(meta_json()).unwrap()
            },
            results: vec![0u8; len],
            headers: Headers::default(),
        };

        assert!(page(1, Found::exact(5), 2).has_next_page());
        assert!(page(2, Found::exact(5), 2).has_next_page());
        assert!(!page(3, Found::exact(5), 1).has_next_page());

        // a lower bound of 2 still pages on while pages come back full
        assert!(page(1, Found::at_least(2), 2).has_next_page());
        assert!(page(4, Found::at_least(2), 2).has_next_page());
        assert!(!page(5, Found::at_least(2), 1).has_next_page());
        assert!(!page(6, Found::at_least(2), 0).has_next_page());
    }

    #[test]
    fn test_headers_from_header_map() {
        let mut map = HeaderMap::new();
        map.insert("X-Ratelimit-Limit", HeaderValue::from_static("23"));
        map.insert("X-RateLimit-Used", HeaderValue::from_static("3"));
        map.insert("X-RateLimit-Remaining", HeaderValue::from_static("2"));
        map.insert("X-RateLimit-Reset", HeaderValue::from_static("not-a-number"));

        let headers = Headers::from_header_map(&map);
        assert_eq!(headers.x_ratelimit_limit, Some(23));
        assert_eq!(headers.x_ratelimit_used, Some(3));
        assert_eq!(headers.x_ratelimit_remaining, Some(2));
        assert_eq!(headers.x_ratelimit_reset, None);
    }

    #[test]
    fn test_mapping_keys_equal_field_set() {
        let owner: Owner = serde_json::from_value(json!({
            "id": 4,
            "name": "Unknown Governmental Organization",
            "anotherField": [1, 2, 3]
        }))
        .unwrap();
        let keys: BTreeSet<String> = owner.to_map().unwrap().into_iter().map(|(k, _)| k).collect();
        let expected: BTreeSet<String> = ["id", "name"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_parameter_optional_fields_present_in_map() {
        let parameter: Parameter = serde_json::from_value(json!({
            "id": 2,
            "name": "pm25",
            "units": "µg/m³"
        }))
        .unwrap();
        let map = parameter.to_map().unwrap();
        assert!(map.contains_key("displayName"));
        assert!(map.contains_key("description"));
        assert_eq!(map["displayName"], Value::Null);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result = serde_json::from_value::<Instrument>(json!({
            "id": 2,
            "name": "Government Monitor",
            "isMonitor": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_datetime_pair_requires_iso8601() {
        let ok: Datetime = serde_json::from_value(json!({
            "utc": "2024-03-01T13:00:00Z",
            "local": "2024-03-01T08:00:00-05:00"
        }))
        .unwrap();
        assert_eq!(ok.utc, ok.local);

        let bad = serde_json::from_value::<Datetime>(json!({
            "utc": "yesterday",
            "local": "2024-03-01T08:00:00-05:00"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_latest_round_trip() {
        let latest: Latest = serde_json::from_value(json!({
            "datetime": {"utc": "2024-03-01T13:00:00Z", "local": "2024-03-01T14:00:00+01:00"},
            "value": 11.5,
            "coordinates": {"latitude": 48.85, "longitude": 2.35},
            "sensorsId": 3917,
            "locationsId": 2178
        }))
        .unwrap();
        let text = latest.to_json().unwrap();
        let back = Latest::from_json(&text).unwrap();
        assert_eq!(back, latest);
        assert_eq!(back.to_map().unwrap(), latest.to_map().unwrap());
    }

    #[test]
    fn test_response_envelope_without_headers() {
        let response: Response<Owner> = serde_json::from_value(json!({
            "meta": meta_json(),
            "results": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
        }))
        .unwrap();
        assert_eq!(response.headers, Headers::default());
        assert_eq!(response.len(), 2);
        assert_eq!(response.first().map(Identified::id), Some(1));
    }
}
