//! Resource table and the request/decode steps both clients share.
//!
//! Each API resource is a zero-sized marker type. Its [`Endpoint`] impl names
//! the path and item type; [`Listable`] and [`HasLatest`] opt it in to list
//! and latest operations.

use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{Error, Result, error_for_status};
use crate::filters::{
    CountriesFilters, InstrumentsFilters, LicensesFilters, ListFilters, LocationsFilters,
    ManufacturersFilters, MeasurementsFilters, OwnersFilters, ParametersFilters, ProvidersFilters,
    QueryParams,
};
use crate::models::{
    Country, Headers, Instrument, License, Location, Manufacturer, Owner, Parameter, Provider,
    Response, Sensor,
};
use crate::transport::RawResponse;
use crate::validate::validate_id;

pub trait Endpoint {
    /// Path below the API root, without slashes.
    const PATH: &'static str;
    type Item: DeserializeOwned + Send;
}

pub trait Listable: Endpoint {
    type Filters: ListFilters + Sync;
}

/// Resources with a `/{id}/latest` sub-collection.
pub trait HasLatest: Endpoint {}

macro_rules! endpoint {
    ($name:ident, $path:literal, $item:ty) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Endpoint for $name {
            const PATH: &'static str = $path;
            type Item = $item;
        }
    };
    ($name:ident, $path:literal, $item:ty, $filters:ty) => {
        endpoint!($name, $path, $item);

        impl Listable for $name {
            type Filters = $filters;
        }
    };
}

endpoint!(Locations, "locations", Location, LocationsFilters);
endpoint!(Sensors, "sensors", Sensor);
endpoint!(Parameters, "parameters", Parameter, ParametersFilters);
endpoint!(Providers, "providers", Provider, ProvidersFilters);
endpoint!(Instruments, "instruments", Instrument, InstrumentsFilters);
endpoint!(Manufacturers, "manufacturers", Manufacturer, ManufacturersFilters);
endpoint!(Owners, "owners", Owner, OwnersFilters);
endpoint!(Countries, "countries", Country, CountriesFilters);
endpoint!(Licenses, "licenses", License, LicensesFilters);

impl HasLatest for Locations {}
impl HasLatest for Parameters {}

/// A validated GET, relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Request {
    pub(crate) path: String,
    pub(crate) query: QueryParams,
}

impl Request {
    fn bare(path: String) -> Self {
        Self {
            path,
            query: Vec::new(),
        }
    }

    pub(crate) fn get<E: Endpoint>(id: u32) -> Result<Self> {
        let id = validate_id(id)?;
        Ok(Self::bare(format!("{}/{id}", E::PATH)))
    }

    pub(crate) fn list<E: Listable>(filters: &E::Filters) -> Result<Self> {
        Ok(Self {
            path: E::PATH.to_string(),
            query: filters.to_query()?,
        })
    }

    pub(crate) fn latest<E: HasLatest>(id: u32) -> Result<Self> {
        Self::child::<E>(id, "latest")
    }

    /// `/{path}/{id}/{child}`, e.g. a location's sensors.
    pub(crate) fn child<E: Endpoint>(id: u32, child: &str) -> Result<Self> {
        let id = validate_id(id)?;
        Ok(Self::bare(format!("{}/{id}/{child}", E::PATH)))
    }

    pub(crate) fn measurements(filters: &MeasurementsFilters) -> Result<Self> {
        Ok(Self {
            path: filters.path()?,
            query: filters.to_query()?,
        })
    }
}

/// Turns a raw response into a typed envelope, or the error its status maps to.
pub(crate) fn decode<T: DeserializeOwned>(url: &str, raw: RawResponse) -> Result<Response<T>> {
    let headers = Headers::from_header_map(&raw.headers);
    if !raw.status.is_success() {
        let err = error_for_status(
            raw.status,
            &raw.body,
            headers.x_ratelimit_reset.map(u64::from),
        );
        error!(url, status = raw.status.as_u16(), "{err}");
        return Err(err);
    }
    let mut response: Response<T> = serde_json::from_str(&raw.body).map_err(|e| {
        error!(url, status = raw.status.as_u16(), "failed to decode response: {e}");
        Error::Server {
            status: raw.status.as_u16(),
            message: format!("response did not match the expected shape: {e}"),
        }
    })?;
    response.headers = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;
    use crate::filters::{DataKind, Rollup};
    use crate::models::Latest;

    fn raw(status: StatusCode, body: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("59"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("42"));
        RawResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    const OWNERS: &str = r#"{
        "meta": {"name": "openaq-api", "website": "/", "page": 1, "limit": 100, "found": 1},
        "results": [{"id": 4, "name": "Agency", "unexpected": true}]
    }"#;

    #[test]
    fn test_paths() {
        assert_eq!(Request::get::<Locations>(2178).unwrap().path, "locations/2178");
        assert_eq!(Request::latest::<Parameters>(2).unwrap().path, "parameters/2/latest");
        assert_eq!(
            Request::child::<Manufacturers>(7, "instruments").unwrap().path,
            "manufacturers/7/instruments"
        );
        assert_eq!(Request::get::<Sensors>(3917).unwrap().path, "sensors/3917");
        assert!(Request::get::<Countries>(0).is_err());
    }

    #[test]
    fn test_list_request() {
        let request = Request::list::<Owners>(&OwnersFilters::new().limit(5)).unwrap();
        assert_eq!(request.path, "owners");
        assert!(request.query.contains(&("limit", "5".to_string())));
    }

    #[test]
    fn test_measurements_request() {
        let filters = MeasurementsFilters::new(12)
            .data(DataKind::Days)
            .rollup(Rollup::Monthly);
        let request = Request::measurements(&filters).unwrap();
        assert_eq!(request.path, "sensors/12/days/monthly");
    }

    #[test]
    fn test_decode_attaches_headers() {
        let response: Response<crate::models::Owner> =
            decode("http://x/owners", raw(StatusCode::OK, OWNERS)).unwrap();
        assert_eq!(response.len(), 1);
        assert_eq!(response.results[0].name, "Agency");
        assert_eq!(response.headers.x_ratelimit_remaining, Some(59));
        assert_eq!(response.headers.x_ratelimit_limit, None);
    }

    #[test]
    fn test_decode_status_error() {
        let err = decode::<Latest>("http://x", raw(StatusCode::TOO_MANY_REQUESTS, "{}")).unwrap_err();
        assert!(matches!(err, Error::RateLimit { reset_seconds: Some(42), .. }));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode::<Latest>("http://x", raw(StatusCode::OK, r#"{"meta": {}}"#)).unwrap_err();
        match err {
            Error::Server { status, message } => {
                assert_eq!(status, 200);
                assert!(message.contains("expected shape"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
