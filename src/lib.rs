//! A Rust client for the OpenAQ v3 air quality API.
//!
//! Two flavours share one surface: [`Client`] blocks the calling thread,
//! [`AsyncClient`] runs on tokio. Both validate arguments before sending,
//! track the `x-ratelimit-*` quota headers, map HTTP failures onto [`Error`]
//! and decode payloads into typed [`Response`] envelopes.
//!
//! ## Quick start
//! - Get an API key from <https://explore.openaq.org/register>.
//! - Pass it explicitly, or set `OPENAQ_API_KEY`, or put `api-key = "..."` in
//!   `~/.openaq.toml`.
//!
//! ```no_run
//! use openaq::{Client, Coordinates, LocationsFilters};
//!
//! fn main() -> openaq::Result<()> {
//!     let client = Client::from_env()?;
//!     let filters = LocationsFilters::new()
//!         .near(Coordinates::new(40.7128, -74.0060), 10_000)
//!         .limit(100);
//!     let page = client.locations().list(&filters)?;
//!     for location in &page.results {
//!         println!("{} {:?}", location.id, location.name);
//!     }
//!     println!("{} found, quota left {}", page.meta.found.count(), client.rate_limit().remaining);
//!     Ok(())
//! }
//! ```
//!
//! Rate limiting defaults to [`RateLimitMode::Reactive`]: quota headers are
//! tracked and a server 429 surfaces as [`Error::RateLimit`]. Use
//! [`ClientConfig::with_auto_wait`] to sleep until the window resets instead.

#![forbid(unsafe_code)]

mod async_client;
mod client;
mod config;
mod endpoint;
mod error;
mod filters;
mod models;
mod ratelimit;
mod transport;
mod util;
mod validate;

pub use async_client::{AsyncClient, AsyncMeasurements, AsyncResource};
pub use client::{Client, Measurements, Resource};
pub use config::{API_KEY_ENV, ClientConfig, DEFAULT_BASE_URL, resolve_api_key};
pub use endpoint::{
    Countries, Endpoint, HasLatest, Instruments, Licenses, Listable, Locations, Manufacturers,
    Owners, Parameters, Providers, Sensors,
};
pub use error::{Error, Result};
pub use filters::{
    BoundingBox, CountriesFilters, DataKind, InstrumentsFilters, LicensesFilters, ListFilters,
    LocationsFilters, ManufacturersFilters, MeasurementsFilters, OwnersFilters, PageFilters,
    ParameterType, ParametersFilters, ProvidersFilters, QueryParams, Rollup, SortOrder,
};
pub use models::*;
pub use ratelimit::{DEFAULT_RATE_LIMIT, DEFAULT_RESET, RateLimitMode, RateLimitState};
pub use transport::{AsyncHttpTransport, AsyncTransport, HttpTransport, RawResponse, Transport};

/// Argument checks run by every operation, exposed for callers that want to
/// validate input up front.
pub mod validation {
    pub use crate::validate::*;
}
