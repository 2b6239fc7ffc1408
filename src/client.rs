use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::endpoint::{
    Countries, Endpoint, HasLatest, Instruments, Licenses, Listable, Locations, Manufacturers,
    Owners, Parameters, Providers, Request, Sensors, decode,
};
use crate::error::{Error, Result};
use crate::filters::MeasurementsFilters;
use crate::models::{Headers, Instrument, Latest, Measurement, Response, Sensor};
use crate::ratelimit::{Gate, RateLimitState, RateLimiter};
use crate::transport::{HttpTransport, Transport};
use crate::util::{display_query, lock, urljoin};

/// Blocking OpenAQ client.
///
/// Every call blocks the calling thread for one HTTP request, plus the
/// rate-limit wait when [`RateLimitMode::AutoWait`](crate::RateLimitMode::AutoWait)
/// is on. The client is `Send + Sync` and can be shared between threads.
/// Callers pass the rate-limit gate one at a time, so threads that find the
/// quota exhausted queue behind the one that is waiting.
#[derive(Debug)]
pub struct Client<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: Mutex<Option<Arc<T>>>,
    limiter: Mutex<RateLimiter>,
    /// Held across the gate decision and any auto-wait sleep.
    turn: Mutex<()>,
}

impl Client<HttpTransport> {
    /// Creates a client with default settings.
    ///
    /// Without an explicit key, `OPENAQ_API_KEY` and then `~/.openaq.toml`
    /// are consulted; [`Error::ApiKeyMissing`] if none is found.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            api_key,
            ..ClientConfig::default()
        })
    }

    /// Equivalent to `Client::new(None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let config = config.resolve()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::build(config, transport))
    }

    /// Replaces the HTTP session with a fresh one and resets the rate-limit
    /// state. Also reopens a closed client.
    pub fn reconnect(&self) -> Result<()> {
        let transport = HttpTransport::new(&self.config)?;
        *lock(&self.transport) = Some(Arc::new(transport));
        let mut limiter = lock(&self.limiter);
        limiter.reset();
        debug!(base_url = %self.config.base_url, mode = ?limiter.mode(), "reconnected");
        Ok(())
    }
}

impl<T: Transport> Client<T> {
    /// Uses a caller-supplied transport. The config is resolved the same way
    /// as in [`Client::with_config`].
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let config = config.resolve()?;
        Ok(Self::build(config, transport))
    }

    fn build(config: ClientConfig, transport: T) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_mode, config.rate_limit);
        Self {
            config,
            transport: Mutex::new(Some(Arc::new(transport))),
            limiter: Mutex::new(limiter),
            turn: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn locations(&self) -> Resource<'_, T, Locations> {
        Resource::new(self)
    }

    pub fn sensors(&self) -> Resource<'_, T, Sensors> {
        Resource::new(self)
    }

    pub fn measurements(&self) -> Measurements<'_, T> {
        Measurements { client: self }
    }

    pub fn parameters(&self) -> Resource<'_, T, Parameters> {
        Resource::new(self)
    }

    pub fn providers(&self) -> Resource<'_, T, Providers> {
        Resource::new(self)
    }

    pub fn instruments(&self) -> Resource<'_, T, Instruments> {
        Resource::new(self)
    }

    pub fn manufacturers(&self) -> Resource<'_, T, Manufacturers> {
        Resource::new(self)
    }

    pub fn owners(&self) -> Resource<'_, T, Owners> {
        Resource::new(self)
    }

    pub fn countries(&self) -> Resource<'_, T, Countries> {
        Resource::new(self)
    }

    pub fn licenses(&self) -> Resource<'_, T, Licenses> {
        Resource::new(self)
    }

    /// Releases the transport. Later calls fail with [`Error::Closed`].
    pub fn close(&self) {
        if lock(&self.transport).take().is_some() {
            debug!("client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.transport).is_none()
    }

    /// Quota as last reported by the server (or assumed locally).
    ///
    /// Does not wait for a caller parked in the auto-wait sleep.
    pub fn rate_limit(&self) -> RateLimitState {
        lock(&self.limiter).snapshot(Instant::now())
    }

    fn execute<I: DeserializeOwned>(&self, request: Request) -> Result<Response<I>> {
        let transport = lock(&self.transport).clone().ok_or(Error::Closed)?;
        let url = urljoin(&self.config.base_url, &request.path);
        {
            let _turn = lock(&self.turn);
            let decision = lock(&self.limiter).gate(Instant::now());
            match decision {
                Gate::Proceed => {}
                Gate::Wait(wait) => {
                    warn!(
                        "rate limit reached, waiting {:.1}s for the window to reset",
                        wait.as_secs_f64()
                    );
                    thread::sleep(wait);
                    lock(&self.limiter).window_elapsed();
                }
                Gate::Reject { reset_seconds } => {
                    warn!(reset_seconds, "rate limit reached, rejecting request");
                    return Err(Error::HttpRateLimit { reset_seconds });
                }
            }
            lock(&self.limiter).dispatched();
        }

        debug!(url = %url, query = %display_query(&request.query), "GET");
        let raw = transport
            .send(&url, &request.query)
            .inspect_err(|e| error!(url = %url, "request failed: {e}"))?;
        lock(&self.limiter).record(&Headers::from_header_map(&raw.headers), Instant::now());
        decode(&url, raw)
    }
}

/// Operations on one API resource, borrowed from a [`Client`].
///
/// Which methods exist depends on the endpoint: every resource has
/// [`get`](Resource::get); listable ones have [`list`](Resource::list); locations
/// and parameters have [`latest`](Resource::latest).
#[derive(Debug)]
pub struct Resource<'a, T: Transport, E> {
    client: &'a Client<T>,
    endpoint: PhantomData<E>,
}

impl<'a, T: Transport, E> Resource<'a, T, E> {
    fn new(client: &'a Client<T>) -> Self {
        Self {
            client,
            endpoint: PhantomData,
        }
    }
}

impl<T: Transport, E: Endpoint> Resource<'_, T, E> {
    /// Fetches one record by id. Unknown ids fail with [`Error::NotFound`].
    pub fn get(&self, id: u32) -> Result<Response<E::Item>> {
        self.client.execute(Request::get::<E>(id)?)
    }
}

impl<T: Transport, E: Listable> Resource<'_, T, E> {
    /// Fetches one page. Paging is driven by `filters.page`.
    pub fn list(&self, filters: &E::Filters) -> Result<Response<E::Item>> {
        self.client.execute(Request::list::<E>(filters)?)
    }
}

impl<T: Transport, E: HasLatest> Resource<'_, T, E> {
    pub fn latest(&self, id: u32) -> Result<Response<Latest>> {
        self.client.execute(Request::latest::<E>(id)?)
    }
}

impl<T: Transport> Resource<'_, T, Locations> {
    /// Sensors installed at a location.
    pub fn sensors(&self, locations_id: u32) -> Result<Response<Sensor>> {
        self.client
            .execute(Request::child::<Locations>(locations_id, "sensors")?)
    }
}

impl<T: Transport> Resource<'_, T, Manufacturers> {
    /// Instruments made by a manufacturer.
    pub fn instruments(&self, manufacturers_id: u32) -> Result<Response<Instrument>> {
        self.client
            .execute(Request::child::<Manufacturers>(manufacturers_id, "instruments")?)
    }
}

/// Sensor readings at a chosen resolution.
#[derive(Debug)]
pub struct Measurements<'a, T: Transport> {
    client: &'a Client<T>,
}

impl<T: Transport> Measurements<'_, T> {
    pub fn list(&self, filters: &MeasurementsFilters) -> Result<Response<Measurement>> {
        self.client.execute(Request::measurements(filters)?)
    }
}
