use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
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
use crate::transport::{AsyncHttpTransport, AsyncTransport};
use crate::util::{display_query, lock, urljoin};

/// Async OpenAQ client for tokio.
///
/// Same surface as [`Client`](crate::Client), with `async` operations. Calls
/// suspend only at the rate-limit gate and on the network; dropping a pending
/// call releases the gate and abandons the request.
#[derive(Debug)]
pub struct AsyncClient<T: AsyncTransport = AsyncHttpTransport> {
    config: ClientConfig,
    transport: Mutex<Option<Arc<T>>>,
    limiter: Mutex<RateLimiter>,
    /// Held across the gate decision and any auto-wait sleep.
    turn: tokio::sync::Mutex<()>,
}

impl AsyncClient<AsyncHttpTransport> {
    /// See [`Client::new`](crate::Client::new) for key resolution.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            api_key,
            ..ClientConfig::default()
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(None)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let config = config.resolve()?;
        let transport = AsyncHttpTransport::new(&config)?;
        Ok(Self::build(config, transport))
    }

    /// Fresh HTTP session and rate-limit state. Reopens a closed client.
    pub fn reconnect(&self) -> Result<()> {
        let transport = AsyncHttpTransport::new(&self.config)?;
        *lock(&self.transport) = Some(Arc::new(transport));
        let mut limiter = lock(&self.limiter);
        limiter.reset();
        debug!(base_url = %self.config.base_url, mode = ?limiter.mode(), "reconnected");
        Ok(())
    }
}

impl<T: AsyncTransport> AsyncClient<T> {
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
            turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn locations(&self) -> AsyncResource<'_, T, Locations> {
        AsyncResource::new(self)
    }

    pub fn sensors(&self) -> AsyncResource<'_, T, Sensors> {
        AsyncResource::new(self)
    }

    pub fn measurements(&self) -> AsyncMeasurements<'_, T> {
        AsyncMeasurements { client: self }
    }

    pub fn parameters(&self) -> AsyncResource<'_, T, Parameters> {
        AsyncResource::new(self)
    }

    pub fn providers(&self) -> AsyncResource<'_, T, Providers> {
        AsyncResource::new(self)
    }

    pub fn instruments(&self) -> AsyncResource<'_, T, Instruments> {
        AsyncResource::new(self)
    }

    pub fn manufacturers(&self) -> AsyncResource<'_, T, Manufacturers> {
        AsyncResource::new(self)
    }

    pub fn owners(&self) -> AsyncResource<'_, T, Owners> {
        AsyncResource::new(self)
    }

    pub fn countries(&self) -> AsyncResource<'_, T, Countries> {
        AsyncResource::new(self)
    }

    pub fn licenses(&self) -> AsyncResource<'_, T, Licenses> {
        AsyncResource::new(self)
    }

    pub fn close(&self) {
        if lock(&self.transport).take().is_some() {
            debug!("client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.transport).is_none()
    }

    /// Does not wait for a task parked in the auto-wait sleep.
    pub fn rate_limit(&self) -> RateLimitState {
        lock(&self.limiter).snapshot(Instant::now())
    }

    async fn execute<I: DeserializeOwned>(&self, request: Request) -> Result<Response<I>> {
        let transport = lock(&self.transport).clone().ok_or(Error::Closed)?;
        let url = urljoin(&self.config.base_url, &request.path);
        {
            let _turn = self.turn.lock().await;
            let decision = lock(&self.limiter).gate(Instant::now());
            match decision {
                Gate::Proceed => {}
                Gate::Wait(wait) => {
                    warn!(
                        "rate limit reached, waiting {:.1}s for the window to reset",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
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
            .await
            .inspect_err(|e| error!(url = %url, "request failed: {e}"))?;
        lock(&self.limiter).record(&Headers::from_header_map(&raw.headers), Instant::now());
        decode(&url, raw)
    }
}

/// Async counterpart of [`Resource`](crate::Resource).
#[derive(Debug)]
pub struct AsyncResource<'a, T: AsyncTransport, E> {
    client: &'a AsyncClient<T>,
    endpoint: PhantomData<E>,
}

impl<'a, T: AsyncTransport, E> AsyncResource<'a, T, E> {
    fn new(client: &'a AsyncClient<T>) -> Self {
        Self {
            client,
            endpoint: PhantomData,
        }
    }
}

impl<T: AsyncTransport, E: Endpoint> AsyncResource<'_, T, E> {
    pub async fn get(&self, id: u32) -> Result<Response<E::Item>> {
        self.client.execute(Request::get::<E>(id)?).await
    }
}

impl<T: AsyncTransport, E: Listable> AsyncResource<'_, T, E> {
    pub async fn list(&self, filters: &E::Filters) -> Result<Response<E::Item>> {
        self.client.execute(Request::list::<E>(filters)?).await
    }
}

impl<T: AsyncTransport, E: HasLatest> AsyncResource<'_, T, E> {
    pub async fn latest(&self, id: u32) -> Result<Response<Latest>> {
        self.client.execute(Request::latest::<E>(id)?).await
    }
}

impl<T: AsyncTransport> AsyncResource<'_, T, Locations> {
    pub async fn sensors(&self, locations_id: u32) -> Result<Response<Sensor>> {
        self.client
            .execute(Request::child::<Locations>(locations_id, "sensors")?)
            .await
    }
}

impl<T: AsyncTransport> AsyncResource<'_, T, Manufacturers> {
    pub async fn instruments(&self, manufacturers_id: u32) -> Result<Response<Instrument>> {
        self.client
            .execute(Request::child::<Manufacturers>(manufacturers_id, "instruments")?)
            .await
    }
}

#[derive(Debug)]
pub struct AsyncMeasurements<'a, T: AsyncTransport> {
    client: &'a AsyncClient<T>,
}

impl<T: AsyncTransport> AsyncMeasurements<'_, T> {
    pub async fn list(&self, filters: &MeasurementsFilters) -> Result<Response<Measurement>> {
        self.client.execute(Request::measurements(filters)?).await
    }
}
