//! Prints the latest PM2.5 readings around a point.
//!
//! ```sh
//! OPENAQ_API_KEY=... cargo run --example latest_pm25 -- 40.7128 -74.0060
//! ```

use anyhow::{Context, Result};
use openaq::{Client, ClientConfig, Coordinates, LocationsFilters};
use tracing_subscriber::EnvFilter;

const PM25: u32 = 2;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let latitude: f64 = args.next().as_deref().unwrap_or("40.7128").parse()?;
    let longitude: f64 = args.next().as_deref().unwrap_or("-74.0060").parse()?;

    let client = Client::with_config(ClientConfig::new().with_auto_wait(true))
        .context("failed to create OpenAQ client")?;

    let filters = LocationsFilters {
        parameters_id: Some(vec![PM25]),
        ..LocationsFilters::new()
            .near(Coordinates::new(latitude, longitude), 10_000)
            .limit(10)
    };
    let locations = client.locations().list(&filters)?;

    for location in &locations.results {
        let latest = client.locations().latest(location.id)?;
        let pm25_sensors: Vec<u32> = location
            .sensors
            .iter()
            .filter(|s| s.parameter.id == PM25)
            .map(|s| s.id)
            .collect();
        for reading in latest
            .results
            .iter()
            .filter(|r| pm25_sensors.contains(&r.sensors_id))
        {
            println!(
                "{:>8}  {:<40}  {:>7.1} µg/m³  {}",
                location.id,
                location.name.as_deref().unwrap_or("-"),
                reading.value,
                reading.datetime.utc
            );
        }
    }

    let quota = client.rate_limit();
    println!("quota: {}/{} left", quota.remaining, quota.limit);
    client.close();
    Ok(())
}
