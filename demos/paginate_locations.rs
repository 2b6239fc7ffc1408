//! Walks every page of monitor locations in one country.
//!
//! ```sh
//! OPENAQ_API_KEY=... cargo run --example paginate_locations -- DE
//! ```

use anyhow::Result;
use openaq::{AsyncClient, LocationsFilters};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let iso = std::env::args().nth(1).unwrap_or_else(|| "DE".to_string());
    let client = AsyncClient::from_env()?;

    let mut page = 1;
    let mut seen = 0;
    loop {
        let filters = LocationsFilters {
            monitor: Some(true),
            ..LocationsFilters::new().iso(iso.as_str()).page(page).limit(1_000)
        };
        let response = client.locations().list(&filters).await?;
        seen += response.len();
        info!(
            page,
            results = response.len(),
            found = %response.meta.found.count(),
            "fetched page"
        );
        if !response.has_next_page() {
            break;
        }
        page += 1;
    }

    println!("{seen} monitor locations in {iso}");
    Ok(())
}
