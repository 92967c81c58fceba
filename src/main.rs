use std::sync::Arc;

use clap::Parser;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tfl_buses::api::{router, AppState};
use tfl_buses::arrivals::ArrivalsFetcher;
use tfl_buses::catalog::StopCatalog;
use tfl_buses::config::Config;
use tfl_buses::favourites::Favourites;
use tfl_buses::geocode::PostcodeClient;
use tfl_buses::tfl::TflClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let catalog = StopCatalog::load(&config.stops_path)?;
    info!(
        "loaded {} stop points from {}",
        catalog.len(),
        config.stops_path.display()
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let tfl = Arc::new(TflClient::with_client(
        http.clone(),
        &config.tfl_base_url,
        config.tfl_app_key.clone(),
    )?);
    let postcodes = Arc::new(PostcodeClient::with_client(http, &config.postcodes_base_url)?);

    let state = AppState {
        catalog: Arc::new(catalog),
        fetcher: ArrivalsFetcher::new(tfl.clone(), config.fetch_timeout()),
        tfl,
        postcodes,
        favourites: Arc::new(RwLock::new(Favourites::new())),
        default_radius: config.radius_meters,
        arrivals_per_stop: config.arrivals_per_stop,
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Server is running on http://{}", config.bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
