use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "London bus arrivals and nearby stops", long_about = None)]
pub struct Config {
    #[arg(long, env = "BUSES_BIND", default_value = "0.0.0.0:3030")]
    pub bind: SocketAddr,

    /// Bundled stop points, .json (TfL shape) or .csv
    #[arg(long, env = "BUSES_STOPS_PATH", default_value = "data/stoppoints.json")]
    pub stops_path: PathBuf,

    /// Radius used by /nearby when the request does not give one
    #[arg(long, env = "BUSES_RADIUS_METERS", default_value_t = 200.0)]
    pub radius_meters: f64,

    /// Upper bound on each upstream arrivals request
    #[arg(long, env = "BUSES_FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Arrivals listed per stop in /nearby
    #[arg(long, env = "BUSES_ARRIVALS_PER_STOP", default_value_t = 3)]
    pub arrivals_per_stop: usize,

    #[arg(long, env = "TFL_BASE_URL", default_value = crate::tfl::DEFAULT_BASE_URL)]
    pub tfl_base_url: String,

    #[arg(long, env = "TFL_APP_KEY", hide_env_values = true)]
    pub tfl_app_key: Option<String>,

    #[arg(long, env = "POSTCODES_BASE_URL", default_value = crate::geocode::DEFAULT_BASE_URL)]
    pub postcodes_base_url: String,
}

impl Config {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
