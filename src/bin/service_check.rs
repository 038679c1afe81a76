//! service_check - probe the remote detection service once
//!
//! Exits 0 when `GET {service}/` answers 2xx, 1 otherwise.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;
use url::Url;

use bear_watch::{AvailabilityProbe, ServiceAvailability};

#[derive(Parser, Debug)]
#[command(author, version, about = "Check whether the remote detection service is reachable")]
struct Args {
    /// Detection service root URL.
    #[arg(
        long,
        env = "BEARWATCH_SERVICE_URL",
        default_value = "http://localhost:8001/",
        value_name = "URL"
    )]
    service_url: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let url = Url::parse(&args.service_url)
        .map_err(|e| anyhow!("invalid service url '{}': {}", args.service_url, e))?;
    let probe = AvailabilityProbe::new(&url, Duration::from_secs(args.timeout_secs.max(1)))?;

    match probe.check() {
        ServiceAvailability::Online => {
            println!("detection service {}: online", probe.root());
            Ok(())
        }
        availability => {
            println!("detection service {}: {}", probe.root(), availability);
            std::process::exit(1);
        }
    }
}
