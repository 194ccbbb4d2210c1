use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use zenkoku_taxi::catalog::{
    feature_entries, nearby_stations, release_highlights, system_status, Role, CURRENT_RELEASE,
};
use zenkoku_taxi::links::{map_url, SupportContact};
use zenkoku_taxi::location::LocationError;
use zenkoku_taxi::region::{Coordinate, CoordinateError, RegionTable};
use zenkoku_taxi::{server, Config, ConfigError, ProviderKind};

/// Zenkoku AI Taxi — region resolution and location tools
///
/// Resolves coordinates to a prefecture, runs the location session, and
/// serves the app's JSON API. JSON goes to stdout, banners to stderr.
///
/// Examples:
///   zenkoku resolve --lat 35.1815 --lon 136.9066
///   zenkoku locate --provider ip
///   zenkoku features --role driver
///   zenkoku serve --port 8080
#[derive(Parser)]
#[command(name = "zenkoku", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this .env file instead of the environment.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a coordinate to its prefecture.
    Resolve {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// List the prefecture bounding boxes in lookup order.
    Regions,
    /// Acquire one fix and resolve it.
    Locate {
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,
        /// Give up on the provider after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// List nearby stations with mock demand figures.
    Stations,
    /// List the placeholder features for a role.
    Features {
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// Show the system status panel and the release highlights.
    System,
    /// Print the map link and the chat-support link.
    Links {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        /// The chat app is not installed; use the web link.
        #[arg(long)]
        no_app: bool,
    },
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::Serve { .. }));

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(serving: bool) {
    let default = if serving {
        "zenkoku_taxi=info,tower_http=info"
    } else {
        "zenkoku_taxi=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Resolve { lat, lon } => {
            let coord = Coordinate::new(lat, lon)?;
            let lookup = RegionTable::builtin().lookup(coord.latitude, coord.longitude);
            if coord.is_geographic() {
                eprintln!("  \u{1F4CD} {}", lookup.region);
            } else {
                eprintln!("  \u{1F4CD} {} ({} is off the globe)", lookup.region, coord);
            }
            print_json(&lookup)
        }
        Command::Regions => print_json(&RegionTable::builtin().entries()),
        Command::Locate { provider, timeout_ms } => {
            if let Some(p) = provider {
                config.provider = p;
            }
            if let Some(ms) = timeout_ms {
                config.position_timeout = Duration::from_millis(ms.max(1));
            }
            let report = config.build_session().refresh()?;
            eprintln!("  {}", report.display_line());
            print_json(&report)
        }
        Command::Stations => print_json(&nearby_stations()),
        Command::Features { role } => {
            eprintln!("  {} — {}", role.label(), role.description());
            print_json(&feature_entries(role))
        }
        Command::System => {
            eprintln!("  \u{2728} {} 新機能", CURRENT_RELEASE);
            print_json(&serde_json::json!({
                "status": system_status(),
                "highlights": release_highlights(),
            }))
        }
        Command::Links { lat, lon, no_app } => {
            let coord = match (lat, lon) {
                (Some(lat), Some(lon)) => Coordinate::new(lat, lon)?,
                _ => config.static_fix,
            };
            let support = SupportContact::default();
            print_json(&serde_json::json!({
                "map_url": map_url(coord.latitude, coord.longitude),
                "support_url": support.url(!no_app),
                "support_id": support.id,
            }))
        }
        Command::Serve { host, port } => {
            if let Some(h) = host {
                config.server_host = h;
            }
            if let Some(p) = port {
                config.server_port = p;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start(&config))?;
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
