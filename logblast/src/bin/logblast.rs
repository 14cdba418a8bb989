use std::{io, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueEnum};
use jemallocator::Jemalloc;
use logblast::{
    config::{self, Config},
    driver::{self, Driver},
    transport::{self, Sender},
};
use logblast_payload::OtlpJsonLogs;
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::{SeedableRng, rngs::StdRng};
use tokio::runtime::Builder;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Logblast configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Logblast transport error: {0}")]
    Transport(#[from] transport::Error),
    #[error("Logblast run failed: {0}")]
    Driver(#[from] driver::Error),
    #[error("Failed to install prometheus exporter: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
    #[error("Parsing Prometheus address failed: {0}")]
    PrometheusAddr(#[from] std::net::AddrParseError),
    #[error("Parsing target URI failed: {0}")]
    TargetUri(#[from] http::uri::InvalidUri),
}

/// A 32 byte seed written as 64 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seed([u8; 32]);

impl FromStr for Seed {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.len() != 64 || !input.is_ascii() {
            return Err("seed must be exactly 64 hex characters".to_string());
        }
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            let pair = &input[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|err| format!("{pair}: {err}"))?;
        }
        Ok(Self(seed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// shell out to an external HTTP client
    Curl,
    /// speak HTTP in-process
    Native,
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send log batches to the target
    Run(RunArgs),
    /// Validate configuration file and exit
    ConfigCheck(ConfigCheckArgs),
}

#[derive(Args)]
struct RunArgs {
    /// path on disk to the configuration file, defaults apply when absent
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// the URI to POST log batches to
    #[clap(long)]
    target_uri: Option<String>,
    /// the number of batches to send
    #[clap(long)]
    iterations: Option<u32>,
    /// log body size, in units of ten thousand characters
    #[clap(long)]
    body_size: Option<u32>,
    /// how batches are delivered
    #[clap(long, value_enum)]
    transport: Option<TransportKind>,
    /// seed for random operations, 64 hex characters
    #[clap(long)]
    seed: Option<Seed>,
    /// address to bind a prometheus exporter to
    #[clap(long)]
    prometheus_addr: Option<String>,
}

#[derive(Args)]
struct ConfigCheckArgs {
    /// path on disk to the configuration file
    #[clap(long)]
    config_path: PathBuf,
}

fn get_config(args: &RunArgs) -> Result<Config, Error> {
    let mut config = config::load(args.config_path.as_deref())?;

    if let Some(uri) = &args.target_uri {
        config.target_uri = uri.parse()?;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(body_size) = args.body_size {
        config.payload.body_size = body_size;
    }
    match (args.transport, &config.transport) {
        (Some(TransportKind::Curl), transport::Config::Native(_)) => {
            config.transport = transport::Config::Curl(transport::curl::Config::default());
        }
        (Some(TransportKind::Native), transport::Config::Curl(_)) => {
            config.transport = transport::Config::Native(transport::native::Config::default());
        }
        _ => {}
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed.0);
    }
    if let Some(addr) = &args.prometheus_addr {
        config.prometheus_addr = Some(addr.parse()?);
    }

    config.validate().inspect_err(|err| {
        error!("Configuration validation failed: {err}");
    })?;
    Ok(config)
}

fn validate_config(args: &ConfigCheckArgs) -> Result<Config, Error> {
    let config = config::load(Some(args.config_path.as_path()))?;
    config.validate()?;
    info!("Configuration file is valid");
    Ok(config)
}

async fn inner_main(config: Config) -> Result<driver::Report, Error> {
    if let Some(addr) = config.prometheus_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Prometheus exporter listening on {addr}");
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::from_seed(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let transport = Sender::new(&config)?;
    let payload = OtlpJsonLogs::new(config.payload.clone());
    info!(
        target_uri = %config.target_uri,
        iterations = config.iterations,
        body_chars = payload.body_chars(),
        "starting run"
    );

    let mut driver = Driver::new(payload, transport, config.iterations);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    Ok(driver.run(&mut rng, &mut out).await?)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(io::stderr)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting logblast {version} run.");

    let cli = Cli::parse();
    let args = match cli.command {
        Commands::Run(args) => args,
        Commands::ConfigCheck(args) => match validate_config(&args) {
            Ok(_) => std::process::exit(0),
            Err(err) => {
                error!("{err}");
                std::process::exit(1)
            }
        },
    };

    let config = get_config(&args)?;

    // Iterations run strictly one after another, a single thread suffices.
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let report = runtime.block_on(inner_main(config))?;
    info!(
        successes = report.successes,
        failures = report.failures(),
        "Bye. :)"
    );
    Ok(())
}
