use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use apiary::cli;
use apiary::server::{self, config::Config, runnable::RunnableRegistry};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = cli::Cli::parse();
    let debug = args.debug;

    init_tracing(debug);

    let config = match Config::from_cli(args) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        error!(error = %err, "worker exited with an error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), server::error::Error> {
    let db = server::startup::connect(&config).await?;
    info!(url = %config.database_url, "connected to job store");

    // Runnables are registered by the crate embedding `apiary` as a library; this binary
    // only runs the job factory's conventional module out of the box.
    let registry = RunnableRegistry::new();

    server::worker::run(&db, &config, &registry).await
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "apiary=debug,apiaryd=debug" } else { "apiary=info,apiaryd=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(if debug { Level::DEBUG } else { Level::INFO })
        .init();
}
