//! `harbor-fetch` entry point.

use std::process::ExitCode;

use harbor_cli::args::CONFIG_ENV_VAR;
use harbor_cli::{build_cache, format_stats, run, CliArgs, CliError};
use harbor_core::HarborConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harbor=info,warn"));

    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

async fn main_inner() -> Result<(), CliError> {
    let args = CliArgs::from_env()?;
    if args.help {
        println!("usage: harbor-fetch [--config <path>] [--refresh] [--clear] <url>...");
        return Ok(());
    }

    let config = match args.resolve_config_path(std::env::var(CONFIG_ENV_VAR).ok()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config");
            HarborConfig::from_path(&path)?
        }
        None => HarborConfig::default(),
    };

    let cache = build_cache(&config)?;
    let (reports, stats) = run(&cache, &args).await;
    for report in &reports {
        println!("{report}");
    }
    println!("{}", format_stats(&stats));
    cache.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match main_inner().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("harbor-fetch: {e}");
            ExitCode::FAILURE
        }
    }
}
