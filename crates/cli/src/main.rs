mod check_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    murmur_config::{MurmurConfig, validate},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "murmur", about = "Murmur: ephemeral whisper relay for Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of the discovered one.
    #[arg(long, short, global = true, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the bot until interrupted (default).
    Run,
    /// Validate the configuration and report errors and warnings.
    Check {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MurmurConfig> {
    match &cli.config {
        Some(path) => murmur_config::load_config(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(murmur_config::discover_and_load()),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;

    let result = validate::validate_config(&config);
    for d in &result.diagnostics {
        warn!(severity = %d.severity, path = %d.path, "{}", d.message);
    }
    if result.has_errors() {
        anyhow::bail!("configuration is invalid; run `murmur check` for details");
    }

    let cancel = murmur_telegram::start_polling(&config).await?;
    info!(
        ttl_secs = config.whisper.ttl_secs,
        view_cooldown_secs = config.whisper.view_cooldown_secs,
        "whisper relay running"
    );

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            info!("shutdown requested");
        },
        _ = cancel.cancelled() => {
            warn!("polling stopped");
        },
    }
    cancel.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "murmur starting");

    match cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::Check { verbose }) => {
            check_commands::check(cli.config.as_deref(), verbose)
        },
    }
}
