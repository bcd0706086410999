use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use obclient::Config;
use obclient::commands::{self, BANNER};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Open Banking client: registration, consent and accounts")]
struct Args {
    /// Path to the JSON config file
    #[arg(short = 'c', long, default_value = obclient::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dynamic register a new software client
    Register,
    /// View software client details
    Client,
    /// View software statement details
    Statement,
    /// View ASPSP openid configuration
    Configuration,
    /// Test certificates making a MTLS call to token
    Transport,
    /// Authorize flow to use ASPSP services
    Auth,
    /// View token details
    Token,
    /// List accounts
    Accounts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    tracing::debug!(config = %args.config.display(), "loaded config");

    println!("{BANNER}");
    let mut out = std::io::stdout().lock();
    match args.command {
        Command::Register => commands::register(&config, &mut out).await.map(drop)?,
        Command::Client => commands::client(&config, &mut out)?,
        Command::Statement => commands::statement(&config, &mut out)?,
        Command::Configuration => commands::configuration(&config, &mut out).await?,
        Command::Transport => commands::transport(&config, &mut out).await?,
        Command::Auth => commands::auth(&config, &mut out).await.map(drop)?,
        Command::Token => commands::token(&config, &mut out)?,
        Command::Accounts => commands::accounts(&config, &mut out).await?,
    }
    Ok(())
}
