use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wallfeed::app::AppContext;
use wallfeed::cli::{commands, Cli, Commands};
use wallfeed::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Feed { more } => {
            commands::show_feed(&ctx, more).await?;
        }
        Commands::Scan { cursor, batch } => {
            commands::scan(&ctx, cursor, batch).await?;
        }
        Commands::Page {
            page,
            category,
            ai,
            sort,
        } => {
            commands::fetch_page(&ctx, page, category, ai, sort).await?;
        }
        Commands::Watch {
            interval,
            no_initial,
        } => {
            commands::watch(&ctx, interval, no_initial).await?;
        }
    }

    Ok(())
}
