use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use octofeed::app::AppContext;
use octofeed::cli::{commands, Cli, Commands};
use octofeed::config::Config;
use octofeed::daemon::PidFile;
use octofeed::domain::SubscriberKey;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("octofeed=info")))
        .init();

    let cli = Cli::parse();

    // Process control does not need the database
    match cli.command {
        Commands::Stop => {
            commands::stop(&pid_path()?)?;
            return Ok(());
        }
        Commands::Status => {
            commands::status(&pid_path()?);
            return Ok(());
        }
        _ => {}
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config, cli.database)?;

    match cli.command {
        Commands::Add {
            bot_id,
            group_id,
            source,
        } => {
            commands::add_subscription(&ctx, SubscriberKey::new(bot_id, group_id), &source).await?;
        }
        Commands::Remove {
            bot_id,
            group_id,
            source,
        } => {
            commands::remove_subscription(&ctx, SubscriberKey::new(bot_id, group_id), &source)?;
        }
        Commands::List { bot_id, group_id } => {
            commands::list_subscriptions(&ctx, SubscriberKey::new(bot_id, group_id))?;
        }
        Commands::Sources => {
            commands::list_sources(&ctx)?;
        }
        Commands::Run {
            interval,
            timeout,
            no_initial_run,
        } => {
            let config = commands::scheduler_config(
                &ctx,
                interval.as_deref(),
                timeout.as_deref(),
                no_initial_run,
            )?;
            commands::run_poller(&ctx, config, &pid_path()?).await?;
        }
        Commands::Once => {
            commands::run_once(&ctx, &pid_path()?).await?;
        }
        Commands::Stop | Commands::Status => {}
    }

    Ok(())
}

fn pid_path() -> anyhow::Result<std::path::PathBuf> {
    PidFile::default_path().ok_or_else(|| anyhow::anyhow!("Could not determine PID file path"))
}
