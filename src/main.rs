mod app;
mod commands;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;
mod scheduler;

use app::App;
use commands::{parse_args, Command, USAGE};
use config::Config;
use error::Result;

#[tokio::main]
async fn main() {
    // Initialize logging (info by default, override with RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let invocation = parse_args(std::env::args().skip(1))?;

    if invocation.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match &invocation.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let app = App::new(config).await?;

    match invocation.command {
        Command::Run => {
            tracing::info!(
                "Checking feeds every {} minutes, database at {}",
                app.config().check_interval_minutes,
                app.config().db_path
            );
            let scheduler = app.start_scheduler();

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");
            scheduler.shutdown().await?;
        }

        Command::Check => {
            let report = app.check_once().await?;
            println!(
                "{}: checked {} feeds ({} skipped, {} failed), {} new items",
                report.started_at.format("%Y-%m-%d %H:%M:%S"),
                report.sources_checked,
                report.sources_skipped,
                report.sources_failed,
                report.items_inserted
            );
        }

        Command::AddSource(url) => {
            app.add_source(&url).await?;
            println!("Source: {}", url.trim());
        }

        Command::RemoveSource(url) => {
            if app.remove_source(&url).await? {
                println!("Removed source {}", url.trim());
            } else {
                println!("No such source {}", url.trim());
            }
        }

        Command::AddKeyword(word) => {
            app.add_keyword(&word).await?;
            println!("Keyword: {}", word.trim());
        }

        Command::RemoveKeyword(word) => {
            if app.remove_keyword(&word).await? {
                println!("Removed keyword {}", word.trim());
            } else {
                println!("No such keyword {}", word.trim());
            }
        }

        Command::List => {
            println!("Sources:");
            for source in app.sources().await? {
                println!("  {}", source.url);
            }
            println!("Keywords:");
            for keyword in app.keywords().await? {
                println!("  {}", keyword.word);
            }
        }

        Command::News { limit, json } => {
            let news = app.recent_news(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&news)?);
            } else {
                for item in news {
                    println!("{}  {}", item.published, item.title);
                    println!("    {}", item.link);
                    println!("    via {}", item.source);
                }
            }
        }

        Command::Help => {}
    }

    Ok(())
}
