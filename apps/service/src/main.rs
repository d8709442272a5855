use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::anyhow;
use chrono::Local;
use clap::{Parser, Subcommand};
use heartbeat::{HttpProbe, Scheduler, ServiceStore};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

mod alerts;
mod config;
mod database;
mod error;
mod pool;
mod report;
mod routes;
mod validation;

use alerts::{AlertFanout, DiscordWebhook, EmailNotifier};
use config::Config;
use database::Repository;
use error::AppError;
use report::WeeklyReport;

#[derive(Debug, Parser)]
#[command(version, about = "Uptime monitor for HTTP services")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/heartbeat/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start monitoring (default)
    Run,
    /// Register a service to monitor
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Seconds between checks
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Print every service with its status
    List,
    /// Delete a service and its logs
    Remove { id: i64 },
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_deref())?;
    let level = config.logging.level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    logger::init_with(level, config.logging.format.parse().ok());
    debug!("{config}");

    let repo = database::open(&config.database).await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, repo).await,
        Command::Add { name, url, interval } => add(&repo, &name, &url, interval).await,
        Command::List => list(&repo).await,
        Command::Remove { id } => remove(&repo, id).await,
    }
}

async fn run(config: Config, repo: Repository) -> Result<(), AppError> {
    let engine = config.monitor.engine_config();
    let probe = Arc::new(HttpProbe::new(engine.probe_timeout)?);
    let email = EmailNotifier::from_config(&config.alerts.email)?.map(Arc::new);

    let mut alerts = AlertFanout::new();
    if let Some(discord) = DiscordWebhook::from_config(&config.alerts.discord)? {
        alerts = alerts.with_channel("discord", Arc::new(discord));
    }
    if let Some(email) = &email {
        alerts = alerts.with_channel("email", email.clone());
    }
    info!(channels = ?alerts.channel_names(), "Alert channels configured");

    let store: Arc<dyn ServiceStore> = Arc::new(repo.clone());
    let scheduler = Arc::new(Scheduler::from_parts(store, probe, Arc::new(alerts), &engine));
    let mut monitor = tokio::spawn(scheduler.run());

    let report = match (&email, config.report.enabled) {
        (Some(email), true) => {
            let report = WeeklyReport::from_config(&config.report, repo, email.clone())?;
            Some(tokio::spawn(async move {
                if let Err(e) = report.run().await {
                    error!(error = %e, "Weekly report stopped");
                }
            }))
        }
        (None, true) => {
            info!("Weekly report enabled but email is not configured, skipping");
            None
        }
        (_, false) => None,
    };

    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port).parse()?;
    info!(%addr, "Liveness endpoint listening");
    let server = HttpServer::new(|| App::new().configure(routes::routes)).bind(addr)?.run();

    tokio::select! {
        result = server => result?,
        joined = &mut monitor => {
            if let Err(e) = joined {
                error!(error = %e, "Monitor scheduler task failed");
            }
        }
    }

    monitor.abort();
    if let Some(report) = report {
        report.abort();
    }
    info!("Shutting down");
    Ok(())
}

async fn add(repo: &Repository, name: &str, url: &str, interval: u64) -> Result<(), AppError> {
    validation::validate_service_name(name)?;
    validation::validate_service_url(url)?;
    validation::validate_interval(interval)?;

    let service = repo.insert_service(name.trim(), url, interval).await?;
    println!("Added service #{} {} ({}) every {}s", service.id, service.name, service.url, service.interval_seconds);
    Ok(())
}

async fn list(repo: &Repository) -> Result<(), AppError> {
    let services = repo.list_services().await?;
    if services.is_empty() {
        println!("No services registered");
        return Ok(());
    }

    println!("{:<5} {:<24} {:<6} {:<9} {:<20} URL", "ID", "NAME", "STATUS", "INTERVAL", "LAST CHECK");
    for service in services {
        let last_checked = service
            .last_checked_at
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<5} {:<24} {:<6} {:<9} {:<20} {}",
            service.id,
            service.name,
            service.status.as_str(),
            format!("{}s", service.interval_seconds),
            last_checked,
            service.url
        );
    }
    Ok(())
}

async fn remove(repo: &Repository, id: i64) -> Result<(), AppError> {
    let Some(service) = repo.delete_service(id).await? else {
        return Err(anyhow!("No service with id {id}").into());
    };
    println!("Removed service #{} {} ({})", service.id, service.name, service.url);
    Ok(())
}
