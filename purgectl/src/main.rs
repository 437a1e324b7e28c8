use ccu::signer::NoopSigner;
use ccu::{PurgeClient, PurgeStatusStore, get_store};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

mod commands;
mod config;
mod observability;

use commands::{App, PurgeOptions};
use config::Config;

#[derive(Parser)]
#[command(about = "Purge URLs from the Akamai edge cache")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "purgectl.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Purge paths, fully qualified URLs or CP codes (with --type cpcode)
    Purge {
        #[arg(required = true)]
        paths: Vec<String>,
        /// remove or invalidate
        #[arg(long)]
        action: Option<String>,
        /// production or staging
        #[arg(long)]
        domain: Option<String>,
        /// arl or cpcode
        #[arg(long = "type")]
        object_type: Option<String>,
        #[arg(long)]
        queue: Option<String>,
    },
    /// Print the number of items waiting in the purge queue
    QueueLength,
    /// Check the configured credentials against the API
    Verify,
    /// Inspect and manage tracked purge statuses
    Status {
        #[command(subcommand)]
        command: StatusCommand,
    },
    /// List the metrics emitted by purgectl
    Metrics,
}

#[derive(Subcommand)]
enum StatusCommand {
    List,
    Show { purge_id: String },
    /// Fetch the current status from the API and record it
    Check { purge_id: String },
    Delete { purge_id: String },
    /// Remove statuses older than the configured expiry
    Expire {
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let CliCommand::Metrics = cli.command {
        commands::list_metrics();
        return ExitCode::SUCCESS;
    }

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry = observability::init_logging(&config.logging);
    if let Some(metrics) = &config.metrics
        && let Err(e) = observability::init_metrics(metrics)
    {
        warn!(error = %e, "metrics disabled");
    }

    let mut app = match build_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "could not start");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        CliCommand::Purge {
            paths,
            action,
            domain,
            object_type,
            queue,
        } => {
            let options = PurgeOptions {
                action,
                domain,
                object_type,
                queue,
            };
            app.purge(&paths, options).await
        }
        CliCommand::QueueLength => app.queue_length().await,
        CliCommand::Verify => app.verify().await,
        CliCommand::Status { command } => match command {
            StatusCommand::List => app.list_statuses(),
            StatusCommand::Show { purge_id } => app.show_status(&purge_id),
            StatusCommand::Check { purge_id } => app.check_status(&purge_id).await,
            StatusCommand::Delete { purge_id } => app.delete_status(&purge_id),
            StatusCommand::Expire { max_age_secs } => {
                app.expire(max_age_secs.map(Duration::from_secs))
            }
        },
        CliCommand::Metrics => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_app(config: &Config) -> Result<App, commands::CommandError> {
    let kv = get_store(&config.status_store.r#type)?;
    let status_store = Arc::new(PurgeStatusStore::new(kv.clone()));

    if !config.ccu.devel_mode {
        warn!("requests are sent unsigned, rest_api_url must point at a signing proxy");
    }
    let client = PurgeClient::from_config(&config.ccu, Arc::new(NoopSigner), status_store.clone())?;

    Ok(App {
        client,
        status_store,
        kv,
        status_expire: config.status_store.status_expire(),
    })
}
