use clap::{Parser, Subcommand};
use election_scraper::app::ports::{HttpClientPort, PublisherPort};
use election_scraper::config::{Config, DEFAULT_CONFIG_PATH};
use election_scraper::infra::{DatawrapperPublisher, LogPublisher, ReqwestHttp};
use election_scraper::logging;
use election_scraper::pipeline::storage::sweep_expired;
use election_scraper::pipeline::{run_groups, PipelineSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "election_scraper")]
#[command(about = "Election night results: poll state APIs, rebuild tables, refresh charts")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, tabulate and publish the configured contest groups
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Contest group keys to run (comma-separated). Default: all
        #[arg(long, value_delimiter = ',')]
        groups: Option<Vec<String>>,
        /// Write CSVs and snapshots but only log what would be published
        #[arg(long)]
        dry_run: bool,
        /// Leave old snapshots in place after the run
        #[arg(long)]
        skip_sweep: bool,
    },
    /// List the configured contest groups
    List {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Delete snapshots older than the retention window
    Sweep {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn sweep(config: &Config) -> anyhow::Result<usize> {
    let removed = sweep_expired(
        &config.snapshots.dir,
        config.snapshots.retention(),
        SystemTime::now(),
    )?;
    info!(
        "Removed {} snapshots older than {}h from {}",
        removed.len(),
        config.snapshots.retention_hours,
        config.snapshots.dir.display()
    );
    Ok(removed.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let log_guard = logging::init_logging(logging::LOG_DIR)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            groups,
            dry_run,
            skip_sweep,
        } => {
            let config = Config::load(&config)?;
            let selected = config.select_groups(groups.as_deref())?;
            let settings = PipelineSettings::from_config(&config)?;

            let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&config.http)?);
            let publisher: Arc<dyn PublisherPort> = if dry_run {
                info!("Dry run: charts will not be touched");
                Arc::new(LogPublisher)
            } else {
                Arc::new(DatawrapperPublisher::new(&config.publisher, &config.http)?)
            };

            println!("🗳️  Running {} contest groups...", selected.len());
            let summary = run_groups(&selected, &config.endpoints, http, publisher, &settings).await;

            for result in &summary.completed {
                println!(
                    "   ✅ {}: {} rows -> {}",
                    result.group,
                    result.rows,
                    result.csv_path.display()
                );
            }
            for failure in &summary.failed {
                println!("   ❌ {}", failure);
            }

            if !skip_sweep {
                if let Err(e) = sweep(&config) {
                    warn!("Snapshot sweep failed: {}", e);
                }
            }

            if !summary.all_succeeded() {
                // exit skips destructors; flush the log file first
                drop(log_guard);
                std::process::exit(summary.exit_code());
            }
        }
        Commands::List { config } => {
            let config = Config::load(&config)?;
            for group in &config.groups {
                println!(
                    "{:<24} {:<8} {:<32} {}",
                    group.key, group.destination, group.output_file, group.title
                );
            }
        }
        Commands::Sweep { config } => {
            let config = Config::load(&config)?;
            let removed = sweep(&config)?;
            println!("🧹 Removed {} expired snapshots", removed);
        }
    }

    Ok(())
}
