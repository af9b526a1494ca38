mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    DumpArgs, EditArgs, cmd_dump, cmd_edit, cmd_export, cmd_goals, cmd_history, cmd_import,
    cmd_show, cmd_summary,
};
use crate::config::{Config, DEFAULT_LOG_FILTER};
use healthdump_core::service::HealthService;

#[derive(Parser)]
#[command(
    name = "healthdump",
    version,
    about = "Daily health records from your phone, reconciled and measured against your own averages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a day's totals (default: today)
    Dump {
        /// Step count
        #[arg(long)]
        steps: String,
        /// Active energy in kcal
        #[arg(long)]
        kcals: String,
        /// Distance walked/run in km
        #[arg(long)]
        km: String,
        /// Flights of stairs climbed
        #[arg(long)]
        flights: Option<String>,
        /// Body weight (comma or dot decimal)
        #[arg(long)]
        weight: Option<String>,
        /// Date the totals describe (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a stored day; unnamed fields keep their value
    Edit {
        /// Date to edit (YYYY-MM-DD or today/yesterday)
        date: String,
        #[arg(long)]
        steps: Option<String>,
        #[arg(long)]
        kcals: Option<String>,
        #[arg(long)]
        km: Option<String>,
        #[arg(long, conflicts_with = "clear_flights")]
        flights: Option<String>,
        /// Remove the stored flights value
        #[arg(long)]
        clear_flights: bool,
        #[arg(long, conflicts_with = "clear_weight")]
        weight: Option<String>,
        /// Remove the stored weight
        #[arg(long)]
        clear_weight: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one day (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored days, most recent first
    History {
        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show goals derived from the recent average
    Goals {
        /// Days to average over (default: goal_window_days from config)
        #[arg(short, long)]
        days: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily report against goals (default: yesterday)
    Summary {
        /// Date (YYYY-MM-DD or today/yesterday)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Backfill days from a CSV file
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write every stored day as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on (default: from config, 5009)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind to (default: from config, 127.0.0.1)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config_filter
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    });
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    init_tracing(config.log_filter.as_deref());
    tracing::debug!(db_path = %config.db_path.display(), "opening database");
    let svc = HealthService::new(&config.db_path)?;

    match cli.command {
        Commands::Dump {
            steps,
            kcals,
            km,
            flights,
            weight,
            date,
            json,
        } => cmd_dump(
            &svc,
            DumpArgs {
                steps,
                kcals,
                km,
                flights,
                weight,
                date,
            },
            json,
        ),
        Commands::Edit {
            date,
            steps,
            kcals,
            km,
            flights,
            clear_flights,
            weight,
            clear_weight,
            json,
        } => cmd_edit(
            &svc,
            &date,
            EditArgs {
                steps,
                kcals,
                km,
                flights,
                clear_flights,
                weight,
                clear_weight,
            },
            json,
        ),
        Commands::Show { date, json } => cmd_show(&svc, date.as_deref(), json),
        Commands::History { start, end, json } => {
            cmd_history(&svc, start.as_deref(), end.as_deref(), json)
        }
        Commands::Goals { days, json } => {
            cmd_goals(&svc, days.unwrap_or(config.goal_window_days), json)
        }
        Commands::Summary { date, json } => {
            cmd_summary(&svc, date.as_deref(), config.goal_window_days, json)
        }
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&svc, &file, dry_run, json),
        Commands::Export { output } => cmd_export(&svc, output.as_deref()),
        Commands::Serve { port, bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            let port = port.unwrap_or(config.server.port);
            server::start_server(svc, &bind, port, config.goal_window_days).await
        }
    }
}
