mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lupa")]
#[command(about = "Ingest Câmara dos Deputados open data into SQLite")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "lupa.db", global = true)]
    db: PathBuf,

    /// Override the upstream API base URL (also CAMARA_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the whole legislator population
    Legislators(commands::legislators::LegislatorsArgs),
    /// Fetch one year of expenses for every known legislator
    Expenses(commands::expenses::ExpensesArgs),
    /// Fetch bills presented in a trailing window, with authorship
    Bills(commands::bills::BillsArgs),
    /// Fetch roll calls held in a trailing window, with individual votes
    RollCalls(commands::roll_calls::RollCallsArgs),
    /// Inspect or resolve dead-letter entries
    Dlq(commands::dlq::DlqArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lupa_cli=info".parse().unwrap())
                .add_directive("lupa_lib=info".parse().unwrap())
                .add_directive("camara_api=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url.as_deref();

    match &cli.command {
        Commands::Legislators(args) => commands::legislators::run(args, &cli.db, base_url).await,
        Commands::Expenses(args) => commands::expenses::run(args, &cli.db, base_url).await,
        Commands::Bills(args) => commands::bills::run(args, &cli.db, base_url).await,
        Commands::RollCalls(args) => commands::roll_calls::run(args, &cli.db, base_url).await,
        Commands::Dlq(args) => commands::dlq::run(args, &cli.db),
    }
}
