//! The `roll-calls` subcommand: trailing-window roll-call ingestion with
//! per-vote enrichment.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{build_fetcher, FetchTuning};

#[derive(Args)]
pub struct RollCallsArgs {
    /// How many days back to fetch
    #[arg(long, default_value = "7")]
    pub days_back: i64,

    #[command(flatten)]
    pub tuning: FetchTuning,
}

pub async fn run(args: &RollCallsArgs, db_path: &Path, base_url: Option<&str>) -> Result<()> {
    let fetcher = build_fetcher(db_path, base_url, &args.tuning)?;
    fetcher.sync_roll_calls(args.days_back).await?;
    eprintln!("Roll-call sync complete ({} days back)", args.days_back);
    Ok(())
}
