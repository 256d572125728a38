//! The `bills` subcommand: trailing-window bill ingestion with
//! authorship enrichment.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{build_fetcher, FetchTuning};

#[derive(Args)]
pub struct BillsArgs {
    /// How many days back to fetch
    #[arg(long, default_value = "7")]
    pub days_back: i64,

    #[command(flatten)]
    pub tuning: FetchTuning,
}

pub async fn run(args: &BillsArgs, db_path: &Path, base_url: Option<&str>) -> Result<()> {
    let fetcher = build_fetcher(db_path, base_url, &args.tuning)?;
    fetcher.sync_bills(args.days_back).await?;
    eprintln!("Bill sync complete ({} days back)", args.days_back);
    Ok(())
}
