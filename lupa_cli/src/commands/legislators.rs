//! The `legislators` subcommand: ingest the deputy population.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{build_fetcher, FetchTuning};

#[derive(Args)]
pub struct LegislatorsArgs {
    #[command(flatten)]
    pub tuning: FetchTuning,
}

pub async fn run(args: &LegislatorsArgs, db_path: &Path, base_url: Option<&str>) -> Result<()> {
    let fetcher = build_fetcher(db_path, base_url, &args.tuning)?;
    fetcher.sync_legislators().await?;

    let db = fetcher.db();
    let count = db.lock().await.legislator_count()?;
    eprintln!("Sync complete: {} legislators in store", count);
    Ok(())
}
