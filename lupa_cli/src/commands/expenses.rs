//! The `expenses` subcommand: yearly expense backfill for every known
//! legislator.

use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, Utc};
use clap::Args;

use super::{build_fetcher, FetchTuning};

#[derive(Args)]
pub struct ExpensesArgs {
    /// Calendar year to backfill. Defaults to the current year.
    #[arg(long)]
    pub year: Option<i32>,

    #[command(flatten)]
    pub tuning: FetchTuning,
}

pub async fn run(args: &ExpensesArgs, db_path: &Path, base_url: Option<&str>) -> Result<()> {
    let year = args.year.unwrap_or_else(|| Utc::now().date_naive().year());
    let fetcher = build_fetcher(db_path, base_url, &args.tuning)?;
    fetcher.sync_expenses(year).await?;
    eprintln!("Expense sync for {} complete", year);
    Ok(())
}
