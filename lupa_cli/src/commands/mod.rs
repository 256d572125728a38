pub mod bills;
pub mod dlq;
pub mod expenses;
pub mod legislators;
pub mod roll_calls;

use std::path::Path;

use anyhow::{ensure, Result};
use clap::Args;
use lupa_lib::camara_api::{CamaraExtractor, Client};
use lupa_lib::{Db, FetchConfig, Fetcher};

/// Pagination and fan-out knobs shared by all fetch subcommands.
#[derive(Args)]
pub struct FetchTuning {
    /// Items requested per page (1-100)
    #[arg(long, default_value = "100")]
    pub page_size: i64,

    /// Safety ceiling on pages per window or per legislator
    #[arg(long, default_value = "50")]
    pub max_pages: u32,

    /// Concurrent legislators during the expense fan-out
    #[arg(long, default_value = "10")]
    pub concurrency: usize,
}

pub fn build_fetcher(
    db_path: &Path,
    base_url: Option<&str>,
    tuning: &FetchTuning,
) -> Result<Fetcher> {
    ensure!(
        (1..=100).contains(&tuning.page_size),
        "--page-size must be between 1 and 100"
    );
    ensure!(tuning.max_pages >= 1, "--max-pages must be at least 1");
    ensure!(tuning.concurrency >= 1, "--concurrency must be at least 1");

    let db = Db::open(db_path)?;
    db.init()?;

    let base = base_url
        .map(str::to_string)
        .or_else(|| std::env::var("CAMARA_BASE_URL").ok());
    let client = match base {
        Some(url) => Client::with_base_url(&url),
        None => Client::new(),
    };

    let config = FetchConfig {
        page_size: tuning.page_size,
        max_pages: tuning.max_pages,
        concurrency: tuning.concurrency,
        ..FetchConfig::default()
    };
    Ok(Fetcher::new(CamaraExtractor::new(client), db, config))
}
