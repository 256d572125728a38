//! Fetch orchestration: windowed, paginated, enriched retrieval of each
//! upstream resource, handing one page at a time to the ingestor.
//!
//! Failure policy: a window or a single legislator's expense run failing
//! is logged and does not abort its siblings; the job is idempotent, so a
//! re-run recovers whatever was lost. Only a failure outside any
//! window/entity (e.g. the store refusing to open) propagates.

use std::sync::Arc;

use camara_api::{BillQuery, CamaraExtractor, ExpenseQuery, LegislatorQuery, Query, RollCallQuery};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::db::{Db, DbError};
use crate::ingest::Ingestor;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("api error: {0}")]
    Api(#[from] camara_api::Error),
    #[error("storage error: {0}")]
    Db(#[from] DbError),
}

/// Tuning knobs for one orchestrator instance.
#[derive(Clone)]
pub struct FetchConfig {
    /// Items requested per page.
    pub page_size: i64,
    /// Safety ceiling on pages per window or per legislator; stops runaway
    /// pagination if upstream never returns an empty page.
    pub max_pages: u32,
    /// Maximum days per request window; the upstream rejects wider spans.
    pub window_days: i64,
    /// Concurrent legislators during the expense fan-out.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
            window_days: 90,
            concurrency: 10,
        }
    }
}

/// Drives complete ingestion runs, one resource type per entry point.
/// Every entry point is safe to invoke repeatedly and concurrently with
/// itself for different windows.
pub struct Fetcher {
    extractor: Arc<CamaraExtractor>,
    db: Arc<Mutex<Db>>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(extractor: CamaraExtractor, db: Db, config: FetchConfig) -> Self {
        Self {
            extractor: Arc::new(extractor),
            db: Arc::new(Mutex::new(db)),
            config,
        }
    }

    /// Shared handle to the store, for inspection after a run.
    pub fn db(&self) -> Arc<Mutex<Db>> {
        Arc::clone(&self.db)
    }

    /// Fetches the whole legislator population, one page per batch.
    pub async fn sync_legislators(&self) -> Result<(), FetchError> {
        let mut page = 1i64;
        loop {
            if page > self.config.max_pages as i64 {
                tracing::warn!("legislators: page ceiling {} reached", self.config.max_pages);
                break;
            }
            let query = LegislatorQuery::default()
                .with_page(page)
                .with_page_size(self.config.page_size);
            let raw = self.extractor.legislators(&query).await?;
            if raw.is_empty() {
                break;
            }
            let summary = {
                let mut db = self.db.lock().await;
                Ingestor::new(&mut db).legislators_batch(&raw)?
            };
            tracing::info!(
                page,
                ingested = summary.ingested,
                rejected = summary.rejected,
                "legislators page done"
            );
            page += 1;
        }
        self.record_sync("legislators").await
    }

    /// Fetches one year of expenses for every legislator already in the
    /// store, fanning out across legislators with bounded concurrency.
    /// Pages within one legislator stay strictly ordered.
    pub async fn sync_expenses(&self, year: i32) -> Result<(), FetchError> {
        let ids = {
            let db = self.db.lock().await;
            db.legislator_ids()?
        };
        if ids.is_empty() {
            tracing::warn!("no legislators in store; run the legislators sync first");
            return Ok(());
        }
        tracing::info!(
            legislators = ids.len(),
            year,
            concurrency = self.config.concurrency,
            "starting expense fan-out"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        for id in ids {
            let semaphore = Arc::clone(&semaphore);
            let extractor = Arc::clone(&self.extractor);
            let db = Arc::clone(&self.db);
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                if let Err(err) = legislator_expenses(&extractor, &db, &config, id, year).await {
                    tracing::warn!("expenses for legislator {} failed: {}", id, err);
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!("expense task panicked: {}", err);
            }
        }
        self.record_sync("expenses").await
    }

    /// Fetches bills presented in the trailing window, enriching each page
    /// with per-bill authors before ingestion.
    pub async fn sync_bills(&self, days_back: i64) -> Result<(), FetchError> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(days_back);
        for (from, to) in date_windows(start, end, self.config.window_days) {
            if let Err(err) = self.bill_window(from, to).await {
                tracing::warn!("bills window {}..{} failed: {}", from, to, err);
            }
        }
        self.record_sync("bills").await
    }

    async fn bill_window(&self, from: NaiveDate, to: NaiveDate) -> Result<(), FetchError> {
        tracing::info!("fetching bills from {} to {}", from, to);
        let mut page = 1i64;
        loop {
            if page > self.config.max_pages as i64 {
                tracing::warn!("bills {}..{}: page ceiling reached", from, to);
                break;
            }
            let query = BillQuery::default()
                .with_window(from, to)
                .with_page(page)
                .with_page_size(self.config.page_size);
            let mut raw = self.extractor.bills(&query).await?;
            if raw.is_empty() {
                break;
            }

            for item in raw.iter_mut() {
                let Some(id) = item.get("id").and_then(Value::as_i64) else {
                    continue;
                };
                match self.extractor.bill_authors(id).await {
                    Ok(authors) => {
                        if let Some(obj) = item.as_object_mut() {
                            obj.insert("autores".to_string(), Value::Array(authors));
                        }
                    }
                    // The bill is still ingested, just without authorship.
                    Err(err) => tracing::warn!("authors for bill {} failed: {}", id, err),
                }
            }

            let summary = {
                let mut db = self.db.lock().await;
                Ingestor::new(&mut db).bills_batch(&raw)?
            };
            tracing::info!(
                page,
                ingested = summary.ingested,
                rejected = summary.rejected,
                "bills page done"
            );
            page += 1;
        }
        Ok(())
    }

    /// Fetches roll calls held in the trailing window, enriching each page
    /// with per-roll-call votes before ingestion.
    pub async fn sync_roll_calls(&self, days_back: i64) -> Result<(), FetchError> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(days_back);
        for (from, to) in date_windows(start, end, self.config.window_days) {
            if let Err(err) = self.roll_call_window(from, to).await {
                tracing::warn!("roll calls window {}..{} failed: {}", from, to, err);
            }
        }
        self.record_sync("roll_calls").await
    }

    async fn roll_call_window(&self, from: NaiveDate, to: NaiveDate) -> Result<(), FetchError> {
        tracing::info!("fetching roll calls from {} to {}", from, to);
        let mut page = 1i64;
        loop {
            if page > self.config.max_pages as i64 {
                tracing::warn!("roll calls {}..{}: page ceiling reached", from, to);
                break;
            }
            let query = RollCallQuery::default()
                .with_window(from, to)
                .with_page(page)
                .with_page_size(self.config.page_size);
            let mut raw = self.extractor.roll_calls(&query).await?;
            if raw.is_empty() {
                break;
            }

            for item in raw.iter_mut() {
                let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                match self.extractor.roll_call_votes(&id).await {
                    Ok(votes) => {
                        if let Some(obj) = item.as_object_mut() {
                            obj.insert("votos".to_string(), Value::Array(votes));
                        }
                    }
                    Err(err) => tracing::warn!("votes for roll call {} failed: {}", id, err),
                }
            }

            let summary = {
                let mut db = self.db.lock().await;
                Ingestor::new(&mut db).roll_calls_batch(&raw)?
            };
            tracing::info!(
                page,
                ingested = summary.ingested,
                rejected = summary.rejected,
                "roll calls page done"
            );
            page += 1;
        }
        Ok(())
    }

    async fn record_sync(&self, resource: &str) -> Result<(), FetchError> {
        let db = self.db.lock().await;
        db.set_meta(&format!("last_sync_{}", resource), &Utc::now().to_rfc3339())?;
        Ok(())
    }
}

/// One legislator's expense pagination loop, run inside the fan-out pool.
async fn legislator_expenses(
    extractor: &CamaraExtractor,
    db: &Mutex<Db>,
    config: &FetchConfig,
    legislator_id: i64,
    year: i32,
) -> Result<(), FetchError> {
    let mut page = 1i64;
    loop {
        if page > config.max_pages as i64 {
            tracing::warn!(
                "expenses for legislator {}: page ceiling reached",
                legislator_id
            );
            break;
        }
        let query = ExpenseQuery::default()
            .with_year(year)
            .with_page(page)
            .with_page_size(config.page_size);
        let raw = extractor.expenses(legislator_id, &query).await?;
        if raw.is_empty() {
            break;
        }
        {
            let mut db = db.lock().await;
            Ingestor::new(&mut db).expenses_batch(legislator_id, &raw)?;
        }
        page += 1;
    }
    Ok(())
}

/// Splits `[start, end]` into consecutive windows of at most `max_days`
/// days each.
pub fn date_windows(start: NaiveDate, end: NaiveDate, max_days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + Duration::days(max_days)).min(end);
        windows.push((cursor, window_end));
        cursor = window_end + Duration::days(1);
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn short_range_is_one_window() {
        let windows = date_windows(date(2024, 5, 1), date(2024, 5, 8), 90);
        assert_eq!(windows, vec![(date(2024, 5, 1), date(2024, 5, 8))]);
    }

    #[test]
    fn long_range_splits_at_the_limit() {
        let windows = date_windows(date(2024, 1, 1), date(2024, 7, 1), 90);
        assert_eq!(
            windows,
            vec![
                (date(2024, 1, 1), date(2024, 3, 31)),
                (date(2024, 4, 1), date(2024, 6, 30)),
                (date(2024, 7, 1), date(2024, 7, 1)),
            ]
        );
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_range() {
        let start = date(2023, 1, 15);
        let end = date(2024, 3, 2);
        let windows = date_windows(start, end, 90);

        assert_eq!(windows.first().unwrap().0, start);
        assert_eq!(windows.last().unwrap().1, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1 + Duration::days(1), pair[1].0);
        }
        for (from, to) in &windows {
            assert!(from <= to);
            assert!(*to - *from <= Duration::days(90));
        }
    }

    #[test]
    fn zero_length_range_is_a_single_day_window() {
        let windows = date_windows(date(2024, 5, 1), date(2024, 5, 1), 90);
        assert_eq!(windows, vec![(date(2024, 5, 1), date(2024, 5, 1))]);
    }

    #[test]
    fn inverted_range_yields_no_windows() {
        assert!(date_windows(date(2024, 5, 2), date(2024, 5, 1), 90).is_empty());
    }
}
