//! SQLite storage for ingested Câmara data.
//!
//! Every `apply_*_batch` method is one transaction: dependency upserts
//! first, then primary upserts keyed on the upstream natural id, then
//! association replacement, then dead letters. Any failure rolls back the
//! whole batch; re-running the batch is always safe.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::model::{Bill, Company, DeadLetter, Expense, Legislator, Party, RollCall};

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of the dead-letter table, as surfaced to operators.
#[derive(Debug, Clone)]
pub struct DeadLetterRow {
    pub id: i64,
    pub origin: String,
    pub payload: String,
    pub error_message: String,
    pub error_type: Option<String>,
    pub retry_count: i64,
    pub resolved: bool,
    pub created_at: String,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for tests).
    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < 1 {
            self.conn.pragma_update(None, "user_version", 1)?;
        }
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, DbError> {
        self.conn
            .query_row(
                "SELECT value FROM ingest_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO ingest_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Ids of every legislator currently in the store, used to fan out the
    /// whole-population expense fetch.
    pub fn legislator_ids(&self) -> Result<Vec<i64>, DbError> {
        let mut stmt = self.conn.prepare("SELECT id FROM legislators ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn legislator_count(&self) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(1) FROM legislators", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Upserts parties then legislators, plus the batch's dead letters.
    pub fn apply_legislator_batch(
        &mut self,
        parties: &[Party],
        legislators: &[Legislator],
        dead: &[DeadLetter],
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt_party = tx.prepare(
                "INSERT INTO parties (id, acronym, name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                   acronym = excluded.acronym,
                   name = excluded.name",
            )?;
            for party in parties {
                stmt_party.execute(params![party.id, party.acronym, party.name])?;
            }

            let mut stmt_legislator = tx.prepare(
                "INSERT INTO legislators (
                   id, name, civil_name, state, party_id, legislature_id, email, photo_url
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   civil_name = COALESCE(excluded.civil_name, legislators.civil_name),
                   state = excluded.state,
                   party_id = excluded.party_id,
                   legislature_id = excluded.legislature_id,
                   email = excluded.email,
                   photo_url = excluded.photo_url",
            )?;
            for legislator in legislators {
                stmt_legislator.execute(params![
                    legislator.id,
                    legislator.name,
                    legislator.civil_name,
                    legislator.state,
                    legislator.party.as_ref().map(|p| p.id),
                    legislator.legislature_id,
                    legislator.email,
                    legislator.photo_url,
                ])?;
            }
        }
        insert_dead_letters(&tx, dead)?;
        tx.commit()?;
        Ok(())
    }

    /// Upserts companies then one legislator's expenses, plus dead
    /// letters. If the owning legislator is not in the store the expense
    /// rows are dropped with a warning; the dead letters are kept either
    /// way.
    pub fn apply_expense_batch(
        &mut self,
        legislator_id: i64,
        companies: &[Company],
        expenses: &[Expense],
        dead: &[DeadLetter],
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut known = KnownLegislators::new(&tx)?;
            if !expenses.is_empty() && !known.contains(legislator_id)? {
                tracing::warn!(
                    "dropping {} expenses for unknown legislator {}",
                    expenses.len(),
                    legislator_id
                );
            } else {
                let mut stmt_company = tx.prepare(
                    "INSERT INTO companies (cnpj, trade_name)
                     VALUES (?1, ?2)
                     ON CONFLICT(cnpj) DO UPDATE SET
                       trade_name = COALESCE(excluded.trade_name, companies.trade_name)",
                )?;
                for company in companies {
                    stmt_company.execute(params![company.cnpj, company.trade_name])?;
                }

                let mut stmt_expense = tx.prepare(
                    "INSERT INTO expenses (
                       ext_id, legislator_id, company_cnpj, amount, issued_on,
                       expense_type, document_url
                     )
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(ext_id) DO UPDATE SET
                       legislator_id = excluded.legislator_id,
                       company_cnpj = excluded.company_cnpj,
                       amount = excluded.amount,
                       issued_on = excluded.issued_on,
                       expense_type = excluded.expense_type,
                       document_url = excluded.document_url",
                )?;
                for expense in expenses {
                    stmt_expense.execute(params![
                        expense.ext_id,
                        legislator_id,
                        expense.company_cnpj,
                        expense.amount.to_string(),
                        expense.issued_on.map(|d| d.to_string()),
                        expense.expense_type,
                        expense.document_url,
                    ])?;
                }
            }
        }
        insert_dead_letters(&tx, dead)?;
        tx.commit()?;
        Ok(())
    }

    /// Upserts bills and replaces their authorship sets, plus dead
    /// letters. Authorship referencing legislators absent from the store
    /// is silently filtered.
    pub fn apply_bill_batch(&mut self, bills: &[Bill], dead: &[DeadLetter]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt_bill = tx.prepare(
                "INSERT INTO bills (
                   id, type_acronym, type_code, number, year, summary, presented_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   type_acronym = excluded.type_acronym,
                   type_code = excluded.type_code,
                   number = excluded.number,
                   year = excluded.year,
                   summary = excluded.summary,
                   presented_at = excluded.presented_at",
            )?;
            for bill in bills {
                stmt_bill.execute(params![
                    bill.id,
                    bill.type_acronym,
                    bill.type_code,
                    bill.number,
                    bill.year,
                    bill.summary,
                    bill.presented_at.map(|t| t.to_string()),
                ])?;
            }

            let mut known = KnownLegislators::new(&tx)?;
            let mut pairs: HashSet<(i64, i64)> = HashSet::new();
            for bill in bills {
                for &author_id in &bill.author_ids {
                    if known.contains(author_id)? {
                        pairs.insert((bill.id, author_id));
                    }
                }
            }

            let mut stmt_delete = tx.prepare("DELETE FROM bill_authors WHERE bill_id = ?1")?;
            for bill in bills {
                stmt_delete.execute(params![bill.id])?;
            }

            let mut stmt_author = tx.prepare(
                "INSERT INTO bill_authors (bill_id, legislator_id) VALUES (?1, ?2)",
            )?;
            for (bill_id, legislator_id) in pairs {
                stmt_author.execute(params![bill_id, legislator_id])?;
            }
        }
        insert_dead_letters(&tx, dead)?;
        tx.commit()?;
        Ok(())
    }

    /// Upserts roll calls and replaces their vote sets, plus dead letters.
    /// Votes of legislators absent from the store are silently filtered,
    /// and a bill reference pointing outside the store is nulled rather
    /// than breaking the batch.
    pub fn apply_roll_call_batch(
        &mut self,
        roll_calls: &[RollCall],
        dead: &[DeadLetter],
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt_roll_call = tx.prepare(
                "INSERT INTO roll_calls (
                   id, called_at, body, approved, description, bill_id
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   called_at = excluded.called_at,
                   body = excluded.body,
                   approved = excluded.approved,
                   description = excluded.description,
                   bill_id = excluded.bill_id",
            )?;
            let mut stmt_bill_exists =
                tx.prepare("SELECT EXISTS(SELECT 1 FROM bills WHERE id = ?1)")?;
            for roll_call in roll_calls {
                let bill_id = match roll_call.bill_id {
                    Some(id) => {
                        let exists: bool =
                            stmt_bill_exists.query_row(params![id], |row| row.get(0))?;
                        if !exists {
                            tracing::debug!(
                                "roll call {} references bill {} not in store",
                                roll_call.id,
                                id
                            );
                        }
                        exists.then_some(id)
                    }
                    None => None,
                };
                stmt_roll_call.execute(params![
                    roll_call.id,
                    roll_call.called_at.to_string(),
                    roll_call.body,
                    roll_call.approved,
                    roll_call.description,
                    bill_id,
                ])?;
            }

            let mut known = KnownLegislators::new(&tx)?;
            let mut stmt_delete = tx.prepare("DELETE FROM votes WHERE roll_call_id = ?1")?;
            let mut stmt_vote = tx.prepare(
                "INSERT INTO votes (roll_call_id, legislator_id, vote) VALUES (?1, ?2, ?3)",
            )?;
            for roll_call in roll_calls {
                stmt_delete.execute(params![roll_call.id])?;

                // One vote per legislator; the last occurrence wins.
                let mut by_legislator: HashMap<i64, &str> = HashMap::new();
                for vote in &roll_call.votes {
                    if known.contains(vote.legislator_id)? {
                        by_legislator.insert(vote.legislator_id, vote.vote.as_str());
                    }
                }
                for (legislator_id, vote) in by_legislator {
                    stmt_vote.execute(params![roll_call.id, legislator_id, vote])?;
                }
            }
        }
        insert_dead_letters(&tx, dead)?;
        tx.commit()?;
        Ok(())
    }

    /// Dead letters, newest first.
    pub fn dead_letters(&self, unresolved_only: bool) -> Result<Vec<DeadLetterRow>, DbError> {
        let sql = if unresolved_only {
            "SELECT id, origin, payload, error_message, error_type, retry_count, resolved, created_at
             FROM dead_letters WHERE resolved = 0 ORDER BY id DESC"
        } else {
            "SELECT id, origin, payload, error_message, error_type, retry_count, resolved, created_at
             FROM dead_letters ORDER BY id DESC"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeadLetterRow {
                    id: row.get(0)?,
                    origin: row.get(1)?,
                    payload: row.get(2)?,
                    error_message: row.get(3)?,
                    error_type: row.get(4)?,
                    retry_count: row.get(5)?,
                    resolved: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Marks one dead letter handled. Returns false if the id is unknown.
    pub fn resolve_dead_letter(&self, id: i64) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("UPDATE dead_letters SET resolved = 1 WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

fn insert_dead_letters(tx: &Transaction<'_>, dead: &[DeadLetter]) -> Result<(), DbError> {
    if dead.is_empty() {
        return Ok(());
    }
    let mut stmt = tx.prepare(
        "INSERT INTO dead_letters (origin, payload, error_message, error_type)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in dead {
        stmt.execute(params![
            entry.origin,
            serde_json::to_string(&entry.payload)?,
            entry.error_message,
            entry.error_type,
        ])?;
    }
    Ok(())
}

/// Memoized `EXISTS` probe against the legislators table, used to filter
/// association rows inside a batch transaction.
struct KnownLegislators<'tx> {
    stmt: rusqlite::Statement<'tx>,
    cache: HashMap<i64, bool>,
}

impl<'tx> KnownLegislators<'tx> {
    fn new(tx: &'tx Transaction<'_>) -> Result<Self, DbError> {
        Ok(Self {
            stmt: tx.prepare("SELECT EXISTS(SELECT 1 FROM legislators WHERE id = ?1)")?,
            cache: HashMap::new(),
        })
    }

    fn contains(&mut self, id: i64) -> Result<bool, DbError> {
        if let Some(&known) = self.cache.get(&id) {
            return Ok(known);
        }
        let known: bool = self.stmt.query_row(params![id], |row| row.get(0))?;
        self.cache.insert(id, known);
        Ok(known)
    }
}
