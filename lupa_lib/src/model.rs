//! Validated domain records produced by [`crate::validate`] and persisted
//! by [`crate::db`].

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

/// A political party, derived from the party reference embedded in each
/// legislator record. The list payload only carries the acronym, so `name`
/// starts out equal to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub id: i64,
    pub acronym: String,
    pub name: String,
}

/// A member of the lower house, keyed by the upstream numeric id.
#[derive(Debug, Clone)]
pub struct Legislator {
    pub id: i64,
    pub name: String,
    /// Full legal name; only present on detail payloads, so upserts keep
    /// the stored value when absent.
    pub civil_name: Option<String>,
    /// Two-letter state code.
    pub state: String,
    pub party: Option<Party>,
    pub legislature_id: Option<i64>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// A payee company, keyed by its tax id (CNPJ or CPF).
#[derive(Debug, Clone)]
pub struct Company {
    pub cnpj: String,
    pub trade_name: Option<String>,
}

/// One reimbursed office expense. The owning legislator id comes from the
/// batch context, not the record itself.
#[derive(Debug, Clone)]
pub struct Expense {
    /// Upstream document id; the idempotency key.
    pub ext_id: i64,
    pub company_cnpj: Option<String>,
    pub amount: Decimal,
    pub issued_on: Option<NaiveDate>,
    pub expense_type: Option<String>,
    pub document_url: Option<String>,
}

/// A legislative bill, with its authorship already resolved to legislator
/// ids (non-deputy authors are dropped during validation).
#[derive(Debug, Clone)]
pub struct Bill {
    pub id: i64,
    pub type_acronym: String,
    pub type_code: Option<i64>,
    pub number: i64,
    pub year: i64,
    pub summary: String,
    pub presented_at: Option<NaiveDateTime>,
    pub author_ids: Vec<i64>,
}

/// A plenary roll call. Upstream ids are strings ("2265603-43").
#[derive(Debug, Clone)]
pub struct RollCall {
    pub id: String,
    pub called_at: NaiveDateTime,
    /// Acronym of the body that held the vote.
    pub body: String,
    /// `Some(true)` approved, `Some(false)` rejected, `None` unknown.
    pub approved: Option<bool>,
    pub description: String,
    pub bill_id: Option<i64>,
    pub votes: Vec<VoteRecord>,
}

/// One legislator's vote inside a roll call.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteRecord {
    pub legislator_id: i64,
    /// Textual value as reported upstream ("Sim", "Não", "Obstrução", ...).
    pub vote: String,
}

/// A record that failed validation, kept for diagnosis and replay.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Source plus context, e.g. `camara_despesas_204554`.
    pub origin: String,
    pub payload: Value,
    pub error_message: String,
    pub error_type: String,
}
