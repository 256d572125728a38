//! Batch ingestion: validate raw records, partition them into typed
//! collections and dead letters, and apply everything as one transaction.
//!
//! Validation failures never abort a batch; they become dead-letter rows
//! committed alongside the records that did validate. Only a storage
//! failure aborts, rolling the whole batch back.

use std::collections::HashMap;

use serde_json::Value;

use crate::db::{Db, DbError};
use crate::model::{Bill, Company, DeadLetter, Expense, Legislator, Party, RollCall};
use crate::validate::{self, Rejection};

/// What happened to one batch, for progress logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub ingested: usize,
    pub rejected: usize,
}

pub struct Ingestor<'a> {
    db: &'a mut Db,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a mut Db) -> Self {
        Self { db }
    }

    /// Ingests one page of `/deputados` records. Parties referenced by the
    /// batch are upserted first as a side effect.
    pub fn legislators_batch(&mut self, raw: &[Value]) -> Result<BatchSummary, DbError> {
        let mut parties: HashMap<i64, Party> = HashMap::new();
        let mut legislators: Vec<Legislator> = Vec::new();
        let mut dead: Vec<DeadLetter> = Vec::new();

        for item in raw {
            match validate::legislator(item) {
                Ok(legislator) => {
                    if let Some(party) = &legislator.party {
                        parties.insert(party.id, party.clone());
                    }
                    legislators.push(legislator);
                }
                Err(rejection) => dead.push(dead_letter("camara_deputados", item, rejection)),
            }
        }

        let parties: Vec<Party> = parties.into_values().collect();
        let summary = BatchSummary {
            ingested: legislators.len(),
            rejected: dead.len(),
        };
        self.db
            .apply_legislator_batch(&parties, &legislators, &dead)?;
        Ok(summary)
    }

    /// Ingests one page of one legislator's `/despesas` records. Payee
    /// companies are upserted first as a side effect.
    pub fn expenses_batch(
        &mut self,
        legislator_id: i64,
        raw: &[Value],
    ) -> Result<BatchSummary, DbError> {
        let origin = format!("camara_despesas_{}", legislator_id);
        let mut companies: HashMap<String, Company> = HashMap::new();
        let mut expenses: Vec<Expense> = Vec::new();
        let mut dead: Vec<DeadLetter> = Vec::new();

        for item in raw {
            match validate::expense(item) {
                Ok((expense, company)) => {
                    if let Some(company) = company {
                        companies.insert(company.cnpj.clone(), company);
                    }
                    expenses.push(expense);
                }
                Err(rejection) => dead.push(dead_letter(&origin, item, rejection)),
            }
        }

        let companies: Vec<Company> = companies.into_values().collect();
        let summary = BatchSummary {
            ingested: expenses.len(),
            rejected: dead.len(),
        };
        self.db
            .apply_expense_batch(legislator_id, &companies, &expenses, &dead)?;
        Ok(summary)
    }

    /// Ingests one page of `/proposicoes` records, each carrying its
    /// `autores` enrichment. Authorship sets are replaced wholesale.
    pub fn bills_batch(&mut self, raw: &[Value]) -> Result<BatchSummary, DbError> {
        let mut bills: Vec<Bill> = Vec::new();
        let mut dead: Vec<DeadLetter> = Vec::new();

        for item in raw {
            match validate::bill(item) {
                Ok(bill) => bills.push(bill),
                Err(rejection) => dead.push(dead_letter("camara_proposicoes", item, rejection)),
            }
        }

        let summary = BatchSummary {
            ingested: bills.len(),
            rejected: dead.len(),
        };
        self.db.apply_bill_batch(&bills, &dead)?;
        Ok(summary)
    }

    /// Ingests one page of `/votacoes` records, each carrying its `votos`
    /// enrichment. Vote sets are replaced wholesale.
    pub fn roll_calls_batch(&mut self, raw: &[Value]) -> Result<BatchSummary, DbError> {
        let mut roll_calls: Vec<RollCall> = Vec::new();
        let mut dead: Vec<DeadLetter> = Vec::new();

        for item in raw {
            match validate::roll_call(item) {
                Ok(roll_call) => roll_calls.push(roll_call),
                Err(rejection) => dead.push(dead_letter("camara_votacoes", item, rejection)),
            }
        }

        let summary = BatchSummary {
            ingested: roll_calls.len(),
            rejected: dead.len(),
        };
        self.db.apply_roll_call_batch(&roll_calls, &dead)?;
        Ok(summary)
    }
}

fn dead_letter(origin: &str, payload: &Value, rejection: Rejection) -> DeadLetter {
    DeadLetter {
        origin: origin.to_string(),
        payload: payload.clone(),
        error_message: rejection.message,
        error_type: rejection.kind.as_str().to_string(),
    }
}
