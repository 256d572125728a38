//! Typed accessors over the rate-limited client, one per upstream
//! resource.
//!
//! Every list endpoint wraps its payload in `{ "dados": [...] }`; the
//! accessors unwrap that envelope and hand back the raw records untouched.
//! Validation happens downstream, per record, so a malformed item never
//! fails a whole page here.

use serde_json::Value;

use crate::query::{BillQuery, ExpenseQuery, LegislatorQuery, Query, RollCallQuery};
use crate::{Client, Error};

pub struct CamaraExtractor {
    client: Client,
}

impl CamaraExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current legislators, one page.
    pub async fn legislators(&self, query: &LegislatorQuery) -> Result<Vec<Value>, Error> {
        let body = self.client.fetch("/deputados", &query.params()).await?;
        unwrap_payload(body)
    }

    /// One legislator's office expenses, one page.
    pub async fn expenses(
        &self,
        legislator_id: i64,
        query: &ExpenseQuery,
    ) -> Result<Vec<Value>, Error> {
        let path = format!("/deputados/{}/despesas", legislator_id);
        let body = self.client.fetch(&path, &query.params()).await?;
        unwrap_payload(body)
    }

    /// Bills presented inside the query's date window, one page.
    pub async fn bills(&self, query: &BillQuery) -> Result<Vec<Value>, Error> {
        let body = self.client.fetch("/proposicoes", &query.params()).await?;
        unwrap_payload(body)
    }

    /// Authors of one bill. Absent enrichment data is not a failure: a 404
    /// from upstream yields an empty list.
    pub async fn bill_authors(&self, bill_id: i64) -> Result<Vec<Value>, Error> {
        let path = format!("/proposicoes/{}/autores", bill_id);
        match self.client.fetch(&path, &[]).await {
            Ok(body) => unwrap_payload(body),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Roll calls inside the query's date window, one page.
    pub async fn roll_calls(&self, query: &RollCallQuery) -> Result<Vec<Value>, Error> {
        let body = self.client.fetch("/votacoes", &query.params()).await?;
        unwrap_payload(body)
    }

    /// Individual votes of one roll call. A 404 yields an empty list, like
    /// [`Self::bill_authors`].
    pub async fn roll_call_votes(&self, roll_call_id: &str) -> Result<Vec<Value>, Error> {
        let path = format!("/votacoes/{}/votos", roll_call_id);
        match self.client.fetch(&path, &[]).await {
            Ok(body) => unwrap_payload(body),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

fn unwrap_payload(mut body: Value) -> Result<Vec<Value>, Error> {
    match body.get_mut("dados").map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(Error::Envelope),
    }
}
