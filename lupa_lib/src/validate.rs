//! Per-record schema validation.
//!
//! Converts one raw upstream JSON record into a typed domain record, or
//! rejects it with a categorized [`Rejection`]. Unknown fields are
//! ignored; declared fields are coerced where that is safe (the API is
//! inconsistent about numbers-as-strings) and must satisfy their
//! constraints. Rejections are data for the dead-letter store, not
//! control flow.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::{Bill, Company, Expense, Legislator, Party, RollCall, VoteRecord};

/// Why a record was rejected. The string forms are what lands in the
/// dead-letter table's `error_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// The record's shape, types, or constraints failed validation.
    SchemaValidation,
    /// Anything else that went wrong while converting the record, e.g. a
    /// malformed embedded reference.
    Unhandled,
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::SchemaValidation => "SchemaValidationError",
            RejectKind::Unhandled => "UnhandledException",
        }
    }
}

/// A rejected record: the category plus a human-readable reason.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub kind: RejectKind,
    pub message: String,
}

impl Rejection {
    fn schema(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::SchemaValidation,
            message: message.into(),
        }
    }

    fn unhandled(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Unhandled,
            message: message.into(),
        }
    }
}

fn parse_wire<T: DeserializeOwned>(raw: &Value) -> Result<T, Rejection> {
    serde_json::from_value(raw.clone()).map_err(|e| Rejection::schema(e.to_string()))
}

/// Trailing numeric path segment of an upstream reference URI, e.g.
/// `https://.../partidos/36844` -> 36844.
fn parse_trailing_id(uri: &str) -> Option<i64> {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|seg| seg.parse::<i64>().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Serde helpers for the API's loose typing.

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    coerce_i64(&v).ok_or_else(|| {
        serde::de::Error::custom(format!("expected an integer or numeric string, got {}", v))
    })
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    match v {
        Value::Null => Ok(None),
        other => coerce_i64(&other).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "expected an integer, numeric string, or null, got {}",
                other
            ))
        }),
    }
}

fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn de_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    let v = Value::deserialize(d)?;
    let text = match &v {
        // Going through the number's literal text keeps "150.00" exact.
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a decimal amount, got {}",
                other
            )))
        }
    };
    text.parse::<Decimal>()
        .map_err(|e| serde::de::Error::custom(format!("'{}' is not a decimal amount: {}", text, e)))
}

fn de_opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let v = Value::deserialize(d)?;
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            // Dates sometimes arrive with a time suffix.
            let date_part = s.split('T').next().unwrap_or(&s);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("'{}' is not a date: {}", s, e)))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected a date string or null, got {}",
            other
        ))),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn de_opt_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
    let v = Value::deserialize(d)?;
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("'{}' is not a timestamp", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected a timestamp string or null, got {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
struct LegislatorWire {
    #[serde(deserialize_with = "de_i64")]
    id: i64,
    nome: String,
    #[serde(rename = "nomeCivil", default)]
    civil_name: Option<String>,
    #[serde(rename = "siglaUf")]
    state: String,
    #[serde(rename = "siglaPartido", default)]
    party_acronym: Option<String>,
    #[serde(rename = "uriPartido", default)]
    party_uri: Option<String>,
    #[serde(rename = "idLegislatura", default, deserialize_with = "de_opt_i64")]
    legislature_id: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "urlFoto", default)]
    photo_url: Option<String>,
}

/// Validates one record from `/deputados`, deriving the [`Party`] from the
/// embedded reference URI.
pub fn legislator(raw: &Value) -> Result<Legislator, Rejection> {
    let wire: LegislatorWire = parse_wire(raw)?;

    let party = match (non_empty(wire.party_uri), non_empty(wire.party_acronym)) {
        (Some(uri), Some(acronym)) => {
            let id = parse_trailing_id(&uri).ok_or_else(|| {
                Rejection::unhandled(format!("party reference '{}' has no numeric id", uri))
            })?;
            Some(Party {
                id,
                name: acronym.clone(),
                acronym,
            })
        }
        _ => None,
    };

    Ok(Legislator {
        id: wire.id,
        name: wire.nome,
        civil_name: non_empty(wire.civil_name),
        state: wire.state,
        party,
        legislature_id: wire.legislature_id,
        email: non_empty(wire.email),
        photo_url: non_empty(wire.photo_url),
    })
}

#[derive(Deserialize)]
struct ExpenseWire {
    #[serde(rename = "idDocumento", deserialize_with = "de_i64")]
    ext_id: i64,
    #[serde(rename = "dataDocumento", default, deserialize_with = "de_opt_date")]
    issued_on: Option<NaiveDate>,
    #[serde(rename = "valorLiquido", deserialize_with = "de_decimal")]
    amount: Decimal,
    #[serde(rename = "cnpjCpfFornecedor", default)]
    supplier_tax_id: Option<String>,
    #[serde(rename = "nomeFornecedor", default)]
    supplier_name: Option<String>,
    #[serde(rename = "tipoDespesa", default)]
    expense_type: Option<String>,
    #[serde(rename = "urlDocumento", default)]
    document_url: Option<String>,
}

/// Validates one record from `/deputados/{id}/despesas`. Also derives the
/// payee [`Company`] when the record names one.
pub fn expense(raw: &Value) -> Result<(Expense, Option<Company>), Rejection> {
    let wire: ExpenseWire = parse_wire(raw)?;

    let cnpj = non_empty(wire.supplier_tax_id);
    let company = cnpj.clone().map(|cnpj| Company {
        cnpj,
        trade_name: non_empty(wire.supplier_name),
    });

    Ok((
        Expense {
            ext_id: wire.ext_id,
            company_cnpj: cnpj,
            amount: wire.amount,
            issued_on: wire.issued_on,
            expense_type: non_empty(wire.expense_type),
            document_url: non_empty(wire.document_url),
        },
        company,
    ))
}

#[derive(Deserialize)]
struct BillWire {
    #[serde(deserialize_with = "de_i64")]
    id: i64,
    #[serde(rename = "siglaTipo")]
    type_acronym: String,
    #[serde(rename = "codTipo", default, deserialize_with = "de_opt_i64")]
    type_code: Option<i64>,
    #[serde(deserialize_with = "de_i64")]
    numero: i64,
    #[serde(deserialize_with = "de_i64")]
    ano: i64,
    #[serde(default)]
    ementa: Option<String>,
    #[serde(rename = "dataApresentacao", default, deserialize_with = "de_opt_datetime")]
    presented_at: Option<NaiveDateTime>,
    #[serde(default)]
    autores: Option<Vec<Value>>,
}

/// Validates one record from `/proposicoes`, with its `autores` enrichment
/// attached by the orchestrator. Authors that are not deputies (the
/// executive, the senate) carry no deputy id and are dropped here.
pub fn bill(raw: &Value) -> Result<Bill, Rejection> {
    let wire: BillWire = parse_wire(raw)?;

    let mut author_ids = Vec::new();
    for author in wire.autores.unwrap_or_default() {
        if let Some(id) = author
            .get("uri")
            .and_then(Value::as_str)
            .and_then(parse_trailing_id)
        {
            author_ids.push(id);
        }
    }

    Ok(Bill {
        id: wire.id,
        type_acronym: wire.type_acronym,
        type_code: wire.type_code,
        number: wire.numero,
        year: wire.ano,
        summary: wire.ementa.unwrap_or_default(),
        presented_at: wire.presented_at,
        author_ids,
    })
}

#[derive(Deserialize)]
struct RollCallWire {
    id: String,
    #[serde(rename = "dataHoraRegistro", default)]
    called_at: Option<String>,
    #[serde(rename = "data", default)]
    date: Option<String>,
    #[serde(rename = "siglaOrgao")]
    body: String,
    #[serde(rename = "aprovacao", default, deserialize_with = "de_opt_i64")]
    approval: Option<i64>,
    #[serde(rename = "descricao", default)]
    description: Option<String>,
    #[serde(rename = "uriProposicaoObjeto", default)]
    bill_uri: Option<String>,
    #[serde(default)]
    votos: Option<Vec<Value>>,
}

/// Validates one record from `/votacoes`, with its `votos` enrichment
/// attached by the orchestrator. Vote entries that do not reference a
/// deputy id are dropped (they are associations, not records).
pub fn roll_call(raw: &Value) -> Result<RollCall, Rejection> {
    let wire: RollCallWire = parse_wire(raw)?;

    if wire.id.trim().is_empty() {
        return Err(Rejection::schema("roll call id is empty"));
    }

    let timestamp = non_empty(wire.called_at).or_else(|| non_empty(wire.date));
    let called_at = match timestamp {
        Some(s) => parse_datetime(&s)
            .ok_or_else(|| Rejection::schema(format!("'{}' is not a timestamp", s)))?,
        None => return Err(Rejection::schema("roll call has no timestamp")),
    };

    let approved = match wire.approval {
        None => None,
        Some(1) => Some(true),
        Some(0) => Some(false),
        Some(other) => {
            return Err(Rejection::schema(format!(
                "approval must be 0, 1, or null, got {}",
                other
            )))
        }
    };

    let bill_id = match non_empty(wire.bill_uri) {
        None => None,
        Some(uri) => Some(parse_trailing_id(&uri).ok_or_else(|| {
            Rejection::unhandled(format!("bill reference '{}' has no numeric id", uri))
        })?),
    };

    let mut votes = Vec::new();
    for vote in wire.votos.unwrap_or_default() {
        let legislator_id = vote
            .get("deputado_")
            .and_then(|d| d.get("id"))
            .and_then(coerce_i64);
        let value = vote.get("tipoVoto").and_then(Value::as_str);
        match (legislator_id, value) {
            (Some(legislator_id), Some(value)) if !value.trim().is_empty() => {
                votes.push(VoteRecord {
                    legislator_id,
                    vote: value.trim().to_string(),
                });
            }
            _ => tracing::debug!("skipping malformed vote entry in roll call {}", wire.id),
        }
    }

    Ok(RollCall {
        id: wire.id,
        called_at,
        body: wire.body,
        approved,
        description: wire.description.unwrap_or_default(),
        bill_id,
        votes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expense_accepts_string_amount() {
        let raw = json!({
            "idDocumento": 1,
            "valorLiquido": "150.00",
            "cnpjCpfFornecedor": "12345678900001",
            "dataDocumento": "2024-03-01"
        });
        let (expense, company) = expense(&raw).unwrap();
        assert_eq!(expense.ext_id, 1);
        assert_eq!(expense.amount, "150.00".parse::<Decimal>().unwrap());
        assert_eq!(
            expense.issued_on,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(company.unwrap().cnpj, "12345678900001");
    }

    #[test]
    fn expense_accepts_numeric_amount_and_string_id() {
        let raw = json!({
            "idDocumento": "7654321",
            "valorLiquido": 89.9,
            "nomeFornecedor": "Posto Central"
        });
        let (expense, company) = expense(&raw).unwrap();
        assert_eq!(expense.ext_id, 7654321);
        assert_eq!(expense.amount, "89.9".parse::<Decimal>().unwrap());
        // A supplier name without a tax id is not enough for a company.
        assert!(company.is_none());
    }

    #[test]
    fn expense_without_document_id_is_rejected() {
        let raw = json!({"valorLiquido": "10.00"});
        let err = expense(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::SchemaValidation);
        assert!(err.message.contains("idDocumento"));
    }

    #[test]
    fn expense_with_garbage_amount_is_rejected() {
        let raw = json!({"idDocumento": 5, "valorLiquido": "R$ dez"});
        let err = expense(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::SchemaValidation);
    }

    #[test]
    fn expense_ignores_unknown_fields() {
        let raw = json!({
            "idDocumento": 2,
            "valorLiquido": "20.00",
            "codLote": 99999,
            "parcela": 0
        });
        assert!(expense(&raw).is_ok());
    }

    #[test]
    fn expense_empty_date_is_none() {
        let raw = json!({"idDocumento": 3, "valorLiquido": "1.00", "dataDocumento": ""});
        let (expense, _) = expense(&raw).unwrap();
        assert!(expense.issued_on.is_none());
    }

    #[test]
    fn legislator_derives_party_from_uri() {
        let raw = json!({
            "id": 204554,
            "nome": "Abilio Brunini",
            "siglaUf": "MT",
            "siglaPartido": "PL",
            "uriPartido": "https://dadosabertos.camara.leg.br/api/v2/partidos/37906",
            "idLegislatura": 57,
            "email": "dep.abiliobrunini@camara.leg.br"
        });
        let legislator = legislator(&raw).unwrap();
        let party = legislator.party.unwrap();
        assert_eq!(party.id, 37906);
        assert_eq!(party.acronym, "PL");
        assert_eq!(legislator.legislature_id, Some(57));
    }

    #[test]
    fn legislator_with_malformed_party_uri_is_unhandled() {
        let raw = json!({
            "id": 1,
            "nome": "X",
            "siglaUf": "SP",
            "siglaPartido": "PT",
            "uriPartido": "https://example.com/partidos/not-a-number"
        });
        let err = legislator(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::Unhandled);
    }

    #[test]
    fn legislator_without_party_reference_is_fine() {
        let raw = json!({"id": 2, "nome": "Y", "siglaUf": "RJ"});
        let legislator = legislator(&raw).unwrap();
        assert!(legislator.party.is_none());
    }

    #[test]
    fn bill_resolves_deputy_authors_only() {
        let raw = json!({
            "id": 2373826,
            "siglaTipo": "PL",
            "codTipo": 139,
            "numero": 1234,
            "ano": 2024,
            "ementa": "Dispõe sobre...",
            "dataApresentacao": "2024-05-02T14:30",
            "autores": [
                {"uri": "https://dadosabertos.camara.leg.br/api/v2/deputados/204554", "nome": "A"},
                {"uri": "https://dadosabertos.camara.leg.br/api/v2/orgaos/senado", "nome": "Senado"},
                {"nome": "Poder Executivo"}
            ]
        });
        let bill = bill(&raw).unwrap();
        assert_eq!(bill.author_ids, vec![204554]);
        assert_eq!(
            bill.presented_at,
            Some(
                NaiveDate::from_ymd_opt(2024, 5, 2)
                    .unwrap()
                    .and_hms_opt(14, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn bill_without_type_is_rejected() {
        let raw = json!({"id": 1, "numero": 2, "ano": 2024});
        let err = bill(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::SchemaValidation);
    }

    #[test]
    fn roll_call_maps_approval_tri_state() {
        for (value, expected) in [(json!(1), Some(true)), (json!(0), Some(false)), (json!(null), None)]
        {
            let raw = json!({
                "id": "2265603-43",
                "dataHoraRegistro": "2024-05-02T18:01:33",
                "siglaOrgao": "PLEN",
                "aprovacao": value
            });
            assert_eq!(roll_call(&raw).unwrap().approved, expected);
        }
    }

    #[test]
    fn roll_call_out_of_range_approval_is_rejected() {
        let raw = json!({
            "id": "1-1",
            "dataHoraRegistro": "2024-05-02T18:01:33",
            "siglaOrgao": "PLEN",
            "aprovacao": 7
        });
        let err = roll_call(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::SchemaValidation);
    }

    #[test]
    fn roll_call_votes_and_bill_reference() {
        let raw = json!({
            "id": "2265603-43",
            "dataHoraRegistro": "2024-05-02T18:01:33",
            "siglaOrgao": "PLEN",
            "aprovacao": 1,
            "descricao": "Aprovada a redação final",
            "uriProposicaoObjeto": "https://dadosabertos.camara.leg.br/api/v2/proposicoes/2373826",
            "votos": [
                {"tipoVoto": "Sim", "deputado_": {"id": 204554, "nome": "A"}},
                {"tipoVoto": "Não", "deputado_": {"id": "220593"}},
                {"tipoVoto": "Sim"},
                {"deputado_": {"id": 1}}
            ]
        });
        let rc = roll_call(&raw).unwrap();
        assert_eq!(rc.bill_id, Some(2373826));
        assert_eq!(
            rc.votes,
            vec![
                VoteRecord { legislator_id: 204554, vote: "Sim".into() },
                VoteRecord { legislator_id: 220593, vote: "Não".into() },
            ]
        );
    }

    #[test]
    fn roll_call_without_timestamp_is_rejected() {
        let raw = json!({"id": "9-9", "siglaOrgao": "PLEN"});
        let err = roll_call(&raw).unwrap_err();
        assert_eq!(err.kind, RejectKind::SchemaValidation);
    }

    #[test]
    fn roll_call_date_only_timestamp_is_accepted() {
        let raw = json!({"id": "9-9", "data": "2024-05-02", "siglaOrgao": "PLEN"});
        let rc = roll_call(&raw).unwrap();
        assert_eq!(
            rc.called_at,
            NaiveDate::from_ymd_opt(2024, 5, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }
}
