//! End-to-end pipeline tests: a mock upstream API on one side, an
//! in-memory SQLite store on the other.

use std::time::Duration;

use camara_api::{CamaraExtractor, Client, RetryConfig};
use lupa_lib::{Db, FetchConfig, Fetcher};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer) -> Fetcher {
    let client = Client::with_config(
        &server.uri(),
        Duration::from_millis(1),
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    );
    let db = Db::open_in_memory().expect("open db");
    db.init().expect("init schema");
    Fetcher::new(
        CamaraExtractor::new(client),
        db,
        FetchConfig {
            page_size: 100,
            max_pages: 50,
            window_days: 90,
            concurrency: 4,
        },
    )
}

fn empty_page() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"dados": []}))
}

async fn mount_legislators(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/deputados"))
        .and(query_param("pagina", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {
                    "id": 42,
                    "nome": "Abilio Brunini",
                    "siglaUf": "MT",
                    "siglaPartido": "PL",
                    "uriPartido": "https://dadosabertos.camara.leg.br/api/v2/partidos/37906"
                },
                {
                    "id": 77,
                    "nome": "Adriana Ventura",
                    "siglaUf": "SP",
                    "siglaPartido": "NOVO",
                    "uriPartido": "https://dadosabertos.camara.leg.br/api/v2/partidos/37901"
                }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deputados"))
        .and(query_param("pagina", "2"))
        .respond_with(empty_page())
        .mount(server)
        .await;
}

#[tokio::test]
async fn legislators_then_expenses_end_to_end() {
    let server = MockServer::start().await;
    mount_legislators(&server).await;

    // Legislator 42 has one valid and one invalid expense; 77 has none.
    Mock::given(method("GET"))
        .and(path("/deputados/42/despesas"))
        .and(query_param("pagina", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {
                    "idDocumento": 1,
                    "valorLiquido": "150.00",
                    "cnpjCpfFornecedor": "12345678900001",
                    "nomeFornecedor": "Posto Central",
                    "dataDocumento": "2024-03-01"
                },
                {"valorLiquido": "99.00"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deputados/42/despesas"))
        .and(query_param("pagina", "2"))
        .respond_with(empty_page())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deputados/77/despesas"))
        .respond_with(empty_page())
        .mount(&server)
        .await;

    let fetcher = fetcher(&server);
    fetcher.sync_legislators().await.expect("legislators sync");
    fetcher.sync_expenses(2024).await.expect("expenses sync");

    let db = fetcher.db();
    let db = db.lock().await;

    let legislators: i64 = db
        .conn()
        .query_row("SELECT COUNT(1) FROM legislators", [], |r| r.get(0))
        .unwrap();
    assert_eq!(legislators, 2);

    let (amount, cnpj): (String, String) = db
        .conn()
        .query_row(
            "SELECT amount, company_cnpj FROM expenses WHERE ext_id = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(amount, "150.00");
    assert_eq!(cnpj, "12345678900001");

    let dead = db.dead_letters(true).unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].error_type.as_deref(), Some("SchemaValidationError"));
    assert_eq!(dead[0].origin, "camara_despesas_42");

    assert!(db.get_meta("last_sync_legislators").unwrap().is_some());
    assert!(db.get_meta("last_sync_expenses").unwrap().is_some());
}

#[tokio::test]
async fn bills_are_enriched_with_authors_and_survive_enrichment_failures() {
    let server = MockServer::start().await;
    mount_legislators(&server).await;

    Mock::given(method("GET"))
        .and(path("/proposicoes"))
        .and(query_param("pagina", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {"id": 500, "siglaTipo": "PL", "numero": 1, "ano": 2024, "ementa": "a"},
                {"id": 501, "siglaTipo": "PEC", "numero": 2, "ano": 2024, "ementa": "b"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proposicoes"))
        .and(query_param("pagina", "2"))
        .respond_with(empty_page())
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/proposicoes/500/autores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {"uri": "https://dadosabertos.camara.leg.br/api/v2/deputados/42", "nome": "A"},
                {"uri": "https://dadosabertos.camara.leg.br/api/v2/deputados/31337", "nome": "B"}
            ]
        })))
        .mount(&server)
        .await;
    // Enrichment for 501 fails hard; the bill must still be ingested.
    Mock::given(method("GET"))
        .and(path("/proposicoes/501/autores"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server);
    fetcher.sync_legislators().await.expect("legislators sync");
    fetcher.sync_bills(7).await.expect("bills sync");

    let db = fetcher.db();
    let db = db.lock().await;

    let bills: i64 = db
        .conn()
        .query_row("SELECT COUNT(1) FROM bills", [], |r| r.get(0))
        .unwrap();
    assert_eq!(bills, 2);

    // Unknown author 31337 filtered; known author 42 kept.
    let authors: Vec<i64> = db
        .conn()
        .prepare("SELECT legislator_id FROM bill_authors WHERE bill_id = 500")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(authors, vec![42]);

    let orphan_authors: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(1) FROM bill_authors WHERE bill_id = 501",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(orphan_authors, 0);
}

#[tokio::test]
async fn roll_calls_are_enriched_with_votes() {
    let server = MockServer::start().await;
    mount_legislators(&server).await;

    Mock::given(method("GET"))
        .and(path("/votacoes"))
        .and(query_param("pagina", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {
                    "id": "2265603-43",
                    "dataHoraRegistro": "2024-05-02T18:01:33",
                    "siglaOrgao": "PLEN",
                    "aprovacao": 1,
                    "descricao": "Aprovada a redação final"
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/votacoes"))
        .and(query_param("pagina", "2"))
        .respond_with(empty_page())
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/votacoes/2265603-43/votos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dados": [
                {"tipoVoto": "Sim", "deputado_": {"id": 42}},
                {"tipoVoto": "Não", "deputado_": {"id": 999}}
            ]
        })))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server);
    fetcher.sync_legislators().await.expect("legislators sync");
    fetcher.sync_roll_calls(7).await.expect("roll calls sync");

    let db = fetcher.db();
    let db = db.lock().await;

    let votes: Vec<(i64, String)> = db
        .conn()
        .prepare("SELECT legislator_id, vote FROM votes WHERE roll_call_id = '2265603-43'")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(votes, vec![(42, "Sim".to_string())]);
}

#[tokio::test]
async fn a_failing_window_does_not_abort_the_run() {
    let server = MockServer::start().await;

    // Every /votacoes request fails; the sync must still complete and
    // record its bookkeeping.
    Mock::given(method("GET"))
        .and(path("/votacoes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server);
    fetcher.sync_roll_calls(7).await.expect("run completes");

    let db = fetcher.db();
    let db = db.lock().await;
    let roll_calls: i64 = db
        .conn()
        .query_row("SELECT COUNT(1) FROM roll_calls", [], |r| r.get(0))
        .unwrap();
    assert_eq!(roll_calls, 0);
    assert!(db.get_meta("last_sync_roll_calls").unwrap().is_some());
}
