//! Notion store behaviour against a mock API.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use fundsync_config::LedgerConfig;
use fundsync_core::{DirectoryError, LedgerStore, MovementKind, NewLedgerRecord, WriteError};
use fundsync_ledger::{EntityDirectory, NotionLedger};

fn ledger_for(server: &MockServer) -> NotionLedger {
    let config = LedgerConfig {
        base_url: server.uri(),
        token: Some("secret_test".into()),
        records_database_id: Some("records-db".into()),
        fund_data_source_id: Some("funds-ds".into()),
        ..Default::default()
    };
    NotionLedger::new(&config).unwrap()
}

fn fund_page(id: &str, name: &str) -> serde_json::Value {
    json!({
        "object": "page",
        "id": id,
        "properties": { "基金名称": { "type": "title", "title": [{ "plain_text": name }] } }
    })
}

fn record() -> NewLedgerRecord {
    NewLedgerRecord {
        title: "@March 9, 2025".into(),
        entity_id: "fund-1".into(),
        amount: 12.5,
        movement: MovementKind::Return,
        date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
    }
}

#[tokio::test]
async fn query_follows_cursor_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/data_sources/funds-ds/query"))
        .and(body_partial_json(json!({ "start_cursor": "cursor-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [fund_page("p3", "Gamma")],
            "has_more": false,
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/data_sources/funds-ds/query"))
        .and(header("authorization", "Bearer secret_test"))
        .and(header("notion-version", "2025-09-03"))
        .and(body_partial_json(json!({ "page_size": 100 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [fund_page("p1", "Alpha"), fund_page("p2", "Beta")],
            "has_more": true,
            "next_cursor": "cursor-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = std::sync::Arc::new(ledger_for(&server));
    let directory = EntityDirectory::new(ledger, "基金名称");
    let entities = directory.list_entities().await.unwrap();

    let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(entities[2].name, "Gamma");
}

#[tokio::test]
async fn query_rejection_keeps_notion_error_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/data_sources/funds-ds/query"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "object": "error",
            "status": 401,
            "code": "unauthorized",
            "message": "API token is invalid."
        })))
        .mount(&server)
        .await;

    let err = ledger_for(&server).query_entities().await.unwrap_err();
    match err {
        DirectoryError::Rejected {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(code, "unauthorized");
            assert_eq!(message, "API token is invalid.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn create_record_posts_page_and_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .and(body_partial_json(json!({
            "parent": { "database_id": "records-db" },
            "properties": {
                "基金信息": { "relation": [{ "id": "fund-1" }] },
                "变动金额(+/-)": { "number": 12.5 },
                "仓位变化类型": { "select": { "name": "收益" } },
                "日期": { "date": { "start": "2025-03-09" } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "object": "page", "id": "page-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = ledger_for(&server).create_record(&record()).await.unwrap();
    assert_eq!(id, "page-42");
}

#[tokio::test]
async fn create_record_maps_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "object": "error",
            "status": 400,
            "code": "validation_error",
            "message": "基金信息 is not a property that exists."
        })))
        .mount(&server)
        .await;

    let err = ledger_for(&server).create_record(&record()).await.unwrap_err();
    assert!(matches!(err, WriteError::Rejected { status: 400, ref code, .. } if code == "validation_error"));
    assert!(err.to_string().contains("is not a property that exists"));
}

#[tokio::test]
async fn non_json_error_body_is_still_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = ledger_for(&server).create_record(&record()).await.unwrap_err();
    match err {
        WriteError::Rejected {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 502);
            assert_eq!(code, "unknown");
            assert_eq!(message, "Bad Gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
