//! End-to-end tests for the row update endpoint

mod common;

use common::*;
use creative_naming_server::sheets::{InMemorySpreadsheet, SchemaRevision, ValueInput};
use reqwest::StatusCode;
use serde_json::json;

/// Spawns a server and uploads one creative, which lands on row 2 with ID 1
async fn server_with_one_creative() -> (TestServer, TestClient) {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let (status, _) = client.upload_json(&[image("city.png")]).await;
    assert_eq!(status, StatusCode::OK);
    (server, client)
}

#[tokio::test]
async fn test_update_preserves_untouched_fields() {
    let (server, client) = server_with_one_creative().await;
    let before = server.spreadsheet.rows(CREATIVE_SHEET)[1].clone();

    let response = client
        .update(json!({"rowIndex": 2, "id": 1, "style": "3D"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));

    let after = &server.spreadsheet.rows(CREATIVE_SHEET)[1];
    for (column, (old, new)) in before.iter().zip(after.iter()).enumerate() {
        if column as u32 + 1 == COL_STYLE {
            assert_eq!(new, "3D");
        } else {
            assert_eq!(old, new, "column {} changed", column + 1);
        }
    }
}

#[tokio::test]
async fn test_update_recomputes_link() {
    let (server, client) = server_with_one_creative().await;

    let response = client
        .update(json!({
            "rowIndex": 2,
            "id": 1,
            "type": "video",
            "nameOfHypothesis": "night city",
            "offer": "вебинар"
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        server.creative_cell(2, COL_LINK),
        "V_id=1;type=video;NameHypoth=night city"
    );
    assert_eq!(server.creative_cell(2, COL_TYPE), "video");
    assert_eq!(server.creative_cell(2, COL_HYPOTHESIS), "night city");
    assert_eq!(server.creative_cell(2, COL_OFFER), "вебинар");
    assert_eq!(server.creative_cell(2, COL_ID), "1");
    assert_eq!(server.creative_cell(2, COL_FILENAME), "city.png");
    assert_eq!(
        server.creative_cell(2, COL_PREVIEW),
        format!("=IMAGE(\"{}/city.png\")", PREVIEW_BASE_URL)
    );
}

#[tokio::test]
async fn test_update_accepts_alternate_names() {
    let (server, client) = server_with_one_creative().await;

    let response = client
        .update(json!({
            "rowIndex": 2,
            "creativeId": 1,
            "hypothesisName": "paper",
            "mainTone": "dark"
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.creative_cell(2, COL_HYPOTHESIS), "paper");
    assert_eq!(server.creative_cell(2, COL_MAIN_TONE), "dark");
}

#[tokio::test]
async fn test_update_rejects_invalid_option() {
    let (server, client) = server_with_one_creative().await;
    let before = server.spreadsheet.rows(CREATIVE_SHEET);

    let response = client
        .update(json!({"rowIndex": 2, "id": 1, "style": "Watercolor"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(server.spreadsheet.rows(CREATIVE_SHEET), before);
}

#[tokio::test]
async fn test_update_requires_row_and_id() {
    let (_server, client) = server_with_one_creative().await;

    for body in [
        json!({"id": 1, "style": "3D"}),
        json!({"rowIndex": 2, "style": "3D"}),
        json!({}),
    ] {
        let response = client.update(body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "rowIndex and id are required");
    }
}

#[tokio::test]
async fn test_update_refuses_header_row() {
    let (server, client) = server_with_one_creative().await;

    let response = client
        .update(json!({"rowIndex": 1, "id": 1, "style": "3D"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.creative_cell(1, COL_STYLE), "style");
}

#[tokio::test]
async fn test_update_missing_sheet_is_server_error() {
    let server = TestServer::spawn_with(TestServerOptions {
        spreadsheet: InMemorySpreadsheet::new(),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .update(json!({"rowIndex": 2, "id": 1, "style": "3D"}))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains(CREATIVE_SHEET));
}

#[tokio::test]
async fn test_legacy_update_ignores_marketing_fields() {
    let server = TestServer::spawn_with(TestServerOptions {
        revision: SchemaRevision::Legacy,
        spreadsheet: InMemorySpreadsheet::new().with_sheet(CREATIVE_SHEET),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.base_url.clone());
    let (status, _) = client.upload_json(&[image("city.png")]).await;
    assert_eq!(status, StatusCode::OK);

    let response = client
        .update(json!({"rowIndex": 2, "id": 1, "offer": "скидка", "style": "Cartoon"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let row = &server.spreadsheet.rows(CREATIVE_SHEET)[1];
    assert_eq!(row.len(), 9);
    assert_eq!(row[5], "Cartoon");
    assert!(!row.iter().any(|cell| cell == "скидка"));
}

#[tokio::test]
async fn test_formula_like_text_is_stored_verbatim_on_upload_and_edit() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    // The fake classifier uses the file stem as the hypothesis.
    let (status, _) = client.upload_json(&[image("-50% sale.png")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.creative_cell(2, COL_HYPOTHESIS), "-50% sale");
    assert_eq!(server.creative_cell(2, COL_FILENAME), "-50% sale.png");

    let response = client
        .update(json!({
            "rowIndex": 2,
            "id": 1,
            "nameOfHypothesis": "=IMPORTDATA(\"https://example.com\")"
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        server.creative_cell(2, COL_HYPOTHESIS),
        "=IMPORTDATA(\"https://example.com\")"
    );

    // Only the preview cell is ever sent as user input.
    let user_entered: Vec<String> = server
        .spreadsheet
        .operations()
        .into_iter()
        .filter(|op| op.input == Some(ValueInput::UserEntered))
        .filter(|op| op.range.starts_with(CREATIVE_SHEET))
        .map(|op| op.range)
        .collect();
    assert_eq!(user_entered, vec![format!("{}!B2", CREATIVE_SHEET)]);
}
