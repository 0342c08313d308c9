mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use docserial::api;
use docserial::app_state::AppState;

async fn state() -> AppState {
    let documents = common::setup().await;
    AppState {
        db: documents.db().clone(),
        config: common::test_config(),
        documents,
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .app_data(api::json_config(64 * 1024))
                .configure(api::configure),
        )
        .await
    };
}

const INVOICES: &str = "/api/tenants/1/documents/invoice";

#[actix_web::test]
async fn create_then_list_invoices() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri(INVOICES)
        .set_json(json!({ "customer_id": 9 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["document_number"], "INV-000001");
    assert_eq!(body["sequence_number"], 1);
    assert_eq!(body["customer_sequence_number"], 1);

    let req = test::TestRequest::get().uri(INVOICES).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn next_number_previews_without_inserting() {
    let app = app!(state().await);

    let req = test::TestRequest::get()
        .uri("/api/tenants/1/documents/estimate/next-number")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rendered_number"], "EST-000001");

    let req = test::TestRequest::get()
        .uri("/api/tenants/1/documents/estimate")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn delete_and_restore_round_trip() {
    let app = app!(state().await);

    let req = test::TestRequest::post().uri(INVOICES).set_json(json!({})).to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("{}/{}", INVOICES, id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted: Value = test::read_body_json(resp).await;
    assert!(deleted["document_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-000001_DEL_"));
    assert!(!deleted["deleted_at"].is_null());

    let req = test::TestRequest::post()
        .uri(&format!("{}/{}/restore", INVOICES, id))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["outcome"]["status"], "restored");
    assert_eq!(report["document"]["document_number"], "INV-000001");
    assert!(report["document"]["deleted_at"].is_null());
}

#[actix_web::test]
async fn force_delete_returns_no_content_then_not_found() {
    let app = app!(state().await);

    let req = test::TestRequest::post().uri(INVOICES).set_json(json!({})).to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("{}/{}?force=true", INVOICES, id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("{}/{}", INVOICES, id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[actix_web::test]
async fn malformed_template_is_unprocessable() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri(INVOICES)
        .set_json(json!({ "number_format": "INV-{{SEQUENCE:abc}}" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_FORMAT_TEMPLATE");
}

#[actix_web::test]
async fn rejects_bad_customer_series_and_payload() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri(INVOICES)
        .set_json(json!({ "customer_series": "no spaces allowed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri(INVOICES)
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[actix_web::test]
async fn unknown_document_type_is_not_routed() {
    let app = app!(state().await);

    let req = test::TestRequest::get()
        .uri("/api/tenants/1/documents/appointment")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}
