//! Integration tests for `NutriSnapClient` using `wiremock`.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfscan_core::{FailureReason, ListingEntry, NutrientValue, ProductResult};
use shelfscan_upload::{DisabledUploader, NutriSnapClient, UploadError, UploadRecord, Uploader};

fn client(server: &MockServer, token: Option<&str>) -> NutriSnapClient {
    NutriSnapClient::new(
        &format!("{}/api/products/upload-scraped-data", server.uri()),
        &format!("{}/api/products/names", server.uri()),
        token.map(str::to_owned),
        5,
        "shelfscan-test/0.1",
    )
    .expect("failed to build test client")
}

fn record() -> UploadRecord {
    let mut product = ProductResult::new(ListingEntry {
        name: "Britannia Brown Bread".to_owned(),
        hero_image_url: "https://cdn.grofers.com/app/images/products/pro_2.jpg".to_owned(),
        detail_url: "https://blinkit.com/prn/britannia-brown-bread/prid/2".to_owned(),
        product_id: Some("2".to_owned()),
    });
    product
        .nutrition
        .insert("energy".to_owned(), NutrientValue::amount(240.0, Some("kcal")));
    UploadRecord::from_product(&product).expect("product has nutrition")
}

#[tokio::test]
async fn push_posts_camel_case_record_with_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/products/upload-scraped-data"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "listingName": "Britannia Brown Bread",
            "nutrition": { "energy": "240 kcal" },
            "use_llm": true
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, Some("secret"))
        .push(&record())
        .await
        .expect("push should succeed");
}

#[tokio::test]
async fn rejected_record_is_validation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("nutrition missing\nfields"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None).push(&record()).await.unwrap_err();

    assert!(
        matches!(err, UploadError::Validation { status: 422, ref body } if body == "nutrition missing fields"),
        "got: {err:?}"
    );
    assert_eq!(err.reason(), FailureReason::Validation);
}

#[tokio::test]
async fn unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("stale")).push(&record()).await.unwrap_err();
    assert_eq!(err.reason(), FailureReason::Auth);
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None).push(&record()).await.unwrap_err();
    assert_eq!(err.reason(), FailureReason::Network);
}

#[tokio::test]
async fn known_products_are_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products/names"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            "  Britannia Brown Bread ",
            "AMUL BUTTER",
            "",
            42
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let names = client(&server, None).known_products().await.unwrap();

    assert_eq!(names.len(), 2);
    assert!(names.contains("britannia brown bread"));
    assert!(names.contains("amul butter"));
}

#[tokio::test]
async fn non_list_names_payload_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "names": [] })))
        .mount(&server)
        .await;

    let err = client(&server, None).known_products().await.unwrap_err();
    assert!(matches!(err, UploadError::Decode { .. }), "got: {err:?}");
}

#[tokio::test]
async fn disabled_uploader_accepts_everything_and_knows_nothing() {
    let uploader = DisabledUploader;
    assert!(!uploader.is_enabled());
    assert!(uploader.push(&record()).await.is_ok());
    assert!(uploader.known_products().await.unwrap().is_empty());
}
