mod common;

use common::{MockTransport, options, visa};
use merchant_gateways::adapters::checkout_v2::{CheckoutV2Gateway, LIVE_URL, TEST_URL};
use merchant_gateways::domain::card::{PaymentOptions, PaymentSource};
use merchant_gateways::domain::error::GatewayError;
use merchant_gateways::domain::gateway::{Credentials, Gateway};
use merchant_gateways::domain::money::{Currency, MoneyAmount};
use merchant_gateways::domain::response::StandardErrorCode;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use merchant_gateways::transport::http::errors::ApiError;
use serde_json::Value;
use std::sync::Arc;

const APPROVED: &str = r#"{
  "id": "pay_1",
  "action_id": "act_1",
  "amount": 1000,
  "currency": "USD",
  "approved": true,
  "status": "Captured",
  "auth_code": "770687",
  "response_code": "10000",
  "response_summary": "Approved",
  "source": { "type": "card", "avs_check": "S", "cvv_check": "Y" },
  "risk": { "flagged": false },
  "reference": "order-1"
}"#;

fn credentials(test: bool) -> Credentials {
    Credentials::new().with("secret_key", "sk_test_abc").test_mode(test)
}

fn gateway(mock: &Arc<MockTransport>) -> CheckoutV2Gateway {
    CheckoutV2Gateway::new(&credentials(true), mock.clone()).unwrap()
}

fn sent_json(mock: &MockTransport) -> Value {
    serde_json::from_str(&mock.last_request().body).unwrap()
}

#[tokio::test]
async fn successful_purchase() {
    let mock = MockTransport::replying(201, APPROVED);
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.message, "Succeeded");
    assert_eq!(response.authorization.as_deref(), Some("pay_1"));
    assert_eq!(response.avs_result.code.as_deref(), Some("S"));
    assert_eq!(response.cvv_result.code.as_deref(), Some("Y"));
    assert_eq!(response.param("auth_code"), Some("770687"));
    assert_eq!(response.param("status"), Some("Captured"));

    let request = mock.last_request();
    assert_eq!(request.url, format!("{TEST_URL}/payments"));
    assert_eq!(request.header("Authorization"), Some("sk_test_abc"));

    let body = sent_json(&mock);
    assert_eq!(body["capture"], true);
    assert_eq!(body["amount"], 1000);
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["reference"], "order-1");
    assert_eq!(body["source"]["type"], "card");
    assert_eq!(body["source"]["number"], "4111111111111111");
    assert_eq!(body["source"]["expiry_month"], 9);
    assert_eq!(body["source"]["expiry_year"], 2030);
    assert_eq!(body["source"]["cvv"], "123");
    assert_eq!(body["source"]["billing_address"]["zip"], "K1C2N6");
    assert_eq!(body["customer"]["email"], "buyer@example.com");
    assert_eq!(body["payment_ip"], "127.0.0.1");
}

#[tokio::test]
async fn authorize_defers_capture() {
    let mock = MockTransport::replying(201, APPROVED);
    gateway(&mock)
        .authorize(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();
    assert_eq!(sent_json(&mock)["capture"], false);
}

#[tokio::test]
async fn declined_payment() {
    let body = r#"{"id":"pay_2","approved":false,"status":"Declined","response_code":"20051","response_summary":"Insufficient Funds"}"#;
    let mock = MockTransport::replying(201, body);
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.message, "Insufficient Funds");
    assert_eq!(response.error_code, Some(StandardErrorCode::CardDeclined));
}

#[tokio::test]
async fn invalid_request_maps_error_codes() {
    let body = r#"{"request_id":"req_1","error_type":"request_invalid","error_codes":["card_number_invalid"]}"#;
    let mock = MockTransport::replying(422, body);
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.message, "request_invalid");
    assert_eq!(response.error_code, Some(StandardErrorCode::InvalidNumber));
    assert_eq!(response.param("error_codes"), Some("card_number_invalid"));
}

#[tokio::test]
async fn bad_key_is_an_authentication_failure() {
    let mock = MockTransport::replying(401, "");
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "Authentication failed");
}

#[tokio::test]
async fn server_errors_are_raised() {
    let mock = MockTransport::replying(503, "");
    let err = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ResponseCode { status: 503, .. }));
}

#[tokio::test]
async fn follow_up_actions_post_to_payment_subresources() {
    let mock = MockTransport::new();
    mock.push(202, r#"{"action_id":"act_2","reference":"order-1"}"#);
    mock.push(202, r#"{"action_id":"act_3","reference":"order-1"}"#);
    mock.push(202, r#"{"action_id":"act_4","reference":"order-1"}"#);
    let gateway = gateway(&mock);

    let capture = gateway.capture(MoneyAmount::new(1000), "pay_1", &options()).await.unwrap();
    let refund = gateway.refund(MoneyAmount::new(400), "pay_1", &options()).await.unwrap();
    let void = gateway.void("pay_1", &options()).await.unwrap();

    for response in [&capture, &refund, &void] {
        assert!(response.success);
        assert_eq!(response.authorization.as_deref(), Some("pay_1"));
    }
    assert_eq!(refund.param("action_id"), Some("act_3"));

    let requests = mock.requests();
    assert_eq!(requests[0].url, format!("{TEST_URL}/payments/pay_1/captures"));
    assert_eq!(requests[1].url, format!("{TEST_URL}/payments/pay_1/refunds"));
    assert_eq!(requests[2].url, format!("{TEST_URL}/payments/pay_1/voids"));

    let refund_body: Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(refund_body["amount"], 400);
    let void_body: Value = serde_json::from_str(&requests[2].body).unwrap();
    assert!(void_body.get("amount").is_none());
}

#[tokio::test]
async fn follow_up_without_action_id_fails() {
    let body = r#"{"request_id":"req_2","error_type":"action_not_allowed"}"#;
    let mock = MockTransport::replying(403, body);
    let response = gateway(&mock).void("pay_1", &options()).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "action_not_allowed");
}

#[tokio::test]
async fn verify_is_a_zero_amount_authorization() {
    let mock = MockTransport::replying(201, APPROVED);
    let response = gateway(&mock).verify(&visa(), &options()).await.unwrap();

    assert!(response.success);
    assert_eq!(mock.requests().len(), 1);
    let body = sent_json(&mock);
    assert_eq!(body["amount"], 0);
    assert_eq!(body["capture"], false);
}

#[tokio::test]
async fn inquire_fetches_the_payment() {
    let mock = MockTransport::replying(200, r#"{"id":"pay_1","status":"Authorized","approved":true}"#);
    let response = gateway(&mock).inquire("pay_1").await.unwrap();

    assert!(response.success);
    assert_eq!(response.param("status"), Some("Authorized"));
    let request = mock.last_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, format!("{TEST_URL}/payments/pay_1"));
}

#[tokio::test]
async fn token_source_is_sent_by_id() {
    let mock = MockTransport::replying(201, APPROVED);
    gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::token("src_1"), &options())
        .await
        .unwrap();
    let body = sent_json(&mock);
    assert_eq!(body["source"]["type"], "id");
    assert_eq!(body["source"]["id"], "src_1");
}

#[tokio::test]
async fn zero_decimal_currency_amount() {
    let mock = MockTransport::replying(201, APPROVED);
    let opts = PaymentOptions {
        currency: Some(Currency::new("JPY").unwrap()),
        ..Default::default()
    };
    gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &opts)
        .await
        .unwrap();
    assert_eq!(sent_json(&mock)["amount"], 10);
}

#[tokio::test]
async fn live_mode_uses_production_host() {
    let mock = MockTransport::replying(201, APPROVED);
    let gateway = CheckoutV2Gateway::new(&credentials(false), mock.clone()).unwrap();
    gateway
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();
    assert_eq!(mock.last_request().url, format!("{LIVE_URL}/payments"));
}

#[test]
fn scrubs_key_number_and_cvv() {
    let gateway = gateway(&MockTransport::new());
    let transcript = "Authorization: sk_test_abc\n{\"number\":\"4111111111111111\",\"cvv\":\"123\",\"name\":\"Longbob\"}";
    let scrubbed = gateway.scrub(transcript);

    assert!(!scrubbed.contains("sk_test_abc"));
    assert!(!scrubbed.contains("4111111111111111"));
    assert!(!scrubbed.contains("\"123\""));
    assert!(scrubbed.contains("\"name\":\"Longbob\""));
}

#[tokio::test]
async fn html_error_page_is_a_malformed_reply() {
    let mock = MockTransport::replying(404, "<html>Not Found</html>");
    let err = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::MalformedResponse(_)));
    assert_eq!(ApiError::from(err).into_response().status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn unexpected_json_shape_is_a_malformed_reply() {
    let mock = MockTransport::replying(200, r#"{"approved": "maybe"}"#);
    let err = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
}
