mod common;

use common::{MockTransport, options, visa};
use merchant_gateways::adapters::authorize_net::{AuthorizeNetGateway, LIVE_URL, TEST_URL};
use merchant_gateways::domain::card::{PaymentOptions, PaymentSource};
use merchant_gateways::domain::error::GatewayError;
use merchant_gateways::domain::gateway::{Credentials, Gateway};
use merchant_gateways::domain::money::{Currency, MoneyAmount};
use merchant_gateways::domain::response::StandardErrorCode;
use std::sync::Arc;

fn reply(response_code: &str, trans_id: &str, inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<createTransactionResponse xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="AnetApi/xml/v1/schema/AnetApiSchema.xsd">
  <refId>order-1</refId>
  <messages>
    <resultCode>Ok</resultCode>
    <message><code>I00001</code><text>Successful.</text></message>
  </messages>
  <transactionResponse>
    <responseCode>{response_code}</responseCode>
    <authCode>GSOFTZ</authCode>
    <avsResultCode>Y</avsResultCode>
    <cvvResultCode>P</cvvResultCode>
    <transId>{trans_id}</transId>
    <accountNumber>XXXX1111</accountNumber>
    {inner}
  </transactionResponse>
</createTransactionResponse>"#
    )
}

fn approved() -> String {
    reply(
        "1",
        "508141795",
        "<messages><message><code>1</code><description>This transaction has been approved.</description></message></messages>",
    )
}

fn credentials(test: bool) -> Credentials {
    Credentials::new()
        .with("login", "api_login")
        .with("password", "trans_key")
        .test_mode(test)
}

fn gateway(mock: &Arc<MockTransport>) -> AuthorizeNetGateway {
    AuthorizeNetGateway::new(&credentials(true), mock.clone()).unwrap()
}

#[tokio::test]
async fn successful_purchase() {
    let mock = MockTransport::replying(200, &approved());
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.message, "This transaction has been approved.");
    assert_eq!(response.authorization.as_deref(), Some("508141795#1111#purchase"));
    assert_eq!(response.avs_result.code.as_deref(), Some("Y"));
    assert_eq!(response.cvv_result.code.as_deref(), Some("P"));
    assert_eq!(response.param("authorization_code"), Some("GSOFTZ"));
    assert!(response.test);

    let request = mock.last_request();
    assert_eq!(request.url, TEST_URL);
    assert!(request.body.starts_with("<?xml"));
    for expected in [
        r#"<createTransactionRequest xmlns="AnetApi/xml/v1/schema/AnetApiSchema.xsd">"#,
        "<name>api_login</name>",
        "<transactionType>authCaptureTransaction</transactionType>",
        "<amount>10.00</amount>",
        "<currencyCode>USD</currencyCode>",
        "<cardNumber>4111111111111111</cardNumber>",
        "<expirationDate>2030-09</expirationDate>",
        "<cardCode>123</cardCode>",
        "<invoiceNumber>order-1</invoiceNumber>",
        "<email>buyer@example.com</email>",
        "<customerIP>127.0.0.1</customerIP>",
    ] {
        assert!(request.body.contains(expected), "missing {expected} in {}", request.body);
    }
}

#[tokio::test]
async fn declined_purchase_maps_error_code() {
    let body = reply(
        "2",
        "508141796",
        "<errors><error><errorCode>2</errorCode><errorText>This transaction has been declined.</errorText></error></errors>",
    );
    let mock = MockTransport::replying(200, &body);
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.message, "This transaction has been declined.");
    assert_eq!(response.error_code, Some(StandardErrorCode::CardDeclined));
}

#[tokio::test]
async fn held_for_review_is_flagged() {
    let mock = MockTransport::replying(200, &reply("4", "508141797", ""));
    let response = gateway(&mock)
        .authorize(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();

    assert!(!response.success);
    assert!(response.fraud_review);
    assert!(mock.last_request().body.contains("authOnlyTransaction"));
}

#[tokio::test]
async fn byte_order_mark_is_tolerated() {
    let mock = MockTransport::replying(200, &format!("\u{feff}{}", approved()));
    let response = gateway(&mock)
        .purchase(MoneyAmount::new(1000), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();
    assert!(response.success);
}

#[tokio::test]
async fn refund_sends_last_four_digits() {
    let mock = MockTransport::replying(200, &approved());
    gateway(&mock)
        .refund(MoneyAmount::new(500), "508141795#1111#purchase", &options())
        .await
        .unwrap();

    let body = mock.last_request().body;
    assert!(body.contains("<transactionType>refundTransaction</transactionType>"));
    assert!(body.contains("<cardNumber>1111</cardNumber>"));
    assert!(body.contains("<expirationDate>XXXX</expirationDate>"));
    assert!(body.contains("<refTransId>508141795</refTransId>"));
    assert!(body.contains("<amount>5.00</amount>"));
}

#[tokio::test]
async fn refund_without_last_four_is_rejected() {
    let mock = MockTransport::new();
    let err = gateway(&mock)
        .refund(MoneyAmount::new(500), "508141795", &options())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Validation(_)));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn capture_and_void_reference_the_transaction() {
    let mock = MockTransport::new();
    mock.push(200, &approved());
    mock.push(200, &approved());
    let gateway = gateway(&mock);

    gateway
        .capture(MoneyAmount::new(1000), "508141795#1111#authorize", &options())
        .await
        .unwrap();
    gateway.void("508141795#1111#authorize", &options()).await.unwrap();

    let requests = mock.requests();
    assert!(requests[0].body.contains("priorAuthCaptureTransaction"));
    assert!(requests[0].body.contains("<refTransId>508141795</refTransId>"));
    assert!(requests[1].body.contains("voidTransaction"));
    assert!(!requests[1].body.contains("<amount>"));
}

#[tokio::test]
async fn verify_authorizes_and_voids() {
    let mock = MockTransport::new();
    mock.push(200, &approved());
    mock.push(200, &approved());
    let response = gateway(&mock).verify(&visa(), &options()).await.unwrap();

    assert!(response.success);
    assert_eq!(response.steps.len(), 2);
    let requests = mock.requests();
    assert!(requests[0].body.contains("<amount>1.00</amount>"));
    assert!(requests[1].body.contains("voidTransaction"));
}

#[tokio::test]
async fn tokens_and_store_are_not_supported() {
    let mock = MockTransport::new();
    let gateway = gateway(&mock);

    let err = gateway
        .purchase(MoneyAmount::new(100), &PaymentSource::token("abc"), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    let err = gateway.store(&visa(), &options()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotSupported { action: "store", .. }));
}

#[tokio::test]
async fn live_mode_uses_production_endpoint() {
    let mock = MockTransport::replying(200, &approved());
    let gateway = AuthorizeNetGateway::new(&credentials(false), mock.clone()).unwrap();
    gateway
        .purchase(MoneyAmount::new(100), &PaymentSource::Card(visa()), &options())
        .await
        .unwrap();
    assert_eq!(mock.last_request().url, LIVE_URL);
}

#[test]
fn scrubs_card_and_key() {
    let gateway = gateway(&MockTransport::new());
    let scrubbed = gateway.scrub(
        "<transactionKey>trans_key</transactionKey><cardNumber>4111111111111111</cardNumber><cardCode>123</cardCode>",
    );
    assert_eq!(
        scrubbed,
        "<transactionKey>[FILTERED]</transactionKey><cardNumber>[FILTERED]</cardNumber><cardCode>[FILTERED]</cardCode>"
    );
}

#[tokio::test]
async fn amounts_follow_currency_exponent() {
    let mock = MockTransport::new();
    mock.push(200, &approved());
    mock.push(200, &approved());
    let gateway = gateway(&mock);

    for code in ["JPY", "KWD"] {
        let opts = PaymentOptions {
            currency: Some(Currency::new(code).unwrap()),
            ..options()
        };
        gateway
            .purchase(MoneyAmount::new(1234), &PaymentSource::Card(visa()), &opts)
            .await
            .unwrap();
    }

    let requests = mock.requests();
    assert!(requests[0].body.contains("<amount>12</amount>"), "{}", requests[0].body);
    assert!(requests[1].body.contains("<amount>1.234</amount>"), "{}", requests[1].body);
}

#[tokio::test]
async fn follow_ups_recover_last_four_from_the_reply() {
    let mock = MockTransport::new();
    mock.push(200, &approved());
    mock.push(200, &approved());
    let gateway = gateway(&mock);

    let captured = gateway
        .capture(MoneyAmount::new(1000), "508141795", &options())
        .await
        .unwrap();
    assert_eq!(captured.authorization.as_deref(), Some("508141795#1111#capture"));

    let voided = gateway.void("508141795", &options()).await.unwrap();
    assert_eq!(voided.authorization.as_deref(), Some("508141795#1111#void"));
}
