use merchant_gateways::adapters::GatewayKind;
use merchant_gateways::config::AppConfig;
use merchant_gateways::domain::error::GatewayError;
use std::time::Duration;

#[test]
fn defaults_to_bogus_in_test_mode() {
    let config = AppConfig::from_vars(Vec::<(String, String)>::new()).unwrap();

    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
    assert_eq!(config.http_timeout, Duration::from_secs(60));
    assert!(config.test_mode);
    assert_eq!(config.gateways.len(), 1);
    assert_eq!(config.gateways[0].0, GatewayKind::Bogus);
}

#[test]
fn reads_per_gateway_credentials() {
    let config = AppConfig::from_vars([
        ("GATEWAYS", "nmi, checkout-v2"),
        ("NMI_LOGIN", "demo"),
        ("NMI_PASSWORD", "password"),
        ("CHECKOUT_V2_SECRET_KEY", "sk_test"),
        ("STRIPE_LOGIN", "ignored"),
        ("GATEWAY_TEST_MODE", "false"),
        ("BIND_ADDR", "127.0.0.1:8080"),
        ("HTTP_TIMEOUT_SECS", "15"),
    ])
    .unwrap();

    assert_eq!(config.bind_addr.port(), 8080);
    assert_eq!(config.http_timeout, Duration::from_secs(15));
    assert!(!config.test_mode);

    let kinds: Vec<_> = config.gateways.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, [GatewayKind::Nmi, GatewayKind::CheckoutV2]);

    let (_, nmi) = &config.gateways[0];
    assert_eq!(nmi.get("login"), Some("demo"));
    assert_eq!(nmi.get("password"), Some("password"));
    assert!(!nmi.is_test());

    let (_, checkout) = &config.gateways[1];
    assert_eq!(checkout.get("secret_key"), Some("sk_test"));
    assert_eq!(checkout.get("login"), None);
}

#[test]
fn duplicate_gateways_are_configured_once() {
    let config = AppConfig::from_vars([("GATEWAYS", "bogus,BOGUS")]).unwrap();
    assert_eq!(config.gateways.len(), 1);
}

#[test]
fn rejects_bad_values() {
    assert!(matches!(
        AppConfig::from_vars([("GATEWAYS", "paypal")]),
        Err(GatewayError::UnknownGateway(_))
    ));
    assert!(matches!(
        AppConfig::from_vars([("GATEWAY_TEST_MODE", "maybe")]),
        Err(GatewayError::Validation(_))
    ));
    assert!(matches!(
        AppConfig::from_vars([("HTTP_TIMEOUT_SECS", "soon")]),
        Err(GatewayError::Validation(_))
    ));
    assert!(matches!(
        AppConfig::from_vars([("BIND_ADDR", "localhost")]),
        Err(GatewayError::Validation(_))
    ));
}
