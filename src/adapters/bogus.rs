//! In-process gateway for tests and demos. Outcomes are driven by the last
//! digit of the card number or reference, no network involved.

use {
    crate::domain::{
        card::{CreditCard, PaymentOptions, PaymentSource},
        error::GatewayError,
        gateway::{Gateway, GatewayFuture, GatewayInfo},
        money::{Currency, MoneyAmount, MoneyFormat},
        response::{Response, StandardErrorCode},
    },
    std::collections::BTreeMap,
};

pub const AUTHORIZATION: &str = "53433";
pub const SUCCESS_MESSAGE: &str = "Bogus Gateway: Forced success";
pub const FAILURE_MESSAGE: &str = "Bogus Gateway: Forced failure";
pub const ERROR_MESSAGE: &str = "Bogus Gateway: Use CreditCard number ending in 1 for success, 2 for exception and anything else for error";
pub const REFERENCE_ERROR_MESSAGE: &str = "Bogus Gateway: Use authorization number ending in 1 for exception, 2 for error and anything else for success";

pub struct BogusGateway {
    info: GatewayInfo,
}

impl Default for BogusGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl BogusGateway {
    pub fn new() -> Self {
        Self {
            info: GatewayInfo {
                name: "bogus",
                display_name: "Bogus",
                homepage: "http://example.com",
                supported_countries: &["US"],
                supported_cardtypes: &["bogus"],
                default_currency: Currency::usd(),
                money_format: MoneyFormat::Dollars,
                currencies_without_fractions: None,
                test: true,
            },
        }
    }

    fn normalize(source: &PaymentSource) -> &str {
        match source {
            PaymentSource::Card(card) => &card.number,
            PaymentSource::Token { token } => token,
        }
    }

    fn by_source(
        &self,
        source: &str,
        amount_key: &str,
        money: MoneyAmount,
    ) -> Result<Response, GatewayError> {
        let amount = self.info.amount(money);
        if source.ends_with('1') || source == AUTHORIZATION {
            Ok(success(amount_key, amount).with_authorization(Some(AUTHORIZATION.into())))
        } else if source.ends_with('2') {
            Ok(failure(amount_key, amount))
        } else {
            Err(GatewayError::Bogus(ERROR_MESSAGE.into()))
        }
    }

    fn by_reference(
        &self,
        reference: &str,
        amount_key: &str,
        money: Option<MoneyAmount>,
    ) -> Result<Response, GatewayError> {
        let amount = money.map(|m| self.info.amount(m)).unwrap_or_default();
        if reference.ends_with('1') {
            Err(GatewayError::Bogus(REFERENCE_ERROR_MESSAGE.into()))
        } else if reference.ends_with('2') {
            Ok(failure(amount_key, amount))
        } else {
            Ok(success(amount_key, amount))
        }
    }
}

fn success(amount_key: &str, amount: String) -> Response {
    let params = BTreeMap::from([(amount_key.to_string(), amount)]);
    Response::new(true, SUCCESS_MESSAGE)
        .with_params(params)
        .with_test(true)
}

fn failure(amount_key: &str, amount: String) -> Response {
    let params = BTreeMap::from([
        (amount_key.to_string(), amount),
        ("error".to_string(), FAILURE_MESSAGE.to_string()),
    ]);
    Response::new(false, FAILURE_MESSAGE)
        .with_params(params)
        .with_test(true)
        .with_error_code(Some(StandardErrorCode::ProcessingError))
}

impl Gateway for BogusGateway {
    fn info(&self) -> &GatewayInfo {
        &self.info
    }

    fn purchase<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move { self.by_source(Self::normalize(source), "paid_amount", money) })
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move { self.by_source(Self::normalize(source), "authorized_amount", money) })
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move { self.by_reference(authorization, "paid_amount", Some(money)) })
    }

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move { self.by_reference(authorization, "paid_amount", Some(money)) })
    }

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            self.by_reference(authorization, "authorization", None)
                .map(|mut response| {
                    response
                        .params
                        .insert("authorization".to_string(), authorization.to_string());
                    response
                })
        })
    }

    fn store<'a>(
        &'a self,
        card: &'a CreditCard,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            if card.number.ends_with('1') {
                let params = BTreeMap::from([("billingid".to_string(), "1".to_string())]);
                Ok(Response::new(true, SUCCESS_MESSAGE)
                    .with_params(params)
                    .with_test(true)
                    .with_authorization(Some(AUTHORIZATION.into())))
            } else if card.number.ends_with('2') {
                Ok(failure("billingid", String::new()))
            } else {
                Err(GatewayError::Bogus(ERROR_MESSAGE.into()))
            }
        })
    }
}
