use {
    super::{Filter, apply_filters},
    crate::{
        domain::{
            card::{CreditCard, PaymentOptions, PaymentSource},
            error::GatewayError,
            gateway::{Credentials, Gateway, GatewayFuture, GatewayInfo},
            money::{Currency, MoneyAmount, MoneyFormat},
            response::{AvsResult, CvvResult, Response, StandardErrorCode},
        },
        infra::http_client::Transport,
    },
    base64::{Engine, engine::general_purpose::STANDARD},
    once_cell::sync::Lazy,
    regex::Regex,
    serde_json::Value,
    std::{collections::BTreeMap, sync::Arc},
};

pub const LIVE_URL: &str = "https://api.stripe.com/v1/";
const API_VERSION: &str = "2015-04-07";

static FILTERS: Lazy<Vec<Filter>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(Authorization: Basic )[\w=]+").expect("valid"),
            "${1}[FILTERED]",
        ),
        (
            Regex::new(r"(card(?:\[|%5B)number(?:\]|%5D)=)\d+").expect("valid"),
            "${1}[FILTERED]",
        ),
        (
            Regex::new(r"(card(?:\[|%5B)cvc(?:\]|%5D)=)\d+").expect("valid"),
            "${1}[FILTERED]",
        ),
    ]
});

type Params = Vec<(String, String)>;

pub struct StripeGateway {
    info: GatewayInfo,
    secret_key: String,
    transport: Arc<dyn Transport>,
}

impl StripeGateway {
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        credentials.require(&["login"])?;
        Ok(Self {
            info: GatewayInfo {
                name: "stripe",
                display_name: "Stripe",
                homepage: "https://stripe.com/",
                supported_countries: &[
                    "AT", "AU", "BE", "CA", "CH", "DE", "DK", "ES", "FI", "FR", "GB", "IE", "IT",
                    "JP", "LU", "NL", "NO", "NZ", "PT", "SE", "SG", "US",
                ],
                supported_cardtypes: &[
                    "visa",
                    "master",
                    "american_express",
                    "discover",
                    "jcb",
                    "diners_club",
                    "maestro",
                ],
                default_currency: Currency::usd(),
                money_format: MoneyFormat::Cents,
                currencies_without_fractions: Some(&[
                    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "VND",
                    "VUV", "XAF", "XOF", "XPF", "UGX",
                ]),
                test: credentials.is_test(),
            },
            secret_key: credentials.fetch("login")?,
            transport,
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let key = STANDARD.encode(format!("{}:", self.secret_key));
        vec![
            ("Authorization", format!("Basic {key}")),
            ("Content-Type", "application/x-www-form-urlencoded".into()),
            ("Stripe-Version", API_VERSION.into()),
        ]
    }

    fn add_amount(&self, params: &mut Params, money: MoneyAmount, options: &PaymentOptions) {
        let currency = self.info.currency_for(options);
        params.push(("amount".into(), self.info.localized_amount(money, &currency)));
        params.push(("currency".into(), currency.as_str().to_ascii_lowercase()));
    }

    fn add_card(params: &mut Params, card: &CreditCard) {
        params.push(("card[number]".into(), card.number.clone()));
        params.push(("card[exp_month]".into(), card.month.to_string()));
        params.push(("card[exp_year]".into(), card.year.to_string()));
        if let Some(cvc) = &card.verification_value {
            params.push(("card[cvc]".into(), cvc.clone()));
        }
        params.push(("card[name]".into(), card.name()));
    }

    fn add_address(params: &mut Params, options: &PaymentOptions) {
        let Some(address) = &options.billing_address else {
            return;
        };
        let fields = [
            ("card[address_line1]", &address.address1),
            ("card[address_line2]", &address.address2),
            ("card[address_city]", &address.city),
            ("card[address_state]", &address.state),
            ("card[address_zip]", &address.zip),
            ("card[address_country]", &address.country),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                params.push((key.into(), value.clone()));
            }
        }
    }

    fn add_source(params: &mut Params, source: &PaymentSource, options: &PaymentOptions) {
        match source {
            PaymentSource::Card(card) => {
                Self::add_card(params, card);
                Self::add_address(params, options);
            }
            // `cus_xxx|card_xxx` as returned by store
            PaymentSource::Token { token } => {
                let mut parts = token.splitn(2, '|');
                if let Some(customer) = parts.next() {
                    params.push(("customer".into(), customer.to_string()));
                }
                if let Some(card) = parts.next().filter(|c| !c.is_empty()) {
                    params.push(("card".into(), card.to_string()));
                }
            }
        }
    }

    fn add_metadata(params: &mut Params, options: &PaymentOptions) {
        if let Some(description) = &options.description {
            params.push(("description".into(), description.clone()));
        }
        if let Some(order_id) = &options.order_id {
            params.push(("metadata[order_id]".into(), order_id.clone()));
        }
        if let Some(email) = &options.email {
            params.push(("metadata[email]".into(), email.clone()));
        }
        if let Some(ip) = &options.ip {
            params.push(("metadata[ip]".into(), ip.clone()));
        }
    }

    fn charge_params(
        &self,
        money: MoneyAmount,
        source: &PaymentSource,
        options: &PaymentOptions,
        capture: bool,
    ) -> Params {
        let mut params = Params::new();
        self.add_amount(&mut params, money, options);
        Self::add_source(&mut params, source, options);
        Self::add_metadata(&mut params, options);
        if !capture {
            params.push(("capture".into(), "false".into()));
        }
        params
    }

    async fn commit(&self, action: &'static str, path: &str, params: Params) -> Result<Response, GatewayError> {
        let body = serde_urlencoded::to_string(&params)?;
        tracing::debug!(gateway = "stripe", action, path, request = %self.scrub(&body), "posting to processor");

        let url = format!("{LIVE_URL}{path}");
        // 402 and friends carry a JSON error body, so the status is not checked here.
        let raw = self.transport.post(&url, body, self.headers()).await?;
        let json: Value = serde_json::from_str(&raw.body).map_err(|e| {
            tracing::warn!(gateway = "stripe", status = raw.status, "non-JSON reply: {e}");
            GatewayError::MalformedResponse(format!(
                "Invalid response received from the Stripe API (HTTP {}): {}",
                raw.status, raw.body
            ))
        })?;

        let response = self.parse(action, &json);
        tracing::info!(
            gateway = "stripe",
            action,
            success = response.success,
            status = raw.status,
            "processor response"
        );
        Ok(response)
    }

    fn parse(&self, action: &str, json: &Value) -> Response {
        let error = json.get("error");
        let success = error.is_none();

        let message = match error {
            None => "Transaction approved".to_string(),
            Some(e) => str_field(e, "message")
                .unwrap_or("Unknown error")
                .to_string(),
        };

        let authorization = if success {
            let id = str_field(json, "id").map(str::to_string);
            if action == "store" {
                let card = str_field(json, "default_source")
                    .or_else(|| str_field(json, "default_card"))
                    .unwrap_or_default();
                id.map(|customer| format!("{customer}|{card}"))
            } else {
                id
            }
        } else {
            error.and_then(|e| str_field(e, "charge")).map(str::to_string)
        };

        let card = json.get("source").or_else(|| json.get("card"));
        let avs = card
            .map(|c| {
                AvsResult::from_matches(
                    check_letter(str_field(c, "address_line1_check")),
                    check_letter(str_field(c, "address_zip_check")),
                )
            })
            .unwrap_or_default();
        let cvv = CvvResult::new(card.and_then(|c| match str_field(c, "cvc_check") {
            Some("pass") => Some("M"),
            Some("fail") => Some("N"),
            Some("unavailable") | Some("unchecked") => Some("P"),
            _ => None,
        }));

        let error_code = error.map(|e| {
            str_field(e, "decline_code")
                .and_then(decline_code_from)
                .or_else(|| str_field(e, "code").and_then(error_code_from))
                .unwrap_or(StandardErrorCode::ProcessingError)
        });

        let fraud_review = json
            .get("outcome")
            .and_then(|o| str_field(o, "type"))
            .is_some_and(|t| t == "manual_review");

        let test = json
            .get("livemode")
            .and_then(Value::as_bool)
            .map_or(self.info.test, |live| !live);

        Response::new(success, message)
            .with_authorization(authorization)
            .with_avs(avs)
            .with_cvv(cvv)
            .with_error_code(error_code)
            .with_fraud_review(fraud_review)
            .with_test(test)
            .with_params(flatten(json))
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn check_letter(check: Option<&str>) -> Option<&'static str> {
    match check {
        Some("pass") => Some("Y"),
        Some("fail") => Some("N"),
        _ => None,
    }
}

fn error_code_from(code: &str) -> Option<StandardErrorCode> {
    Some(match code {
        "incorrect_number" => StandardErrorCode::IncorrectNumber,
        "invalid_number" => StandardErrorCode::InvalidNumber,
        "invalid_expiry_month" | "invalid_expiry_year" => StandardErrorCode::InvalidExpiryDate,
        "invalid_cvc" => StandardErrorCode::InvalidCvc,
        "expired_card" => StandardErrorCode::ExpiredCard,
        "incorrect_cvc" => StandardErrorCode::IncorrectCvc,
        "incorrect_zip" => StandardErrorCode::IncorrectZip,
        "card_declined" => StandardErrorCode::CardDeclined,
        "call_issuer" => StandardErrorCode::CallIssuer,
        "processing_error" => StandardErrorCode::ProcessingError,
        "incorrect_pin" => StandardErrorCode::IncorrectPin,
        "test_mode_live_card" => StandardErrorCode::TestModeLiveCard,
        _ => return None,
    })
}

fn decline_code_from(code: &str) -> Option<StandardErrorCode> {
    Some(match code {
        "pickup_card" | "lost_card" | "stolen_card" => StandardErrorCode::PickupCard,
        "call_issuer" => StandardErrorCode::CallIssuer,
        "incorrect_cvc" => StandardErrorCode::IncorrectCvc,
        "incorrect_zip" => StandardErrorCode::IncorrectZip,
        "expired_card" => StandardErrorCode::ExpiredCard,
        "generic_decline" | "do_not_honor" | "insufficient_funds" => {
            StandardErrorCode::CardDeclined
        }
        _ => return None,
    })
}

/// Top-level scalars as strings; nested objects are skipped.
fn flatten(json: &Value) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(object) = json.as_object() {
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            params.insert(key.clone(), text);
        }
    }
    if let Some(error) = json.get("error").and_then(Value::as_object) {
        for (key, value) in error {
            if let Some(s) = value.as_str() {
                params.insert(format!("error_{key}"), s.to_string());
            }
        }
    }
    params
}

impl Gateway for StripeGateway {
    fn info(&self) -> &GatewayInfo {
        &self.info
    }

    fn purchase<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let params = self.charge_params(money, source, options, true);
            self.commit("purchase", "charges", params).await
        })
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let params = self.charge_params(money, source, options, false);
            self.commit("authorize", "charges", params).await
        })
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let currency = self.info.currency_for(options);
            let params = vec![(
                "amount".to_string(),
                self.info.localized_amount(money, &currency),
            )];
            let path = format!("charges/{authorization}/capture");
            self.commit("capture", &path, params).await
        })
    }

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let currency = self.info.currency_for(options);
            let mut params = vec![
                ("charge".to_string(), authorization.to_string()),
                (
                    "amount".to_string(),
                    self.info.localized_amount(money, &currency),
                ),
            ];
            if let Some(order_id) = &options.order_id {
                params.push(("metadata[order_id]".into(), order_id.clone()));
            }
            self.commit("refund", "refunds", params).await
        })
    }

    /// Stripe has no separate void; refunding an uncaptured charge in full
    /// releases the hold.
    fn void<'a>(
        &'a self,
        authorization: &'a str,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let params = vec![("charge".to_string(), authorization.to_string())];
            self.commit("void", "refunds", params).await
        })
    }

    fn store<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params = Params::new();
            Self::add_card(&mut params, card);
            Self::add_address(&mut params, options);
            if let Some(email) = &options.email {
                params.push(("email".into(), email.clone()));
            }
            if let Some(description) = &options.description {
                params.push(("description".into(), description.clone()));
            }
            self.commit("store", "customers", params).await
        })
    }

    fn supports_scrubbing(&self) -> bool {
        true
    }

    fn scrub(&self, transcript: &str) -> String {
        apply_filters(transcript, &FILTERS)
    }
}
