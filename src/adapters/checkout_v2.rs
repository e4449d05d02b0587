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
        infra::http_client::{Headers, RawResponse, Transport},
    },
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::{collections::BTreeMap, sync::Arc},
};

pub const TEST_URL: &str = "https://api.sandbox.checkout.com";
pub const LIVE_URL: &str = "https://api.checkout.com";

static FILTERS: Lazy<Vec<Filter>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)(Authorization: )\S+").expect("valid"),
            "${1}[FILTERED]",
        ),
        (Regex::new(r#"("number"\s*:\s*")\d+"#).expect("valid"), "${1}[FILTERED]"),
        (Regex::new(r#"("cvv"\s*:\s*")\d+"#).expect("valid"), "${1}[FILTERED]"),
    ]
});

#[derive(Debug, Serialize)]
struct PaymentRequest {
    capture: bool,
    amount: u64,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    source: SourceRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<CustomerRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SourceRequest {
    Card {
        number: String,
        expiry_month: u8,
        expiry_year: u16,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cvv: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        billing_address: Option<BillingAddress>,
    },
    Id {
        id: String,
    },
}

#[derive(Debug, Serialize)]
struct BillingAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
}

#[derive(Debug, Serialize)]
struct CustomerRequest {
    email: String,
}

#[derive(Debug, Serialize)]
struct ActionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutReply {
    id: Option<String>,
    action_id: Option<String>,
    approved: Option<bool>,
    status: Option<String>,
    response_code: Option<String>,
    response_summary: Option<String>,
    error_type: Option<String>,
    #[serde(default)]
    error_codes: Vec<String>,
    source: Option<SourceReply>,
    risk: Option<RiskReply>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceReply {
    avs_check: Option<String>,
    cvv_check: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RiskReply {
    #[serde(default)]
    flagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Purchase,
    Authorize,
    Capture,
    Refund,
    Void,
    Inquire,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Authorize => "authorize",
            Self::Capture => "capture",
            Self::Refund => "refund",
            Self::Void => "void",
            Self::Inquire => "inquire",
        }
    }

    fn is_follow_up(&self) -> bool {
        matches!(self, Self::Capture | Self::Refund | Self::Void)
    }
}

pub struct CheckoutV2Gateway {
    info: GatewayInfo,
    secret_key: String,
    transport: Arc<dyn Transport>,
}

impl CheckoutV2Gateway {
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        credentials.require(&["secret_key"])?;
        Ok(Self {
            info: GatewayInfo {
                name: "checkout_v2",
                display_name: "Checkout.com Unified Payments",
                homepage: "https://www.checkout.com/",
                supported_countries: &[
                    "AD", "AE", "AT", "BE", "BG", "CH", "CY", "CZ", "DE", "DK", "EE", "ES", "FI",
                    "FR", "GB", "GR", "HK", "HR", "HU", "IE", "IS", "IT", "LI", "LT", "LU", "LV",
                    "MC", "MT", "MY", "NL", "NO", "PL", "PT", "RO", "SA", "SE", "SG", "SI", "SK",
                    "SM", "US",
                ],
                supported_cardtypes: &[
                    "visa",
                    "master",
                    "american_express",
                    "diners_club",
                    "maestro",
                    "discover",
                    "jcb",
                ],
                default_currency: Currency::usd(),
                money_format: MoneyFormat::Cents,
                currencies_without_fractions: None,
                test: credentials.is_test(),
            },
            secret_key: credentials.fetch("secret_key")?,
            transport,
        })
    }

    fn base_url(&self) -> &'static str {
        if self.info.test { TEST_URL } else { LIVE_URL }
    }

    fn headers(&self) -> Headers {
        vec![
            ("Authorization", self.secret_key.clone()),
            ("Content-Type", "application/json;charset=UTF-8".into()),
        ]
    }

    fn minor_units(&self, money: MoneyAmount, options: &PaymentOptions) -> Result<u64, GatewayError> {
        let currency = self.info.currency_for(options);
        let localized = self.info.localized_amount(money, &currency);
        localized
            .parse()
            .map_err(|_| GatewayError::Validation(format!("amount is not integral: {localized}")))
    }

    fn payment_request(
        &self,
        money: MoneyAmount,
        source: &PaymentSource,
        options: &PaymentOptions,
        capture: bool,
    ) -> Result<PaymentRequest, GatewayError> {
        let source = match source {
            PaymentSource::Card(card) => Self::card_source(card, options),
            PaymentSource::Token { token } => SourceRequest::Id { id: token.clone() },
        };
        Ok(PaymentRequest {
            capture,
            amount: self.minor_units(money, options)?,
            currency: self.info.currency_for(options).to_string(),
            reference: options.order_id.clone(),
            description: options.description.clone(),
            source,
            customer: options.email.clone().map(|email| CustomerRequest { email }),
            payment_ip: options.ip.clone(),
        })
    }

    fn card_source(card: &CreditCard, options: &PaymentOptions) -> SourceRequest {
        SourceRequest::Card {
            number: card.number.clone(),
            expiry_month: card.month,
            expiry_year: card.year,
            name: card.name(),
            cvv: card.verification_value.clone(),
            billing_address: options.billing_address.as_ref().map(|a| BillingAddress {
                address_line1: a.address1.clone(),
                address_line2: a.address2.clone(),
                city: a.city.clone(),
                state: a.state.clone(),
                zip: a.zip.clone(),
                country: a.country.clone(),
            }),
        }
    }

    async fn commit(
        &self,
        action: Action,
        path: &str,
        body: Option<String>,
        payment_id: Option<&str>,
    ) -> Result<Response, GatewayError> {
        let url = format!("{}{path}", self.base_url());
        let raw = match body {
            Some(body) => {
                tracing::debug!(gateway = "checkout_v2", action = action.as_str(), request = %self.scrub(&body), "posting to processor");
                self.transport.post(&url, body, self.headers()).await?
            }
            None => self.transport.get(&url, self.headers()).await?,
        };

        let response = self.parse(action, &raw, payment_id)?;
        tracing::info!(
            gateway = "checkout_v2",
            action = action.as_str(),
            success = response.success,
            status = raw.status,
            "processor response"
        );
        Ok(response)
    }

    fn parse(
        &self,
        action: Action,
        raw: &RawResponse,
        payment_id: Option<&str>,
    ) -> Result<Response, GatewayError> {
        if raw.status >= 500 {
            return Err(GatewayError::ResponseCode {
                status: raw.status,
                body: raw.body.clone(),
            });
        }
        let json: Value = if raw.body.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&raw.body).map_err(|e| malformed(raw, e))?
        };
        let reply: CheckoutReply =
            serde_json::from_value(json.clone()).map_err(|e| malformed(raw, e))?;

        let success = if raw.status == 401 || reply.error_type.is_some() {
            false
        } else if action.is_follow_up() {
            raw.status == 202 && reply.action_id.is_some()
        } else if action == Action::Inquire {
            reply.id.is_some()
        } else {
            reply.approved == Some(true)
        };

        let message = if success {
            "Succeeded".to_string()
        } else if raw.status == 401 {
            "Authentication failed".to_string()
        } else {
            reply
                .response_summary
                .clone()
                .or_else(|| reply.error_type.clone())
                .unwrap_or_else(|| "Unable to read error message".to_string())
        };

        let error_code = (!success).then(|| {
            reply
                .response_code
                .as_deref()
                .and_then(response_code_to_error)
                .or_else(|| reply.error_codes.iter().find_map(|c| error_type_to_error(c)))
                .unwrap_or(StandardErrorCode::ProcessingError)
        });

        let authorization = reply.id.clone().or_else(|| payment_id.map(str::to_string));
        let source = reply.source.unwrap_or_default();

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        if let Some(object) = json.as_object() {
            for (key, value) in object {
                match value {
                    Value::String(s) => {
                        params.insert(key.clone(), s.clone());
                    }
                    Value::Number(_) | Value::Bool(_) => {
                        params.insert(key.clone(), value.to_string());
                    }
                    _ => {}
                }
            }
        }
        if let Some(status) = &reply.status {
            params.insert("status".into(), status.clone());
        }
        if !reply.error_codes.is_empty() {
            params.insert("error_codes".into(), reply.error_codes.join(","));
        }

        Ok(Response::new(success, message)
            .with_authorization(authorization)
            .with_avs(AvsResult::new(source.avs_check.as_deref()))
            .with_cvv(CvvResult::new(source.cvv_check.as_deref()))
            .with_error_code(error_code)
            .with_fraud_review(reply.risk.is_some_and(|r| r.flagged))
            .with_test(self.info.test)
            .with_params(params))
    }

    /// Looks a payment up by id.
    pub async fn inquire(&self, authorization: &str) -> Result<Response, GatewayError> {
        let path = format!("/payments/{authorization}");
        self.commit(Action::Inquire, &path, None, Some(authorization))
            .await
    }

    async fn payment(
        &self,
        action: Action,
        money: MoneyAmount,
        source: &PaymentSource,
        options: &PaymentOptions,
    ) -> Result<Response, GatewayError> {
        let request = self.payment_request(money, source, options, action == Action::Purchase)?;
        let body = serde_json::to_string(&request)?;
        self.commit(action, "/payments", Some(body), None).await
    }

    async fn follow_up(
        &self,
        action: Action,
        money: Option<MoneyAmount>,
        authorization: &str,
        options: &PaymentOptions,
    ) -> Result<Response, GatewayError> {
        let request = ActionRequest {
            amount: money.map(|m| self.minor_units(m, options)).transpose()?,
            reference: options.order_id.clone(),
        };
        let segment = match action {
            Action::Capture => "captures",
            Action::Refund => "refunds",
            _ => "voids",
        };
        let path = format!("/payments/{authorization}/{segment}");
        let body = serde_json::to_string(&request)?;
        self.commit(action, &path, Some(body), Some(authorization))
            .await
    }
}

fn response_code_to_error(code: &str) -> Option<StandardErrorCode> {
    Some(match code {
        "20014" => StandardErrorCode::InvalidNumber,
        "20100" => StandardErrorCode::InvalidExpiryDate,
        "20054" | "30033" => StandardErrorCode::ExpiredCard,
        "40104" | "20087" => StandardErrorCode::IncorrectCvc,
        "40108" => StandardErrorCode::IncorrectZip,
        "40111" => StandardErrorCode::IncorrectAddress,
        "20005" | "20051" | "20057" => StandardErrorCode::CardDeclined,
        "20001" | "20002" => StandardErrorCode::CallIssuer,
        "20004" | "20007" | "30004" | "30007" => StandardErrorCode::PickupCard,
        "20012" | "20013" => StandardErrorCode::ProcessingError,
        _ => return None,
    })
}

fn error_type_to_error(code: &str) -> Option<StandardErrorCode> {
    Some(match code {
        "card_number_invalid" => StandardErrorCode::InvalidNumber,
        "card_expiry_month_invalid" | "card_expiry_year_invalid" => {
            StandardErrorCode::InvalidExpiryDate
        }
        "card_expired" => StandardErrorCode::ExpiredCard,
        "cvv_invalid" => StandardErrorCode::InvalidCvc,
        _ => return None,
    })
}

fn malformed(raw: &RawResponse, error: serde_json::Error) -> GatewayError {
    tracing::warn!(gateway = "checkout_v2", status = raw.status, "unreadable reply: {error}");
    GatewayError::MalformedResponse(format!(
        "Invalid response received from the Checkout.com API (HTTP {}): {}",
        raw.status, raw.body
    ))
}

impl Gateway for CheckoutV2Gateway {
    fn info(&self) -> &GatewayInfo {
        &self.info
    }

    fn purchase<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(self.payment(Action::Purchase, money, source, options))
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(self.payment(Action::Authorize, money, source, options))
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(self.follow_up(Action::Capture, Some(money), authorization, options))
    }

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(self.follow_up(Action::Refund, Some(money), authorization, options))
    }

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(self.follow_up(Action::Void, None, authorization, options))
    }

    /// Zero-amount authorization; Checkout.com treats it as a card check.
    fn verify<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let source = PaymentSource::Card(card.clone());
            self.payment(Action::Authorize, MoneyAmount::new(0), &source, options)
                .await
        })
    }

    fn supports_scrubbing(&self) -> bool {
        true
    }

    fn scrub(&self, transcript: &str) -> String {
        apply_filters(transcript, &FILTERS)
    }
}
