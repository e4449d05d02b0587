use {
    super::{Filter, apply_filters},
    crate::{
        domain::{
            card::{CreditCard, ExpiryFormat, PaymentOptions, PaymentSource},
            error::GatewayError,
            gateway::{Credentials, Gateway, GatewayFuture, GatewayInfo},
            money::{Currency, MoneyAmount, MoneyFormat},
            response::{AvsResult, CvvResult, Response, StandardErrorCode},
        },
        infra::http_client::Transport,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, sync::Arc},
};

pub const TEST_URL: &str = "https://apitest.authorize.net/xml/v1/request.api";
pub const LIVE_URL: &str = "https://api2.authorize.net/xml/v1/request.api";

const XMLNS: &str = "AnetApi/xml/v1/schema/AnetApiSchema.xsd";
const APPROVED: &str = "1";
const FRAUD_REVIEW: &str = "4";

static FILTERS: Lazy<Vec<Filter>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(<cardNumber>).+?(</cardNumber>)").expect("valid"),
            "${1}[FILTERED]${2}",
        ),
        (
            Regex::new(r"(<cardCode>).+?(</cardCode>)").expect("valid"),
            "${1}[FILTERED]${2}",
        ),
        (
            Regex::new(r"(<transactionKey>).+?(</transactionKey>)").expect("valid"),
            "${1}[FILTERED]${2}",
        ),
    ]
});

// ── Request documents ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateTransactionRequest {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "merchantAuthentication")]
    merchant_authentication: MerchantAuthentication,
    #[serde(rename = "refId", skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
    #[serde(rename = "transactionRequest")]
    transaction_request: TransactionRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MerchantAuthentication {
    name: String,
    transaction_key: String,
}

// Element order follows the processor's XSD sequence.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest {
    transaction_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_trans_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bill_to: Option<BillTo>,
    #[serde(rename = "customerIP", skip_serializing_if = "Option::is_none")]
    customer_ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payment {
    credit_card: CardElement,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardElement {
    card_number: String,
    expiration_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct Customer {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillTo {
    first_name: String,
    last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
}

// ── Response documents ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionResponse {
    #[serde(default)]
    ref_id: Option<String>,
    messages: ResultMessages,
    #[serde(default)]
    transaction_response: Option<TransactionResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultMessages {
    result_code: String,
    #[serde(default)]
    message: Vec<ResultMessage>,
}

#[derive(Debug, Deserialize)]
struct ResultMessage {
    code: String,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    #[serde(default)]
    response_code: Option<String>,
    #[serde(default)]
    auth_code: Option<String>,
    #[serde(default)]
    avs_result_code: Option<String>,
    #[serde(default)]
    cvv_result_code: Option<String>,
    #[serde(default)]
    trans_id: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    messages: Option<TransactionMessages>,
    #[serde(default)]
    errors: Option<TransactionErrors>,
}

#[derive(Debug, Default, Deserialize)]
struct TransactionMessages {
    #[serde(default)]
    message: Vec<TransactionMessage>,
}

#[derive(Debug, Deserialize)]
struct TransactionMessage {
    code: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct TransactionErrors {
    #[serde(default)]
    error: Vec<TransactionErrorItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionErrorItem {
    error_code: String,
    error_text: String,
}

// ── Gateway ─────────────────────────────────────────────────────────────────

pub struct AuthorizeNetGateway {
    info: GatewayInfo,
    login: String,
    transaction_key: String,
    transport: Arc<dyn Transport>,
}

impl AuthorizeNetGateway {
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        credentials.require(&["login", "password"])?;
        Ok(Self {
            info: GatewayInfo {
                name: "authorize_net",
                display_name: "Authorize.Net",
                homepage: "http://www.authorize.net/",
                supported_countries: &["AU", "CA", "US"],
                supported_cardtypes: &[
                    "visa",
                    "master",
                    "american_express",
                    "discover",
                    "diners_club",
                    "jcb",
                    "maestro",
                ],
                default_currency: Currency::usd(),
                money_format: MoneyFormat::Dollars,
                currencies_without_fractions: None,
                test: credentials.is_test(),
            },
            login: credentials.fetch("login")?,
            transaction_key: credentials.fetch("password")?,
            transport,
        })
    }

    fn url(&self) -> &'static str {
        if self.info.test { TEST_URL } else { LIVE_URL }
    }

    fn card_element(card: &CreditCard) -> Payment {
        Payment {
            credit_card: CardElement {
                card_number: card.number.clone(),
                expiration_date: card.expiry(ExpiryFormat::YearDashMonth),
                card_code: card.verification_value.clone(),
            },
        }
    }

    fn sale_request(
        &self,
        transaction_type: &'static str,
        money: MoneyAmount,
        source: &PaymentSource,
        options: &PaymentOptions,
    ) -> Result<TransactionRequest, GatewayError> {
        let card = source.as_card().ok_or_else(|| {
            GatewayError::Validation("authorize_net charges require a credit card".into())
        })?;
        let currency = self.info.currency_for(options);
        let order = (options.order_id.is_some() || options.description.is_some()).then(|| Order {
            invoice_number: options.order_id.clone(),
            description: options.description.clone(),
        });
        let bill_to = options.billing_address.as_ref().map(|address| BillTo {
            first_name: card.first_name.clone(),
            last_name: card.last_name.clone(),
            address: address.address1.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip: address.zip.clone(),
            country: address.country.clone(),
        });

        Ok(TransactionRequest {
            transaction_type,
            amount: Some(self.info.localized_amount(money, &currency)),
            currency_code: Some(currency.to_string()),
            payment: Some(Self::card_element(card)),
            order,
            customer: options.email.clone().map(|email| Customer { email }),
            bill_to,
            customer_ip: options.ip.clone(),
            ..TransactionRequest::default()
        })
    }

    fn build_xml(
        &self,
        transaction_request: TransactionRequest,
        options: &PaymentOptions,
    ) -> Result<String, GatewayError> {
        let document = CreateTransactionRequest {
            xmlns: XMLNS,
            merchant_authentication: MerchantAuthentication {
                name: self.login.clone(),
                transaction_key: self.transaction_key.clone(),
            },
            ref_id: options.order_id.clone(),
            transaction_request,
        };
        let body = quick_xml::se::to_string_with_root("createTransactionRequest", &document)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{body}"))
    }

    async fn commit(
        &self,
        action: &'static str,
        request: TransactionRequest,
        options: &PaymentOptions,
        card_last4: Option<&str>,
    ) -> Result<Response, GatewayError> {
        let body = self.build_xml(request, options)?;
        tracing::debug!(gateway = "authorize_net", action, request = %self.scrub(&body), "posting to processor");

        let raw = self
            .transport
            .post(self.url(), body, vec![("Content-Type", "text/xml".into())])
            .await?
            .ensure_success()?;

        let response = self.parse(action, &raw.body, card_last4)?;
        tracing::info!(
            gateway = "authorize_net",
            action,
            success = response.success,
            fraud_review = response.fraud_review,
            "processor response"
        );
        Ok(response)
    }

    fn parse(
        &self,
        action: &str,
        body: &str,
        card_last4: Option<&str>,
    ) -> Result<Response, GatewayError> {
        // Authorize.Net prefixes replies with a UTF-8 byte order mark.
        let body = body.trim_start_matches('\u{feff}');
        let document: CreateTransactionResponse = quick_xml::de::from_str(body)?;
        let transaction = document.transaction_response.unwrap_or_default();
        let response_code = non_empty(transaction.response_code.as_deref());

        let mut params = BTreeMap::new();
        params.insert("result_code".to_string(), document.messages.result_code.clone());
        let fields = [
            ("ref_id", document.ref_id.as_deref()),
            ("response_code", response_code),
            ("authorization_code", non_empty(transaction.auth_code.as_deref())),
            ("avs_result_code", non_empty(transaction.avs_result_code.as_deref())),
            ("cvv_result_code", non_empty(transaction.cvv_result_code.as_deref())),
            ("transaction_id", non_empty(transaction.trans_id.as_deref())),
            ("account_number", non_empty(transaction.account_number.as_deref())),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                params.insert(key.to_string(), value.to_string());
            }
        }

        let success = response_code == Some(APPROVED);
        let fraud_review = response_code == Some(FRAUD_REVIEW);

        let first_error = transaction.errors.as_ref().and_then(|e| e.error.first());
        let message = transaction
            .messages
            .as_ref()
            .and_then(|m| m.message.first())
            .map(|m| m.description.clone())
            .or_else(|| first_error.map(|e| e.error_text.clone()))
            .or_else(|| document.messages.message.first().map(|m| m.text.clone()))
            .unwrap_or_default();
        if let Some(code) = transaction
            .messages
            .as_ref()
            .and_then(|m| m.message.first())
            .map(|m| m.code.clone())
            .or_else(|| document.messages.message.first().map(|m| m.code.clone()))
        {
            params.insert("message_code".to_string(), code);
        }

        let error_code = if success {
            None
        } else {
            Some(
                first_error
                    .map(|e| error_code_from(&e.error_code))
                    .unwrap_or(StandardErrorCode::ProcessingError),
            )
        };

        let authorization = non_empty(transaction.trans_id.as_deref()).map(|id| {
            let last4 = card_last4
                .map(str::to_string)
                .or_else(|| {
                    transaction
                        .account_number
                        .as_deref()
                        .map(|n| n.trim_start_matches('X').to_string())
                })
                .unwrap_or_default();
            format!("{id}#{last4}#{action}")
        });

        Ok(Response::new(success, message)
            .with_authorization(authorization)
            .with_avs(AvsResult::new(non_empty(transaction.avs_result_code.as_deref())))
            .with_cvv(CvvResult::new(non_empty(transaction.cvv_result_code.as_deref())))
            .with_error_code(error_code)
            .with_fraud_review(fraud_review)
            .with_test(self.info.test)
            .with_params(params))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn error_code_from(code: &str) -> StandardErrorCode {
    match code {
        "2" | "3" | "4" => StandardErrorCode::CardDeclined,
        "5" | "11" => StandardErrorCode::ProcessingError,
        "6" | "37" => StandardErrorCode::InvalidNumber,
        "7" => StandardErrorCode::InvalidExpiryDate,
        "8" => StandardErrorCode::ExpiredCard,
        "13" => StandardErrorCode::ConfigError,
        "27" => StandardErrorCode::IncorrectAddress,
        "44" | "45" => StandardErrorCode::IncorrectCvc,
        "78" => StandardErrorCode::InvalidCvc,
        "250" | "251" => StandardErrorCode::PickupCard,
        _ => StandardErrorCode::ProcessingError,
    }
}

/// Splits `transId#last4#action` back into its parts.
fn split_authorization(authorization: &str) -> (&str, &str) {
    let mut parts = authorization.split('#');
    let transaction_id = parts.next().unwrap_or_default();
    let last4 = parts.next().unwrap_or_default();
    (transaction_id, last4)
}

impl Gateway for AuthorizeNetGateway {
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
            let request = self.sale_request("authCaptureTransaction", money, source, options)?;
            let last4 = source.as_card().map(CreditCard::last_digits);
            self.commit("purchase", request, options, last4).await
        })
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let request = self.sale_request("authOnlyTransaction", money, source, options)?;
            let last4 = source.as_card().map(CreditCard::last_digits);
            self.commit("authorize", request, options, last4).await
        })
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let (transaction_id, last4) = split_authorization(authorization);
            let currency = self.info.currency_for(options);
            let request = TransactionRequest {
                transaction_type: "priorAuthCaptureTransaction",
                amount: Some(self.info.localized_amount(money, &currency)),
                ref_trans_id: Some(transaction_id.to_string()),
                ..TransactionRequest::default()
            };
            self.commit("capture", request, options, Some(last4).filter(|s| !s.is_empty())).await
        })
    }

    /// Authorize.Net wants the last four digits of the original card on a
    /// refund, which the authorization carries.
    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let (transaction_id, last4) = split_authorization(authorization);
            if last4.is_empty() {
                return Err(GatewayError::Validation(
                    "authorization is missing the card's last four digits".into(),
                ));
            }
            let currency = self.info.currency_for(options);
            let request = TransactionRequest {
                transaction_type: "refundTransaction",
                amount: Some(self.info.localized_amount(money, &currency)),
                payment: Some(Payment {
                    credit_card: CardElement {
                        card_number: last4.to_string(),
                        expiration_date: "XXXX".into(),
                        card_code: None,
                    },
                }),
                ref_trans_id: Some(transaction_id.to_string()),
                ..TransactionRequest::default()
            };
            self.commit("refund", request, options, Some(last4)).await
        })
    }

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let (transaction_id, last4) = split_authorization(authorization);
            let request = TransactionRequest {
                transaction_type: "voidTransaction",
                ref_trans_id: Some(transaction_id.to_string()),
                ..TransactionRequest::default()
            };
            self.commit("void", request, options, Some(last4).filter(|s| !s.is_empty())).await
        })
    }

    fn supports_scrubbing(&self) -> bool {
        true
    }

    fn scrub(&self, transcript: &str) -> String {
        apply_filters(transcript, &FILTERS)
    }
}
