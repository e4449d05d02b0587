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
    std::{collections::BTreeMap, sync::Arc},
};

pub const LIVE_URL: &str = "https://secure.nmi.com/api/transact.php";

static FILTERS: Lazy<Vec<Filter>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(password=)[^&\n]*").expect("valid"), "${1}[FILTERED]"),
        (Regex::new(r"(security_key=)[^&\n]*").expect("valid"), "${1}[FILTERED]"),
        (Regex::new(r"(ccnumber=)\d+").expect("valid"), "${1}[FILTERED]"),
        (Regex::new(r"(cvv=)\d+").expect("valid"), "${1}[FILTERED]"),
    ]
});

type Params = Vec<(&'static str, String)>;

pub struct NmiGateway {
    info: GatewayInfo,
    login: String,
    password: String,
    transport: Arc<dyn Transport>,
}

impl NmiGateway {
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        credentials.require(&["login", "password"])?;
        Ok(Self {
            info: GatewayInfo {
                name: "nmi",
                display_name: "NMI",
                homepage: "http://nmi.com/",
                supported_countries: &["US"],
                supported_cardtypes: &["visa", "master", "american_express", "discover"],
                default_currency: Currency::usd(),
                money_format: MoneyFormat::Dollars,
                currencies_without_fractions: None,
                test: credentials.is_test(),
            },
            login: credentials.fetch("login")?,
            password: credentials.fetch("password")?,
            transport,
        })
    }

    fn add_invoice(&self, params: &mut Params, money: MoneyAmount, options: &PaymentOptions) {
        let currency = self.info.currency_for(options);
        params.push(("amount", self.info.localized_amount(money, &currency)));
        params.push(("currency", currency.to_string()));
        if let Some(order_id) = &options.order_id {
            params.push(("orderid", order_id.clone()));
        }
        if let Some(description) = &options.description {
            params.push(("orderdescription", description.clone()));
        }
    }

    fn add_payment_source(params: &mut Params, source: &PaymentSource) {
        match source {
            PaymentSource::Card(card) => Self::add_card(params, card),
            PaymentSource::Token { token } => params.push(("customer_vault_id", token.clone())),
        }
    }

    fn add_card(params: &mut Params, card: &CreditCard) {
        params.push(("payment", "creditcard".into()));
        params.push(("ccnumber", card.number.clone()));
        params.push(("ccexp", card.expiry(ExpiryFormat::MonthYear2)));
        if let Some(cvv) = &card.verification_value {
            params.push(("cvv", cvv.clone()));
        }
        params.push(("first_name", card.first_name.clone()));
        params.push(("last_name", card.last_name.clone()));
    }

    fn add_customer_data(params: &mut Params, options: &PaymentOptions) {
        if let Some(email) = &options.email {
            params.push(("email", email.clone()));
        }
        if let Some(ip) = &options.ip {
            params.push(("ipaddress", ip.clone()));
        }
        if let Some(address) = &options.billing_address {
            let fields = [
                ("address1", &address.address1),
                ("address2", &address.address2),
                ("city", &address.city),
                ("state", &address.state),
                ("zip", &address.zip),
                ("country", &address.country),
                ("phone", &address.phone),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    params.push((key, value.clone()));
                }
            }
        }
    }

    fn sale_params(
        &self,
        action: &'static str,
        money: MoneyAmount,
        source: &PaymentSource,
        options: &PaymentOptions,
    ) -> Params {
        let mut params: Params = vec![("type", action.into())];
        self.add_invoice(&mut params, money, options);
        Self::add_payment_source(&mut params, source);
        Self::add_customer_data(&mut params, options);
        params
    }

    fn reference_params(action: &'static str, authorization: &str) -> Params {
        let transaction_id = authorization.split('#').next().unwrap_or_default();
        vec![
            ("type", action.into()),
            ("transactionid", transaction_id.to_string()),
        ]
    }

    async fn commit(&self, action: &'static str, mut params: Params) -> Result<Response, GatewayError> {
        params.push(("username", self.login.clone()));
        params.push(("password", self.password.clone()));
        let body = serde_urlencoded::to_string(&params)?;
        tracing::debug!(gateway = "nmi", action, request = %self.scrub(&body), "posting to processor");

        let raw = self
            .transport
            .post(
                LIVE_URL,
                body,
                vec![(
                    "Content-Type",
                    "application/x-www-form-urlencoded;charset=UTF-8".into(),
                )],
            )
            .await?
            .ensure_success()?;

        let fields: BTreeMap<String, String> = serde_urlencoded::from_str(&raw.body)?;
        let response = self.parse(action, fields);
        tracing::info!(
            gateway = "nmi",
            action,
            success = response.success,
            authorization = response.authorization.as_deref().unwrap_or(""),
            "processor response"
        );
        Ok(response)
    }

    fn parse(&self, action: &str, fields: BTreeMap<String, String>) -> Response {
        let success = fields.get("response").map(String::as_str) == Some("1");
        let message = if success {
            "Succeeded".to_string()
        } else {
            fields
                .get("responsetext")
                .cloned()
                .unwrap_or_else(|| "Unknown error".to_string())
        };
        let authorization = if action == "add_customer" {
            fields.get("customer_vault_id").cloned()
        } else {
            fields
                .get("transactionid")
                .filter(|id| !id.is_empty())
                .map(|id| format!("{id}#creditcard"))
        };
        let error_code = if success {
            None
        } else {
            Some(
                fields
                    .get("response_code")
                    .map(|c| error_code_from(c))
                    .unwrap_or(StandardErrorCode::ProcessingError),
            )
        };

        Response::new(success, message)
            .with_authorization(authorization)
            .with_avs(AvsResult::new(fields.get("avsresponse").map(String::as_str)))
            .with_cvv(CvvResult::new(fields.get("cvvresponse").map(String::as_str)))
            .with_error_code(error_code)
            .with_test(self.info.test)
            .with_params(fields)
    }
}

fn error_code_from(response_code: &str) -> StandardErrorCode {
    match response_code {
        "200" | "201" | "202" | "203" | "204" => StandardErrorCode::CardDeclined,
        "220" => StandardErrorCode::IncorrectNumber,
        "221" | "222" => StandardErrorCode::InvalidNumber,
        "223" => StandardErrorCode::ExpiredCard,
        "224" => StandardErrorCode::InvalidExpiryDate,
        "225" => StandardErrorCode::InvalidCvc,
        "250" | "251" | "252" | "253" => StandardErrorCode::PickupCard,
        "260" | "261" | "262" | "263" | "264" => StandardErrorCode::CallIssuer,
        "300" => StandardErrorCode::ConfigError,
        _ => StandardErrorCode::ProcessingError,
    }
}

impl Gateway for NmiGateway {
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
            let params = self.sale_params("sale", money, source, options);
            self.commit("sale", params).await
        })
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let params = self.sale_params("auth", money, source, options);
            self.commit("auth", params).await
        })
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params = Self::reference_params("capture", authorization);
            let currency = self.info.currency_for(options);
            params.push(("amount", self.info.localized_amount(money, &currency)));
            self.commit("capture", params).await
        })
    }

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params = Self::reference_params("refund", authorization);
            let currency = self.info.currency_for(options);
            params.push(("amount", self.info.localized_amount(money, &currency)));
            self.commit("refund", params).await
        })
    }

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params = Self::reference_params("void", authorization);
            params.push(("payment", "creditcard".into()));
            self.commit("void", params).await
        })
    }

    fn store<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params: Params = vec![("customer_vault", "add_customer".into())];
            Self::add_card(&mut params, card);
            Self::add_customer_data(&mut params, options);
            self.commit("add_customer", params).await
        })
    }

    /// NMI validates a card without moving money.
    fn verify<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let mut params: Params = vec![("type", "validate".into())];
            Self::add_card(&mut params, card);
            Self::add_customer_data(&mut params, options);
            self.commit("validate", params).await
        })
    }

    fn supports_scrubbing(&self) -> bool {
        true
    }

    fn scrub(&self, transcript: &str) -> String {
        apply_filters(transcript, &FILTERS)
    }
}
