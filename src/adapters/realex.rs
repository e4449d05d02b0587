use {
    super::{Filter, apply_filters},
    crate::{
        domain::{
            card::{CardBrand, CreditCard, ExpiryFormat, PaymentOptions, PaymentSource},
            error::GatewayError,
            gateway::{Credentials, Gateway, GatewayFuture, GatewayInfo},
            money::{Currency, MoneyAmount, MoneyFormat},
            response::{AvsResult, CvvResult, Response, StandardErrorCode},
        },
        infra::http_client::Transport,
    },
    chrono::{DateTime, Utc},
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    sha1::{Digest, Sha1},
    std::{collections::BTreeMap, sync::Arc},
    uuid::Uuid,
};

pub const LIVE_URL: &str = "https://epage.payandshop.com/epage-remote.cgi";

const SUCCESS: &str = "Successful";
const DECLINED: &str = "Declined";
const BANK_ERROR: &str = "Gateway is in maintenance. Please try again later.";
const ERROR: &str = "Request was not processed";
const CLIENT_DEACTIVATED: &str = "Account deactivated";

static FILTERS: Lazy<Vec<Filter>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(<number>)\d+(</number>)").expect("valid"),
            "${1}[FILTERED]${2}",
        ),
        (
            Regex::new(r"(<refundhash>).+?(</refundhash>)").expect("valid"),
            "${1}[FILTERED]${2}",
        ),
    ]
});

static ORDER_ID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\-_]").expect("valid"));

/// Source of request timestamps; swapped out in tests for stable hashes.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Default, Serialize)]
struct RealexRequest {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "@type")]
    kind: &'static str,
    merchantid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    orderid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pasref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<AmountElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<CardElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    autosettle: Option<Autosettle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refundhash: Option<String>,
    sha1hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<Comments>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tssinfo: Option<TssInfo>,
}

#[derive(Debug, Serialize)]
struct AmountElement {
    #[serde(rename = "@currency")]
    currency: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize)]
struct CardElement {
    number: String,
    expdate: String,
    chname: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cvn: Option<Cvn>,
}

#[derive(Debug, Serialize)]
struct Cvn {
    number: String,
    presind: u8,
}

#[derive(Debug, Serialize)]
struct Autosettle {
    #[serde(rename = "@flag")]
    flag: u8,
}

#[derive(Debug, Serialize)]
struct Comments {
    comment: Comment,
}

#[derive(Debug, Serialize)]
struct Comment {
    #[serde(rename = "@id")]
    id: u8,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Serialize)]
struct TssInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    custipaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<TssAddress>,
}

#[derive(Debug, Serialize)]
struct TssAddress {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RealexReply {
    result: Option<String>,
    message: Option<String>,
    orderid: Option<String>,
    pasref: Option<String>,
    authcode: Option<String>,
    cvnresult: Option<String>,
    avspostcoderesponse: Option<String>,
    avsaddressresponse: Option<String>,
    batchid: Option<String>,
    timetaken: Option<String>,
}

/// `order_id;pasref;authcode` as carried between calls.
struct Reference<'a> {
    order_id: &'a str,
    pasref: &'a str,
    authcode: &'a str,
}

impl<'a> Reference<'a> {
    fn parse(authorization: &'a str) -> Result<Self, GatewayError> {
        let mut parts = authorization.split(';');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(order_id), Some(pasref), Some(authcode)) if !order_id.is_empty() => Ok(Self {
                order_id,
                pasref,
                authcode,
            }),
            _ => Err(GatewayError::Validation(format!(
                "realex authorization must be order_id;pasref;authcode, got: {authorization}"
            ))),
        }
    }
}

pub struct RealexGateway {
    info: GatewayInfo,
    merchant_id: String,
    secret: String,
    account: Option<String>,
    rebate_secret: Option<String>,
    clock: Clock,
    transport: Arc<dyn Transport>,
}

impl RealexGateway {
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        credentials.require(&["login", "password"])?;
        Ok(Self {
            info: GatewayInfo {
                name: "realex",
                display_name: "Realex",
                homepage: "http://www.realexpayments.com/",
                supported_countries: &["IE", "GB", "FR", "BE", "NL", "LU", "IT", "US", "CA", "ES"],
                supported_cardtypes: &["visa", "master", "american_express", "diners_club"],
                default_currency: Currency::new("EUR")?,
                money_format: MoneyFormat::Cents,
                currencies_without_fractions: None,
                test: credentials.is_test(),
            },
            merchant_id: credentials.fetch("login")?,
            secret: credentials.fetch("password")?,
            account: credentials.get("account").map(str::to_string),
            rebate_secret: credentials.get("rebate_secret").map(str::to_string),
            clock: Arc::new(Utc::now),
            transport,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn timestamp(&self) -> String {
        (self.clock)().format("%Y%m%d%H%M%S").to_string()
    }

    /// `sha1(sha1(timestamp.merchantid.orderid.amount.currency.cardnumber).secret)`
    fn signature(&self, fields: [&str; 5]) -> String {
        let [timestamp, order_id, amount, currency, card_number] = fields;
        let inner = sha1_hex(&format!(
            "{timestamp}.{}.{order_id}.{amount}.{currency}.{card_number}",
            self.merchant_id
        ));
        sha1_hex(&format!("{inner}.{}", self.secret))
    }

    fn base_request(&self, kind: &'static str, order_id: String) -> RealexRequest {
        RealexRequest {
            timestamp: self.timestamp(),
            kind,
            merchantid: self.merchant_id.clone(),
            account: self.account.clone(),
            orderid: order_id,
            ..Default::default()
        }
    }

    fn card_element(card: &CreditCard) -> CardElement {
        CardElement {
            number: card.number.clone(),
            expdate: card.expiry(ExpiryFormat::MonthYear2),
            chname: card.name(),
            kind: card_type(card.brand()),
            cvn: card.verification_value.clone().map(|number| Cvn {
                number,
                presind: 1,
            }),
        }
    }

    fn transaction_request(
        &self,
        kind: &'static str,
        money: Option<MoneyAmount>,
        card: &CreditCard,
        options: &PaymentOptions,
        autosettle: bool,
    ) -> RealexRequest {
        let order_id = order_id_for(options);
        let mut request = self.base_request(kind, order_id);
        let (amount, currency) = match money {
            Some(money) => {
                let currency = self.info.currency_for(options);
                let value = self.info.localized_amount(money, &currency);
                (value, currency.to_string())
            }
            None => (String::new(), String::new()),
        };
        request.sha1hash = self.signature([
            &request.timestamp,
            &request.orderid,
            &amount,
            &currency,
            &card.number,
        ]);
        if money.is_some() {
            request.amount = Some(AmountElement {
                currency,
                value: amount,
            });
            request.autosettle = Some(Autosettle {
                flag: u8::from(autosettle),
            });
        }
        request.card = Some(Self::card_element(card));
        request.comments = options.description.clone().map(|text| Comments {
            comment: Comment { id: 1, text },
        });
        request.tssinfo = tss_info(options);
        request
    }

    fn reference_request(
        &self,
        kind: &'static str,
        money: Option<MoneyAmount>,
        reference: &Reference<'_>,
        options: &PaymentOptions,
    ) -> RealexRequest {
        let mut request = self.base_request(kind, reference.order_id.to_string());
        request.pasref = Some(reference.pasref.to_string());
        request.authcode = Some(reference.authcode.to_string());
        let (amount, currency) = match money {
            Some(money) => {
                let currency = self.info.currency_for(options);
                (self.info.localized_amount(money, &currency), currency.to_string())
            }
            None => (String::new(), String::new()),
        };
        request.sha1hash =
            self.signature([&request.timestamp, &request.orderid, &amount, &currency, ""]);
        if money.is_some() {
            request.amount = Some(AmountElement {
                currency,
                value: amount,
            });
        }
        request.comments = options.description.clone().map(|text| Comments {
            comment: Comment { id: 1, text },
        });
        request
    }

    fn card_for<'s>(&self, source: &'s PaymentSource) -> Result<&'s CreditCard, GatewayError> {
        source.as_card().ok_or_else(|| {
            GatewayError::Validation("realex requires card details, not a stored token".into())
        })
    }

    async fn commit(&self, request: RealexRequest) -> Result<Response, GatewayError> {
        let action = request.kind;
        let order_id = request.orderid.clone();
        let body = quick_xml::se::to_string_with_root("request", &request)?;
        tracing::debug!(gateway = "realex", action, request = %self.scrub(&body), "posting to processor");

        let raw = self
            .transport
            .post(LIVE_URL, body, vec![("Content-Type", "text/xml".into())])
            .await?
            .ensure_success()?;

        let response = self.parse(&raw.body, &order_id)?;
        tracing::info!(
            gateway = "realex",
            action,
            success = response.success,
            result = response.param("result").unwrap_or(""),
            "processor response"
        );
        Ok(response)
    }

    fn parse(&self, body: &str, order_id: &str) -> Result<Response, GatewayError> {
        let reply: RealexReply = quick_xml::de::from_str(body)?;
        let result = reply.result.as_deref().unwrap_or_default();
        let success = result == "00";

        let mut params = BTreeMap::new();
        let fields = [
            ("result", reply.result.as_deref()),
            ("message", reply.message.as_deref()),
            ("orderid", reply.orderid.as_deref()),
            ("pasref", reply.pasref.as_deref()),
            ("authcode", reply.authcode.as_deref()),
            ("cvnresult", reply.cvnresult.as_deref()),
            ("avspostcoderesponse", reply.avspostcoderesponse.as_deref()),
            ("avsaddressresponse", reply.avsaddressresponse.as_deref()),
            ("batchid", reply.batchid.as_deref()),
            ("timetaken", reply.timetaken.as_deref()),
        ];
        for (key, value) in fields {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                params.insert(key.to_string(), value.to_string());
            }
        }

        let authorization = success.then(|| {
            format!(
                "{};{};{}",
                reply.orderid.as_deref().unwrap_or(order_id).trim(),
                reply.pasref.as_deref().unwrap_or_default().trim(),
                reply.authcode.as_deref().unwrap_or_default().trim(),
            )
        });

        let avs = AvsResult::from_matches(
            avs_match(reply.avsaddressresponse.as_deref()),
            avs_match(reply.avspostcoderesponse.as_deref()),
        );

        Ok(Response::new(success, message_for(result, reply.message.as_deref()))
            .with_authorization(authorization)
            .with_avs(avs)
            .with_cvv(CvvResult::new(reply.cvnresult.as_deref()))
            .with_error_code((!success).then(|| error_code_from(result)))
            .with_test(self.info.test)
            .with_params(params))
    }
}

fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

fn order_id_for(options: &PaymentOptions) -> String {
    match &options.order_id {
        Some(id) => ORDER_ID_CHARS.replace_all(id, "").into_owned(),
        None => Uuid::new_v4().simple().to_string(),
    }
}

fn card_type(brand: Option<CardBrand>) -> &'static str {
    match brand {
        Some(CardBrand::Master) | Some(CardBrand::Maestro) => "MC",
        Some(CardBrand::AmericanExpress) => "AMEX",
        Some(CardBrand::DinersClub) => "DINERS",
        _ => "VISA",
    }
}

fn tss_info(options: &PaymentOptions) -> Option<TssInfo> {
    let address = options.billing_address.as_ref().map(|a| TssAddress {
        kind: "billing",
        code: a.zip.clone(),
        country: a.country.clone(),
    });
    if options.ip.is_none() && address.is_none() {
        return None;
    }
    Some(TssInfo {
        custipaddress: options.ip.clone(),
        address,
    })
}

fn avs_match(code: Option<&str>) -> Option<&'static str> {
    match code.map(str::trim) {
        Some("M") => Some("Y"),
        Some("N") => Some("N"),
        Some("I") | Some("U") | Some("P") => Some("X"),
        _ => None,
    }
}

fn message_for(result: &str, message: Option<&str>) -> String {
    let message = message.map(str::trim).unwrap_or_default();
    match result {
        "00" => SUCCESS.to_string(),
        "101" => message.to_string(),
        "102" | "103" => DECLINED.to_string(),
        "600" | "601" | "603" => ERROR.to_string(),
        "666" => CLIENT_DEACTIVATED.to_string(),
        r if r.starts_with('2') || r.starts_with('3') => BANK_ERROR.to_string(),
        r if r.starts_with('5') => message.to_string(),
        _ => DECLINED.to_string(),
    }
}

fn error_code_from(result: &str) -> StandardErrorCode {
    match result {
        "101" => StandardErrorCode::CardDeclined,
        "102" => StandardErrorCode::CallIssuer,
        "103" => StandardErrorCode::PickupCard,
        "508" | "509" => StandardErrorCode::InvalidNumber,
        "666" => StandardErrorCode::ConfigError,
        _ => StandardErrorCode::ProcessingError,
    }
}

impl Gateway for RealexGateway {
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
            let card = self.card_for(source)?;
            let request = self.transaction_request("auth", Some(money), card, options, true);
            self.commit(request).await
        })
    }

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let card = self.card_for(source)?;
            let request = self.transaction_request("auth", Some(money), card, options, false);
            self.commit(request).await
        })
    }

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let reference = Reference::parse(authorization)?;
            let request = self.reference_request("settle", Some(money), &reference, options);
            self.commit(request).await
        })
    }

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let reference = Reference::parse(authorization)?;
            let mut request = self.reference_request("rebate", Some(money), &reference, options);
            request.refundhash = self.rebate_secret.as_deref().map(sha1_hex);
            request.autosettle = Some(Autosettle { flag: 1 });
            self.commit(request).await
        })
    }

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let reference = Reference::parse(authorization)?;
            let request = self.reference_request("void", None, &reference, options);
            self.commit(request).await
        })
    }

    /// Open-to-buy check: confirms the card is good without reserving funds.
    fn verify<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let request = self.transaction_request("otb", None, card, options, false);
            self.commit(request).await
        })
    }

    fn supports_scrubbing(&self) -> bool {
        true
    }

    fn scrub(&self, transcript: &str) -> String {
        apply_filters(transcript, &FILTERS)
    }
}
