use {
    super::{
        card::{CreditCard, PaymentOptions, PaymentSource},
        error::GatewayError,
        money::{Currency, MoneyAmount, MoneyFormat, format_amount, localized_amount},
        multi_response::{MultiResponse, UseResponse},
        response::Response,
    },
    std::{collections::BTreeMap, fmt, future::Future, pin::Pin},
};

pub type GatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, GatewayError>> + Send + 'a>>;

/// Static description of a processor plus the amount conventions it uses.
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub homepage: &'static str,
    pub supported_countries: &'static [&'static str],
    pub supported_cardtypes: &'static [&'static str],
    pub default_currency: Currency,
    pub money_format: MoneyFormat,
    /// Replaces the global zero-decimal table when the processor disagrees.
    pub currencies_without_fractions: Option<&'static [&'static str]>,
    pub test: bool,
}

impl GatewayInfo {
    pub fn amount(&self, money: MoneyAmount) -> String {
        format_amount(money, self.money_format)
    }

    pub fn localized_amount(&self, money: MoneyAmount, currency: &Currency) -> String {
        localized_amount(
            money,
            currency,
            self.money_format,
            self.currencies_without_fractions,
        )
    }

    pub fn currency_for(&self, options: &PaymentOptions) -> Currency {
        options
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone())
    }
}

/// Merchant credentials keyed by name (`login`, `password`, `secret_key`, ...).
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
    test: bool,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn test_mode(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn is_test(&self) -> bool {
        self.test
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Fails on the first key that is absent or blank.
    pub fn require(&self, keys: &[&str]) -> Result<(), GatewayError> {
        match keys.iter().find(|k| self.get(k).is_none()) {
            Some(missing) => Err(GatewayError::MissingCredential((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Like `get`, for keys already checked by `require`.
    pub fn fetch(&self, key: &str) -> Result<String, GatewayError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::MissingCredential(key.to_string()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("test", &self.test)
            .finish()
    }
}

/// The operations every processor adapter translates.
pub trait Gateway: Send + Sync {
    fn info(&self) -> &GatewayInfo;

    fn purchase<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a>;

    fn authorize<'a>(
        &'a self,
        money: MoneyAmount,
        source: &'a PaymentSource,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a>;

    fn capture<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a>;

    fn refund<'a>(
        &'a self,
        money: MoneyAmount,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a>;

    fn void<'a>(
        &'a self,
        authorization: &'a str,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a>;

    fn store<'a>(
        &'a self,
        _card: &'a CreditCard,
        _options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        let name = self.info().name;
        Box::pin(async move { Err(GatewayError::not_supported(name, "store")) })
    }

    /// Authorizes a nominal amount and voids it straight away. The
    /// authorization is the reported result; the void outcome is kept as a
    /// step only.
    fn verify<'a>(
        &'a self,
        card: &'a CreditCard,
        options: &'a PaymentOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let source = PaymentSource::Card(card.clone());
            let mut multi = MultiResponse::new(UseResponse::First);
            multi
                .process(|| self.authorize(MoneyAmount::new(100), &source, options))
                .await?;

            let authorization = multi.authorization().unwrap_or_default().to_string();
            multi
                .process_ignoring_result(|| self.void(&authorization, options))
                .await?;
            Ok(multi.into_response())
        })
    }

    fn supports_scrubbing(&self) -> bool {
        false
    }

    fn scrub(&self, transcript: &str) -> String {
        transcript.to_string()
    }
}
