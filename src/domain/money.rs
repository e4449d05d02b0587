use {
    super::error::GatewayError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Amount in the currency's minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoneyAmount(u64);

impl MoneyAmount {
    pub const fn new(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_sub(other.0).map(MoneyAmount)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const CURRENCIES_WITHOUT_FRACTIONS: &[&str] = &[
    "BIF", "BYR", "CLP", "CVE", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX",
    "UYI", "VND", "VUV", "XAF", "XOF", "XPF",
];

const CURRENCIES_WITH_THREE_DECIMAL_PLACES: &[&str] = &["BHD", "JOD", "KWD", "OMR", "TND"];

/// ISO-4217 alphabetic code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, GatewayError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(GatewayError::Validation(format!(
                "currency must be a three-letter ISO code, got: {code}"
            )));
        }
        Ok(Self(code))
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_non_fractional(&self) -> bool {
        CURRENCIES_WITHOUT_FRACTIONS.contains(&self.as_str())
    }

    pub fn is_three_decimal(&self) -> bool {
        CURRENCIES_WITH_THREE_DECIMAL_PLACES.contains(&self.as_str())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for Currency {
    type Error = GatewayError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }
}

/// How a processor expects amounts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoneyFormat {
    /// Integer minor units: `1000`.
    Cents,
    /// Major units with two decimals: `10.00`.
    Dollars,
}

pub fn format_amount(amount: MoneyAmount, format: MoneyFormat) -> String {
    let cents = amount.cents();
    match format {
        MoneyFormat::Cents => cents.to_string(),
        MoneyFormat::Dollars => format!("{}.{:02}", cents / 100, cents % 100),
    }
}

/// Formats `amount` for `currency`, collapsing or extending the fraction for
/// currencies whose exponent is not 2. `non_fractional` lets a gateway
/// override the default zero-decimal table.
pub fn localized_amount(
    amount: MoneyAmount,
    currency: &Currency,
    format: MoneyFormat,
    non_fractional: Option<&[&str]>,
) -> String {
    let cents = amount.cents();
    let is_non_fractional = match non_fractional {
        Some(list) => list.contains(&currency.as_str()),
        None => currency.is_non_fractional(),
    };

    if is_non_fractional {
        match format {
            // round half up
            MoneyFormat::Cents => (cents / 100 + u64::from(cents % 100 >= 50)).to_string(),
            MoneyFormat::Dollars => (cents / 100).to_string(),
        }
    } else if currency.is_three_decimal() {
        match format {
            MoneyFormat::Cents => cents.to_string(),
            MoneyFormat::Dollars => format!("{}.{:03}", cents / 1000, cents % 1000),
        }
    } else {
        format_amount(amount, format)
    }
}
