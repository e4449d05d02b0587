use {
    super::{error::GatewayError, money::Currency},
    derive_more::Display,
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    #[display("visa")]
    Visa,
    #[display("master")]
    Master,
    #[display("american_express")]
    AmericanExpress,
    #[display("discover")]
    Discover,
    #[display("jcb")]
    Jcb,
    #[display("diners_club")]
    DinersClub,
    #[display("maestro")]
    Maestro,
}

// Checked in order; maestro last since its ranges overlap master.
static BRAND_PATTERNS: Lazy<Vec<(CardBrand, Regex)>> = Lazy::new(|| {
    [
        (CardBrand::Visa, r"^4\d{12}(\d{3})?(\d{3})?$"),
        (
            CardBrand::Master,
            r"^(5[1-5]\d{4}|677189|222[1-9]\d{2}|22[3-9]\d{3}|2[3-6]\d{4}|27[01]\d{3}|2720\d{2})\d{10}$",
        ),
        (CardBrand::AmericanExpress, r"^3[47]\d{13}$"),
        (
            CardBrand::Discover,
            r"^((6011|65\d{2}|64[4-9]\d)\d{12,15}|62\d{14,17})$",
        ),
        (CardBrand::Jcb, r"^35(28|29|[3-8]\d)\d{12}$"),
        (CardBrand::DinersClub, r"^3(0[0-5]|[68]\d)\d{11,16}$"),
        (
            CardBrand::Maestro,
            r"^(5018|5020|5038|5893|6304|6759|676[1-3]|6390)\d{8,15}$",
        ),
    ]
    .into_iter()
    .map(|(brand, pattern)| (brand, Regex::new(pattern).expect("valid brand pattern")))
    .collect()
});

pub fn detect_brand(number: &str) -> Option<CardBrand> {
    BRAND_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(number))
        .map(|(brand, _)| *brand)
}

/// Mod-10 check over the digits of `number`.
pub fn luhn_valid(number: &str) -> bool {
    if number.len() < 12 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryFormat {
    /// `0925`
    MonthYear2,
    /// `09/25`
    MonthSlashYear2,
    /// `2025-09`
    YearDashMonth,
    /// `092025`
    MonthYear4,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub number: String,
    pub month: u8,
    pub year: u16,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub verification_value: Option<String>,
    #[serde(default)]
    pub brand: Option<CardBrand>,
}

impl CreditCard {
    pub fn new(
        number: impl Into<String>,
        month: u8,
        year: u16,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        if !(1..=12).contains(&month) {
            return Err(GatewayError::Validation(format!(
                "expiry month must be 1-12, got: {month}"
            )));
        }
        let number: String = number.into().chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Self {
            number,
            month,
            year,
            first_name: first_name.into(),
            last_name: last_name.into(),
            verification_value: None,
            brand: None,
        })
    }

    pub fn with_verification_value(mut self, cvv: impl Into<String>) -> Self {
        self.verification_value = Some(cvv.into());
        self
    }

    pub fn with_brand(mut self, brand: CardBrand) -> Self {
        self.brand = Some(brand);
        self
    }

    pub fn brand(&self) -> Option<CardBrand> {
        self.brand.or_else(|| detect_brand(&self.number))
    }

    pub fn luhn_valid(&self) -> bool {
        luhn_valid(&self.number)
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn last_digits(&self) -> &str {
        let start = self
            .number
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.number[start..]
    }

    pub fn display_number(&self) -> String {
        format!("XXXX-XXXX-XXXX-{}", self.last_digits())
    }

    pub fn expiry(&self, format: ExpiryFormat) -> String {
        let yy = self.year % 100;
        match format {
            ExpiryFormat::MonthYear2 => format!("{:02}{:02}", self.month, yy),
            ExpiryFormat::MonthSlashYear2 => format!("{:02}/{:02}", self.month, yy),
            ExpiryFormat::YearDashMonth => format!("{:04}-{:02}", self.year, self.month),
            ExpiryFormat::MonthYear4 => format!("{:02}{:04}", self.month, self.year),
        }
    }
}

impl fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreditCard")
            .field("number", &self.display_number())
            .field("month", &self.month)
            .field("year", &self.year)
            .field("name", &self.name())
            .field(
                "verification_value",
                &self.verification_value.as_ref().map(|_| "[FILTERED]"),
            )
            .field("brand", &self.brand())
            .finish()
    }
}

/// What a purchase or authorization charges: a card, or a vault reference
/// returned by an earlier `store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentSource {
    Card(CreditCard),
    Token { token: String },
}

impl PaymentSource {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn as_card(&self) -> Option<&CreditCard> {
        match self {
            Self::Card(card) => Some(card),
            Self::Token { .. } => None,
        }
    }
}

impl From<CreditCard> for PaymentSource {
    fn from(card: CreditCard) -> Self {
        Self::Card(card)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Per-request extras. Every field is optional; adapters send what their
/// processor understands and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentOptions {
    pub order_id: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub ip: Option<String>,
    pub customer: Option<String>,
    pub currency: Option<Currency>,
    pub billing_address: Option<Address>,
    pub invoice: Option<String>,
}
