use {
    derive_more::Display,
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// Uniform error vocabulary adapters map processor decline codes onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardErrorCode {
    #[display("incorrect_number")]
    IncorrectNumber,
    #[display("invalid_number")]
    InvalidNumber,
    #[display("invalid_expiry_date")]
    InvalidExpiryDate,
    #[display("invalid_cvc")]
    InvalidCvc,
    #[display("expired_card")]
    ExpiredCard,
    #[display("incorrect_cvc")]
    IncorrectCvc,
    #[display("incorrect_zip")]
    IncorrectZip,
    #[display("incorrect_address")]
    IncorrectAddress,
    #[display("incorrect_pin")]
    IncorrectPin,
    #[display("card_declined")]
    CardDeclined,
    #[display("processing_error")]
    ProcessingError,
    #[display("call_issuer")]
    CallIssuer,
    #[display("pickup_card")]
    PickupCard,
    #[display("config_error")]
    ConfigError,
    #[display("test_mode_live_card")]
    TestModeLiveCard,
    #[display("unsupported_feature")]
    UnsupportedFeature,
}

/// Address verification outcome, decoded from the processor's single-letter code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsResult {
    pub code: Option<String>,
    pub message: Option<String>,
    pub street_match: Option<String>,
    pub postal_match: Option<String>,
}

fn avs_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "A" => "Street address matches, but postal code does not match.",
        "B" => "Street address matches, but postal code not verified.",
        "C" => "Street address and postal code do not match.",
        "D" => "Street address and postal code match.",
        "E" => "AVS data is invalid or AVS is not allowed for this card type.",
        "F" => "Card member's name does not match, but billing postal code matches.",
        "G" => "Non-U.S. issuing bank does not support AVS.",
        "H" => "Card member's name does not match. Street address and postal code match.",
        "I" => "Address not verified.",
        "J" => "Card member's name, billing address, and postal code match.",
        "K" => "Card member's name matches but billing address and billing postal code do not match.",
        "L" => "Card member's name and billing postal code match, but billing address does not match.",
        "M" => "Street address and postal code match.",
        "N" => "Street address and postal code do not match.",
        "O" => "Card member's name and billing address match, but billing postal code does not match.",
        "P" => "Postal code matches, but street address not verified.",
        "Q" => "Card member's name, billing address, and postal code match.",
        "R" => "System unavailable.",
        "S" => "U.S.-issuing bank does not support AVS.",
        "T" => "Card member's name does not match, but street address matches.",
        "U" => "Address information unavailable.",
        "V" => "Card member's name, billing address, and billing postal code match.",
        "W" => "Street address does not match, but 9-digit postal code matches.",
        "X" => "Street address and 9-digit postal code match.",
        "Y" => "Street address and 5-digit postal code match.",
        "Z" => "Street address does not match, but 5-digit postal code matches.",
        _ => return None,
    })
}

fn avs_street_match(code: &str) -> Option<&'static str> {
    match code {
        "A" | "B" | "D" | "H" | "J" | "M" | "O" | "Q" | "T" | "V" | "X" | "Y" => Some("Y"),
        "C" | "K" | "L" | "N" | "P" | "W" | "Z" => Some("N"),
        "G" | "S" | "E" | "I" | "R" | "U" => Some("X"),
        _ => None,
    }
}

fn avs_postal_match(code: &str) -> Option<&'static str> {
    match code {
        "D" | "F" | "H" | "J" | "L" | "M" | "P" | "Q" | "V" | "W" | "X" | "Y" | "Z" => Some("Y"),
        "A" | "C" | "K" | "N" | "O" => Some("N"),
        "G" | "S" | "E" | "I" | "R" | "U" | "B" => Some("X"),
        _ => None,
    }
}

impl AvsResult {
    pub fn new(code: Option<&str>) -> Self {
        let code = code.map(str::trim).filter(|c| !c.is_empty()).map(str::to_uppercase);
        match code {
            Some(code) => Self {
                message: avs_message(&code).map(str::to_string),
                street_match: avs_street_match(&code).map(str::to_string),
                postal_match: avs_postal_match(&code).map(str::to_string),
                code: Some(code),
            },
            None => Self::default(),
        }
    }

    /// For processors that report street and postal checks separately
    /// rather than as one letter.
    pub fn from_matches(street_match: Option<&str>, postal_match: Option<&str>) -> Self {
        let code = match (street_match, postal_match) {
            (Some("Y"), Some("Y")) => Some("Y"),
            (Some("Y"), Some("N")) => Some("A"),
            (Some("N"), Some("Y")) => Some("Z"),
            (Some("N"), Some("N")) => Some("N"),
            (Some("Y"), _) => Some("B"),
            (_, Some("Y")) => Some("P"),
            (None, None) => None,
            _ => Some("I"),
        };
        let mut result = Self::new(code);
        result.street_match = street_match.map(str::to_string);
        result.postal_match = postal_match.map(str::to_string);
        result
    }
}

/// Card-verification-value outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvvResult {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl CvvResult {
    pub fn new(code: Option<&str>) -> Self {
        let code = code.map(str::trim).filter(|c| !c.is_empty()).map(str::to_uppercase);
        let message = code.as_deref().and_then(|c| {
            Some(match c {
                "D" => "CVV check flagged transaction as suspicious",
                "I" => "CVV failed data validation check",
                "M" => "CVV matches",
                "N" => "CVV does not match",
                "P" => "CVV not processed",
                "S" => "CVV should have been present",
                "U" => "CVV request unable to be processed by issuer",
                "X" => "Issuer does not participate in CVV program",
                _ => return None,
            })
        });
        Self {
            code,
            message: message.map(str::to_string),
        }
    }
}

/// What every gateway operation returns, regardless of the processor's
/// wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,
    /// Raw fields parsed from the processor reply.
    pub params: BTreeMap<String, String>,
    /// Opaque token to pass to follow-up capture/refund/void calls.
    pub authorization: Option<String>,
    pub test: bool,
    pub fraud_review: bool,
    pub error_code: Option<StandardErrorCode>,
    pub avs_result: AvsResult,
    pub cvv_result: CvvResult,
    pub emv_authorization: Option<String>,
    /// Every individual reply when this response was composed by a
    /// `MultiResponse`; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Response>,
}

impl Response {
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization.filter(|a| !a.is_empty());
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_error_code(mut self, code: Option<StandardErrorCode>) -> Self {
        self.error_code = code;
        self
    }

    pub fn with_avs(mut self, avs: AvsResult) -> Self {
        self.avs_result = avs;
        self
    }

    pub fn with_cvv(mut self, cvv: CvvResult) -> Self {
        self.cvv_result = cvv;
        self
    }

    pub fn with_fraud_review(mut self, fraud_review: bool) -> Self {
        self.fraud_review = fraud_review;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
