use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("missing required credential: {0}")]
    MissingCredential(String),

    #[error("{gateway} does not support {action}")]
    NotSupported {
        gateway: &'static str,
        action: &'static str,
    },

    #[error("unknown gateway: {0}")]
    UnknownGateway(String),

    #[error("connection: {0}")]
    Connection(String),

    #[error("processor returned HTTP {status}")]
    ResponseCode { status: u16, body: String },

    #[error("malformed processor response: {0}")]
    MalformedResponse(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("form decoding: {0}")]
    FormDecode(#[from] serde_urlencoded::de::Error),

    #[error("form encoding: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// Raised by the bogus gateway for its "error" card numbers.
    #[error("{0}")]
    Bogus(String),
}

impl GatewayError {
    pub fn not_supported(gateway: &'static str, action: &'static str) -> Self {
        Self::NotSupported { gateway, action }
    }
}
