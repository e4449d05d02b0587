use {
    crate::domain::error::GatewayError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype over the domain error so axum can render it.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            GatewayError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            GatewayError::MissingCredential(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "missing_credential",
                self.0.to_string(),
            ),
            GatewayError::NotSupported { .. } => (
                StatusCode::BAD_REQUEST,
                "not_supported",
                self.0.to_string(),
            ),
            GatewayError::UnknownGateway(_) => (
                StatusCode::NOT_FOUND,
                "unknown_gateway",
                self.0.to_string(),
            ),
            GatewayError::Connection(_)
            | GatewayError::ResponseCode { .. }
            | GatewayError::MalformedResponse(_)
            | GatewayError::Xml(_)
            | GatewayError::FormDecode(_)
            | GatewayError::Bogus(_) => {
                tracing::warn!(error = %self.0, "processor failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "processor_error",
                    self.0.to_string(),
                )
            }
            GatewayError::Serialization(_) | GatewayError::FormEncode(_) => {
                tracing::error!(error = %self.0, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
