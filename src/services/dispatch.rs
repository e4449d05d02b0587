use {
    crate::domain::{
        card::{CreditCard, PaymentOptions, PaymentSource},
        error::GatewayError,
        gateway::Gateway,
        money::MoneyAmount,
        response::Response,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// One gateway operation as it arrives over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PaymentCommand {
    Purchase {
        amount: MoneyAmount,
        source: PaymentSource,
        #[serde(default)]
        options: PaymentOptions,
    },
    Authorize {
        amount: MoneyAmount,
        source: PaymentSource,
        #[serde(default)]
        options: PaymentOptions,
    },
    Capture {
        amount: MoneyAmount,
        authorization: String,
        #[serde(default)]
        options: PaymentOptions,
    },
    Refund {
        amount: MoneyAmount,
        authorization: String,
        #[serde(default)]
        options: PaymentOptions,
    },
    Void {
        authorization: String,
        #[serde(default)]
        options: PaymentOptions,
    },
    Verify {
        card: CreditCard,
        #[serde(default)]
        options: PaymentOptions,
    },
    Store {
        card: CreditCard,
        #[serde(default)]
        options: PaymentOptions,
    },
}

impl PaymentCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Purchase { .. } => "purchase",
            Self::Authorize { .. } => "authorize",
            Self::Capture { .. } => "capture",
            Self::Refund { .. } => "refund",
            Self::Void { .. } => "void",
            Self::Verify { .. } => "verify",
            Self::Store { .. } => "store",
        }
    }

    /// Rejects commands no processor could accept before anything is sent.
    pub fn validate(&self) -> Result<(), GatewayError> {
        match self {
            Self::Purchase { source, .. } | Self::Authorize { source, .. } => match source {
                PaymentSource::Card(card) => validate_card(card),
                PaymentSource::Token { token } if token.trim().is_empty() => {
                    Err(GatewayError::Validation("payment token must not be empty".into()))
                }
                PaymentSource::Token { .. } => Ok(()),
            },
            Self::Capture { authorization, .. }
            | Self::Refund { authorization, .. }
            | Self::Void { authorization, .. } => {
                if authorization.trim().is_empty() {
                    Err(GatewayError::Validation("authorization must not be empty".into()))
                } else {
                    Ok(())
                }
            }
            Self::Verify { card, .. } | Self::Store { card, .. } => validate_card(card),
        }
    }
}

fn validate_card(card: &CreditCard) -> Result<(), GatewayError> {
    if !(1..=12).contains(&card.month) {
        return Err(GatewayError::Validation(format!(
            "expiry month must be 1-12, got: {}",
            card.month
        )));
    }
    if card.number.is_empty() || !card.number.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::Validation("card number must be digits only".into()));
    }
    Ok(())
}

/// Runs `command` against `gateway` and logs the outcome.
#[tracing::instrument(
    name = "dispatch",
    skip_all,
    fields(
        gateway = gateway.info().name,
        action = command.action(),
        request_id = %Uuid::now_v7(),
    )
)]
pub async fn execute(gateway: &dyn Gateway, command: PaymentCommand) -> Result<Response, GatewayError> {
    command.validate()?;

    let result = match &command {
        PaymentCommand::Purchase {
            amount,
            source,
            options,
        } => gateway.purchase(*amount, source, options).await,
        PaymentCommand::Authorize {
            amount,
            source,
            options,
        } => gateway.authorize(*amount, source, options).await,
        PaymentCommand::Capture {
            amount,
            authorization,
            options,
        } => gateway.capture(*amount, authorization, options).await,
        PaymentCommand::Refund {
            amount,
            authorization,
            options,
        } => gateway.refund(*amount, authorization, options).await,
        PaymentCommand::Void {
            authorization,
            options,
        } => gateway.void(authorization, options).await,
        PaymentCommand::Verify { card, options } => gateway.verify(card, options).await,
        PaymentCommand::Store { card, options } => gateway.store(card, options).await,
    };

    match &result {
        Ok(response) => tracing::info!(
            success = response.success,
            message = %response.message,
            authorization = response.authorization.as_deref().unwrap_or(""),
            "gateway call finished"
        ),
        Err(err) => tracing::warn!(error = %err, "gateway call failed"),
    }
    result
}
