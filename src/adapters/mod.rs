pub mod authorize_net;
pub mod bogus;
pub mod checkout_v2;
pub mod nmi;
pub mod realex;
pub mod stripe;

use {
    crate::{
        domain::{
            error::GatewayError,
            gateway::{Credentials, Gateway},
        },
        infra::http_client::Transport,
    },
    derive_more::Display,
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::{str::FromStr, sync::Arc},
};

/// A transcript pattern and what to replace its matches with.
pub(crate) type Filter = (Regex, &'static str);

pub(crate) fn apply_filters(transcript: &str, filters: &[Filter]) -> String {
    filters
        .iter()
        .fold(transcript.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    #[display("bogus")]
    Bogus,
    #[display("nmi")]
    Nmi,
    #[display("authorize_net")]
    AuthorizeNet,
    #[display("stripe")]
    Stripe,
    #[display("checkout_v2")]
    CheckoutV2,
    #[display("realex")]
    Realex,
}

impl GatewayKind {
    pub const ALL: [GatewayKind; 6] = [
        Self::Bogus,
        Self::Nmi,
        Self::AuthorizeNet,
        Self::Stripe,
        Self::CheckoutV2,
        Self::Realex,
    ];
}

impl FromStr for GatewayKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == normalized)
            .ok_or_else(|| GatewayError::UnknownGateway(s.to_string()))
    }
}

/// Builds the adapter for `kind`, validating its credentials.
pub fn build_gateway(
    kind: GatewayKind,
    credentials: &Credentials,
    transport: Arc<dyn Transport>,
) -> Result<Arc<dyn Gateway>, GatewayError> {
    let gateway: Arc<dyn Gateway> = match kind {
        GatewayKind::Bogus => Arc::new(bogus::BogusGateway::new()),
        GatewayKind::Nmi => Arc::new(nmi::NmiGateway::new(credentials, transport)?),
        GatewayKind::AuthorizeNet => {
            Arc::new(authorize_net::AuthorizeNetGateway::new(credentials, transport)?)
        }
        GatewayKind::Stripe => Arc::new(stripe::StripeGateway::new(credentials, transport)?),
        GatewayKind::CheckoutV2 => {
            Arc::new(checkout_v2::CheckoutV2Gateway::new(credentials, transport)?)
        }
        GatewayKind::Realex => Arc::new(realex::RealexGateway::new(credentials, transport)?),
    };
    tracing::info!(gateway = %kind, test = gateway.info().test, "gateway configured");
    Ok(gateway)
}
