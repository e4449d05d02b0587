use {
    crate::domain::error::GatewayError,
    std::{future::Future, pin::Pin, time::Duration},
};

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, GatewayError>> + Send + 'a>>;

/// Status and body of a processor reply. Non-2xx statuses are data here,
/// not errors: many processors put the decline reason in a 4xx body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn ensure_success(self) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GatewayError::ResponseCode {
                status: self.status,
                body: self.body,
            })
        }
    }
}

pub type Headers = Vec<(&'static str, String)>;

/// Outbound HTTP used by every adapter.
pub trait Transport: Send + Sync {
    fn post<'a>(&'a self, url: &'a str, body: String, headers: Headers) -> TransportFuture<'a>;

    fn get<'a>(&'a self, url: &'a str, headers: Headers) -> TransportFuture<'a>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("merchant_gateways/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Connection(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<RawResponse, GatewayError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(url, error = %e, "processor request failed");
            GatewayError::Connection(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Connection(format!("reading response body: {e}")))?;
        tracing::debug!(url, status, bytes = body.len(), "processor replied");
        Ok(RawResponse { status, body })
    }
}

impl Transport for ReqwestTransport {
    fn post<'a>(&'a self, url: &'a str, body: String, headers: Headers) -> TransportFuture<'a> {
        Box::pin(async move {
            let mut request = self.client.post(url).body(body);
            for (name, value) in headers {
                request = request.header(name, value);
            }
            self.send(request, url).await
        })
    }

    fn get<'a>(&'a self, url: &'a str, headers: Headers) -> TransportFuture<'a> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name, value);
            }
            self.send(request, url).await
        })
    }
}
