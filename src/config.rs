use {
    crate::{adapters::GatewayKind, domain::error::GatewayError, domain::gateway::Credentials},
    std::{collections::BTreeMap, env, net::SocketAddr, time::Duration},
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
    pub test_mode: bool,
    /// Credentials for every gateway named in `GATEWAYS`, in that order.
    pub gateways: Vec<(GatewayKind, Credentials)>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_vars(env::vars())
    }

    /// Builds the configuration from `(name, value)` pairs.
    ///
    /// Credentials are read from `<GATEWAY>_<KEY>` variables, so
    /// `STRIPE_LOGIN=sk_test_...` becomes the `login` credential of the
    /// stripe adapter.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let bind_addr = vars
            .get("BIND_ADDR")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| GatewayError::Validation(format!("BIND_ADDR: {e}")))?;

        let http_timeout_secs = match vars.get("HTTP_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|e| GatewayError::Validation(format!("HTTP_TIMEOUT_SECS: {e}")))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let test_mode = match vars.get("GATEWAY_TEST_MODE").map(|v| v.to_ascii_lowercase()) {
            None => true,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(v) => {
                return Err(GatewayError::Validation(format!(
                    "GATEWAY_TEST_MODE must be a boolean, got: {v}"
                )));
            }
        };

        let names = vars.get("GATEWAYS").map(String::as_str).unwrap_or("bogus");
        let mut gateways = Vec::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let kind: GatewayKind = name.parse()?;
            if gateways.iter().any(|(k, _)| *k == kind) {
                continue;
            }
            gateways.push((kind, credentials_for(kind, &vars, test_mode)));
        }

        Ok(Self {
            bind_addr,
            http_timeout: Duration::from_secs(http_timeout_secs.max(1)),
            test_mode,
            gateways,
        })
    }
}

fn credentials_for(kind: GatewayKind, vars: &BTreeMap<String, String>, test_mode: bool) -> Credentials {
    let prefix = format!("{}_", kind.to_string().to_ascii_uppercase());
    let mut credentials = Credentials::new().test_mode(test_mode);
    for (name, value) in vars {
        if let Some(key) = name.strip_prefix(&prefix) {
            credentials.insert(key.to_ascii_lowercase(), value.clone());
        }
    }
    credentials
}
