pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod transport;

use {
    adapters::GatewayKind,
    domain::gateway::Gateway,
    std::{collections::BTreeMap, sync::Arc},
};

#[derive(Clone)]
pub struct AppState {
    pub gateways: Arc<BTreeMap<GatewayKind, Arc<dyn Gateway>>>,
}

impl AppState {
    pub fn new(gateways: BTreeMap<GatewayKind, Arc<dyn Gateway>>) -> Self {
        Self {
            gateways: Arc::new(gateways),
        }
    }
}
