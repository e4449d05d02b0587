use {
    merchant_gateways::{
        AppState,
        adapters::build_gateway,
        config::AppConfig,
        infra::http_client::{ReqwestTransport, Transport},
        transport::http::router,
    },
    std::{collections::BTreeMap, sync::Arc},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("invalid configuration");

    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::new(config.http_timeout).expect("failed to build http client"),
    );

    let mut gateways = BTreeMap::new();
    for (kind, credentials) in &config.gateways {
        let gateway = build_gateway(*kind, credentials, transport.clone())
            .unwrap_or_else(|e| panic!("failed to configure {kind}: {e}"));
        gateways.insert(*kind, gateway);
    }

    // Outbound calls get the full processor timeout plus headroom for our own work.
    let app = router(AppState::new(gateways), config.http_timeout * 2);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!(addr = %config.bind_addr, test_mode = config.test_mode, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
