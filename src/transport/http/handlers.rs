use {
    crate::{
        AppState,
        adapters::GatewayKind,
        domain::{error::GatewayError, response::Response},
        services::dispatch::{self, PaymentCommand},
        transport::http::errors::ApiError,
    },
    axum::{
        Json,
        extract::{Path, State},
    },
};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_gateways(State(state): State<AppState>) -> Json<serde_json::Value> {
    let names: Vec<String> = state.gateways.keys().map(ToString::to_string).collect();
    Json(serde_json::json!({ "gateways": names }))
}

pub async fn process_payment(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(command): Json<PaymentCommand>,
) -> Result<Json<Response>, ApiError> {
    let kind: GatewayKind = gateway.parse()?;
    let adapter = state
        .gateways
        .get(&kind)
        .cloned()
        .ok_or(GatewayError::UnknownGateway(gateway))?;

    let response = dispatch::execute(adapter.as_ref(), command).await?;
    Ok(Json(response))
}
