use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::channels::{ChannelResponse, ChannelStatus, CreateChannelRequest};
use crate::web::{AppError, AppState, models::ApiResponse};
use crate::zapi::poller::PollState;
use crate::zapi::setup::{ChannelSetup, setup_channel};

pub fn create_channel_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_channels).post(create_channel))
        .route("/{channel_id}", get(get_channel).delete(delete_channel))
        .route("/{channel_id}/setup", post(setup))
        .route("/{channel_id}/poll", get(poll_state).delete(cancel_poll))
        .route("/{channel_id}/webhook", post(register_webhook))
}

async fn list_channels(
    State(app_state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    let channels = app_state.channels.list_channels(&tenant_id).await?;
    Ok(Json(channels))
}

async fn create_channel(
    State(app_state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    payload: Result<Json<CreateChannelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChannelResponse>), AppError> {
    let Json(payload) = payload?;
    let channel = app_state.channels.create_channel(&tenant_id, payload).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn get_channel(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel = app_state.channels.get_channel(&tenant_id, &channel_id).await?;
    Ok(Json(channel))
}

async fn delete_channel(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    app_state.channels.delete_channel(&tenant_id, &channel_id).await?;
    app_state.active_polls.remove(&(tenant_id, channel_id));
    Ok(StatusCode::NO_CONTENT)
}

/// Runs the connect-or-pair flow for a stored channel and records the
/// resulting status. A pending pairing starts a background status poll.
async fn setup(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<Json<ChannelSetup>, AppError> {
    let credentials = app_state
        .channels
        .credentials_for(&tenant_id, &channel_id)
        .await?;
    let outcome = setup_channel(app_state.gateway.as_ref(), &credentials).await;
    let key = (tenant_id.clone(), channel_id.clone());

    let status = match &outcome {
        ChannelSetup::Connected { .. } => ChannelStatus::Connected,
        ChannelSetup::NeedQrcode { .. } => ChannelStatus::NeedQrcode,
        ChannelSetup::Error { .. } => ChannelStatus::Error,
    };
    // Recorded before the poll starts so a fast connect is never overwritten.
    app_state
        .channels
        .set_status(&tenant_id, &channel_id, status)
        .await?;

    if status == ChannelStatus::Connected {
        app_state.active_polls.remove(&key);
    }
    if status != ChannelStatus::NeedQrcode {
        return Ok(Json(outcome));
    }

    let handle = app_state.poller.spawn(credentials);
    let mut updates = handle.subscribe();
    // Replacing an earlier handle drops it, which stops its task.
    app_state.active_polls.insert(key, handle);

    let channels = app_state.channels.clone();
    tokio::spawn(async move {
        let Ok(state) = updates
            .wait_for(PollState::is_terminal)
            .await
            .map(|state| state.clone())
        else {
            return;
        };
        if state != PollState::Connected {
            return;
        }
        if let Err(e) = channels
            .set_status(&tenant_id, &channel_id, ChannelStatus::Connected)
            .await
        {
            warn!(tenant_id = %tenant_id, channel_id = %channel_id, error = %e, "Failed to record connection from status poll.");
        }
    });
    Ok(Json(outcome))
}

async fn poll_state(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<Json<PollState>, AppError> {
    app_state
        .active_polls
        .get(&(tenant_id, channel_id.clone()))
        .map(|handle| Json(handle.state()))
        .ok_or_else(|| AppError::NotFound(format!("Nenhum monitoramento ativo: {channel_id}")))
}

async fn cancel_poll(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    match app_state
        .active_polls
        .remove(&(tenant_id.clone(), channel_id.clone()))
    {
        Some((_, mut handle)) => {
            handle.cancel();
            info!(tenant_id = %tenant_id, channel_id = %channel_id, "Status poll cancelled.");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::NotFound(format!(
            "Nenhum monitoramento ativo: {channel_id}"
        ))),
    }
}

/// Points the instance's webhooks at this gateway.
async fn register_webhook(
    State(app_state): State<Arc<AppState>>,
    Path((tenant_id, channel_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse>, AppError> {
    let Some(base_url) = app_state.config.public_base_url.as_deref() else {
        return Err(AppError::InvalidInput(
            "PUBLIC_BASE_URL não configurada".to_string(),
        ));
    };
    let credentials = app_state
        .channels
        .credentials_for(&tenant_id, &channel_id)
        .await?;

    let url = format!(
        "{}/api/zapi/webhook/{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&tenant_id),
        urlencoding::encode(&channel_id)
    );
    let vendor = app_state
        .gateway
        .configure_webhook(&credentials, &url)
        .await?;
    info!(tenant_id = %tenant_id, channel_id = %channel_id, url = %url, "Webhook registered.");

    Ok(Json(
        ApiResponse::ok("Webhook configurado").with_data(json!({ "url": url, "vendor": vendor })),
    ))
}
