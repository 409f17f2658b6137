use axum::{Router, http::Method, routing::get};
use dashmap::DashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::channels::ChannelService;
use crate::server::config::ServerConfig;
use crate::webhook::{WebhookDeduplicator, WebhookProcessor};
use crate::zapi::WhatsAppGateway;
use crate::zapi::poller::{PollHandle, StatusPoller};

pub use error::AppError;

pub mod error;
pub mod models;
pub mod routes;

/// Active status polls keyed by `(tenant_id, channel_id)`.
pub type ActivePolls = DashMap<(String, String), PollHandle>;

pub struct AppState {
    pub gateway: Arc<dyn WhatsAppGateway>,
    pub channels: Arc<ChannelService>,
    pub webhooks: WebhookProcessor,
    pub poller: StatusPoller,
    pub active_polls: ActivePolls,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    gateway: Arc<dyn WhatsAppGateway>,
    channels: Arc<ChannelService>,
    config: Arc<ServerConfig>,
) -> Router {
    let app_state = Arc::new(AppState {
        webhooks: WebhookProcessor::new(
            channels.clone(),
            WebhookDeduplicator::new(config.webhook_dedup_ttl()),
        ),
        poller: StatusPoller::new(
            gateway.clone(),
            config.status_poll_interval(),
            config.status_poll_max_attempts,
        ),
        active_polls: DashMap::new(),
        gateway,
        channels,
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/zapi", routes::zapi_routes::create_zapi_router())
        .nest(
            "/api/tenants/{tenant_id}/channels",
            routes::channel_routes::create_channel_router(),
        )
        .with_state(app_state)
        .layer(cors)
}
