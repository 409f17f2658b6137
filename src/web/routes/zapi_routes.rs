use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        rejection::{BytesRejection, JsonRejection, PathRejection},
    },
    routing::post,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::{
    AppError, AppState,
    models::{ApiResponse, SendButtonMessageRequest, SendMessageRequest},
};
use crate::webhook::{WebhookOutcome, classify};
use crate::zapi::{ChannelCredentials, CredentialsPayload, ZApiError};

pub fn create_zapi_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get-qrcode", post(get_qr_code))
        .route("/test-connection", post(test_connection))
        .route("/send-message", post(send_message))
        .route("/send-button-message", post(send_button_message))
        .route("/disconnect", post(disconnect))
        .route("/webhook/{tenant_id}/{channel_id}", post(receive_webhook))
}

/// Vendor failures are relayed as `200 {success: false}`; only invalid
/// input becomes an HTTP error.
fn relay_failure(err: ZApiError) -> Result<Json<ApiResponse>, AppError> {
    match err {
        ZApiError::InvalidInput(msg) => Err(AppError::InvalidInput(msg)),
        other => Ok(Json(ApiResponse::failure(other.to_string()))),
    }
}

async fn get_qr_code(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Json(payload) = payload?;
    let credentials = ChannelCredentials::try_from(payload)?;
    match app_state.gateway.get_qr_code(&credentials).await {
        Ok(qr_code) => Ok(Json(ApiResponse {
            success: true,
            qr_code: Some(qr_code),
            ..Default::default()
        })),
        Err(e) => relay_failure(e),
    }
}

async fn test_connection(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Json(payload) = payload?;
    let credentials = ChannelCredentials::try_from(payload)?;
    match app_state.gateway.test_connection(&credentials).await {
        Ok(status) => {
            let data = serde_json::to_value(&status)
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;
            Ok(Json(ApiResponse::ok("Conexão testada com sucesso").with_data(data)))
        }
        Err(e) => relay_failure(e),
    }
}

async fn send_message(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Json(payload) = payload?;
    let credentials = ChannelCredentials::try_from(payload.credentials)?;
    if payload.phone.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "phone e message são obrigatórios".to_string(),
        ));
    }

    match app_state
        .gateway
        .send_text_message(&credentials, &payload.phone, &payload.message)
        .await
    {
        Ok(sent) => Ok(Json(ApiResponse {
            success: true,
            message: Some("Mensagem enviada".to_string()),
            message_id: Some(sent.reference_id().to_string()),
            ..Default::default()
        })),
        Err(e) => relay_failure(e),
    }
}

async fn send_button_message(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SendButtonMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Json(payload) = payload?;
    let credentials = ChannelCredentials::try_from(payload.credentials)?;
    if payload.phone.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "phone e message são obrigatórios".to_string(),
        ));
    }
    if payload.buttons.is_empty() {
        return Err(AppError::InvalidInput(
            "Informe ao menos um botão".to_string(),
        ));
    }

    match app_state
        .gateway
        .send_button_message(
            &credentials,
            &payload.phone,
            payload.title.as_deref(),
            &payload.message,
            payload.footer.as_deref(),
            &payload.buttons,
        )
        .await
    {
        Ok(sent) => Ok(Json(ApiResponse {
            success: true,
            message: Some("Mensagem enviada".to_string()),
            message_id: Some(sent.reference_id().to_string()),
            ..Default::default()
        })),
        Err(e) => relay_failure(e),
    }
}

async fn disconnect(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Json(payload) = payload?;
    let credentials = ChannelCredentials::try_from(payload)?;
    match app_state.gateway.disconnect(&credentials).await {
        Ok(data) => Ok(Json(ApiResponse::ok("Instância desconectada").with_data(data))),
        Err(e) => relay_failure(e),
    }
}

fn parse_webhook_body(body: &[u8]) -> Result<Map<String, Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err("Payload vazio".to_string());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Payload deve ser um objeto JSON".to_string()),
        Err(e) => Err(format!("Payload inválido: {e}")),
    }
}

// Always answers 200, otherwise the vendor keeps redelivering.
async fn receive_webhook(
    State(app_state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Json<ApiResponse> {
    let Ok(Path((tenant_id, channel_id))) = path else {
        warn!("Webhook received with an unreadable path.");
        return Json(ApiResponse::failure("Caminho inválido"));
    };

    let payload = match body
        .map_err(|e| e.body_text())
        .and_then(|bytes| parse_webhook_body(&bytes))
    {
        Ok(payload) => payload,
        Err(message) => {
            warn!(tenant_id = %tenant_id, channel_id = %channel_id, reason = %message, "Rejected webhook payload.");
            return Json(ApiResponse::failure(message));
        }
    };

    let event = classify(&payload);
    match app_state
        .webhooks
        .process(&tenant_id, &channel_id, &event)
        .await
    {
        Ok(WebhookOutcome::Handled(kind)) => {
            Json(ApiResponse::ok(format!("Evento {kind} processado")))
        }
        Ok(WebhookOutcome::Duplicate(kind)) => {
            Json(ApiResponse::ok(format!("Evento {kind} duplicado ignorado")))
        }
        Err(e) => {
            error!(tenant_id = %tenant_id, channel_id = %channel_id, event = event.kind(), error = %e, "Failed to process webhook.");
            Json(ApiResponse::failure("Erro ao processar webhook"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::store::ChannelStore;
    use crate::channels::{ChannelError, ChannelService, ChannelStatus, ConfigCipher, InMemoryChannelStore};
    use crate::channels::models::MarketingChannel;
    use crate::server::config::ServerConfig;
    use crate::test_support::{FakeVendor, serve};
    use crate::web::create_axum_router;
    use crate::zapi::ZApiClient;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    /// Store whose status updates always fail.
    #[derive(Default)]
    struct BrokenStatusStore {
        inner: InMemoryChannelStore,
    }

    #[async_trait]
    impl ChannelStore for BrokenStatusStore {
        async fn insert(&self, channel: MarketingChannel) -> Result<(), ChannelError> {
            self.inner.insert(channel).await
        }

        async fn get(
            &self,
            tenant_id: &str,
            channel_id: &str,
        ) -> Result<Option<MarketingChannel>, ChannelError> {
            self.inner.get(tenant_id, channel_id).await
        }

        async fn list(&self, tenant_id: &str) -> Result<Vec<MarketingChannel>, ChannelError> {
            self.inner.list(tenant_id).await
        }

        async fn delete(&self, tenant_id: &str, channel_id: &str) -> Result<bool, ChannelError> {
            self.inner.delete(tenant_id, channel_id).await
        }

        async fn update_status(
            &self,
            _tenant_id: &str,
            _channel_id: &str,
            _status: ChannelStatus,
        ) -> Result<bool, ChannelError> {
            Err(ChannelError::InvalidInput("storage unavailable".to_string()))
        }
    }

    async fn gateway_with_store(vendor_url: &str, store: Arc<dyn ChannelStore>) -> String {
        let gateway = Arc::new(ZApiClient::new(vendor_url, Duration::from_secs(5)).unwrap());
        let channels = Arc::new(ChannelService::new(store, ConfigCipher::new(&[1u8; 32]).unwrap()));
        serve(create_axum_router(gateway, channels, Arc::new(ServerConfig::default()))).await
    }

    /// Starts the gateway against `vendor_url` and returns the gateway's URL.
    async fn gateway_for(vendor_url: &str) -> String {
        gateway_with_store(vendor_url, Arc::new(InMemoryChannelStore::new())).await
    }

    async fn post(base: &str, path: &str, body: impl Into<reqwest::Body>) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.bytes().await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn credentials_body(extra: Value) -> String {
        let mut body = json!({"instanceId": "3C01", "token": "tok", "clientToken": "ct"});
        if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), extra) {
            target.extend(extra);
        }
        body.to_string()
    }

    #[tokio::test]
    async fn test_get_qrcode_success() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/qr-code/image", 200, "data:image/png;base64,QR");

        let (status, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/get-qrcode",
            credentials_body(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "qrCode": "data:image/png;base64,QR"}));
    }

    #[tokio::test]
    async fn test_connection_unauthorized_is_relayed() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/status", 401, r#"{"error":"Invalid Client-Token"}"#);

        let (status, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/test-connection",
            credentials_body(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"success": false, "message": "Erro 401: Invalid Client-Token"})
        );
    }

    #[tokio::test]
    async fn test_connection_success_relays_data() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/status", 200, r#"{"connected":false,"smartphoneConnected":false,"error":"You are not connected."}"#);

        let (_, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/test-connection",
            credentials_body(json!({})),
        )
        .await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["connected"], json!(false));
        assert_eq!(body["data"]["error"], json!("You are not connected."));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_bad_request() {
        let vendor = FakeVendor::start().await;
        let (status, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/test-connection",
            json!({"instanceId": "", "token": "tok"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(vendor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_normalizes_phone() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/send-text", 200, r#"{"zaapId":"Z9","messageId":"M9"}"#);

        let (status, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/send-message",
            credentials_body(json!({"phone": "+55 (11) 98765-4321", "message": "Olá"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["messageId"], json!("M9"));
        assert_eq!(vendor.last_request().body["phone"], json!("5511987654321"));
        assert_eq!(vendor.last_request().client_token.as_deref(), Some("ct"));
    }

    #[tokio::test]
    async fn test_send_message_without_zaap_id_fails() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/send-text", 200, r#"{}"#);

        let (status, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/send-message",
            credentials_body(json!({"phone": "5511987654321", "message": "Olá"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Z-API não retornou zaapId"));
    }

    #[tokio::test]
    async fn test_send_button_message_requires_buttons() {
        let vendor = FakeVendor::start().await;
        let (status, _) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/send-button-message",
            credentials_body(json!({"phone": "5511", "message": "Escolha", "buttons": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_button_message_success() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/send-button-list", 200, r#"{"zaapId":"Z7"}"#);

        let (_, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/send-button-message",
            credentials_body(json!({
                "phone": "55 11 4002-8922",
                "message": "Escolha",
                "footer": "Equipe",
                "buttons": ["Sim", {"text": "Não"}]
            })),
        )
        .await;
        assert_eq!(body["messageId"], json!("Z7"));
        let sent = vendor.last_request().body;
        assert_eq!(sent["phone"], json!("551140028922"));
        assert_eq!(sent["footer"], json!("Equipe"));
        assert_eq!(sent["buttonList"]["buttons"][1]["buttonId"], json!("btn_2"));
    }

    #[tokio::test]
    async fn test_disconnect_relays_vendor_result() {
        let vendor = FakeVendor::start().await;
        vendor.respond("/disconnect", 200, r#"{"value":true}"#);

        let (_, body) = post(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/disconnect",
            credentials_body(json!({})),
        )
        .await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!({"value": true}));
    }

    #[tokio::test]
    async fn test_webhook_empty_body_is_ok_with_failure() {
        let (status, body) = post(&gateway_for("http://127.0.0.1:1").await, "/api/zapi/webhook/t1/c1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_webhook_malformed_body_is_ok_with_failure() {
        let gateway = gateway_for("http://127.0.0.1:1").await;
        let (status, body) = post(&gateway, "/api/zapi/webhook/t1/c1", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(false));

        let (status, body) = post(&gateway, "/api/zapi/webhook/t1/c1", "[1,2]").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_webhook_classifies_and_dedups() {
        let gateway = gateway_for("http://127.0.0.1:1").await;
        let payload = json!({"phone": "5511", "messageId": "M1", "status": "RECEIVED", "id": "M1"}).to_string();

        let (status, body) = post(&gateway, "/api/zapi/webhook/t1/c1", payload.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "message": "Evento message processado"}));

        let (_, body) = post(&gateway, "/api/zapi/webhook/t1/c1", payload).await;
        assert_eq!(body["message"], json!("Evento message duplicado ignorado"));
    }

    #[tokio::test]
    async fn test_webhook_unclassified_is_acknowledged() {
        let (status, body) = post(
            &gateway_for("http://127.0.0.1:1").await,
            "/api/zapi/webhook/t1/c1",
            json!({"foo": "bar"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
    }

    #[tokio::test]
    async fn test_webhook_processing_error_is_ok_with_failure() {
        let gateway =
            gateway_with_store("http://127.0.0.1:1", Arc::new(BrokenStatusStore::default())).await;
        let (status, body) = post(
            &gateway,
            "/api/zapi/webhook/t1/c1",
            json!({"connected": false, "error": "Device has been disconnected"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": false, "message": "Erro ao processar webhook"}));
    }

    async fn post_untyped(base: &str, path: &str, body: &'static str) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_empty_body_gets_error_envelope() {
        let vendor = FakeVendor::start().await;
        let (status, body) = post(&gateway_for(&vendor.base_url).await, "/api/zapi/test-connection", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].is_string());
        assert!(vendor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_gets_error_envelope() {
        let vendor = FakeVendor::start().await;
        let (status, body) = post_untyped(
            &gateway_for(&vendor.base_url).await,
            "/api/zapi/get-qrcode",
            r#"{"instanceId":"3C01","token":"tok"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(vendor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_fields_get_error_envelope() {
        let vendor = FakeVendor::start().await;
        let gateway = gateway_for(&vendor.base_url).await;

        let (status, body) = post(
            &gateway,
            "/api/zapi/test-connection",
            json!({"instanceId": 5, "token": "tok"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (status, body) = post(
            &gateway,
            "/api/zapi/send-message",
            credentials_body(json!({"phone": "5511", "message": ["x"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(vendor.requests().is_empty());
    }

    #[test]
    fn test_parse_webhook_body() {
        assert!(parse_webhook_body(b"  \n").is_err());
        assert!(parse_webhook_body(b"null").is_err());
        assert_eq!(parse_webhook_body(br#"{"a":1}"#).unwrap().len(), 1);
    }
}
