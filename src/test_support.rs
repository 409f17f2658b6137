//! In-process stand-in for the Z-API REST surface.
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub client_token: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct Route {
    suffix: &'static str,
    status: StatusCode,
    body: String,
    once: bool,
}

#[derive(Clone, Default)]
struct VendorState {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

pub struct FakeVendor {
    pub base_url: String,
    state: VendorState,
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

impl FakeVendor {
    pub async fn start() -> Self {
        let state = VendorState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        Self {
            base_url: serve(app).await,
            state,
        }
    }

    /// Answers any request whose path ends with `suffix`. Later registrations win.
    pub fn respond(&self, suffix: &'static str, status: u16, body: impl Into<String>) -> &Self {
        self.register(suffix, status, body.into(), false)
    }

    /// Like `respond`, but the answer is used for a single request only.
    pub fn respond_once(&self, suffix: &'static str, status: u16, body: impl Into<String>) -> &Self {
        self.register(suffix, status, body.into(), true)
    }

    fn register(&self, suffix: &'static str, status: u16, body: String, once: bool) -> &Self {
        self.state.routes.lock().unwrap().insert(
            0,
            Route {
                suffix,
                status: StatusCode::from_u16(status).unwrap(),
                body,
                once,
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.requests().pop().expect("vendor received no request")
    }
}

async fn handle(
    State(state): State<VendorState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(CapturedRequest {
        method,
        path: path.clone(),
        client_token: headers
            .get("Client-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let route = {
        let mut routes = state.routes.lock().unwrap();
        match routes.iter().position(|r| path.ends_with(r.suffix)) {
            Some(i) if routes[i].once => Some(routes.remove(i)),
            Some(i) => Some(routes[i].clone()),
            None => None,
        }
    };
    match route {
        Some(r) => (r.status, r.body).into_response(),
        None => (StatusCode::NOT_FOUND, r#"{"error":"route not mocked"}"#).into_response(),
    }
}
