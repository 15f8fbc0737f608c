//! In-process mock of the Bot API.

use std::sync::{Arc, Mutex};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        routing::post,
    },
    serde_json::{Value, json},
    teloxide::Bot,
    tokio::{sync::oneshot, task::JoinHandle},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramApiMethod {
    GetMe,
    SendMessage,
    SendPhoto,
    SendDocument,
    SendVideo,
    Other(String),
}

impl TelegramApiMethod {
    fn from_path(path: &str) -> Self {
        let method = path.rsplit('/').next().unwrap_or_default();
        match method {
            "GetMe" => Self::GetMe,
            "SendMessage" => Self::SendMessage,
            "SendPhoto" => Self::SendPhoto,
            "SendDocument" => Self::SendDocument,
            "SendVideo" => Self::SendVideo,
            _ => Self::Other(method.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: TelegramApiMethod,
    pub raw_body: String,
}

#[derive(Clone)]
struct ApiState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    fail: bool,
}

pub struct MockTelegramApi {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    url: reqwest::Url,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl MockTelegramApi {
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Every call answers with a Bot API error.
    pub async fn start_failing() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(fail: bool) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler))
            .with_state(ApiState {
                requests: Arc::clone(&requests),
                fail,
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        Self {
            requests,
            url: reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url"),
            shutdown: Some(shutdown_tx),
            server,
        }
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    pub fn bot(&self) -> Bot {
        Bot::new("test-token").set_api_url(self.url.clone())
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("lock requests").clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.server).await;
    }
}

async fn telegram_api_handler(
    State(state): State<ApiState>,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let method = TelegramApiMethod::from_path(uri.path());
    state
        .requests
        .lock()
        .expect("lock requests")
        .push(CapturedRequest {
            method: method.clone(),
            raw_body: String::from_utf8_lossy(&body).to_string(),
        });

    if state.fail {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found",
            })),
        );
    }

    let result = match method {
        TelegramApiMethod::GetMe => json!({
            "id": 7,
            "is_bot": true,
            "first_name": "Courier",
            "username": "courier_test_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false,
        }),
        TelegramApiMethod::Other(_) => json!(true),
        _ => json!({
            "message_id": 1,
            "date": 0,
            "chat": { "id": -100, "type": "group", "title": "relay" },
            "text": "ok",
        }),
    };
    (StatusCode::OK, Json(json!({ "ok": true, "result": result })))
}
