//! HTTP route handlers for the chat view.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::core::errors::ChatError;
use crate::chat::core::ids::{ConversationId, UserId};
use crate::chat::session::coordinator::SendOutcome;
use crate::chat::session::store::ConversationSnapshot;

use super::state::AppState;

type ApiError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/conversations/open", post(open_conversation))
        .route("/api/conversation", get(current_conversation))
        .route("/api/messages", post(send_message))
        .route("/api/messages/more", post(load_more))
        .with_state(state)
}

fn api_error(err: &ChatError) -> ApiError {
    let status = match err {
        ChatError::DuplicateSubmission => StatusCode::TOO_MANY_REQUESTS,
        ChatError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatline",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Open conversation request.
#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    /// Authenticated user, if any.
    pub user_id: Option<UserId>,
    /// Conversation to open; a new one is created when absent.
    pub conversation_id: Option<ConversationId>,
}

/// Open conversation response.
#[derive(Debug, Serialize)]
pub struct OpenResponse {
    /// Conversation now shown.
    pub conversation_id: ConversationId,
    /// State after the first page load.
    pub conversation: ConversationSnapshot,
}

async fn open_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenRequest>,
) -> Result<Json<OpenResponse>, ApiError> {
    let conversation_id = state
        .session
        .open(request.user_id, request.conversation_id)
        .await
        .map_err(|e| api_error(&e))?;

    Ok(Json(OpenResponse {
        conversation_id,
        conversation: state.session.snapshot().await,
    }))
}

async fn current_conversation(State(state): State<Arc<AppState>>) -> Json<ConversationSnapshot> {
    Json(state.session.snapshot().await)
}

/// Send message request.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// The user's message.
    pub text: String,
}

/// Send message response.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// How the exchange ended.
    pub outcome: SendOutcome,
    /// State after the exchange.
    pub conversation: ConversationSnapshot,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let outcome = state
        .session
        .send(&request.text)
        .await
        .map_err(|e| api_error(&e))?;

    Ok(Json(SendResponse {
        outcome,
        conversation: state.session.snapshot().await,
    }))
}

/// Load more response.
#[derive(Debug, Serialize)]
pub struct LoadMoreResponse {
    /// Whether an older page was added.
    pub loaded: bool,
    /// State after the load.
    pub conversation: ConversationSnapshot,
}

async fn load_more(State(state): State<Arc<AppState>>) -> Json<LoadMoreResponse> {
    let loaded = state.session.load_more().await;
    Json(LoadMoreResponse {
        loaded,
        conversation: state.session.snapshot().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::chat::backends::contracts::{BackendFuture, ReplyFetcher};
    use crate::chat::backends::notify::{TracingNavigator, TracingNotifier};
    use crate::chat::backends::sqlite::SqliteMessageStore;
    use crate::chat::core::config::ChatConfig;
    use crate::chat::core::errors::ChatResult;
    use crate::chat::core::message::Reply;
    use crate::chat::session::coordinator::ChatBackends;

    struct EchoReplies;

    impl ReplyFetcher for EchoReplies {
        fn fetch_reply(&self, text: String) -> BackendFuture<'_, ChatResult<Reply>> {
            Box::pin(async move { Ok(Reply::text(format!("echo: {text}"))) })
        }
    }

    async fn app() -> Router {
        let config = ChatConfig::default();
        let store = SqliteMessageStore::in_memory(&config.storage).await.unwrap();
        let backends = ChatBackends {
            messages: Arc::new(store),
            replies: Arc::new(EchoReplies),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
        };
        create_router(AppState::with_backends(config, backends).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_without_user_is_unauthorized() {
        let response = app()
            .await
            .oneshot(post_json("/api/conversations/open", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_open_send_and_duplicate() {
        let app = app().await;
        let user = UserId::new();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/conversations/open",
                serde_json::json!({ "user_id": user }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/messages",
                serde_json::json!({ "text": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["outcome"], "replied");
        assert_eq!(body["conversation"]["messages"][1]["content"], "echo: hello");
        assert_eq!(body["conversation"]["phase"], "idle");

        let response = app
            .oneshot(post_json(
                "/api/messages",
                serde_json::json!({ "text": "HELLO" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
