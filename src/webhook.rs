//! HTTP entry point: Telegram POSTs each update here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use teloxide::types::Update;
use tracing::{debug, error, warn};

use crate::platform::{telegram, OutboundReply, ReplySender};
use crate::processor::MessageProcessor;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct WebhookState {
    pub processor: Arc<MessageProcessor>,
    pub sender: Arc<dyn ReplySender>,
    pub bot_id: u64,
    pub secret: Option<String>,
    pub timeout: Duration,
}

pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(handle_update).fallback(health))
        .with_state(state)
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn handle_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Result<Json<Update>, JsonRejection>,
) -> (StatusCode, &'static str) {
    if let Some(expected) = state.secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Rejected update with missing or wrong secret token");
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }

    let update = match body {
        Ok(Json(update)) => update,
        Err(e) => {
            warn!("Invalid update payload: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid update");
        }
    };

    let Some(incoming) = telegram::incoming_from_update(&update, state.bot_id) else {
        debug!("Ignoring update {} without a text message", update.id.0);
        return (StatusCode::OK, "ok");
    };

    // Only processing is bounded: once a reply has gone out, aborting the
    // rest would make Telegram redeliver and duplicate it.
    let replies = match tokio::time::timeout(state.timeout, state.processor.process(&incoming))
        .await
    {
        Ok(replies) => replies,
        Err(_) => {
            error!(
                "Update {} timed out after {}s",
                update.id.0,
                state.timeout.as_secs()
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "bot error");
        }
    };

    match deliver(state.sender.as_ref(), incoming.chat_id, &replies).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            error!("Error handling update {}: {:#}", update.id.0, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "bot error")
        }
    }
}

/// Send the replies in order, stopping at the first failure.
async fn deliver(
    sender: &dyn ReplySender,
    chat_id: i64,
    replies: &[OutboundReply],
) -> Result<()> {
    for reply in replies {
        sender.send_text(chat_id, &reply.text).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::llm::Classifier;
    use crate::testing::{FixedClassifier, RecordingSender, SlowClassifier, TableTranslator};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    const PATH: &str = "/api/webhook";
    const BOT_ID: u64 = 555;

    fn state_with(
        sender: Arc<RecordingSender>,
        classifier: Arc<dyn Classifier>,
        timeout: Duration,
    ) -> WebhookState {
        let translator = TableTranslator::default().with("Server is down", "服务器宕机");
        let processor = MessageProcessor::new(
            classifier,
            Arc::new(translator),
            &ProcessorConfig::default(),
            "en",
        )
        .unwrap();
        WebhookState {
            processor: Arc::new(processor),
            sender,
            bot_id: BOT_ID,
            secret: None,
            timeout,
        }
    }

    fn state(sender: Arc<RecordingSender>, secret: Option<&str>) -> WebhookState {
        let mut state = state_with(
            sender,
            Arc::new(FixedClassifier::important()),
            Duration::from_secs(5),
        );
        state.secret = secret.map(str::to_string);
        state
    }

    fn update_json(from_id: u64, text: &str) -> String {
        json!({
            "update_id": 77,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": {"id": 31337, "type": "private", "first_name": "Bo"},
                "from": {"id": from_id, "is_bot": false, "first_name": "Bo"},
                "text": text,
            }
        })
        .to_string()
    }

    fn post_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(PATH)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn call(state: WebhookState, request: Request<Body>) -> (StatusCode, String) {
        let response = router(PATH, state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_get_is_health_check() {
        let sender = Arc::new(RecordingSender::default());
        let request = Request::builder()
            .method("GET")
            .uri(PATH)
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(state(sender.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_replies_sent_in_order_to_origin_chat() {
        let sender = Arc::new(RecordingSender::default());
        let request = post_request(update_json(1, "Server is down"));
        let (status, body) = call(state(sender.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert_eq!(
            sender.sent(),
            vec![
                (31337, "⚠️ 重要信息（已翻译如下）".to_string()),
                (31337, "服务器宕机".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_own_message_sends_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let request = post_request(update_json(BOT_ID, "Server is down"));
        let (status, _) = call(state(sender.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_edited_message_is_acknowledged_and_ignored() {
        let sender = Arc::new(RecordingSender::default());
        let edited = json!({
            "update_id": 78,
            "edited_message": {
                "message_id": 3,
                "date": 1700000000,
                "edit_date": 1700000100,
                "chat": {"id": 31337, "type": "private", "first_name": "Bo"},
                "from": {"id": 1, "is_bot": false, "first_name": "Bo"},
                "text": "Server is down",
            }
        });
        let request = post_request(edited.to_string());
        let (status, body) = call(state(sender.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let sender = Arc::new(RecordingSender::default());
        let request = post_request("not json".to_string());
        let (status, _) = call(state(sender, None), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_server_error() {
        let sender = Arc::new(RecordingSender::failing());
        let request = post_request(update_json(1, "你好"));
        let (status, body) = call(state(sender, None), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "bot error");
    }

    #[tokio::test]
    async fn test_slow_processing_times_out_before_sending() {
        let sender = Arc::new(RecordingSender::default());
        let classifier = Arc::new(SlowClassifier {
            delay: Duration::from_millis(500),
        });
        let state = state_with(sender.clone(), classifier, Duration::from_millis(50));
        let (status, body) = call(state, post_request(update_json(1, "Server is down"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "bot error");
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_slow_delivery_is_not_cut_off_by_timeout() {
        let sender = Arc::new(RecordingSender::slow(Duration::from_millis(80)));
        let state = state_with(
            sender.clone(),
            Arc::new(FixedClassifier::important()),
            Duration::from_millis(50),
        );
        let (status, _) = call(state, post_request(update_json(1, "Server is down"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            sender.sent(),
            vec![
                (31337, "⚠️ 重要信息（已翻译如下）".to_string()),
                (31337, "服务器宕机".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_secret_token_is_checked() {
        let sender = Arc::new(RecordingSender::default());
        let request = post_request(update_json(1, "你好"));
        let (status, _) = call(state(sender.clone(), Some("s3cret")), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(sender.sent().is_empty());

        let mut request = post_request(update_json(1, "你好"));
        request
            .headers_mut()
            .insert(SECRET_HEADER, "s3cret".parse().unwrap());
        let (status, _) = call(state(sender.clone(), Some("s3cret")), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sender.sent(), vec![(31337, "⚠️ 重要信息：\n你好".to_string())]);
    }
}
