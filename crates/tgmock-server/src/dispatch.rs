//! Request dispatcher.
//!
//! Every request, whatever its path, lands in [`dispatch`]. Evaluation order:
//!
//! 1. configured delay
//! 2. HTTP verb (GET and POST only)
//! 3. `/bot<token>/<method>` path match, else `404 Not Found`
//! 4. fault policy (see [`crate::policy`])
//! 5. method handler, else `404 Method not found: <method>`

use std::io;
use std::time::Duration;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::methods::{BotMethod, MethodReply};
use crate::state::MockState;
use crate::types::ApiReply;

/// Fragment written by the `partial-read` scenario.
pub const TRUNCATED_BODY: &[u8] = br#"{"ok": true, "res"#;

/// `Content-Length` declared by the `partial-read` scenario.
pub const TRUNCATED_DECLARED_LENGTH: u64 = 100;

/// Pause between writing the fragment and dropping the connection, so the
/// fragment is flushed to the socket first.
const TRUNCATE_FLUSH_PAUSE: Duration = Duration::from_millis(20);

/// Extract the Bot API method name from a request target.
///
/// Returns whatever follows `prefix`, with any `?query` removed, or `None`
/// when the target does not start with `prefix`.
pub fn extract_method<'a>(target: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = target.strip_prefix(prefix)?;
    Some(match rest.split_once('?') {
        Some((method, _query)) => method,
        None => rest,
    })
}

/// Fallback handler that answers every request.
pub async fn dispatch(State(state): State<MockState>, request: Request) -> Response {
    let config = &state.config;

    if !config.delay.is_zero() && !stall(&state, config.delay).await {
        return dropped_connection_response();
    }

    let (parts, body) = request.into_parts();

    if parts.method != Method::GET && parts.method != Method::POST {
        return ApiError::UnsupportedVerb(parts.method.to_string()).into_response();
    }

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());

    let Some(method) = extract_method(target, &state.path_prefix) else {
        return ApiError::NotFound.into_response();
    };

    if let Some(fault) = state.policy.evaluate(method) {
        return fault.into_response();
    }

    let body = match axum::body::to_bytes(body, config.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(method, error = %e, "Unreadable request body, treating as empty");
            Bytes::new()
        }
    };

    let Some(bot_method) = BotMethod::from_name(method) else {
        return ApiError::MethodNotFound(method.to_string()).into_response();
    };

    match bot_method.handle(&body, config.scenario, config.slow_response_delay) {
        Ok(MethodReply::Result(result)) => ok_response(result),
        Ok(MethodReply::Delayed { delay, result }) => {
            debug!(method, ?delay, "Stalling response");
            if stall(&state, delay).await {
                ok_response(result)
            } else {
                debug!(method, "Shutdown during stall, dropping connection");
                dropped_connection_response()
            }
        }
        Ok(MethodReply::Truncated) => truncated_response(),
        Err(e) => {
            error!(method, error = %e, "Failed to serialize reply");
            ApiError::Internal.into_response()
        }
    }
}

/// Sleep for `delay`. Returns `false` if the server started shutting down first.
async fn stall(state: &MockState, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = state.shutdown.cancelled() => false,
    }
}

fn ok_response(result: serde_json::Value) -> Response {
    Json(ApiReply::new(result)).into_response()
}

/// 200 response that promises more bytes than it delivers, then fails the
/// body stream so the connection is dropped mid-body.
pub fn truncated_response() -> Response {
    let fragment = stream::once(async { Ok::<_, io::Error>(Bytes::from_static(TRUNCATED_BODY)) });
    let abort = stream::once(async {
        tokio::time::sleep(TRUNCATE_FLUSH_PAUSE).await;
        Err::<Bytes, _>(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "partial-read: closing connection before the declared length",
        ))
    });

    let mut response = Response::new(Body::from_stream(fragment.chain(abort)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(TRUNCATED_DECLARED_LENGTH),
    );
    response
}

/// Response whose body fails at once, so the connection closes unanswered.
fn dropped_connection_response() -> Response {
    let abort = stream::once(async {
        Err::<Bytes, _>(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "server shutting down",
        ))
    });
    Response::new(Body::from_stream(abort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use crate::policy::FixedSource;
    use crate::scenario::Scenario;
    use axum::Router;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(config: MockConfig) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(MockState::with_fault_source(config, Arc::new(FixedSource(0.5))))
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_extract_method() {
        let prefix = "/botTESTTOKEN123/";
        assert_eq!(extract_method("/botTESTTOKEN123/getMe", prefix), Some("getMe"));
        assert_eq!(
            extract_method("/botTESTTOKEN123/getUpdates?offset=5&timeout=0", prefix),
            Some("getUpdates")
        );
        assert_eq!(extract_method("/botTESTTOKEN123/", prefix), Some(""));
        assert_eq!(extract_method("/botWRONG/getMe", prefix), None);
        assert_eq!(extract_method("/getMe", prefix), None);
        assert_eq!(extract_method("/botTESTTOKEN123", prefix), None);
    }

    #[tokio::test]
    async fn test_get_me_default() {
        let response = app(MockConfig::default())
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({
                "ok": true,
                "result": {"id": 123456789, "is_bot": true, "first_name": "TestBot", "username": "test_bot"}
            })
        );
    }

    #[tokio::test]
    async fn test_wrong_prefix_is_generic_not_found() {
        let response = app(MockConfig::default())
            .oneshot(get("/botOTHER/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_code"], 404);
        assert_eq!(json["description"], "Not Found");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = app(MockConfig::default())
            .oneshot(get("/botTESTTOKEN123/bogusMethod?x=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["description"], "Method not found: bogusMethod");
    }

    #[tokio::test]
    async fn test_wrong_prefix_skips_policy() {
        let config = MockConfig::new()
            .with_scenario(Scenario::Retry429)
            .with_forced_status(503);
        let state = MockState::new(config);
        let app = Router::new().fallback(dispatch).with_state(state.clone());

        let response = app.oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!state.session().retry_sent());
    }

    #[tokio::test]
    async fn test_unsupported_verb() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/botTESTTOKEN123/getMe")
            .body(Body::empty())
            .unwrap();
        let response = app(MockConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(json_body(response).await["description"], "Unsupported method (PUT)");
    }

    #[tokio::test]
    async fn test_send_message_echo() {
        let response = app(MockConfig::default())
            .oneshot(post("/botTESTTOKEN123/sendMessage", r#"{"chat_id": 42, "text": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["result"]["chat"]["id"], 42);
        assert_eq!(json["result"]["text"], "hi");
        assert_eq!(json["result"]["from"]["is_bot"], true);
    }

    #[tokio::test]
    async fn test_send_message_without_body() {
        let response = app(MockConfig::default())
            .oneshot(post("/botTESTTOKEN123/sendMessage", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["result"]["chat"]["id"], 0);
        assert_eq!(json["result"]["text"], "");
    }

    #[tokio::test]
    async fn test_send_message_body_too_large_is_empty() {
        let config = MockConfig::new().with_max_body_size(4);
        let response = app(config)
            .oneshot(post("/botTESTTOKEN123/sendMessage", r#"{"chat_id": 42, "text": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["result"]["chat"]["id"], 0);
    }

    #[tokio::test]
    async fn test_forced_status_overrides_get_me() {
        let response = app(MockConfig::new().with_forced_status(502))
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 502);
        let json = json_body(response).await;
        assert_eq!(json["error_code"], 502);
        assert_eq!(json["description"], "Forced error");
    }

    #[tokio::test]
    async fn test_forced_status_applies_to_unknown_methods() {
        let response = app(MockConfig::new().with_forced_status(418))
            .oneshot(get("/botTESTTOKEN123/bogusMethod"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 418);
    }

    #[tokio::test]
    async fn test_fail_rate_one_always_500() {
        let app = app(MockConfig::new().with_fail_rate(1.0));
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(get("/botTESTTOKEN123/getMe"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json_body(response).await["description"], "Internal Server Error");
        }
    }

    #[tokio::test]
    async fn test_fail_rate_uses_injected_source() {
        // FixedSource(0.5) sits right at the threshold.
        let response = app(MockConfig::new().with_fail_rate(0.5))
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(MockConfig::new().with_fail_rate(0.51))
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_retry_scenario_then_normal() {
        let app = app(MockConfig::new().with_scenario(Scenario::Retry429));

        let response = app
            .clone()
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
        let json = json_body(response).await;
        assert_eq!(json["error_code"], 429);
        assert_eq!(json["description"], "Too Many Requests: retry after 1");

        let response = app
            .oneshot(post("/botTESTTOKEN123/sendMessage", r#"{"chat_id": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_retry_scenario_is_one_shot_under_concurrency() {
        let app = app(MockConfig::new().with_scenario(Scenario::Retry429));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(get("/botTESTTOKEN123/getMe"))
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();

        let mut throttled = 0;
        for task in tasks {
            if task.await.unwrap() == StatusCode::TOO_MANY_REQUESTS {
                throttled += 1;
            }
        }
        assert_eq!(throttled, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_scenario() {
        let app = app(MockConfig::new().with_scenario(Scenario::Unauthorized));

        let response = app
            .clone()
            .oneshot(post("/botTESTTOKEN123/sendMessage", r#"{"chat_id": 42, "text": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get("/botTESTTOKEN123/getUpdates"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["description"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_out_of_order_scenario() {
        let response = app(MockConfig::new().with_scenario(Scenario::OutOfOrder))
            .oneshot(get("/botTESTTOKEN123/getUpdates?offset=0"))
            .await
            .unwrap();
        let json = json_body(response).await;
        let ids: Vec<i64> = json["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["update_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![5, 3, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_to_not_found() {
        let app = app(MockConfig::new().with_delay(Duration::from_millis(250)));
        let start = tokio::time::Instant::now();
        let response = app.oneshot(get("/elsewhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_scenario() {
        let config = MockConfig::new().with_scenario(Scenario::SlowResponse);
        let start = tokio::time::Instant::now();
        let response = app(config)
            .oneshot(get("/botTESTTOKEN123/getUpdates"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(35));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"ok": true, "result": []}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cuts_stall_short() {
        let config = MockConfig::new().with_scenario(Scenario::SlowResponse);
        let state = MockState::with_fault_source(config, Arc::new(FixedSource(0.5)));
        let shutdown = state.shutdown.clone();
        let app = Router::new().fallback(dispatch).with_state(state);

        let start = tokio::time::Instant::now();
        let request = tokio::spawn(app.oneshot(get("/botTESTTOKEN123/getUpdates")));
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();

        let response = request.await.unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(35));
        let mut body = response.into_body().into_data_stream();
        assert!(body.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_partial_read_declares_more_than_it_sends() {
        let response = app(MockConfig::new().with_scenario(Scenario::PartialRead))
            .oneshot(get("/botTESTTOKEN123/getUpdates"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], TRUNCATED_BODY);
        assert!(body.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_partial_read_leaves_other_methods_alone() {
        let response = app(MockConfig::new().with_scenario(Scenario::PartialRead))
            .oneshot(get("/botTESTTOKEN123/getMe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ok"], true);
    }
}
