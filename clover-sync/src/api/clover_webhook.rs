//! Clover webhook handler
//!
//! POST /clover/webhook. The POS delivers order events at least once and
//! retries anything we do not answer with 2xx, so every "not for us" case
//! (non-order events, unknown states, unknown orders) is acknowledged with
//! 200 after the signature has been verified.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::clover::{SignatureError, map_order_state, verify_webhook_signature};
use crate::state::AppState;
use crate::sync::reconcile::{self, EventActor, StatusEvent};

/// Header names the POS has been observed to sign with, tried in order.
const SIGNATURE_HEADERS: [&str; 2] = ["clover-signature", "x-clover-auth"];

const ORDER_EVENT_TYPE: &str = "ORDER_STATE_CHANGED";

pub async fn handle_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // 1. Parse the raw body exactly once. The handshake has to be answered
    //    before any signature work, and the parse is reused afterwards.
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not valid JSON");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // 2. Endpoint verification handshake: echo the code back unsigned.
    if let Some(code) = payload["verificationCode"].as_str() {
        tracing::info!("Answering webhook verification handshake");
        return Json(serde_json::json!({ "verificationCode": code })).into_response();
    }

    // 3. Verify the HMAC digest over the raw bytes.
    let digest = match SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
    {
        Some(digest) => digest,
        None => {
            tracing::warn!("Webhook is missing a signature header");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    match verify_webhook_signature(&body, digest, &state.clover_app_secret) {
        Ok(()) => {}
        Err(SignatureError::Malformed) => {
            tracing::warn!("Webhook signature header is not a decodable digest");
            return StatusCode::BAD_REQUEST.into_response();
        }
        Err(SignatureError::Mismatch) => {
            tracing::warn!("Webhook signature mismatch");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    // 4. Only order-state events are ours; acknowledge the rest so the POS
    //    stops retrying them.
    let event_type = payload["type"].as_str().unwrap_or("");
    if event_type != ORDER_EVENT_TYPE {
        tracing::debug!(event_type, "Ignoring non-order webhook event");
        return StatusCode::OK.into_response();
    }

    // 5. A multi-location merchant can start reporting a different location
    //    id at any point; adopt it. Failure here must not drop the event.
    if let Some(location_id) = payload["locationId"].as_str()
        && let Err(e) = state.locations.update(&state.pool, location_id).await
    {
        tracing::warn!(error = %e, "Failed to adopt webhook location id");
    }

    // 6. Reduce the payload to the validated envelope.
    let order = &payload["order"];
    let Some(order_code) = order["externalReference"].as_str() else {
        // Created directly on the POS device; nothing to correlate with.
        tracing::debug!("Order event without an external reference, ignoring");
        return StatusCode::OK.into_response();
    };

    let state_label = order["state"].as_str().unwrap_or("");
    let Some(status) = map_order_state(state_label) else {
        // Vendors grow their state vocabulary; unknown labels are a no-op.
        tracing::debug!(order_code, state = state_label, "Unmapped order state, ignoring");
        return StatusCode::OK.into_response();
    };

    // Event timestamps arrive as epoch seconds.
    let occurred_at = payload["ts"]
        .as_i64()
        .map(|secs| secs * 1000)
        .unwrap_or_else(shared::util::now_millis);

    let actor = order["employee"].as_object().map(|employee| EventActor {
        external_id: employee.get("id").and_then(Value::as_str).map(String::from),
        display_name: employee.get("displayName").and_then(Value::as_str).map(String::from),
    });

    let event = StatusEvent {
        order_code: order_code.to_string(),
        status,
        occurred_at,
        actor,
        clover_order_id: order["id"].as_str().map(String::from),
        checkout_session_id: order["checkoutSessionId"].as_str().map(String::from),
        source: reconcile::SOURCE_WEBHOOK,
    };

    // 7. Apply. Every reconcile outcome is an acknowledgement; only an
    //    infrastructure failure asks the POS to redeliver.
    match reconcile::apply_status_event(&state.pool, &event).await {
        Ok(outcome) => {
            tracing::debug!(order_code = %event.order_code, ?outcome, "Webhook event processed");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::error!(order_code = %event.order_code, error = %e, "Webhook event processing failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;

    use crate::clover::location::LOCATION_SETTING_KEY;
    use crate::db;
    use shared::models::OrderStatus;

    fn sign_hex(body: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("clover-signature", sign_hex(body, "abc123").parse().unwrap());
        headers
    }

    fn order_event(code: &str, state: &str, ts_secs: i64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": ORDER_EVENT_TYPE,
            "ts": ts_secs,
            "locationId": "LOC-1",
            "order": {
                "id": "CLV-1",
                "externalReference": code,
                "state": state,
                "employee": { "id": "EMP-7", "displayName": "Alice" },
            },
        }))
        .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn handshake_is_echoed_without_a_signature() {
        let state = AppState::for_tests(true).await;
        let body = Bytes::from(r#"{"verificationCode":"vc-4711"}"#);

        let response = handle_webhook(State(state), HeaderMap::new(), body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let echoed = body_json(response).await;
        assert_eq!(echoed["verificationCode"], "vc-4711");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = AppState::for_tests(true).await;
        let body = Bytes::from_static(b"not json at all");

        let response = handle_webhook(State(state), HeaderMap::new(), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_header_is_bad_request() {
        let state = AppState::for_tests(true).await;
        let body = Bytes::from(order_event("ORD-1", "ready", 1_735_700_000));

        let response = handle_webhook(State(state), HeaderMap::new(), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_signature_is_bad_request() {
        let state = AppState::for_tests(true).await;
        let body = Bytes::from(order_event("ORD-1", "ready", 1_735_700_000));

        let mut headers = HeaderMap::new();
        headers.insert("clover-signature", "!!garbage!!".parse().unwrap());

        let response = handle_webhook(State(state), headers, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_signature_is_unauthorized() {
        let state = AppState::for_tests(true).await;
        let body = order_event("ORD-1", "ready", 1_735_700_000);

        let mut headers = HeaderMap::new();
        headers.insert("clover-signature", sign_hex(&body, "wrong-secret").parse().unwrap());

        let response = handle_webhook(State(state), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn alternate_header_name_is_accepted() {
        let state = AppState::for_tests(true).await;
        db::orders::create(&state.pool, "ORD-1", OrderStatus::Received).await.unwrap();
        let body = order_event("ORD-1", "ready", 1_735_700_000);

        let mut headers = HeaderMap::new();
        headers.insert("x-clover-auth", sign_hex(&body, "abc123").parse().unwrap());

        let response = handle_webhook(State(state), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn valid_event_moves_the_order() {
        let state = AppState::for_tests(true).await;
        let order = db::orders::create(&state.pool, "ORD-20250101-AAAA", OrderStatus::Received)
            .await
            .unwrap();

        let body = order_event("ORD-20250101-AAAA", "in_progress", 1_735_700_000);
        let headers = signed_headers(&body);

        let response = handle_webhook(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let updated = db::orders::find_by_id(&state.pool, order.id).await.unwrap().unwrap();
        assert_eq!(updated.status, OrderStatus::InProgress);
        // Epoch seconds from the wire, millis in storage.
        assert_eq!(updated.status_changed_at, 1_735_700_000_000);
        assert_eq!(updated.clover_order_id.as_deref(), Some("CLV-1"));

        let trail = db::orders::history(&state.pool, order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].actor.as_deref(), Some("Alice"));

        let employee = db::employees::find_by_clover_id(&state.pool, "EMP-7").await.unwrap();
        assert!(employee.is_some());
    }

    #[tokio::test]
    async fn unknown_order_is_acknowledged_without_writes() {
        let state = AppState::for_tests(true).await;

        let body = order_event("ORD-999999", "ready", 1_735_700_000);
        let headers = signed_headers(&body);

        let response = handle_webhook(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_status_history")
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(history, 0);
    }

    #[tokio::test]
    async fn non_order_events_are_acknowledged() {
        let state = AppState::for_tests(true).await;
        let body = serde_json::to_vec(&json!({ "type": "PAYMENT_PROCESSED", "ts": 1_735_700_000 })).unwrap();
        let headers = signed_headers(&body);

        let response = handle_webhook(State(state), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unmapped_state_is_acknowledged() {
        let state = AppState::for_tests(true).await;
        db::orders::create(&state.pool, "ORD-1", OrderStatus::Received).await.unwrap();

        let body = order_event("ORD-1", "paid", 1_735_700_000);
        let headers = signed_headers(&body);

        let response = handle_webhook(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let order = db::orders::find_by_code(&state.pool, "ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Received);
    }

    #[tokio::test]
    async fn webhook_location_id_is_adopted() {
        let state = AppState::for_tests(true).await;
        db::orders::create(&state.pool, "ORD-1", OrderStatus::Received).await.unwrap();

        let body = order_event("ORD-1", "ready", 1_735_700_000);
        let headers = signed_headers(&body);
        handle_webhook(State(state.clone()), headers, Bytes::from(body)).await;

        let setting = db::settings::get(&state.pool, LOCATION_SETTING_KEY).await.unwrap().unwrap();
        assert_eq!(setting.value, "LOC-1");
    }
}
