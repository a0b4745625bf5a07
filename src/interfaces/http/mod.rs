//! HTTP surface for the return callback and the admin capture action.

use crate::application::controller::GatewayController;
use crate::domain::order::OrderId;
use axum::{Json, Router};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Identifies the admin a notice belongs to. It is not a credential.
pub const USER_HEADER: &str = "x-user-id";

/// Builds the gateway routes.
///
/// The `/admin` routes do not authenticate anyone: they must be mounted behind the
/// host's authenticated admin surface, which is expected to set `x-user-id` from
/// the session and strip any value sent by the client. Only
/// `/checkout/callback` may be exposed to shoppers.
pub fn router(controller: Arc<GatewayController>) -> Router {
    Router::new()
        .route("/checkout/callback", get(checkout_callback))
        .route("/admin/orders/:id/capture", post(capture_order))
        .route("/admin/notices", get(take_notice))
        .with_state(controller)
}

/// Appends the notice as a query parameter so the checkout page can show it.
fn with_notice(location: &str, notice: Option<&str>) -> String {
    let Some(notice) = notice else {
        return location.to_string();
    };
    match Url::parse(location) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("notice", notice);
            url.to_string()
        }
        Err(_) => location.to_string(),
    }
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
}

async fn checkout_callback(
    State(controller): State<Arc<GatewayController>>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    let redirect = controller.handle_callback(&params).await;
    Redirect::to(&with_notice(&redirect.location, redirect.notice.as_deref()))
}

async fn capture_order(
    State(controller): State<Arc<GatewayController>>,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = user_id(&headers) else {
        return (StatusCode::UNAUTHORIZED, "missing x-user-id header").into_response();
    };
    let notice = controller.capture_order(order_id, user).await;
    info!(order_id, user, kind = ?notice.kind, "Admin capture action handled");
    Redirect::to(&format!("/admin/orders/{order_id}")).into_response()
}

async fn take_notice(
    State(controller): State<Arc<GatewayController>>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = user_id(&headers) else {
        return (StatusCode::UNAUTHORIZED, "missing x-user-id header").into_response();
    };
    match controller.take_notice(user) {
        Some(notice) => Json(notice).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::PaymentOrchestrator;
    use crate::config::{CredentialSet, GatewayConfig};
    use crate::domain::messages::VERIFICATION_FAILED;
    use crate::domain::order::{Order, OrderStatus};
    use crate::domain::processor::StatusReport;
    use crate::infrastructure::audit_log::RingBufferAuditLog;
    use crate::infrastructure::in_memory::InMemoryOrderStore;
    use crate::infrastructure::scripted::ScriptedPaymentClient;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    async fn app(orders: Vec<Order>) -> (Router, ScriptedPaymentClient) {
        let store = InMemoryOrderStore::new();
        for order in orders {
            store.insert(order).await;
        }
        let client = ScriptedPaymentClient::new();
        let config = GatewayConfig {
            test: CredentialSet {
                merchant_id: "merchant".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            ..Default::default()
        };
        let orchestrator = PaymentOrchestrator::new(
            config,
            Box::new(store),
            Box::new(client.clone()),
            Box::new(RingBufferAuditLog::new()),
        );
        let controller = GatewayController::new(Arc::new(orchestrator));
        (router(Arc::new(controller)), client)
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_with_notice_encodes_query() {
        assert_eq!(
            with_notice("https://shop.test/checkout", Some("Try again.")),
            "https://shop.test/checkout?notice=Try+again."
        );
        assert_eq!(
            with_notice("https://shop.test/checkout?step=2", Some("x")),
            "https://shop.test/checkout?step=2&notice=x"
        );
        assert_eq!(with_notice("/checkout", None), "/checkout");
    }

    #[tokio::test]
    async fn test_callback_with_bad_token_redirects_to_checkout() {
        let mut order = Order::new(21, dec!(50.00), "AUD");
        order.hosted_checkout_id = Some("hc_21".into());
        order.return_token = Some("expected".into());
        let (app, client) = app(vec![order]).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/checkout/callback?order_id=21&RETURNMAC=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let expected = with_notice("http://127.0.0.1:8080/checkout", Some(VERIFICATION_FAILED));
        assert_eq!(location(&response), expected);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_capture_then_read_notice() {
        let mut order = Order::new(22, dec!(80.00), "AUD");
        order.status = OrderStatus::OnHold;
        order.record_authorization("pay_22");
        let (app, client) = app(vec![order]).await;
        client.push_capture(Ok(StatusReport::new("cap_22", "CAPTURED", 9)));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/orders/22/capture")
                    .header(USER_HEADER, "admin-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/orders/22");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/notices")
                    .header(USER_HEADER, "admin-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let notice: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(notice["kind"], "success");
        assert!(notice["message"].as_str().unwrap().contains("cap_22"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/notices")
                    .header(USER_HEADER, "admin-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_capture_requires_user() {
        let (app, client) = app(Vec::new()).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/orders/1/capture")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(client.calls(), 0);
    }
}
