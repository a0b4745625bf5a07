use crate::application::orchestrator::PaymentOrchestrator;
use crate::domain::order::OrderId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long an admin notice stays available before it is dropped unread.
pub const NOTICE_TTL: Duration = Duration::from_secs(60);

/// Where to send the shopper after the return callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRedirect {
    pub location: String,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A one-shot message for the admin who triggered an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Routes inbound callbacks and admin actions to the orchestrator.
pub struct GatewayController {
    orchestrator: Arc<PaymentOrchestrator>,
    notices: Mutex<HashMap<String, (Notice, Instant)>>,
    notice_ttl: Duration,
}

impl GatewayController {
    pub fn new(orchestrator: Arc<PaymentOrchestrator>) -> Self {
        Self::with_notice_ttl(orchestrator, NOTICE_TTL)
    }

    pub fn with_notice_ttl(orchestrator: Arc<PaymentOrchestrator>, notice_ttl: Duration) -> Self {
        Self {
            orchestrator,
            notices: Mutex::new(HashMap::new()),
            notice_ttl,
        }
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    /// Handles the shopper's return from the hosted page.
    ///
    /// `params` is the raw query mapping; `order_id` and `RETURNMAC` are read from it
    /// and any other processor parameters are ignored.
    pub async fn handle_callback(&self, params: &HashMap<String, String>) -> CustomerRedirect {
        let order_id = params
            .get("order_id")
            .and_then(|raw| raw.trim().parse::<OrderId>().ok());
        let return_token = params.get("RETURNMAC").map(String::as_str).unwrap_or("");

        let redirect = self.orchestrator.handle_return(order_id, return_token).await;
        CustomerRedirect {
            location: redirect.location().to_string(),
            notice: redirect.notice().map(str::to_string),
        }
    }

    /// Captures the order's authorized payment and leaves the result as a notice
    /// for `user_id`.
    pub async fn capture_order(&self, order_id: OrderId, user_id: &str) -> Notice {
        let notice = match self.orchestrator.capture_payment(order_id, None).await {
            Ok(receipt) => Notice {
                kind: NoticeKind::Success,
                message: format!(
                    "Payment captured successfully. Capture ID: {}",
                    receipt.capture_id
                ),
            },
            Err(e) => Notice {
                kind: NoticeKind::Error,
                message: format!("Capture failed: {e}"),
            },
        };

        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        notices.insert(user_id.to_string(), (notice.clone(), Instant::now()));
        notice
    }

    /// Returns and forgets the pending notice for `user_id`, if it has not expired.
    pub fn take_notice(&self, user_id: &str) -> Option<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        let (notice, stored_at) = notices.remove(user_id)?;
        if stored_at.elapsed() > self.notice_ttl {
            debug!(user_id, "Dropping expired notice");
            return None;
        }
        Some(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialSet, GatewayConfig};
    use crate::domain::order::{Order, OrderStatus};
    use crate::domain::ports::OrderStore;
    use crate::domain::processor::StatusReport;
    use crate::infrastructure::audit_log::RingBufferAuditLog;
    use crate::infrastructure::in_memory::InMemoryOrderStore;
    use crate::infrastructure::scripted::ScriptedPaymentClient;
    use rust_decimal_macros::dec;

    fn config() -> GatewayConfig {
        GatewayConfig {
            test: CredentialSet {
                merchant_id: "merchant".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            ..Default::default()
        }
    }

    async fn controller_with(
        order: Order,
        ttl: Duration,
    ) -> (GatewayController, InMemoryOrderStore, ScriptedPaymentClient) {
        let store = InMemoryOrderStore::new();
        store.insert(order).await;
        let client = ScriptedPaymentClient::new();
        let orchestrator = PaymentOrchestrator::new(
            config(),
            Box::new(store.clone()),
            Box::new(client.clone()),
            Box::new(RingBufferAuditLog::new()),
        );
        (
            GatewayController::with_notice_ttl(Arc::new(orchestrator), ttl),
            store,
            client,
        )
    }

    fn authorized_order() -> Order {
        let mut order = Order::new(11, dec!(30.00), "AUD");
        order.status = OrderStatus::OnHold;
        order.record_authorization("pay_11");
        order
    }

    #[tokio::test]
    async fn test_capture_notice_is_consumed_once() {
        let (controller, store, client) = controller_with(authorized_order(), NOTICE_TTL).await;
        client.push_capture(Ok(StatusReport::new("cap_11", "CAPTURED", 9)));

        let notice = controller.capture_order(11, "admin").await;
        assert_eq!(notice.kind, NoticeKind::Success);
        assert!(notice.message.contains("cap_11"));

        assert_eq!(controller.take_notice("admin"), Some(notice));
        assert_eq!(controller.take_notice("admin"), None);
        assert_eq!(controller.take_notice("someone-else"), None);

        let order = store.load(11).await.unwrap().unwrap();
        assert!(order.captured);
    }

    #[tokio::test]
    async fn test_capture_error_becomes_notice() {
        let mut order = authorized_order();
        order.needs_capture = false;
        let (controller, _store, client) = controller_with(order, NOTICE_TTL).await;

        let notice = controller.capture_order(11, "admin").await;
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.contains("does not require capture"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_notice_is_dropped() {
        let (controller, _store, _client) = controller_with(authorized_order(), Duration::ZERO).await;
        controller.capture_order(999, "admin").await;
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(controller.take_notice("admin"), None);
    }

    #[tokio::test]
    async fn test_callback_without_order_id_goes_to_checkout() {
        let (controller, _store, client) = controller_with(authorized_order(), NOTICE_TTL).await;
        let redirect = controller.handle_callback(&HashMap::new()).await;
        assert_eq!(redirect.location, config().urls.checkout_url);
        assert_eq!(redirect.notice, None);
        assert_eq!(client.calls(), 0);
    }
}
