#![allow(dead_code)]

use checkout_gateway::application::orchestrator::PaymentOrchestrator;
use checkout_gateway::config::{CredentialSet, GatewayConfig};
use checkout_gateway::domain::order::{Order, OrderStatus};
use checkout_gateway::domain::processor::{HostedCheckout, HostedCheckoutStatus, StatusReport};
use checkout_gateway::domain::session::PaymentAction;
use checkout_gateway::infrastructure::audit_log::RingBufferAuditLog;
use checkout_gateway::infrastructure::in_memory::InMemoryOrderStore;
use checkout_gateway::infrastructure::scripted::ScriptedPaymentClient;

pub struct Harness {
    pub orchestrator: PaymentOrchestrator,
    pub store: InMemoryOrderStore,
    pub client: ScriptedPaymentClient,
    pub audit: RingBufferAuditLog,
}

pub fn config(action: PaymentAction) -> GatewayConfig {
    GatewayConfig {
        payment_action: action,
        test: CredentialSet {
            merchant_id: "merchant".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
        },
        ..Default::default()
    }
}

pub async fn harness_with(config: GatewayConfig, orders: Vec<Order>) -> Harness {
    let store = InMemoryOrderStore::new();
    for order in orders {
        store.insert(order).await;
    }
    let client = ScriptedPaymentClient::new();
    let audit = RingBufferAuditLog::new();
    let orchestrator = PaymentOrchestrator::new(
        config,
        Box::new(store.clone()),
        Box::new(client.clone()),
        Box::new(audit.clone()),
    );
    Harness {
        orchestrator,
        store,
        client,
        audit,
    }
}

pub async fn harness(action: PaymentAction, orders: Vec<Order>) -> Harness {
    harness_with(config(action), orders).await
}

pub fn checkout(id: &str, token: &str) -> HostedCheckout {
    HostedCheckout {
        hosted_checkout_id: id.to_string(),
        return_token: token.to_string(),
        redirect_url: format!("https://payment.preprod.anzworldline-solutions.com.au/hostedcheckout/{id}"),
    }
}

pub fn finished(payment: StatusReport) -> HostedCheckoutStatus {
    HostedCheckoutStatus {
        status: "PAYMENT_CREATED".to_string(),
        payment: Some(payment),
    }
}

/// An order whose hosted checkout was opened and is waiting for the shopper to return.
pub fn awaiting_return(id: u64, total: rust_decimal::Decimal, token: &str) -> Order {
    let mut order = Order::new(id, total, "AUD");
    order.hosted_checkout_id = Some(format!("hc_{id}"));
    order.return_token = Some(token.to_string());
    order
}

/// An order paid with immediate capture.
pub fn paid(id: u64, total: rust_decimal::Decimal) -> Order {
    let mut order = Order::new(id, total, "AUD");
    order.status = OrderStatus::Processing;
    order.transaction_id = Some(format!("pay_{id}"));
    order.captured = true;
    order
}
