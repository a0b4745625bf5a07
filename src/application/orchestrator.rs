use crate::config::GatewayConfig;
use crate::domain::audit::{AuditEntry, LogLevel};
use crate::domain::callback::CallbackVerifier;
use crate::domain::messages::{
    self, CAPTURE_UNAVAILABLE, INITIATION_FAILED, REFUND_UNAVAILABLE, VERIFICATION_ERROR,
    VERIFICATION_FAILED,
};
use crate::domain::order::{Amount, Order, OrderId, OrderStatus, PaymentState};
use crate::domain::ports::{AuditSink, OrderStoreBox, PaymentClientBox};
use crate::domain::processor::StatusReport;
use crate::domain::session::PaymentSession;
use crate::domain::status::{OperationDomain, Outcome, classify};
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, warn};

/// Where the shopper goes after the return callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRedirect {
    /// The order-received page: the payment is authorized or captured.
    OrderReceived { location: String },
    /// Back to checkout, optionally with a notice to display.
    Checkout {
        location: String,
        notice: Option<String>,
    },
}

impl CallbackRedirect {
    pub fn location(&self) -> &str {
        match self {
            CallbackRedirect::OrderReceived { location } => location,
            CallbackRedirect::Checkout { location, .. } => location,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            CallbackRedirect::OrderReceived { .. } => None,
            CallbackRedirect::Checkout { notice, .. } => notice.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackRedirect::OrderReceived { .. })
    }
}

/// Instruction to send the shopper to the processor's hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub hosted_checkout_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReceipt {
    pub capture_id: String,
    pub status: String,
    pub status_code: i32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: String,
    pub status_code: i32,
    pub amount: Decimal,
    pub outcome: Outcome,
}

/// Coordinates payment initiation, return callbacks, captures and refunds.
///
/// Every operation runs load, precondition checks, at most one processor call,
/// then a single save. Nothing here retries; the order store is responsible for
/// serialising concurrent writers to the same order.
pub struct PaymentOrchestrator {
    config: GatewayConfig,
    orders: OrderStoreBox,
    client: PaymentClientBox,
    audit: Box<dyn AuditSink>,
}

impl PaymentOrchestrator {
    pub fn new(
        config: GatewayConfig,
        orders: OrderStoreBox,
        client: PaymentClientBox,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            orders,
            client,
            audit,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Writes to the tracing subscriber and the transaction log.
    fn log(&self, level: LogLevel, message: &str, context: serde_json::Value) {
        match level {
            LogLevel::Info => info!(context = %context, "{message}"),
            LogLevel::Warning => warn!(context = %context, "{message}"),
            LogLevel::Error => error!(context = %context, "{message}"),
        }
        self.audit.append(AuditEntry::new(level, message, context));
    }

    fn checkout(&self, notice: Option<&str>) -> CallbackRedirect {
        CallbackRedirect::Checkout {
            location: self.config.urls.checkout_url.clone(),
            notice: notice.map(str::to_string),
        }
    }

    fn order_received(&self, order_id: OrderId) -> CallbackRedirect {
        CallbackRedirect::OrderReceived {
            location: self.config.urls.order_received(order_id),
        }
    }

    fn ensure_available(&self, operation: &str) -> Result<()> {
        self.config.ensure_available().inspect_err(|e| {
            self.log(
                LogLevel::Error,
                &format!("{operation} blocked: gateway not available"),
                json!({ "reason": e.to_string() }),
            )
        })
    }

    async fn load_order(&self, order_id: OrderId, operation: &str) -> Result<Order> {
        let loaded = self
            .orders
            .load(order_id)
            .await
            .map_err(|e| self.store_failed(e, operation, json!({ "order_id": order_id })))?;
        match loaded {
            Some(order) => Ok(order),
            None => {
                self.log(
                    LogLevel::Error,
                    &format!("{operation} failed: order not found"),
                    json!({ "order_id": order_id }),
                );
                Err(GatewayError::OrderNotFound(order_id))
            }
        }
    }

    fn precondition_failed(&self, err: GatewayError, operation: &str, order: &Order) -> GatewayError {
        self.log(
            LogLevel::Error,
            &format!("{operation} failed: {err}"),
            json!({ "order_id": order.id }),
        );
        err
    }

    /// Logs an order store failure. `context` names whatever the processor already
    /// accepted so the order can be reconciled by hand.
    fn store_failed(
        &self,
        err: GatewayError,
        operation: &str,
        mut context: serde_json::Value,
    ) -> GatewayError {
        if let Some(fields) = context.as_object_mut() {
            fields.insert("message".into(), json!(err.to_string()));
        }
        self.log(
            LogLevel::Error,
            &format!("{operation} failed: order store error"),
            context,
        );
        err
    }

    /// Appends an order note. Notes are informational: a store error is logged and
    /// does not change the result of the operation.
    async fn try_add_note(&self, order: &Order, note: &str, operation: &str) {
        if let Err(e) = self.orders.add_note(order, note).await {
            self.log(
                LogLevel::Error,
                &format!("{operation}: could not record order note"),
                json!({ "order_id": order.id, "note": note, "message": e.to_string() }),
            );
        }
    }

    /// Whether the admin capture action should be offered for this order.
    pub async fn order_needs_capture(&self, order_id: OrderId) -> Result<bool> {
        let order = self
            .orders
            .load(order_id)
            .await
            .map_err(|e| self.store_failed(e, "Capture check", json!({ "order_id": order_id })))?;
        Ok(order.is_some_and(|order| order.needs_capture))
    }

    /// Checks the return against the stored session and yields its hosted checkout id.
    fn verify_return(order: &Order, return_token: &str) -> Result<String> {
        let hosted_checkout_id = order
            .hosted_checkout_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GatewayError::VerificationFailed("no hosted checkout ID found for order".into())
            })?;
        if !CallbackVerifier::verify(order, return_token) {
            return Err(GatewayError::VerificationFailed(
                "return token does not match".into(),
            ));
        }
        Ok(hosted_checkout_id)
    }

    /// Opens a hosted checkout session for the order and returns where to send the shopper.
    ///
    /// On failure the order is left untouched and the error carries only a generic
    /// message; processor detail goes to the log.
    pub async fn initiate(&self, order_id: OrderId) -> Result<CheckoutRedirect> {
        const OP: &str = "Payment initiation";
        self.ensure_available(OP)?;
        let mut order = self.load_order(order_id, OP).await?;

        let action = self.config.payment_action;
        let mode = action.authorization_mode();
        let session = PaymentSession::for_order(
            &order,
            action,
            self.config.urls.return_url(order_id),
            &self.config.host_locale,
            self.config.max_payment_attempts,
            self.config.template_variant.as_deref(),
        )
        .map_err(|e| self.precondition_failed(e, OP, &order))?;

        self.log(
            LogLevel::Info,
            "Initiating payment",
            json!({
                "order_id": order_id,
                "amount": order.total.to_string(),
                "currency": order.currency,
                "test_mode": self.config.test_mode,
                "authorization_mode": mode.as_str(),
                "max_attempts": session.max_payment_attempts,
                "template_variant": session.template_variant.as_deref().unwrap_or("default"),
            }),
        );

        let checkout = match self.client.create_hosted_checkout(&session).await {
            Ok(checkout) => checkout,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "Transport error during payment initiation",
                    json!({ "order_id": order_id, "message": e.to_string() }),
                );
                return Err(GatewayError::transport(INITIATION_FAILED, e));
            }
        };

        order.hosted_checkout_id = Some(checkout.hosted_checkout_id.clone());
        order.return_token = Some(checkout.return_token);
        self.orders.save(&order).await.map_err(|e| {
            self.store_failed(
                e,
                OP,
                json!({ "order_id": order_id, "hosted_checkout_id": checkout.hosted_checkout_id }),
            )
        })?;

        // The redirect URL carries session tokens, so only its host is logged.
        let redirect_host = reqwest::Url::parse(&checkout.redirect_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));
        self.log(
            LogLevel::Info,
            "Hosted checkout created",
            json!({
                "order_id": order_id,
                "hosted_checkout_id": checkout.hosted_checkout_id,
                "redirect_host": redirect_host,
            }),
        );
        self.try_add_note(
            &order,
            &format!(
                "Payment initiated. Hosted Checkout ID: {}. Mode: {}",
                checkout.hosted_checkout_id,
                mode.label()
            ),
            OP,
        )
        .await;

        Ok(CheckoutRedirect {
            hosted_checkout_id: checkout.hosted_checkout_id,
            redirect_url: checkout.redirect_url,
        })
    }

    /// Processes the shopper's return from the hosted checkout.
    ///
    /// Never fails: every path ends in a redirect, and internal errors are reduced
    /// to a generic notice. The return token is verified before anything is mutated.
    pub async fn handle_return(
        &self,
        order_id: Option<OrderId>,
        return_token: &str,
    ) -> CallbackRedirect {
        let Some(order_id) = order_id.filter(|id| *id != 0) else {
            self.log(
                LogLevel::Error,
                "Callback received without order ID",
                json!({}),
            );
            return self.checkout(None);
        };

        self.log(
            LogLevel::Info,
            "Callback received",
            json!({ "order_id": order_id, "has_return_token": !return_token.is_empty() }),
        );

        let order = match self.orders.load(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                self.log(
                    LogLevel::Error,
                    "Callback received for unknown order",
                    json!({ "order_id": order_id }),
                );
                return self.checkout(None);
            }
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "Callback could not load order",
                    json!({ "order_id": order_id, "message": e.to_string() }),
                );
                return self.checkout(Some(VERIFICATION_ERROR));
            }
        };

        // Repeated deliveries of the same callback must not fulfil twice.
        let state = order.payment_state();
        if matches!(
            state,
            PaymentState::AlreadyPaid | PaymentState::Authorized | PaymentState::Captured
        ) {
            self.log(
                LogLevel::Info,
                "Order already paid, redirecting to order received page",
                json!({ "order_id": order_id, "payment_state": format!("{state:?}") }),
            );
            return self.order_received(order_id);
        }

        let hosted_checkout_id = match Self::verify_return(&order, return_token) {
            Ok(id) => id,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    &e.to_string(),
                    json!({
                        "order_id": order_id,
                        "payment_state": format!("{state:?}"),
                        "has_stored": order.return_token.as_deref().is_some_and(|t| !t.is_empty()),
                        "has_received": !return_token.is_empty(),
                    }),
                );
                return self.checkout(Some(VERIFICATION_FAILED));
            }
        };

        let snapshot = order.clone();
        match self.reconcile(order, &hosted_checkout_id).await {
            Ok(redirect) => redirect,
            Err(e) => {
                let detail = match &e {
                    GatewayError::Transport { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                self.log(
                    LogLevel::Error,
                    "Callback processing failed",
                    json!({ "order_id": order_id, "message": detail }),
                );
                self.try_add_note(
                    &snapshot,
                    &format!("Payment verification failed: {detail}"),
                    "Callback processing",
                )
                .await;
                self.checkout(Some(VERIFICATION_ERROR))
            }
        }
    }

    async fn reconcile(&self, mut order: Order, hosted_checkout_id: &str) -> Result<CallbackRedirect> {
        let status = self
            .client
            .get_hosted_checkout_status(hosted_checkout_id)
            .await
            .map_err(|e| GatewayError::transport(VERIFICATION_ERROR, e))?;

        self.log(
            LogLevel::Info,
            "Hosted checkout status retrieved",
            json!({
                "order_id": order.id,
                "hosted_checkout_id": hosted_checkout_id,
                "status": status.status,
            }),
        );

        if status.has_payment_details() {
            match &status.payment {
                Some(payment) => return self.apply_payment(order, payment).await,
                None => self.log(
                    LogLevel::Warning,
                    "Hosted checkout reported a payment without payment details",
                    json!({ "order_id": order.id, "status": status.status }),
                ),
            }
        }

        let message = messages::checkout_status_message(&status.status);
        self.log(
            LogLevel::Warning,
            "Hosted checkout not completed",
            json!({
                "order_id": order.id,
                "status": status.status,
                "failure_reason": message,
            }),
        );
        self.orders
            .transition_status(
                &mut order,
                OrderStatus::Failed,
                &format!("Checkout not completed. Status: {}", status.status),
            )
            .await?;
        Ok(self.checkout(Some(message)))
    }

    async fn apply_payment(&self, mut order: Order, payment: &StatusReport) -> Result<CallbackRedirect> {
        let outcome = classify(payment.status_code, &payment.status, OperationDomain::Payment);
        self.log(
            LogLevel::Info,
            "Payment details retrieved",
            json!({
                "order_id": order.id,
                "payment_id": payment.id,
                "status_code": payment.status_code,
                "payment_status": payment.status,
                "outcome": outcome.to_string(),
            }),
        );

        match outcome {
            Outcome::Success { captured: false } => {
                order.record_authorization(&payment.id);
                self.orders
                    .transition_status(
                        &mut order,
                        OrderStatus::OnHold,
                        &format!(
                            "Payment authorized. Awaiting capture. Transaction ID: {}",
                            payment.id
                        ),
                    )
                    .await?;
                self.log(
                    LogLevel::Info,
                    "Payment authorized (awaiting capture)",
                    json!({
                        "order_id": order.id,
                        "payment_id": payment.id,
                        "status_code": payment.status_code,
                    }),
                );
                Ok(self.order_received(order.id))
            }
            Outcome::Success { captured: true } => {
                order.record_capture(None);
                self.orders.mark_paid(&mut order, &payment.id).await?;
                self.orders
                    .add_note(
                        &order,
                        &format!(
                            "Payment completed. Transaction ID: {}, Status Code: {}",
                            payment.id, payment.status_code
                        ),
                    )
                    .await?;
                self.log(
                    LogLevel::Info,
                    "Payment completed successfully",
                    json!({
                        "order_id": order.id,
                        "payment_id": payment.id,
                        "status_code": payment.status_code,
                    }),
                );
                Ok(self.order_received(order.id))
            }
            _ => {
                let failure = messages::payment_failure(payment);
                self.log(
                    LogLevel::Error,
                    "Payment failed",
                    json!({
                        "order_id": order.id,
                        "payment_id": payment.id,
                        "status_code": payment.status_code,
                        "payment_status": payment.status,
                        "failure_reason": failure.reason,
                        "error_code": failure.error_code,
                    }),
                );
                self.orders
                    .transition_status(
                        &mut order,
                        OrderStatus::Failed,
                        &format!(
                            "Payment failed. Status Code: {}. Reason: {}",
                            payment.status_code, failure.reason
                        ),
                    )
                    .await?;
                Ok(self.checkout(Some(&failure.customer_message)))
            }
        }
    }

    /// Captures a previously authorized payment, defaulting to the order total.
    ///
    /// A rejected capture leaves the order awaiting capture so it can be retried.
    pub async fn capture_payment(
        &self,
        order_id: OrderId,
        amount: Option<Decimal>,
    ) -> Result<CaptureReceipt> {
        const OP: &str = "Capture";
        self.ensure_available(OP)?;
        let mut order = self.load_order(order_id, OP).await?;

        if !order.needs_capture {
            return Err(self.precondition_failed(GatewayError::CaptureNotNeeded, OP, &order));
        }
        let Some(payment_id) = order.transaction_id().map(str::to_string) else {
            return Err(self.precondition_failed(GatewayError::MissingTransactionId, OP, &order));
        };
        let amount = match Amount::new(amount.unwrap_or(order.total)) {
            Ok(amount) => amount,
            Err(e) => return Err(self.precondition_failed(e, OP, &order)),
        };
        if let Some(authorized) = order.authorized_amount
            && amount.value() > authorized
        {
            let err = GatewayError::InvalidAmount(format!(
                "capture amount {amount} exceeds the authorized amount of {authorized:.2}"
            ));
            return Err(self.precondition_failed(err, OP, &order));
        }
        let minor_units = match amount.minor_units() {
            Ok(units) => units,
            Err(e) => return Err(self.precondition_failed(e, OP, &order)),
        };

        self.log(
            LogLevel::Info,
            "Processing capture",
            json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "amount": amount.to_string(),
                "currency": order.currency,
                "test_mode": self.config.test_mode,
            }),
        );

        let report = match self.client.capture_payment(&payment_id, minor_units).await {
            Ok(report) => report,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "Capture transport error",
                    json!({ "order_id": order_id, "payment_id": payment_id, "message": e.to_string() }),
                );
                self.try_add_note(
                    &order,
                    &format!("Capture failed. Amount: {amount} {}, Error: {e}", order.currency),
                    OP,
                )
                .await;
                return Err(GatewayError::transport(CAPTURE_UNAVAILABLE, e));
            }
        };

        self.log(
            LogLevel::Info,
            "Capture response received",
            json!({
                "order_id": order_id,
                "capture_id": report.id,
                "capture_status": report.status,
                "status_code": report.status_code,
            }),
        );

        let outcome = classify(report.status_code, &report.status, OperationDomain::Capture);
        if !outcome.is_accepted() {
            let message = messages::capture_error_message(&report);
            self.log(
                LogLevel::Error,
                "Capture failed",
                json!({
                    "order_id": order_id,
                    "capture_id": report.id,
                    "status_code": report.status_code,
                    "capture_status": report.status,
                    "error_message": message,
                }),
            );
            self.try_add_note(
                &order,
                &format!(
                    "Capture failed. Amount: {amount} {}, Status Code: {}, Error: {message}",
                    order.currency, report.status_code
                ),
                OP,
            )
            .await;
            return Err(GatewayError::Rejected {
                status_code: report.status_code,
                message,
            });
        }

        order.record_capture(Some(&report.id));
        let note = format!(
            "Payment captured. Capture ID: {}, Amount: {amount} {}, Status: {}",
            report.id, order.currency, report.status
        );
        let captured = json!({
            "order_id": order_id,
            "capture_id": report.id,
            "amount": amount.to_string(),
        });
        if order.status == OrderStatus::OnHold {
            self.orders
                .transition_status(&mut order, OrderStatus::Processing, &note)
                .await
                .map_err(|e| self.store_failed(e, OP, captured))?;
        } else {
            self.orders
                .save(&order)
                .await
                .map_err(|e| self.store_failed(e, OP, captured))?;
            self.try_add_note(&order, &note, OP).await;
        }

        self.log(
            LogLevel::Info,
            "Capture completed successfully",
            json!({
                "order_id": order_id,
                "capture_id": report.id,
                "amount": amount.to_string(),
                "status_code": report.status_code,
            }),
        );

        Ok(CaptureReceipt {
            capture_id: report.id,
            status: report.status,
            status_code: report.status_code,
            amount: amount.value(),
        })
    }

    /// Refunds part or all of a paid order.
    ///
    /// The cumulative guard uses the host's refunded total. Each accepted refund is
    /// added to that total through the order store before the call returns.
    pub async fn refund(&self, order_id: OrderId, amount: Decimal, reason: &str) -> Result<RefundReceipt> {
        const OP: &str = "Refund";
        self.ensure_available(OP)?;
        let mut order = self.load_order(order_id, OP).await?;

        let Some(payment_id) = order.transaction_id().map(str::to_string) else {
            return Err(self.precondition_failed(GatewayError::MissingTransactionId, OP, &order));
        };
        let amount = match Amount::new(amount) {
            Ok(amount) => amount,
            Err(e) => return Err(self.precondition_failed(e, OP, &order)),
        };

        let already_refunded = self
            .orders
            .total_already_refunded(&order)
            .await
            .map_err(|e| self.store_failed(e, OP, json!({ "order_id": order_id })))?;
        let max_refundable = order.total - already_refunded;
        if amount.value() > max_refundable {
            let err = GatewayError::InvalidAmount(format!(
                "Refund amount exceeds the maximum refundable amount of {max_refundable:.2}"
            ));
            return Err(self.precondition_failed(err, OP, &order));
        }
        let minor_units = match amount.minor_units() {
            Ok(units) => units,
            Err(e) => return Err(self.precondition_failed(e, OP, &order)),
        };

        self.log(
            LogLevel::Info,
            "Processing refund",
            json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "amount": amount.to_string(),
                "currency": order.currency,
                "reason": reason,
                "test_mode": self.config.test_mode,
            }),
        );

        let report = match self
            .client
            .refund_payment(&payment_id, minor_units, &order.currency)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "Refund transport error",
                    json!({ "order_id": order_id, "payment_id": payment_id, "message": e.to_string() }),
                );
                self.try_add_note(
                    &order,
                    &format!("Refund failed. Amount: {amount} {}, Error: {e}", order.currency),
                    OP,
                )
                .await;
                return Err(GatewayError::transport(REFUND_UNAVAILABLE, e));
            }
        };

        self.log(
            LogLevel::Info,
            "Refund response received",
            json!({
                "order_id": order_id,
                "refund_id": report.id,
                "refund_status": report.status,
                "status_code": report.status_code,
            }),
        );

        let outcome = classify(report.status_code, &report.status, OperationDomain::Refund);
        if !outcome.is_accepted() {
            let message = messages::refund_error_message(&report);
            self.log(
                LogLevel::Error,
                "Refund failed",
                json!({
                    "order_id": order_id,
                    "refund_id": report.id,
                    "status_code": report.status_code,
                    "refund_status": report.status,
                    "error_message": message,
                }),
            );
            self.try_add_note(
                &order,
                &format!(
                    "Refund failed. Amount: {amount} {}, Status Code: {}, Error: {message}",
                    order.currency, report.status_code
                ),
                OP,
            )
            .await;
            return Err(GatewayError::Rejected {
                status_code: report.status_code,
                message,
            });
        }

        let mut note = format!(
            "Refund of {amount} {} processed. Refund ID: {}, Status: {}",
            order.currency, report.id, report.status
        );
        if !reason.trim().is_empty() {
            note.push_str(&format!(" Reason: {}", reason.trim()));
        }
        let refunded = json!({
            "order_id": order_id,
            "refund_id": report.id,
            "amount": amount.to_string(),
        });
        // The refund guard reads this total.
        self.orders
            .record_refund(&order, amount.value())
            .await
            .map_err(|e| self.store_failed(e, OP, refunded.clone()))?;
        order.refund_ids.push(report.id.clone());
        self.orders
            .save(&order)
            .await
            .map_err(|e| self.store_failed(e, OP, refunded))?;
        self.try_add_note(&order, &note, OP).await;

        self.log(
            LogLevel::Info,
            "Refund completed successfully",
            json!({
                "order_id": order_id,
                "refund_id": report.id,
                "amount": amount.to_string(),
                "status_code": report.status_code,
            }),
        );

        Ok(RefundReceipt {
            refund_id: report.id,
            status: report.status,
            status_code: report.status_code,
            amount: amount.value(),
            outcome,
        })
    }
}
