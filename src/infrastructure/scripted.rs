use crate::domain::ports::PaymentClient;
use crate::domain::processor::{HostedCheckout, HostedCheckoutStatus, StatusReport};
use crate::domain::session::PaymentSession;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Reply<T> = Result<T, TransportError>;

#[derive(Default)]
struct Script {
    checkouts: VecDeque<Reply<HostedCheckout>>,
    statuses: VecDeque<Reply<HostedCheckoutStatus>>,
    captures: VecDeque<Reply<StatusReport>>,
    refunds: VecDeque<Reply<StatusReport>>,
    sessions: Vec<PaymentSession>,
    amounts: Vec<i64>,
}

/// A processor stand-in that replays queued replies and counts remote calls.
///
/// An operation with nothing queued fails with [`TransportError::Unsupported`].
#[derive(Clone, Default)]
pub struct ScriptedPaymentClient {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedPaymentClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut script)
    }

    pub fn push_checkout(&self, reply: Reply<HostedCheckout>) -> &Self {
        self.with_script(|s| s.checkouts.push_back(reply));
        self
    }

    pub fn push_status(&self, reply: Reply<HostedCheckoutStatus>) -> &Self {
        self.with_script(|s| s.statuses.push_back(reply));
        self
    }

    pub fn push_capture(&self, reply: Reply<StatusReport>) -> &Self {
        self.with_script(|s| s.captures.push_back(reply));
        self
    }

    pub fn push_refund(&self, reply: Reply<StatusReport>) -> &Self {
        self.with_script(|s| s.refunds.push_back(reply));
        self
    }

    /// Total remote calls made, whatever their outcome.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<PaymentSession> {
        self.with_script(|s| s.sessions.clone())
    }

    /// Minor-unit amounts sent with capture and refund calls, in call order.
    pub fn amounts(&self) -> Vec<i64> {
        self.with_script(|s| s.amounts.clone())
    }

    fn next<T>(queue: &mut VecDeque<Reply<T>>, operation: &str) -> Reply<T> {
        queue
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unsupported(format!("no scripted {operation} reply"))))
    }
}

#[async_trait]
impl PaymentClient for ScriptedPaymentClient {
    async fn create_hosted_checkout(&self, session: &PaymentSession) -> Reply<HostedCheckout> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.with_script(|s| {
            s.sessions.push(session.clone());
            Self::next(&mut s.checkouts, "checkout")
        })
    }

    async fn get_hosted_checkout_status(&self, _hosted_checkout_id: &str) -> Reply<HostedCheckoutStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.with_script(|s| Self::next(&mut s.statuses, "status"))
    }

    async fn capture_payment(&self, _payment_id: &str, amount_minor_units: i64) -> Reply<StatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.with_script(|s| {
            s.amounts.push(amount_minor_units);
            Self::next(&mut s.captures, "capture")
        })
    }

    async fn refund_payment(
        &self,
        _payment_id: &str,
        amount_minor_units: i64,
        _currency: &str,
    ) -> Reply<StatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.with_script(|s| {
            s.amounts.push(amount_minor_units);
            Self::next(&mut s.refunds, "refund")
        })
    }
}
