use crate::domain::order::Order;
use subtle::ConstantTimeEq;

/// Authenticates a return callback against the token stored at session creation.
///
/// Fails closed: an empty stored or received token never verifies.
pub struct CallbackVerifier;

impl CallbackVerifier {
    pub fn verify(order: &Order, received_token: &str) -> bool {
        let stored = order.return_token.as_deref().unwrap_or_default();
        tokens_match(stored, received_token)
    }
}

fn tokens_match(stored: &str, received: &str) -> bool {
    if stored.is_empty() || received.is_empty() {
        return false;
    }
    // ct_eq on slices of different length returns false without inspecting contents.
    stored.as_bytes().ct_eq(received.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_with_token(token: Option<&str>) -> Order {
        let mut order = Order::new(1, dec!(10.0), "AUD");
        order.return_token = token.map(str::to_string);
        order
    }

    #[test]
    fn test_matching_token_verifies() {
        let order = order_with_token(Some("f3a1c9e0-returnmac"));
        assert!(CallbackVerifier::verify(&order, "f3a1c9e0-returnmac"));
    }

    #[test]
    fn test_mismatch_is_rejected() {
        let order = order_with_token(Some("f3a1c9e0-returnmac"));
        assert!(!CallbackVerifier::verify(&order, "f3a1c9e0-returnmaC"));
        assert!(!CallbackVerifier::verify(&order, "f3a1c9e0"));
        assert!(!CallbackVerifier::verify(&order, "f3a1c9e0-returnmac "));
    }

    #[test]
    fn test_empty_tokens_fail_closed() {
        assert!(!CallbackVerifier::verify(&order_with_token(None), ""));
        assert!(!CallbackVerifier::verify(&order_with_token(None), "anything"));
        assert!(!CallbackVerifier::verify(&order_with_token(Some("")), ""));
        assert!(!CallbackVerifier::verify(&order_with_token(Some("secret")), ""));
    }
}
