//! HTTPS client for the hosted-checkout processor API.
//!
//! Requests are JSON over `reqwest`, authenticated with the processor's v1HMAC
//! scheme. Every call is a single attempt: retries are a caller decision.

use crate::config::Credentials;
use crate::domain::ports::PaymentClient;
use crate::domain::processor::{ApiError, HostedCheckout, HostedCheckoutStatus, StatusReport};
use crate::domain::session::PaymentSession;
use crate::error::TransportError;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const CONTENT_TYPE_JSON: &str = "application/json";

pub struct WorldlineClient {
    credentials: Credentials,
    client: Client,
}

impl WorldlineClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("checkout-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            credentials,
            client,
        })
    }

    fn merchant_path(&self, suffix: &str) -> String {
        format!("/v2/{}{}", self.credentials.merchant_id, suffix)
    }

    async fn send<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let date = http_date();
        let content_type = if body.is_some() { CONTENT_TYPE_JSON } else { "" };
        let signature = sign(
            &self.credentials.api_secret,
            method.as_str(),
            content_type,
            &date,
            path,
        )?;

        let url = format!("{}{}", self.credentials.endpoint.trim_end_matches('/'), path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Date", &date)
            .header(
                "Authorization",
                format!("GCS v1HMAC:{}:{}", self.credentials.api_key, signature),
            );
        if let Some(body) = body {
            request = request.header("Content-Type", content_type).json(body);
        }

        debug!(%method, path, "sending processor request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(%method, path, status = status.as_u16(), "processor request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Base64 HMAC-SHA256 over the method, content type, date and path, each newline terminated.
pub fn sign(
    secret: &str,
    method: &str,
    content_type: &str,
    date: &str,
    path: &str,
) -> Result<String, TransportError> {
    let string_to_hash = format!("{method}\n{content_type}\n{date}\n{path}\n");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TransportError::Unsupported(format!("invalid signing key: {e}")))?;
    mac.update(string_to_hash.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn create_checkout_body(session: &PaymentSession) -> serde_json::Value {
    let mut hosted = json!({
        "returnUrl": session.return_url,
        "locale": session.locale,
        "allowedNumberOfPaymentAttempts": session.max_payment_attempts,
    });
    if let Some(variant) = &session.template_variant {
        hosted["variant"] = serde_json::Value::String(variant.clone());
    }

    json!({
        "order": {
            "amountOfMoney": {
                "amount": session.amount_minor_units,
                "currencyCode": session.currency,
            }
        },
        "hostedCheckoutSpecificInput": hosted,
        "cardPaymentMethodSpecificInput": {
            "authorizationMode": session.authorization_mode.as_str(),
        },
    })
}

#[async_trait]
impl PaymentClient for WorldlineClient {
    async fn create_hosted_checkout(
        &self,
        session: &PaymentSession,
    ) -> Result<HostedCheckout, TransportError> {
        let body = create_checkout_body(session);
        let response: CreateHostedCheckoutResponse = self
            .send(Method::POST, &self.merchant_path("/hostedcheckouts"), Some(&body))
            .await?;
        Ok(HostedCheckout {
            hosted_checkout_id: response.hosted_checkout_id,
            return_token: response.return_mac,
            redirect_url: response.redirect_url,
        })
    }

    async fn get_hosted_checkout_status(
        &self,
        hosted_checkout_id: &str,
    ) -> Result<HostedCheckoutStatus, TransportError> {
        let path = self.merchant_path(&format!("/hostedcheckouts/{hosted_checkout_id}"));
        let response: GetHostedCheckoutResponse = self.send(Method::GET, &path, None).await?;
        Ok(response.into())
    }

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount_minor_units: i64,
    ) -> Result<StatusReport, TransportError> {
        let path = self.merchant_path(&format!("/payments/{payment_id}/capture"));
        let body = json!({ "amount": amount_minor_units });
        let response: WirePayment = self.send(Method::POST, &path, Some(&body)).await?;
        Ok(response.into())
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<StatusReport, TransportError> {
        let path = self.merchant_path(&format!("/payments/{payment_id}/refund"));
        let body = json!({
            "amountOfMoney": {
                "amount": amount_minor_units,
                "currencyCode": currency,
            }
        });
        let response: WirePayment = self.send(Method::POST, &path, Some(&body)).await?;
        Ok(response.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateHostedCheckoutResponse {
    hosted_checkout_id: String,
    #[serde(rename = "RETURNMAC")]
    return_mac: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetHostedCheckoutResponse {
    status: String,
    #[serde(default)]
    created_payment_output: Option<CreatedPaymentOutput>,
}

#[derive(Debug, Deserialize)]
struct CreatedPaymentOutput {
    #[serde(default)]
    payment: Option<WirePayment>,
}

// Payment, capture and refund responses share this shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayment {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_output: Option<WireStatusOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatusOutput {
    #[serde(default)]
    status_code: Option<i32>,
    #[serde(default)]
    errors: Vec<WireApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireApiError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<WirePayment> for StatusReport {
    fn from(payment: WirePayment) -> Self {
        let (status_code, errors) = match payment.status_output {
            Some(output) => (
                output.status_code.unwrap_or(0),
                output
                    .errors
                    .into_iter()
                    .map(|e| ApiError {
                        error_code: e.error_code,
                        id: e.id,
                        message: e.message,
                    })
                    .collect(),
            ),
            None => (0, Vec::new()),
        };
        StatusReport {
            id: payment.id,
            status: payment.status.unwrap_or_default(),
            status_code,
            errors,
        }
    }
}

impl From<GetHostedCheckoutResponse> for HostedCheckoutStatus {
    fn from(response: GetHostedCheckoutResponse) -> Self {
        HostedCheckoutStatus {
            status: response.status,
            payment: response
                .created_payment_output
                .and_then(|output| output.payment)
                .map(StatusReport::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::AuthorizationMode;
    use base64::Engine as _;

    #[test]
    fn test_signature_is_verifiable_with_secret() {
        let date = "Fri, 06 Jun 2025 10:00:00 GMT";
        let path = "/v2/merchant/hostedcheckouts";
        let signature = sign("secret", "POST", CONTENT_TYPE_JSON, date, path).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(format!("POST\napplication/json\n{date}\n{path}\n").as_bytes());
        let raw = STANDARD.decode(&signature).unwrap();
        assert!(mac.verify_slice(&raw).is_ok());
    }

    #[test]
    fn test_signature_depends_on_every_component() {
        let base = sign("secret", "GET", "", "d", "/p").unwrap();
        assert_ne!(base, sign("other", "GET", "", "d", "/p").unwrap());
        assert_ne!(base, sign("secret", "POST", "", "d", "/p").unwrap());
        assert_ne!(base, sign("secret", "GET", "", "e", "/p").unwrap());
        assert_ne!(base, sign("secret", "GET", "", "d", "/q").unwrap());
    }

    #[test]
    fn test_create_checkout_body() {
        let session = PaymentSession {
            amount_minor_units: 10000,
            currency: "AUD".into(),
            authorization_mode: AuthorizationMode::FinalAuthorization,
            return_url: "https://shop.test/cb?order_id=1".into(),
            locale: "en_AU".into(),
            max_payment_attempts: 3,
            template_variant: Some("Brand".into()),
        };
        let body = create_checkout_body(&session);
        assert_eq!(body["order"]["amountOfMoney"]["amount"], 10000);
        assert_eq!(body["order"]["amountOfMoney"]["currencyCode"], "AUD");
        assert_eq!(
            body["cardPaymentMethodSpecificInput"]["authorizationMode"],
            "FINAL_AUTHORIZATION"
        );
        assert_eq!(body["hostedCheckoutSpecificInput"]["variant"], "Brand");
        assert_eq!(
            body["hostedCheckoutSpecificInput"]["allowedNumberOfPaymentAttempts"],
            3
        );
    }

    #[test]
    fn test_body_omits_empty_variant() {
        let session = PaymentSession {
            amount_minor_units: 1,
            currency: "AUD".into(),
            authorization_mode: AuthorizationMode::Sale,
            return_url: String::new(),
            locale: "en_AU".into(),
            max_payment_attempts: 1,
            template_variant: None,
        };
        let body = create_checkout_body(&session);
        assert!(body["hostedCheckoutSpecificInput"].get("variant").is_none());
    }

    #[test]
    fn test_decode_checkout_created() {
        let raw = r#"{"hostedCheckoutId":"hc_1","RETURNMAC":"mac","redirectUrl":"https://pay.test/x","merchantReference":"r"}"#;
        let response: CreateHostedCheckoutResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.hosted_checkout_id, "hc_1");
        assert_eq!(response.return_mac, "mac");
    }

    #[test]
    fn test_decode_checkout_status_with_payment() {
        let raw = r#"{
            "status": "PAYMENT_CREATED",
            "createdPaymentOutput": {
                "payment": {
                    "id": "pay_1",
                    "status": "REJECTED",
                    "statusOutput": {
                        "statusCode": 2,
                        "errors": [{"errorCode": "30511001", "message": "Declined"}]
                    }
                }
            }
        }"#;
        let response: GetHostedCheckoutResponse = serde_json::from_str(raw).unwrap();
        let status = HostedCheckoutStatus::from(response);
        assert!(status.has_payment_details());
        let payment = status.payment.unwrap();
        assert_eq!(payment.id, "pay_1");
        assert_eq!(payment.status_code, 2);
        assert_eq!(payment.errors[0].message.as_deref(), Some("Declined"));
    }

    #[test]
    fn test_decode_checkout_status_without_payment() {
        let raw = r#"{"status": "CANCELLED_BY_CONSUMER"}"#;
        let response: GetHostedCheckoutResponse = serde_json::from_str(raw).unwrap();
        let status = HostedCheckoutStatus::from(response);
        assert_eq!(status.status, "CANCELLED_BY_CONSUMER");
        assert!(status.payment.is_none());
    }

    #[test]
    fn test_missing_status_output_defaults_to_zero() {
        let payment: WirePayment = serde_json::from_str(r#"{"id":"c1","status":"CAPTURED"}"#).unwrap();
        let report = StatusReport::from(payment);
        assert_eq!(report.status_code, 0);
        assert_eq!(report.status, "CAPTURED");
    }
}
