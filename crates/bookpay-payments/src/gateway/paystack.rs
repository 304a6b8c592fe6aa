//! # Paystack Adapter
//!
//! ## Wire Contract
//! ```text
//! POST /transaction/initialize       amount in minor units (kobo)
//!      { email, amount, currency, reference, callback_url, metadata,
//!        subaccount?, transaction_charge?, bearer? }
//!   ◄─ { status: true, data: { authorization_url, access_code, reference } }
//!
//! GET  /transaction/verify/:reference
//!   ◄─ { status: true, data: { id, status, amount, paid_at, ... } }
//!
//! Webhook: x-paystack-signature = hex(HMAC-SHA512(secret_key, raw body))
//!          charge.success → Success, charge.failed → Failed, others ignored
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    base_url, metadata_from_value, parse_timestamp, read_json, signature, InitRequest,
    InitResponse, PaymentGateway, VerifyResponse, WebhookEvent,
};
use crate::config::GatewaySettings;
use crate::error::{PaymentError, PaymentResult};
use bookpay_core::{GatewayName, Money, PaymentOutcome};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

const NAME: GatewayName = GatewayName::Paystack;

/// Maps a Paystack transaction status onto an outcome.
pub fn outcome_from_status(status: &str) -> PaymentOutcome {
    match status {
        "success" => PaymentOutcome::Success,
        "failed" | "reversed" | "abandoned" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Pending,
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    authorization_url: String,
    #[serde(default)]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    customer: Option<CustomerData>,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: String,
    data: TransactionData,
}

/// Provider ids come back as numbers; keep them as strings.
fn id_string(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> PaymentResult<T> {
    if !envelope.status {
        return Err(PaymentError::gateway(
            NAME,
            envelope.message.unwrap_or_else(|| "request rejected".into()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| PaymentError::gateway(NAME, "response has no data"))
}

// =============================================================================
// Webhook Parsing
// =============================================================================

/// Parses a Paystack webhook body.
pub fn parse_webhook(body: &[u8]) -> PaymentResult<WebhookEvent> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| PaymentError::malformed(NAME, e))?;
    let parsed: WebhookBody =
        serde_json::from_value(raw.clone()).map_err(|e| PaymentError::malformed(NAME, e))?;
    let data = parsed.data;

    let reference = data
        .reference
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PaymentError::malformed(NAME, "data.reference is missing"))?;

    let outcome = match parsed.event.as_str() {
        "charge.success" => Some(PaymentOutcome::Success),
        "charge.failed" => Some(PaymentOutcome::Failed),
        _ => None,
    };

    let (customer_email, customer_name, customer_phone) = match data.customer {
        Some(c) => {
            let name = match (c.first_name, c.last_name) {
                (Some(f), Some(l)) => Some(format!("{f} {l}").trim().to_string()),
                (Some(f), None) => Some(f),
                (None, Some(l)) => Some(l),
                (None, None) => None,
            }
            .filter(|n| !n.is_empty());
            (c.email, name, c.phone)
        }
        None => (None, None, None),
    };

    Ok(WebhookEvent {
        gateway: NAME,
        event: parsed.event,
        reference,
        outcome,
        amount: data.amount.map(Money::from_minor),
        currency: data.currency,
        customer_email,
        customer_name,
        customer_phone,
        provider_transaction_id: id_string(data.id.as_ref()),
        paid_at: parse_timestamp(data.paid_at.as_deref()),
        metadata: metadata_from_value(NAME, data.metadata.as_ref()),
        raw,
    })
}

// =============================================================================
// Gateway
// =============================================================================

/// Paystack over HTTPS.
#[derive(Debug, Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    base_url: url::Url,
}

impl PaystackGateway {
    pub fn new(client: reqwest::Client, secret_key: impl Into<String>, base: &str) -> PaymentResult<Self> {
        Ok(PaystackGateway {
            client,
            secret_key: secret_key.into(),
            webhook_secret: None,
            base_url: base_url(NAME, base)?,
        })
    }

    pub fn from_settings(client: reqwest::Client, settings: &GatewaySettings) -> PaymentResult<Self> {
        let secret_key = settings
            .secret_key
            .clone()
            .ok_or(PaymentError::GatewayNotConfigured(NAME))?;
        let mut gateway = Self::new(
            client,
            secret_key,
            settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        )?;
        gateway.webhook_secret = settings.webhook_secret.clone();
        Ok(gateway)
    }

    fn endpoint(&self, segments: &[&str]) -> PaymentResult<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PaymentError::InvalidConfig("paystack base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Paystack signs webhooks with the secret key unless a dedicated
    /// secret is configured.
    fn signing_secret(&self) -> PaymentResult<&str> {
        let secret = self.webhook_secret.as_deref().unwrap_or(&self.secret_key);
        if secret.trim().is_empty() {
            return Err(PaymentError::MissingWebhookSecret(NAME));
        }
        Ok(secret)
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn name(&self) -> GatewayName {
        NAME
    }

    async fn initialize(&self, request: &InitRequest) -> PaymentResult<InitResponse> {
        let mut body = json!({
            "email": request.email,
            "amount": request.amount.minor(),
            "currency": request.currency,
            "reference": request.reference,
            "metadata": request.metadata,
        });
        if let Some(callback) = &request.redirect_url {
            body["callback_url"] = json!(callback);
        }
        if let Some(split) = &request.split {
            body["subaccount"] = json!(split.subaccount);
            body["transaction_charge"] = json!(split.transaction_charge.minor());
            body["bearer"] = json!("subaccount");
        }

        debug!(reference = %request.reference, "Paystack initialize");
        let response = self
            .client
            .post(self.endpoint(&["transaction", "initialize"])?)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await;
        let raw = read_json(NAME, response).await?;

        let envelope: Envelope<InitData> =
            serde_json::from_value(raw.clone()).map_err(|e| PaymentError::gateway(NAME, e.to_string()))?;
        let data = unwrap_envelope(envelope)?;

        Ok(InitResponse {
            authorization_url: data.authorization_url,
            provider_reference: data.access_code,
            raw,
        })
    }

    async fn verify(&self, reference: &str) -> PaymentResult<VerifyResponse> {
        debug!(reference, "Paystack verify");
        let response = self
            .client
            .get(self.endpoint(&["transaction", "verify", reference])?)
            .bearer_auth(&self.secret_key)
            .send()
            .await;
        let raw = read_json(NAME, response).await?;

        let envelope: Envelope<TransactionData> =
            serde_json::from_value(raw.clone()).map_err(|e| PaymentError::gateway(NAME, e.to_string()))?;
        let data = unwrap_envelope(envelope)?;

        Ok(VerifyResponse {
            outcome: outcome_from_status(&data.status),
            amount: data.amount.map(Money::from_minor),
            paid_at: parse_timestamp(data.paid_at.as_deref()),
            provider_transaction_id: id_string(data.id.as_ref()),
            raw,
        })
    }

    fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<()> {
        signature::verify_paystack(self.signing_secret()?, body, signature)
    }

    fn parse_webhook(&self, body: &[u8]) -> PaymentResult<WebhookEvent> {
        parse_webhook(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(outcome_from_status("success"), PaymentOutcome::Success);
        assert_eq!(outcome_from_status("abandoned"), PaymentOutcome::Failed);
        assert_eq!(outcome_from_status("reversed"), PaymentOutcome::Failed);
        assert_eq!(outcome_from_status("ongoing"), PaymentOutcome::Pending);
    }

    #[test]
    fn test_parse_charge_success() {
        let body = json!({
            "event": "charge.success",
            "data": {
                "id": 302961,
                "status": "success",
                "reference": "TXN-1-abc",
                "amount": 500000,
                "currency": "NGN",
                "paid_at": "2026-02-01T10:00:00.000Z",
                "metadata": {"tenant_id": "t-1", "service_id": "7"},
                "customer": {"email": "a@b.com", "first_name": "Ada", "last_name": "Obi"}
            }
        });
        let event = parse_webhook(body.to_string().as_bytes()).unwrap();

        assert_eq!(event.reference, "TXN-1-abc");
        assert_eq!(event.outcome, Some(PaymentOutcome::Success));
        assert_eq!(event.amount, Some(Money::from_major(5000)));
        assert_eq!(event.provider_transaction_id.as_deref(), Some("302961"));
        assert_eq!(event.customer_name.as_deref(), Some("Ada Obi"));
        assert_eq!(event.metadata.tenant_id.as_deref(), Some("t-1"));
        assert!(event.paid_at.is_some());
    }

    #[test]
    fn test_parse_ignored_and_malformed() {
        let transfer = json!({"event": "transfer.success", "data": {"reference": "TR-1"}});
        let event = parse_webhook(transfer.to_string().as_bytes()).unwrap();
        assert!(event.outcome.is_none());

        assert!(parse_webhook(b"not json").is_err());
        let no_ref = json!({"event": "charge.success", "data": {"status": "success"}});
        assert!(parse_webhook(no_ref.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_webhook_signed_with_secret_key() {
        let gateway =
            PaystackGateway::new(reqwest::Client::new(), "sk_test_key", DEFAULT_BASE_URL).unwrap();
        let body = br#"{"event":"charge.success"}"#;
        let sig = signature::hmac_sha512_hex("sk_test_key", body).unwrap();

        assert!(gateway.verify_webhook(body, Some(&sig)).is_ok());
        assert!(gateway.verify_webhook(body, Some("deadbeef")).is_err());
    }

    #[test]
    fn test_endpoint_escapes_reference() {
        let gateway =
            PaystackGateway::new(reqwest::Client::new(), "sk", "http://localhost:9000/").unwrap();
        let url = gateway.endpoint(&["transaction", "verify", "TXN/1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/transaction/verify/TXN%2F1");
    }
}
