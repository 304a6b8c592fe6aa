//! # Flutterwave Adapter
//!
//! ## Wire Contract
//! ```text
//! POST /v3/payments                  amount in major units
//!      { tx_ref, amount, currency, redirect_url, customer, meta,
//!        subaccounts?: [{ id, transaction_charge_type, transaction_charge }] }
//!   ◄─ { status: "success", data: { link } }
//!
//! GET  /v3/transactions/verify_by_reference?tx_ref=
//!   ◄─ { status: "success", data: { id, status, amount, created_at, ... } }
//!
//! Webhook: flutterwave-signature = base64(HMAC-SHA256(webhook_secret, raw body))
//!          charge.completed with data.status successful / failed / cancelled
//! ```
//!
//! Splits use `flat_subaccount`: the sub-account receives a fixed amount
//! (the merchant share) and the platform keeps the rest.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
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

pub const DEFAULT_BASE_URL: &str = "https://api.flutterwave.com";

const NAME: GatewayName = GatewayName::Flutterwave;

/// Maps a Flutterwave transaction status onto an outcome.
pub fn outcome_from_status(status: &str) -> PaymentOutcome {
    match status.to_ascii_lowercase().as_str() {
        "successful" => PaymentOutcome::Success,
        "failed" | "cancelled" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Pending,
    }
}

/// Reads a major-unit amount sent as a number or a string.
fn major_amount(value: Option<&Value>) -> Option<Money> {
    let text = match value? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    let decimal = Decimal::from_str(&text).ok()?;
    Money::from_major_decimal(decimal.round_dp(2)).ok()
}

fn major_number(amount: Money) -> Value {
    amount
        .to_major_decimal()
        .to_f64()
        .map(Value::from)
        .unwrap_or(Value::Null)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    tx_ref: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(default)]
    customer: Option<CustomerData>,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: String,
    data: TransactionData,
    #[serde(default)]
    meta_data: Option<Value>,
}

fn id_string(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> PaymentResult<T> {
    if envelope.status != "success" {
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

/// Parses a Flutterwave webhook body.
pub fn parse_webhook(body: &[u8]) -> PaymentResult<WebhookEvent> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| PaymentError::malformed(NAME, e))?;
    let parsed: WebhookBody =
        serde_json::from_value(raw.clone()).map_err(|e| PaymentError::malformed(NAME, e))?;
    let data = parsed.data;

    let reference = data
        .tx_ref
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PaymentError::malformed(NAME, "data.tx_ref is missing"))?;

    let outcome = match parsed.event.as_str() {
        "charge.completed" => Some(outcome_from_status(&data.status)),
        _ => None,
    };

    // Metadata lives at the top level on v3 hooks and under data.meta on newer ones.
    let meta_source = parsed.meta_data.as_ref().or(data.meta.as_ref());

    let (customer_email, customer_name, customer_phone) = match data.customer {
        Some(c) => (c.email, c.name, c.phone_number),
        None => (None, None, None),
    };

    Ok(WebhookEvent {
        gateway: NAME,
        event: parsed.event,
        reference,
        outcome,
        amount: major_amount(data.amount.as_ref()),
        currency: data.currency,
        customer_email,
        customer_name,
        customer_phone,
        provider_transaction_id: id_string(data.id.as_ref()),
        paid_at: parse_timestamp(data.created_at.as_deref()),
        metadata: metadata_from_value(NAME, meta_source),
        raw,
    })
}

// =============================================================================
// Gateway
// =============================================================================

/// Flutterwave over HTTPS.
#[derive(Debug, Clone)]
pub struct FlutterwaveGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    base_url: url::Url,
}

impl FlutterwaveGateway {
    pub fn new(
        client: reqwest::Client,
        secret_key: impl Into<String>,
        webhook_secret: Option<String>,
        base: &str,
    ) -> PaymentResult<Self> {
        Ok(FlutterwaveGateway {
            client,
            secret_key: secret_key.into(),
            webhook_secret,
            base_url: base_url(NAME, base)?,
        })
    }

    pub fn from_settings(client: reqwest::Client, settings: &GatewaySettings) -> PaymentResult<Self> {
        let secret_key = settings
            .secret_key
            .clone()
            .ok_or(PaymentError::GatewayNotConfigured(NAME))?;
        Self::new(
            client,
            secret_key,
            settings.webhook_secret.clone(),
            settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        )
    }

    fn endpoint(&self, path: &str) -> PaymentResult<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::InvalidConfig(format!("flutterwave endpoint: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveGateway {
    fn name(&self) -> GatewayName {
        NAME
    }

    async fn initialize(&self, request: &InitRequest) -> PaymentResult<InitResponse> {
        let mut body = json!({
            "tx_ref": request.reference,
            "amount": major_number(request.amount),
            "currency": request.currency,
            "customer": {
                "email": request.email,
                "name": request.customer_name,
            },
            "meta": request.metadata,
        });
        if let Some(redirect) = &request.redirect_url {
            body["redirect_url"] = json!(redirect);
        }
        if let Some(split) = &request.split {
            let merchant_share = request.amount - split.transaction_charge;
            body["subaccounts"] = json!([{
                "id": split.subaccount,
                "transaction_charge_type": "flat_subaccount",
                "transaction_charge": major_number(merchant_share),
            }]);
        }

        debug!(reference = %request.reference, "Flutterwave initialize");
        let response = self
            .client
            .post(self.endpoint("v3/payments")?)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await;
        let raw = read_json(NAME, response).await?;

        let envelope: Envelope<InitData> =
            serde_json::from_value(raw.clone()).map_err(|e| PaymentError::gateway(NAME, e.to_string()))?;
        let data = unwrap_envelope(envelope)?;

        Ok(InitResponse {
            authorization_url: data.link,
            provider_reference: None,
            raw,
        })
    }

    async fn verify(&self, reference: &str) -> PaymentResult<VerifyResponse> {
        debug!(reference, "Flutterwave verify");
        let mut url = self.endpoint("v3/transactions/verify_by_reference")?;
        url.query_pairs_mut().append_pair("tx_ref", reference);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await;
        let raw = read_json(NAME, response).await?;

        let envelope: Envelope<TransactionData> =
            serde_json::from_value(raw.clone()).map_err(|e| PaymentError::gateway(NAME, e.to_string()))?;
        let data = unwrap_envelope(envelope)?;

        Ok(VerifyResponse {
            outcome: outcome_from_status(&data.status),
            amount: major_amount(data.amount.as_ref()),
            paid_at: parse_timestamp(data.created_at.as_deref()),
            provider_transaction_id: id_string(data.id.as_ref()),
            raw,
        })
    }

    fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<()> {
        let secret = self
            .webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PaymentError::MissingWebhookSecret(NAME))?;
        signature::verify_flutterwave(secret, body, signature)
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
        assert_eq!(outcome_from_status("successful"), PaymentOutcome::Success);
        assert_eq!(outcome_from_status("FAILED"), PaymentOutcome::Failed);
        assert_eq!(outcome_from_status("cancelled"), PaymentOutcome::Failed);
        assert_eq!(outcome_from_status("pending"), PaymentOutcome::Pending);
    }

    #[test]
    fn test_major_amounts() {
        assert_eq!(major_amount(Some(&json!(5000))), Some(Money::from_major(5000)));
        assert_eq!(major_amount(Some(&json!(49.99))), Some(Money::from_minor(4999)));
        assert_eq!(major_amount(Some(&json!("120.5"))), Some(Money::from_minor(12050)));
        assert_eq!(major_amount(Some(&json!(null))), None);
        assert_eq!(major_number(Money::from_minor(4999)), json!(49.99));
    }

    #[test]
    fn test_parse_charge_completed() {
        let body = json!({
            "event": "charge.completed",
            "data": {
                "id": 285959875,
                "tx_ref": "TXN-2-def",
                "status": "successful",
                "amount": 5000,
                "currency": "NGN",
                "created_at": "2026-02-01T10:00:00.000Z",
                "customer": {"name": "Ada Obi", "email": "a@b.com", "phone_number": "0801"}
            },
            "meta_data": {"tenant_id": "t-1", "order_id": "12"}
        });
        let event = parse_webhook(body.to_string().as_bytes()).unwrap();

        assert_eq!(event.reference, "TXN-2-def");
        assert_eq!(event.outcome, Some(PaymentOutcome::Success));
        assert_eq!(event.amount, Some(Money::from_major(5000)));
        assert_eq!(event.customer_phone.as_deref(), Some("0801"));
        assert_eq!(event.metadata.order_id, Some(12));

        let failed = json!({
            "event": "charge.completed",
            "data": {"tx_ref": "TXN-3", "status": "failed"}
        });
        let event = parse_webhook(failed.to_string().as_bytes()).unwrap();
        assert_eq!(event.outcome, Some(PaymentOutcome::Failed));
    }

    #[test]
    fn test_webhook_requires_configured_secret() {
        let body = br#"{"event":"charge.completed"}"#;
        let unsigned =
            FlutterwaveGateway::new(reqwest::Client::new(), "FLWSECK", None, DEFAULT_BASE_URL)
                .unwrap();
        assert!(matches!(
            unsigned.verify_webhook(body, Some("x")),
            Err(PaymentError::MissingWebhookSecret(GatewayName::Flutterwave))
        ));

        let signed = FlutterwaveGateway::new(
            reqwest::Client::new(),
            "FLWSECK",
            Some("hash".into()),
            DEFAULT_BASE_URL,
        )
        .unwrap();
        let sig = signature::hmac_sha256_base64("hash", body).unwrap();
        assert!(signed.verify_webhook(body, Some(&sig)).is_ok());
    }
}
