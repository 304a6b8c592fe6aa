//! # Gateway Adapter
//!
//! The request/response contract with external payment providers.
//!
//! ## Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PaymentGateway                                   │
//! │                                                                         │
//! │  initialize(InitRequest) ──► { authorization_url, provider_reference }  │
//! │  verify(reference)       ──► { outcome, amount, paid_at, raw }          │
//! │  verify_webhook(body, signature header)  (HMAC, constant time)          │
//! │  parse_webhook(body)     ──► WebhookEvent                               │
//! │                                                                         │
//! │  ┌──────────────────────┐          ┌──────────────────────┐             │
//! │  │  PaystackGateway     │          │  FlutterwaveGateway  │             │
//! │  │  minor units         │          │  major units         │             │
//! │  │  HMAC-SHA512 (hex)   │          │  HMAC-SHA256 (b64)   │             │
//! │  └──────────────────────┘          └──────────────────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Gateways are built from [`GatewaysSettings`] once at startup and
//! collected in a [`GatewayRegistry`]; secrets travel with the adapter that
//! uses them.

pub mod flutterwave;
pub mod paystack;
pub mod signature;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::GatewaysSettings;
use crate::error::{PaymentError, PaymentResult};
use bookpay_core::{GatewayName, Money, PaymentMetadata, PaymentOutcome, SplitInstruction};

pub use flutterwave::FlutterwaveGateway;
pub use paystack::PaystackGateway;

/// Timeout for every outbound provider call.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Contract Types
// =============================================================================

/// What the engine asks a provider to start.
#[derive(Debug, Clone)]
pub struct InitRequest {
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub email: String,
    pub customer_name: Option<String>,
    pub redirect_url: Option<String>,
    /// Echoed back on webhooks; enough to rebuild the transaction.
    pub metadata: PaymentMetadata,
    pub split: Option<SplitInstruction>,
}

/// A started checkout.
#[derive(Debug, Clone)]
pub struct InitResponse {
    pub authorization_url: String,
    pub provider_reference: Option<String>,
    pub raw: Value,
}

/// The provider's view of a payment.
#[derive(Debug, Clone)]
pub struct VerifyResponse {
    pub outcome: PaymentOutcome,
    /// Amount actually settled, when the provider reports it.
    pub amount: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub provider_transaction_id: Option<String>,
    pub raw: Value,
}

/// A signed provider notification, normalized.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub gateway: GatewayName,
    pub event: String,
    pub reference: String,
    /// `None` for event types the engine does not act on.
    pub outcome: Option<PaymentOutcome>,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: PaymentMetadata,
    pub raw: Value,
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// One payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> GatewayName;

    async fn initialize(&self, request: &InitRequest) -> PaymentResult<InitResponse>;

    async fn verify(&self, reference: &str) -> PaymentResult<VerifyResponse>;

    /// Checks the signature header against the raw body.
    fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<()>;

    fn parse_webhook(&self, body: &[u8]) -> PaymentResult<WebhookEvent>;
}

// =============================================================================
// Registry
// =============================================================================

/// The gateways available to the engine.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayName, Arc<dyn PaymentGateway>>,
    default: Option<GatewayName>,
}

impl fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.gateways.keys().map(GatewayName::as_str).collect();
        names.sort_unstable();
        f.debug_struct("GatewayRegistry")
            .field("gateways", &names)
            .field("default", &self.default)
            .finish()
    }
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds HTTP adapters for every enabled provider.
    pub fn from_config(settings: &GatewaysSettings) -> PaymentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::InvalidConfig(format!("HTTP client: {e}")))?;

        let mut registry = GatewayRegistry::new();

        if settings.paystack.is_usable() {
            let gateway = PaystackGateway::from_settings(client.clone(), &settings.paystack)?;
            registry.register(Arc::new(gateway), settings.paystack.is_default);
        }
        if settings.flutterwave.is_usable() {
            let gateway = FlutterwaveGateway::from_settings(client, &settings.flutterwave)?;
            registry.register(Arc::new(gateway), settings.flutterwave.is_default);
        }

        Ok(registry)
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>, is_default: bool) {
        let name = gateway.name();
        if is_default {
            self.default = Some(name);
        }
        self.gateways.insert(name, gateway);
    }

    pub fn get(&self, name: GatewayName) -> PaymentResult<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(&name)
            .cloned()
            .ok_or(PaymentError::GatewayNotConfigured(name))
    }

    /// The gateway `initialize` uses.
    pub fn default_gateway(&self) -> PaymentResult<Arc<dyn PaymentGateway>> {
        self.default
            .and_then(|name| self.gateways.get(&name).cloned())
            .ok_or(PaymentError::NoDefaultGateway)
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Normalizes a configured base URL so relative joins append segments.
pub(crate) fn base_url(gateway: GatewayName, raw: &str) -> PaymentResult<url::Url> {
    let with_slash = format!("{}/", raw.trim_end_matches('/'));
    url::Url::parse(&with_slash)
        .map_err(|e| PaymentError::InvalidConfig(format!("{gateway} base_url: {e}")))
}

/// Reads provider metadata that may arrive as an object, a JSON string or
/// an empty string.
pub(crate) fn metadata_from_value(gateway: GatewayName, value: Option<&Value>) -> PaymentMetadata {
    let parsed: Result<Option<PaymentMetadata>, serde_json::Error> = match value {
        Some(Value::Object(_)) => value.cloned().map(serde_json::from_value).transpose(),
        Some(Value::String(s)) if !s.trim().is_empty() => serde_json::from_str(s).map(Some),
        _ => Ok(None),
    };
    match parsed {
        Ok(meta) => meta.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(gateway = %gateway, error = %e, "Ignoring unreadable payment metadata");
            PaymentMetadata::default()
        }
    }
}

pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Maps a transport failure or non-2xx answer into an upstream error.
pub(crate) async fn read_json(
    gateway: GatewayName,
    response: Result<reqwest::Response, reqwest::Error>,
) -> PaymentResult<Value> {
    let response = response.map_err(|e| PaymentError::gateway(gateway, e.to_string()))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PaymentError::gateway(gateway, format!("unreadable response ({status}): {e}")))?;

    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(PaymentError::gateway(gateway, format!("{status}: {message}")));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullGateway(GatewayName);

    #[async_trait]
    impl PaymentGateway for NullGateway {
        fn name(&self) -> GatewayName {
            self.0
        }
        async fn initialize(&self, _: &InitRequest) -> PaymentResult<InitResponse> {
            Err(PaymentError::gateway(self.0, "offline"))
        }
        async fn verify(&self, _: &str) -> PaymentResult<VerifyResponse> {
            Err(PaymentError::gateway(self.0, "offline"))
        }
        fn verify_webhook(&self, _: &[u8], _: Option<&str>) -> PaymentResult<()> {
            Err(PaymentError::InvalidSignature)
        }
        fn parse_webhook(&self, _: &[u8]) -> PaymentResult<WebhookEvent> {
            Err(PaymentError::malformed(self.0, "unsupported"))
        }
    }

    #[test]
    fn test_registry_default_and_lookup() {
        let mut registry = GatewayRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.default_gateway(),
            Err(PaymentError::NoDefaultGateway)
        ));

        registry.register(Arc::new(NullGateway(GatewayName::Paystack)), false);
        assert!(registry.default_gateway().is_err());
        assert!(registry.get(GatewayName::Paystack).is_ok());
        assert!(matches!(
            registry.get(GatewayName::Flutterwave),
            Err(PaymentError::GatewayNotConfigured(GatewayName::Flutterwave))
        ));

        registry.register(Arc::new(NullGateway(GatewayName::Flutterwave)), true);
        assert_eq!(
            registry.default_gateway().unwrap().name(),
            GatewayName::Flutterwave
        );
    }

    #[test]
    fn test_registry_from_config_skips_disabled() {
        let mut settings = GatewaysSettings::default();
        settings.paystack.enabled = true;
        settings.paystack.is_default = true;
        settings.paystack.secret_key = Some("sk_test".into());

        let registry = GatewayRegistry::from_config(&settings).unwrap();
        assert!(registry.get(GatewayName::Paystack).is_ok());
        assert!(registry.get(GatewayName::Flutterwave).is_err());
        assert_eq!(registry.default_gateway().unwrap().name(), GatewayName::Paystack);
    }

    #[test]
    fn test_metadata_from_value_variants() {
        let gw = GatewayName::Paystack;
        let object = json!({"tenant_id": "t-1", "service_id": "7"});
        assert_eq!(metadata_from_value(gw, Some(&object)).service_id, Some(7));

        let encoded = json!("{\"order_id\": 3}");
        assert_eq!(metadata_from_value(gw, Some(&encoded)).order_id, Some(3));

        assert_eq!(metadata_from_value(gw, Some(&json!(""))), PaymentMetadata::default());
        assert_eq!(metadata_from_value(gw, None), PaymentMetadata::default());
        assert_eq!(
            metadata_from_value(gw, Some(&json!({"order_id": "abc"}))),
            PaymentMetadata::default()
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = base_url(GatewayName::Paystack, "http://127.0.0.1:9000/mock").unwrap();
        assert_eq!(
            url.join("transaction/initialize").unwrap().as_str(),
            "http://127.0.0.1:9000/mock/transaction/initialize"
        );
    }
}
