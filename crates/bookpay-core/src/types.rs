//! # Domain Types
//!
//! Core domain types shared by the engine, the database layer and the API.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐      ┌──────────────────────┐                 │
//! │  │ PaymentTransaction   │      │      Booking         │                 │
//! │  │ ──────────────────── │ 1──1 │ ──────────────────── │                 │
//! │  │ reference (unique)   │◄─────│ payment_transaction  │                 │
//! │  │ status               │      │ service snapshot     │                 │
//! │  │ amount / fee / net   │      │ scheduled_at         │                 │
//! │  │ metadata (JSON)      │      │ status               │                 │
//! │  └──────────────────────┘      └──────────┬───────────┘                 │
//! │            │ order_id / invoice_id        │ customer_id                 │
//! │            ▼                              ▼                             │
//! │  ┌──────────────────────┐      ┌──────────────────────┐                 │
//! │  │   Order / Invoice    │      │      Customer        │                 │
//! │  └──────────────────────┘      └──────────────────────┘                 │
//! │                                                                         │
//! │  Every row in a multi-tenant database carries its tenant_id.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::availability::WeeklySchedule;
use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 300 bps = 3%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate(u32);

impl FeeRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        FeeRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        FeeRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        FeeRate::zero()
    }
}

// =============================================================================
// Tenancy
// =============================================================================

/// Hosting tier of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TenantTier {
    /// Lowest tier: rows live in the common database tagged with tenant_id.
    Shared,
    /// Own infrastructure and no platform split. When registered in a
    /// common database its rows are still tagged with tenant_id.
    Dedicated,
}

impl TenantTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantTier::Shared => "shared",
            TenantTier::Dedicated => "dedicated",
        }
    }
}

/// A customer organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub tier: TenantTier,
    /// Payment-provider sub-account that receives the merchant share.
    pub subaccount_code: Option<String>,
    pub is_active: bool,
    pub contact_email: Option<String>,
}

impl Tenant {
    /// The row filter every query for this tenant must use.
    ///
    /// Tenants registered in a common database are tagged whatever their
    /// tier; the tier only changes fees and the store requirement.
    pub fn scope(&self) -> TenantScope {
        TenantScope::Tenant(self.id.clone())
    }

    /// Bookings on the shared tier do not have to name a store.
    pub fn requires_store_for_booking(&self) -> bool {
        self.tier != TenantTier::Shared
    }
}

/// Which rows a tenant may see.
///
/// Queries bind [`TenantScope::tenant_id`] with `tenant_id IS ?`, which matches
/// both the tagged (`= 'id'`) and isolated (`IS NULL`) cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// Rows tagged with this tenant's id.
    Tenant(String),
    /// A database file that belongs to a single tenant; rows are untagged.
    Isolated,
}

impl TenantScope {
    /// Scope implied by a stored row's `tenant_id` column.
    pub fn from_row(tenant_id: Option<&str>) -> Self {
        match tenant_id {
            Some(id) => TenantScope::Tenant(id.to_string()),
            None => TenantScope::Isolated,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantScope::Tenant(id) => Some(id.as_str()),
            TenantScope::Isolated => None,
        }
    }
}

// =============================================================================
// Payment Gateway
// =============================================================================

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum GatewayName {
    Paystack,
    Flutterwave,
}

impl GatewayName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayName::Paystack => "paystack",
            GatewayName::Flutterwave => "flutterwave",
        }
    }
}

impl fmt::Display for GatewayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paystack" => Ok(GatewayName::Paystack),
            "flutterwave" => Ok(GatewayName::Flutterwave),
            other => Err(ValidationError::invalid(
                "gateway",
                format!("unknown gateway '{other}'"),
            )),
        }
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Lifecycle state of a payment transaction.
///
/// ```text
///            ┌──────────► success  (terminal, side effects applied once)
///  pending ──┤
///            └──────────► failed   (terminal)
///
///  cancelled / refunded: administrative only, never set by the engine
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
        }
    }

    /// Anything but `pending` is final as far as the engine is concerned.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Metadata
// =============================================================================

/// Caller metadata carried on a transaction and echoed through the provider.
///
/// Everything needed to rebuild a lost transaction from a webhook lives
/// here: tenant, order/invoice linkage, fee split and booking request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub store_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_booking: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Platform fee in minor units, as computed at initialization.
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<i64>,

    /// Merchant share in minor units, as computed at initialization.
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub merchant_amount: Option<i64>,

    /// Any other keys the caller sent; kept so they round-trip to the provider.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PaymentMetadata {
    /// Returns the booking request if this payment pays for an appointment.
    ///
    /// A payment is a booking payment when it is flagged explicitly or when
    /// it names both a service and a time. An explicit flag without those
    /// two fields cannot be honored and yields `None`.
    pub fn booking_request(&self) -> Option<BookingRequest> {
        if self.is_booking == Some(false) {
            return None;
        }
        let (service_id, scheduled_at) = match (self.service_id, self.scheduled_at.as_ref()) {
            (Some(service_id), Some(at)) if !at.trim().is_empty() => (service_id, at.clone()),
            _ => return None,
        };
        Some(BookingRequest {
            service_id,
            scheduled_at,
            store_id: self.store_id,
            notes: self.notes.clone(),
        })
    }
}

/// The appointment a payment is meant to reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub service_id: i64,
    /// Raw caller string, normalized by the availability resolver.
    pub scheduled_at: String,
    pub store_id: Option<i64>,
    pub notes: Option<String>,
}

/// Accepts `7`, `"7"` or `null` for numeric identifiers.
///
/// Providers are not consistent about stringifying metadata values.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected numeric id, got '{s}'"))),
    }
}

// =============================================================================
// Payment Transaction
// =============================================================================

/// One payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    /// Caller-generated unique reference, independent of the provider's id.
    pub reference: String,
    pub tenant_id: Option<String>,
    pub order_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub gateway_name: GatewayName,
    pub gateway_transaction_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub platform_fee: Money,
    pub merchant_amount: Money,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub status: TransactionStatus,
    /// Opaque provider payload from the last initialize/verify/webhook.
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: PaymentMetadata,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Services & Bookings
// =============================================================================

/// A bookable service offered by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub store_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub duration_minutes: i64,
    /// Inline weekly schedule; takes precedence over relational slots.
    pub availability: Option<WeeklySchedule>,
    pub is_active: bool,
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Bookings in these states hold their slot.
    pub fn blocks_slot(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// A confirmed appointment.
/// Uses the snapshot pattern to freeze the service definition at payment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub store_id: Option<i64>,
    pub service_id: i64,
    pub customer_id: Option<i64>,
    /// Idempotency key: at most one booking per payment.
    pub payment_transaction_id: Option<i64>,
    /// Service title at time of payment (frozen).
    pub service_title: String,
    /// Service description at time of payment (frozen).
    pub service_description: Option<String>,
    /// Duration at time of payment (frozen). `None` for legacy rows.
    pub duration_minutes: Option<i64>,
    /// Price at time of payment (frozen).
    pub price: Money,
    /// Local wall-clock start.
    pub scheduled_at: NaiveDateTime,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A tenant's customer, resolved by email then phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Orders & Invoices
// =============================================================================

/// A storefront order that a payment may settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub order_number: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub total: Money,
    pub status: String,
    pub payment_status: String,
}

/// An invoice that a payment may settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub invoice_number: String,
    pub total: Money,
    pub status: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_scope_by_tier() {
        let mut tenant = Tenant {
            id: "t-1".into(),
            name: "Salon".into(),
            tier: TenantTier::Shared,
            subaccount_code: None,
            is_active: true,
            contact_email: None,
        };
        assert_eq!(tenant.scope(), TenantScope::Tenant("t-1".into()));
        assert_eq!(tenant.scope().tenant_id(), Some("t-1"));
        assert!(!tenant.requires_store_for_booking());

        // Dedicated tenants sharing the database still only see their rows.
        tenant.tier = TenantTier::Dedicated;
        assert_eq!(tenant.scope(), TenantScope::Tenant("t-1".into()));
        assert_ne!(tenant.scope().tenant_id(), TenantScope::Isolated.tenant_id());
        assert!(tenant.requires_store_for_booking());
    }

    #[test]
    fn test_gateway_name_parsing() {
        assert_eq!("Paystack".parse::<GatewayName>().unwrap(), GatewayName::Paystack);
        assert_eq!(" flutterwave ".parse::<GatewayName>().unwrap(), GatewayName::Flutterwave);
        assert!("stripe".parse::<GatewayName>().is_err());
    }

    #[test]
    fn test_metadata_accepts_string_ids() {
        let meta: PaymentMetadata = serde_json::from_value(json!({
            "tenant_id": "t-1",
            "service_id": "7",
            "order_id": 12,
            "store_id": "",
            "scheduled_at": "2026-02-02T09:00:00",
            "utm_source": "instagram"
        }))
        .unwrap();

        assert_eq!(meta.service_id, Some(7));
        assert_eq!(meta.order_id, Some(12));
        assert_eq!(meta.store_id, None);
        assert_eq!(meta.extra.get("utm_source"), Some(&json!("instagram")));
    }

    #[test]
    fn test_booking_request_detection() {
        let implicit = PaymentMetadata {
            service_id: Some(7),
            scheduled_at: Some("2026-02-02T09:00:00".into()),
            ..Default::default()
        };
        assert_eq!(implicit.booking_request().unwrap().service_id, 7);

        let flag_only = PaymentMetadata {
            is_booking: Some(true),
            ..Default::default()
        };
        assert!(flag_only.booking_request().is_none());

        let opted_out = PaymentMetadata {
            is_booking: Some(false),
            ..implicit.clone()
        };
        assert!(opted_out.booking_request().is_none());

        assert!(PaymentMetadata::default().booking_request().is_none());
    }

    #[test]
    fn test_metadata_serialization_skips_empty_fields() {
        let meta = PaymentMetadata {
            tenant_id: Some("t-1".into()),
            platform_fee: Some(50_000),
            ..Default::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({"tenant_id": "t-1", "platform_fee": 50000}));
    }

    #[test]
    fn test_transaction_status_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_booking_status_blocks_slot() {
        assert!(BookingStatus::Pending.blocks_slot());
        assert!(BookingStatus::Confirmed.blocks_slot());
        assert!(!BookingStatus::Cancelled.blocks_slot());
        assert!(!BookingStatus::NoShow.blocks_slot());
    }
}
