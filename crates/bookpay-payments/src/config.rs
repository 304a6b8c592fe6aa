//! # Payments Configuration
//!
//! Everything the engine and the HTTP app need at startup.
//!
//! ## Configuration Sources (Priority Order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest)                                     │
//! │     BOOKPAY_DATABASE_PATH=/srv/bookpay.db                               │
//! │     BOOKPAY_DEFAULT_GATEWAY=flutterwave                                 │
//! │     PAYSTACK_SECRET_KEY=sk_live_...                                     │
//! │                                                                         │
//! │  2. Config File (bookpay.toml)                                          │
//! │     [gateways.paystack]                                                 │
//! │     enabled = true                                                      │
//! │                                                                         │
//! │  3. Defaults (lowest)                                                   │
//! │     3% platform fee, capped at 500 NGN                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway registry and webhook secrets are built from this value once
//! and handed to the engine; nothing reads configuration after startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PaymentError, PaymentResult};
use bookpay_core::types::FeeRate;
use bookpay_core::validation::validate_currency;
use bookpay_core::{GatewayName, Money, DEFAULT_CURRENCY};

// =============================================================================
// Server & Database
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("bookpay.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Fees
// =============================================================================

/// Platform fee policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Fee for shared-tier tenants in basis points (300 = 3%).
    #[serde(default = "default_platform_fee_bps")]
    pub platform_fee_bps: u32,

    /// Ceiling on the fee, in major currency units.
    #[serde(default = "default_cap_major")]
    pub cap_major: i64,

    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_platform_fee_bps() -> u32 {
    300
}

fn default_cap_major() -> i64 {
    500
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for FeeSettings {
    fn default() -> Self {
        FeeSettings {
            platform_fee_bps: default_platform_fee_bps(),
            cap_major: default_cap_major(),
            default_currency: default_currency(),
        }
    }
}

impl FeeSettings {
    pub fn platform_rate(&self) -> FeeRate {
        FeeRate::from_bps(self.platform_fee_bps)
    }

    pub fn cap(&self) -> Money {
        Money::from_major(self.cap_major)
    }
}

// =============================================================================
// Gateways
// =============================================================================

/// One provider's credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub enabled: bool,

    /// Used by `initialize` when the caller does not pick a provider.
    #[serde(default)]
    pub is_default: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Webhook signing secret. Paystack signs with the secret key when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    /// Overrides the provider's public API host (sandboxes, tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl GatewaySettings {
    pub fn is_usable(&self) -> bool {
        self.enabled && self.secret_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Provider table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewaysSettings {
    #[serde(default)]
    pub paystack: GatewaySettings,

    #[serde(default)]
    pub flutterwave: GatewaySettings,
}

impl GatewaysSettings {
    pub fn get(&self, name: GatewayName) -> &GatewaySettings {
        match name {
            GatewayName::Paystack => &self.paystack,
            GatewayName::Flutterwave => &self.flutterwave,
        }
    }

    fn get_mut(&mut self, name: GatewayName) -> &mut GatewaySettings {
        match name {
            GatewayName::Paystack => &mut self.paystack,
            GatewayName::Flutterwave => &mut self.flutterwave,
        }
    }

    /// The enabled gateway marked default, if any.
    pub fn default_gateway(&self) -> Option<GatewayName> {
        [GatewayName::Paystack, GatewayName::Flutterwave]
            .into_iter()
            .find(|name| {
                let settings = self.get(*name);
                settings.enabled && settings.is_default
            })
    }

    /// Makes `name` the only default and enables it.
    pub fn set_default(&mut self, name: GatewayName) {
        self.paystack.is_default = false;
        self.flutterwave.is_default = false;
        let chosen = self.get_mut(name);
        chosen.enabled = true;
        chosen.is_default = true;
    }
}

// =============================================================================
// App
// =============================================================================

/// Storefront-facing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// Where providers send the payer after checkout when the caller
    /// supplies no `redirect_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete payments configuration.
///
/// ## Example Config File
/// ```toml
/// [server]
/// bind_addr = "0.0.0.0:8080"
///
/// [database]
/// path = "/var/lib/bookpay/bookpay.db"
/// max_connections = 5
///
/// [fees]
/// platform_fee_bps = 300
/// cap_major = 500
/// default_currency = "NGN"
///
/// [gateways.paystack]
/// enabled = true
/// is_default = true
/// secret_key = "sk_test_..."
///
/// [gateways.flutterwave]
/// enabled = false
///
/// [app]
/// callback_url = "https://shop.example.com/payments/callback"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub fees: FeeSettings,

    #[serde(default)]
    pub gateways: GatewaysSettings,

    #[serde(default)]
    pub app: AppSettings,
}

impl PaymentsConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `BOOKPAY_CONFIG`, `./bookpay.toml`,
    ///    then the platform config directory)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PaymentResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("BOOKPAY_CONFIG").ok().map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from("bookpay.toml");
                local.exists().then_some(local)
            })
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading payments config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document without touching the environment.
    pub fn from_toml(contents: &str) -> PaymentResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PaymentResult<()> {
        self.server.bind_addr.parse::<SocketAddr>().map_err(|e| {
            PaymentError::InvalidConfig(format!(
                "server.bind_addr '{}' is not a socket address: {e}",
                self.server.bind_addr
            ))
        })?;

        if self.database.max_connections == 0 {
            return Err(PaymentError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.fees.platform_fee_bps > 10_000 {
            return Err(PaymentError::InvalidConfig(format!(
                "fees.platform_fee_bps must be at most 10000, got {}",
                self.fees.platform_fee_bps
            )));
        }
        if self.fees.cap_major < 0 {
            return Err(PaymentError::InvalidConfig(
                "fees.cap_major must not be negative".into(),
            ));
        }
        validate_currency(&self.fees.default_currency)
            .map_err(|e| PaymentError::InvalidConfig(e.to_string()))?;

        for name in [GatewayName::Paystack, GatewayName::Flutterwave] {
            let settings = self.gateways.get(name);
            if settings.enabled && !settings.is_usable() {
                return Err(PaymentError::InvalidConfig(format!(
                    "gateways.{name} is enabled but has no secret_key"
                )));
            }
            if let Some(base) = settings.base_url.as_deref() {
                url::Url::parse(base).map_err(|e| {
                    PaymentError::InvalidConfig(format!("gateways.{name}.base_url: {e}"))
                })?;
            }
        }

        let defaults = [&self.gateways.paystack, &self.gateways.flutterwave]
            .iter()
            .filter(|g| g.enabled && g.is_default)
            .count();
        if defaults > 1 {
            return Err(PaymentError::InvalidConfig(
                "only one gateway may be marked is_default".into(),
            ));
        }

        if let Some(callback) = self.app.callback_url.as_deref() {
            url::Url::parse(callback)
                .map_err(|e| PaymentError::InvalidConfig(format!("app.callback_url: {e}")))?;
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BOOKPAY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("BOOKPAY_BIND_ADDR") {
            debug!(addr = %addr, "Overriding bind address from environment");
            self.server.bind_addr = addr;
        }

        if let Ok(bps) = std::env::var("BOOKPAY_PLATFORM_FEE_BPS") {
            match bps.parse::<u32>() {
                Ok(b) => self.fees.platform_fee_bps = b,
                Err(_) => warn!(value = %bps, "Ignoring non-numeric BOOKPAY_PLATFORM_FEE_BPS"),
            }
        }

        if let Ok(key) = std::env::var("PAYSTACK_SECRET_KEY") {
            self.gateways.paystack.secret_key = Some(key);
            self.gateways.paystack.enabled = true;
        }

        if let Ok(key) = std::env::var("FLUTTERWAVE_SECRET_KEY") {
            self.gateways.flutterwave.secret_key = Some(key);
            self.gateways.flutterwave.enabled = true;
        }

        if let Ok(secret) = std::env::var("FLUTTERWAVE_WEBHOOK_SECRET") {
            self.gateways.flutterwave.webhook_secret = Some(secret);
        }

        if let Ok(name) = std::env::var("BOOKPAY_DEFAULT_GATEWAY") {
            match name.parse::<GatewayName>() {
                Ok(gateway) => {
                    debug!(gateway = %gateway, "Overriding default gateway from environment");
                    self.gateways.set_default(gateway);
                }
                Err(_) => warn!(gateway = %name, "Unknown gateway in BOOKPAY_DEFAULT_GATEWAY"),
            }
        }

        if let Ok(url) = std::env::var("BOOKPAY_CALLBACK_URL") {
            self.app.callback_url = Some(url);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bookpay", "payments")
            .map(|dirs| dirs.config_dir().join("bookpay.toml"))
    }
}
