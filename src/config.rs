//! Processor configuration, resolved once at startup.
//!
//! Every setting has two layers: an explicit override taken from the process
//! environment, and the preference stored with the payment method. The override
//! wins. The resolved [`GatewayConfig`] is passed by reference to the components
//! that need it; nothing reads the environment afterwards.

use crate::error::{ReconcileError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const ENV_API_USERNAME: &str = "PSP_API_USERNAME";
pub const ENV_API_PASSWORD: &str = "PSP_API_PASSWORD";
pub const ENV_MERCHANT_ACCOUNT: &str = "PSP_MERCHANT_ACCOUNT";
pub const ENV_ENVIRONMENT: &str = "PSP_ENVIRONMENT";
pub const ENV_REFUND_REASON: &str = "PSP_REFUND_REASON";

/// Settings stored with the payment method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub api_username: Option<String>,
    #[serde(default)]
    pub api_password: Option<String>,
    #[serde(default)]
    pub merchant_account: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub store_merchant_account_map: HashMap<String, String>,
    #[serde(default)]
    pub refund_reason_id: Option<String>,
}

impl Preferences {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Explicit overrides, captured from the environment in one go.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_username: Option<String>,
    pub api_password: Option<String>,
    pub merchant_account: Option<String>,
    pub environment: Option<String>,
    pub refund_reason_id: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds overrides from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            api_username: get(ENV_API_USERNAME),
            api_password: get(ENV_API_PASSWORD),
            merchant_account: get(ENV_MERCHANT_ACCOUNT),
            environment: get(ENV_ENVIRONMENT),
            refund_reason_id: get(ENV_REFUND_REASON),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Test,
    Live,
}

impl FromStr for Environment {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "live" => Ok(Self::Live),
            other => Err(ReconcileError::Config(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

/// Resolves the merchant account a request is made under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLocator {
    by_store: HashMap<String, String>,
    default_account: String,
}

impl AccountLocator {
    pub fn new(by_store: HashMap<String, String>, default_account: impl Into<String>) -> Self {
        Self {
            by_store,
            default_account: default_account.into(),
        }
    }

    pub fn for_store(&self, store_code: Option<&str>) -> &str {
        store_code
            .and_then(|code| self.by_store.get(code))
            .map(String::as_str)
            .unwrap_or(&self.default_account)
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub api_username: Option<String>,
    api_password: Option<String>,
    pub environment: Environment,
    pub account_locator: AccountLocator,
    /// Reason recorded on refunds confirmed by the processor.
    pub refund_reason_id: String,
}

impl GatewayConfig {
    pub fn resolve(preferences: &Preferences, overrides: &EnvOverrides) -> Result<Self> {
        fn pick(over: &Option<String>, pref: &Option<String>) -> Option<String> {
            over.clone().or_else(|| pref.clone())
        }

        let merchant_account = pick(&overrides.merchant_account, &preferences.merchant_account)
            .ok_or_else(|| ReconcileError::Config("merchant account is not set".into()))?;
        let refund_reason_id = pick(&overrides.refund_reason_id, &preferences.refund_reason_id)
            .ok_or_else(|| ReconcileError::Config("refund reason is not set".into()))?;
        let environment = pick(&overrides.environment, &preferences.environment)
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            api_username: pick(&overrides.api_username, &preferences.api_username),
            api_password: pick(&overrides.api_password, &preferences.api_password),
            environment,
            account_locator: AccountLocator::new(
                preferences.store_merchant_account_map.clone(),
                merchant_account,
            ),
            refund_reason_id,
        })
    }

    pub fn api_password(&self) -> Option<&str> {
        self.api_password.as_deref()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_username", &self.api_username)
            .field("api_password", &self.api_password.as_ref().map(|_| "****"))
            .field("environment", &self.environment)
            .field("account_locator", &self.account_locator)
            .field("refund_reason_id", &self.refund_reason_id)
            .finish()
    }
}
