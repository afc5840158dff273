//! Process-wide deprecation policy.
//!
//! The policy is fixed once per process: either installed explicitly at
//! startup with [`install`], or read lazily from the
//! `AIKV_CLIENT_DEPRECATIONS` environment variable (`warn`, `silence` or
//! `raise`). It cannot change afterwards.

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::error::{ClientError, Result};

/// Environment variable consulted when no policy was installed
pub const DEPRECATIONS_ENV: &str = "AIKV_CLIENT_DEPRECATIONS";

static POLICY: OnceCell<DeprecationPolicy> = OnceCell::new();

/// What to do when a deprecated option or call is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeprecationPolicy {
    /// Log a warning and continue
    #[default]
    Warn,
    /// Continue silently
    Silence,
    /// Fail with [`ClientError::Deprecated`]
    Raise,
}

impl DeprecationPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "warn" | "warning" => Some(Self::Warn),
            "silence" | "silent" | "off" => Some(Self::Silence),
            "raise" | "error" => Some(Self::Raise),
            _ => None,
        }
    }

    fn from_env() -> Self {
        match std::env::var(DEPRECATIONS_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "unknown {}, using 'warn'", DEPRECATIONS_ENV);
                Self::Warn
            }),
            Err(_) => Self::Warn,
        }
    }
}

/// Install the policy for this process.
///
/// Returns the rejected policy if one was already installed or read.
pub fn install(policy: DeprecationPolicy) -> std::result::Result<(), DeprecationPolicy> {
    POLICY.set(policy)
}

/// The policy in effect
pub fn current() -> DeprecationPolicy {
    #[cfg(test)]
    if let Some(policy) = TEST_OVERRIDE.with(|cell| cell.get()) {
        return policy;
    }
    *POLICY.get_or_init(DeprecationPolicy::from_env)
}

/// Report use of a deprecated feature under the current policy
pub(crate) fn deprecate(message: &str) -> Result<()> {
    match current() {
        DeprecationPolicy::Silence => Ok(()),
        DeprecationPolicy::Warn => {
            warn!("deprecated: {}", message);
            Ok(())
        }
        DeprecationPolicy::Raise => Err(ClientError::Deprecated(message.to_string())),
    }
}

#[cfg(test)]
thread_local! {
    static TEST_OVERRIDE: std::cell::Cell<Option<DeprecationPolicy>> =
        const { std::cell::Cell::new(None) };
}

/// Override the policy for the current test thread
#[cfg(test)]
pub(crate) fn set_for_test(policy: Option<DeprecationPolicy>) {
    TEST_OVERRIDE.with(|cell| cell.set(policy));
}
