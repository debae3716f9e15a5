//! Admission-time checks performed before a job row is ever created.

use async_trait::async_trait;
use thiserror::Error;

use crate::Platform;

/// Reasons admission can be refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreflightError {
    /// No network connectivity at all.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// Policy requires an unmetered network and only a metered one is up.
    #[error("downloads restricted to wifi and no wifi network is available")]
    PolicyBlocked,

    /// No or expired credential for the platform.
    #[error("no valid credential for {platform}")]
    AuthMissing {
        /// The platform missing a credential.
        platform: Platform,
    },
}

/// Connectivity and credential checks, supplied by the host application.
///
/// A single instance is owned by the composition root and handed by reference
/// to the queue manager; no process-wide singleton is involved.
#[async_trait]
pub trait PreflightChecker: Send + Sync {
    /// Verifies network availability, honoring the wifi-only policy.
    async fn check_network(&self, wifi_only: bool) -> Result<(), PreflightError>;

    /// Verifies a usable credential exists for the platform.
    async fn check_login(&self, platform: Platform) -> Result<(), PreflightError>;
}
