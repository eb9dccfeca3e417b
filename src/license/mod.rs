//! License validation and usage tracking.
//!
//! The service resolves a license key to a user through the storage layer,
//! applies the tier/limits table, and records per-period consumption.

pub mod handlers;
pub mod key;
pub mod service;
pub mod tiers;

pub use key::{generate_api_key_secret, generate_license_key};
pub use service::{LicenseService, LicenseStatus, TrackMetadata, UsageSnapshot};
pub use tiers::{limits_for, tier_for_price, TierLimits};
