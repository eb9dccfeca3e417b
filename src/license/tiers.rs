//! Canonical subscription tier table and price-id mapping.
//!
//! Both webhook adapters and the validation path resolve tiers through
//! these two functions; there is deliberately no second copy anywhere.

/// Sentinel for tiers with no practical cap. Quota arithmetic still works
/// (remaining stays non-negative) without a special case.
pub const UNCAPPED: i64 = 1_000_000_000;

/// -1 means no device cap.
pub const UNLIMITED_DEVICES: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub daily: i64,
    pub monthly: i64,
    pub max_devices: i32,
}

/// Default quotas per tier. Unknown tier names fall back to free.
pub fn limits_for(tier: &str) -> TierLimits {
    match tier {
        "basic" => TierLimits { daily: 50, monthly: 1000, max_devices: 1 },
        "standard" => TierLimits { daily: 100, monthly: 2000, max_devices: 2 },
        "premium" => TierLimits { daily: 200, monthly: 4000, max_devices: 3 },
        "team" => TierLimits { daily: 600, monthly: 12_000, max_devices: 10 },
        "unlimited" => TierLimits { daily: UNCAPPED, monthly: UNCAPPED, max_devices: 3 },
        "team-unlimited" => TierLimits {
            daily: UNCAPPED,
            monthly: UNCAPPED,
            max_devices: UNLIMITED_DEVICES,
        },
        // "free" and anything unrecognized
        _ => TierLimits { daily: 5, monthly: 100, max_devices: 1 },
    }
}

/// Maps a payment-processor price/product id to a tier name. Covers both
/// Paddle price ids and Gumroad product permalinks. Unmapped ids return
/// `None`; webhook handlers must treat that as a logged no-op.
pub fn tier_for_price(price_id: &str) -> Option<&'static str> {
    match price_id {
        "pri_hive_basic_monthly" | "pri_hive_basic_yearly" | "hive-basic" => Some("basic"),
        "pri_hive_standard_monthly" | "pri_hive_standard_yearly" | "hive-standard" => {
            Some("standard")
        }
        "pri_hive_premium_monthly" | "pri_hive_premium_yearly" | "hive-premium" => Some("premium"),
        "pri_hive_team_monthly" | "pri_hive_team_yearly" | "hive-team" => Some("team"),
        "pri_hive_unlimited_monthly" | "hive-unlimited" => Some("unlimited"),
        "pri_hive_team_unlimited_monthly" | "hive-team-unlimited" => Some("team-unlimited"),
        _ => None,
    }
}

/// Paddle products whose prices the billing endpoint lists.
pub const PADDLE_PRODUCT_IDS: &[&str] = &[
    "pro_hive_basic",
    "pro_hive_standard",
    "pro_hive_premium",
    "pro_hive_team",
];
