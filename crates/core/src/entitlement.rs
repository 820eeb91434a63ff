//! Entitlement resolution: credential string -> tier and limits.
//!
//! [`PrefixCredentialResolver`] is a structural placeholder check (prefix
//! plus minimum length). It performs no cryptographic verification and no
//! revocation; any string satisfying the predicate is accepted. Swap in a
//! different [`EntitlementResolver`] for server-issued, verifiable tokens.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for "no limit" in limit and remaining-count fields.
pub const UNLIMITED: i64 = -1;

/// Credential recorded when the caller supplied none.
pub const FREE_CREDENTIAL: &str = "FREE";

pub const DEFAULT_PREMIUM_PREFIX: &str = "PREMIUM-";
pub const DEFAULT_PREMIUM_MIN_LEN: usize = 21;
pub const DEFAULT_FREE_MONTHLY_IMAGES: i64 = 100;
pub const DEFAULT_FRAME_CEILING: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

/// Limits attached to one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    /// Monthly image allowance; [`UNLIMITED`] for no bound.
    pub monthly_images: i64,
    /// Maximum frames a single remote extraction returns.
    pub frame_ceiling: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementLimits {
    pub free: TierLimits,
    pub premium: TierLimits,
}

impl EntitlementLimits {
    pub fn for_tier(&self, tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => self.free,
            Tier::Premium => self.premium,
        }
    }
}

impl Default for EntitlementLimits {
    fn default() -> Self {
        Self {
            free: TierLimits {
                monthly_images: DEFAULT_FREE_MONTHLY_IMAGES,
                frame_ceiling: DEFAULT_FRAME_CEILING,
            },
            premium: TierLimits {
                monthly_images: UNLIMITED,
                frame_ceiling: DEFAULT_FRAME_CEILING,
            },
        }
    }
}

/// The active entitlement of one client context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub tier: Tier,
    pub credential: String,
    pub monthly_image_limit: i64,
    pub period_reset_at: DateTime<Utc>,
}

impl Entitlement {
    pub fn is_unlimited(&self) -> bool {
        self.tier == Tier::Premium || self.monthly_image_limit < 0
    }
}

/// Classifies a credential into an [`Entitlement`].
pub trait EntitlementResolver: Send + Sync {
    /// Pure classification; `now` only seeds `period_reset_at`.
    fn resolve(&self, credential: Option<&str>, now: DateTime<Utc>) -> Entitlement;

    /// Limits for a tier (frame ceiling, monthly allowance).
    fn limits(&self, tier: Tier) -> TierLimits;
}

/// Premium iff the credential starts with `prefix` and has at least
/// `min_len` characters.
#[derive(Debug, Clone)]
pub struct PrefixCredentialResolver {
    prefix: String,
    min_len: usize,
    limits: EntitlementLimits,
}

impl PrefixCredentialResolver {
    pub fn new(prefix: impl Into<String>, min_len: usize, limits: EntitlementLimits) -> Self {
        Self {
            prefix: prefix.into(),
            min_len,
            limits,
        }
    }

    fn is_premium(&self, credential: &str) -> bool {
        credential.starts_with(&self.prefix) && credential.chars().count() >= self.min_len
    }
}

impl Default for PrefixCredentialResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_PREMIUM_PREFIX,
            DEFAULT_PREMIUM_MIN_LEN,
            EntitlementLimits::default(),
        )
    }
}

impl EntitlementResolver for PrefixCredentialResolver {
    fn resolve(&self, credential: Option<&str>, now: DateTime<Utc>) -> Entitlement {
        let credential = credential.filter(|c| !c.is_empty());
        let (tier, credential) = match credential {
            None => (Tier::Free, FREE_CREDENTIAL.to_string()),
            Some(c) if self.is_premium(c) => (Tier::Premium, c.to_string()),
            Some(c) => (Tier::Free, c.to_string()),
        };
        Entitlement {
            tier,
            credential,
            monthly_image_limit: self.limits.for_tier(tier).monthly_images,
            period_reset_at: next_period_start(now),
        }
    }

    fn limits(&self, tier: Tier) -> TierLimits {
        self.limits.for_tier(tier)
    }
}

/// First instant (UTC) of the calendar month after `now`.
pub fn next_period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn absent_credential_is_free_with_synthetic_key() {
        let e = PrefixCredentialResolver::default().resolve(None, at(2026, 3, 14));
        assert_eq!(e.tier, Tier::Free);
        assert_eq!(e.credential, FREE_CREDENTIAL);
        assert_eq!(e.monthly_image_limit, 100);
    }

    #[test]
    fn empty_credential_treated_as_absent() {
        let e = PrefixCredentialResolver::default().resolve(Some(""), at(2026, 3, 14));
        assert_eq!(e.credential, FREE_CREDENTIAL);
    }

    #[test]
    fn premium_requires_prefix_and_length() {
        let r = PrefixCredentialResolver::default();
        let now = at(2026, 3, 14);

        let e = r.resolve(Some("PREMIUM-ABCDEFGHIJKLMNOP"), now);
        assert_eq!(e.tier, Tier::Premium);
        assert_eq!(e.monthly_image_limit, UNLIMITED);
        assert!(e.is_unlimited());

        assert_eq!(r.resolve(Some("PREMIUM-1"), now).tier, Tier::Free);
        assert_eq!(r.resolve(Some("PREMIUM-123456789012"), now).tier, Tier::Free);
        assert_eq!(r.resolve(Some("PREMIUM-1234567890123"), now).tier, Tier::Premium);
        assert_eq!(
            r.resolve(Some("premium-ABCDEFGHIJKLMNOPQRS"), now).tier,
            Tier::Free
        );
    }

    #[test]
    fn free_credential_is_kept_verbatim() {
        let e = PrefixCredentialResolver::default().resolve(Some("GIFT-42"), at(2026, 3, 14));
        assert_eq!(e.tier, Tier::Free);
        assert_eq!(e.credential, "GIFT-42");
    }

    #[test]
    fn reset_is_first_instant_of_next_month() {
        let e = PrefixCredentialResolver::default().resolve(None, at(2026, 3, 14));
        assert_eq!(e.period_reset_at, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn december_rolls_into_next_year() {
        assert_eq!(
            next_period_start(at(2025, 12, 31)),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn custom_limits_flow_through() {
        let limits = EntitlementLimits {
            free: TierLimits {
                monthly_images: 5,
                frame_ceiling: 3,
            },
            premium: TierLimits {
                monthly_images: UNLIMITED,
                frame_ceiling: 50,
            },
        };
        let r = PrefixCredentialResolver::new("VIP-", 6, limits);
        assert_eq!(r.resolve(None, at(2026, 1, 1)).monthly_image_limit, 5);
        assert_eq!(r.resolve(Some("VIP-XY"), at(2026, 1, 1)).tier, Tier::Premium);
        assert_eq!(r.limits(Tier::Premium).frame_ceiling, 50);
    }
}
