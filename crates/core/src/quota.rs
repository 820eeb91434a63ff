//! Monthly usage quota ledger.
//!
//! One [`QuotaLedger`] per client context holds the active [`Entitlement`]
//! and the period's [`UsageStats`]. Every operation takes the ledger's lock,
//! applies the monthly rollover, then reads or mutates state, so concurrent
//! capture requests cannot lose updates.
//!
//! Admission ([`QuotaLedger::can_admit`]) and recording
//! ([`QuotaLedger::record_usage`]) are separate critical sections. Callers
//! that cannot tolerate the gap between them use [`QuotaLedger::reserve`],
//! which holds the requested images against the allowance until the
//! returned [`QuotaReservation`] is committed or dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::entitlement::{
    next_period_start, Entitlement, EntitlementResolver, PrefixCredentialResolver, UNLIMITED,
};
use crate::error::CoreError;
use crate::store::{LedgerStore, MemoryStore};

/// Usage counters for the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub images_generated: u64,
    pub videos_processed: u64,
    pub period_started_at: DateTime<Utc>,
}

impl UsageStats {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            images_generated: 0,
            videos_processed: 0,
            period_started_at: now,
        }
    }
}

/// Point-in-time view of a ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub entitlement: Entitlement,
    pub usage: UsageStats,
    /// [`UNLIMITED`] for premium.
    pub remaining_images: i64,
    pub reserved_images: u64,
}

#[derive(Debug)]
struct LedgerState {
    entitlement: Entitlement,
    usage: UsageStats,
    reserved_images: u64,
}

impl LedgerState {
    fn remaining(&self) -> i64 {
        if self.entitlement.is_unlimited() {
            return UNLIMITED;
        }
        let used = i64::try_from(self.usage.images_generated).unwrap_or(i64::MAX);
        (self.entitlement.monthly_image_limit - used).max(0)
    }

    /// Whether `used + extra <= limit`; always true when unlimited.
    fn fits(&self, extra: u64) -> bool {
        if self.entitlement.is_unlimited() {
            return true;
        }
        let limit = u64::try_from(self.entitlement.monthly_image_limit).unwrap_or(0);
        self.usage
            .images_generated
            .checked_add(extra)
            .is_some_and(|total| total <= limit)
    }

    fn commit(&mut self, produced: u64) -> bool {
        if !self.fits(produced) {
            return false;
        }
        self.usage.images_generated += produced;
        self.usage.videos_processed += 1;
        true
    }
}

pub struct QuotaLedger {
    state: Mutex<LedgerState>,
    store: Arc<dyn LedgerStore>,
    resolver: Arc<dyn EntitlementResolver>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for QuotaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaLedger")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl QuotaLedger {
    /// Open a ledger over `store`, falling back to a fresh free-tier state
    /// when nothing (or nothing readable) was persisted.
    pub fn open(
        store: Arc<dyn LedgerStore>,
        resolver: Arc<dyn EntitlementResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let entitlement = store
            .load_entitlement()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load entitlement, starting fresh");
                None
            })
            .unwrap_or_else(|| resolver.resolve(None, now));
        let usage = store
            .load_usage()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load usage stats, starting fresh");
                None
            })
            .unwrap_or_else(|| UsageStats::empty(now));

        Self {
            state: Mutex::new(LedgerState {
                entitlement,
                usage,
                reserved_images: 0,
            }),
            store,
            resolver,
            clock,
        }
    }

    /// A free-tier ledger that only lives in memory, on the system clock.
    pub fn in_memory() -> Self {
        Self::open(
            Arc::new(MemoryStore::new()),
            Arc::new(PrefixCredentialResolver::default()),
            Arc::new(SystemClock),
        )
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock and apply the monthly rollover.
    fn lock_current(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.lock();
        self.rollover(&mut state, self.clock.now());
        state
    }

    /// Zero the counters when `now` falls in a different calendar month
    /// than the period start. A second call in the same month is a no-op.
    fn rollover(&self, state: &mut LedgerState, now: DateTime<Utc>) {
        let started = state.usage.period_started_at;
        if started.year() == now.year() && started.month() == now.month() {
            return;
        }
        tracing::info!(
            previous_period = %started,
            images = state.usage.images_generated,
            videos = state.usage.videos_processed,
            "Monthly usage rollover"
        );
        state.usage = UsageStats::empty(now);
        state.entitlement.period_reset_at = next_period_start(now);
        self.persist(state);
    }

    fn persist(&self, state: &LedgerState) {
        if let Err(e) = self.store.save_usage(&state.usage) {
            tracing::warn!(error = %e, "Failed to persist usage stats");
        }
        if let Err(e) = self.store.save_entitlement(&state.entitlement) {
            tracing::warn!(error = %e, "Failed to persist entitlement");
        }
    }

    /// Whether `requested` more images fit in this period's allowance.
    ///
    /// Images held by outstanding reservations count as used.
    pub fn can_admit(&self, requested: u64) -> bool {
        let state = self.lock_current();
        state.fits(state.reserved_images.saturating_add(requested))
    }

    /// Record a completed capture of `produced` images.
    ///
    /// All-or-nothing: on a free tier, an increment that would exceed the
    /// limit is rejected whole and returns `false`, leaving usage untouched.
    pub fn record_usage(&self, produced: u64) -> bool {
        let mut state = self.lock_current();
        let committed = state.commit(produced);
        if committed {
            self.persist(&state);
        } else {
            tracing::warn!(
                produced,
                used = state.usage.images_generated,
                limit = state.entitlement.monthly_image_limit,
                "Usage increment rejected: would exceed monthly limit"
            );
        }
        committed
    }

    /// Images left this period; [`UNLIMITED`] for premium.
    pub fn remaining_images(&self) -> i64 {
        self.lock_current().remaining()
    }

    /// Replace the active entitlement wholesale from a new credential.
    /// Usage for the period is unaffected.
    pub fn set_credential(&self, credential: Option<&str>) -> Entitlement {
        let mut state = self.lock_current();
        state.entitlement = self.resolver.resolve(credential, self.clock.now());
        self.persist(&state);
        tracing::info!(tier = state.entitlement.tier.as_str(), "Entitlement replaced");
        state.entitlement.clone()
    }

    pub fn entitlement(&self) -> Entitlement {
        self.lock_current().entitlement.clone()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock_current();
        LedgerSnapshot {
            entitlement: state.entitlement.clone(),
            usage: state.usage.clone(),
            remaining_images: state.remaining(),
            reserved_images: state.reserved_images,
        }
    }

    /// Hold `requested` images against the allowance.
    ///
    /// Fails with [`CoreError::QuotaExceeded`] when they do not fit next to
    /// current usage and other outstanding reservations.
    pub fn reserve(self: &Arc<Self>, requested: u64) -> Result<QuotaReservation, CoreError> {
        let mut state = self.lock_current();
        if !state.fits(state.reserved_images.saturating_add(requested)) {
            return Err(CoreError::QuotaExceeded {
                requested,
                remaining: state.remaining(),
            });
        }
        state.reserved_images += requested;
        Ok(QuotaReservation {
            ledger: Arc::clone(self),
            images: requested,
            settled: false,
        })
    }

    fn settle(&self, reserved: u64, produced: Option<u64>) -> bool {
        let mut state = self.lock_current();
        state.reserved_images = state.reserved_images.saturating_sub(reserved);
        let Some(produced) = produced else {
            return true;
        };
        let committed = state.commit(produced);
        if committed {
            self.persist(&state);
        }
        committed
    }
}

/// Images held against a ledger's allowance until committed or dropped.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it immediately"]
pub struct QuotaReservation {
    ledger: Arc<QuotaLedger>,
    images: u64,
    settled: bool,
}

impl QuotaReservation {
    pub fn images(&self) -> u64 {
        self.images
    }

    /// Release the hold and record `produced` images, with the same
    /// all-or-nothing rule as [`QuotaLedger::record_usage`].
    pub fn commit(mut self, produced: u64) -> bool {
        self.settled = true;
        self.ledger.settle(self.images, Some(produced))
    }

    /// Release the hold without recording anything.
    pub fn release(mut self) {
        self.settled = true;
        self.ledger.settle(self.images, None);
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.settle(self.images, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;
    use crate::entitlement::Tier;

    fn t(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn free_ledger_with_usage(used: u64, clock: Arc<ManualClock>) -> QuotaLedger {
        let now = clock.now();
        let resolver = PrefixCredentialResolver::default();
        let store = MemoryStore::with_state(
            Some(resolver.resolve(None, now)),
            Some(UsageStats {
                images_generated: used,
                videos_processed: 1,
                period_started_at: now,
            }),
        );
        QuotaLedger::open(Arc::new(store), Arc::new(resolver), clock)
    }

    #[test]
    fn fresh_ledger_is_free_with_full_allowance() {
        let ledger = QuotaLedger::in_memory();
        assert_eq!(ledger.entitlement().tier, Tier::Free);
        assert_eq!(ledger.remaining_images(), 100);
        assert!(ledger.can_admit(100));
        assert!(!ledger.can_admit(101));
    }

    #[test]
    fn near_limit_scenario() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = free_ledger_with_usage(98, clock);

        assert!(!ledger.can_admit(5));
        assert!(ledger.record_usage(2));
        assert_eq!(ledger.snapshot().usage.images_generated, 100);
        assert!(!ledger.can_admit(1));
        assert_eq!(ledger.remaining_images(), 0);
    }

    #[test]
    fn rejected_increment_is_not_partially_committed() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = free_ledger_with_usage(95, clock);

        assert!(!ledger.record_usage(6));
        let snap = ledger.snapshot();
        assert_eq!(snap.usage.images_generated, 95);
        assert_eq!(snap.usage.videos_processed, 1);

        assert!(ledger.record_usage(5));
        assert_eq!(ledger.snapshot().usage.videos_processed, 2);
    }

    #[test]
    fn usage_never_exceeds_limit_over_many_calls() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = free_ledger_with_usage(0, clock);
        for n in [7u64, 13, 40, 1, 55, 30, 9, 3] {
            ledger.record_usage(n);
            assert!(ledger.snapshot().usage.images_generated <= 100);
        }
    }

    #[test]
    fn premium_is_unbounded() {
        let ledger = QuotaLedger::in_memory();
        ledger.set_credential(Some("PREMIUM-ABCDEFGHIJKLMNOP"));
        assert!(ledger.can_admit(1_000_000));
        assert!(ledger.record_usage(5_000));
        assert_eq!(ledger.remaining_images(), UNLIMITED);
    }

    #[test]
    fn set_credential_replaces_but_keeps_usage() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = free_ledger_with_usage(40, clock);

        let e = ledger.set_credential(Some("PREMIUM-ABCDEFGHIJKLMNOP"));
        assert_eq!(e.tier, Tier::Premium);
        let e = ledger.set_credential(Some("PREMIUM-1"));
        assert_eq!(e.tier, Tier::Free);
        assert_eq!(e.credential, "PREMIUM-1");
        assert_eq!(ledger.remaining_images(), 60);
    }

    #[test]
    fn rollover_resets_counters_once() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 28, 9)));
        let ledger = free_ledger_with_usage(100, Arc::clone(&clock));
        assert!(!ledger.can_admit(1));

        clock.set(t(2026, 7, 1, 0));
        assert!(ledger.can_admit(1));
        let once = ledger.snapshot();

        for _ in 0..5 {
            ledger.can_admit(1);
            ledger.remaining_images();
        }
        let many = ledger.snapshot();

        assert_eq!(once, many);
        assert_eq!(many.usage.images_generated, 0);
        assert_eq!(many.usage.videos_processed, 0);
        assert_eq!(many.usage.period_started_at, t(2026, 7, 1, 0));
        assert_eq!(many.entitlement.period_reset_at, t(2026, 8, 1, 0));
    }

    #[test]
    fn rollover_applies_to_same_month_of_another_year() {
        let clock = Arc::new(ManualClock::new(t(2025, 6, 10, 9)));
        let ledger = free_ledger_with_usage(70, Arc::clone(&clock));
        clock.set(t(2026, 6, 10, 9));
        assert_eq!(ledger.remaining_images(), 100);
    }

    #[test]
    fn state_survives_reopen_through_store() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        let resolver: Arc<dyn EntitlementResolver> = Arc::new(PrefixCredentialResolver::default());

        let ledger = QuotaLedger::open(Arc::clone(&store), Arc::clone(&resolver), clock.clone());
        assert!(ledger.record_usage(12));
        drop(ledger);

        let reopened = QuotaLedger::open(store, resolver, clock);
        assert_eq!(reopened.remaining_images(), 88);
    }

    #[test]
    fn reservation_holds_allowance_until_released() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = Arc::new(free_ledger_with_usage(90, clock));

        let held = ledger.reserve(8).expect("fits");
        assert!(!ledger.can_admit(3));
        assert_matches!(
            ledger.reserve(3),
            Err(CoreError::QuotaExceeded {
                requested: 3,
                remaining: 10
            })
        );

        drop(held);
        assert!(ledger.can_admit(3));
        assert_eq!(ledger.snapshot().reserved_images, 0);
    }

    #[test]
    fn reservation_commit_records_actual_count() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = Arc::new(free_ledger_with_usage(0, clock));

        let held = ledger.reserve(10).expect("fits");
        assert!(held.commit(6));

        let snap = ledger.snapshot();
        assert_eq!(snap.usage.images_generated, 6);
        assert_eq!(snap.reserved_images, 0);
    }

    #[test]
    fn concurrent_recording_never_overshoots() {
        let clock = Arc::new(ManualClock::new(t(2026, 6, 10, 9)));
        let ledger = Arc::new(free_ledger_with_usage(0, clock));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || (0..10).filter(|_| ledger.record_usage(1)).count())
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(accepted, 100);
        assert_eq!(ledger.snapshot().usage.images_generated, 100);
    }
}
