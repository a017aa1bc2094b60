//! # Runtime Guard
//!
//! Shared resilience state for every lookup: per-provider circuit breakers,
//! per-provider request spacing, and the barcode negative cache.
//!
//! ## Circuit Breaker
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Provider Circuit States                              │
//! │                                                                         │
//! │   ┌──────────┐  failure (n < threshold)   ┌──────────┐                 │
//! │   │  Closed  │ ─────────────────────────► │  Closed  │                 │
//! │   │ fails=0  │ ◄───────── success ─────── │ fails=n  │                 │
//! │   └──────────┘                            └────┬─────┘                 │
//! │        ▲                                       │ failure #threshold    │
//! │        │                                       ▼                       │
//! │        │   can_query() after cooldown   ┌──────────────┐               │
//! │        └─────────── (reset) ─────────── │     Open     │               │
//! │                                         │ until now+cd │               │
//! │                                         └──────────────┘               │
//! │                                          can_query() = false           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! All state sits behind one `tokio::sync::Mutex`. Every check-then-set
//! happens inside a single lock scope. `wait_for_cooldown` reserves its
//! slot under the lock and sleeps after releasing it.
//!
//! Time comes from `tokio::time::Instant`, so tests can pause the clock.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stand-in for "never" when a configured duration overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

fn deadline(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

// =============================================================================
// Provider State
// =============================================================================

/// Breaker state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderState {
    pub consecutive_failures: u32,
    pub open_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct GuardState {
    providers: HashMap<String, ProviderState>,
    next_slot: HashMap<String, Instant>,
    negative_cache: HashMap<String, Instant>,
}

impl GuardState {
    fn prune_expired_locks(&mut self, now: Instant) {
        for state in self.providers.values_mut() {
            if matches!(state.open_until, Some(until) if until <= now) {
                *state = ProviderState::default();
            }
        }
    }

    fn prune_negative_cache(&mut self, now: Instant) {
        self.negative_cache.retain(|_, expires_at| *expires_at > now);
    }
}

// =============================================================================
// Runtime Guard
// =============================================================================

/// Serialized resilience state shared by all lookups.
#[derive(Debug, Default)]
pub struct RuntimeGuard {
    state: Mutex<GuardState>,
}

impl RuntimeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Circuit Breaker
    // =========================================================================

    /// Returns false only while the provider's circuit is open.
    ///
    /// A threshold of 0 disables the breaker. Expired locks are reset to a
    /// closed circuit with zero failures.
    pub async fn can_query(&self, provider_id: &str, failure_threshold: u32) -> bool {
        if failure_threshold == 0 {
            return true;
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.prune_expired_locks(now);

        match state.providers.get(provider_id).and_then(|s| s.open_until) {
            Some(until) if until > now => {
                debug!(provider = %provider_id, "Circuit open, skipping provider");
                false
            }
            _ => true,
        }
    }

    /// Closes the circuit and forgets past failures.
    pub async fn mark_success(&self, provider_id: &str) {
        let mut state = self.state.lock().await;
        state
            .providers
            .insert(provider_id.to_string(), ProviderState::default());
    }

    /// Records one failed lookup. Returns true when this failure opened the circuit.
    pub async fn mark_failure(
        &self,
        provider_id: &str,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> bool {
        let threshold = failure_threshold.max(1);
        let now = Instant::now();

        let mut state = self.state.lock().await;
        let entry = state.providers.entry(provider_id.to_string()).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);

        if entry.consecutive_failures >= threshold {
            entry.open_until = Some(deadline(now, cooldown));
            warn!(
                provider = %provider_id,
                failures = entry.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit opened"
            );
            return true;
        }

        false
    }

    /// Snapshot of one provider's breaker state.
    pub async fn provider_state(&self, provider_id: &str) -> ProviderState {
        let state = self.state.lock().await;
        state
            .providers
            .get(provider_id)
            .copied()
            .unwrap_or_default()
    }

    // =========================================================================
    // Request Spacing
    // =========================================================================

    /// Suspends the caller until at least `min_delay` has passed since the
    /// previous call to the same provider was allowed through.
    ///
    /// The slot stays reserved if the caller is aborted while waiting, so
    /// the next call is spaced from a slot that was never used.
    pub async fn wait_for_cooldown(&self, provider_id: &str, min_delay: Duration) {
        if min_delay.is_zero() {
            return;
        }

        let now = Instant::now();
        let slot = {
            let mut state = self.state.lock().await;
            let slot = match state.next_slot.get(provider_id) {
                Some(previous) => deadline(*previous, min_delay).max(now),
                None => now,
            };
            state.next_slot.insert(provider_id.to_string(), slot);
            slot
        };

        if slot > now {
            debug!(
                provider = %provider_id,
                wait_ms = (slot - now).as_millis() as u64,
                "Waiting for provider spacing"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    // =========================================================================
    // Negative Cache
    // =========================================================================

    /// True while a recent total miss for this barcode is remembered.
    pub async fn is_cached(&self, barcode: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.prune_negative_cache(now);
        state.negative_cache.contains_key(barcode)
    }

    /// Remembers a total miss for `ttl`. A zero TTL does nothing.
    pub async fn save(&self, barcode: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.prune_negative_cache(now);
        state.negative_cache.insert(barcode.to_string(), deadline(now, ttl));
        debug!(barcode = %barcode, ttl_secs = ttl.as_secs(), "Negative cache entry saved");
    }

    /// Forgets any remembered miss for this barcode.
    pub async fn clear(&self, barcode: &str) {
        let mut state = self.state.lock().await;
        state.negative_cache.remove(barcode);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
