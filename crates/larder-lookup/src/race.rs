//! # Provider Race
//!
//! Asks every eligible provider at once and keeps the first valid answer.
//!
//! ## Race Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  providers ──► can_query? ──► eligible                                  │
//! │                                 │  (none eligible → Miss)               │
//! │                                 ▼                                       │
//! │            JoinSet: one task per provider                               │
//! │   ┌──────────────┐ ┌──────────────┐ ┌──────────────┐                   │
//! │   │ spacing wait │ │ spacing wait │ │ spacing wait │                   │
//! │   │ timeout(     │ │ timeout(     │ │ timeout(     │                   │
//! │   │   lookup)    │ │   lookup)    │ │   lookup)    │                   │
//! │   │ retry × n    │ │ retry × n    │ │ retry × n    │                   │
//! │   └──────┬───────┘ └──────┬───────┘ └──────┬───────┘                   │
//! │          └────── join_next (arrival order) ┘                           │
//! │                                 │                                       │
//! │          first Hit ──► shutdown() the rest ──► RaceOutcome::Hit         │
//! │          no Hit    ──► Failed if any task failed, else Miss             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Breaker bookkeeping happens inside each task: clean hits and misses call
//! `mark_success`; exhausted retries, or a miss that follows a transport
//! error, call `mark_failure` once.

use backoff::backoff::Backoff;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::config::LookupPolicy;
use crate::error::LookupError;
use crate::guard::RuntimeGuard;
use crate::providers::{BarcodeProvider, ProviderList};
use crate::retry::LinearBackoff;
use larder_core::validation::is_meaningful_name;
use larder_core::LookupPayload;

// =============================================================================
// Outcomes
// =============================================================================

/// How one provider task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// A payload that passed name validation.
    Hit {
        provider_id: String,
        payload: LookupPayload,
    },
    /// No product, or a payload that failed validation.
    Miss,
    /// Transport failure after every allowed attempt, or a panicked task.
    Failed,
    /// Aborted because another provider won.
    Cancelled,
}

/// Aggregate result of one race.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceOutcome {
    Hit {
        provider_id: String,
        payload: LookupPayload,
    },
    Miss,
    Failed,
}

impl RaceOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, RaceOutcome::Hit { .. })
    }
}

// =============================================================================
// Provider Race
// =============================================================================

/// The registered providers plus the shared state every race consults.
#[derive(Clone)]
pub struct ProviderRace {
    providers: Arc<ProviderList>,
    guard: Arc<RuntimeGuard>,
    policy: Arc<LookupPolicy>,
}

impl ProviderRace {
    pub fn new(providers: ProviderList, guard: Arc<RuntimeGuard>, policy: LookupPolicy) -> Self {
        ProviderRace {
            providers: Arc::new(providers),
            guard,
            policy: Arc::new(policy),
        }
    }

    pub fn guard(&self) -> &Arc<RuntimeGuard> {
        &self.guard
    }

    pub fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    /// Providers whose circuit is currently closed.
    pub async fn eligible(&self) -> Vec<Arc<dyn BarcodeProvider>> {
        let mut eligible = Vec::with_capacity(self.providers.len());
        for provider in self.providers.iter() {
            if self
                .guard
                .can_query(provider.id(), self.policy.breaker_failure_threshold)
                .await
            {
                eligible.push(Arc::clone(provider));
            }
        }
        eligible
    }

    /// Runs the race for one barcode.
    ///
    /// Returns once a winner is known and every other task has been
    /// aborted, or once every task has finished.
    pub async fn run(&self, barcode: &str) -> RaceOutcome {
        let eligible = self.eligible().await;
        if eligible.is_empty() {
            debug!(barcode = %barcode, "No eligible providers");
            return RaceOutcome::Miss;
        }

        let mut tasks = JoinSet::new();
        for provider in eligible {
            let guard = Arc::clone(&self.guard);
            let policy = Arc::clone(&self.policy);
            let barcode = barcode.to_string();
            tasks.spawn(async move { query_provider(provider, guard, policy, barcode).await });
        }

        let mut any_failed = false;
        while let Some(joined) = tasks.join_next().await {
            match classify(joined) {
                ProviderOutcome::Hit {
                    provider_id,
                    payload,
                } => {
                    tasks.shutdown().await;
                    info!(barcode = %barcode, provider = %provider_id, "Provider race won");
                    return RaceOutcome::Hit {
                        provider_id,
                        payload,
                    };
                }
                ProviderOutcome::Failed => any_failed = true,
                ProviderOutcome::Miss | ProviderOutcome::Cancelled => {}
            }
        }

        if any_failed {
            debug!(barcode = %barcode, "Provider race failed");
            RaceOutcome::Failed
        } else {
            debug!(barcode = %barcode, "Provider race missed");
            RaceOutcome::Miss
        }
    }
}

fn classify(joined: Result<ProviderOutcome, JoinError>) -> ProviderOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => ProviderOutcome::Cancelled,
        Err(e) => {
            warn!(error = %e, "Provider task panicked");
            ProviderOutcome::Failed
        }
    }
}

// =============================================================================
// Per-Provider Task
// =============================================================================

/// Queries one provider with spacing, timeout, and retries.
///
/// Every error is retried until `max_attempts` is used up. Once any attempt
/// has failed, an empty or placeholder answer on a later attempt still ends
/// as `Failed`: the provider never gave a trustworthy "no product".
async fn query_provider(
    provider: Arc<dyn BarcodeProvider>,
    guard: Arc<RuntimeGuard>,
    policy: Arc<LookupPolicy>,
    barcode: String,
) -> ProviderOutcome {
    let provider_id = provider.id().to_string();
    let timeout = policy.timeout_for(&provider_id, provider.timeout());
    let mut backoff = LinearBackoff::new(policy.retry_base_delay, policy.max_attempts);
    let mut had_transport_error = false;

    loop {
        guard
            .wait_for_cooldown(&provider_id, policy.provider_spacing)
            .await;

        let attempt = backoff.attempt();
        let result = match tokio::time::timeout(timeout, provider.lookup(&barcode)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(timeout)),
        };

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                had_transport_error = true;
                if let Some(delay) = backoff.next_backoff() {
                    debug!(
                        provider = %provider_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying provider"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                warn!(provider = %provider_id, attempt, error = %e, "Provider lookup failed");
                return fail(&guard, &policy, &provider_id).await;
            }
        };

        match payload {
            Some(payload) if is_meaningful_name(&payload.name, &barcode) => {
                guard.mark_success(&provider_id).await;
                return ProviderOutcome::Hit {
                    provider_id,
                    payload,
                };
            }
            Some(payload) => debug!(
                provider = %provider_id,
                barcode = %barcode,
                name = %payload.name,
                "Rejected placeholder name"
            ),
            None => {}
        }

        if had_transport_error {
            debug!(provider = %provider_id, attempt, "Miss after transport error");
            return fail(&guard, &policy, &provider_id).await;
        }
        guard.mark_success(&provider_id).await;
        return ProviderOutcome::Miss;
    }
}

async fn fail(guard: &RuntimeGuard, policy: &LookupPolicy, provider_id: &str) -> ProviderOutcome {
    guard
        .mark_failure(
            provider_id,
            policy.breaker_failure_threshold,
            policy.breaker_cooldown,
        )
        .await;
    ProviderOutcome::Failed
}

// =============================================================================
// Unit Tests
// =============================================================================
