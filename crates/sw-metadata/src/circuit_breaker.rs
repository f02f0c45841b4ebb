//! Per-provider circuit breaker.
//!
//! Each provider id gets its own circuit, created lazily on first use:
//!
//! ```text
//! Closed ──(failures >= threshold)──▶ Open
//! Open ──(reset_timeout elapsed, one caller admitted)──▶ HalfOpen
//! HalfOpen ──(trial succeeds)──▶ Closed
//! HalfOpen ──(trial fails)──▶ Open (timer restarts)
//! ```
//!
//! While half-open exactly one trial call is admitted. The admission is
//! decided under the map lock, so two callers that both observe an expired
//! open circuit cannot both become the trial.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sw_core::config::{CircuitBreakerConfig, MetadataConfig};
use sw_core::ProviderId;
use tracing::{debug, info, warn};

/// Runtime circuit state for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Consecutive failures before opening. Never below 1.
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl BreakerPolicy {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.reset_timeout_secs),
        )
    }
}

/// Read-only snapshot of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStats {
    pub provider_id: ProviderId,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    opened_at: Option<Instant>,
    /// Set while the single half-open trial is outstanding.
    trial_started_at: Option<Instant>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            opened_at: None,
            trial_started_at: None,
        }
    }
}

impl Circuit {
    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_started_at = None;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        self.trial_started_at = None;
    }
}

/// Thread-safe set of per-provider circuits.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    defaults: BreakerPolicy,
    policies: Mutex<HashMap<ProviderId, BreakerPolicy>>,
    circuits: Mutex<HashMap<ProviderId, Circuit>>,
}

impl CircuitBreaker {
    pub fn new(defaults: BreakerPolicy) -> Self {
        Self {
            defaults,
            policies: Mutex::new(HashMap::new()),
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Build a breaker from the metadata config: defaults plus per-provider
    /// overrides.
    pub fn from_config(config: &MetadataConfig) -> Self {
        let breaker = Self::new(BreakerPolicy::from(&config.circuit_breaker));
        for (id, over) in &config.circuit_overrides {
            let resolved = over.apply(&config.circuit_breaker);
            breaker.set_policy(&ProviderId::new(id.as_str()), BreakerPolicy::from(&resolved));
        }
        breaker
    }

    /// Builder-style [`set_policy`](Self::set_policy).
    pub fn with_policy(self, id: impl Into<ProviderId>, policy: BreakerPolicy) -> Self {
        self.set_policy(&id.into(), policy);
        self
    }

    /// Override the thresholds for one provider.
    pub fn set_policy(&self, id: &ProviderId, policy: BreakerPolicy) {
        self.policies.lock().insert(id.clone(), policy);
    }

    /// The override for `id`, or the defaults.
    pub fn policy_for(&self, id: &ProviderId) -> BreakerPolicy {
        self.policies
            .lock()
            .get(id)
            .copied()
            .unwrap_or(self.defaults)
    }

    /// Decide whether a call to `id` may be attempted.
    ///
    /// Closed always admits. Open rejects until the reset timeout elapses,
    /// then becomes half-open and admits the caller as the single trial.
    /// Half-open rejects while the trial is outstanding.
    pub fn can_proceed(&self, id: &ProviderId) -> bool {
        let policy = self.policy_for(id);
        let now = Instant::now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(id.clone()).or_default();

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .map(|opened_at| now.duration_since(opened_at) >= policy.reset_timeout)
                    .unwrap_or(true);
                if !elapsed {
                    return false;
                }
                circuit.state = CircuitState::HalfOpen;
                circuit.opened_at = None;
                circuit.trial_started_at = Some(now);
                info!(provider = %id, "Circuit half-open; admitting trial call");
                true
            }
            CircuitState::HalfOpen => match circuit.trial_started_at {
                // An abandoned trial goes stale after one reset timeout.
                Some(started) if now.duration_since(started) < policy.reset_timeout => false,
                stale => {
                    if stale.is_some() {
                        warn!(provider = %id, "Half-open trial never reported back; admitting a new one");
                    }
                    circuit.trial_started_at = Some(now);
                    true
                }
            },
        }
    }

    /// Report a successful call.
    pub fn record_success(&self, id: &ProviderId) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(id.clone()).or_default();

        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.close();
                info!(provider = %id, "Circuit closed after successful trial");
            }
            CircuitState::Closed => {
                if circuit.failure_count > 0 {
                    debug!(
                        provider = %id,
                        cleared = circuit.failure_count,
                        "Success cleared failure count"
                    );
                }
                circuit.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Report a failed call.
    pub fn record_failure(&self, id: &ProviderId) {
        let policy = self.policy_for(id);
        let now = Instant::now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(id.clone()).or_default();

        circuit.failure_count = circuit.failure_count.saturating_add(1);
        circuit.last_failure_time = Some(Utc::now());

        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.open(now);
                warn!(provider = %id, "Half-open trial failed; circuit re-opened");
            }
            CircuitState::Closed if circuit.failure_count >= policy.failure_threshold => {
                circuit.open(now);
                warn!(
                    provider = %id,
                    failures = circuit.failure_count,
                    reset_timeout = ?policy.reset_timeout,
                    "Circuit opened"
                );
            }
            CircuitState::Closed => {
                debug!(
                    provider = %id,
                    failures = circuit.failure_count,
                    threshold = policy.failure_threshold,
                    "Recorded provider failure"
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Snapshot of a provider's circuit. Unknown providers read as closed.
    pub fn stats(&self, id: &ProviderId) -> CircuitStats {
        let circuits = self.circuits.lock();
        match circuits.get(id) {
            Some(circuit) => CircuitStats {
                provider_id: id.clone(),
                state: circuit.state,
                failure_count: circuit.failure_count,
                last_failure_time: circuit.last_failure_time,
            },
            None => CircuitStats {
                provider_id: id.clone(),
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            },
        }
    }

    pub fn state(&self, id: &ProviderId) -> CircuitState {
        self.stats(id).state
    }

    /// Force a circuit closed and clear its failure count.
    pub fn reset(&self, id: &ProviderId) {
        let mut circuits = self.circuits.lock();
        if let Some(circuit) = circuits.get_mut(id) {
            circuit.close();
            info!(provider = %id, "Circuit reset by operator");
        }
    }
}
