//! Admission gate between a fired trigger and `signal:new` emission.
//!
//! Grounded on the shared-state-behind-a-single-writer-lock shape the
//! teacher's risk manager used for Kelly sizing, generalized here from
//! bankroll/position-sizing math to throttle-window + concurrency admission.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::Signal;

#[derive(Debug, Clone)]
pub struct RiskGovernorConfig {
    pub throttle_window_ms: i64,
    pub max_concurrent_signals: usize,
    pub max_risk_budget: f64,
}

impl Default for RiskGovernorConfig {
    fn default() -> Self {
        Self {
            throttle_window_ms: 300_000,
            max_concurrent_signals: 10,
            max_risk_budget: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ThrottleKey {
    rule_id_hash: u64,
    bar_seq: i64,
}

fn hash_rule_id(rule_id: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    rule_id.hash(&mut hasher);
    hasher.finish()
}

struct Inner {
    active: HashMap<uuid::Uuid, Signal>,
    throttle: HashMap<ThrottleKey, i64>,
    risk_in_use: f64,
}

pub struct RiskGovernor {
    config: RiskGovernorConfig,
    inner: RwLock<Inner>,
}

/// Why a candidate signal was rejected, for logging/telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Throttled,
    MaxConcurrent,
    RiskBudget,
}

impl RiskGovernor {
    pub fn new(config: RiskGovernorConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner { active: HashMap::new(), throttle: HashMap::new(), risk_in_use: 0.0 }),
        }
    }

    /// Attempts to admit a candidate signal, registering it as active on
    /// success. `risk_weight` is the fraction of `max_risk_budget` this
    /// signal would consume while active.
    pub fn admit(&self, candidate: Signal, now_ms: i64, risk_weight: f64) -> Result<(), RejectReason> {
        let mut inner = self.inner.write();

        inner.throttle.retain(|_, &mut admitted_at| now_ms - admitted_at < self.config.throttle_window_ms);

        let key = ThrottleKey { rule_id_hash: hash_rule_id(&candidate.rule_id), bar_seq: candidate.bar_seq };
        if inner.throttle.contains_key(&key) {
            return Err(RejectReason::Throttled);
        }
        if inner.active.len() >= self.config.max_concurrent_signals {
            return Err(RejectReason::MaxConcurrent);
        }
        if inner.risk_in_use + risk_weight > self.config.max_risk_budget {
            return Err(RejectReason::RiskBudget);
        }

        inner.throttle.insert(key, now_ms);
        inner.risk_in_use += risk_weight;
        inner.active.insert(candidate.id, candidate);
        Ok(())
    }

    pub fn release(&self, id: uuid::Uuid, risk_weight: f64) {
        let mut inner = self.inner.write();
        if inner.active.remove(&id).is_some() {
            inner.risk_in_use = (inner.risk_in_use - risk_weight).max(0.0);
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Timeframe};

    fn signal(rule_id: &str, bar_seq: i64) -> Signal {
        Signal {
            id: uuid::Uuid::new_v4(),
            symbol: "SPY".to_string(),
            timeframe: Timeframe::M1,
            rule_id: rule_id.to_string(),
            direction: Direction::Long,
            confidence: 0.7,
            ts_ms: 0,
            bar_seq,
            ctx: serde_json::json!({}),
        }
    }

    #[test]
    fn rejects_when_max_concurrent_reached() {
        let gov = RiskGovernor::new(RiskGovernorConfig { max_concurrent_signals: 1, ..Default::default() });
        assert!(gov.admit(signal("a", 1), 0, 0.1).is_ok());
        assert_eq!(gov.admit(signal("b", 2), 0, 0.1), Err(RejectReason::MaxConcurrent));
    }

    #[test]
    fn throttles_identical_rule_and_bar_within_window() {
        let gov = RiskGovernor::new(RiskGovernorConfig { max_concurrent_signals: 10, ..Default::default() });
        assert!(gov.admit(signal("vwap_reclaim", 100), 0, 0.1).is_ok());
        gov.release(gov.inner.read().active.keys().next().copied().unwrap(), 0.1);
        assert_eq!(gov.admit(signal("vwap_reclaim", 100), 1000, 0.1), Err(RejectReason::Throttled));
    }
}
