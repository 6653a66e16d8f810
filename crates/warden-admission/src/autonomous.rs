//! Autonomous Policy Enforcer: evaluated whenever the controller's
//! reachability probe fails, default deny.

use async_trait::async_trait;
use std::time::Duration;

use warden_types::{ActionType, CachedPolicy};

/// Gate 8's decision, independent of reachability: `allow` or `deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutonomousDecision {
    Allow,
    Deny,
}

impl AutonomousDecision {
    pub fn tag(self) -> &'static str {
        match self {
            AutonomousDecision::Allow => "ALLOW",
            AutonomousDecision::Deny => "DENY",
        }
    }
}

/// Decides admission against the cached last-known-good policy.
/// `cached_policy` is `None` when absent or integrity-failed, which always
/// denies.
pub fn evaluate(cached_policy: Option<&CachedPolicy>, action_type: ActionType) -> AutonomousDecision {
    let policy = match cached_policy {
        Some(policy) => policy,
        None => return AutonomousDecision::Deny,
    };

    if policy.prohibited_actions.contains(&action_type) {
        return AutonomousDecision::Deny;
    }
    if policy.allowed_actions.contains(&action_type) {
        AutonomousDecision::Allow
    } else {
        AutonomousDecision::Deny
    }
}

/// A single reachability check against the controller, with a 2 s timeout
/// and no retries. Modeled as a trait so transports other than HTTP can
/// implement it.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default implementation: a `GET` against a configured health URL.
pub struct HttpReachabilityProbe {
    client: reqwest::Client,
    health_url: String,
}

impl HttpReachabilityProbe {
    pub fn new(health_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            health_url: health_url.into(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn check(&self) -> bool {
        let attempt = self
            .client
            .get(&self.health_url)
            .timeout(REACHABILITY_TIMEOUT)
            .send()
            .await;
        matches!(attempt, Ok(response) if response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn policy(prohibited: Vec<ActionType>, allowed: Vec<ActionType>) -> CachedPolicy {
        CachedPolicy {
            version: 1,
            prohibited_actions: prohibited,
            allowed_actions: allowed,
            integrity_hash: String::new(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn absent_policy_denies() {
        assert_eq!(
            evaluate(None, ActionType::BlockProcess),
            AutonomousDecision::Deny
        );
    }

    #[test]
    fn prohibited_action_denies() {
        let p = policy(vec![ActionType::IsolateHost], vec![]);
        assert_eq!(evaluate(Some(&p), ActionType::IsolateHost), AutonomousDecision::Deny);
    }

    #[test]
    fn empty_allow_list_denies_by_default() {
        let p = policy(vec![], vec![]);
        assert_eq!(
            evaluate(Some(&p), ActionType::BlockProcess),
            AutonomousDecision::Deny
        );
    }

    #[test]
    fn non_empty_allow_list_permits_listed_action_only() {
        let p = policy(vec![], vec![ActionType::BlockProcess]);
        assert_eq!(
            evaluate(Some(&p), ActionType::BlockProcess),
            AutonomousDecision::Allow
        );
        assert_eq!(
            evaluate(Some(&p), ActionType::QuarantineFile),
            AutonomousDecision::Deny
        );
    }
}
