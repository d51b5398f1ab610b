//! Draft store for multi-step flows
//!
//! Partial answers collected across a flow's steps live here, keyed by
//! `(owner_key, flow)`, until the final step materializes a record. Drafts
//! are explicit objects in a TTL cache - abandoning a flow simply lets the
//! entry expire; nothing durable is written before the final step.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MAX_DRAFTS: u64 = 100_000;

/// The six multi-step flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Budget,
    Bill,
    NetWorth,
    EmergencyFund,
    FinancialHealth,
    Quiz,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Bill => "bill",
            Self::NetWorth => "net_worth",
            Self::EmergencyFund => "emergency_fund",
            Self::FinancialHealth => "financial_health",
            Self::Quiz => "quiz",
        }
    }

    /// Number of steps before the flow materializes a record
    pub fn steps_total(&self) -> u32 {
        match self {
            Self::Budget => 4,
            Self::Bill => 2,
            Self::NetWorth => 2,
            Self::EmergencyFund => 2,
            Self::FinancialHealth => 3,
            Self::Quiz => 2,
        }
    }

    pub fn all() -> &'static [FlowKind] {
        &[
            Self::Budget,
            Self::Bill,
            Self::NetWorth,
            Self::EmergencyFund,
            Self::FinancialHealth,
            Self::Quiz,
        ]
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "budget" => Ok(Self::Budget),
            "bill" => Ok(Self::Bill),
            "net_worth" => Ok(Self::NetWorth),
            "emergency_fund" => Ok(Self::EmergencyFund),
            "financial_health" => Ok(Self::FinancialHealth),
            "quiz" => Ok(Self::Quiz),
            other => Err(format!("unknown flow '{other}'")),
        }
    }
}

/// Accumulated state for one in-progress flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDraft {
    pub kind: FlowKind,
    pub owner_key: String,
    pub started_at: DateTime<Utc>,
    /// Highest step merged so far
    pub last_step: u32,
    /// Field bag merged across steps; later steps win on key collision
    pub fields: Map<String, Value>,
}

pub struct DraftStore {
    cache: Cache<String, FlowDraft>,
}

impl DraftStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(MAX_DRAFTS)
            .build();
        Self { cache }
    }

    fn key(owner_key: &str, kind: FlowKind) -> String {
        format!("{owner_key}:{}", kind.as_str())
    }

    pub fn get(&self, owner_key: &str, kind: FlowKind) -> Option<FlowDraft> {
        self.cache.get(&Self::key(owner_key, kind))
    }

    /// Merge one step's fields into the draft. Steps must be reached in
    /// order, but re-submitting an earlier step (going back) is allowed.
    pub fn merge_step(
        &self,
        owner_key: &str,
        kind: FlowKind,
        step: u32,
        fields: Map<String, Value>,
    ) -> Result<FlowDraft> {
        if step == 0 || step > kind.steps_total() {
            return Err(anyhow!(
                "step {step} out of range for flow '{kind}' (1..={})",
                kind.steps_total()
            ));
        }

        let key = Self::key(owner_key, kind);
        let mut draft = match self.cache.get(&key) {
            Some(draft) => draft,
            None if step == 1 => FlowDraft {
                kind,
                owner_key: owner_key.to_string(),
                started_at: Utc::now(),
                last_step: 0,
                fields: Map::new(),
            },
            None => {
                return Err(anyhow!(
                    "no draft in progress for flow '{kind}'; start at step 1"
                ))
            }
        };

        if step > draft.last_step + 1 {
            return Err(anyhow!(
                "step {step} submitted before step {} was completed",
                draft.last_step + 1
            ));
        }

        for (k, v) in fields {
            draft.fields.insert(k, v);
        }
        draft.last_step = draft.last_step.max(step);

        self.cache.insert(key, draft.clone());
        Ok(draft)
    }

    /// Remove and return the draft (used when the final step materializes
    /// a record).
    pub fn take(&self, owner_key: &str, kind: FlowKind) -> Option<FlowDraft> {
        let key = Self::key(owner_key, kind);
        let draft = self.cache.get(&key);
        if draft.is_some() {
            self.cache.invalidate(&key);
        }
        draft
    }

    pub fn discard(&self, owner_key: &str, kind: FlowKind) {
        self.cache.invalidate(&Self::key(owner_key, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn store() -> DraftStore {
        DraftStore::new(Duration::from_secs(60))
    }

    #[test]
    fn steps_merge_in_order() {
        let store = store();
        store
            .merge_step("s1", FlowKind::Bill, 1, fields(&[("first_name", json!("Ada"))]))
            .unwrap();
        let draft = store
            .merge_step("s1", FlowKind::Bill, 2, fields(&[("bill_name", json!("Rent"))]))
            .unwrap();

        assert_eq!(draft.last_step, 2);
        assert_eq!(draft.fields["first_name"], "Ada");
        assert_eq!(draft.fields["bill_name"], "Rent");
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let store = store();
        let err = store
            .merge_step("s1", FlowKind::Budget, 2, Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("start at step 1"));

        store.merge_step("s1", FlowKind::Budget, 1, Map::new()).unwrap();
        let err = store
            .merge_step("s1", FlowKind::Budget, 3, Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("before step 2"));
    }

    #[test]
    fn resubmitting_an_earlier_step_overwrites() {
        let store = store();
        store
            .merge_step("s1", FlowKind::Bill, 1, fields(&[("first_name", json!("Ada"))]))
            .unwrap();
        store.merge_step("s1", FlowKind::Bill, 2, Map::new()).unwrap();
        let draft = store
            .merge_step("s1", FlowKind::Bill, 1, fields(&[("first_name", json!("Grace"))]))
            .unwrap();

        assert_eq!(draft.fields["first_name"], "Grace");
        assert_eq!(draft.last_step, 2);
    }

    #[test]
    fn take_removes_the_draft() {
        let store = store();
        store.merge_step("s1", FlowKind::Quiz, 1, Map::new()).unwrap();
        assert!(store.take("s1", FlowKind::Quiz).is_some());
        assert!(store.get("s1", FlowKind::Quiz).is_none());
    }

    #[test]
    fn drafts_are_scoped_per_owner_and_flow() {
        let store = store();
        store.merge_step("s1", FlowKind::Quiz, 1, Map::new()).unwrap();
        assert!(store.get("s2", FlowKind::Quiz).is_none());
        assert!(store.get("s1", FlowKind::Budget).is_none());
    }
}
