//! Per-agent aggregation of the namespace: the dashboard view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{ActionRecord, ActionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ActionStatus) {
        match status {
            ActionStatus::Pending => self.pending += 1,
            ActionStatus::InProgress => self.in_progress += 1,
            ActionStatus::Completed => self.completed += 1,
            ActionStatus::Failed => self.failed += 1,
        }
    }

    pub fn active(&self) -> usize {
        self.pending + self.in_progress
    }

    pub fn total(&self) -> usize {
        self.active() + self.completed + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDigest {
    pub action_id: String,
    pub status: ActionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub counts: StatusCounts,
    /// Most recently updated first.
    pub actions: Vec<ActionDigest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub generated_at: DateTime<Utc>,
    pub total_active: usize,
    pub agents: BTreeMap<String, AgentSummary>,
}

impl StatusSummary {
    /// Group `records` by agent. Only agents with at least one live record
    /// appear; `roles` just labels them.
    pub fn build(
        records: impl IntoIterator<Item = ActionRecord>,
        roles: &BTreeMap<String, String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut agents: BTreeMap<String, AgentSummary> = BTreeMap::new();
        for record in records {
            let summary = agents
                .entry(record.agent_id.clone())
                .or_insert_with(|| AgentSummary {
                    agent_id: record.agent_id.clone(),
                    role: roles.get(&record.agent_id).cloned(),
                    counts: StatusCounts::default(),
                    actions: Vec::new(),
                });
            summary.counts.record(record.status);
            summary.actions.push(ActionDigest {
                action_id: record.action_id,
                status: record.status,
                updated_at: record.updated_at,
            });
        }

        for summary in agents.values_mut() {
            summary.actions.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.action_id.cmp(&b.action_id))
            });
        }

        let total_active = agents.values().map(|a| a.counts.active()).sum();
        Self {
            generated_at,
            total_active,
            agents,
        }
    }
}
