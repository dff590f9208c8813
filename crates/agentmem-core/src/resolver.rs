//! Dependency chains on top of `wait_for`.
//!
//! "B depends on A" is a convention, not something the store enforces: B's
//! owner publishes B as `pending`, waits for A to finish, and only then moves
//! B to `in_progress`.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{MemoryError, Result};
use crate::record::{ActionRecord, ActionRef, ActionStatus, NewAction};
use crate::service::SharedMemory;

pub struct DependencyResolver<'a> {
    memory: &'a SharedMemory,
    timeout: Duration,
}

impl<'a> DependencyResolver<'a> {
    /// Uses the configured `wait_timeout_ms` for each dependency.
    pub fn new(memory: &'a SharedMemory) -> Self {
        Self {
            memory,
            timeout: memory.wait_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for each dependency in order, each with its own full timeout.
    /// Returns the finished records in the same order.
    pub async fn await_all(&self, dependencies: &[ActionRef]) -> Result<Vec<ActionRecord>> {
        let mut finished = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            let record = match self
                .memory
                .wait_for(&dep.agent_id, &dep.action_id, self.timeout)
                .await
            {
                Ok(record) => record,
                Err(e @ MemoryError::WaitTimeout { .. }) => {
                    return Err(MemoryError::DependencyTimeout {
                        dependency: dep.clone(),
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            };
            if record.status == ActionStatus::Failed {
                return Err(MemoryError::DependencyFailed {
                    dependency: dep.clone(),
                    record: Box::new(record),
                });
            }
            finished.push(record);
        }
        Ok(finished)
    }

    /// Publish `action` as `pending`, wait for its dependencies, then move it
    /// to `in_progress`. On failure the record is left `pending` and the whole
    /// call may be retried.
    pub async fn start(
        &self,
        agent_id: &str,
        action_id: &str,
        action: NewAction,
    ) -> Result<ActionRecord> {
        let origin = ActionRef::new(agent_id, action_id);
        if let Some(path) = self.find_cycle(&origin, &action.dependencies).await? {
            return Err(MemoryError::DependencyCycle { path });
        }

        self.memory
            .publish(
                agent_id,
                action_id,
                action.clone().with_status(ActionStatus::Pending),
            )
            .await?;

        if let Err(e) = self.await_all(&action.dependencies).await {
            warn!(agent_id, action_id, error = %e, "dependencies not satisfied");
            return Err(e);
        }

        let record = self
            .memory
            .publish(
                agent_id,
                action_id,
                action.with_status(ActionStatus::InProgress),
            )
            .await?;
        info!(
            agent_id,
            action_id,
            dependencies = record.dependencies.len(),
            "dependencies satisfied, action started"
        );
        Ok(record)
    }

    /// Walk the dependency graph through records currently in the store and
    /// return a path that leads back to `origin`, if one exists.
    ///
    /// Finished records are not followed: waiting on them cannot block.
    /// Records not yet published are invisible, so a `None` here does not
    /// rule a cycle out.
    pub async fn find_cycle(
        &self,
        origin: &ActionRef,
        dependencies: &[ActionRef],
    ) -> Result<Option<Vec<ActionRef>>> {
        let mut visited: HashSet<ActionRef> = HashSet::new();
        let mut stack: Vec<Vec<ActionRef>> = dependencies
            .iter()
            .rev()
            .map(|dep| vec![origin.clone(), dep.clone()])
            .collect();

        while let Some(path) = stack.pop() {
            let Some(node) = path.last().cloned() else {
                continue;
            };
            if &node == origin {
                return Ok(Some(path));
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            let Some(record) = self.memory.read(&node.agent_id, &node.action_id).await? else {
                continue;
            };
            if record.is_terminal() {
                continue;
            }
            for next in record.dependencies.iter().rev() {
                let mut extended = path.clone();
                extended.push(next.clone());
                stack.push(extended);
            }
        }
        Ok(None)
    }
}
