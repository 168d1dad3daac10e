//! In-memory execution registry.
//!
//! The process-wide table of past and in-flight executions, implementing
//! `ExecutionStore`. Records live in a `DashMap` keyed by execution ID; a
//! separate insertion-order index drives most-recent-first listing and
//! retention. Once more than `max_retained` executions are held, the oldest
//! terminal ones are evicted. Running executions are never evicted, so the
//! table may exceed the cap while many runs are in flight.

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;
use stepwise_types::error::RepositoryError;
use stepwise_types::workflow::{ExecutionFilter, WorkflowExecution};
use uuid::Uuid;

use crate::repository::execution::ExecutionStore;

/// Default number of executions kept in memory.
pub const DEFAULT_MAX_RETAINED: usize = 1000;

pub struct ExecutionRegistry {
    executions: DashMap<Uuid, WorkflowExecution>,
    /// Execution IDs in first-insertion order, oldest at the front.
    order: Mutex<VecDeque<Uuid>>,
    max_retained: usize,
}

impl ExecutionRegistry {
    /// A cap below 1 is raised to 1 so the latest execution stays readable.
    pub fn new(max_retained: usize) -> Self {
        Self {
            executions: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_retained: max_retained.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    /// Drop the oldest terminal executions until the cap is respected or
    /// only running ones remain.
    fn evict(&self, order: &mut VecDeque<Uuid>) {
        while order.len() > self.max_retained {
            let oldest_terminal = order.iter().position(|id| {
                self.executions
                    .get(id)
                    .is_some_and(|execution| execution.is_terminal())
            });
            let Some(position) = oldest_terminal else {
                break;
            };
            if let Some(id) = order.remove(position) {
                self.executions.remove(&id);
                tracing::debug!(execution_id = %id, "evicted execution from registry");
            }
        }
    }
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED)
    }
}

impl ExecutionStore for ExecutionRegistry {
    async fn put(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        let mut order = self
            .order
            .lock()
            .map_err(|_| RepositoryError::Unavailable)?;

        let previous = self
            .executions
            .insert(execution.execution_id, execution.clone());
        if previous.is_none() {
            order.push_back(execution.execution_id);
        }
        self.evict(&mut order);
        Ok(())
    }

    async fn get(&self, execution_id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .get(execution_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let order = self
            .order
            .lock()
            .map_err(|_| RepositoryError::Unavailable)?;

        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(order
            .iter()
            .rev()
            .filter_map(|id| self.executions.get(id).map(|e| e.value().clone()))
            .filter(|execution| filter.matches(execution))
            .take(limit)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use stepwise_types::workflow::ExecutionStatus;

    fn execution(name: &str) -> WorkflowExecution {
        WorkflowExecution::new(name, 1, Map::new())
    }

    fn finished(name: &str) -> WorkflowExecution {
        let mut exec = execution(name);
        exec.complete(Map::new()).unwrap();
        exec
    }

    fn filter(workflow_name: Option<&str>, limit: Option<usize>) -> ExecutionFilter {
        ExecutionFilter {
            workflow_name: workflow_name.map(String::from),
            limit,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let registry = ExecutionRegistry::default();
        let exec = execution("alpha");
        registry.put(&exec).await.unwrap();

        let found = registry.get(&exec.execution_id).await.unwrap().unwrap();
        assert_eq!(found.workflow_name, "alpha");
        assert!(registry.get(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_in_place() {
        let registry = ExecutionRegistry::default();
        let mut exec = execution("alpha");
        registry.put(&exec).await.unwrap();
        exec.complete(Map::new()).unwrap();
        registry.put(&exec).await.unwrap();

        assert_eq!(registry.len(), 1);
        let found = registry.get(&exec.execution_id).await.unwrap().unwrap();
        assert_eq!(found.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_most_recent_first_with_filter_and_limit() {
        let registry = ExecutionRegistry::default();
        let a1 = execution("alpha");
        let b1 = execution("beta");
        let a2 = execution("alpha");
        for exec in [&a1, &b1, &a2] {
            registry.put(exec).await.unwrap();
        }

        let all = registry.list(&ExecutionFilter::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|e| e.execution_id).collect();
        assert_eq!(ids, vec![a2.execution_id, b1.execution_id, a1.execution_id]);

        let alphas = registry.list(&filter(Some("alpha"), None)).await.unwrap();
        assert_eq!(alphas.len(), 2);
        assert_eq!(alphas[0].execution_id, a2.execution_id);

        let latest = registry.list(&filter(None, Some(1))).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].execution_id, a2.execution_id);

        let none = registry.list(&filter(Some("gamma"), None)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_original_position() {
        let registry = ExecutionRegistry::default();
        let mut first = execution("alpha");
        let second = execution("alpha");
        registry.put(&first).await.unwrap();
        registry.put(&second).await.unwrap();

        first.complete(Map::new()).unwrap();
        registry.put(&first).await.unwrap();

        let listed = registry.list(&ExecutionFilter::default()).await.unwrap();
        assert_eq!(listed[0].execution_id, second.execution_id);
        assert_eq!(listed[1].execution_id, first.execution_id);
    }

    #[tokio::test]
    async fn test_evicts_oldest_terminal_first() {
        let registry = ExecutionRegistry::new(2);
        let old = finished("a");
        let mid = finished("b");
        let new = finished("c");
        for exec in [&old, &mid, &new] {
            registry.put(exec).await.unwrap();
        }

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&old.execution_id).await.unwrap().is_none());
        assert!(registry.get(&mid.execution_id).await.unwrap().is_some());
        assert!(registry.get(&new.execution_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_never_evicts_running() {
        let registry = ExecutionRegistry::new(1);
        let running = execution("a");
        let done = finished("b");
        let also_running = execution("c");
        registry.put(&running).await.unwrap();
        registry.put(&done).await.unwrap();

        // The terminal one goes even though it is newer.
        assert!(registry.get(&done.execution_id).await.unwrap().is_none());
        assert!(registry.get(&running.execution_id).await.unwrap().is_some());

        // Over the cap with only running executions: nothing is dropped.
        registry.put(&also_running).await.unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_cap_keeps_latest_execution() {
        let registry = ExecutionRegistry::new(0);
        let first = finished("a");
        let second = finished("b");
        registry.put(&first).await.unwrap();
        registry.put(&second).await.unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&first.execution_id).await.unwrap().is_none());
        assert!(registry.get(&second.execution_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let registry = std::sync::Arc::new(ExecutionRegistry::default());
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let exec = execution(&format!("wf-{}", i % 3));
                registry.put(&exec).await.unwrap();
                exec.execution_id
            }));
        }
        for handle in handles {
            let id = handle.await.unwrap();
            assert!(registry.get(&id).await.unwrap().is_some());
        }
        assert_eq!(registry.len(), 20);
    }
}
