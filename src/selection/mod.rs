/// Server selection against the published cluster state
///
/// [`select`] reads one snapshot and delegates to the topology's filtering
/// rule. It never waits or retries. When nothing is eligible because the
/// last classification was contradictory, the inconsistency is returned so
/// callers can tell it apart from an ordinary miss; both are recoverable. [`ServerSelector::select_within`] is the
/// deadline-bounded loop the operation layer can use instead of writing its
/// own: it re-runs selection on every published generation.
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cluster::{ClusterSnapshot, ClusterState};
use crate::core::{SelectionCriteria, ServerDescription};
use crate::error::{TopologyError, TopologyResult};
use crate::topology::TopologyRules;

/// Select the eligible servers for one operation
pub fn select(
    state: &ClusterState,
    criteria: &SelectionCriteria,
) -> TopologyResult<Vec<Arc<ServerDescription>>> {
    select_from(&state.snapshot(), criteria)
}

/// Select from an already loaded snapshot
pub fn select_from(
    snapshot: &ClusterSnapshot,
    criteria: &SelectionCriteria,
) -> TopologyResult<Vec<Arc<ServerDescription>>> {
    if snapshot.is_closed() {
        return Err(TopologyError::ClusterClosed);
    }

    let selected = snapshot
        .topology
        .select_servers(&snapshot.descriptions, criteria);
    if selected.is_empty() {
        if let Some(inconsistency) = &snapshot.inconsistency {
            return Err(TopologyError::Inconsistency(inconsistency.clone()));
        }
        let reason = if snapshot.topology.is_unknown() {
            format!(
                "topology is not classified yet ({} known servers)",
                snapshot.descriptions.len()
            )
        } else {
            format!(
                "no server matches {} among {} known servers",
                criteria,
                snapshot.descriptions.len()
            )
        };
        return Err(TopologyError::no_suitable_server(
            snapshot.topology.display_name(),
            reason,
        ));
    }

    Ok(selected)
}

/// Criteria bound to a wait budget
#[derive(Debug, Clone)]
pub struct ServerSelector {
    criteria: SelectionCriteria,
    timeout: Duration,
}

impl ServerSelector {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a selector, rejecting criteria no server could satisfy
    pub fn new(criteria: SelectionCriteria, timeout: Duration) -> TopologyResult<Self> {
        criteria.validate()?;
        if timeout.is_zero() {
            return Err(TopologyError::invalid_criteria(
                "server selection timeout must be greater than 0",
            ));
        }
        Ok(Self { criteria, timeout })
    }

    pub fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn select(&self, state: &ClusterState) -> TopologyResult<Vec<Arc<ServerDescription>>> {
        select(state, &self.criteria)
    }

    /// Pick one eligible server at random
    pub fn select_server(&self, state: &ClusterState) -> TopologyResult<Arc<ServerDescription>> {
        let mut eligible = self.select(state)?;
        let index = rand::thread_rng().gen_range(0..eligible.len());
        Ok(eligible.swap_remove(index))
    }

    /// Wait until selection succeeds, fails terminally, or the timeout elapses
    pub async fn select_within(
        &self,
        state: &ClusterState,
    ) -> TopologyResult<Vec<Arc<ServerDescription>>> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut generations = state.subscribe();

        loop {
            generations.borrow_and_update();
            let last_error = match self.select(state) {
                Ok(selected) => return Ok(selected),
                Err(e) if e.is_recoverable() => e,
                Err(e) => return Err(e),
            };
            debug!("Server selection pending: {}", last_error);

            match tokio::time::timeout_at(deadline, generations.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(TopologyError::ClusterClosed),
                Err(_) => {
                    return Err(TopologyError::timeout(
                        format!("server selection with {}: {}", self.criteria, last_error),
                        started.elapsed(),
                    ))
                }
            }
        }
    }
}
