/// Feed description updates from the monitoring subsystem into a cluster state
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ClusterState, UpdateOutcome};
use crate::core::ServerDescription;
use crate::error::{Inconsistency, TopologyError};

/// Counters for one run of [`apply_updates`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub applied: u64,
    pub stale: u64,
    pub inconsistent: u64,
    /// Inconsistency reported by the most recently applied update, if any
    pub inconsistency: Option<Inconsistency>,
}

/// Apply every update from `updates` until the stream ends or the cluster closes
pub async fn apply_updates<S>(state: ClusterState, updates: S) -> MonitorStats
where
    S: Stream<Item = ServerDescription>,
{
    tokio::pin!(updates);
    let mut stats = MonitorStats::default();

    while let Some(description) = updates.next().await {
        let address = description.address.clone();
        match state.update(description) {
            Ok(UpdateOutcome::Stale) => stats.stale += 1,
            Ok(UpdateOutcome::Applied { inconsistency, .. }) => {
                stats.applied += 1;
                if inconsistency.is_some() {
                    stats.inconsistent += 1;
                }
                stats.inconsistency = inconsistency;
            }
            Err(TopologyError::ClusterClosed) => {
                debug!("Cluster closed, dropping update for {} and stopping", address);
                break;
            }
            Err(e) => {
                warn!("[{}] Failed to apply update for {}: {}", e.severity(), address, e);
            }
        }
    }

    stats
}

/// Spawn a task applying updates received on `updates`
///
/// The task ends when every sender is dropped or the cluster is closed.
pub fn spawn(state: ClusterState, mut updates: mpsc::Receiver<ServerDescription>) -> JoinHandle<MonitorStats> {
    let updates = stream::poll_fn(move |cx| updates.poll_recv(cx));
    tokio::spawn(apply_updates(state, updates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Lifecycle;
    use crate::core::ServerRole;
    use crate::topology::TopologyRules;

    fn server(address: &str, role: ServerRole, last_update: u64) -> ServerDescription {
        ServerDescription::new(address.parse().unwrap(), role).with_last_update(last_update)
    }

    #[tokio::test]
    async fn test_apply_updates_counts_outcomes() {
        let state = ClusterState::new();
        let updates = stream::iter(vec![
            server("a", ServerRole::Standalone, 1),
            server("a", ServerRole::Standalone, 1),
            server("b", ServerRole::Standalone, 1),
            server("b", ServerRole::Unknown, 2),
        ]);

        let stats = apply_updates(state.clone(), updates).await;

        assert_eq!(stats.applied, 3);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.inconsistent, 1);
        // The last update resolved it
        assert_eq!(stats.inconsistency, None);
        assert!(state.topology().is_standalone());
    }

    #[tokio::test]
    async fn test_spawned_monitor_stops_when_senders_drop() {
        let state = ClusterState::new();
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn(state.clone(), rx);

        tx.send(server("m1", ServerRole::Mongos, 1)).await.unwrap();
        tx.send(server("m2", ServerRole::Mongos, 1)).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.inconsistent, 0);
        assert!(state.topology().is_sharded());
        assert_eq!(state.snapshot().descriptions.len(), 2);
    }

    #[tokio::test]
    async fn test_reports_unresolved_inconsistency() {
        let state = ClusterState::with_replica_set_name("rs0");
        let updates = stream::iter(vec![server("a", ServerRole::RsPrimary, 1)
            .with_set_name("rs1")]);

        let stats = apply_updates(state, updates).await;
        assert!(matches!(
            stats.inconsistency,
            Some(Inconsistency::SetNameChanged { .. })
        ));
    }

    #[test]
    fn test_apply_updates_without_runtime() {
        let state = ClusterState::new();
        let updates = stream::iter(vec![
            server("m1", ServerRole::Mongos, 1),
            server("m1", ServerRole::Unknown, 2),
        ]);

        let stats = tokio_test::block_on(apply_updates(state.clone(), updates));
        assert_eq!(stats.applied, 2);
        assert!(state.topology().is_unknown());
        tokio_test::assert_ok!(state.remove(&"m1".parse().unwrap()));
        assert!(state.snapshot().descriptions.is_empty());
    }

    #[tokio::test]
    async fn test_monitor_stops_after_close() {
        let state = ClusterState::new();
        state.close();

        let updates = stream::iter(vec![
            server("a", ServerRole::Standalone, 1),
            server("b", ServerRole::Standalone, 1),
        ]);
        let stats = apply_updates(state.clone(), updates).await;

        assert_eq!(stats, MonitorStats::default());
        assert_eq!(state.lifecycle(), Lifecycle::Closed);
    }
}
