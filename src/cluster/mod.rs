/// Shared cluster state: the published `(Topology, descriptions)` pair
///
/// Readers take a snapshot with a single atomic load and filter servers
/// without holding any lock. Writers build a complete replacement snapshot
/// and swap it in, so a reader always sees one publish in full.
pub mod monitor;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::{DescriptionSet, ServerAddress, ServerDescription};
use crate::error::{Inconsistency, TopologyError, TopologyResult};
use crate::topology::{classify, Topology, TopologyRules};

/// Lifecycle of a [`ClusterState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Nothing published yet; topology is unknown
    Uninitialized,
    /// At least one classification has been published
    Active,
    /// Shut down; every further call fails
    Closed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Uninitialized => write!(f, "Uninitialized"),
            Lifecycle::Active => write!(f, "Active"),
            Lifecycle::Closed => write!(f, "Closed"),
        }
    }
}

/// One consistent published state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub lifecycle: Lifecycle,
    pub topology: Topology,
    pub descriptions: DescriptionSet,
    /// Contradiction behind an unknown topology, until monitoring resolves it
    pub inconsistency: Option<Inconsistency>,
    /// Incremented by every publish
    pub generation: u64,
}

impl ClusterSnapshot {
    pub fn is_closed(&self) -> bool {
        self.lifecycle == Lifecycle::Closed
    }
}

/// Result of feeding one description update into the cluster state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A newer description for the address was already live
    Stale,
    /// A new snapshot was published
    Applied {
        generation: u64,
        inconsistency: Option<Inconsistency>,
    },
}

struct Inner {
    current: ArcSwap<ClusterSnapshot>,
    /// Serializes writers so read-modify-publish cycles don't interleave
    writer: Mutex<()>,
    generations: watch::Sender<u64>,
}

/// Handle to the cluster state shared by monitoring and operation callers
///
/// Cloning is cheap; every clone refers to the same state.
#[derive(Clone)]
pub struct ClusterState {
    inner: Arc<Inner>,
}

impl ClusterState {
    /// Create an uninitialized state with an unknown topology
    pub fn new() -> Self {
        Self::with_topology(Topology::default())
    }

    /// Create a state that only accepts members of `set_name`
    pub fn with_replica_set_name<S: Into<String>>(set_name: S) -> Self {
        Self::with_topology(Topology::unknown(Some(set_name.into())))
    }

    fn with_topology(topology: Topology) -> Self {
        let snapshot = ClusterSnapshot {
            lifecycle: Lifecycle::Uninitialized,
            topology,
            descriptions: DescriptionSet::new(),
            inconsistency: None,
            generation: 0,
        };
        let (generations, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                current: ArcSwap::from_pointee(snapshot),
                writer: Mutex::new(()),
                generations,
            }),
        }
    }

    /// Load the current snapshot
    ///
    /// The returned `Arc` stays valid and unchanged while later publishes
    /// happen; call again to observe them.
    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.inner.current.load_full()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.current.load().lifecycle
    }

    pub fn topology(&self) -> Topology {
        self.inner.current.load().topology.clone()
    }

    /// Receiver notified with the generation of every publish
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.generations.subscribe()
    }

    /// Atomically replace the published topology and descriptions
    ///
    /// Returns the generation of the new snapshot.
    pub fn publish(&self, topology: Topology, descriptions: DescriptionSet) -> TopologyResult<u64> {
        let _guard = self.inner.writer.lock();
        let current = self.inner.current.load();
        if current.is_closed() {
            return Err(TopologyError::ClusterClosed);
        }
        let generation = current.generation + 1;
        drop(current);

        self.store(ClusterSnapshot {
            lifecycle: Lifecycle::Active,
            topology,
            descriptions,
            inconsistency: None,
            generation,
        });
        Ok(generation)
    }

    /// Merge one description, reclassify and publish
    ///
    /// A description whose `last_update` is not newer than the live one for
    /// the same address is discarded.
    pub fn update(&self, description: ServerDescription) -> TopologyResult<UpdateOutcome> {
        let _guard = self.inner.writer.lock();
        let current = self.inner.current.load_full();
        if current.is_closed() {
            return Err(TopologyError::ClusterClosed);
        }

        if let Some(existing) = current.descriptions.get(&description.address) {
            if !existing.is_superseded_by(&description) {
                debug!(
                    "Discarding stale description for {} (last_update {} <= {})",
                    description.address, description.last_update, existing.last_update
                );
                return Ok(UpdateOutcome::Stale);
            }
        }

        let mut descriptions = current.descriptions.clone();
        descriptions.insert(description.address.clone(), Arc::new(description));
        Ok(self.reclassify(&current, descriptions))
    }

    /// Stop tracking `address` and reclassify
    ///
    /// Returns `None` when the address was not tracked.
    pub fn remove(&self, address: &ServerAddress) -> TopologyResult<Option<UpdateOutcome>> {
        let _guard = self.inner.writer.lock();
        let current = self.inner.current.load_full();
        if current.is_closed() {
            return Err(TopologyError::ClusterClosed);
        }
        if !current.descriptions.contains_key(address) {
            return Ok(None);
        }

        let mut descriptions = current.descriptions.clone();
        descriptions.remove(address);
        debug!("Removed server {} from cluster state", address);
        Ok(Some(self.reclassify(&current, descriptions)))
    }

    /// Publish the terminal snapshot; idempotent
    pub fn close(&self) {
        let _guard = self.inner.writer.lock();
        let current = self.inner.current.load();
        if current.is_closed() {
            return;
        }
        let generation = current.generation + 1;
        drop(current);

        self.store(ClusterSnapshot {
            lifecycle: Lifecycle::Closed,
            topology: Topology::default(),
            descriptions: DescriptionSet::new(),
            inconsistency: None,
            generation,
        });
        info!("Cluster state closed");
    }

    fn reclassify(&self, current: &ClusterSnapshot, descriptions: DescriptionSet) -> UpdateOutcome {
        let classification = classify(&current.topology, &descriptions);
        if let Some(inconsistency) = &classification.inconsistency {
            warn!(
                "Topology inconsistency, falling back to {}: {}",
                classification.topology.display_name(),
                inconsistency
            );
        } else if classification.topology.kind() != current.topology.kind() {
            info!(
                "Topology changed from {} to {}",
                current.topology, classification.topology
            );
        }

        let generation = current.generation + 1;
        self.store(ClusterSnapshot {
            lifecycle: Lifecycle::Active,
            topology: classification.topology,
            descriptions,
            inconsistency: classification.inconsistency.clone(),
            generation,
        });

        UpdateOutcome::Applied {
            generation,
            inconsistency: classification.inconsistency,
        }
    }

    /// Must be called with the writer lock held
    fn store(&self, snapshot: ClusterSnapshot) {
        let generation = snapshot.generation;
        debug!(
            "Publishing generation {} ({}, {} servers, {})",
            generation,
            snapshot.topology,
            snapshot.descriptions.len(),
            snapshot.lifecycle
        );
        self.inner.current.store(Arc::new(snapshot));
        self.inner.generations.send_replace(generation);
    }
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.inner.current.load();
        f.debug_struct("ClusterState")
            .field("lifecycle", &snapshot.lifecycle)
            .field("topology", &snapshot.topology)
            .field("servers", &snapshot.descriptions.len())
            .field("generation", &snapshot.generation)
            .finish()
    }
}
