/// Cluster topology classification
///
/// A [`Topology`] is an immutable value describing the classified shape of the
/// cluster. It is replaced wholesale on every classification and never mutated
/// in place. Each variant owns the rule for filtering servers under that shape:
/// - Unknown: nothing is trusted until classified
/// - Standalone: the single standalone server
/// - ReplicaSet: primary/secondaries filtered by read mode, tags and staleness
/// - Sharded: every mongos
pub mod classifier;
pub mod replica_set;
pub mod sharded;
pub mod standalone;
pub mod unknown;

pub use classifier::{classify, Classification};
pub use replica_set::ReplicaSet;
pub use sharded::Sharded;
pub use standalone::Standalone;
pub use unknown::Unknown;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::{DescriptionSet, SelectionCriteria, ServerDescription};

/// Capability set every topology variant implements
pub trait TopologyRules {
    /// Stable human-readable label
    fn display_name(&self) -> &'static str;

    fn is_replica_set(&self) -> bool;

    fn is_sharded(&self) -> bool;

    fn is_standalone(&self) -> bool;

    /// Eligible subset of `descriptions` for one operation
    ///
    /// Callers targeting a single server take the first entry. An empty vector
    /// means no server is eligible.
    fn select_servers(
        &self,
        descriptions: &DescriptionSet,
        criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>>;
}

/// Discriminant of a [`Topology`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyKind {
    Unknown,
    Standalone,
    ReplicaSet,
    Sharded,
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyKind::Unknown => write!(f, "Unknown"),
            TopologyKind::Standalone => write!(f, "Standalone"),
            TopologyKind::ReplicaSet => write!(f, "ReplicaSet"),
            TopologyKind::Sharded => write!(f, "Sharded"),
        }
    }
}

/// Classified shape of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Unknown(Unknown),
    Standalone(Standalone),
    ReplicaSet(ReplicaSet),
    Sharded(Sharded),
}

impl Topology {
    /// Unclassified topology, optionally pinned to an expected replica set name
    pub fn unknown(set_name: Option<String>) -> Self {
        Topology::Unknown(Unknown::new(set_name))
    }

    pub fn kind(&self) -> TopologyKind {
        match self {
            Topology::Unknown(_) => TopologyKind::Unknown,
            Topology::Standalone(_) => TopologyKind::Standalone,
            Topology::ReplicaSet(_) => TopologyKind::ReplicaSet,
            Topology::Sharded(_) => TopologyKind::Sharded,
        }
    }

    /// Replica set name this topology is committed to, if any
    ///
    /// Present for a replica set, and for an unknown topology that was pinned
    /// by configuration or kept after an inconsistent classification.
    pub fn set_name(&self) -> Option<&str> {
        match self {
            Topology::ReplicaSet(rs) => Some(rs.set_name()),
            Topology::Unknown(unknown) => unknown.set_name(),
            Topology::Standalone(_) | Topology::Sharded(_) => None,
        }
    }

    /// Highest `(max_set_version, max_election_id)` this topology has seen
    ///
    /// Held by a replica set and by the unknown topology it falls back to.
    pub fn election_markers(&self) -> (Option<i32>, Option<u64>) {
        match self {
            Topology::ReplicaSet(rs) => (rs.max_set_version(), rs.max_election_id()),
            Topology::Unknown(unknown) => (unknown.max_set_version(), unknown.max_election_id()),
            Topology::Standalone(_) | Topology::Sharded(_) => (None, None),
        }
    }

    /// Unknown topology keeping this one's set name and election markers
    pub fn fallback(&self) -> Self {
        let (max_set_version, max_election_id) = self.election_markers();
        Topology::Unknown(
            Unknown::new(self.set_name().map(ToOwned::to_owned))
                .with_markers(max_set_version, max_election_id),
        )
    }

    pub fn as_replica_set(&self) -> Option<&ReplicaSet> {
        match self {
            Topology::ReplicaSet(rs) => Some(rs),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Topology::Unknown(_))
    }

    fn rules(&self) -> &dyn TopologyRules {
        match self {
            Topology::Unknown(t) => t,
            Topology::Standalone(t) => t,
            Topology::ReplicaSet(t) => t,
            Topology::Sharded(t) => t,
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Topology::Unknown(Unknown::default())
    }
}

impl TopologyRules for Topology {
    fn display_name(&self) -> &'static str {
        self.rules().display_name()
    }

    fn is_replica_set(&self) -> bool {
        self.rules().is_replica_set()
    }

    fn is_sharded(&self) -> bool {
        self.rules().is_sharded()
    }

    fn is_standalone(&self) -> bool {
        self.rules().is_standalone()
    }

    fn select_servers(
        &self,
        descriptions: &DescriptionSet,
        criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>> {
        self.rules().select_servers(descriptions, criteria)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.set_name() {
            Some(set_name) => write!(f, "{} ({})", self.display_name(), set_name),
            None => f.write_str(self.display_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{description_set, ServerRole};

    fn all_variants() -> Vec<Topology> {
        vec![
            Topology::default(),
            Topology::Standalone(Standalone),
            Topology::ReplicaSet(ReplicaSet::new("rs0")),
            Topology::Sharded(Sharded),
        ]
    }

    #[test]
    fn test_kind_and_predicates() {
        let expected = [
            (TopologyKind::Unknown, false, false, false),
            (TopologyKind::Standalone, false, false, true),
            (TopologyKind::ReplicaSet, true, false, false),
            (TopologyKind::Sharded, false, true, false),
        ];

        for (topology, (kind, rs, sharded, standalone)) in all_variants().iter().zip(expected) {
            assert_eq!(topology.kind(), kind);
            assert_eq!(topology.is_replica_set(), rs);
            assert_eq!(topology.is_sharded(), sharded);
            assert_eq!(topology.is_standalone(), standalone);
        }
    }

    #[test]
    fn test_display_name_independent_of_descriptions() {
        let empty = DescriptionSet::new();
        let populated = description_set(vec![
            ServerDescription::new("a".parse().unwrap(), ServerRole::Standalone),
            ServerDescription::new("b".parse().unwrap(), ServerRole::Mongos),
        ]);

        for topology in all_variants() {
            let name = topology.display_name();
            topology.select_servers(&empty, &SelectionCriteria::default());
            topology.select_servers(&populated, &SelectionCriteria::default());
            assert_eq!(topology.display_name(), name);
        }

        assert_eq!(Topology::default().display_name(), "Unknown");
        assert_eq!(Topology::Standalone(Standalone).display_name(), "Standalone");
        assert_eq!(Topology::Sharded(Sharded).display_name(), "Sharded");
    }

    #[test]
    fn test_set_name_exposure() {
        assert_eq!(Topology::default().set_name(), None);
        assert_eq!(Topology::unknown(Some("rs0".to_string())).set_name(), Some("rs0"));
        assert_eq!(
            Topology::ReplicaSet(ReplicaSet::new("rs1")).set_name(),
            Some("rs1")
        );
        assert_eq!(Topology::Standalone(Standalone).set_name(), None);
    }

    #[test]
    fn test_fallback_keeps_replica_set_memory() {
        let rs = Topology::ReplicaSet(ReplicaSet::new("rs0").with_markers(Some(3), Some(12)));
        let fallback = rs.fallback();

        assert!(fallback.is_unknown());
        assert_eq!(fallback.set_name(), Some("rs0"));
        assert_eq!(fallback.election_markers(), (Some(3), Some(12)));
        assert_eq!(fallback.fallback(), fallback);

        assert_eq!(Topology::Sharded(Sharded).fallback(), Topology::default());
    }

    #[test]
    fn test_display() {
        assert_eq!(Topology::Sharded(Sharded).to_string(), "Sharded");
        assert_eq!(
            Topology::ReplicaSet(ReplicaSet::new("rs0")).to_string(),
            "ReplicaSetNoPrimary (rs0)"
        );
        assert_eq!(TopologyKind::ReplicaSet.to_string(), "ReplicaSet");
    }
}
