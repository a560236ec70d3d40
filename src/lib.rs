pub mod config;
pub mod error;
/// mongo-topology - Topology classification and server selection for MongoDB clients
///
/// The crate decides two things for a cluster client:
/// 1. Classification: what shape the cluster has (standalone, replica set,
///    sharded or not yet known), derived from the server descriptions that
///    monitoring reports
/// 2. Selection: which of the known servers may receive a given operation
///
/// Monitoring publishes into a [`ClusterState`]; operation callers read it
/// through [`select`] or a [`ServerSelector`].
pub mod cluster;
pub mod core;
pub mod selection;
pub mod topology;

pub use crate::cluster::{ClusterSnapshot, ClusterState, Lifecycle, UpdateOutcome};
pub use crate::core::{
    description_set, DescriptionSet, ReadMode, SelectionCriteria, ServerAddress,
    ServerDescription, ServerRole, TagSet,
};
pub use crate::error::{Inconsistency, TopologyError, TopologyResult};
pub use crate::selection::{select, ServerSelector};
pub use crate::topology::{classify, Classification, Topology, TopologyKind, TopologyRules};
