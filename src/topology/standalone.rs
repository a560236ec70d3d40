/// Behaviour for a cluster in standalone topology
use std::sync::Arc;

use super::TopologyRules;
use crate::core::{DescriptionSet, SelectionCriteria, ServerDescription};

/// A deployment consisting of exactly one standalone server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standalone;

impl Standalone {
    /// The display name for the topology
    pub const NAME: &'static str = "Standalone";
}

impl TopologyRules for Standalone {
    fn display_name(&self) -> &'static str {
        Self::NAME
    }

    fn is_replica_set(&self) -> bool {
        false
    }

    fn is_sharded(&self) -> bool {
        false
    }

    fn is_standalone(&self) -> bool {
        true
    }

    /// Select the standalone server
    ///
    /// Returns the first description whose role is standalone, or an empty
    /// vector when none is present. `criteria` is accepted so every variant
    /// shares one signature, but it is ignored here: a standalone deployment
    /// has a single target whatever the read or write preference.
    fn select_servers(
        &self,
        descriptions: &DescriptionSet,
        _criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>> {
        descriptions
            .values()
            .find(|description| description.is_standalone())
            .cloned()
            .into_iter()
            .collect()
    }
}
