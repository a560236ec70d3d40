/// Topology before anything has been classified
use std::sync::Arc;

use super::TopologyRules;
use crate::core::{DescriptionSet, SelectionCriteria, ServerDescription};

///
/// A replica set that loses every classifiable member falls back here. The
/// set name and election markers it had reached are kept so the next
/// classification still rejects other sets and primaries from older
/// elections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unknown {
    set_name: Option<String>,
    max_set_version: Option<i32>,
    max_election_id: Option<u64>,
}

impl Unknown {
    pub fn new(set_name: Option<String>) -> Self {
        Self {
            set_name,
            ..Default::default()
        }
    }

    pub fn with_markers(mut self, max_set_version: Option<i32>, max_election_id: Option<u64>) -> Self {
        self.max_set_version = max_set_version;
        self.max_election_id = max_election_id;
        self
    }

    /// Replica set name the next classification must agree with
    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }

    pub fn max_set_version(&self) -> Option<i32> {
        self.max_set_version
    }

    pub fn max_election_id(&self) -> Option<u64> {
        self.max_election_id
    }
}

impl TopologyRules for Unknown {
    fn display_name(&self) -> &'static str {
        "Unknown"
    }

    fn is_replica_set(&self) -> bool {
        false
    }

    fn is_sharded(&self) -> bool {
        false
    }

    fn is_standalone(&self) -> bool {
        false
    }

    fn select_servers(
        &self,
        _descriptions: &DescriptionSet,
        _criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>> {
        Vec::new()
    }
}
