/// Replica set topology and read-preference filtering
use std::sync::Arc;

use super::TopologyRules;
use crate::core::{
    DescriptionSet, ReadMode, SelectionCriteria, ServerAddress, ServerDescription, TagSet,
};

/// A replica set committed to one set name
///
/// `primary` is the primary the classifier accepted; a member that still
/// reports itself as primary after losing an election is never selected.
/// `max_set_version`/`max_election_id` only move forward across
/// classifications and are used to recognize such stale primaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSet {
    set_name: String,
    primary: Option<ServerAddress>,
    max_set_version: Option<i32>,
    max_election_id: Option<u64>,
}

impl ReplicaSet {
    pub fn new<S: Into<String>>(set_name: S) -> Self {
        Self {
            set_name: set_name.into(),
            primary: None,
            max_set_version: None,
            max_election_id: None,
        }
    }

    pub fn with_primary(mut self, primary: ServerAddress) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_markers(mut self, max_set_version: Option<i32>, max_election_id: Option<u64>) -> Self {
        self.max_set_version = max_set_version;
        self.max_election_id = max_election_id;
        self
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }

    pub fn primary(&self) -> Option<&ServerAddress> {
        self.primary.as_ref()
    }

    pub fn max_set_version(&self) -> Option<i32> {
        self.max_set_version
    }

    pub fn max_election_id(&self) -> Option<u64> {
        self.max_election_id
    }

    /// Whether a primary reporting these markers predates one already seen
    ///
    /// Election ids are compared first, set versions break ties. A report
    /// without an election id cannot be ordered and is never stale.
    pub fn is_stale_primary(&self, description: &ServerDescription) -> bool {
        match (description.election_id, self.max_election_id) {
            (Some(election_id), Some(max_election_id)) => {
                election_id < max_election_id
                    || (election_id == max_election_id
                        && matches!(
                            (description.set_version, self.max_set_version),
                            (Some(version), Some(max_version)) if version < max_version
                        ))
            }
            _ => false,
        }
    }

    fn is_member(&self, description: &ServerDescription) -> bool {
        description.replica_set_name() == Some(self.set_name.as_str())
    }

    fn current_primary(&self, descriptions: &DescriptionSet) -> Option<Arc<ServerDescription>> {
        self.primary
            .as_ref()
            .and_then(|address| descriptions.get(address))
            .filter(|description| description.is_primary() && self.is_member(description))
            .cloned()
    }
}

impl TopologyRules for ReplicaSet {
    fn display_name(&self) -> &'static str {
        if self.primary.is_some() {
            "ReplicaSetWithPrimary"
        } else {
            "ReplicaSetNoPrimary"
        }
    }

    fn is_replica_set(&self) -> bool {
        true
    }

    fn is_sharded(&self) -> bool {
        false
    }

    fn is_standalone(&self) -> bool {
        false
    }

    fn select_servers(
        &self,
        descriptions: &DescriptionSet,
        criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>> {
        let primary = self.current_primary(descriptions);
        let secondaries: Vec<_> = descriptions
            .values()
            .filter(|description| description.is_secondary() && self.is_member(description))
            .cloned()
            .collect();
        let secondaries = within_staleness(secondaries, primary.as_deref(), criteria);

        match criteria.mode {
            ReadMode::Primary => primary.into_iter().collect(),
            ReadMode::PrimaryPreferred => match primary {
                Some(primary) => vec![primary],
                None => matching_tag_sets(secondaries, &criteria.tag_sets),
            },
            ReadMode::Secondary => matching_tag_sets(secondaries, &criteria.tag_sets),
            ReadMode::SecondaryPreferred => {
                let selected = matching_tag_sets(secondaries, &criteria.tag_sets);
                if selected.is_empty() {
                    primary.into_iter().collect()
                } else {
                    selected
                }
            }
            ReadMode::Nearest => {
                let candidates = primary.into_iter().chain(secondaries).collect();
                matching_tag_sets(candidates, &criteria.tag_sets)
            }
        }
    }
}

/// Drop secondaries lagging further behind than `max_staleness`
///
/// Lag is measured against the primary's last write, or the freshest
/// secondary's when there is no primary.
fn within_staleness(
    secondaries: Vec<Arc<ServerDescription>>,
    primary: Option<&ServerDescription>,
    criteria: &SelectionCriteria,
) -> Vec<Arc<ServerDescription>> {
    let Some(max_staleness) = criteria.max_staleness else {
        return secondaries;
    };
    let max_lag = u64::try_from(max_staleness.as_millis()).unwrap_or(u64::MAX);

    let reference = primary
        .and_then(|primary| primary.last_write)
        .or_else(|| secondaries.iter().filter_map(|s| s.last_write).max());
    let Some(reference) = reference else {
        return Vec::new();
    };

    secondaries
        .into_iter()
        .filter(|secondary| {
            secondary
                .last_write
                .is_some_and(|last_write| reference.saturating_sub(last_write) <= max_lag)
        })
        .collect()
}

/// Apply tag sets in order; the first one matching any candidate wins
fn matching_tag_sets(
    candidates: Vec<Arc<ServerDescription>>,
    tag_sets: &[TagSet],
) -> Vec<Arc<ServerDescription>> {
    if tag_sets.is_empty() {
        return candidates;
    }

    for tag_set in tag_sets {
        let matching: Vec<_> = candidates
            .iter()
            .filter(|candidate| candidate.matches_tag_set(tag_set))
            .cloned()
            .collect();
        if !matching.is_empty() {
            return matching;
        }
    }

    Vec::new()
}
