/// Classify the cluster shape from the current server descriptions
use std::sync::Arc;
use tracing::debug;

use super::{ReplicaSet, Sharded, Standalone, Topology};
use crate::core::{DescriptionSet, ServerDescription, ServerRole};
use crate::error::{Inconsistency, TopologyError, TopologyResult};

/// Outcome of one classification
///
/// When the evidence is contradictory `inconsistency` is set and `topology`
/// is an unknown topology that keeps the replica set name and election
/// markers the previous topology was committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub topology: Topology,
    pub inconsistency: Option<Inconsistency>,
}

impl Classification {
    fn consistent(topology: Topology) -> Self {
        Self {
            topology,
            inconsistency: None,
        }
    }

    fn inconsistent(previous: &Topology, inconsistency: Inconsistency) -> Self {
        Self {
            topology: previous.fallback(),
            inconsistency: Some(inconsistency),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.inconsistency.is_none()
    }

    pub fn into_result(self) -> TopologyResult<Topology> {
        match self.inconsistency {
            Some(inconsistency) => Err(TopologyError::Inconsistency(inconsistency)),
            None => Ok(self.topology),
        }
    }
}

/// Map a description set to a topology
///
/// Precedence is standalone, then replica set, then mongos. With nothing
/// classifiable the result is unknown. Only the replica set name and the
/// election markers are carried over from `previous`; once a set name is
/// established, a standalone or mongos is reported rather than adopted.
pub fn classify(previous: &Topology, descriptions: &DescriptionSet) -> Classification {
    let standalones: Vec<_> = descriptions
        .values()
        .filter(|description| description.is_standalone())
        .map(|description| description.address.clone())
        .collect();
    match standalones.len() {
        0 => {}
        1 => {
            if let Some(set_name) = previous.set_name() {
                return Classification::inconsistent(
                    previous,
                    Inconsistency::UnexpectedRole {
                        set_name: set_name.to_owned(),
                        address: standalones[0].clone(),
                        role: ServerRole::Standalone,
                    },
                );
            }
            return Classification::consistent(Topology::Standalone(Standalone));
        }
        _ => {
            return Classification::inconsistent(
                previous,
                Inconsistency::MultipleStandalone {
                    addresses: standalones,
                },
            )
        }
    }

    let members: Vec<_> = descriptions
        .values()
        .filter(|description| description.replica_set_name().is_some())
        .collect();
    if !members.is_empty() {
        return classify_replica_set(previous, &members);
    }

    if let Some(mongos) = descriptions.values().find(|description| description.is_mongos()) {
        if let Some(set_name) = previous.set_name() {
            return Classification::inconsistent(
                previous,
                Inconsistency::UnexpectedRole {
                    set_name: set_name.to_owned(),
                    address: mongos.address.clone(),
                    role: ServerRole::Mongos,
                },
            );
        }
        return Classification::consistent(Topology::Sharded(Sharded));
    }

    let unclassified = descriptions
        .values()
        .filter(|description| description.role.is_unclassified())
        .count();
    debug!(
        "No classifiable server among {} descriptions ({} unknown or ghost)",
        descriptions.len(),
        unclassified
    );
    Classification::consistent(previous.fallback())
}

fn classify_replica_set(previous: &Topology, members: &[&Arc<ServerDescription>]) -> Classification {
    let mut names: Vec<&str> = members
        .iter()
        .filter_map(|member| member.replica_set_name())
        .collect();
    names.sort_unstable();
    names.dedup();

    let set_name = match names.as_slice() {
        [set_name] => *set_name,
        _ => {
            return Classification::inconsistent(
                previous,
                Inconsistency::ConflictingSetNames {
                    names: names.into_iter().map(ToOwned::to_owned).collect(),
                },
            )
        }
    };

    if let Some(expected) = previous.set_name() {
        if expected != set_name {
            let address = members[0].address.clone();
            return Classification::inconsistent(
                previous,
                Inconsistency::SetNameChanged {
                    expected: expected.to_owned(),
                    observed: set_name.to_owned(),
                    address,
                },
            );
        }
    }

    let (max_set_version, max_election_id) = previous.election_markers();
    let baseline = ReplicaSet::new(set_name).with_markers(max_set_version, max_election_id);

    let primary = members
        .iter()
        .filter(|member| member.is_primary())
        .filter(|member| {
            let stale = baseline.is_stale_primary(member);
            if stale {
                debug!(
                    "Ignoring stale primary {} (election_id={:?}, set_version={:?})",
                    member.address, member.election_id, member.set_version
                );
            }
            !stale
        })
        .max_by_key(|member| (member.election_id, member.set_version));

    let topology = match primary {
        Some(primary) => ReplicaSet::new(set_name)
            .with_primary(primary.address.clone())
            .with_markers(
                baseline.max_set_version().max(primary.set_version),
                baseline.max_election_id().max(primary.election_id),
            ),
        None => baseline,
    };

    Classification::consistent(Topology::ReplicaSet(topology))
}
