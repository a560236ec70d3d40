/// Core value types shared by classification and selection
pub mod address;
pub mod criteria;

pub use address::{ServerAddress, DEFAULT_PORT};
pub use criteria::{ReadMode, SelectionCriteria, TagSet, MIN_MAX_STALENESS};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Server descriptions keyed by address
///
/// Ordered so classification and selection iterate deterministically.
pub type DescriptionSet = BTreeMap<ServerAddress, Arc<ServerDescription>>;

/// Last-observed role of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerRole {
    #[default]
    Unknown,
    Standalone,
    RsPrimary,
    RsSecondary,
    RsArbiter,
    RsOther,
    Mongos,
    RsGhost,
}

impl ServerRole {
    /// Roles that belong to a replica set and may carry a set name
    pub fn is_replica_member(self) -> bool {
        matches!(
            self,
            ServerRole::RsPrimary
                | ServerRole::RsSecondary
                | ServerRole::RsArbiter
                | ServerRole::RsOther
        )
    }

    /// Roles that contribute nothing to classification
    pub fn is_unclassified(self) -> bool {
        matches!(self, ServerRole::Unknown | ServerRole::RsGhost)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerRole::Unknown => "unknown",
            ServerRole::Standalone => "standalone",
            ServerRole::RsPrimary => "rs-primary",
            ServerRole::RsSecondary => "rs-secondary",
            ServerRole::RsArbiter => "rs-arbiter",
            ServerRole::RsOther => "rs-other",
            ServerRole::Mongos => "mongos",
            ServerRole::RsGhost => "rs-ghost",
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable last-known state of one cluster member, produced by monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescription {
    pub address: ServerAddress,
    #[serde(default)]
    pub role: ServerRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Logical timestamp; a higher value supersedes a lower one for the same address
    #[serde(default)]
    pub last_update: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<u64>,
    /// Milliseconds of the server's most recent write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_write: Option<u64>,
}

impl ServerDescription {
    pub fn new(address: ServerAddress, role: ServerRole) -> Self {
        Self {
            address,
            role,
            set_name: None,
            tags: BTreeMap::new(),
            last_update: 0,
            set_version: None,
            election_id: None,
            last_write: None,
        }
    }

    /// Description for an address nothing is known about yet
    pub fn unknown(address: ServerAddress) -> Self {
        Self::new(address, ServerRole::Unknown)
    }

    pub fn with_set_name<S: Into<String>>(mut self, set_name: S) -> Self {
        self.set_name = Some(set_name.into());
        self
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_last_update(mut self, last_update: u64) -> Self {
        self.last_update = last_update;
        self
    }

    pub fn with_election(mut self, set_version: i32, election_id: u64) -> Self {
        self.set_version = Some(set_version);
        self.election_id = Some(election_id);
        self
    }

    pub fn with_last_write(mut self, last_write: u64) -> Self {
        self.last_write = Some(last_write);
        self
    }

    pub fn is_standalone(&self) -> bool {
        self.role == ServerRole::Standalone
    }

    pub fn is_primary(&self) -> bool {
        self.role == ServerRole::RsPrimary
    }

    pub fn is_secondary(&self) -> bool {
        self.role == ServerRole::RsSecondary
    }

    pub fn is_mongos(&self) -> bool {
        self.role == ServerRole::Mongos
    }

    /// Set name, only meaningful for replica-set roles
    pub fn replica_set_name(&self) -> Option<&str> {
        if self.role.is_replica_member() {
            self.set_name.as_deref()
        } else {
            None
        }
    }

    /// Whether every pair of `tag_set` is present on this server
    pub fn matches_tag_set(&self, tag_set: &TagSet) -> bool {
        tag_set
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }

    /// Whether `other` should replace this description for the same address
    pub fn is_superseded_by(&self, other: &ServerDescription) -> bool {
        other.last_update > self.last_update
    }
}

/// Build a [`DescriptionSet`], keeping the newest description per address
pub fn description_set<I>(descriptions: I) -> DescriptionSet
where
    I: IntoIterator<Item = ServerDescription>,
{
    let mut set = DescriptionSet::new();
    for description in descriptions {
        let keep_existing = set
            .get(&description.address)
            .is_some_and(|existing| !existing.is_superseded_by(&description));
        if !keep_existing {
            set.insert(description.address.clone(), Arc::new(description));
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> ServerAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_role_predicates() {
        assert!(ServerRole::RsPrimary.is_replica_member());
        assert!(ServerRole::RsArbiter.is_replica_member());
        assert!(!ServerRole::RsGhost.is_replica_member());
        assert!(!ServerRole::Mongos.is_replica_member());
        assert!(ServerRole::Unknown.is_unclassified());
        assert!(ServerRole::RsGhost.is_unclassified());
        assert!(!ServerRole::Standalone.is_unclassified());
    }

    #[test]
    fn test_replica_set_name_ignored_for_non_members() {
        let mongos = ServerDescription::new(addr("m1"), ServerRole::Mongos).with_set_name("rs0");
        assert_eq!(mongos.replica_set_name(), None);

        let secondary =
            ServerDescription::new(addr("s1"), ServerRole::RsSecondary).with_set_name("rs0");
        assert_eq!(secondary.replica_set_name(), Some("rs0"));
    }

    #[test]
    fn test_matches_tag_set() {
        let server = ServerDescription::new(addr("s1"), ServerRole::RsSecondary)
            .with_tag("dc", "east")
            .with_tag("rack", "1");

        assert!(server.matches_tag_set(&TagSet::new()));
        assert!(server.matches_tag_set(&TagSet::from([("dc".to_string(), "east".to_string())])));
        assert!(!server.matches_tag_set(&TagSet::from([("dc".to_string(), "west".to_string())])));
        assert!(!server.matches_tag_set(&TagSet::from([("zone".to_string(), "a".to_string())])));
    }

    #[test]
    fn test_description_set_keeps_newest() {
        let set = description_set(vec![
            ServerDescription::new(addr("a"), ServerRole::RsSecondary).with_last_update(5),
            ServerDescription::new(addr("a"), ServerRole::RsPrimary).with_last_update(3),
            ServerDescription::new(addr("b"), ServerRole::Mongos).with_last_update(1),
        ]);

        assert_eq!(set.len(), 2);
        assert_eq!(set[&addr("a")].role, ServerRole::RsSecondary);
        assert_eq!(set[&addr("b")].role, ServerRole::Mongos);
    }

    #[test]
    fn test_role_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            role: ServerRole,
        }

        let parsed: Wrapper = toml::from_str("role = \"rs-primary\"").unwrap();
        assert_eq!(parsed.role, ServerRole::RsPrimary);
        assert_eq!(ServerRole::RsGhost.to_string(), "rs-ghost");
    }
}
