/// Behaviour for a sharded cluster reached through mongos routers
use std::sync::Arc;

use super::TopologyRules;
use crate::core::{DescriptionSet, SelectionCriteria, ServerDescription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sharded;

impl TopologyRules for Sharded {
    fn display_name(&self) -> &'static str {
        "Sharded"
    }

    fn is_replica_set(&self) -> bool {
        false
    }

    fn is_sharded(&self) -> bool {
        true
    }

    fn is_standalone(&self) -> bool {
        false
    }

    /// Every mongos is eligible; read preference is forwarded to the router
    /// by the execution layer rather than applied here.
    fn select_servers(
        &self,
        descriptions: &DescriptionSet,
        _criteria: &SelectionCriteria,
    ) -> Vec<Arc<ServerDescription>> {
        descriptions
            .values()
            .filter(|description| description.is_mongos())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{description_set, ReadMode, ServerRole};

    #[test]
    fn test_selects_all_mongos() {
        let descriptions = description_set(vec![
            ServerDescription::new("m1".parse().unwrap(), ServerRole::Mongos),
            ServerDescription::new("m2".parse().unwrap(), ServerRole::Mongos),
            ServerDescription::new("x".parse().unwrap(), ServerRole::Unknown),
        ]);

        for mode in [ReadMode::Primary, ReadMode::Secondary, ReadMode::Nearest] {
            let selected = Sharded.select_servers(&descriptions, &SelectionCriteria::new(mode));
            let hosts: Vec<_> = selected.iter().map(|d| d.address.host().to_string()).collect();
            assert_eq!(hosts, vec!["m1", "m2"]);
        }
    }

    #[test]
    fn test_no_mongos() {
        let descriptions = description_set(vec![ServerDescription::new(
            "x".parse().unwrap(),
            ServerRole::Unknown,
        )]);
        assert!(Sharded
            .select_servers(&descriptions, &SelectionCriteria::primary())
            .is_empty());
    }
}
