/// Per-operation server selection criteria
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{TopologyError, TopologyResult};

/// Tags a server must carry, all pairs required
pub type TagSet = BTreeMap<String, String>;

/// Smallest staleness bound a server can honor
pub const MIN_MAX_STALENESS: Duration = Duration::from_secs(90);

/// Role preference for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadMode {
    /// Must be the primary
    #[default]
    Primary,
    /// Primary if available, otherwise a secondary
    PrimaryPreferred,
    /// Any suitable secondary
    Secondary,
    /// A secondary if available, otherwise the primary
    SecondaryPreferred,
    /// Any available data-bearing member
    Nearest,
}

impl ReadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadMode::Primary => "primary",
            ReadMode::PrimaryPreferred => "primaryPreferred",
            ReadMode::Secondary => "secondary",
            ReadMode::SecondaryPreferred => "secondaryPreferred",
            ReadMode::Nearest => "nearest",
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadMode {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "primary" => Ok(ReadMode::Primary),
            "primarypreferred" => Ok(ReadMode::PrimaryPreferred),
            "secondary" => Ok(ReadMode::Secondary),
            "secondarypreferred" => Ok(ReadMode::SecondaryPreferred),
            "nearest" => Ok(ReadMode::Nearest),
            _ => Err(TopologyError::invalid_criteria(format!(
                "unknown read mode '{s}'"
            ))),
        }
    }
}

/// Caller-supplied requirements for one operation
///
/// `tag_sets` and `max_staleness` only refine selection in a replica set;
/// other topologies ignore them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionCriteria {
    pub mode: ReadMode,
    pub tag_sets: Vec<TagSet>,
    pub max_staleness: Option<Duration>,
}

impl SelectionCriteria {
    pub fn new(mode: ReadMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Criteria for writes and primary-only reads
    pub fn primary() -> Self {
        Self::new(ReadMode::Primary)
    }

    pub fn with_tag_sets(mut self, tag_sets: Vec<TagSet>) -> Self {
        self.tag_sets = tag_sets;
        self
    }

    pub fn with_max_staleness(mut self, max_staleness: Duration) -> Self {
        self.max_staleness = Some(max_staleness);
        self
    }

    /// Reject combinations no server could satisfy
    pub fn validate(&self) -> TopologyResult<()> {
        if self.mode == ReadMode::Primary {
            if self.tag_sets.iter().any(|set| !set.is_empty()) {
                return Err(TopologyError::invalid_criteria(
                    "tag sets cannot be combined with primary mode",
                ));
            }
            if self.max_staleness.is_some() {
                return Err(TopologyError::invalid_criteria(
                    "max staleness cannot be combined with primary mode",
                ));
            }
        }

        if let Some(max_staleness) = self.max_staleness {
            if max_staleness < MIN_MAX_STALENESS {
                return Err(TopologyError::invalid_criteria(format!(
                    "max staleness must be at least {}s, got {}s",
                    MIN_MAX_STALENESS.as_secs(),
                    max_staleness.as_secs()
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for SelectionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode={}", self.mode)?;
        if !self.tag_sets.is_empty() {
            write!(f, " tag_sets={:?}", self.tag_sets)?;
        }
        if let Some(max_staleness) = self.max_staleness {
            write!(f, " max_staleness={}s", max_staleness.as_secs())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_read_mode_parsing() {
        assert_eq!("primary".parse::<ReadMode>().unwrap(), ReadMode::Primary);
        assert_eq!(
            "secondaryPreferred".parse::<ReadMode>().unwrap(),
            ReadMode::SecondaryPreferred
        );
        assert_eq!(
            "primary_preferred".parse::<ReadMode>().unwrap(),
            ReadMode::PrimaryPreferred
        );
        assert_eq!("NEAREST".parse::<ReadMode>().unwrap(), ReadMode::Nearest);
        assert!("fastest".parse::<ReadMode>().is_err());
    }

    #[test]
    fn test_default_is_primary() {
        let criteria = SelectionCriteria::default();
        assert_eq!(criteria.mode, ReadMode::Primary);
        assert!(criteria.validate().is_ok());
    }

    #[test]
    fn test_primary_rejects_refinements() {
        let with_tags = SelectionCriteria::primary().with_tag_sets(vec![tags(&[("dc", "east")])]);
        assert!(matches!(
            with_tags.validate(),
            Err(TopologyError::InvalidCriteria { .. })
        ));

        let with_staleness =
            SelectionCriteria::primary().with_max_staleness(Duration::from_secs(120));
        assert!(with_staleness.validate().is_err());

        // An empty tag set matches everything, so it is harmless
        let empty_tags = SelectionCriteria::primary().with_tag_sets(vec![TagSet::new()]);
        assert!(empty_tags.validate().is_ok());
    }

    #[test]
    fn test_max_staleness_lower_bound() {
        let too_small =
            SelectionCriteria::new(ReadMode::Secondary).with_max_staleness(Duration::from_secs(10));
        assert!(too_small.validate().is_err());

        let ok = SelectionCriteria::new(ReadMode::Secondary).with_max_staleness(MIN_MAX_STALENESS);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_display() {
        let criteria = SelectionCriteria::new(ReadMode::Nearest)
            .with_max_staleness(Duration::from_secs(120));
        assert_eq!(criteria.to_string(), "mode=nearest max_staleness=120s");
    }
}
