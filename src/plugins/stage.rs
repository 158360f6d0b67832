//! # Processing stages.
//!
//! A [`Stage`] labels the phase a plugin belongs to. It feeds the timeline
//! rank through [`Stage::weight`]; it never influences dispatch order.
//!
//! | stage    | weight |
//! |----------|--------|
//! | discover | 1      |
//! | model    | 2      |
//! | simulate | 2      |
//! | optimize | 2      |
//! | execute  | 3      |
//! | verify   | 1      |
//! | archive  | 1      |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse phase label, declared in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discover,
    Model,
    Simulate,
    Optimize,
    Execute,
    Verify,
    Archive,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Discover,
        Stage::Model,
        Stage::Simulate,
        Stage::Optimize,
        Stage::Execute,
        Stage::Verify,
        Stage::Archive,
    ];

    /// Fixed scheduling weight; higher means more resource-intensive.
    pub const fn weight(self) -> u32 {
        match self {
            Stage::Discover => 1,
            Stage::Model => 2,
            Stage::Simulate => 2,
            Stage::Optimize => 2,
            Stage::Execute => 3,
            Stage::Verify => 1,
            Stage::Archive => 1,
        }
    }

    /// Lowercase name, as used in serialized definitions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Model => "model",
            Stage::Simulate => "simulate",
            Stage::Optimize => "optimize",
            Stage::Execute => "execute",
            Stage::Verify => "verify",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Stage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown stage '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_match_table() {
        let weights: Vec<u32> = Stage::ALL.iter().map(|s| s.weight()).collect();
        assert_eq!(weights, vec![1, 2, 2, 2, 3, 1, 1]);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Execute".parse::<Stage>(), Ok(Stage::Execute));
        assert_eq!(" archive ".parse::<Stage>(), Ok(Stage::Archive));
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn stages_are_ordered_by_pipeline_position() {
        assert!(Stage::Discover < Stage::Execute);
        assert!(Stage::Verify < Stage::Archive);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Stage::Optimize).unwrap();
        assert_eq!(json, "\"optimize\"");
    }
}
