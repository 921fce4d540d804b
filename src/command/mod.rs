// src/command/mod.rs

//! What rules emit.
//!
//! A [`GenerationCommand`] is the contract with the downstream product
//! generator: algorithm id, ordered file UUIDs, ordered `--key=value`
//! arguments. Argument order and flag presence are part of that contract.
//! [`render`] produces one per rule family; [`ArgList`] keeps the ordering
//! rules in one place.

pub mod args;
pub mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rule::RuleId;

pub use args::ArgList;

pub const COMPOSITE_ALGORITHM: &str = "eu.baltrad.beast.GenerateComposite";
pub const VOLUME_ALGORITHM: &str = "eu.baltrad.beast.GenerateVolume";
pub const ACRR_ALGORITHM: &str = "eu.baltrad.beast.CreateAcrr";
pub const GRA_ALGORITHM: &str = "eu.baltrad.beast.CreateGraCoefficient";
pub const SCANSUN_ALGORITHM: &str = "eu.baltrad.beast.GenerateScansun";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCommand {
    pub algorithm: String,
    pub files: Vec<Uuid>,
    pub arguments: Vec<String>,
}

/// Everything a rule can ask the outside world to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    Generate {
        rule: RuleId,
        command: GenerationCommand,
    },
    /// Forward one file unchanged.
    Distribute {
        rule: RuleId,
        file: Uuid,
        destination: String,
        name: String,
    },
    TrimByAge {
        rule: RuleId,
        cutoff: DateTime<Utc>,
    },
    TrimByCount {
        rule: RuleId,
        keep: usize,
    },
}

impl RuleAction {
    pub fn rule(&self) -> &RuleId {
        match self {
            RuleAction::Generate { rule, .. }
            | RuleAction::Distribute { rule, .. }
            | RuleAction::TrimByAge { rule, .. }
            | RuleAction::TrimByCount { rule, .. } => rule,
        }
    }

    pub fn command(&self) -> Option<&GenerationCommand> {
        match self {
            RuleAction::Generate { command, .. } => Some(command),
            _ => None,
        }
    }
}
