// src/catalog/filter.rs

//! Attribute filters attached to rules.
//!
//! In TOML a filter is written as nested tables:
//!
//! ```toml
//! filter = { all = [
//!     { attr = "quantity", op = "eq", value = "DBZH" },
//!     { not = { attr = "task", op = "matches", value = "^se\\.smhi\\.test" } },
//! ] }
//! ```
//!
//! The raw form is compiled into a [`ContentFilter`] when the configuration
//! is validated, so a bad regex or a non-numeric `lt`/`gt` bound never
//! reaches the engine.

use regex::Regex;
use serde::Deserialize;

use super::FileEntry;
use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Matches,
}

/// Filter as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawContentFilter {
    All { all: Vec<RawContentFilter> },
    Any { any: Vec<RawContentFilter> },
    Not { not: Box<RawContentFilter> },
    Attr {
        attr: String,
        op: FilterOp,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String),
    Ne(String),
    Lt(f64),
    Gt(f64),
    Matches(Regex),
}

/// Compiled attribute filter.
#[derive(Debug, Clone)]
pub enum ContentFilter {
    Attr { name: String, predicate: Predicate },
    All(Vec<ContentFilter>),
    Any(Vec<ContentFilter>),
    Not(Box<ContentFilter>),
}

impl ContentFilter {
    /// A missing attribute never satisfies a predicate.
    pub fn matches(&self, entry: &FileEntry) -> bool {
        match self {
            ContentFilter::Attr { name, predicate } => match entry.attribute(name) {
                Some(value) => predicate.holds(&value),
                None => false,
            },
            ContentFilter::All(parts) => parts.iter().all(|p| p.matches(entry)),
            ContentFilter::Any(parts) => parts.iter().any(|p| p.matches(entry)),
            ContentFilter::Not(inner) => !inner.matches(entry),
        }
    }
}

impl Predicate {
    fn holds(&self, value: &str) -> bool {
        match self {
            Predicate::Eq(expected) => value == expected,
            Predicate::Ne(expected) => value != expected,
            Predicate::Lt(bound) => value.trim().parse::<f64>().is_ok_and(|v| v < *bound),
            Predicate::Gt(bound) => value.trim().parse::<f64>().is_ok_and(|v| v > *bound),
            Predicate::Matches(re) => re.is_match(value),
        }
    }
}

impl TryFrom<RawContentFilter> for ContentFilter {
    type Error = EngineError;

    fn try_from(raw: RawContentFilter) -> Result<Self> {
        match raw {
            RawContentFilter::All { all } => Ok(ContentFilter::All(compile_all(all)?)),
            RawContentFilter::Any { any } => Ok(ContentFilter::Any(compile_all(any)?)),
            RawContentFilter::Not { not } => {
                Ok(ContentFilter::Not(Box::new(ContentFilter::try_from(*not)?)))
            }
            RawContentFilter::Attr { attr, op, value } => {
                let predicate = match op {
                    FilterOp::Eq => Predicate::Eq(value),
                    FilterOp::Ne => Predicate::Ne(value),
                    FilterOp::Lt => Predicate::Lt(parse_bound(&attr, &value)?),
                    FilterOp::Gt => Predicate::Gt(parse_bound(&attr, &value)?),
                    FilterOp::Matches => Predicate::Matches(Regex::new(&value).map_err(|e| {
                        EngineError::Config(format!(
                            "invalid regex '{}' in filter on '{}': {}",
                            value, attr, e
                        ))
                    })?),
                };
                Ok(ContentFilter::Attr {
                    name: attr,
                    predicate,
                })
            }
        }
    }
}

fn compile_all(parts: Vec<RawContentFilter>) -> Result<Vec<ContentFilter>> {
    parts.into_iter().map(ContentFilter::try_from).collect()
}

fn parse_bound(attr: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        EngineError::Config(format!(
            "filter on '{}' needs a numeric bound (got '{}')",
            attr, value
        ))
    })
}
