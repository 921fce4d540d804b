// src/rule/acrr.rs

use super::term::TermPolicy;
use super::{RuleContext, RuleEvent, RuleId};
use crate::command::{RuleAction, render};
use crate::errors::Result;

/// Precipitation accumulation over a term.
#[derive(Debug, Clone)]
pub struct AcrrRule {
    pub id: RuleId,
    pub term: TermPolicy,
    pub apply_gra: bool,
}

impl AcrrRule {
    pub(crate) fn handle(
        &self,
        event: RuleEvent<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<RuleAction>> {
        let at = match event {
            RuleEvent::Arrival(entry) if self.term.accepts(entry) => entry.datetime,
            RuleEvent::Arrival(_) => return Ok(None),
            RuleEvent::Tick(at) => at,
        };
        self.term
            .trigger(&self.id, at, ctx, |nominal, files| render::acrr(self, nominal, files))
    }
}
