// src/rule/gra.rs

use super::term::TermPolicy;
use super::{RuleContext, RuleEvent, RuleId};
use crate::command::{RuleAction, render};
use crate::errors::Result;

/// Gauge-radar adjustment coefficients; same term handling as ACRR, with
/// the term length being the coefficient interval.
#[derive(Debug, Clone)]
pub struct GraRule {
    pub id: RuleId,
    pub term: TermPolicy,
}

impl GraRule {
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
            .trigger(&self.id, at, ctx, |nominal, files| render::gra(self, nominal, files))
    }
}
