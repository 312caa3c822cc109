//! Line packing
//!
//! Greedy left-to-right merge of consecutive statement lines. A line keeps
//! absorbing its successors until the next one would overflow the character
//! budget or a boundary is reached. Lines are never reordered.

use tracing::trace;

use crate::ast::StatementLine;
use crate::error::{CompileError, Result};
use crate::estimate::LengthEstimator;

/// Packs statement lines into as few physical lines as fit the budget
#[derive(Debug, Clone, Copy)]
pub struct LinePacker<'e> {
    estimator: &'e LengthEstimator,
    budget: usize,
}

impl<'e> LinePacker<'e> {
    pub fn new(estimator: &'e LengthEstimator, budget: usize) -> Self {
        Self { estimator, budget }
    }

    pub fn pack(&self, lines: Vec<StatementLine>) -> Result<Vec<StatementLine>> {
        let mut packed = Vec::with_capacity(lines.len());
        let mut lines = lines.into_iter();
        let Some(mut current) = lines.next() else {
            return Ok(packed);
        };
        self.check_fits(&current)?;

        for next in lines {
            self.check_fits(&next)?;
            match self.try_extend(&current, &next)? {
                Some(merged) => current = merged,
                None => packed.push(std::mem::replace(&mut current, next)),
            }
        }
        packed.push(current);
        Ok(packed)
    }

    /// `current` with `next` appended, or `None` if `next` has to start a new line
    pub fn try_extend(
        &self,
        current: &StatementLine,
        next: &StatementLine,
    ) -> Result<Option<StatementLine>> {
        if current.has_eol || next.has_bol || next.label.is_some() {
            return Ok(None);
        }

        let mut statements = current.statements.clone();
        statements.extend(next.statements.iter().cloned());
        let length = self.estimator.line_length(&statements)?;
        if length > self.budget {
            trace!(length, budget = self.budget, "line full");
            return Ok(None);
        }

        Ok(Some(StatementLine {
            label: current.label.clone(),
            statements,
            span: current.span.merge(next.span),
            has_eol: next.has_eol,
            has_bol: current.has_bol,
        }))
    }

    fn check_fits(&self, line: &StatementLine) -> Result<()> {
        let length = self.estimator.line_length(&line.statements)?;
        if length > self.budget {
            return Err(CompileError::structural(
                format!(
                    "line is too long ({length} characters, at most {} allowed)",
                    self.budget
                ),
                line.span,
            ));
        }
        Ok(())
    }
}
