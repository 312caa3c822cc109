//! Line length estimation before jump targets are known
//!
//! Lines are measured while they still contain label jumps and `line()`
//! placeholders. Both are rendered with placeholders at least as wide as any
//! value they can later be replaced with, so a line that fits now still fits
//! after resolution.

use crate::ast::{Expr, Statement};
use crate::error::Result;
use crate::printer::{PrintMode, Printer, PrinterExtension};

/// Narrowest stand-in for a not yet known line number reference
const MIN_LINE_PLACEHOLDER_WIDTH: usize = 2;

#[derive(Debug, Clone)]
pub struct LengthEstimator {
    mode: PrintMode,
    jump_placeholder: String,
    line_placeholder: String,
}

impl LengthEstimator {
    /// `max_lines` bounds the widest line number that can ever be emitted
    pub fn new(mode: PrintMode, max_lines: usize) -> Self {
        let width = max_lines.max(1).to_string().len();
        Self {
            mode,
            jump_placeholder: "9".repeat(width),
            line_placeholder: "0".repeat(width.max(MIN_LINE_PLACEHOLDER_WIDTH)),
        }
    }

    /// Render statements as they would appear on one line
    pub fn render(&self, statements: &[Statement]) -> Result<String> {
        Printer::new(self.mode).with_extension(self).print_line(statements)
    }

    /// Upper bound for the final length of a line holding `statements`
    pub fn line_length(&self, statements: &[Statement]) -> Result<usize> {
        Ok(self.render(statements)?.chars().count())
    }
}

impl PrinterExtension for LengthEstimator {
    fn print_statement(&self, statement: &Statement, printer: &mut Printer<'_>) -> bool {
        match statement {
            Statement::GotoLabel { .. } => {
                printer.word("goto");
                printer.word(&self.jump_placeholder);
                true
            }
            _ => false,
        }
    }

    fn print_expr(&self, expr: &Expr, printer: &mut Printer<'_>) -> bool {
        match expr {
            Expr::CurrentLine => {
                printer.word(&self.line_placeholder);
                true
            }
            _ => false,
        }
    }
}
