//! Time tracking
//!
//! When a program reads its own line number, every line also increments a
//! hidden counter so the program can measure elapsed ticks.

use crate::ast::{Dereference, IncDec, Statement, StatementLine};

/// Prepend `var++` to every line
pub(crate) fn insert_line_counter(lines: &mut [StatementLine], variable: &str) {
    for line in lines {
        line.statements.insert(
            0,
            Statement::Step(Dereference::with_operator(variable, IncDec::Increment, false)),
        );
    }
}
