//! Label and jump resolution
//!
//! Passes that run on the flat line list once lowering is done. Before
//! packing they work on label names; [`build_label_table`] fixes the final
//! line numbers and the remaining passes substitute them.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::Context;
use crate::ast::{BaseProgram, Expr, Number, Span, Statement, StatementLine};
use crate::error::{CompileError, Result};
use crate::visit::{Phase, Visit, Visitor, walk_statements};

/// Label given to the first line when it has none and something must jump there
pub(crate) const START_LABEL: &str = "start#";

/// Drop lines that produce no code and cannot be jumped to
pub(crate) fn remove_empty_lines(lines: &mut Vec<StatementLine>) {
    lines.retain(|line| {
        !(line.is_empty() && line.label.is_none() && !line.has_bol && !line.has_eol)
    });
}

/// Make execution wrap around to the first line after the last one
pub(crate) fn append_terminal_jump(lines: &mut Vec<StatementLine>, ctx: &mut Context<'_>) {
    let Some(first) = lines.first_mut() else {
        return;
    };
    let target = first
        .label
        .get_or_insert_with(|| START_LABEL.to_string())
        .clone();
    let span = lines.last().map(|l| l.span).unwrap_or_default();
    lines.push(StatementLine::new(vec![Statement::goto_label(target)]).with_span(span));
    ctx.terminal_jump = true;
}

/// Point every jump at the end of the chain of jump-only lines it leads into.
/// Empty lines between a label and its jump are looked through.
pub(crate) fn collapse_jump_chains(lines: &mut [StatementLine]) -> Result<()> {
    let index: HashMap<&str, usize> = lines
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(i, line)| line.label.as_deref().map(|label| (label, i)))
        .collect();

    let mut targets = HashSet::new();
    collect_jump_targets(lines, &mut targets);

    let mut retarget = HashMap::new();
    for target in targets {
        let resolved = resolve_chain(lines, &index, &target);
        if resolved != target {
            trace!(from = %target, to = %resolved, "collapsed jump chain");
            retarget.insert(target, resolved);
        }
    }
    if retarget.is_empty() {
        return Ok(());
    }

    let mut visitor = Retarget { map: &retarget };
    for line in lines.iter_mut() {
        walk_statements(&mut line.statements, &mut visitor)?;
    }
    Ok(())
}

/// Follows jump-only lines starting at `start`. A chain that runs into a
/// cycle is left alone.
fn resolve_chain(lines: &[StatementLine], index: &HashMap<&str, usize>, start: &str) -> String {
    let mut visited = HashSet::from([start.to_string()]);
    let mut current = start.to_string();
    loop {
        let Some(&i) = index.get(current.as_str()) else {
            return current;
        };
        let Some(line) = lines[i..].iter().find(|line| !line.is_empty()) else {
            return current;
        };
        match line.sole_jump() {
            Some(next) if visited.contains(next) => return start.to_string(),
            Some(next) => {
                visited.insert(next.to_string());
                current = next.to_string();
            }
            None => return current,
        }
    }
}

struct Retarget<'m> {
    map: &'m HashMap<String, String>,
}

impl Visitor for Retarget<'_> {
    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre
            && let Statement::GotoLabel { label, .. } = statement
            && let Some(target) = self.map.get(label.as_str())
        {
            *label = target.clone();
        }
        Ok(Visit::Unchanged)
    }
}

fn collect_jump_targets(lines: &[StatementLine], out: &mut HashSet<String>) {
    fn statements(stmts: &[Statement], out: &mut HashSet<String>) {
        for stmt in stmts {
            match stmt {
                Statement::GotoLabel { label, .. } => {
                    out.insert(label.clone());
                }
                Statement::If {
                    then_block,
                    else_block,
                    ..
                } => {
                    statements(then_block, out);
                    if let Some(block) = else_block {
                        statements(block, out);
                    }
                }
                _ => {}
            }
        }
    }
    for line in lines {
        statements(&line.statements, out);
    }
}

/// Strip labels nothing jumps to, so those lines can be merged
pub(crate) fn remove_unused_labels(lines: &mut [StatementLine]) {
    let mut used = HashSet::new();
    collect_jump_targets(lines, &mut used);
    for line in lines.iter_mut() {
        if line.label.as_ref().is_some_and(|label| !used.contains(label)) {
            line.label = None;
        }
    }
}

/// Drop a trailing jump to the line that follows anyway
pub(crate) fn remove_redundant_jumps(lines: &mut Vec<StatementLine>) {
    let mut i = 0;
    while i + 1 < lines.len() {
        let falls_through = match (lines[i].statements.last(), &lines[i + 1].label) {
            (Some(Statement::GotoLabel { label, .. }), Some(next)) => label == next,
            _ => false,
        };
        if falls_through {
            lines[i].statements.pop();
            if lines[i].is_empty() && lines[i].label.is_none() {
                lines.remove(i);
                continue;
            }
        }
        i += 1;
    }
}

/// label -> 1-based line number
pub(crate) fn build_label_table(lines: &[StatementLine]) -> Result<HashMap<String, usize>> {
    let mut table = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(label) = &line.label else {
            continue;
        };
        if table.insert(label.clone(), i + 1).is_some() {
            return Err(CompileError::structural(
                format!("duplicate label '{label}'"),
                line.span,
            ));
        }
    }
    Ok(table)
}

struct JumpResolver<'t> {
    table: &'t HashMap<String, usize>,
    line_span: Span,
}

impl Visitor for JumpResolver<'_> {
    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase != Phase::Pre {
            return Ok(Visit::Unchanged);
        }
        let Statement::GotoLabel { label, span } = statement else {
            return Ok(Visit::Unchanged);
        };
        match self.table.get(label.as_str()) {
            Some(&line) => Ok(Visit::replace_with(Statement::Goto(Expr::num(line as i64)))),
            None => {
                let span = if *span == Span::default() { self.line_span } else { *span };
                Err(CompileError::structural(format!("unknown label '{label}'"), span))
            }
        }
    }
}

/// Replace every jump to a label by a jump to its line number
pub(crate) fn substitute_jump_targets(
    lines: &mut [StatementLine],
    table: &HashMap<String, usize>,
) -> Result<()> {
    for line in lines.iter_mut() {
        let mut resolver = JumpResolver {
            table,
            line_span: line.span,
        };
        walk_statements(&mut line.statements, &mut resolver)?;
    }
    Ok(())
}

struct LineNumber(usize);

impl Visitor for LineNumber {
    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre && matches!(expr, Expr::CurrentLine) {
            return Ok(Visit::replace_with(Expr::num(self.0 as i64)));
        }
        Ok(Visit::Unchanged)
    }
}

/// Replace `line()` references by the number of the line they ended up on
pub(crate) fn substitute_line_numbers(lines: &mut [StatementLine]) -> Result<()> {
    for (i, line) in lines.iter_mut().enumerate() {
        walk_statements(&mut line.statements, &mut LineNumber(i + 1))?;
    }
    Ok(())
}

/// The appended `goto 1` is unnecessary if the last line always jumps away
/// before reaching it, or if the program already fills every line and
/// execution wraps around by itself.
pub(crate) fn remove_terminal_jump_if_implied(program: &mut BaseProgram, max_lines: usize) {
    let line_count = program.lines.len();
    let Some(last) = program.lines.last_mut() else {
        return;
    };
    let Some((Statement::Goto(Expr::Number(target)), before)) = last.statements.split_last()
    else {
        return;
    };
    if *target != Number::ONE {
        return;
    }
    let jumps_earlier = before.iter().any(|stmt| matches!(stmt, Statement::Goto(_)));
    let wraps = line_count == max_lines && !before.is_empty();
    if jumps_earlier || wraps {
        trace!(line = line_count, "dropped implied terminal jump");
        last.statements.pop();
    }
}
