//! nolol to yolol conversion
//!
//! The converter runs a fixed sequence of passes over the tree:
//!
//! ```text
//! lower ─▶ terminal jump ─▶ collapse jump chains ─▶ drop unused labels
//!       ─▶ pack lines ─▶ drop fallthrough jumps ─▶ resolve labels
//!       ─▶ resolve line() ─▶ refold ─▶ time tracking ─▶ validate
//! ```
//!
//! Refolding never makes a line longer. Validation checks the printed width of
//! every line as well as the line count.
//!
//! Every pass either completes or aborts the whole compilation with the first
//! error. All mutable compilation state (label counters, loop and macro stacks,
//! definitions) lives in a [`Context`] that exists for exactly one compilation.

mod labels;
mod lower;
mod macros;
mod merge;
mod timing;

use std::collections::HashMap;

use tracing::{debug, info_span};

use crate::ast::{
    BaseLine, BaseProgram, Element, Expr, MacroDefinition, Program, Span, Statement, StatementLine,
};
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::estimate::LengthEstimator;
use crate::optimize::{ExpressionInversionOptimizer, StaticExpressionOptimizer, VariableNameOptimizer};
use crate::printer::Printer;
use crate::source::{FileProvider, SourceParser};
use crate::visit::{Phase, Visit, Visitor, walk_statements};

pub use merge::LinePacker;

/// Name claimed for the hidden line counter before any user variable is named
pub const RESERVED_TIME_VARIABLE: &str = "_time";

/// Converts nolol programs into yolol programs
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: CompilerConfig,
    names: VariableNameOptimizer,
}

impl Converter {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            names: VariableNameOptimizer::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// short variable name -> original name, for everything renamed so far
    pub fn variable_translations(&self) -> HashMap<String, String> {
        self.names.reversal_table()
    }

    /// Load `main` through `files`, parse it and convert it
    pub fn convert_file(
        &mut self,
        main: &str,
        files: &dyn FileProvider,
        parser: &dyn SourceParser,
    ) -> Result<BaseProgram> {
        let source = files.resolve(main)?;
        let program = parser.parse(main, &source)?;
        self.convert(program, files, parser)
    }

    /// Convert a parsed program. `files` and `parser` serve include directives.
    pub fn convert(
        &mut self,
        mut program: Program,
        files: &dyn FileProvider,
        parser: &dyn SourceParser,
    ) -> Result<BaseProgram> {
        let span = info_span!("compile", elements = program.elements.len());
        let _enter = span.enter();

        let mut ctx = Context::new(&self.config, files, parser, &mut self.names);

        lower::lower_program(&mut program, &mut ctx)?;
        let mut lines = into_lines(program)?;
        debug!(lines = lines.len(), "lowered");

        labels::remove_empty_lines(&mut lines);
        labels::append_terminal_jump(&mut lines, &mut ctx);
        labels::collapse_jump_chains(&mut lines)?;
        labels::remove_unused_labels(&mut lines);
        labels::remove_empty_lines(&mut lines);

        let budget = ctx.line_budget();
        let mut lines = LinePacker::new(&ctx.estimator, budget).pack(lines)?;
        debug!(lines = lines.len(), budget, "merged");

        labels::remove_redundant_jumps(&mut lines);
        let table = labels::build_label_table(&lines)?;
        labels::substitute_jump_targets(&mut lines, &table)?;
        labels::substitute_line_numbers(&mut lines)?;

        for line in &mut lines {
            refold_line(&ctx.folder, &ctx.estimator, line)?;
        }

        if ctx.time_tracking {
            timing::insert_line_counter(&mut lines, &ctx.time_variable);
        }
        ensure_lowered(&mut lines)?;

        let mut out = BaseProgram {
            lines: lines
                .into_iter()
                .map(|line| BaseLine {
                    statements: line.statements,
                    span: line.span,
                })
                .collect(),
        };

        if ctx.terminal_jump {
            labels::remove_terminal_jump_if_implied(&mut out, self.config.max_lines);
        }

        validate(&out, &self.config)?;
        debug!(lines = out.lines.len(), "converted");
        Ok(out)
    }

    /// Convert and print in one go
    pub fn convert_to_string(
        &mut self,
        program: Program,
        files: &dyn FileProvider,
        parser: &dyn SourceParser,
    ) -> Result<String> {
        let mode = self.config.print_mode();
        let out = self.convert(program, files, parser)?;
        Printer::new(mode).print_program(&out)
    }
}

/// State of a single compilation, threaded through every pass
pub(crate) struct Context<'a> {
    pub config: &'a CompilerConfig,
    pub files: &'a dyn FileProvider,
    pub parser: &'a dyn SourceParser,
    pub names: &'a mut VariableNameOptimizer,
    pub folder: StaticExpressionOptimizer,
    pub inverter: ExpressionInversionOptimizer,
    pub estimator: LengthEstimator,

    /// lowercase name -> value
    pub definitions: HashMap<String, Expr>,
    /// lowercase name -> definition
    pub macros: HashMap<String, MacroDefinition>,
    /// `name:line` of every macro currently being expanded, innermost last
    pub macro_stack: Vec<String>,
    pub macro_insertions: usize,
    pub includes: usize,

    pub if_counter: usize,
    pub wait_counter: usize,
    pub loop_counter: usize,
    /// ids of the enclosing loops, innermost last
    pub loop_stack: Vec<usize>,
    /// set while a constant's value is being lowered at its use site
    pub expanding_definition: bool,
    /// span of the statement line being lowered
    pub current_span: Span,

    /// a `line()` reference was lowered
    pub time_tracking: bool,
    pub time_variable: String,
    /// a jump back to the first line was appended
    pub terminal_jump: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        config: &'a CompilerConfig,
        files: &'a dyn FileProvider,
        parser: &'a dyn SourceParser,
        names: &'a mut VariableNameOptimizer,
    ) -> Self {
        let time_variable = if config.shorten_names {
            names.optimize_name(RESERVED_TIME_VARIABLE)
        } else {
            RESERVED_TIME_VARIABLE.to_string()
        };
        Self {
            config,
            files,
            parser,
            names,
            folder: StaticExpressionOptimizer::new(),
            inverter: ExpressionInversionOptimizer::new(),
            estimator: LengthEstimator::new(config.print_mode(), config.max_lines),
            definitions: HashMap::new(),
            macros: HashMap::new(),
            macro_stack: Vec::new(),
            macro_insertions: 0,
            includes: 0,
            if_counter: 0,
            wait_counter: 0,
            loop_counter: 0,
            loop_stack: Vec::new(),
            expanding_definition: false,
            current_span: Span::default(),
            time_tracking: false,
            time_variable,
            terminal_jump: false,
        }
    }

    /// Characters available per line
    pub fn line_budget(&self) -> usize {
        self.line_budget_with(self.time_tracking)
    }

    /// Characters available per line, had time tracking the given state
    pub fn line_budget_with(&self, time_tracking: bool) -> usize {
        self.config
            .line_budget(time_tracking.then_some(self.time_variable.as_str()))
    }
}

/// After lowering, only statement lines may remain
fn into_lines(program: Program) -> Result<Vec<StatementLine>> {
    program
        .elements
        .into_iter()
        .map(|element| match element {
            Element::Line(line) => Ok(line),
            other => Err(CompileError::internal(format!(
                "unconverted {} at {} survived lowering",
                other.kind(),
                other.span()
            ))),
        })
        .collect()
}

/// Re-fold a line whose jumps and line numbers are now literals. The line keeps
/// its unfolded form if folding would print longer (`1/7` becomes `0.142`).
fn refold_line(
    folder: &StaticExpressionOptimizer,
    estimator: &LengthEstimator,
    line: &mut StatementLine,
) -> Result<()> {
    let mut folded = line.statements.clone();
    folder.optimize_statements(&mut folded)?;
    if folded != line.statements
        && estimator.line_length(&folded)? <= estimator.line_length(&line.statements)?
    {
        line.statements = folded;
    }
    Ok(())
}

/// Fails if a nolol-only node is left anywhere in the output
struct LoweredCheck;

impl Visitor for LoweredCheck {
    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre && statement.is_extended() {
            return Err(CompileError::internal(format!(
                "unlowered statement reached emission: {statement:?}"
            )));
        }
        Ok(Visit::Unchanged)
    }

    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre && expr.is_extended() {
            return Err(CompileError::internal(format!(
                "unlowered expression reached emission: {expr:?}"
            )));
        }
        Ok(Visit::Unchanged)
    }
}

fn ensure_lowered(lines: &mut [StatementLine]) -> Result<()> {
    for line in lines {
        walk_statements(&mut line.statements, &mut LoweredCheck)?;
    }
    Ok(())
}

fn validate(program: &BaseProgram, config: &CompilerConfig) -> Result<()> {
    if program.lines.len() > config.max_lines {
        let first_excess = &program.lines[config.max_lines];
        let last = program.lines.last().map(|l| l.span).unwrap_or_default();
        return Err(CompileError::structural(
            format!(
                "Program is too large to be compiled into {} lines of yolol ({} lines needed)",
                config.max_lines,
                program.lines.len()
            ),
            Span::new(first_excess.span.start, last.end.max(first_excess.span.end)),
        ));
    }

    let mut printer = Printer::new(config.print_mode());
    for (i, line) in program.lines.iter().enumerate() {
        let length = printer.print_line(&line.statements)?.chars().count();
        if length > config.max_line_length {
            return Err(CompileError::structural(
                format!(
                    "line {} is {length} characters long, at most {} allowed",
                    i + 1,
                    config.max_line_length
                ),
                line.span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Dereference, IncDec};
    use crate::printer::PrintMode;

    fn refold(statements: Vec<Statement>) -> Vec<Statement> {
        let estimator = LengthEstimator::new(PrintMode::Spaceless, 20);
        let mut line = StatementLine::new(statements);
        refold_line(&StaticExpressionOptimizer::new(), &estimator, &mut line).unwrap();
        line.statements
    }

    #[test]
    fn test_refold_applies_when_not_longer() {
        let sum = Statement::assign(":y", Expr::binary(BinOp::Add, Expr::num(2), Expr::num(3)));
        assert_eq!(refold(vec![sum]), vec![Statement::assign(":y", Expr::num(5))]);

        let taken = Statement::if_then(
            Expr::binary(BinOp::Eq, Expr::num(1), Expr::num(1)),
            vec![Statement::assign("a", Expr::num(1))],
        );
        assert_eq!(refold(vec![taken]), vec![Statement::assign("a", Expr::num(1))]);
    }

    #[test]
    fn test_refold_keeps_shorter_unfolded_form() {
        let seventh = Statement::assign(":y", Expr::binary(BinOp::Div, Expr::num(1), Expr::num(7)));
        assert_eq!(refold(vec![seventh.clone()]), vec![seventh]);
    }

    #[test]
    fn test_unlowered_nodes_are_internal_errors() {
        let mut jump = vec![StatementLine::new(vec![Statement::goto_label("x")])];
        assert!(matches!(ensure_lowered(&mut jump), Err(CompileError::Internal { .. })));

        let mut line_ref = vec![StatementLine::new(vec![Statement::if_then(
            Expr::var("a"),
            vec![Statement::assign("b", Expr::CurrentLine)],
        )])];
        assert!(matches!(ensure_lowered(&mut line_ref), Err(CompileError::Internal { .. })));

        let mut plain = vec![StatementLine::new(vec![
            Statement::Step(Dereference::with_operator("a", IncDec::Increment, false)),
            Statement::Goto(Expr::num(1)),
        ])];
        assert!(ensure_lowered(&mut plain).is_ok());
    }

    #[test]
    fn test_validate_rejects_overlong_line() {
        let program = BaseProgram {
            lines: vec![
                BaseLine {
                    statements: vec![Statement::assign("a", Expr::num(1))],
                    span: Span::line(1),
                },
                BaseLine {
                    statements: vec![Statement::assign("b", Expr::string("x".repeat(70)))],
                    span: Span::line(4),
                },
            ],
        };
        let err = validate(&program, &CompilerConfig::default()).unwrap_err();
        assert!(err.is_structural());
        assert!(err.message().contains("line 2"));
        assert_eq!(err.span(), Some(Span::line(4)));
    }
}
