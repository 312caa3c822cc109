//! Structural lowering
//!
//! One traversal that rewrites every nolol-only construct into statement lines
//! and label jumps. Constructs whose content must be lowered first (if, while,
//! wait) are converted on post-visit; constructs that produce content which
//! still has to be lowered (macro insertions, includes) are expanded on
//! pre-visit and inlined.

use std::collections::HashMap;

use tracing::trace;

use super::{Context, macros};
use crate::ast::{
    Definition, Dereference, Element, Expr, Include, MacroDefinition, MacroInsertion, MultilineIf,
    Node, Program, Span, Statement, StatementLine, UnOp, Wait, WhileLoop,
};
use crate::error::{CompileError, Result};
use crate::visit::{Phase, Visit, Visitor, walk_expr, walk_program};

pub(crate) fn loop_head_label(id: usize) -> String {
    format!("while#{id}")
}

pub(crate) fn loop_end_label(id: usize) -> String {
    format!("endwhile#{id}")
}

/// Lower every nolol construct of `program` into statement lines
pub(crate) fn lower_program(program: &mut Program, ctx: &mut Context<'_>) -> Result<()> {
    walk_program(program, ctx)?;

    if let Some(frame) = ctx.macro_stack.last() {
        return Err(CompileError::internal(format!(
            "expansion of macro {frame} was never closed"
        )));
    }
    if !ctx.loop_stack.is_empty() {
        return Err(CompileError::internal("loop stack not empty after lowering"));
    }
    Ok(())
}

impl Visitor for Context<'_> {
    fn visit_element(&mut self, element: &mut Element, phase: Phase) -> Result<Visit> {
        match (element, phase) {
            (Element::Line(line), Phase::Pre) => {
                if let Some(label) = &mut line.label {
                    *label = label.to_lowercase();
                }
                self.current_span = line.span;
                Ok(Visit::Unchanged)
            }
            // definitions and macros must be recorded before anything after them is visited
            (Element::Definition(def), Phase::Pre) => self.convert_definition(def),
            (Element::MacroDefinition(def), Phase::Pre) => self.convert_macro_definition(def),
            (Element::MacroInsertion(ins), Phase::Pre) => self.convert_macro_insertion(ins),
            (Element::MacroExit, Phase::Pre) => {
                if self.macro_stack.pop().is_none() {
                    return Err(CompileError::internal("macro exit without matching insertion"));
                }
                Ok(Visit::remove())
            }
            (Element::Include(inc), Phase::Pre) => self.convert_include(inc),
            (Element::Wait(wait), Phase::Post) => self.convert_wait(wait),
            (Element::If(mif), Phase::Post) => self.convert_if(mif),
            (Element::While(_), Phase::Pre) => {
                self.loop_counter += 1;
                self.loop_stack.push(self.loop_counter);
                Ok(Visit::Unchanged)
            }
            (Element::While(wl), Phase::Post) => {
                let result = self.convert_while(wl);
                self.loop_stack.pop();
                result
            }
            _ => Ok(Visit::Unchanged),
        }
    }

    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase != Phase::Pre {
            return Ok(Visit::Unchanged);
        }
        match statement {
            Statement::Assign { variable, .. } => {
                self.resolve_target(variable)?;
                Ok(Visit::Unchanged)
            }
            Statement::Step(deref) => {
                self.resolve_target(&mut deref.variable)?;
                Ok(Visit::Unchanged)
            }
            Statement::GotoLabel { label, .. } => {
                *label = label.to_lowercase();
                Ok(Visit::Unchanged)
            }
            Statement::Break { span } => {
                let id = self.innermost_loop("break", *span)?;
                Ok(Visit::replace_with(Statement::goto_label(loop_end_label(id))))
            }
            Statement::Continue { span } => {
                let id = self.innermost_loop("continue", *span)?;
                Ok(Visit::replace_with(Statement::goto_label(loop_head_label(id))))
            }
            Statement::If { .. } | Statement::Goto(_) => Ok(Visit::Unchanged),
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        match (expr, phase) {
            (Expr::Var(deref), Phase::Pre) => self.convert_dereference(deref),
            (Expr::Call { function, args, span }, Phase::Pre) => {
                self.convert_call(function, std::mem::take(args), *span)
            }
            (expr, Phase::Post) if matches!(expr, Expr::Binary { .. }) => {
                // children are already folded, so a single-node fold is enough
                match self.folder.fold_non_recursive(expr) {
                    Some(folded) => Ok(Visit::replace_with(folded)),
                    None => Ok(Visit::Unchanged),
                }
            }
            _ => Ok(Visit::Unchanged),
        }
    }
}

impl Context<'_> {
    fn span_or_current(&self, span: Span) -> Span {
        if span == Span::default() {
            self.current_span
        } else {
            span
        }
    }

    fn innermost_loop(&self, what: &str, span: Span) -> Result<usize> {
        self.loop_stack.last().copied().ok_or_else(|| {
            CompileError::structural(
                format!("{what} can only be used inside a loop"),
                self.span_or_current(span),
            )
        })
    }

    fn rename(&mut self, variable: &mut String) {
        if self.config.shorten_names {
            *variable = self.names.optimize_name(variable);
        }
    }

    /// Assignment targets may name a constant that stands for a variable
    fn resolve_target(&mut self, variable: &mut String) -> Result<()> {
        if let Some(value) = self.definitions.get(&variable.to_lowercase()) {
            match value {
                Expr::Var(Dereference {
                    variable: target,
                    operator: None,
                    ..
                }) => *variable = target.clone(),
                _ => {
                    return Err(CompileError::structural(
                        format!("cannot assign to constant '{variable}'"),
                        self.current_span,
                    ));
                }
            }
        }
        self.rename(variable);
        Ok(())
    }

    fn convert_definition(&mut self, def: &mut Definition) -> Result<Visit> {
        let mut value = def.value.clone();
        substitute_definitions(&mut value, &self.definitions)?;
        trace!(name = %def.name, "recorded definition");
        self.definitions.insert(def.name.to_lowercase(), value);
        Ok(Visit::remove())
    }

    fn convert_dereference(&mut self, deref: &mut Dereference) -> Result<Visit> {
        if !self.expanding_definition
            && let Some(value) = self.definitions.get(&deref.variable.to_lowercase()).cloned()
        {
            if deref.operator.is_none() {
                // lower the constant's value where it is used
                let mut value = value;
                self.expanding_definition = true;
                let lowered = walk_expr(&mut value, self);
                self.expanding_definition = false;
                lowered?;
                return Ok(Visit::replace_with(value));
            }
            match value {
                Expr::Var(Dereference {
                    variable,
                    operator: None,
                    ..
                }) => deref.variable = variable,
                _ => {
                    return Err(CompileError::structural(
                        format!("cannot increment or decrement constant '{}'", deref.variable),
                        self.current_span,
                    ));
                }
            }
        }
        self.rename(&mut deref.variable);
        Ok(Visit::Unchanged)
    }

    fn convert_call(&mut self, function: &str, mut args: Vec<Expr>, span: Span) -> Result<Visit> {
        let span = self.span_or_current(span);
        let name = function.to_lowercase();

        if name == "line" {
            if !args.is_empty() {
                return Err(CompileError::structural("line() takes no arguments", span));
            }
            self.time_tracking = true;
            return Ok(Visit::replace_with(Expr::CurrentLine));
        }

        if let Some(op) = UnOp::from_builtin(&name) {
            if args.len() != 1 {
                return Err(CompileError::structural(
                    format!("{name}() takes exactly one argument, got {}", args.len()),
                    span,
                ));
            }
            let arg = args.remove(0);
            // the argument has not been visited yet
            return Ok(Visit::Inline(vec![Node::Expr(Expr::unary(op, arg))]));
        }

        Err(CompileError::structural(format!("unknown function '{function}'"), span))
    }

    fn convert_macro_definition(&mut self, def: &mut MacroDefinition) -> Result<Visit> {
        let key = def.name.to_lowercase();
        if self.macros.contains_key(&key) {
            return Err(CompileError::structural(
                format!("macro '{}' is already defined", def.name),
                def.span,
            ));
        }
        trace!(name = %def.name, params = def.params.len(), "recorded macro");
        self.macros.insert(key, def.clone());
        Ok(Visit::remove())
    }

    fn convert_macro_insertion(&mut self, ins: &mut MacroInsertion) -> Result<Visit> {
        let key = ins.name.to_lowercase();
        let def = self.macros.get(&key).cloned().ok_or_else(|| {
            CompileError::structural(format!("unknown macro '{}'", ins.name), ins.span)
        })?;

        if self.macro_insertions >= self.config.max_macro_insertions {
            return Err(CompileError::structural(
                format!(
                    "more than {} macro insertions, is '{}' recursive?",
                    self.config.max_macro_insertions, ins.name
                ),
                ins.span,
            ));
        }
        self.macro_insertions += 1;

        let mut body = macros::expand(&def, ins, self.macro_insertions)?;
        let frame = format!("{key}:{}", ins.span.start.line);
        trace!(frame = %frame, depth = self.macro_stack.len() + 1, "expanding macro");
        self.macro_stack.push(frame);
        body.push(Element::MacroExit);

        Ok(Visit::Inline(body.into_iter().map(Node::Element).collect()))
    }

    fn convert_include(&mut self, inc: &mut Include) -> Result<Visit> {
        self.includes += 1;
        if self.includes > self.config.max_includes {
            return Err(CompileError::structural(
                format!(
                    "more than {} includes, do files include each other?",
                    self.config.max_includes
                ),
                inc.span,
            ));
        }
        trace!(file = %inc.file, "including file");
        let source = self.files.resolve(&inc.file)?;
        let included = self.parser.parse(&inc.file, &source)?;
        Ok(Visit::Inline(
            included.elements.into_iter().map(Node::Element).collect(),
        ))
    }

    fn convert_wait(&mut self, wait: &mut Wait) -> Result<Visit> {
        self.wait_counter += 1;
        let start = format!("wait#{}", self.wait_counter);
        let end = format!("endwait#{}", self.wait_counter);
        let condition = std::mem::replace(&mut wait.condition, Expr::num(0));

        let lines = vec![
            StatementLine::labeled(start.clone(), vec![]),
            StatementLine::new(vec![Statement::if_then(
                condition,
                vec![Statement::goto_label(end.clone())],
            )]),
            StatementLine::new(vec![Statement::goto_label(start)]),
            StatementLine::labeled(end, vec![]),
        ];
        Ok(replace_with_lines(lines, wait.span))
    }

    fn convert_if(&mut self, mif: &mut MultilineIf) -> Result<Visit> {
        if mif.conditions.len() != mif.blocks.len() || mif.conditions.is_empty() {
            return Err(CompileError::structural(
                format!(
                    "if has {} conditions but {} blocks",
                    mif.conditions.len(),
                    mif.blocks.len()
                ),
                mif.span,
            ));
        }

        if let Some(line) = self.try_inline_if(mif)? {
            return Ok(Visit::replace_with(line));
        }

        self.if_counter += 1;
        let id = self.if_counter;
        let end_label = format!("endif#{id}");
        let has_else = mif.else_block.is_some();
        let branches = mif.conditions.len();

        let conditions = std::mem::take(&mut mif.conditions);
        let blocks = std::mem::take(&mut mif.blocks);
        let mut lines = Vec::new();

        for (i, (condition, block)) in conditions.into_iter().zip(blocks).enumerate() {
            let last = i + 1 == branches;
            let skip_label = if last && !has_else {
                end_label.clone()
            } else {
                format!("if#{id}_{}", i + 1)
            };

            lines.push(
                StatementLine::new(vec![Statement::if_then(
                    self.inverter.invert(condition),
                    vec![Statement::goto_label(skip_label.clone())],
                )])
                .with_span(mif.span),
            );
            lines.extend(block_lines(block)?);

            if !(last && !has_else) {
                lines.push(StatementLine::new(vec![Statement::goto_label(end_label.clone())]));
                lines.push(StatementLine::labeled(skip_label, vec![]));
            }
        }

        if let Some(block) = mif.else_block.take() {
            lines.extend(block_lines(block)?);
        }
        lines.push(StatementLine::labeled(end_label, vec![]));

        Ok(replace_with_lines(lines, mif.span))
    }

    /// `if c then x else y end` on one line, when every block is a single plain line
    fn try_inline_if(&self, mif: &MultilineIf) -> Result<Option<StatementLine>> {
        if mif.conditions.len() != 1 {
            return Ok(None);
        }
        let Some(then_block) = simple_block(&mif.blocks[0]) else {
            return Ok(None);
        };
        let else_block = match &mif.else_block {
            None => None,
            Some(block) => match simple_block(block) {
                Some(stmts) => Some(stmts),
                None => return Ok(None),
            },
        };

        let stmt = Statement::If {
            condition: mif.conditions[0].clone(),
            then_block,
            else_block,
        };
        // a line() elsewhere may still shrink the budget, so assume it will
        let budget = self.line_budget_with(true);
        if self.estimator.line_length(std::slice::from_ref(&stmt))? > budget {
            return Ok(None);
        }
        Ok(Some(StatementLine::new(vec![stmt]).with_span(mif.span)))
    }

    fn convert_while(&mut self, wl: &mut WhileLoop) -> Result<Visit> {
        let id = *self
            .loop_stack
            .last()
            .ok_or_else(|| CompileError::internal("while loop without loop frame"))?;
        let head = loop_head_label(id);
        let end = loop_end_label(id);

        let condition = std::mem::replace(&mut wl.condition, Expr::num(0));
        let guard = match condition {
            Expr::Number(n) if n.is_true() => vec![],
            condition => vec![Statement::if_then(
                self.inverter.invert(condition),
                vec![Statement::goto_label(end.clone())],
            )],
        };

        let mut lines = vec![StatementLine::labeled(head.clone(), guard)];
        lines.extend(block_lines(std::mem::take(&mut wl.body))?);
        lines.push(StatementLine::new(vec![Statement::goto_label(head)]));
        lines.push(StatementLine::labeled(end, vec![]));

        Ok(replace_with_lines(lines, wl.span))
    }
}

/// Generated lines inherit the span of the construct they replace
fn replace_with_lines(lines: Vec<StatementLine>, span: Span) -> Visit {
    Visit::Replace(
        lines
            .into_iter()
            .map(|mut line| {
                if line.span == Span::default() {
                    line.span = span;
                }
                Node::Element(Element::Line(line))
            })
            .collect(),
    )
}

/// Blocks are lowered before their parent, so only lines can be left
fn block_lines(block: Vec<Element>) -> Result<Vec<StatementLine>> {
    block
        .into_iter()
        .map(|element| match element {
            Element::Line(line) => Ok(line),
            other => Err(CompileError::internal(format!(
                "unconverted {} inside a block",
                other.kind()
            ))),
        })
        .collect()
}

fn simple_block(block: &[Element]) -> Option<Vec<Statement>> {
    match block {
        [] => Some(Vec::new()),
        [Element::Line(line)] if line.label.is_none() && !line.has_bol && !line.has_eol => {
            Some(line.statements.clone())
        }
        _ => None,
    }
}

/// Replaces references to already known constants inside a constant's value
struct DefinitionSubstitution<'d> {
    definitions: &'d HashMap<String, Expr>,
}

impl Visitor for DefinitionSubstitution<'_> {
    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre
            && let Expr::Var(deref) = expr
            && deref.operator.is_none()
            && let Some(value) = self.definitions.get(&deref.variable.to_lowercase())
        {
            return Ok(Visit::replace_with(value.clone()));
        }
        Ok(Visit::Unchanged)
    }
}

fn substitute_definitions(expr: &mut Expr, definitions: &HashMap<String, Expr>) -> Result<()> {
    walk_expr(expr, &mut DefinitionSubstitution { definitions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{IncDec, MacroInsertion};
    use crate::config::CompilerConfig;
    use crate::optimize::VariableNameOptimizer;
    use crate::source::{JsonTreeParser, MemoryFileProvider};

    fn with_context<T>(f: impl FnOnce(&mut Context<'_>) -> T) -> T {
        let config = CompilerConfig::new().shorten_names(false);
        let files = MemoryFileProvider::new();
        let mut names = VariableNameOptimizer::new();
        let mut ctx = Context::new(&config, &files, &JsonTreeParser, &mut names);
        f(&mut ctx)
    }

    fn lower(ctx: &mut Context<'_>, elements: Vec<Element>) -> Result<Vec<StatementLine>> {
        let mut program = Program::new(elements);
        lower_program(&mut program, ctx)?;
        Ok(program
            .elements
            .into_iter()
            .map(|e| match e {
                Element::Line(line) => line,
                other => panic!("{} survived lowering", other.kind()),
            })
            .collect())
    }

    fn line(statements: Vec<Statement>) -> Element {
        StatementLine::new(statements).into()
    }

    #[test]
    fn test_wait_becomes_busy_spin() {
        let lines = with_context(|ctx| {
            lower(
                ctx,
                vec![Element::Wait(Wait {
                    condition: Expr::var("c"),
                    span: Span::line(1),
                })],
            )
        })
        .unwrap();

        let labels: Vec<_> = lines.iter().map(|l| l.label.as_deref()).collect();
        assert_eq!(labels, vec![Some("wait#1"), None, None, Some("endwait#1")]);
        assert_eq!(
            lines[1].statements,
            vec![Statement::if_then(
                Expr::var("c"),
                vec![Statement::goto_label("endwait#1")]
            )]
        );
        assert_eq!(lines[2].sole_jump(), Some("wait#1"));
        assert!(lines.iter().all(|l| l.span == Span::line(1)));
    }

    #[test]
    fn test_break_and_continue_target_innermost_loop() {
        let inner = Element::While(WhileLoop {
            condition: Expr::var("b"),
            body: vec![line(vec![Statement::Break {
                span: Span::default(),
            }])],
            span: Span::line(2),
        });
        let outer = Element::While(WhileLoop {
            condition: Expr::var("a"),
            body: vec![
                inner,
                line(vec![Statement::Continue {
                    span: Span::default(),
                }]),
            ],
            span: Span::line(1),
        });

        let (lines, loops_left) = with_context(|ctx| {
            let lines = lower(ctx, vec![outer]);
            (lines, ctx.loop_stack.len())
        });
        let lines = lines.unwrap();

        assert_eq!(loops_left, 0);
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[1].label.as_deref(), Some("while#2"));
        assert_eq!(lines[2].sole_jump(), Some("endwhile#2"));
        assert_eq!(lines[5].sole_jump(), Some("while#1"));
        assert_eq!(lines[7].label.as_deref(), Some("endwhile#1"));
    }

    #[test]
    fn test_constant_standing_for_variable_is_assignable() {
        let lines = with_context(|ctx| {
            lower(
                ctx,
                vec![
                    Element::Definition(Definition {
                        name: "speed".into(),
                        value: Expr::var(":spd"),
                        span: Span::line(1),
                    }),
                    line(vec![Statement::assign("Speed", Expr::num(1))]),
                ],
            )
        })
        .unwrap();
        assert_eq!(
            lines[0].statements,
            vec![Statement::assign(":spd", Expr::num(1))]
        );
    }

    #[test]
    fn test_constant_value_cannot_be_incremented() {
        let result = with_context(|ctx| {
            lower(
                ctx,
                vec![
                    Element::Definition(Definition {
                        name: "x".into(),
                        value: Expr::num(5),
                        span: Span::line(1),
                    }),
                    StatementLine::new(vec![Statement::Step(Dereference::with_operator(
                        "x",
                        IncDec::Increment,
                        false,
                    ))])
                    .with_span(Span::line(2))
                    .into(),
                ],
            )
        });
        let err = result.unwrap_err();
        assert!(err.is_structural());
        assert_eq!(err.span(), Some(Span::line(2)));
    }

    #[test]
    fn test_macro_stack_is_empty_after_insertions() {
        let def = MacroDefinition {
            name: "m".into(),
            params: vec![],
            body: vec![line(vec![Statement::assign("a", Expr::num(1))])],
            span: Span::line(1),
        };
        let insertion = |at| {
            Element::MacroInsertion(MacroInsertion {
                name: "m".into(),
                args: vec![],
                span: Span::line(at),
            })
        };

        let (lines, stack, insertions) = with_context(|ctx| {
            let lines = lower(
                ctx,
                vec![Element::MacroDefinition(def), insertion(2), insertion(3)],
            );
            (lines, ctx.macro_stack.clone(), ctx.macro_insertions)
        });

        assert_eq!(lines.unwrap().len(), 2);
        assert!(stack.is_empty());
        assert_eq!(insertions, 2);
    }

    #[test]
    fn test_single_branch_if_without_room_uses_jumps() {
        let long = Expr::string("y".repeat(40));
        let mif = Element::If(MultilineIf {
            conditions: vec![Expr::var("c")],
            blocks: vec![vec![line(vec![
                Statement::assign("a", long.clone()),
                Statement::assign("b", long),
            ])]],
            else_block: None,
            span: Span::line(1),
        });

        let lines = with_context(|ctx| lower(ctx, vec![mif])).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0].statements,
            vec![Statement::if_then(
                Expr::unary(UnOp::Not, Expr::var("c")),
                vec![Statement::goto_label("endif#1")]
            )]
        );
        assert_eq!(lines[2].label.as_deref(), Some("endif#1"));
    }
}
