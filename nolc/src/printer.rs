//! Yolol printer
//!
//! Renders flat statements to yolol text in one of two modes:
//! `Spaceless` emits a space only where two tokens would otherwise fuse,
//! `Compact` puts single spaces between tokens for readability.
//! Statements on one line are always separated by one space.

use serde::{Deserialize, Serialize};

use crate::ast::{BaseProgram, Dereference, Expr, Statement, UnOp};
use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    #[default]
    Spaceless,
    Compact,
}

/// Hook for rendering nodes the plain printer does not know (nolol-only nodes).
/// Returning `true` means the node has been written.
pub trait PrinterExtension {
    fn print_statement(&self, _statement: &Statement, _printer: &mut Printer<'_>) -> bool {
        false
    }

    fn print_expr(&self, _expr: &Expr, _printer: &mut Printer<'_>) -> bool {
        false
    }
}

/// Precedence of atoms (literals, variables, parenthesized expressions)
const ATOM_PRECEDENCE: u8 = 10;
const STEP_PRECEDENCE: u8 = 9;
const NEG_PRECEDENCE: u8 = 8;

pub struct Printer<'a> {
    mode: PrintMode,
    extension: Option<&'a dyn PrinterExtension>,
    out: String,
    glue_next: bool,
}

impl<'a> Printer<'a> {
    pub fn new(mode: PrintMode) -> Self {
        Self {
            mode,
            extension: None,
            out: String::new(),
            glue_next: false,
        }
    }

    pub fn with_extension(mut self, extension: &'a dyn PrinterExtension) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Render a whole program, one line per physical line
    pub fn print_program(&mut self, program: &BaseProgram) -> Result<String> {
        let mut text = String::new();
        for line in &program.lines {
            text.push_str(&self.print_line(&line.statements)?);
            text.push('\n');
        }
        Ok(text)
    }

    /// Render the statements of one line
    pub fn print_line(&mut self, statements: &[Statement]) -> Result<String> {
        self.out.clear();
        self.glue_next = false;
        for stmt in statements {
            self.separator();
            self.statement(stmt)?;
        }
        Ok(std::mem::take(&mut self.out))
    }

    /// Write a token, separated from the previous one as the mode demands
    pub fn word(&mut self, text: &str) {
        self.push(text, true);
    }

    /// Write a token directly after the previous one, unless they would fuse
    pub fn glued(&mut self, text: &str) {
        self.push(text, false);
    }

    fn push(&mut self, text: &str, spaced: bool) {
        if let (Some(prev), Some(next)) = (self.out.chars().last(), text.chars().next()) {
            let required = fuses(prev, next);
            let wanted = self.mode == PrintMode::Compact && spaced && !self.glue_next && prev != ' ';
            if required || wanted {
                self.out.push(' ');
            }
        }
        self.out.push_str(text);
        self.glue_next = false;
    }

    fn separator(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
    }

    fn open_paren(&mut self) {
        self.word("(");
        self.glue_next = true;
    }

    fn close_paren(&mut self) {
        self.glued(")");
    }

    fn statement(&mut self, stmt: &Statement) -> Result<()> {
        if let Some(ext) = self.extension
            && ext.print_statement(stmt, self)
        {
            return Ok(());
        }

        match stmt {
            Statement::Assign { variable, op, value } => {
                self.word(variable);
                self.word(&op.to_string());
                self.expr(value, 0)
            }
            Statement::Step(deref) => {
                self.dereference(deref);
                Ok(())
            }
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                self.word("if");
                self.expr(condition, 0)?;
                self.word("then");
                for s in then_block {
                    self.separator();
                    self.statement(s)?;
                }
                if let Some(block) = else_block {
                    self.word("else");
                    for s in block {
                        self.separator();
                        self.statement(s)?;
                    }
                }
                self.word("end");
                Ok(())
            }
            Statement::Goto(target) => {
                self.word("goto");
                self.expr(target, 0)
            }
            Statement::GotoLabel { label, .. } => Err(CompileError::internal(format!(
                "unresolved jump to label '{label}' reached the printer"
            ))),
            Statement::Break { .. } | Statement::Continue { .. } => Err(CompileError::internal(
                "break/continue reached the printer",
            )),
        }
    }

    fn dereference(&mut self, deref: &Dereference) {
        match (deref.operator, deref.prefix) {
            (None, _) => self.word(&deref.variable),
            (Some(op), true) => {
                self.word(&op.to_string());
                self.glued(&deref.variable);
            }
            (Some(op), false) => {
                self.word(&deref.variable);
                self.glued(&op.to_string());
            }
        }
    }

    fn expr(&mut self, expr: &Expr, min_prec: u8) -> Result<()> {
        if precedence(expr) < min_prec {
            self.open_paren();
            self.expr(expr, 0)?;
            self.close_paren();
            return Ok(());
        }

        if let Some(ext) = self.extension
            && ext.print_expr(expr, self)
        {
            return Ok(());
        }

        match expr {
            Expr::Number(n) => self.word(&n.to_string()),
            Expr::String(s) => self.word(&format!("\"{s}\"")),
            Expr::Var(deref) => self.dereference(deref),
            Expr::Unary { op: UnOp::Neg, operand } => {
                self.word("-");
                self.glue_next = true;
                self.expr(operand, NEG_PRECEDENCE)?;
            }
            Expr::Unary { op, operand } => {
                self.word(&op.to_string());
                self.expr(operand, op.precedence())?;
            }
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                let (left_min, right_min) = if op.is_right_assoc() {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                self.expr(left, left_min)?;
                self.word(&op.to_string());
                self.expr(right, right_min)?;
            }
            Expr::Call { function, .. } => {
                return Err(CompileError::internal(format!(
                    "unlowered call to '{function}' reached the printer"
                )));
            }
            Expr::CurrentLine => {
                return Err(CompileError::internal(
                    "unresolved line-number reference reached the printer",
                ));
            }
        }
        Ok(())
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { op: UnOp::Neg, .. } => NEG_PRECEDENCE,
        Expr::Unary { op, .. } => op.precedence(),
        Expr::Number(n) if n.is_negative() => NEG_PRECEDENCE,
        Expr::Var(Dereference {
            operator: Some(_), ..
        }) => STEP_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '.'
}

/// Would writing `next` directly after `prev` change how the text lexes?
fn fuses(prev: char, next: char) -> bool {
    (is_word_char(prev) && is_word_char(next)) || (matches!(prev, '+' | '-') && prev == next)
}

/// Render a finished program
pub fn print_program(program: &BaseProgram, mode: PrintMode) -> Result<String> {
    Printer::new(mode).print_program(program)
}
