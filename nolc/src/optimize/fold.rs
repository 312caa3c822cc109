//! Constant folding

use crate::ast::{BinOp, Expr, Node, Number, Program, Statement, UnOp};
use crate::error::Result;
use crate::visit::{Phase, Visit, Visitor, walk_program, walk_statements};

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticExpressionOptimizer;

impl StaticExpressionOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Fold `expr` if all of its direct operands are literals.
    /// Operands are not folded first; callers walking bottom-up get full folding.
    pub fn fold_non_recursive(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Binary { op, left, right } => fold_binary(*op, left, right),
            Expr::Unary { op, operand } => fold_unary(*op, operand),
            _ => None,
        }
    }

    /// Fold every expression of the program and drop `if`s whose condition is a literal
    pub fn optimize(&self, program: &mut Program) -> Result<()> {
        let mut pass = FoldPass { optimizer: *self };
        walk_program(program, &mut pass)
    }

    /// Same as [`optimize`](Self::optimize) for the statements of a single line
    pub fn optimize_statements(&self, statements: &mut Vec<Statement>) -> Result<()> {
        let mut pass = FoldPass { optimizer: *self };
        walk_statements(statements, &mut pass)
    }
}

struct FoldPass {
    optimizer: StaticExpressionOptimizer,
}

impl Visitor for FoldPass {
    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase != Phase::Post {
            return Ok(Visit::Unchanged);
        }
        if let Statement::If {
            condition: Expr::Number(n),
            then_block,
            else_block,
        } = statement
        {
            let taken = if n.is_true() {
                std::mem::take(then_block)
            } else {
                else_block.take().unwrap_or_default()
            };
            return Ok(Visit::Replace(taken.into_iter().map(Node::Statement).collect()));
        }
        Ok(Visit::Unchanged)
    }

    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        if phase == Phase::Post
            && let Some(folded) = self.optimizer.fold_non_recursive(expr)
        {
            return Ok(Visit::replace_with(folded));
        }
        Ok(Visit::Unchanged)
    }
}

fn fold_binary(op: BinOp, left: &Expr, right: &Expr) -> Option<Expr> {
    match (left, right) {
        (Expr::Number(a), Expr::Number(b)) => fold_numbers(op, *a, *b).map(Expr::Number),
        (Expr::String(a), Expr::String(b)) => fold_strings(op, a, b),
        _ => None,
    }
}

fn fold_numbers(op: BinOp, a: Number, b: Number) -> Option<Number> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => a.checked_div(b),
        BinOp::Mod => a.checked_rem(b),
        BinOp::Pow => Number::checked_from_f64(a.as_f64().powf(b.as_f64())),
        BinOp::Eq => Some(Number::from_bool(a == b)),
        BinOp::Ne => Some(Number::from_bool(a != b)),
        BinOp::Lt => Some(Number::from_bool(a < b)),
        BinOp::Gt => Some(Number::from_bool(a > b)),
        BinOp::Le => Some(Number::from_bool(a <= b)),
        BinOp::Ge => Some(Number::from_bool(a >= b)),
        BinOp::And => Some(Number::from_bool(a.is_true() && b.is_true())),
        BinOp::Or => Some(Number::from_bool(a.is_true() || b.is_true())),
    }
}

fn fold_strings(op: BinOp, a: &str, b: &str) -> Option<Expr> {
    match op {
        BinOp::Add => Some(Expr::String(format!("{a}{b}"))),
        // removes the last occurrence of b
        BinOp::Sub => Some(Expr::String(match a.rfind(b) {
            Some(pos) if !b.is_empty() => format!("{}{}", &a[..pos], &a[pos + b.len()..]),
            _ => a.to_string(),
        })),
        BinOp::Eq => Some(Expr::Number(Number::from_bool(a == b))),
        BinOp::Ne => Some(Expr::Number(Number::from_bool(a != b))),
        _ => None,
    }
}

fn fold_unary(op: UnOp, operand: &Expr) -> Option<Expr> {
    let n = operand.as_number()?;
    let folded = match op {
        UnOp::Neg => n.checked_neg()?,
        UnOp::Not => Number::from_bool(!n.is_true()),
        UnOp::Abs => {
            if n.is_negative() {
                n.checked_neg()?
            } else {
                n
            }
        }
        UnOp::Sqrt if !n.is_negative() => Number::checked_from_f64(n.as_f64().sqrt())?,
        _ => return None,
    };
    Some(Expr::Number(folded))
}
