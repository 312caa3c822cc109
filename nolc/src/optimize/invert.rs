//! Condition inversion

use crate::ast::{BinOp, Expr, Number, UnOp};

/// Produces the logical negation of a condition without piling up `not`s
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionInversionOptimizer;

impl ExpressionInversionOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Truthiness of the result is the opposite of the truthiness of `expr`
    pub fn invert(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Number(n) => Expr::Number(Number::from_bool(!n.is_true())),
            Expr::Unary {
                op: UnOp::Not,
                operand,
            } => *operand,
            Expr::Binary { op, left, right } => match op {
                BinOp::And => Expr::binary(BinOp::Or, self.invert(*left), self.invert(*right)),
                BinOp::Or => Expr::binary(BinOp::And, self.invert(*left), self.invert(*right)),
                _ => match op.inverted_comparison() {
                    Some(inverted) => Expr::Binary {
                        op: inverted,
                        left,
                        right,
                    },
                    None => Expr::unary(UnOp::Not, Expr::Binary { op, left, right }),
                },
            },
            other => Expr::unary(UnOp::Not, other),
        }
    }
}
