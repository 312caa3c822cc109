//! Statement AST nodes

use super::{Dereference, Expr, Span};
use serde::{Deserialize, Serialize};

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl std::fmt::Display for AssignOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignOp::Assign => write!(f, "="),
            AssignOp::AddAssign => write!(f, "+="),
            AssignOp::SubAssign => write!(f, "-="),
            AssignOp::MulAssign => write!(f, "*="),
            AssignOp::DivAssign => write!(f, "/="),
            AssignOp::ModAssign => write!(f, "%="),
        }
    }
}

/// A single flat statement. Everything except `GotoLabel`, `Break` and
/// `Continue` exists in yolol as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `variable op value`
    Assign {
        variable: String,
        op: AssignOp,
        value: Expr,
    },

    /// Bare increment/decrement, e.g. `a++`
    Step(Dereference),

    /// Single-line if: `if cond then ... else ... end`
    If {
        condition: Expr,
        then_block: Vec<Statement>,
        #[serde(default)]
        else_block: Option<Vec<Statement>>,
    },

    /// Jump to a computed line number
    Goto(Expr),

    /// Jump to a named line (nolol only)
    GotoLabel {
        label: String,
        #[serde(default)]
        span: Span,
    },

    /// Leave the innermost loop (nolol only)
    Break {
        #[serde(default)]
        span: Span,
    },

    /// Restart the innermost loop (nolol only)
    Continue {
        #[serde(default)]
        span: Span,
    },
}

impl Statement {
    pub fn assign(variable: impl Into<String>, value: Expr) -> Self {
        Statement::Assign {
            variable: variable.into(),
            op: AssignOp::Assign,
            value,
        }
    }

    pub fn goto_label(label: impl Into<String>) -> Self {
        Statement::GotoLabel {
            label: label.into(),
            span: Span::default(),
        }
    }

    pub fn if_then(condition: Expr, then_block: Vec<Statement>) -> Self {
        Statement::If {
            condition,
            then_block,
            else_block: None,
        }
    }

    /// True for nodes that only exist in nolol and must be lowered before emission
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Statement::GotoLabel { .. } | Statement::Break { .. } | Statement::Continue { .. }
        )
    }

    /// Target of an unconditional jump to a named line
    pub fn jump_label(&self) -> Option<&str> {
        match self {
            Statement::GotoLabel { label, .. } => Some(label),
            _ => None,
        }
    }
}
