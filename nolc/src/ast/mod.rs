//! Abstract Syntax Tree definitions
//!
//! The nolol tree (`Program` of `Element`s) is what the converter consumes and
//! rewrites in place. `BaseProgram` is the flat yolol output.

mod expr;
mod span;
mod stmt;

pub use expr::*;
pub use span::*;
pub use stmt::*;

use serde::{Deserialize, Serialize};

/// A nolol program is a sequence of top-level elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub elements: Vec<Element>,
}

impl Program {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }
}

/// Top-level or nested element of a nolol program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Line(StatementLine),
    Definition(Definition),
    MacroDefinition(MacroDefinition),
    MacroInsertion(MacroInsertion),
    /// Synthetic marker placed after an expanded macro body
    MacroExit,
    Include(Include),
    Wait(Wait),
    If(MultilineIf),
    While(WhileLoop),
}

impl Element {
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Line(_) => "statement line",
            Element::Definition(_) => "definition",
            Element::MacroDefinition(_) => "macro definition",
            Element::MacroInsertion(_) => "macro insertion",
            Element::MacroExit => "macro exit marker",
            Element::Include(_) => "include",
            Element::Wait(_) => "wait",
            Element::If(_) => "if",
            Element::While(_) => "while",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Element::Line(l) => l.span,
            Element::Definition(d) => d.span,
            Element::MacroDefinition(m) => m.span,
            Element::MacroInsertion(m) => m.span,
            Element::MacroExit => Span::default(),
            Element::Include(i) => i.span,
            Element::Wait(w) => w.span,
            Element::If(i) => i.span,
            Element::While(w) => w.span,
        }
    }

    pub fn as_line(&self) -> Option<&StatementLine> {
        match self {
            Element::Line(l) => Some(l),
            _ => None,
        }
    }
}

impl From<StatementLine> for Element {
    fn from(line: StatementLine) -> Self {
        Element::Line(line)
    }
}

/// A line of statements, optionally labeled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
    /// Nothing may be merged onto the end of this line
    #[serde(default)]
    pub has_eol: bool,
    /// This line may not be merged onto a previous line
    #[serde(default)]
    pub has_bol: bool,
}

impl StatementLine {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            ..Default::default()
        }
    }

    pub fn labeled(label: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            label: Some(label.into()),
            statements,
            ..Default::default()
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Target label if the line is nothing but an unconditional jump
    pub fn sole_jump(&self) -> Option<&str> {
        match self.statements.as_slice() {
            [only] => only.jump_label(),
            _ => None,
        }
    }
}

/// Named compile-time constant: `define name = value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub value: Expr,
    #[serde(default)]
    pub span: Span,
}

/// Parameterized block template: `macro name(args) ... end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDefinition {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Element>,
    #[serde(default)]
    pub span: Span,
}

/// Call site of a macro: `insert name(args)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroInsertion {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

/// `include "file"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Include {
    pub file: String,
    #[serde(default)]
    pub span: Span,
}

/// `wait until condition`: blocks until the condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    pub condition: Expr,
    #[serde(default)]
    pub span: Span,
}

/// Multi-line `if ... then ... else if ... else ... end`.
/// `conditions[i]` guards `blocks[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultilineIf {
    pub conditions: Vec<Expr>,
    pub blocks: Vec<Vec<Element>>,
    #[serde(default)]
    pub else_block: Option<Vec<Element>>,
    #[serde(default)]
    pub span: Span,
}

/// `while condition do ... end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileLoop {
    pub condition: Expr,
    #[serde(default)]
    pub body: Vec<Element>,
    #[serde(default)]
    pub span: Span,
}

/// Any node that can be handed back as a replacement during traversal
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Statement(Statement),
    Expr(Expr),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Element(_) => "element",
            Node::Statement(_) => "statement",
            Node::Expr(_) => "expression",
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<StatementLine> for Node {
    fn from(l: StatementLine) -> Self {
        Node::Element(Element::Line(l))
    }
}

impl From<Statement> for Node {
    fn from(s: Statement) -> Self {
        Node::Statement(s)
    }
}

impl From<Expr> for Node {
    fn from(e: Expr) -> Self {
        Node::Expr(e)
    }
}

/// A finished yolol program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseProgram {
    pub lines: Vec<BaseLine>,
}

/// One physical yolol line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseLine {
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}
