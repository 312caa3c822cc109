//! Tree traversal with in-place replacement
//!
//! Depth-first, source-order walk over a nolol tree. A [`Visitor`] is called
//! before (`Phase::Pre`) and after (`Phase::Post`) the children of every node
//! and may answer with a [`Visit`]:
//!
//! - `Unchanged`: keep the node.
//! - `Replace(nodes)`: substitute zero or more nodes for the current one and
//!   continue *after* them. The replacements are not visited.
//! - `Inline(nodes)`: substitute like `Replace`, then continue *at* the first
//!   replacement so that spliced-in content is itself visited.
//!
//! Lists are walked with an explicit index that re-reads the list length on
//! every iteration, so a replacement of one node by N shifts the remaining
//! nodes by N-1 without disturbing the walk. Handing back a node of the wrong
//! kind for its slot is a bug in the visitor and panics.

use crate::ast::{Element, Expr, Node, Program, Statement};
use crate::error::Result;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

/// Outcome of a single visitor callback
#[derive(Debug, Clone, PartialEq)]
pub enum Visit {
    Unchanged,
    Replace(Vec<Node>),
    Inline(Vec<Node>),
}

impl Visit {
    /// Remove the current node
    pub fn remove() -> Self {
        Visit::Replace(Vec::new())
    }

    pub fn replace_with(node: impl Into<Node>) -> Self {
        Visit::Replace(vec![node.into()])
    }
}

/// Callbacks invoked by the walker. Every method defaults to `Unchanged`.
pub trait Visitor {
    fn visit_element(&mut self, _element: &mut Element, _phase: Phase) -> Result<Visit> {
        Ok(Visit::Unchanged)
    }

    fn visit_statement(&mut self, _statement: &mut Statement, _phase: Phase) -> Result<Visit> {
        Ok(Visit::Unchanged)
    }

    fn visit_expr(&mut self, _expr: &mut Expr, _phase: Phase) -> Result<Visit> {
        Ok(Visit::Unchanged)
    }
}

/// A node kind that lives in an ordered list (element blocks, statement lists)
trait ListSlot: Sized {
    const SLOT: &'static str;

    fn visit<V: Visitor + ?Sized>(&mut self, visitor: &mut V, phase: Phase) -> Result<Visit>;

    fn walk_children<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()>;

    fn from_node(node: Node) -> std::result::Result<Self, Node>;
}

impl ListSlot for Element {
    const SLOT: &'static str = "element";

    fn visit<V: Visitor + ?Sized>(&mut self, visitor: &mut V, phase: Phase) -> Result<Visit> {
        visitor.visit_element(self, phase)
    }

    fn walk_children<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        match self {
            Element::Line(line) => walk_statements(&mut line.statements, visitor),
            Element::Definition(def) => walk_expr(&mut def.value, visitor),
            Element::MacroDefinition(def) => walk_elements(&mut def.body, visitor),
            Element::MacroInsertion(ins) => {
                for arg in &mut ins.args {
                    walk_expr(arg, visitor)?;
                }
                Ok(())
            }
            Element::Wait(wait) => walk_expr(&mut wait.condition, visitor),
            Element::If(mif) => {
                for (cond, block) in mif.conditions.iter_mut().zip(mif.blocks.iter_mut()) {
                    walk_expr(cond, visitor)?;
                    walk_elements(block, visitor)?;
                }
                if let Some(block) = &mut mif.else_block {
                    walk_elements(block, visitor)?;
                }
                Ok(())
            }
            Element::While(wl) => {
                walk_expr(&mut wl.condition, visitor)?;
                walk_elements(&mut wl.body, visitor)
            }
            Element::MacroExit | Element::Include(_) => Ok(()),
        }
    }

    fn from_node(node: Node) -> std::result::Result<Self, Node> {
        match node {
            Node::Element(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl ListSlot for Statement {
    const SLOT: &'static str = "statement";

    fn visit<V: Visitor + ?Sized>(&mut self, visitor: &mut V, phase: Phase) -> Result<Visit> {
        visitor.visit_statement(self, phase)
    }

    fn walk_children<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        match self {
            Statement::Assign { value, .. } => walk_expr(value, visitor),
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                walk_expr(condition, visitor)?;
                walk_statements(then_block, visitor)?;
                if let Some(block) = else_block {
                    walk_statements(block, visitor)?;
                }
                Ok(())
            }
            Statement::Goto(target) => walk_expr(target, visitor),
            Statement::Step(_)
            | Statement::GotoLabel { .. }
            | Statement::Break { .. }
            | Statement::Continue { .. } => Ok(()),
        }
    }

    fn from_node(node: Node) -> std::result::Result<Self, Node> {
        match node {
            Node::Statement(s) => Ok(s),
            other => Err(other),
        }
    }
}

/// Walk a whole program
pub fn walk_program<V: Visitor + ?Sized>(program: &mut Program, visitor: &mut V) -> Result<()> {
    walk_elements(&mut program.elements, visitor)
}

pub fn walk_elements<V: Visitor + ?Sized>(list: &mut Vec<Element>, visitor: &mut V) -> Result<()> {
    walk_list(list, visitor)
}

pub fn walk_statements<V: Visitor + ?Sized>(list: &mut Vec<Statement>, visitor: &mut V) -> Result<()> {
    walk_list(list, visitor)
}

fn walk_list<T: ListSlot, V: Visitor + ?Sized>(list: &mut Vec<T>, visitor: &mut V) -> Result<()> {
    let mut i = 0;
    while i < list.len() {
        match list[i].visit(visitor, Phase::Pre)? {
            Visit::Unchanged => {}
            Visit::Replace(nodes) => {
                i += splice(list, i, nodes);
                continue;
            }
            Visit::Inline(nodes) => {
                splice(list, i, nodes);
                continue;
            }
        }

        list[i].walk_children(visitor)?;

        match list[i].visit(visitor, Phase::Post)? {
            Visit::Unchanged => i += 1,
            Visit::Replace(nodes) => i += splice(list, i, nodes),
            Visit::Inline(nodes) => {
                splice(list, i, nodes);
            }
        }
    }
    Ok(())
}

/// Replace `list[at]` with `nodes`, returning how many nodes were inserted
fn splice<T: ListSlot>(list: &mut Vec<T>, at: usize, nodes: Vec<Node>) -> usize {
    let count = nodes.len();
    let converted = nodes.into_iter().map(|node| match T::from_node(node) {
        Ok(item) => item,
        Err(node) => panic!(
            "traversal: cannot place {} node into {} slot",
            node.kind(),
            T::SLOT
        ),
    });
    list.splice(at..=at, converted);
    count
}

/// Walk a single expression slot. Expression slots take exactly one replacement.
pub fn walk_expr<V: Visitor + ?Sized>(expr: &mut Expr, visitor: &mut V) -> Result<()> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || walk_expr_inner(expr, visitor))
}

fn walk_expr_inner<V: Visitor + ?Sized>(expr: &mut Expr, visitor: &mut V) -> Result<()> {
    match visitor.visit_expr(expr, Phase::Pre)? {
        Visit::Unchanged => {}
        Visit::Replace(nodes) => {
            *expr = single_expr(nodes);
            return Ok(());
        }
        Visit::Inline(nodes) => {
            *expr = single_expr(nodes);
            return walk_expr(expr, visitor);
        }
    }

    match expr {
        Expr::Unary { operand, .. } => walk_expr(operand, visitor)?,
        Expr::Binary { left, right, .. } => {
            walk_expr(left, visitor)?;
            walk_expr(right, visitor)?;
        }
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, visitor)?;
            }
        }
        Expr::Number(_) | Expr::String(_) | Expr::Var(_) | Expr::CurrentLine => {}
    }

    match visitor.visit_expr(expr, Phase::Post)? {
        Visit::Unchanged => Ok(()),
        Visit::Replace(nodes) => {
            *expr = single_expr(nodes);
            Ok(())
        }
        Visit::Inline(nodes) => {
            *expr = single_expr(nodes);
            walk_expr(expr, visitor)
        }
    }
}

fn single_expr(nodes: Vec<Node>) -> Expr {
    let count = nodes.len();
    let mut nodes = nodes.into_iter();
    match (nodes.next(), count) {
        (Some(Node::Expr(e)), 1) => e,
        (Some(node), 1) => panic!(
            "traversal: cannot place {} node into expression slot",
            node.kind()
        ),
        _ => panic!("traversal: an expression slot takes exactly one replacement, got {count}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, StatementLine};

    /// Records every callback as "<phase>:<kind>"
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Visitor for Recorder {
        fn visit_element(&mut self, element: &mut Element, phase: Phase) -> Result<Visit> {
            self.events.push(format!("{phase:?}:{}", element.kind()));
            Ok(Visit::Unchanged)
        }

        fn visit_statement(&mut self, _statement: &mut Statement, phase: Phase) -> Result<Visit> {
            self.events.push(format!("{phase:?}:stmt"));
            Ok(Visit::Unchanged)
        }

        fn visit_expr(&mut self, _expr: &mut Expr, phase: Phase) -> Result<Visit> {
            self.events.push(format!("{phase:?}:expr"));
            Ok(Visit::Unchanged)
        }
    }

    fn line(stmts: Vec<Statement>) -> Element {
        StatementLine::new(stmts).into()
    }

    #[test]
    fn test_pre_and_post_order() {
        let mut program = Program::new(vec![line(vec![Statement::assign("a", Expr::num(1))])]);
        let mut rec = Recorder::default();
        walk_program(&mut program, &mut rec).unwrap();
        assert_eq!(
            rec.events,
            vec![
                "Pre:statement line",
                "Pre:stmt",
                "Pre:expr",
                "Post:expr",
                "Post:stmt",
                "Post:statement line"
            ]
        );
    }

    /// Replaces every line holding `a = <n>` with n copies of `b = 0`
    struct Fanout {
        seen: Vec<String>,
    }

    impl Visitor for Fanout {
        fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
            if phase == Phase::Post
                && let Statement::Assign { variable, value, .. } = statement
            {
                self.seen.push(variable.clone());
                if variable.as_str() == "a" {
                    let n = value.as_number().map(|n| n.raw() / 1000).unwrap_or(0);
                    let copies = (0..n)
                        .map(|_| Node::Statement(Statement::assign("b", Expr::num(0))))
                        .collect();
                    return Ok(Visit::Replace(copies));
                }
            }
            Ok(Visit::Unchanged)
        }
    }

    #[test]
    fn test_one_to_many_replacement_keeps_indices() {
        let mut program = Program::new(vec![line(vec![
            Statement::assign("a", Expr::num(3)),
            Statement::assign("c", Expr::num(1)),
            Statement::assign("a", Expr::num(0)),
            Statement::assign("d", Expr::num(1)),
        ])]);
        let mut v = Fanout { seen: Vec::new() };
        walk_program(&mut program, &mut v).unwrap();

        // replacements are not revisited, and every original statement is seen once
        assert_eq!(v.seen, vec!["a", "c", "a", "d"]);
        let Element::Line(l) = &program.elements[0] else {
            panic!("expected line")
        };
        let names: Vec<_> = l
            .statements
            .iter()
            .map(|s| match s {
                Statement::Assign { variable, .. } => variable.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(names, vec!["b", "b", "b", "c", "d"]);
    }

    /// Inlines a marker line in place of the first line, then deletes markers
    struct Expander {
        expanded: bool,
        visited_markers: usize,
    }

    impl Visitor for Expander {
        fn visit_element(&mut self, element: &mut Element, phase: Phase) -> Result<Visit> {
            if phase != Phase::Pre {
                return Ok(Visit::Unchanged);
            }
            match element {
                Element::Line(l) if l.label.as_deref() == Some("expand") && !self.expanded => {
                    self.expanded = true;
                    Ok(Visit::Inline(vec![
                        StatementLine::labeled("marker", vec![]).into(),
                        StatementLine::labeled("marker", vec![]).into(),
                    ]))
                }
                Element::Line(l) if l.label.as_deref() == Some("marker") => {
                    self.visited_markers += 1;
                    Ok(Visit::remove())
                }
                _ => Ok(Visit::Unchanged),
            }
        }
    }

    #[test]
    fn test_inline_visits_spliced_content() {
        let mut program = Program::new(vec![
            StatementLine::labeled("expand", vec![]).into(),
            line(vec![]),
        ]);
        let mut v = Expander {
            expanded: false,
            visited_markers: 0,
        };
        walk_program(&mut program, &mut v).unwrap();
        assert_eq!(v.visited_markers, 2);
        assert_eq!(program.elements.len(), 1);
    }

    struct FoldAdd;

    impl Visitor for FoldAdd {
        fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
            if phase == Phase::Post
                && let Expr::Binary { op: BinOp::Add, left, right } = expr
                && let (Some(a), Some(b)) = (left.as_number(), right.as_number())
            {
                return Ok(Visit::replace_with(Expr::Number(a.checked_add(b).unwrap())));
            }
            Ok(Visit::Unchanged)
        }
    }

    #[test]
    fn test_expression_replacement_bottom_up() {
        let nested = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Add, Expr::num(1), Expr::num(2)),
            Expr::num(3),
        );
        let mut program = Program::new(vec![line(vec![Statement::assign("x", nested)])]);
        walk_program(&mut program, &mut FoldAdd).unwrap();
        let Element::Line(l) = &program.elements[0] else {
            panic!("expected line")
        };
        assert_eq!(l.statements[0], Statement::assign("x", Expr::num(6)));
    }

    struct WrongKind;

    impl Visitor for WrongKind {
        fn visit_statement(&mut self, _statement: &mut Statement, _phase: Phase) -> Result<Visit> {
            Ok(Visit::replace_with(Expr::num(1)))
        }
    }

    #[test]
    #[should_panic(expected = "cannot place expression node into statement slot")]
    fn test_wrong_replacement_kind_panics() {
        let mut program = Program::new(vec![line(vec![Statement::Goto(Expr::num(1))])]);
        let _ = walk_program(&mut program, &mut WrongKind);
    }

    struct Failing;

    impl Visitor for Failing {
        fn visit_expr(&mut self, _expr: &mut Expr, _phase: Phase) -> Result<Visit> {
            Err(crate::error::CompileError::internal("stop"))
        }
    }

    #[test]
    fn test_error_aborts_traversal() {
        let mut program = Program::new(vec![line(vec![Statement::Goto(Expr::num(1))])]);
        assert!(walk_program(&mut program, &mut Failing).is_err());
    }
}
