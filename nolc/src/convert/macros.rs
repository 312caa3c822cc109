//! Macro expansion
//!
//! An insertion is expanded into a fresh copy of the macro body in which every
//! parameter is replaced by its argument and every label defined inside the
//! body is made unique to this insertion (`label~N`), so that a macro can be
//! inserted any number of times.

use std::collections::{HashMap, HashSet};

use crate::ast::{Element, Expr, MacroDefinition, MacroInsertion, Span, Statement};
use crate::error::{CompileError, Result};
use crate::visit::{Phase, Visit, Visitor, walk_elements};

/// Copy of `def`'s body specialised for `insertion`. `id` must be unique per insertion.
pub(crate) fn expand(
    def: &MacroDefinition,
    insertion: &MacroInsertion,
    id: usize,
) -> Result<Vec<Element>> {
    if def.params.len() != insertion.args.len() {
        return Err(CompileError::structural(
            format!(
                "macro '{}' expects {} arguments, got {}",
                def.name,
                def.params.len(),
                insertion.args.len()
            ),
            insertion.span,
        ));
    }

    let mut body = def.body.clone();

    let mut labels = LabelCollector::default();
    walk_elements(&mut body, &mut labels)?;
    if !labels.defined.is_empty() {
        walk_elements(
            &mut body,
            &mut LabelRenamer {
                labels: &labels.defined,
                id,
            },
        )?;
    }

    let args = def
        .params
        .iter()
        .map(|p| p.to_lowercase())
        .zip(insertion.args.iter().cloned())
        .collect();
    walk_elements(
        &mut body,
        &mut ParamSubstitution {
            macro_name: &def.name,
            args,
            span: insertion.span,
        },
    )?;

    Ok(body)
}

#[derive(Default)]
struct LabelCollector {
    defined: HashSet<String>,
}

impl Visitor for LabelCollector {
    fn visit_element(&mut self, element: &mut Element, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre
            && let Element::Line(line) = element
            && let Some(label) = &line.label
        {
            self.defined.insert(label.to_lowercase());
        }
        Ok(Visit::Unchanged)
    }
}

struct LabelRenamer<'l> {
    labels: &'l HashSet<String>,
    id: usize,
}

impl LabelRenamer<'_> {
    fn rename(&self, label: &mut String) {
        let lower = label.to_lowercase();
        if self.labels.contains(&lower) {
            *label = format!("{lower}~{}", self.id);
        }
    }
}

impl Visitor for LabelRenamer<'_> {
    fn visit_element(&mut self, element: &mut Element, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre
            && let Element::Line(line) = element
            && let Some(label) = &mut line.label
        {
            self.rename(label);
        }
        Ok(Visit::Unchanged)
    }

    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre
            && let Statement::GotoLabel { label, .. } = statement
        {
            self.rename(label);
        }
        Ok(Visit::Unchanged)
    }
}

struct ParamSubstitution<'m> {
    macro_name: &'m str,
    /// lowercase parameter -> argument
    args: HashMap<String, Expr>,
    span: Span,
}

impl ParamSubstitution<'_> {
    /// A parameter that is written to must be bound to a plain variable
    fn substitute_target(&self, variable: &mut String) -> Result<()> {
        let Some(arg) = self.args.get(&variable.to_lowercase()) else {
            return Ok(());
        };
        match arg {
            Expr::Var(target) if target.operator.is_none() => {
                *variable = target.variable.clone();
                Ok(())
            }
            _ => Err(CompileError::structural(
                format!(
                    "argument for parameter '{variable}' of macro '{}' must be a variable",
                    self.macro_name
                ),
                self.span,
            )),
        }
    }
}

impl Visitor for ParamSubstitution<'_> {
    fn visit_statement(&mut self, statement: &mut Statement, phase: Phase) -> Result<Visit> {
        if phase == Phase::Pre {
            match statement {
                Statement::Assign { variable, .. } => self.substitute_target(variable)?,
                Statement::Step(deref) => self.substitute_target(&mut deref.variable)?,
                _ => {}
            }
        }
        Ok(Visit::Unchanged)
    }

    fn visit_expr(&mut self, expr: &mut Expr, phase: Phase) -> Result<Visit> {
        if phase != Phase::Pre {
            return Ok(Visit::Unchanged);
        }
        let Expr::Var(deref) = expr else {
            return Ok(Visit::Unchanged);
        };
        if deref.operator.is_some() {
            self.substitute_target(&mut deref.variable)?;
            return Ok(Visit::Unchanged);
        }
        match self.args.get(&deref.variable.to_lowercase()) {
            // substituted arguments are not walked again
            Some(arg) => Ok(Visit::replace_with(arg.clone())),
            None => Ok(Visit::Unchanged),
        }
    }
}
