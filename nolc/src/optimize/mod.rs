//! Tree rewriters used by the converter
//!
//! - [`StaticExpressionOptimizer`]: folds operations over literal values
//! - [`ExpressionInversionOptimizer`]: negates a condition in minimal form
//! - [`VariableNameOptimizer`]: shortens local variable names

mod fold;
mod invert;
mod names;

pub use fold::StaticExpressionOptimizer;
pub use invert::ExpressionInversionOptimizer;
pub use names::VariableNameOptimizer;
