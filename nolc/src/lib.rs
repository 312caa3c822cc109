//! nolol to yolol compiler library
//!
//! Converts the tree of a nolol program (structured control flow, labels,
//! constants, macros, includes) into a flat yolol program that fits the line
//! and character limits of a yolol chip.

pub mod ast;
pub mod config;
pub mod convert;
pub mod error;
pub mod estimate;
pub mod optimize;
pub mod printer;
pub mod source;
pub mod visit;

pub use ast::Span;
pub use config::CompilerConfig;
pub use convert::Converter;
pub use error::{CompileError, Result};
