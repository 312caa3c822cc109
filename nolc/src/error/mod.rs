//! Error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The input program cannot be represented in yolol
    #[error("{message} (at {span})")]
    Structural { message: String, span: Span },

    /// Reported by the parser collaborator
    #[error("Parse error at {span}: {message}")]
    Parse { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("File not found: {name}")]
    FileNotFound { name: String },

    /// The compiler broke one of its own invariants
    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn structural(message: impl Into<String>, span: Span) -> Self {
        Self::Structural {
            message: message.into(),
            span,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::Parse {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn file_not_found(name: impl Into<String>) -> Self {
        Self::FileNotFound { name: name.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "internal compiler error");
        Self::Internal { message }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Structural { span, .. } => Some(*span),
            Self::Parse { span, .. } => Some(*span),
            Self::Io { .. } | Self::FileNotFound { .. } | Self::Internal { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Structural { message, .. } => message.clone(),
            Self::Parse { message, .. } => message.clone(),
            Self::Io { message } => message.clone(),
            Self::FileNotFound { name } => format!("file not found: {name}"),
            Self::Internal { message } => message.clone(),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::io_error(e.to_string())
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Structural { .. } => "Structural",
        CompileError::Parse { .. } => "Parse",
        CompileError::Io { .. } => "IO",
        CompileError::FileNotFound { .. } => "IO",
        CompileError::Internal { .. } => "Internal",
    };

    let printed = if let Some(span) = error.span() {
        let range = span.byte_range(source);
        Report::build(ReportKind::Error, (filename, range.clone()))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, range))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((filename, Source::from(source)))
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .eprint((filename, Source::from(source)))
    };

    if printed.is_err() {
        eprintln!("Error: {error}");
    }
}
