//! Compiler configuration
//!
//! Defaults match the limits of a yolol chip. A `nolc.toml` file may override
//! any of them:
//!
//! ```toml
//! spaces = true
//! shorten_names = false
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{CompileError, Result};
use crate::printer::PrintMode;

/// Compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Measure lines in readable (compact) mode instead of spaceless mode
    pub spaces: bool,
    /// Maximum number of physical lines of the output
    pub max_lines: usize,
    /// Maximum number of characters per line
    pub max_line_length: usize,
    /// Characters kept free on every line when time tracking is active
    pub time_tracking_reserve: usize,
    /// Rename local variables to the shortest free names
    pub shorten_names: bool,
    /// Upper bound on macro expansions, catches recursive macros
    pub max_macro_insertions: usize,
    /// Upper bound on included files, catches include cycles
    pub max_includes: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            spaces: false,
            max_lines: 20,
            max_line_length: 70,
            time_tracking_reserve: 4,
            shorten_names: true,
            max_macro_insertions: 1000,
            max_includes: 64,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CompileError::io_error(format!("invalid config: {e}")))
    }

    /// Load a `nolc.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Use readable spacing when measuring lines
    pub fn spaces(mut self, spaces: bool) -> Self {
        self.spaces = spaces;
        self
    }

    pub fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = lines;
        self
    }

    pub fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    pub fn shorten_names(mut self, shorten: bool) -> Self {
        self.shorten_names = shorten;
        self
    }

    pub fn max_macro_insertions(mut self, count: usize) -> Self {
        self.max_macro_insertions = count;
        self
    }

    pub fn max_includes(mut self, count: usize) -> Self {
        self.max_includes = count;
        self
    }

    pub fn print_mode(&self) -> PrintMode {
        if self.spaces {
            PrintMode::Compact
        } else {
            PrintMode::Spaceless
        }
    }

    /// Per-line character budget. `counter` is the line counter variable when
    /// one is injected; `counter++ ` then has to fit next to every line.
    pub fn line_budget(&self, counter: Option<&str>) -> usize {
        match counter {
            Some(name) => {
                let reserve = self.time_tracking_reserve.max(name.len() + 3);
                self.max_line_length.saturating_sub(reserve)
            }
            None => self.max_line_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_lines, 20);
        assert_eq!(config.line_budget(None), 70);
        assert_eq!(config.line_budget(Some("a")), 66);
        assert_eq!(config.line_budget(Some("_time")), 62);
        assert_eq!(config.print_mode(), PrintMode::Spaceless);
    }

    #[test]
    fn test_partial_toml() {
        let config = CompilerConfig::from_toml_str("spaces = true\nmax_lines = 10\n").unwrap();
        assert!(config.spaces);
        assert_eq!(config.max_lines, 10);
        assert_eq!(config.max_line_length, 70);
        assert!(config.shorten_names);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(CompilerConfig::from_toml_str("max_lines = \"many\"").is_err());
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::new().spaces(true).shorten_names(false);
        assert_eq!(config.print_mode(), PrintMode::Compact);
        assert!(!config.shorten_names);
    }
}
