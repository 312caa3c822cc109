//! Variable name shortening

use std::collections::HashMap;

/// Words a generated name must never collide with
const KEYWORDS: &[&str] = &[
    "if", "then", "else", "end", "goto", "and", "or", "not", "abs", "sqrt", "sin", "cos", "tan",
    "asin", "acos", "atan",
];

/// Maps local variable names to the shortest free names (`a`, `b`, ..., `aa`, ...).
/// Names are case-insensitive; globals (`:name`) are left untouched.
#[derive(Debug, Clone, Default)]
pub struct VariableNameOptimizer {
    /// lowercase original name -> short name
    mapping: HashMap<String, String>,
    next: usize,
}

impl VariableNameOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short name for `name`, allocating one on first use
    pub fn optimize_name(&mut self, name: &str) -> String {
        if name.starts_with(':') {
            return name.to_string();
        }
        let key = name.to_lowercase();
        if let Some(short) = self.mapping.get(&key) {
            return short.clone();
        }
        let short = loop {
            let candidate = short_name(self.next);
            self.next += 1;
            if !KEYWORDS.contains(&candidate.as_str()) {
                break candidate;
            }
        };
        self.mapping.insert(key, short.clone());
        short
    }

    /// short name -> original (lowercase) name
    pub fn reversal_table(&self) -> HashMap<String, String> {
        self.mapping
            .iter()
            .map(|(orig, short)| (short.clone(), orig.clone()))
            .collect()
    }
}

/// Bijective base-26: 0 -> a, 25 -> z, 26 -> aa
fn short_name(mut index: usize) -> String {
    let mut chars = Vec::new();
    loop {
        chars.push((b'a' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    chars.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_sequence() {
        assert_eq!(short_name(0), "a");
        assert_eq!(short_name(25), "z");
        assert_eq!(short_name(26), "aa");
        assert_eq!(short_name(27), "ab");
        assert_eq!(short_name(26 + 26), "ba");
        assert_eq!(short_name(26 + 26 * 26), "aaa");
    }

    #[test]
    fn test_names_are_stable_and_case_insensitive() {
        let mut names = VariableNameOptimizer::new();
        assert_eq!(names.optimize_name("counter"), "a");
        assert_eq!(names.optimize_name("other"), "b");
        assert_eq!(names.optimize_name("COUNTER"), "a");
    }

    #[test]
    fn test_globals_untouched() {
        let mut names = VariableNameOptimizer::new();
        assert_eq!(names.optimize_name(":door"), ":door");
        assert_eq!(names.optimize_name("x"), "a");
    }

    #[test]
    fn test_keywords_are_skipped() {
        let mut names = VariableNameOptimizer::new();
        // "if" is the 239th name (26 + 8 * 26 + 5)
        names.next = 26 + 8 * 26 + 5;
        assert_eq!(names.optimize_name("v"), "ig");
    }

    #[test]
    fn test_reversal_table() {
        let mut names = VariableNameOptimizer::new();
        names.optimize_name("speed");
        let table = names.reversal_table();
        assert_eq!(table.get("a").map(String::as_str), Some("speed"));
    }
}
