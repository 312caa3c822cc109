//! Expression AST nodes

use super::Span;
use serde::{Deserialize, Serialize};

/// Fixed-point number with three decimal places, the only numeric type of yolol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Number(i64);

impl Number {
    pub const SCALE: i64 = 1000;
    pub const ZERO: Number = Number(0);
    pub const ONE: Number = Number(Self::SCALE);

    pub fn from_int(value: i64) -> Self {
        Number(value.saturating_mul(Self::SCALE))
    }

    pub fn from_raw(raw: i64) -> Self {
        Number(raw)
    }

    pub fn from_bool(value: bool) -> Self {
        if value { Self::ONE } else { Self::ZERO }
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_true(self) -> bool {
        self.0 != 0
    }

    pub fn checked_add(self, other: Number) -> Option<Number> {
        self.0.checked_add(other.0).map(Number)
    }

    pub fn checked_sub(self, other: Number) -> Option<Number> {
        self.0.checked_sub(other.0).map(Number)
    }

    pub fn checked_mul(self, other: Number) -> Option<Number> {
        let wide = (self.0 as i128 * other.0 as i128) / Self::SCALE as i128;
        i64::try_from(wide).ok().map(Number)
    }

    /// `None` on division by zero (left for the runtime to report)
    pub fn checked_div(self, other: Number) -> Option<Number> {
        if other.0 == 0 {
            return None;
        }
        let wide = (self.0 as i128 * Self::SCALE as i128) / other.0 as i128;
        i64::try_from(wide).ok().map(Number)
    }

    pub fn checked_rem(self, other: Number) -> Option<Number> {
        if other.0 == 0 {
            return None;
        }
        self.0.checked_rem(other.0).map(Number)
    }

    pub fn checked_neg(self) -> Option<Number> {
        self.0.checked_neg().map(Number)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `value` rounded to three decimals, or `None` if it is not finite or out of range
    pub fn checked_from_f64(value: f64) -> Option<Number> {
        let scaled = (value * Number::SCALE as f64).round();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        (scaled.is_finite() && scaled >= i64::MIN as f64 && scaled < i64::MAX as f64)
            .then(|| Number(scaled as i64))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number((value * Number::SCALE as f64).round() as i64)
    }
}

impl From<Number> for f64 {
    fn from(value: Number) -> Self {
        value.as_f64()
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::from_int(value)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let int = abs / Number::SCALE as u64;
        let frac = abs % Number::SCALE as u64;
        if frac == 0 {
            return write!(f, "{sign}{int}");
        }
        let digits = format!("{frac:03}");
        write!(f, "{sign}{int}.{}", digits.trim_end_matches('0'))
    }
}

/// Variable access, optionally with a pre/post increment or decrement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dereference {
    pub variable: String,
    #[serde(default)]
    pub operator: Option<IncDec>,
    #[serde(default)]
    pub prefix: bool,
}

impl Dereference {
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            variable: name.into(),
            operator: None,
            prefix: false,
        }
    }

    pub fn with_operator(name: impl Into<String>, operator: IncDec, prefix: bool) -> Self {
        Self {
            variable: name.into(),
            operator: Some(operator),
            prefix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDec {
    Increment,
    Decrement,
}

impl std::fmt::Display for IncDec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncDec::Increment => write!(f, "++"),
            IncDec::Decrement => write!(f, "--"),
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric literal
    Number(Number),
    /// String literal
    String(String),

    /// Variable read
    Var(Dereference),

    /// Unary operation
    Unary { op: UnOp, operand: Box<Expr> },

    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Builtin function call, e.g. `line()` (nolol only)
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        span: Span,
    },

    /// Number of the physical line this expression ends up on.
    /// Produced by lowering `line()`, substituted once line positions are fixed.
    CurrentLine,
}

impl Expr {
    pub fn num(value: i64) -> Self {
        Expr::Number(Number::from_int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(Dereference::var(name))
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: function.into(),
            args,
            span: Span::default(),
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for nodes that only exist in nolol and must be lowered before emission
    pub fn is_extended(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::CurrentLine)
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,
}

impl BinOp {
    /// The comparison that holds exactly when `self` does not
    pub fn inverted_comparison(self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::Ne),
            BinOp::Ne => Some(BinOp::Eq),
            BinOp::Lt => Some(BinOp::Ge),
            BinOp::Ge => Some(BinOp::Lt),
            BinOp::Gt => Some(BinOp::Le),
            BinOp::Le => Some(BinOp::Gt),
            _ => None,
        }
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 6,
            BinOp::Pow => 7,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == BinOp::Pow
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::Mod => write!(f, "%"),
            BinOp::Pow => write!(f, "^"),
            BinOp::Eq => write!(f, "=="),
            BinOp::Ne => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::Le => write!(f, "<="),
            BinOp::Ge => write!(f, ">="),
            BinOp::And => write!(f, "and"),
            BinOp::Or => write!(f, "or"),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not
    Not,
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

impl UnOp {
    /// Keyword operator for a builtin function name (case-insensitive)
    pub fn from_builtin(name: &str) -> Option<UnOp> {
        match name.to_lowercase().as_str() {
            "abs" => Some(UnOp::Abs),
            "sqrt" => Some(UnOp::Sqrt),
            "sin" => Some(UnOp::Sin),
            "cos" => Some(UnOp::Cos),
            "tan" => Some(UnOp::Tan),
            "asin" => Some(UnOp::Asin),
            "acos" => Some(UnOp::Acos),
            "atan" => Some(UnOp::Atan),
            _ => None,
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            UnOp::Not => 3,
            _ => 8,
        }
    }
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not"),
            UnOp::Abs => write!(f, "abs"),
            UnOp::Sqrt => write!(f, "sqrt"),
            UnOp::Sin => write!(f, "sin"),
            UnOp::Cos => write!(f, "cos"),
            UnOp::Tan => write!(f, "tan"),
            UnOp::Asin => write!(f, "asin"),
            UnOp::Acos => write!(f, "acos"),
            UnOp::Atan => write!(f, "atan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Number::from_int(42).to_string(), "42");
        assert_eq!(Number::from_raw(1500).to_string(), "1.5");
        assert_eq!(Number::from_raw(-500).to_string(), "-0.5");
        assert_eq!(Number::from_raw(1005).to_string(), "1.005");
    }

    #[test]
    fn test_number_arithmetic() {
        let a = Number::from_raw(2500);
        let b = Number::from_int(2);
        assert_eq!(a.checked_mul(b), Some(Number::from_int(5)));
        assert_eq!(a.checked_div(b), Some(Number::from_raw(1250)));
        assert_eq!(a.checked_div(Number::ZERO), None);
        assert_eq!(a.checked_rem(Number::ZERO), None);
    }

    #[test]
    fn test_number_from_f64_rounds_to_millis() {
        assert_eq!(Number::from(1.2344), Number::from_raw(1234));
        assert_eq!(Number::from(1.005), Number::from_raw(1005));
    }

    #[test]
    fn test_number_checked_from_f64_range() {
        assert_eq!(Number::checked_from_f64(0.5), Some(Number::from_raw(500)));
        assert_eq!(Number::checked_from_f64(1e20), None);
        assert_eq!(Number::checked_from_f64(-1e20), None);
        assert_eq!(Number::checked_from_f64(f64::NAN), None);
    }

    #[test]
    fn test_number_serde_as_float() {
        let json = serde_json::to_string(&Number::from_raw(1500)).unwrap();
        assert_eq!(json, "1.5");
        let back: Number = serde_json::from_str("3").unwrap();
        assert_eq!(back, Number::from_int(3));
    }

    #[test]
    fn test_inverted_comparison_roundtrip() {
        for op in [BinOp::Eq, BinOp::Ne, BinOp::Lt, BinOp::Gt, BinOp::Le, BinOp::Ge] {
            let inv = op.inverted_comparison().unwrap();
            assert_eq!(inv.inverted_comparison(), Some(op));
        }
        assert_eq!(BinOp::Add.inverted_comparison(), None);
    }

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        assert_eq!(UnOp::from_builtin("ABS"), Some(UnOp::Abs));
        assert_eq!(UnOp::from_builtin("line"), None);
    }
}
