//! Error types for the query compiler.
//!
//! Three stage-specific error enums (`LexError`, `ValueError`, `ParseError`)
//! plus a crate-level `CompileError` that unifies them, following the same
//! shape the teacher crate uses for `SearchError`/`SearchResult`: one
//! `#[derive(Error)]` enum, an `error_type()` classifier for machine-readable
//! codes, and a `CompileResult<T>` alias.

use thiserror::Error;

/// Result type alias for compiler operations.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Errors raised while converting the raw source string into a postfix
/// token stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A `(` was never closed, or a `)` appeared with nothing to match.
    #[error("unmatched parenthesis in query")]
    UnmatchedParen,
}

/// Errors raised while validating and normalizing a leaf's value against
/// its field's declared type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// An integer field received a value that doesn't parse as `i64`.
    #[error("field {field:?}: {value:?} is not a valid integer")]
    InvalidInteger { field: String, value: String },

    /// A float field received a value that doesn't parse as `f64`.
    #[error("field {field:?}: {value:?} is not a valid float")]
    InvalidFloat { field: String, value: String },

    /// A boolean field received something other than `true`/`false`.
    #[error("field {field:?}: {value:?} is not a valid boolean (expected true/false)")]
    InvalidBoolean { field: String, value: String },

    /// An IP field received something that isn't a valid address or CIDR.
    #[error("field {field:?}: {value:?} is not a valid IP address or CIDR range")]
    InvalidIp { field: String, value: String },

    /// A date field received a string matching neither the ISO-8601-lenient
    /// form nor the relative-expression form.
    #[error("field {field:?}: {value:?} is not a valid date")]
    InvalidDate { field: String, value: String },

    /// A range suffix (`.gt`, `.gte`, `.lt`, `.lte`, `.eq`) was used on a
    /// field whose type doesn't support ranges.
    #[error("field {field:?} does not support range suffix {suffix:?}")]
    UnsupportedRangeSuffix { field: String, suffix: String },
}

/// Errors raised while folding the postfix token stream into a query tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A binary operator was visited with fewer than two operands on the
    /// stack.
    #[error("missing operand for operator")]
    MissingOperand,

    /// The stream ended with more than one item left on the operand stack
    /// (an operator is missing between them).
    #[error("missing operator between operands")]
    MissingOperator,
}

/// Top-level error type for [`crate::compile`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The lexer could not tokenize the input.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    /// A leaf's value failed type validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The postfix stream could not be folded into a tree.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    /// A short, stable classifier string for machine-readable error
    /// reporting (log fields, API error codes).
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Lex(LexError::UnmatchedParen) => "UNMATCHED_PAREN",
            Self::Value(ValueError::InvalidInteger { .. }) => "INVALID_INTEGER",
            Self::Value(ValueError::InvalidFloat { .. }) => "INVALID_FLOAT",
            Self::Value(ValueError::InvalidBoolean { .. }) => "INVALID_BOOLEAN",
            Self::Value(ValueError::InvalidIp { .. }) => "INVALID_IP",
            Self::Value(ValueError::InvalidDate { .. }) => "INVALID_DATE",
            Self::Value(ValueError::UnsupportedRangeSuffix { .. }) => "UNSUPPORTED_RANGE_SUFFIX",
            Self::Parse(ParseError::MissingOperand) => "MISSING_OPERAND",
            Self::Parse(ParseError::MissingOperator) => "MISSING_OPERATOR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_mapping() {
        let cases: Vec<(CompileError, &str)> = vec![
            (CompileError::Lex(LexError::UnmatchedParen), "UNMATCHED_PAREN"),
            (
                CompileError::Value(ValueError::InvalidInteger {
                    field: "score".into(),
                    value: "abc".into(),
                }),
                "INVALID_INTEGER",
            ),
            (
                CompileError::Parse(ParseError::MissingOperand),
                "MISSING_OPERAND",
            ),
            (
                CompileError::Parse(ParseError::MissingOperator),
                "MISSING_OPERATOR",
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(err.error_type(), *expected, "{err:?} -> {expected}");
        }
    }

    #[test]
    fn value_error_display_includes_field_and_value() {
        let err = ValueError::InvalidInteger {
            field: "score".into(),
            value: "abc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("score"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn compile_error_from_conversions() {
        let lex: CompileError = LexError::UnmatchedParen.into();
        assert!(matches!(lex, CompileError::Lex(LexError::UnmatchedParen)));

        let parse: CompileError = ParseError::MissingOperand.into();
        assert!(matches!(
            parse,
            CompileError::Parse(ParseError::MissingOperand)
        ));
    }
}
