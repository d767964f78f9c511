//! A search-query compiler: turns an infix query string into a typed,
//! nested boolean query document for an Elasticsearch-style backend.
//!
//! The pipeline is three stages, each its own module:
//! - [`lexer`] — shunting-yard tokenization into a postfix stream
//! - [`analyzer`] (plus [`date`] and [`value`]) — per-atom field routing and
//!   value normalization into a [`leaf::LeafQuery`]
//! - [`parser`] — folding the postfix stream into a [`leaf::QueryDoc`] tree
//!
//! [`field::FieldMeta`] is the compiler's only external configuration
//! surface: it tells the analyzer each field's type, aliases, transforms,
//! case-sensitivity, and nested-object scoping.

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod date;
pub mod error;
pub mod field;
pub mod leaf;
pub mod lexer;
pub mod parser;
pub mod value;

use chrono::{DateTime, Utc};

pub use error::{CompileError, CompileResult, LexError, ParseError, ValueError};
pub use field::{FieldMeta, FieldMetaBuilder, FieldType, Transform};
pub use leaf::{BoolNode, LeafQuery, Node, Occur, QueryDoc, RangeBounds, Scalar};
pub use lexer::Token;
pub use value::NormalizedValue;

/// The result of compiling a query string: the typed document plus whether
/// the backend must evaluate it as a scored query (rather than a plain
/// filter) — true when it contains a wildcard, fuzzy, phrase, or boosted
/// clause (spec.md §7).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: QueryDoc,
    pub requires_query: bool,
}

/// Compiles `source` into a [`CompiledQuery`], routing unprefixed atoms (and
/// atoms whose field prefix isn't recognized by `meta`) against
/// `default_field`.
///
/// # Errors
/// Returns [`CompileError`] if the source can't be tokenized (unmatched
/// parentheses), a leaf's value fails validation for its field's declared
/// type, or the postfix stream is malformed.
pub fn compile(source: &str, default_field: &str, meta: &FieldMeta) -> CompileResult<CompiledQuery> {
    compile_at(source, default_field, meta, Utc::now())
}

/// Same as [`compile`], but with an explicit clock — the integration tests
/// use to pin relative-date expressions (`"3 days ago"`) to a fixed instant.
///
/// # Errors
/// See [`compile`].
pub fn compile_at(
    source: &str,
    default_field: &str,
    meta: &FieldMeta,
    now: DateTime<Utc>,
) -> CompileResult<CompiledQuery> {
    let tokens = lexer::lex(source)?;
    let query = parser::fold(tokens, meta, default_field, now)?;
    let requires_query = query.requires_query();
    Ok(CompiledQuery { query, requires_query })
}
