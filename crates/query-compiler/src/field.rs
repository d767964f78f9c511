//! The field-type table supplied by the caller: the compiler's only
//! configuration surface.
//!
//! Built with a small chained-builder (`FieldMetaBuilder`), following the
//! teacher crate's `SearchQuery`/`LexicalParserConfig` builder idiom, rather
//! than public mutable fields, so a caller constructs it once and reuses it
//! immutably across calls.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::leaf::LeafQuery;
use crate::value::NormalizedValue;

/// How a field's raw token text is validated and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Matched exactly, case-sensitive, no tokenization.
    Literal,
    /// Analyzed free text; supports wildcard/fuzzy/phrase matching.
    FullText,
    /// `true`/`false` only.
    Boolean,
    /// Signed 64-bit integer; supports range suffixes and `~` fuzz ranges.
    Integer,
    /// 64-bit float; supports range suffixes and `~` fuzz ranges.
    Float,
    /// ISO-8601-lenient or relative date expression; always a range.
    Date,
    /// IPv4/IPv6 address or CIDR range.
    Ip,
}

/// A boxed value transform: takes the normalized value for a field and
/// produces the leaf query to use instead of the default construction.
pub type Transform = Arc<dyn Fn(&NormalizedValue) -> LeafQuery + Send + Sync>;

/// The external, caller-supplied field-type table a single [`crate::compile`]
/// call is routed against.
#[derive(Clone, Default)]
pub struct FieldMeta {
    pub(crate) type_of: HashMap<String, FieldType>,
    pub(crate) alias_of: HashMap<String, String>,
    pub(crate) transform_of: HashMap<String, Transform>,
    pub(crate) no_downcase: HashSet<String>,
    pub(crate) nested_of: HashMap<String, String>,
}

impl fmt::Debug for FieldMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMeta")
            .field("type_of", &self.type_of)
            .field("alias_of", &self.alias_of)
            .field("no_downcase", &self.no_downcase)
            .field("nested_of", &self.nested_of)
            .field("transform_of", &self.transform_of.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldMeta {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> FieldMetaBuilder {
        FieldMetaBuilder::default()
    }

    /// Looks up a field's declared type, resolving aliases first.
    #[must_use]
    pub fn type_of(&self, field: &str) -> Option<FieldType> {
        let canonical = self.alias_of.get(field).map_or(field, String::as_str);
        self.type_of.get(canonical).copied()
    }

    /// Resolves an alias to its canonical field name, or returns the input
    /// unchanged if it isn't an alias.
    #[must_use]
    pub fn resolve_alias<'a>(&'a self, field: &'a str) -> &'a str {
        self.alias_of.get(field).map_or(field, String::as_str)
    }

    /// Looks up a registered transform for a (canonical) field name.
    #[must_use]
    pub fn transform_of(&self, field: &str) -> Option<&Transform> {
        self.transform_of.get(field)
    }

    /// Whether the field's literal values should be matched case-sensitively
    /// (skip the default downcasing normalization).
    #[must_use]
    pub fn is_no_downcase(&self, field: &str) -> bool {
        self.no_downcase.contains(field)
    }

    /// Whether `field` is a nested field, and if so, the parent path it
    /// should be wrapped under.
    #[must_use]
    pub fn nested_path_of(&self, field: &str) -> Option<&str> {
        self.nested_of.get(field).map(String::as_str)
    }
}

/// Chained builder for [`FieldMeta`].
#[derive(Default)]
pub struct FieldMetaBuilder {
    inner: FieldMeta,
}

impl FieldMetaBuilder {
    /// Registers a field and its type.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.inner.type_of.insert(name.into(), ty);
        self
    }

    /// Registers `from` as an alias that resolves to the canonical field
    /// `to`.
    #[must_use]
    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.inner.alias_of.insert(from.into(), to.into());
        self
    }

    /// Registers a value transform for a field, invoked after normalization
    /// instead of the default leaf construction.
    #[must_use]
    pub fn transform<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&NormalizedValue) -> LeafQuery + Send + Sync + 'static,
    {
        self.inner.transform_of.insert(name.into(), Arc::new(f));
        self
    }

    /// Marks a literal field as case-sensitive (skip downcasing).
    #[must_use]
    pub fn no_downcase(mut self, name: impl Into<String>) -> Self {
        self.inner.no_downcase.insert(name.into());
        self
    }

    /// Marks `child` as a nested field whose leaf queries should be wrapped
    /// under `parent_path`.
    #[must_use]
    pub fn nested(mut self, child: impl Into<String>, parent_path: impl Into<String>) -> Self {
        self.inner.nested_of.insert(child.into(), parent_path.into());
        self
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> FieldMeta {
        self.inner
    }
}
