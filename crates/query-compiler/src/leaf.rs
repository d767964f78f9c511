//! The typed query document: leaf queries, boolean combinators, and the
//! exact output shape the search backend expects.
//!
//! Serialization is hand-rolled (rather than derived) so the emitted JSON
//! uses exactly the key set and shape spec.md §6 allows — `match_none`,
//! `match_all`, `term`, `wildcard`, `fuzzy`, `match_phrase`, `range`,
//! `nested`, `bool`, each leaf clause keyed directly by field name
//! (`term: { "t.name": "rarity" }`, not `term: { field, value }`) —
//! the outer variant-to-key mapping is grounded on the `Query` enum in
//! `other_examples/.../vinted-elasticsearch-dsl-rs__src-queries-mod.rs.rs`,
//! adapted to the field-keyed body shape spec.md §6/§8 require.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// A scalar value as it appears inside a `term`/`range` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Dates are always serialized as epoch-millisecond timestamps, never
    /// as strings (spec.md §6).
    Timestamp(DateTime<Utc>),
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(v) => s.serialize_str(v),
            Self::Bool(v) => s.serialize_bool(*v),
            Self::Int(v) => s.serialize_i64(*v),
            Self::Float(v) => s.serialize_f64(*v),
            Self::Timestamp(v) => s.serialize_i64(v.timestamp_millis()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.timestamp_millis()),
        }
    }
}

/// The bounds of a `range` clause. At least one bound is always present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Scalar>,
    pub gte: Option<Scalar>,
    pub lt: Option<Scalar>,
    pub lte: Option<Scalar>,
}

impl Serialize for RangeBounds {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let count = [&self.gt, &self.gte, &self.lt, &self.lte]
            .iter()
            .filter(|o| o.is_some())
            .count();
        let mut map = s.serialize_map(Some(count))?;
        if let Some(v) = &self.gt {
            map.serialize_entry("gt", v)?;
        }
        if let Some(v) = &self.gte {
            map.serialize_entry("gte", v)?;
        }
        if let Some(v) = &self.lt {
            map.serialize_entry("lt", v)?;
        }
        if let Some(v) = &self.lte {
            map.serialize_entry("lte", v)?;
        }
        map.end()
    }
}

/// A single leaf clause: a term, a range, a wildcard/fuzzy/phrase match, or
/// a structural marker (`match_all`/`match_none`), possibly wrapped in a
/// nested-field scope.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafQuery {
    /// Exact match against `field`.
    Term {
        field: String,
        value: Scalar,
        boost: Option<f64>,
    },
    /// A bounded range against `field`.
    Range { field: String, bounds: RangeBounds },
    /// A glob-style pattern (`*`, `?`) against `field`.
    Wildcard {
        field: String,
        pattern: String,
        boost: Option<f64>,
    },
    /// An edit-distance-tolerant match against `field`.
    Fuzzy {
        field: String,
        value: String,
        fuzziness: f64,
        boost: Option<f64>,
    },
    /// An ordered phrase match against `field`.
    MatchPhrase {
        field: String,
        value: String,
        boost: Option<f64>,
    },
    /// Matches every document (empty-query fallback).
    MatchAll,
    /// Matches no document (structurally-empty negation, etc).
    MatchNone,
    /// Scopes `inner` to a nested-object path.
    Nested { path: String, inner: Box<Node> },
}

impl LeafQuery {
    /// Whether this leaf carries a boost different from the default, or is
    /// a kind (wildcard/fuzzy/phrase) that always requires query-time
    /// scoring rather than a plain filter.
    #[must_use]
    pub fn requires_query(&self) -> bool {
        match self {
            Self::Wildcard { .. } | Self::Fuzzy { .. } | Self::MatchPhrase { .. } => true,
            Self::Term { boost: Some(_), .. } | Self::Wildcard { boost: Some(_), .. } => true,
            Self::Nested { inner, .. } => inner.requires_query(),
            _ => false,
        }
    }
}

impl Serialize for LeafQuery {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(1))?;
        match self {
            Self::Term { field, value, boost } => {
                map.serialize_entry(
                    "term",
                    &FieldEntry(field, TermValue { value, boost: *boost }),
                )?;
            }
            Self::Range { field, bounds } => {
                map.serialize_entry("range", &FieldEntry(field, bounds))?;
            }
            Self::Wildcard { field, pattern, boost } => {
                map.serialize_entry(
                    "wildcard",
                    &FieldEntry(field, StringOrBoosted { value: pattern, boost: *boost }),
                )?;
            }
            Self::Fuzzy {
                field,
                value,
                fuzziness,
                boost,
            } => {
                map.serialize_entry(
                    "fuzzy",
                    &FieldEntry(
                        field,
                        FuzzyValue {
                            value,
                            fuzziness: *fuzziness,
                            boost: *boost,
                        },
                    ),
                )?;
            }
            Self::MatchPhrase { field, value, boost } => {
                map.serialize_entry(
                    "match_phrase",
                    &FieldEntry(field, StringOrBoosted { value, boost: *boost }),
                )?;
            }
            Self::MatchAll => map.serialize_entry("match_all", &EmptyBody)?,
            Self::MatchNone => map.serialize_entry("match_none", &EmptyBody)?,
            Self::Nested { path, inner } => {
                map.serialize_entry("nested", &NestedBody { path, query: inner })?;
            }
        }
        map.end()
    }
}

/// A one-entry map `{ field: value }`, the shape every leaf clause uses for
/// its body (spec.md §6) instead of a `{field, value}` struct.
struct FieldEntry<'a, T>(&'a str, T);
impl<T: Serialize> Serialize for FieldEntry<'_, T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(1))?;
        map.serialize_entry(self.0, &self.1)?;
        map.end()
    }
}

/// A term's value: the bare scalar, or `{value, boost}` once a boost is set.
struct TermValue<'a> {
    value: &'a Scalar,
    boost: Option<f64>,
}
impl Serialize for TermValue<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.boost {
            None => self.value.serialize(s),
            Some(boost) => {
                let mut st = s.serialize_struct("TermValue", 2)?;
                st.serialize_field("value", self.value)?;
                st.serialize_field("boost", &boost)?;
                st.end()
            }
        }
    }
}

/// A wildcard pattern or phrase value: the bare string, or `{value, boost}`
/// once a boost is set.
struct StringOrBoosted<'a> {
    value: &'a str,
    boost: Option<f64>,
}
impl Serialize for StringOrBoosted<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.boost {
            None => s.serialize_str(self.value),
            Some(boost) => {
                let mut st = s.serialize_struct("StringOrBoosted", 2)?;
                st.serialize_field("value", self.value)?;
                st.serialize_field("boost", &boost)?;
                st.end()
            }
        }
    }
}

struct FuzzyValue<'a> {
    value: &'a str,
    fuzziness: f64,
    boost: Option<f64>,
}
impl Serialize for FuzzyValue<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("FuzzyValue", 3)?;
        st.serialize_field("value", self.value)?;
        st.serialize_field("fuzziness", &self.fuzziness)?;
        if let Some(boost) = self.boost {
            st.serialize_field("boost", &boost)?;
        }
        st.end()
    }
}

struct NestedBody<'a> {
    path: &'a str,
    query: &'a Node,
}
impl Serialize for NestedBody<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("NestedBody", 2)?;
        st.serialize_field("path", self.path)?;
        st.serialize_field("query", self.query)?;
        st.end()
    }
}

struct EmptyBody;
impl Serialize for EmptyBody {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_map(Some(0))?.end()
    }
}

/// Which of a `BoolNode`'s three occurrence lists a merge targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

/// A boolean combinator node. Exactly one of the three lists is ever
/// non-empty for a node built by the parser — never mixed — matching
/// spec.md §3's invariant on `BoolNode`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolNode {
    pub must: Vec<Node>,
    pub should: Vec<Node>,
    pub must_not: Vec<Node>,
}

impl BoolNode {
    #[must_use]
    pub fn must(children: Vec<Node>) -> Self {
        Self {
            must: children,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn should(children: Vec<Node>) -> Self {
        Self {
            should: children,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn must_not(children: Vec<Node>) -> Self {
        Self {
            must_not: children,
            ..Self::default()
        }
    }

    /// If exactly one of the three lists is non-empty, returns which one
    /// and a reference to its children. Used by the parser's associativity
    /// flattening to decide whether an operand can be spliced in directly.
    #[must_use]
    pub fn sole_occupied(&self) -> Option<(Occur, &[Node])> {
        match (self.must.is_empty(), self.should.is_empty(), self.must_not.is_empty()) {
            (false, true, true) => Some((Occur::Must, &self.must)),
            (true, false, true) => Some((Occur::Should, &self.should)),
            (true, true, false) => Some((Occur::MustNot, &self.must_not)),
            _ => None,
        }
    }
}

impl Serialize for BoolNode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let count = [&self.must, &self.should, &self.must_not]
            .iter()
            .filter(|v| !v.is_empty())
            .count();
        let mut map = s.serialize_map(Some(count))?;
        if !self.must.is_empty() {
            map.serialize_entry("must", &self.must)?;
        }
        if !self.should.is_empty() {
            map.serialize_entry("should", &self.should)?;
        }
        if !self.must_not.is_empty() {
            map.serialize_entry("must_not", &self.must_not)?;
        }
        map.end()
    }
}

/// A node in the compiled query tree: either a leaf clause or a boolean
/// combination of further nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(LeafQuery),
    Bool(BoolNode),
}

impl Node {
    #[must_use]
    pub fn requires_query(&self) -> bool {
        match self {
            Self::Leaf(l) => l.requires_query(),
            Self::Bool(b) => b
                .must
                .iter()
                .chain(&b.should)
                .chain(&b.must_not)
                .any(Self::requires_query),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(l) => l.serialize(s),
            Self::Bool(b) => {
                let mut map = s.serialize_map(Some(1))?;
                map.serialize_entry("bool", b)?;
                map.end()
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(LeafQuery::Term { field, value, .. }) => write!(f, "{field}:{value}"),
            Self::Leaf(LeafQuery::Range { field, .. }) => write!(f, "{field}:<range>"),
            Self::Leaf(LeafQuery::Wildcard { field, pattern, .. }) => {
                write!(f, "{field}:{pattern}")
            }
            Self::Leaf(LeafQuery::Fuzzy { field, value, .. }) => write!(f, "{field}:~{value}"),
            Self::Leaf(LeafQuery::MatchPhrase { field, value, .. }) => {
                write!(f, "{field}:\"{value}\"")
            }
            Self::Leaf(LeafQuery::MatchAll) => write!(f, "*"),
            Self::Leaf(LeafQuery::MatchNone) => write!(f, "!*"),
            Self::Leaf(LeafQuery::Nested { path, inner }) => write!(f, "{path}.({inner})"),
            Self::Bool(b) => {
                let render = |occur: &str, items: &[Node]| -> String {
                    if items.is_empty() {
                        String::new()
                    } else {
                        let joined = items
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("{occur}[{joined}]")
                    }
                };
                let parts: Vec<String> = [
                    render("must", &b.must),
                    render("should", &b.should),
                    render("must_not", &b.must_not),
                ]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

/// The compiled query document returned by [`crate::compile`].
pub type QueryDoc = Node;
