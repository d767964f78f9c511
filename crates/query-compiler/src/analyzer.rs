//! The term analyzer: turns a single lexed atom into a [`LeafQuery`]
//! (spec.md §4.2).
//!
//! Order of operations: split an optional `field:` prefix off the atom text
//! (leftmost unescaped colon), peel off a `.gt`/`.gte`/`.lt`/`.lte`/`.eq`
//! range suffix from the field name, resolve aliases, route against the
//! caller's [`FieldMeta`] (falling back to the default field for an
//! unrecognized name rather than erroring), normalize the value for the
//! field's declared type, run a registered transform if present, and
//! finally wrap the result for a nested field if the routed field is one.

use chrono::{DateTime, Utc};

use crate::error::CompileError;
use crate::field::{FieldMeta, FieldType};
use crate::leaf::{LeafQuery, Node, RangeBounds, Scalar};
use crate::value::{self, NormalizedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

/// Analyzes one lexed atom into its leaf query, routing unprefixed atoms
/// (and atoms whose field prefix doesn't resolve to a known field) against
/// `default_field`.
pub fn analyze(
    raw_text: &str,
    boost: Option<f64>,
    fuzz: Option<f64>,
    meta: &FieldMeta,
    default_field: &str,
    now: DateTime<Utc>,
) -> Result<LeafQuery, CompileError> {
    let (field_candidate, value_part) = split_field_prefix(raw_text);

    let (field_raw, range_op) = match field_candidate {
        Some(candidate) => strip_range_suffix(candidate),
        None => (default_field, None),
    };
    let field_lower = field_raw.to_ascii_lowercase();
    let field = field_lower.as_str();

    let canonical = meta.resolve_alias(field).to_string();
    let Some(ty) = meta.type_of(field) else {
        if field_candidate.is_some() {
            tracing::warn!(field, "unrecognized field, falling back to default field");
            return build_leaf(
                raw_text,
                boost,
                fuzz,
                FieldType::FullText,
                default_field,
                None,
                meta,
                now,
            );
        }
        // No prefix at all and the default field itself isn't registered:
        // treat it as plain full text.
        return build_leaf(
            value_part.unwrap_or(raw_text),
            boost,
            fuzz,
            FieldType::FullText,
            default_field,
            None,
            meta,
            now,
        );
    };

    let value_text = value_part.unwrap_or(raw_text);
    let leaf = build_leaf(value_text, boost, fuzz, ty, &canonical, range_op, meta, now)?;

    Ok(match meta.nested_path_of(&canonical) {
        Some(path) => LeafQuery::Nested {
            path: path.to_string(),
            inner: Box::new(Node::Leaf(leaf)),
        },
        None => leaf,
    })
}

/// Splits the leftmost unescaped `:` in `text`. Returns `(field, value)`
/// when found, `(None, whole text)` otherwise.
fn split_field_prefix(text: &str) -> (Option<&str>, Option<&str>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (byte_idx, c) = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == ':' {
            return (Some(&text[..byte_idx]), Some(&text[byte_idx + 1..]));
        }
        i += 1;
    }
    (None, None)
}

fn strip_range_suffix(field: &str) -> (&str, Option<RangeOp>) {
    for (suffix, op) in [
        (".gte", RangeOp::Gte),
        (".lte", RangeOp::Lte),
        (".gt", RangeOp::Gt),
        (".lt", RangeOp::Lt),
        (".eq", RangeOp::Eq),
    ] {
        if let Some(stripped) = field.strip_suffix(suffix) {
            return (stripped, Some(op));
        }
    }
    (field, None)
}

fn strip_quotes(value: &str) -> (String, bool) {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let unescaped = inner.replace("\\\"", "\"").replace("\\\\", "\\");
        (unescaped, true)
    } else {
        (value.to_string(), false)
    }
}

/// Resolves backslash escapes in unquoted atom text. `\*` and `\?` are kept
/// intact (backslash and all) so [`has_wildcard`] can tell an escaped
/// metacharacter from a live one and the backend engine still receives the
/// escape (spec.md §4.2 step 8); every other `\x` collapses to `x`.
fn unescape_unquoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('*' | '?') => {
                out.push('\\');
                out.push(chars.next().expect("peeked"));
            }
            Some(&next) => {
                out.push(next);
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}

/// True if `text` contains a `*` or `?` that isn't escaped with a
/// backslash.
fn has_wildcard(text: &str) -> bool {
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c == '*' || c == '?' {
            return true;
        }
    }
    false
}

fn range_suffix_text(op: RangeOp) -> &'static str {
    match op {
        RangeOp::Gt => ".gt",
        RangeOp::Gte => ".gte",
        RangeOp::Lt => ".lt",
        RangeOp::Lte => ".lte",
        RangeOp::Eq => ".eq",
    }
}

#[allow(clippy::too_many_arguments, clippy::cast_possible_truncation)]
fn build_leaf(
    value_text: &str,
    boost: Option<f64>,
    fuzz: Option<f64>,
    ty: FieldType,
    field: &str,
    range_op: Option<RangeOp>,
    meta: &FieldMeta,
    now: DateTime<Utc>,
) -> Result<LeafQuery, CompileError> {
    if let Some(op) = range_op {
        if matches!(ty, FieldType::Literal | FieldType::FullText | FieldType::Boolean | FieldType::Ip) {
            return Err(crate::error::ValueError::UnsupportedRangeSuffix {
                field: field.to_string(),
                suffix: range_suffix_text(op).to_string(),
            }
            .into());
        }
    }

    match ty {
        FieldType::Literal | FieldType::FullText => {
            let (stripped, is_phrase) = strip_quotes(value_text);
            // Wildcard metacharacters inside quoted text are literal, never
            // live wildcards, so only unquoted text gets escape resolution
            // geared toward wildcard detection.
            let text = if is_phrase { stripped } else { unescape_unquoted(&stripped) };
            let no_downcase = meta.is_no_downcase(field);

            if let Some(transform) = meta.transform_of(field) {
                let normalized = NormalizedValue::Str(value::fold_case(&text, no_downcase));
                return Ok(transform(&normalized));
            }

            if let Some(fuzziness) = fuzz {
                return Ok(LeafQuery::Fuzzy {
                    field: field.to_string(),
                    value: text,
                    fuzziness,
                    boost,
                });
            }
            if !is_phrase && text == "*" {
                return Ok(LeafQuery::MatchAll);
            }
            if !is_phrase && has_wildcard(&text) {
                return Ok(LeafQuery::Wildcard {
                    field: field.to_string(),
                    pattern: text,
                    boost,
                });
            }
            if is_phrase && matches!(ty, FieldType::FullText) {
                return Ok(LeafQuery::MatchPhrase {
                    field: field.to_string(),
                    value: text,
                    boost,
                });
            }
            Ok(LeafQuery::Term {
                field: field.to_string(),
                value: Scalar::Str(value::fold_case(&text, no_downcase)),
                boost,
            })
        }
        FieldType::Boolean => {
            let normalized = value::normalize(field, ty, value_text, true, now)?;
            if let Some(transform) = meta.transform_of(field) {
                return Ok(transform(&normalized));
            }
            let NormalizedValue::Bool(b) = normalized else {
                unreachable!("normalize(Boolean) always returns Bool")
            };
            Ok(LeafQuery::Term {
                field: field.to_string(),
                value: Scalar::Bool(b),
                boost,
            })
        }
        FieldType::Integer => {
            let normalized = value::normalize(field, ty, value_text, true, now)?;
            if let Some(transform) = meta.transform_of(field) {
                return Ok(transform(&normalized));
            }
            let NormalizedValue::Int(v) = normalized else {
                unreachable!("normalize(Integer) always returns Int")
            };
            build_numeric_leaf(
                field,
                Scalar::Int(v),
                range_op,
                fuzz.map(|f| (Scalar::Int(v - f as i64), Scalar::Int(v + f as i64))),
                boost,
            )
        }
        FieldType::Float => {
            let normalized = value::normalize(field, ty, value_text, true, now)?;
            if let Some(transform) = meta.transform_of(field) {
                return Ok(transform(&normalized));
            }
            let NormalizedValue::Float(v) = normalized else {
                unreachable!("normalize(Float) always returns Float")
            };
            build_numeric_leaf(
                field,
                Scalar::Float(v),
                range_op,
                fuzz.map(|f| (Scalar::Float(v - f), Scalar::Float(v + f))),
                boost,
            )
        }
        FieldType::Ip => {
            let normalized = value::normalize(field, ty, value_text, true, now)?;
            if let Some(transform) = meta.transform_of(field) {
                return Ok(transform(&normalized));
            }
            let text = match &normalized {
                NormalizedValue::Ip(addr) => addr.to_string(),
                NormalizedValue::IpCidr(net) => net.to_string(),
                _ => unreachable!("normalize(Ip) always returns Ip/IpCidr"),
            };
            Ok(LeafQuery::Term {
                field: field.to_string(),
                value: Scalar::Str(text),
                boost,
            })
        }
        FieldType::Date => {
            let normalized = value::normalize(field, ty, value_text, true, now)?;
            if let Some(transform) = meta.transform_of(field) {
                return Ok(transform(&normalized));
            }
            let NormalizedValue::DateRange { start, end } = normalized else {
                unreachable!("normalize(Date) always returns DateRange")
            };
            let bounds = match range_op {
                None | Some(RangeOp::Eq) => RangeBounds {
                    gte: Some(Scalar::Timestamp(start)),
                    lt: Some(Scalar::Timestamp(end)),
                    ..RangeBounds::default()
                },
                Some(RangeOp::Lt) => RangeBounds {
                    lt: Some(Scalar::Timestamp(start)),
                    ..RangeBounds::default()
                },
                Some(RangeOp::Gte) => RangeBounds {
                    gte: Some(Scalar::Timestamp(start)),
                    ..RangeBounds::default()
                },
                Some(RangeOp::Lte) => RangeBounds {
                    lt: Some(Scalar::Timestamp(end)),
                    ..RangeBounds::default()
                },
                Some(RangeOp::Gt) => RangeBounds {
                    gte: Some(Scalar::Timestamp(end)),
                    ..RangeBounds::default()
                },
            };
            Ok(LeafQuery::Range {
                field: field.to_string(),
                bounds,
            })
        }
    }
}

fn build_numeric_leaf(
    field: &str,
    value: Scalar,
    range_op: Option<RangeOp>,
    fuzz_range: Option<(Scalar, Scalar)>,
    boost: Option<f64>,
) -> Result<LeafQuery, CompileError> {
    if let Some(op) = range_op {
        let bounds = match op {
            RangeOp::Gt => RangeBounds {
                gt: Some(value),
                ..RangeBounds::default()
            },
            RangeOp::Gte => RangeBounds {
                gte: Some(value),
                ..RangeBounds::default()
            },
            RangeOp::Lt => RangeBounds {
                lt: Some(value),
                ..RangeBounds::default()
            },
            RangeOp::Lte => RangeBounds {
                lte: Some(value),
                ..RangeBounds::default()
            },
            RangeOp::Eq => RangeBounds {
                gte: Some(value.clone()),
                lte: Some(value),
                ..RangeBounds::default()
            },
        };
        return Ok(LeafQuery::Range {
            field: field.to_string(),
            bounds,
        });
    }
    if let Some((lo, hi)) = fuzz_range {
        return Ok(LeafQuery::Range {
            field: field.to_string(),
            bounds: RangeBounds {
                gte: Some(lo),
                lte: Some(hi),
                ..RangeBounds::default()
            },
        });
    }
    Ok(LeafQuery::Term {
        field: field.to_string(),
        value,
        boost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> FieldMeta {
        FieldMeta::builder()
            .field("default", FieldType::FullText)
            .field("author", FieldType::Literal)
            .field("score", FieldType::Integer)
            .field("rating", FieldType::Float)
            .field("active", FieldType::Boolean)
            .field("created_at", FieldType::Date)
            .field("src_ip", FieldType::Ip)
            .alias("by", "author")
            .build()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn bare_term_routes_to_default_field() {
        let leaf = analyze("twilight sparkle", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "default".into(),
                value: Scalar::Str("twilight sparkle".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn field_prefixed_term_routes_to_named_field() {
        let leaf = analyze("author:Rarity", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "author".into(),
                value: Scalar::Str("rarity".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn uppercase_field_prefix_still_resolves() {
        let leaf = analyze("Author:Rarity", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "author".into(),
                value: Scalar::Str("rarity".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn alias_resolves_to_canonical_field_name() {
        let leaf = analyze("by:Rarity", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "author".into(),
                value: Scalar::Str("rarity".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn unknown_field_falls_back_to_default_field() {
        let leaf = analyze("bogus:rarity", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "default".into(),
                value: Scalar::Str("rarity".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn integer_range_suffix_builds_range_leaf() {
        let leaf = analyze("score.gte:10", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Range {
                field: "score".into(),
                bounds: RangeBounds {
                    gte: Some(Scalar::Int(10)),
                    ..RangeBounds::default()
                },
            }
        );
    }

    #[test]
    fn quoted_full_text_value_is_match_phrase() {
        let leaf = analyze(
            "default:\"twilight sparkle\"",
            None,
            None,
            &meta(),
            "default",
            now(),
        )
        .unwrap();
        assert_eq!(
            leaf,
            LeafQuery::MatchPhrase {
                field: "default".into(),
                value: "twilight sparkle".into(),
                boost: None,
            }
        );
    }

    #[test]
    fn wildcard_pattern_is_detected() {
        let leaf = analyze("author:rari*", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Wildcard {
                field: "author".into(),
                pattern: "rari*".into(),
                boost: None,
            }
        );
    }

    #[test]
    fn bare_asterisk_is_match_all() {
        let leaf = analyze("author:*", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(leaf, LeafQuery::MatchAll);
    }

    #[test]
    fn escaped_wildcard_char_survives_as_a_literal_term() {
        let leaf = analyze(r"author:rari\*", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "author".into(),
                value: Scalar::Str(r"rari\*".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn wildcard_metacharacter_inside_quotes_is_literal() {
        let leaf = analyze(
            "default:\"foo*bar\"",
            None,
            None,
            &meta(),
            "default",
            now(),
        )
        .unwrap();
        assert_eq!(
            leaf,
            LeafQuery::MatchPhrase {
                field: "default".into(),
                value: "foo*bar".into(),
                boost: None,
            }
        );
    }

    #[test]
    fn escaped_colon_is_not_treated_as_the_field_separator() {
        let leaf = analyze(r"foo\:bar:rarity", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "default".into(),
                value: Scalar::Str("foo:bar:rarity".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn fuzz_on_integer_builds_a_symmetric_range() {
        let leaf = analyze("score:10", None, Some(2.0), &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Range {
                field: "score".into(),
                bounds: RangeBounds {
                    gte: Some(Scalar::Int(8)),
                    lte: Some(Scalar::Int(12)),
                    ..RangeBounds::default()
                },
            }
        );
    }

    #[test]
    fn date_without_suffix_is_half_open_range() {
        let leaf = analyze("created_at:2024-02", None, None, &meta(), "default", now()).unwrap();
        let LeafQuery::Range { bounds, .. } = leaf else {
            panic!("expected range")
        };
        assert!(bounds.gte.is_some());
        assert!(bounds.lt.is_some());
        assert!(bounds.gt.is_none());
        assert!(bounds.lte.is_none());
    }

    #[test]
    fn date_lte_suffix_uses_lt_bound_on_range_end() {
        let leaf =
            analyze("created_at.lte:2024-02", None, None, &meta(), "default", now()).unwrap();
        let LeafQuery::Range { bounds, .. } = leaf else {
            panic!("expected range")
        };
        assert!(bounds.lt.is_some());
        assert!(bounds.gte.is_none());
    }

    #[test]
    fn ip_with_cidr_is_accepted() {
        let leaf = analyze("src_ip:10.0.0.0/8", None, None, &meta(), "default", now()).unwrap();
        assert_eq!(
            leaf,
            LeafQuery::Term {
                field: "src_ip".into(),
                value: Scalar::Str("10.0.0.0/8".into()),
                boost: None,
            }
        );
    }

    #[test]
    fn invalid_integer_value_is_an_error() {
        assert!(analyze("score:not-a-number", None, None, &meta(), "default", now()).is_err());
    }

    #[test]
    fn range_suffix_on_a_literal_field_is_an_error() {
        let err = analyze("author.gt:rarity", None, None, &meta(), "default", now()).unwrap_err();
        assert_eq!(err.error_type(), "UNSUPPORTED_RANGE_SUFFIX");
    }
}
