//! Per-type value normalization and validation (spec.md §4.2 steps 4-6).

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use unicode_normalization::UnicodeNormalization;

use crate::error::ValueError;
use crate::field::FieldType;

/// Folds `raw` to NFC (so visually-identical strings with different
/// combining-character decompositions compare equal) and downcases it
/// unless the field opted out of case folding.
#[must_use]
pub fn fold_case(raw: &str, no_downcase: bool) -> String {
    let nfc: String = raw.nfc().collect();
    if no_downcase { nfc } else { nfc.to_lowercase() }
}

/// A value that has been validated and normalized against its field's
/// declared type, ready for leaf construction or a registered [`Transform`].
///
/// [`Transform`]: crate::field::Transform
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Ip(IpAddr),
    IpCidr(IpNet),
    /// A date or relative-date expression, expanded to the half-open range
    /// it denotes (spec.md §4.2.1): `[start, end)`.
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Validates and normalizes `raw` against `ty`, downcasing literal/full-text
/// values unless `no_downcase` is set for the field.
pub fn normalize(
    field: &str,
    ty: FieldType,
    raw: &str,
    no_downcase: bool,
    now: DateTime<Utc>,
) -> Result<NormalizedValue, ValueError> {
    match ty {
        FieldType::Literal | FieldType::FullText => {
            Ok(NormalizedValue::Str(fold_case(raw, no_downcase)))
        }
        FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(NormalizedValue::Bool(true)),
            "false" => Ok(NormalizedValue::Bool(false)),
            _ => Err(ValueError::InvalidBoolean {
                field: field.to_string(),
                value: raw.to_string(),
            }),
        },
        FieldType::Integer => raw
            .parse::<i64>()
            .map(NormalizedValue::Int)
            .map_err(|_| ValueError::InvalidInteger {
                field: field.to_string(),
                value: raw.to_string(),
            }),
        FieldType::Float => raw
            .parse::<f64>()
            .map(NormalizedValue::Float)
            .map_err(|_| ValueError::InvalidFloat {
                field: field.to_string(),
                value: raw.to_string(),
            }),
        FieldType::Ip => normalize_ip(field, raw),
        FieldType::Date => crate::date::parse(raw, now)
            .map(|(start, end)| NormalizedValue::DateRange { start, end })
            .map_err(|()| ValueError::InvalidDate {
                field: field.to_string(),
                value: raw.to_string(),
            }),
    }
}

fn normalize_ip(field: &str, raw: &str) -> Result<NormalizedValue, ValueError> {
    if raw.contains('/') {
        raw.parse::<IpNet>()
            .map(NormalizedValue::IpCidr)
            .map_err(|_| ValueError::InvalidIp {
                field: field.to_string(),
                value: raw.to_string(),
            })
    } else {
        raw.parse::<IpAddr>()
            .map(NormalizedValue::Ip)
            .map_err(|_| ValueError::InvalidIp {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn literal_downcases_by_default() {
        let v = normalize("author", FieldType::Literal, "Twilight", false, now()).unwrap();
        assert_eq!(v, NormalizedValue::Str("twilight".into()));
    }

    #[test]
    fn literal_nfc_normalizes_combining_characters() {
        // "e" + combining acute (U+0065 U+0301) should fold to precomposed "é".
        let decomposed = "cafe\u{0301}";
        let v = normalize("name", FieldType::Literal, decomposed, true, now()).unwrap();
        assert_eq!(v, NormalizedValue::Str("café".into()));
    }

    #[test]
    fn literal_preserves_case_when_no_downcase() {
        let v = normalize("id", FieldType::Literal, "AbC123", true, now()).unwrap();
        assert_eq!(v, NormalizedValue::Str("AbC123".into()));
    }

    #[test]
    fn boolean_accepts_true_false_case_insensitively() {
        assert_eq!(
            normalize("flag", FieldType::Boolean, "TRUE", false, now()).unwrap(),
            NormalizedValue::Bool(true)
        );
        assert_eq!(
            normalize("flag", FieldType::Boolean, "false", false, now()).unwrap(),
            NormalizedValue::Bool(false)
        );
    }

    #[test]
    fn boolean_rejects_yes_no_and_other_garbage() {
        assert!(normalize("flag", FieldType::Boolean, "maybe", false, now()).is_err());
        assert!(normalize("flag", FieldType::Boolean, "yes", false, now()).is_err());
        assert!(normalize("flag", FieldType::Boolean, "1", false, now()).is_err());
    }

    #[test]
    fn integer_parses_and_rejects() {
        assert_eq!(
            normalize("score", FieldType::Integer, "42", false, now()).unwrap(),
            NormalizedValue::Int(42)
        );
        assert!(normalize("score", FieldType::Integer, "4.2", false, now()).is_err());
    }

    #[test]
    fn ip_accepts_plain_address_and_cidr() {
        assert!(matches!(
            normalize("src", FieldType::Ip, "10.0.0.1", false, now()).unwrap(),
            NormalizedValue::Ip(_)
        ));
        assert!(matches!(
            normalize("src", FieldType::Ip, "10.0.0.0/8", false, now()).unwrap(),
            NormalizedValue::IpCidr(_)
        ));
    }

    #[test]
    fn ip_rejects_garbage() {
        assert!(normalize("src", FieldType::Ip, "not-an-ip", false, now()).is_err());
    }
}
