//! Strict schema check for records returned by the completion service.
//!
//! This is the high-trust gate in front of a merge. Locally scraped records
//! go through the laxer `dedupe::is_valid_entry` instead.
use crate::dataset::numeric_value;
use serde_json::Value;
use thiserror::Error;

/// Declared kind of an allowed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Count,
    TextList,
}

struct FieldRule {
    name: &'static str,
    kind: FieldKind,
    required: bool,
}

const fn rule(name: &'static str, kind: FieldKind, required: bool) -> FieldRule {
    FieldRule {
        name,
        kind,
        required,
    }
}

const FIELD_RULES: &[FieldRule] = &[
    rule("name", FieldKind::Text, true),
    rule("address", FieldKind::Text, false),
    rule("phone", FieldKind::Text, false),
    rule("rating", FieldKind::Number, false),
    rule("review_count", FieldKind::Count, false),
    rule("category", FieldKind::Text, false),
    rule("price_range", FieldKind::Text, false),
    rule("opening_hours", FieldKind::Text, false),
    rule("status", FieldKind::Text, false),
    rule("reviews", FieldKind::TextList, false),
    rule("campus", FieldKind::Text, false),
    rule("source", FieldKind::Text, false),
    rule("last_updated", FieldKind::Text, false),
];

const RATING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=5.0;

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("type mismatch for field {0}")]
    TypeMismatch(&'static str),
    #[error("rating out of range ({0})")]
    RatingOutOfRange(f64),
}

/// Validate a record against the allowed-field table.
///
/// Unknown fields are ignored and `null` counts as absent.
pub fn validate_record(record: &Value) -> Result<(), ValidationIssue> {
    let fields = record.as_object().ok_or(ValidationIssue::NotAnObject)?;

    for rule in FIELD_RULES {
        let value = fields.get(rule.name).filter(|value| !value.is_null());
        let Some(value) = value else {
            if rule.required {
                return Err(ValidationIssue::MissingField(rule.name));
            }
            continue;
        };
        if rule.required && is_blank(value) {
            return Err(ValidationIssue::MissingField(rule.name));
        }
        if !kind_matches(rule.kind, value) {
            return Err(ValidationIssue::TypeMismatch(rule.name));
        }
    }

    if let Some(rating) = fields.get("rating").filter(|value| !value.is_null()) {
        let parsed = numeric_value(rating).ok_or(ValidationIssue::TypeMismatch("rating"))?;
        if !RATING_RANGE.contains(&parsed) {
            return Err(ValidationIssue::RatingOutOfRange(parsed));
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn kind_matches(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Text => value.is_string(),
        FieldKind::Number => numeric_value(value).is_some(),
        FieldKind::Count => match value {
            Value::Number(number) => {
                number.as_u64().is_some()
                    || number
                        .as_f64()
                        .is_some_and(|v| v.is_finite() && v >= 0.0 && v.fract() == 0.0)
            }
            Value::String(text) => text.trim().parse::<u64>().is_ok(),
            _ => false,
        },
        FieldKind::TextList => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_complete_record() {
        let record = json!({
            "name": "Pasta House",
            "address": "서울 동대문구 이문로 107",
            "phone": null,
            "rating": 4.4,
            "review_count": 120,
            "category": "Italian",
            "reviews": ["good", "cheap"],
            "status": "영업중",
            "last_updated": "2024-05-01T12:00:00+09:00"
        });
        assert_eq!(validate_record(&record), Ok(()));
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(
            validate_record(&json!(["name"])),
            Err(ValidationIssue::NotAnObject)
        );
        assert_eq!(
            validate_record(&json!("Pasta House")),
            Err(ValidationIssue::NotAnObject)
        );
    }

    #[test]
    fn rejects_missing_or_blank_name() {
        assert_eq!(
            validate_record(&json!({"address": "x"})),
            Err(ValidationIssue::MissingField("name"))
        );
        let issue = validate_record(&json!({"name": "   "})).unwrap_err();
        assert_eq!(issue.to_string(), "missing required field name");
    }

    #[test]
    fn rejects_ratings_outside_range() {
        for rating in [json!(-0.1), json!(5.01), json!(10), json!("7.5")] {
            let issue = validate_record(&json!({"name": "a", "rating": rating})).unwrap_err();
            assert!(
                matches!(issue, ValidationIssue::RatingOutOfRange(_)),
                "unexpected issue {issue:?}"
            );
            assert!(issue.to_string().starts_with("rating out of range"));
        }
    }

    #[test]
    fn accepts_rating_bounds_and_numeric_strings() {
        for rating in [json!(0), json!(5.0), json!("4.5")] {
            assert_eq!(
                validate_record(&json!({"name": "a", "rating": rating})),
                Ok(())
            );
        }
    }

    #[test]
    fn rejects_type_mismatches() {
        let cases = [
            (json!({"name": "a", "rating": "great"}), "rating"),
            (json!({"name": "a", "review_count": -3}), "review_count"),
            (json!({"name": "a", "phone": 1234}), "phone"),
            (json!({"name": "a", "reviews": "tasty"}), "reviews"),
            (json!({"name": 42}), "name"),
        ];
        for (record, field) in cases {
            let issue = validate_record(&record).unwrap_err();
            assert_eq!(issue, ValidationIssue::TypeMismatch(field));
            assert_eq!(issue.to_string(), format!("type mismatch for field {field}"));
        }
    }

    #[test]
    fn counts_accept_integral_floats() {
        for count in [json!(12.0), json!(0.0), json!("40")] {
            assert_eq!(
                validate_record(&json!({"name": "a", "review_count": count})),
                Ok(())
            );
        }
        for count in [json!(12.5), json!(-1.0)] {
            assert_eq!(
                validate_record(&json!({"name": "a", "review_count": count})),
                Err(ValidationIssue::TypeMismatch("review_count"))
            );
        }
    }

    #[test]
    fn ignores_unknown_fields() {
        let record = json!({"name": "a", "parking": true, "menu": {"kimchi": 8000}});
        assert_eq!(validate_record(&record), Ok(()));
    }
}
