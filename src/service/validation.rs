//! Request validation and coercion of record payloads against a model's fields.

use crate::config::{FieldType, ValidatedDefinition};
use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Coerce a create body into a full row: every field present, defaults applied, required enforced.
    pub fn validate_create(
        definition: &ValidatedDefinition,
        body: Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        reject_unknown(definition, &body)?;
        let mut row = Map::with_capacity(definition.fields.len());
        for field in &definition.fields {
            let value = match body.get(&field.name) {
                Some(v) if !v.is_null() => coerce_value(&field.name, field.field_type, v)?,
                _ => field.default.clone().unwrap_or(Value::Null),
            };
            if field.required && value.is_null() {
                return Err(ValidationError::MissingRequired(field.name.clone()));
            }
            row.insert(field.name.clone(), value);
        }
        Ok(row)
    }

    /// Coerce the fields present in a patch. Required fields may not be cleared.
    pub fn validate_patch(
        definition: &ValidatedDefinition,
        patch: Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        if patch.is_empty() {
            return Err(ValidationError::Payload("patch must contain at least one field".into()));
        }
        reject_unknown(definition, &patch)?;
        let mut out = Map::with_capacity(patch.len());
        for (name, raw) in patch {
            let Some(field) = definition.field(&name) else { continue };
            let value = coerce_value(&field.name, field.field_type, &raw)?;
            if field.required && value.is_null() {
                return Err(ValidationError::MissingRequired(name));
            }
            out.insert(name, value);
        }
        Ok(out)
    }
}

fn reject_unknown(definition: &ValidatedDefinition, body: &Map<String, Value>) -> Result<(), ValidationError> {
    match body.keys().find(|k| definition.field(k).is_none()) {
        Some(k) => Err(ValidationError::UnknownField(k.clone())),
        None => Ok(()),
    }
}

/// Coerce one JSON value to a field type. `null` passes through.
pub fn coerce_value(field: &str, field_type: FieldType, v: &Value) -> Result<Value, ValidationError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let invalid = || ValidationError::InvalidValue {
        field: field.to_string(),
        expected: field_type.as_str(),
    };
    match field_type {
        FieldType::String => match v {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid()),
        },
        FieldType::Number => {
            let n = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            n.filter(|n| n.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        FieldType::Boolean => match v {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|n| n != 0.0).unwrap_or(true))),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        FieldType::Date => {
            let parsed = match v {
                Value::String(s) => parse_date(s.trim()),
                Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
                _ => None,
            };
            parsed
                .map(|d| Value::String(canonical_date(&d)))
                .ok_or_else(invalid)
        }
    }
}

/// RFC 3339 in UTC with millisecond precision.
pub fn canonical_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Field, PermissionMatrix};
    use serde_json::json;

    fn product() -> ValidatedDefinition {
        let field = |name: &str, field_type, required, default: Option<Value>| Field {
            name: name.into(),
            field_type,
            required,
            default,
            unique: false,
        };
        ValidatedDefinition {
            name: "Product".into(),
            fields: vec![
                field("name", FieldType::String, true, None),
                field("price", FieldType::Number, true, None),
                field("inStock", FieldType::Boolean, false, Some(json!(true))),
                field("launched", FieldType::Date, false, None),
            ],
            permissions: PermissionMatrix::default(),
        }
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_coerces_and_applies_defaults() {
        let row = RequestValidator::validate_create(
            &product(),
            obj(json!({ "name": "Pen", "price": "1.5", "launched": "2024-03-01" })),
        )
        .unwrap();
        assert_eq!(row["price"], json!(1.5));
        assert_eq!(row["inStock"], json!(true));
        assert_eq!(row["launched"], json!("2024-03-01T00:00:00.000Z"));
    }

    #[test]
    fn create_requires_required_fields() {
        let err = RequestValidator::validate_create(&product(), obj(json!({ "name": "Pen" }))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired(f) if f == "price"));
        let err = RequestValidator::validate_create(&product(), obj(json!({ "name": null, "price": 1 }))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired(f) if f == "name"));
    }

    #[test]
    fn create_rejects_unknown_and_uncoercible() {
        let err = RequestValidator::validate_create(&product(), obj(json!({ "name": "Pen", "price": 1, "colour": "red" })))
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField(f) if f == "colour"));
        let err = RequestValidator::validate_create(&product(), obj(json!({ "name": "Pen", "price": "cheap" }))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { field, expected: "number" } if field == "price"));
    }

    #[test]
    fn patch_keeps_only_given_fields() {
        let patch = RequestValidator::validate_patch(&product(), obj(json!({ "inStock": "no" }))).unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["inStock"], json!(false));
        assert!(RequestValidator::validate_patch(&product(), Map::new()).is_err());
        let err = RequestValidator::validate_patch(&product(), obj(json!({ "price": null }))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired(_)));
    }

    #[test]
    fn booleans_follow_truthiness() {
        assert_eq!(coerce_value("b", FieldType::Boolean, &json!(0)).unwrap(), json!(false));
        assert_eq!(coerce_value("b", FieldType::Boolean, &json!(2)).unwrap(), json!(true));
        assert_eq!(coerce_value("b", FieldType::Boolean, &json!("Yes")).unwrap(), json!(true));
        assert!(coerce_value("b", FieldType::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn dates_are_canonicalised_to_utc() {
        assert_eq!(
            coerce_value("d", FieldType::Date, &json!("2024-03-01T12:00:00+02:00")).unwrap(),
            json!("2024-03-01T10:00:00.000Z")
        );
        assert_eq!(coerce_value("d", FieldType::Date, &json!(0)).unwrap(), json!("1970-01-01T00:00:00.000Z"));
        assert!(coerce_value("d", FieldType::Date, &json!("yesterday")).is_err());
    }
}
