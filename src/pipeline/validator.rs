//! Structured-payload validation.
//!
//! Validation never aborts: every discrepancy becomes one anomaly entry,
//! and a best-effort normalized payload is always returned. Callers decide
//! whether anomalies block anything.

use serde_json::{Map, Value};
use tracing::debug;

use crate::pipeline::types::{Anomaly, ValidationResult};

/// Expected type of one payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Numeric; numeric strings are coerced.
    Number,
    /// Object; `children` describe required nested fields.
    Object,
    Array,
    /// String or number (identifiers come as either).
    Scalar,
    Any,
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Object => "object",
            Self::Array => "array",
            Self::Scalar => "string or number",
            Self::Any => "any",
        }
    }
}

/// One required field in a payload shape.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Nested requirements, meaningful only for `FieldKind::Object`.
    pub children: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FieldSpec>) -> Self {
        self.children = children;
        self
    }
}

/// The target shape a payload is validated against. Shapes are supplied
/// externally; `invoice_shape` is the stock one for invoice payloads.
#[derive(Debug, Clone)]
pub struct PayloadShape {
    pub fields: Vec<FieldSpec>,
}

impl PayloadShape {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }
}

/// Stock shape for invoice payloads.
pub fn invoice_shape() -> PayloadShape {
    PayloadShape::new(vec![
        FieldSpec::new("id", FieldKind::Scalar),
        FieldSpec::new("date", FieldKind::String),
        FieldSpec::new("amount", FieldKind::Number),
        FieldSpec::new("customer", FieldKind::Object).with_children(vec![
            FieldSpec::new("name", FieldKind::String),
            FieldSpec::new("email", FieldKind::String),
        ]),
        FieldSpec::new("items", FieldKind::Array),
        FieldSpec::new("currency", FieldKind::String),
    ])
}

/// Stateless payload validator.
pub struct PayloadValidator;

impl PayloadValidator {
    /// Validate `payload` against `shape`.
    ///
    /// The normalized payload carries exactly the shape's fields — values
    /// copied through (coerced where the kind allows), `null` where
    /// missing. Anomalies come back in shape-declaration order.
    pub fn validate(&self, payload: &Value, shape: &PayloadShape) -> ValidationResult {
        let mut anomalies = Vec::new();

        let object = match payload.as_object() {
            Some(object) => object,
            None => {
                anomalies.push(Anomaly {
                    field: "payload".into(),
                    issue: format!("expected an object, got {}", type_name(payload)),
                });
                // Still produce the null-filled shape.
                let normalized = shape
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::Null))
                    .collect::<Map<_, _>>();
                return ValidationResult {
                    normalized: Value::Object(normalized),
                    anomalies,
                };
            }
        };

        let mut normalized = Map::new();
        for field in &shape.fields {
            let value = check_field(field, &field.name, object, &mut anomalies);
            normalized.insert(field.name.clone(), value);
        }

        debug!(anomalies = anomalies.len(), "Payload validated");
        ValidationResult {
            normalized: Value::Object(normalized),
            anomalies,
        }
    }
}

/// Check one field, pushing anomalies and returning the normalized value.
fn check_field(
    spec: &FieldSpec,
    path: &str,
    object: &Map<String, Value>,
    anomalies: &mut Vec<Anomaly>,
) -> Value {
    let value = match object.get(&spec.name) {
        Some(Value::Null) | None => {
            anomalies.push(Anomaly {
                field: path.into(),
                issue: "missing required field".into(),
            });
            return Value::Null;
        }
        Some(value) => value,
    };

    match spec.kind {
        FieldKind::Any => value.clone(),
        FieldKind::String => {
            if value.is_string() {
                value.clone()
            } else {
                mismatch(spec, path, value, anomalies)
            }
        }
        FieldKind::Number => match value {
            Value::Number(_) => value.clone(),
            // Numeric strings are coerced, matching lenient upstream feeds.
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(parsed) => serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone()),
                Err(_) => mismatch(spec, path, value, anomalies),
            },
            _ => mismatch(spec, path, value, anomalies),
        },
        FieldKind::Scalar => {
            if value.is_string() || value.is_number() {
                value.clone()
            } else {
                mismatch(spec, path, value, anomalies)
            }
        }
        FieldKind::Array => {
            if value.is_array() {
                value.clone()
            } else {
                mismatch(spec, path, value, anomalies)
            }
        }
        FieldKind::Object => match value.as_object() {
            Some(nested) => {
                for child in &spec.children {
                    let child_path = format!("{path}.{}", child.name);
                    check_field(child, &child_path, nested, anomalies);
                }
                value.clone()
            }
            None => mismatch(spec, path, value, anomalies),
        },
    }
}

fn mismatch(
    spec: &FieldSpec,
    path: &str,
    value: &Value,
    anomalies: &mut Vec<Anomaly>,
) -> Value {
    anomalies.push(Anomaly {
        field: path.into(),
        issue: format!(
            "expected {}, got {}",
            spec.kind.describe(),
            type_name(value)
        ),
    });
    // Keep the offending value; callers may still want it.
    value.clone()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn clean_payload_has_no_anomalies() {
        let payload = json!({
            "id": "INV-001",
            "date": "2026-08-25",
            "amount": 1500.75,
            "customer": {"name": "Acme Corp", "email": "info@acme.example"},
            "items": [{"product": "Laptop", "qty": 1}],
            "currency": "USD",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert!(result.is_clean());
        assert_eq!(result.normalized["id"], "INV-001");
        assert_eq!(result.normalized["currency"], "USD");
    }

    #[test]
    fn missing_invoice_number_yields_one_named_anomaly() {
        let shape = PayloadShape::new(vec![
            FieldSpec::new("invoice_number", FieldKind::String),
            FieldSpec::new("amount", FieldKind::Number),
        ]);
        let payload = json!({"amount": 99.5});
        let result = PayloadValidator.validate(&payload, &shape);

        let named: Vec<_> = result
            .anomalies
            .iter()
            .filter(|a| a.field == "invoice_number")
            .collect();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].issue, "missing required field");
        assert_eq!(result.normalized["invoice_number"], Value::Null);
        assert_eq!(result.normalized["amount"], 99.5);
    }

    #[test]
    fn anomalies_follow_shape_order() {
        let payload = json!({"date": 5});
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        let fields: Vec<_> = result.anomalies.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(
            fields,
            ["id", "date", "amount", "customer", "items", "currency"]
        );
    }

    #[test]
    fn numeric_string_amount_is_coerced() {
        let payload = json!({
            "id": 7, "date": "2026-01-01", "amount": "250.00",
            "customer": {"name": "N", "email": "e@x.example"},
            "items": [], "currency": "EUR",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert!(result.is_clean());
        assert_eq!(result.normalized["amount"], 250.0);
    }

    #[test]
    fn non_numeric_amount_is_an_anomaly() {
        let payload = json!({
            "id": 7, "date": "2026-01-01", "amount": "lots",
            "customer": {"name": "N", "email": "e@x.example"},
            "items": [], "currency": "EUR",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].field, "amount");
        assert!(result.anomalies[0].issue.contains("expected number"));
    }

    #[test]
    fn nested_customer_fields_use_dotted_paths() {
        let payload = json!({
            "id": "A", "date": "d", "amount": 1,
            "customer": {"name": "Charlie"},
            "items": [], "currency": "USD",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].field, "customer.email");
    }

    #[test]
    fn customer_as_string_is_a_type_anomaly() {
        let payload = json!({
            "id": "A", "date": "d", "amount": 1,
            "customer": "not an object",
            "items": [], "currency": "USD",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].field, "customer");
        assert!(result.anomalies[0].issue.contains("expected object"));
    }

    #[test]
    fn non_object_payload_still_returns_normalized_shape() {
        let result = PayloadValidator.validate(&json!([1, 2, 3]), &invoice_shape());
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].field, "payload");
        assert_eq!(result.normalized["id"], Value::Null);
        assert_eq!(result.normalized["currency"], Value::Null);
    }

    #[test]
    fn extra_fields_are_dropped_from_normalized() {
        let payload = json!({
            "id": "A", "date": "d", "amount": 1,
            "customer": {"name": "N", "email": "e"},
            "items": [], "currency": "USD",
            "internal_notes": "should not survive",
        });
        let result = PayloadValidator.validate(&payload, &invoice_shape());
        assert!(result.normalized.get("internal_notes").is_none());
    }
}
